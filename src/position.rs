use chrono::{DateTime, Local};
use std::time::Duration;
use thiserror::Error;

/// Conversion factor from m/s (what positioning hardware reports) to km/h
/// (what we show and record).
pub const KMH_PER_MPS: f64 = 3.6;

/// A single reported geographic position.
///
/// Produced by a position source and immutable afterwards. `timestamp` is the
/// receipt time of the fix, not a GPS-clock time, because records are stamped
/// with the moment the update reached us.
#[derive(Clone, Debug, PartialEq)]
pub struct Fix {
    pub latitude: f64,
    pub longitude: f64,
    /// Ground speed in km/h, rounded to 2 decimal places. `0.0` when the
    /// source reports no speed (stationary or unsupported); a measured speed
    /// of zero is collapsed into the same value.
    pub speed_kmh: f64,
    /// Horizontal accuracy in meters, when the source knows it.
    pub accuracy_m: Option<f32>,
    pub timestamp: DateTime<Local>,
}

impl Fix {
    pub fn new(
        latitude: f64,
        longitude: f64,
        speed_mps: Option<f64>,
        accuracy_m: Option<f32>,
        timestamp: DateTime<Local>,
    ) -> Self {
        Fix {
            latitude,
            longitude,
            speed_kmh: speed_mps.map(speed_mps_to_kmh).unwrap_or(0.0),
            accuracy_m,
            timestamp,
        }
    }
}

pub fn speed_mps_to_kmh(speed_mps: f64) -> f64 {
    (speed_mps * KMH_PER_MPS * 100.0).round() / 100.0
}

/// Options for a position request, one-shot or streaming.
#[derive(Clone, Debug, PartialEq)]
pub struct FixRequest {
    pub high_accuracy: bool,
    /// How long to wait for a fix (one-shot) or for each update (streaming).
    pub timeout: Duration,
    /// Oldest acceptable cached fix. Zero means always fresh.
    pub max_age: Duration,
}

impl FixRequest {
    /// One-shot read: high accuracy, 10 s timeout, no cached fixes.
    pub fn one_shot() -> Self {
        FixRequest {
            high_accuracy: true,
            timeout: Duration::from_secs(10),
            max_age: Duration::ZERO,
        }
    }

    /// Continuous stream: high accuracy, 5 s per-update timeout, no caching.
    pub fn streaming() -> Self {
        FixRequest {
            high_accuracy: true,
            timeout: Duration::from_secs(5),
            max_age: Duration::ZERO,
        }
    }
}

/// Positioning capability failures. Surfaced directly to the user; the
/// feature cannot proceed without a fix.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum PositionError {
    #[error("location permission denied: {0}")]
    PermissionDenied(String),
    #[error("no position fix within {0:?}")]
    Timeout(Duration),
    #[error("position unavailable: {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speed_conversion_rounds_to_two_decimals() {
        assert_eq!(speed_mps_to_kmh(2.78), 10.01);
        assert_eq!(speed_mps_to_kmh(0.0), 0.0);
        assert_eq!(speed_mps_to_kmh(3.0), 10.8);
    }

    #[test]
    fn missing_speed_becomes_zero() {
        let fix = Fix::new(12.0, 77.0, None, Some(5.0), Local::now());
        assert_eq!(fix.speed_kmh, 0.0);
    }
}
