use chrono::{DateTime, Local};
use serde::Serialize;

use crate::position::Fix;

/// One vertex of the recorded path polyline.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PathPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl From<&Fix> for PathPoint {
    fn from(fix: &Fix) -> Self {
        PathPoint {
            latitude: fix.latitude,
            longitude: fix.longitude,
        }
    }
}

/// One exportable row: a position update received while recording, enriched
/// with a reverse-geocoded address. All fields are pre-formatted strings so
/// the spreadsheet shows exactly what the user saw.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TrackRecord {
    pub timestamp: String,
    pub latitude: String,
    pub longitude: String,
    pub address: String,
    pub speed: String,
}

pub fn format_coordinate(value: f64) -> String {
    format!("{value:.6}")
}

/// "`<value>` km/h" with two decimals, except a plain `0` for no speed.
pub fn format_speed(speed_kmh: f64) -> String {
    if speed_kmh == 0.0 {
        "0 km/h".to_string()
    } else {
        format!("{speed_kmh:.2} km/h")
    }
}

pub fn format_timestamp(timestamp: &DateTime<Local>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinates_keep_six_decimals() {
        assert_eq!(format_coordinate(12.971599), "12.971599");
        assert_eq!(format_coordinate(77.5), "77.500000");
        assert_eq!(format_coordinate(-33.7932919103), "-33.793292");
    }

    #[test]
    fn speed_strings() {
        assert_eq!(format_speed(10.01), "10.01 km/h");
        assert_eq!(format_speed(10.8), "10.80 km/h");
        assert_eq!(format_speed(0.0), "0 km/h");
    }
}
