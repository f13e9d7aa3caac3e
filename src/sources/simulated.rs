use std::time::Duration;

use chrono::Local;
use rand::Rng;

use super::{ActiveSubscription, PositionSource, SourceEvent, Subscription};
use crate::position::{Fix, FixRequest, PositionError};

// Roughly a city block per step at the default cadence.
const LNG_STEP: f64 = 0.00252;
const LAT_JITTER: f64 = LNG_STEP;
const WALK_SPEED_MPS_RANGE: std::ops::Range<f64> = 0.5..2.5;
const SIMULATED_ACCURACY_M: f32 = 5.0;

/// A fake positioning device: a random walk east from a start coordinate,
/// emitting one fix per interval. Useful for demos and for exercising the
/// pipeline without real hardware.
pub struct SimulatedSource {
    start_lat: f64,
    start_lng: f64,
    interval: Duration,
    active: ActiveSubscription,
}

impl SimulatedSource {
    pub fn new(start_lat: f64, start_lng: f64, interval: Duration) -> Self {
        SimulatedSource {
            start_lat,
            start_lng,
            interval,
            active: ActiveSubscription::new(),
        }
    }
}

impl PositionSource for SimulatedSource {
    async fn current_position(&self, _request: &FixRequest) -> Result<Fix, PositionError> {
        Ok(Fix::new(
            self.start_lat,
            self.start_lng,
            None,
            Some(SIMULATED_ACCURACY_M),
            Local::now(),
        ))
    }

    fn subscribe(&self, _request: &FixRequest) -> Subscription {
        let (tx, subscription) = self.active.begin();
        let handle = subscription.handle.clone();
        let interval = self.interval;
        let mut lat = self.start_lat;
        let mut lng = self.start_lng;
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                if handle.is_cancelled() {
                    break;
                }
                let speed_mps = {
                    // ThreadRng is not Send, keep it out of the await above.
                    let mut rng = rand::rng();
                    lng += LNG_STEP;
                    lat += rng.random_range(-LAT_JITTER..=LAT_JITTER);
                    rng.random_range(WALK_SPEED_MPS_RANGE)
                };
                let fix = Fix::new(
                    lat,
                    lng,
                    Some(speed_mps),
                    Some(SIMULATED_ACCURACY_M),
                    Local::now(),
                );
                if tx.send(SourceEvent::Fix(fix)).is_err() {
                    break;
                }
            }
        });
        subscription
    }
}
