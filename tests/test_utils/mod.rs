#![allow(dead_code)]

use std::sync::Mutex;
use std::time::Duration;

use chrono::Local;
use tokio::sync::{mpsc, oneshot};

use waypath::geocoder::Geocoder;
use waypath::position::{Fix, FixRequest, PositionError};
use waypath::sources::{ActiveSubscription, PositionSource, SourceEvent, Subscription};

pub fn fix(lat: f64, lng: f64, speed_mps: Option<f64>) -> Fix {
    Fix::new(lat, lng, speed_mps, Some(5.0), Local::now())
}

/// Position source driven by hand from the test body. Senders for
/// superseded streams are kept around so tests can emit on a stream that a
/// re-subscribe already cancelled.
pub struct ManualSource {
    active: ActiveSubscription,
    feeds: Mutex<Vec<mpsc::UnboundedSender<SourceEvent>>>,
}

impl ManualSource {
    pub fn new() -> Self {
        ManualSource {
            active: ActiveSubscription::new(),
            feeds: Mutex::new(Vec::new()),
        }
    }

    /// Emit on the current (most recent) stream.
    pub fn emit(&self, event: SourceEvent) {
        if let Some(tx) = self.feeds.lock().unwrap().last() {
            let _ = tx.send(event);
        }
    }

    /// Emit on the `index`-th stream ever subscribed, cancelled or not.
    pub fn emit_on(&self, index: usize, event: SourceEvent) {
        if let Some(tx) = self.feeds.lock().unwrap().get(index) {
            let _ = tx.send(event);
        }
    }

    pub fn emit_fix(&self, lat: f64, lng: f64, speed_mps: Option<f64>) {
        self.emit(SourceEvent::Fix(fix(lat, lng, speed_mps)));
    }

    pub fn emit_error(&self, error: PositionError) {
        self.emit(SourceEvent::Error(error));
    }
}

impl PositionSource for ManualSource {
    async fn current_position(&self, _request: &FixRequest) -> Result<Fix, PositionError> {
        Ok(fix(12.9716, 77.5946, None))
    }

    fn subscribe(&self, _request: &FixRequest) -> Subscription {
        let (tx, subscription) = self.active.begin();
        self.feeds.lock().unwrap().push(tx);
        subscription
    }
}

/// Geocoder that resolves instantly with a deterministic address.
pub struct InstantGeocoder;

impl Geocoder for InstantGeocoder {
    async fn reverse_geocode(&self, latitude: f64, longitude: f64) -> String {
        format!("addr {latitude:.6},{longitude:.6}")
    }
}

/// Geocoder that parks every lookup until the test releases it, so the test
/// fully controls completion order. Dropping a gate without resolving it
/// makes the lookup report the transport-failure sentinel.
#[derive(Default)]
pub struct GatedGeocoder {
    pending: Mutex<Vec<oneshot::Sender<String>>>,
}

impl GatedGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    /// Resolve the pending lookup at `index` (in call order) with `address`.
    pub fn resolve(&self, index: usize, address: &str) {
        let gate = self.pending.lock().unwrap().remove(index);
        let _ = gate.send(address.to_string());
    }

    /// Drop the pending lookup at `index` so it fails like a dead network.
    pub fn fail(&self, index: usize) {
        drop(self.pending.lock().unwrap().remove(index));
    }
}

impl Geocoder for GatedGeocoder {
    async fn reverse_geocode(&self, _latitude: f64, _longitude: f64) -> String {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().unwrap().push(tx);
        rx.await
            .unwrap_or_else(|_| waypath::geocoder::ADDRESS_FETCH_FAILED.to_string())
    }
}

/// Poll `condition` until it holds, failing the test after two seconds.
pub async fn wait_until<F: Fn() -> bool>(what: &str, condition: F) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for: {what}");
}
