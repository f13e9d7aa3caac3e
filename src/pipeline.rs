use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::geocoder::Geocoder;
use crate::map_view::MapView;
use crate::position::{Fix, FixRequest, PositionError};
use crate::sources::{PositionSource, SourceEvent, SubscriptionHandle};
use crate::track::TrackRecord;
use crate::tracker::{LookupRequest, TrackerCore, TrackerEvent, TrackerState};

/// Async driver around [`TrackerCore`].
///
/// Owns the subscription lifecycle and the single event channel: fixes and
/// lookup completions flow through a driver task, control transitions
/// (start/stop/toggle) are applied inline on the caller's thread. Both paths
/// funnel into the same reducer under one lock, and the map view is synced
/// after every event. Address lookups are spawned as independent tasks whose
/// completions feed back into the event channel, so overlapping lookups can
/// finish in any order without corrupting session state.
pub struct TrackingPipeline<S> {
    source: Arc<S>,
    core: Arc<Mutex<TrackerCore>>,
    map_view: Arc<Mutex<MapView>>,
    events: mpsc::UnboundedSender<TrackerEvent>,
    active: Mutex<Option<SubscriptionHandle>>,
}

impl<S: PositionSource + 'static> TrackingPipeline<S> {
    /// Spawns the driver task; must be called from within a tokio runtime.
    /// The geocoder moves into the driver, it is not needed anywhere else.
    pub fn new<G: Geocoder + 'static>(
        source: Arc<S>,
        geocoder: Arc<G>,
        map_view: Arc<Mutex<MapView>>,
    ) -> Self {
        let core = Arc::new(Mutex::new(TrackerCore::new()));
        let (events, mut rx) = mpsc::unbounded_channel::<TrackerEvent>();
        {
            let core = core.clone();
            let map_view = map_view.clone();
            // A weak sender, so dropping the pipeline closes the channel and
            // ends the driver instead of it keeping itself alive.
            let events = events.downgrade();
            tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    if let Some(request) = apply_event(&core, &map_view, event) {
                        if let Some(events) = events.upgrade() {
                            spawn_lookup(geocoder.clone(), events, request);
                        }
                    }
                }
            });
        }
        TrackingPipeline {
            source,
            core,
            map_view,
            events,
            active: Mutex::new(None),
        }
    }

    /// Idle → Tracking: subscribe to the position source and start following
    /// updates. Starting while already started re-subscribes
    /// (last-writer-wins) without touching accumulated records.
    pub fn start(&self) {
        let subscription = self.source.subscribe(&FixRequest::streaming());
        {
            let mut active = self.active.lock().unwrap();
            if let Some(previous) = active.replace(subscription.handle.clone()) {
                previous.cancel();
            }
        }
        self.apply_now(TrackerEvent::TrackingStarted);

        let events = self.events.clone();
        let handle = subscription.handle.clone();
        let mut stream = subscription.events;
        tokio::spawn(async move {
            while let Some(event) = stream.recv().await {
                if handle.is_cancelled() {
                    break;
                }
                let forwarded = match event {
                    SourceEvent::Fix(fix) => TrackerEvent::PositionUpdated(fix),
                    SourceEvent::Error(e) => TrackerEvent::SourceFailed(e),
                };
                if events.send(forwarded).is_err() {
                    break;
                }
            }
        });
    }

    /// Flip recording on or off; returns whether we are recording now.
    /// Turning recording on clears the previous session's path and records.
    pub fn toggle_recording(&self) -> bool {
        self.apply_now(TrackerEvent::RecordingToggled);
        self.state() == TrackerState::Recording
    }

    /// Tracking|Recording → Idle. The subscription is cancelled before this
    /// returns, so no further position updates reach the session; lookups
    /// already in flight still complete and append to the records.
    pub fn stop(&self) {
        if let Some(handle) = self.active.lock().unwrap().take() {
            handle.cancel();
        }
        self.apply_now(TrackerEvent::TrackingStopped);
    }

    /// One-shot position read, independent of the subscription. Also pushes
    /// the fix to the map view so the marker is placed before the stream
    /// delivers its first update.
    pub async fn read_once(&self) -> Result<Fix, PositionError> {
        let fix = self
            .source
            .current_position(&FixRequest::one_shot())
            .await?;
        self.map_view.lock().unwrap().set_position(&fix);
        Ok(fix)
    }

    fn apply_now(&self, event: TrackerEvent) {
        // Control events never start lookups; only PositionUpdated does, and
        // those always arrive through the driver.
        let lookup = apply_event(&self.core, &self.map_view, event);
        debug_assert!(lookup.is_none());
    }

    pub fn state(&self) -> TrackerState {
        self.core.lock().unwrap().state()
    }

    pub fn current_position(&self) -> Option<Fix> {
        self.core.lock().unwrap().current().cloned()
    }

    pub fn path_len(&self) -> usize {
        self.core.lock().unwrap().path().len()
    }

    pub fn pending_lookups(&self) -> usize {
        self.core.lock().unwrap().pending_lookups()
    }

    pub fn records(&self) -> Vec<TrackRecord> {
        self.core.lock().unwrap().records().to_vec()
    }
}

impl<S> Drop for TrackingPipeline<S> {
    fn drop(&mut self) {
        // Scoped-resource obligation: never leak a live device subscription.
        if let Some(handle) = self.active.lock().unwrap().take() {
            handle.cancel();
        }
    }
}

fn apply_event(
    core: &Mutex<TrackerCore>,
    map_view: &Mutex<MapView>,
    event: TrackerEvent,
) -> Option<LookupRequest> {
    let mut core = core.lock().unwrap();
    let lookup = core.apply(event);
    let mut map_view = map_view.lock().unwrap();
    map_view.set_recording(core.is_recording());
    if let Some(fix) = core.current() {
        map_view.set_position(fix);
    }
    map_view.replace_path(core.path());
    lookup
}

fn spawn_lookup<G: Geocoder + 'static>(
    geocoder: Arc<G>,
    events: mpsc::UnboundedSender<TrackerEvent>,
    request: LookupRequest,
) {
    tokio::spawn(async move {
        let address = geocoder
            .reverse_geocode(request.latitude, request.longitude)
            .await;
        // The pipeline may be gone by the time a lookup finishes.
        let _ = events.send(TrackerEvent::AddressResolved {
            seq: request.seq,
            address,
        });
    });
}
