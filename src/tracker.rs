use std::collections::HashMap;

use crate::position::{Fix, PositionError};
use crate::track::{self, PathPoint, TrackRecord};

/// Everything that can happen to a tracking session. The core consumes these
/// one at a time; there is no other way to mutate session state.
#[derive(Clone, Debug)]
pub enum TrackerEvent {
    TrackingStarted,
    TrackingStopped,
    RecordingToggled,
    PositionUpdated(Fix),
    SourceFailed(PositionError),
    AddressResolved { seq: u64, address: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackerState {
    /// Not subscribed to the position source.
    Idle,
    /// Subscribed, following the current position, not recording.
    Tracking,
    /// Subscribed and accumulating path/records.
    Recording,
}

/// Address lookup the driver should start for a point that was just appended
/// to the path. `seq` ties the eventual `AddressResolved` back to the
/// pending record.
#[derive(Clone, Debug, PartialEq)]
pub struct LookupRequest {
    pub seq: u64,
    pub latitude: f64,
    pub longitude: f64,
}

/// A record whose address lookup is still in flight. All display fields are
/// formatted at receipt time so the record reflects the moment of the fix.
#[derive(Clone, Debug)]
struct PendingRecord {
    timestamp: String,
    latitude: String,
    longitude: String,
    speed: String,
}

/// The tracking-session state machine.
///
/// Single-threaded reducer: `apply` is the only mutation path, so event
/// ordering and the session invariants are explicit. While recording, each
/// position update appends to `path` immediately and parks a pending record
/// until its address lookup completes; records are therefore appended in the
/// order lookups complete, not the order the fixes arrived. A lookup that
/// completes after `stop()` still appends (the data stays exportable), but a
/// recording restart clears the pending table so lookups from the previous
/// run cannot leak into the fresh session.
pub struct TrackerCore {
    state: TrackerState,
    current: Option<Fix>,
    path: Vec<PathPoint>,
    records: Vec<TrackRecord>,
    pending: HashMap<u64, PendingRecord>,
    next_seq: u64,
}

impl TrackerCore {
    pub fn new() -> Self {
        TrackerCore {
            state: TrackerState::Idle,
            current: None,
            path: Vec::new(),
            records: Vec::new(),
            pending: HashMap::new(),
            next_seq: 0,
        }
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == TrackerState::Recording
    }

    pub fn current(&self) -> Option<&Fix> {
        self.current.as_ref()
    }

    pub fn path(&self) -> &[PathPoint] {
        &self.path
    }

    pub fn records(&self) -> &[TrackRecord] {
        &self.records
    }

    /// Lookups started but not yet resolved. `path.len() == records.len()`
    /// holds whenever this is zero.
    pub fn pending_lookups(&self) -> usize {
        self.pending.len()
    }

    pub fn apply(&mut self, event: TrackerEvent) -> Option<LookupRequest> {
        match event {
            TrackerEvent::TrackingStarted => {
                if self.state == TrackerState::Idle {
                    self.state = TrackerState::Tracking;
                }
                None
            }
            TrackerEvent::TrackingStopped => {
                // The path goes away with the map view; records stay
                // exportable until the next recording start.
                self.state = TrackerState::Idle;
                self.path.clear();
                None
            }
            TrackerEvent::RecordingToggled => {
                match self.state {
                    TrackerState::Idle => {}
                    TrackerState::Tracking => {
                        // Fresh session per recording run. Clearing the
                        // pending table also discards lookups still in
                        // flight from the previous run.
                        self.path.clear();
                        self.records.clear();
                        self.pending.clear();
                        self.state = TrackerState::Recording;
                    }
                    TrackerState::Recording => {
                        self.state = TrackerState::Tracking;
                    }
                }
                None
            }
            TrackerEvent::PositionUpdated(fix) => {
                if self.state == TrackerState::Idle {
                    // Stray update from a stream cancelled moments ago.
                    return None;
                }
                let lookup = if self.state == TrackerState::Recording {
                    self.path.push(PathPoint::from(&fix));
                    let seq = self.next_seq;
                    self.next_seq += 1;
                    self.pending.insert(
                        seq,
                        PendingRecord {
                            timestamp: track::format_timestamp(&fix.timestamp),
                            latitude: track::format_coordinate(fix.latitude),
                            longitude: track::format_coordinate(fix.longitude),
                            speed: track::format_speed(fix.speed_kmh),
                        },
                    );
                    Some(LookupRequest {
                        seq,
                        latitude: fix.latitude,
                        longitude: fix.longitude,
                    })
                } else {
                    None
                };
                self.current = Some(fix);
                lookup
            }
            TrackerEvent::SourceFailed(e) => {
                // A failed fix does not end the stream.
                warn!("[tracker] position update failed: {e}");
                None
            }
            TrackerEvent::AddressResolved { seq, address } => {
                if let Some(pending) = self.pending.remove(&seq) {
                    self.records.push(TrackRecord {
                        timestamp: pending.timestamp,
                        latitude: pending.latitude,
                        longitude: pending.longitude,
                        address,
                        speed: pending.speed,
                    });
                }
                None
            }
        }
    }
}
