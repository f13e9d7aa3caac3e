use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use chrono::Local;
use serde::Deserialize;

use super::{ActiveSubscription, PositionSource, SourceEvent, Subscription};
use crate::position::{Fix, FixRequest, PositionError};

// Replay pacing never waits longer than this between fixes, even if the
// recorded log has a large gap.
const MAX_GAP: Duration = Duration::from_secs(10);

#[derive(Clone, Debug, Deserialize)]
struct ReplayRow {
    timestamp_ms: i64,
    latitude: f64,
    longitude: f64,
    accuracy: Option<f32>,
    speed: Option<f64>,
}

/// Replays a recorded fix log from a CSV file
/// (`timestamp_ms,latitude,longitude,accuracy,speed`, speed in m/s).
///
/// Fixes are re-stamped with the wall clock at emit time; the recorded
/// timestamps only drive the pacing when no fixed interval is given. The
/// stream ends when the log runs out.
pub struct CsvReplaySource {
    rows: Vec<ReplayRow>,
    interval: Option<Duration>,
    active: ActiveSubscription,
}

impl CsvReplaySource {
    pub fn open(path: &Path, interval: Option<Duration>) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)?;
        let rows: Vec<ReplayRow> = reader.deserialize().collect::<Result<_, _>>()?;
        ensure!(!rows.is_empty(), "replay file {} has no fixes", path.display());
        Ok(CsvReplaySource {
            rows,
            interval,
            active: ActiveSubscription::new(),
        })
    }

    fn fix_from(row: &ReplayRow) -> Fix {
        Fix::new(
            row.latitude,
            row.longitude,
            row.speed,
            row.accuracy,
            Local::now(),
        )
    }

    fn delay_between(&self, previous: &ReplayRow, next: &ReplayRow) -> Duration {
        match self.interval {
            Some(interval) => interval,
            None => {
                let gap_ms = (next.timestamp_ms - previous.timestamp_ms).max(0) as u64;
                Duration::from_millis(gap_ms).min(MAX_GAP)
            }
        }
    }
}

impl PositionSource for CsvReplaySource {
    async fn current_position(&self, _request: &FixRequest) -> Result<Fix, PositionError> {
        match self.rows.first() {
            Some(row) => Ok(Self::fix_from(row)),
            None => Err(PositionError::Unavailable("replay log is empty".into())),
        }
    }

    fn subscribe(&self, _request: &FixRequest) -> Subscription {
        let (tx, subscription) = self.active.begin();
        let handle = subscription.handle.clone();
        let mut delays = Vec::with_capacity(self.rows.len());
        let first_delay = self.interval.unwrap_or(Duration::ZERO);
        for (i, row) in self.rows.iter().enumerate() {
            let delay = if i == 0 {
                first_delay
            } else {
                self.delay_between(&self.rows[i - 1], row)
            };
            delays.push((delay, row.clone()));
        }
        tokio::spawn(async move {
            for (delay, row) in delays {
                tokio::time::sleep(delay).await;
                if handle.is_cancelled() {
                    return;
                }
                let fix = CsvReplaySource::fix_from(&row);
                if tx.send(SourceEvent::Fix(fix)).is_err() {
                    return;
                }
            }
            // log exhausted, the stream simply ends
        });
        subscription
    }
}
