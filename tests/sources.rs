use std::io::Write;
use std::time::Duration;

use tempdir::TempDir;
use waypath::position::FixRequest;
use waypath::sources::{CsvReplaySource, PositionSource, SimulatedSource, SourceEvent};

fn simulated() -> SimulatedSource {
    SimulatedSource::new(12.9716, 77.5946, Duration::from_millis(10))
}

#[tokio::test]
async fn simulated_source_walks_from_its_start_coordinate() {
    let source = simulated();
    let mut subscription = source.subscribe(&FixRequest::streaming());

    let mut fixes = Vec::new();
    while fixes.len() < 3 {
        match subscription.events.recv().await {
            Some(SourceEvent::Fix(fix)) => fixes.push(fix),
            Some(SourceEvent::Error(e)) => panic!("unexpected source error: {e}"),
            None => panic!("stream ended early"),
        }
    }
    subscription.handle.cancel();

    for fix in &fixes {
        assert!((fix.latitude - 12.9716).abs() < 0.1);
        assert!(fix.longitude > 77.5946);
        assert!(fix.speed_kmh > 0.0);
    }
    // walking east, one step per fix
    assert!(fixes[1].longitude > fixes[0].longitude);
}

#[tokio::test]
async fn simulated_one_shot_returns_the_start() {
    let source = simulated();
    let fix = source
        .current_position(&FixRequest::one_shot())
        .await
        .unwrap();
    assert_eq!(fix.latitude, 12.9716);
    assert_eq!(fix.longitude, 77.5946);
    assert_eq!(fix.speed_kmh, 0.0);
}

#[tokio::test]
async fn resubscribing_cancels_the_previous_stream() {
    let source = simulated();
    let first = source.subscribe(&FixRequest::streaming());
    let second = source.subscribe(&FixRequest::streaming());

    assert!(first.handle.is_cancelled());
    assert!(!second.handle.is_cancelled());
    second.handle.cancel();
}

#[tokio::test]
async fn cancelling_an_already_stopped_stream_is_a_noop() {
    let source = simulated();
    let subscription = source.subscribe(&FixRequest::streaming());
    subscription.handle.cancel();
    subscription.handle.cancel();
    assert!(subscription.handle.is_cancelled());
}

fn write_replay_file(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("fixes.csv");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "timestamp_ms,latitude,longitude,accuracy,speed").unwrap();
    writeln!(file, "1697349116000,12.971599,77.594566,3.9,2.78").unwrap();
    writeln!(file, "1697349117000,12.971700,77.594600,4.2,1.50").unwrap();
    writeln!(file, "1697349118000,12.971800,77.594700,,").unwrap();
    path
}

#[tokio::test]
async fn replay_source_emits_every_row_then_ends() {
    let dir = TempDir::new("waypath_replay").unwrap();
    let path = write_replay_file(&dir);
    let source = CsvReplaySource::open(&path, Some(Duration::from_millis(5))).unwrap();

    let mut subscription = source.subscribe(&FixRequest::streaming());
    let mut fixes = Vec::new();
    while let Some(event) = subscription.events.recv().await {
        match event {
            SourceEvent::Fix(fix) => fixes.push(fix),
            SourceEvent::Error(e) => panic!("unexpected source error: {e}"),
        }
    }

    assert_eq!(fixes.len(), 3);
    assert_eq!(fixes[0].latitude, 12.971599);
    assert_eq!(fixes[0].speed_kmh, 10.01); // 2.78 m/s
    assert_eq!(fixes[2].speed_kmh, 0.0); // missing speed collapses to zero
    assert_eq!(fixes[2].accuracy_m, None);
}

#[tokio::test]
async fn replay_one_shot_reads_the_first_row() {
    let dir = TempDir::new("waypath_replay").unwrap();
    let path = write_replay_file(&dir);
    let source = CsvReplaySource::open(&path, None).unwrap();
    let fix = source
        .current_position(&FixRequest::one_shot())
        .await
        .unwrap();
    assert_eq!(fix.latitude, 12.971599);
}

#[test]
fn replay_refuses_missing_or_empty_files() {
    let dir = TempDir::new("waypath_replay").unwrap();
    assert!(CsvReplaySource::open(&dir.path().join("nope.csv"), None).is_err());

    let empty = dir.path().join("empty.csv");
    std::fs::write(&empty, "timestamp_ms,latitude,longitude,accuracy,speed\n").unwrap();
    assert!(CsvReplaySource::open(&empty, None).is_err());
}
