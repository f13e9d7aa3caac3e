use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use thiserror::Error;

use crate::track::TrackRecord;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("no tracking data available, record a path first")]
    NoRecords,
    #[error("failed to write export file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize records: {0}")]
    Csv(#[from] csv::Error),
}

pub struct ExportedFile {
    pub path: PathBuf,
    pub records: usize,
}

/// File names embed the export date plus a millisecond token, so repeated
/// exports in one session never collide.
pub fn export_file_name(now: &DateTime<Local>) -> String {
    format!(
        "location_tracking_{}_{}.csv",
        now.format("%Y-%m-%d"),
        now.timestamp_millis()
    )
}

pub fn write_records<W: Write>(records: &[TrackRecord], writer: W) -> Result<(), ExportError> {
    let mut writer = csv::Writer::from_writer(writer);
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the recorded dataset to a CSV file in `out_dir`. Refuses to produce
/// an empty file; the accumulated records are never touched either way.
pub fn export_records(records: &[TrackRecord], out_dir: &Path) -> Result<ExportedFile, ExportError> {
    if records.is_empty() {
        return Err(ExportError::NoRecords);
    }
    let path = out_dir.join(export_file_name(&Local::now()));
    write_records(records, File::create(&path)?)?;
    info!("[export] wrote {} records to {}", records.len(), path.display());
    Ok(ExportedFile {
        path,
        records: records.len(),
    })
}
