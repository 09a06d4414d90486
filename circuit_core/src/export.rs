//! CSV export of workout history.
//!
//! Produces one flat row per completed workout for spreadsheets.

use crate::{CompletionRecord, Result};
use std::path::Path;

/// A row in the CSV output
#[derive(Debug, serde::Serialize)]
struct CsvRow {
    id: String,
    plan_id: String,
    plan_name: String,
    started_at: String,
    completed_at: String,
    duration_minutes: f64,
    splits: usize,
    split_seconds_total: f64,
    rounds_completed: u32,
    early: bool,
    avg_hr: Option<f64>,
    max_hr: Option<f64>,
}

impl From<&CompletionRecord> for CsvRow {
    fn from(record: &CompletionRecord) -> Self {
        CsvRow {
            id: record.id.to_string(),
            plan_id: record.plan_id.clone(),
            plan_name: record.plan_name.clone(),
            started_at: record.started_at.to_rfc3339(),
            completed_at: record.completed_at.to_rfc3339(),
            duration_minutes: record.duration_minutes,
            splits: record.splits.len(),
            split_seconds_total: record.splits.iter().map(|s| s.duration_seconds).sum(),
            rounds_completed: record.rounds_completed,
            early: record.early,
            avg_hr: record.heart_rate.as_ref().map(|hr| hr.average_bpm),
            max_hr: record.heart_rate.as_ref().map(|hr| hr.max_bpm),
        }
    }
}

/// Write `records` to a fresh CSV file at `csv_path`
///
/// The file is replaced if it exists and synced to disk before returning.
/// Returns the number of rows written.
pub fn export_csv(records: &[CompletionRecord], csv_path: &Path) -> Result<usize> {
    if let Some(parent) = csv_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = csv::WriterBuilder::new()
        .has_headers(true)
        .from_path(csv_path)?;

    for record in records {
        writer.serialize(CsvRow::from(record))?;
    }

    writer.flush()?;
    let file = writer
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    file.sync_all()?;

    tracing::info!("Exported {} workouts to {:?}", records.len(), csv_path);
    Ok(records.len())
}
