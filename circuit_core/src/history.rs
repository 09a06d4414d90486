//! Workout history store.
//!
//! Completed workouts are appended to a JSONL (JSON Lines) file with file
//! locking so the CLI and any other process can share it safely.

use crate::collaborators::PersistenceSink;
use crate::{CompletionRecord, Error, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// JSONL-backed history with file locking
#[derive(Clone, Debug)]
pub struct JsonlHistory {
    path: PathBuf,
}

impl JsonlHistory {
    /// Create a history store for the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a record as one JSON line
    pub fn append(&self, record: &CompletionRecord) -> Result<()> {
        self.ensure_parent_dir()?;

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)?;

        file.lock_exclusive()?;

        if !ends_with_newline(&file)? {
            tracing::warn!(
                "History {:?} ends in a partial line; starting a new line",
                self.path
            );
            (&file).write_all(b"\n")?;
        }

        let mut writer = std::io::BufWriter::new(&file);
        let line = serde_json::to_string(record)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        drop(writer);

        file.sync_data()?;
        file.unlock()?;

        tracing::debug!("Appended workout {} to {:?}", record.id, self.path);
        Ok(())
    }

    /// Read every record in the store
    pub fn read_all(&self) -> Result<Vec<CompletionRecord>> {
        read_history(&self.path)
    }

    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

/// True for an empty file or one whose last byte is `\n`
fn ends_with_newline(file: &File) -> Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(true);
    }
    let mut reader = file;
    reader.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    reader.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

impl PersistenceSink for JsonlHistory {
    fn save(&mut self, record: &CompletionRecord) -> Result<()> {
        self.append(record)
            .map_err(|e| Error::Persist(format!("{}: {}", self.path.display(), e)))
    }
}

/// Read all records from a history file, oldest first
///
/// A missing file is an empty history. Lines that fail to parse are
/// skipped with a warning.
pub fn read_history(path: &Path) -> Result<Vec<CompletionRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    file.lock_shared()?;

    let reader = BufReader::new(&file);
    let mut records = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<CompletionRecord>(&line) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!("Skipping history line {}: {}", line_num + 1, e);
            }
        }
    }

    file.unlock()?;
    tracing::debug!("Read {} workouts from {:?}", records.len(), path);
    Ok(records)
}

/// Most recent `limit` records, newest first
pub fn recent(records: &[CompletionRecord], limit: usize) -> Vec<&CompletionRecord> {
    let mut sorted: Vec<_> = records.iter().collect();
    sorted.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
    sorted.truncate(limit);
    sorted
}
