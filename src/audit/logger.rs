//! Append-only JSONL audit log
//!
//! One entry per line. Appends take a process-wide lock because request
//! handlers log concurrently; reads scan the whole file.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use crate::error::{EnvelopeError, EnvelopeResult};
use crate::models::BudgetId;

use super::entry::AuditEntry;

pub struct AuditLogger {
    path: PathBuf,
    append_lock: Mutex<()>,
}

impl AuditLogger {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            append_lock: Mutex::new(()),
        }
    }

    pub fn log(&self, entry: &AuditEntry) -> EnvelopeResult<()> {
        let mut line = serde_json::to_string(entry)
            .map_err(|e| EnvelopeError::Json(format!("Failed to serialize audit entry: {}", e)))?;
        line.push('\n');

        let _guard = self
            .append_lock
            .lock()
            .map_err(|_| EnvelopeError::Storage("Audit log lock poisoned".into()))?;

        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| file.write_all(line.as_bytes()))
            .map_err(|e| EnvelopeError::Io(format!("Failed to append to audit log: {}", e)))
    }

    /// Every entry, oldest first; a missing log reads as empty
    fn read_all(&self) -> EnvelopeResult<Vec<AuditEntry>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(EnvelopeError::Io(format!("Failed to open audit log: {}", e))),
        };

        let mut entries = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| EnvelopeError::Io(format!("Failed to read audit log: {}", e)))?;
            if line.trim().is_empty() {
                continue;
            }
            let entry = serde_json::from_str(&line).map_err(|e| {
                EnvelopeError::Json(format!("Bad audit entry on line {}: {}", index + 1, e))
            })?;
            entries.push(entry);
        }
        Ok(entries)
    }

    /// The last `count` entries, oldest first
    pub fn read_recent(&self, count: usize) -> EnvelopeResult<Vec<AuditEntry>> {
        let mut entries = self.read_all()?;
        let keep_from = entries.len().saturating_sub(count);
        Ok(entries.split_off(keep_from))
    }

    /// The last `count` entries recorded against one budget, newest first
    pub fn read_for_budget(&self, budget_id: BudgetId, count: usize) -> EnvelopeResult<Vec<AuditEntry>> {
        let mut entries = self.read_all()?;
        entries.retain(|e| e.budget_id == Some(budget_id));
        entries.reverse();
        entries.truncate(count);
        Ok(entries)
    }
}
