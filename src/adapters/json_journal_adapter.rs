//! JSON file position journal.
//!
//! The journal is a JSON array of position records. Saves go through a
//! sibling temp file and a rename so a crash never leaves a half-written file.

use crate::domain::error::{JournalError, TradetermError};
use crate::domain::journal::PositionRecord;
use crate::ports::journal_port::JournalPort;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub struct JsonJournalAdapter {
    path: PathBuf,
}

impl JsonJournalAdapter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl JournalPort for JsonJournalAdapter {
    fn load(&self) -> Result<Vec<PositionRecord>, TradetermError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no journal yet");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&content).map_err(|e| {
            JournalError::Decode(format!("{}: {}", self.path.display(), e)).into()
        })
    }

    fn save(&self, records: &[PositionRecord]) -> Result<(), TradetermError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(records)
            .map_err(|e| JournalError::Decode(e.to_string()))?;
        let tmp = self.temp_path();
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        tracing::debug!(path = %self.path.display(), records = records.len(), "journal saved");
        Ok(())
    }
}
