//! Ledger Snapshot Persistence
//!
//! Optional crash/restart support: the whole ledger serializes to a JSON
//! file and restores on startup. The engine is correct without it; a missing
//! or corrupted snapshot degrades to a fresh ledger.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use super::ledger::Ledger;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("Failed to serialize ledger snapshot: {0}")]
    Serialize(String),
    #[error("Failed to deserialize ledger snapshot: {0}")]
    Deserialize(String),
    #[error("Failed to write snapshot file: {0}")]
    Write(String),
    #[error("Failed to read snapshot file: {0}")]
    Read(String),
}

/// Ledger state plus the moment it was written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub saved_at: DateTime<Utc>,
    pub ledger: Ledger,
}

impl LedgerSnapshot {
    pub fn new(ledger: Ledger) -> Self {
        Self {
            saved_at: Utc::now(),
            ledger,
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), PersistError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| PersistError::Write(e.to_string()))?;
            }
        }

        let content =
            serde_json::to_string_pretty(self).map_err(|e| PersistError::Serialize(e.to_string()))?;
        fs::write(path, content).map_err(|e| PersistError::Write(e.to_string()))?;

        info!(
            path = %path.display(),
            open_positions = self.ledger.open_count(),
            "ledger snapshot saved"
        );
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Option<Self>, PersistError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(path).map_err(|e| PersistError::Read(e.to_string()))?;
        if content.trim().is_empty() {
            return Ok(None);
        }

        let snapshot: Self =
            serde_json::from_str(&content).map_err(|e| PersistError::Deserialize(e.to_string()))?;
        info!(
            path = %path.display(),
            saved_at = %snapshot.saved_at,
            open_positions = snapshot.ledger.open_count(),
            "ledger snapshot loaded"
        );
        Ok(Some(snapshot))
    }

    /// Load if present and intact; anything else falls back to `fresh` with
    /// a warning rather than refusing to start.
    pub fn restore_or(path: &Path, fresh: Ledger) -> Ledger {
        match Self::load(path) {
            Ok(Some(snapshot)) => snapshot.ledger,
            Ok(None) => fresh,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "snapshot unreadable, starting fresh");
                fresh
            }
        }
    }
}
