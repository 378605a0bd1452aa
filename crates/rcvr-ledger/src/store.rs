//! ---
//! rcvr_section: "03-persistence-logging"
//! rcvr_subsection: "module"
//! rcvr_type: "source"
//! rcvr_scope: "code"
//! rcvr_description: "Whole-document JSON persistence for recovery state."
//! rcvr_version: "v0.0.0-prealpha"
//! rcvr_owner: "tbd"
//! ---
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::state::RecoveryState;
use crate::{LedgerError, Result};

/// Current ledger document version.
pub const LEDGER_VERSION: u16 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct LedgerDocument {
    #[serde(default)]
    version: u16,
    #[serde(default)]
    saved_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    state: RecoveryState,
}

/// JSON ledger at a fixed path. Every save rewrites the whole document after
/// folding in records another process has written since.
#[derive(Debug, Clone)]
pub struct IncidentLedger {
    path: PathBuf,
}

impl IncidentLedger {
    /// Ledger stored at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the ledger document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the ledger, falling back to empty defaults when the document is
    /// missing or unreadable.
    pub fn load(&self) -> RecoveryState {
        match self.try_load() {
            Ok(Some(state)) => {
                debug!(
                    path = %self.path.display(),
                    active = state.active_incidents.len(),
                    history = state.recovery_history.len(),
                    "recovery ledger loaded"
                );
                state
            }
            Ok(None) => {
                debug!(path = %self.path.display(), "no recovery ledger found; starting empty");
                RecoveryState::default()
            }
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "recovery ledger unreadable; starting empty");
                RecoveryState::default()
            }
        }
    }

    /// Strict variant of [`IncidentLedger::load`]: `Ok(None)` when the file does not exist.
    pub fn try_load(&self) -> Result<Option<RecoveryState>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(LedgerError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        let document: LedgerDocument = serde_json::from_slice(&bytes)?;
        Ok(Some(document.state))
    }

    /// Write `state` merged with the document currently on disk (see
    /// [`RecoveryState::absorb`]), so incidents recorded by another process
    /// sharing this path are kept. The document is written to a sibling
    /// temporary file and renamed into place.
    pub fn save(&self, state: &RecoveryState) -> Result<()> {
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| LedgerError::Io { path, source }
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_err(parent))?;
            }
        }

        let mut merged = state.clone();
        match self.try_load() {
            Ok(Some(on_disk)) => merged.absorb(on_disk),
            Ok(None) => {}
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "existing ledger unreadable; overwriting");
            }
        }

        let document = LedgerDocument {
            version: LEDGER_VERSION,
            saved_at: Some(Utc::now()),
            state: merged,
        };
        let json = serde_json::to_vec_pretty(&document)?;

        let tmp_path = self.temp_path();
        {
            let mut file = fs::File::create(&tmp_path).map_err(io_err(&tmp_path))?;
            file.write_all(&json).map_err(io_err(&tmp_path))?;
            file.sync_all().map_err(io_err(&tmp_path))?;
        }
        fs::rename(&tmp_path, &self.path).map_err(io_err(&self.path))?;
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| "ledger.json".into());
        name.push(format!(".{}.tmp", std::process::id()));
        self.path.with_file_name(name)
    }
}
