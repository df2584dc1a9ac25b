//! JSON file ledger store.
//!
//! Layout: `{"trades": [...], "fiat_balance": f|null, "asset_balance": f|null}`.
//! A bare array of trades (the older layout) is read as `trades` with null
//! balances and written back in the structured layout on the next save.

use crate::domain::error::PaperTraderError;
use crate::domain::ledger::LedgerState;
use crate::ports::ledger_store_port::LedgerStore;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parent_dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    fn write_atomically(&self, bytes: &[u8]) -> io::Result<()> {
        let dir = self.parent_dir();
        fs::create_dir_all(&dir)?;
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(bytes)?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl LedgerStore for JsonFileStore {
    fn load(&self) -> LedgerState {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no ledger file, starting empty");
                return LedgerState::default();
            }
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "unreadable ledger file, starting empty"
                );
                return LedgerState::default();
            }
        };

        if content.trim().is_empty() {
            return LedgerState::default();
        }

        match serde_json::from_str::<LedgerState>(&content) {
            Ok(state) => state,
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "corrupt ledger file, starting empty"
                );
                LedgerState::default()
            }
        }
    }

    fn save(&self, state: &LedgerState) -> Result<(), PaperTraderError> {
        let json = serde_json::to_vec_pretty(state).map_err(|e| PaperTraderError::Storage {
            reason: format!("failed to encode ledger: {}", e),
        })?;
        self.write_atomically(&json)
            .map_err(|e| PaperTraderError::Storage {
                reason: format!("failed to write {}: {}", self.path.display(), e),
            })?;
        debug!(path = %self.path.display(), trades = state.trades.len(), "ledger saved");
        Ok(())
    }
}
