//! Application state shared across handlers.

use std::sync::Arc;

use hostelwatch_core::{AttendanceLedger, Coordinates, Result, ServerConfig, Storage};
use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::{error, info};

/// State handle passed to every handler.
pub type SharedState = Arc<AppState>;

/// Shared application state.
pub struct AppState {
    config: ServerConfig,
    hostel: Coordinates,
    ledger: RwLock<AttendanceLedger>,
    storage: Option<Storage>,
}

impl AppState {
    /// Create state backed by `storage`, loading any persisted ledger.
    ///
    /// # Errors
    ///
    /// Returns an error if the hostel coordinates are invalid or the ledger
    /// file exists but cannot be read.
    pub fn new(config: ServerConfig, storage: Storage) -> Result<Self> {
        let records = storage.load_ledger()?;
        info!(
            records = records.len(),
            data_dir = %storage.data_dir().display(),
            "ledger_loaded"
        );
        Self::build(config, records, Some(storage))
    }

    /// Create state with an empty ledger that is never written to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the hostel coordinates are invalid.
    pub fn in_memory(config: ServerConfig) -> Result<Self> {
        Self::build(config, Vec::new(), None)
    }

    fn build(
        config: ServerConfig,
        records: Vec<hostelwatch_core::AttendanceRecord>,
        storage: Option<Storage>,
    ) -> Result<Self> {
        let hostel = config.hostel_location()?;
        let ledger = AttendanceLedger::new(records, config.timezone);
        Ok(Self {
            config,
            hostel,
            ledger: RwLock::new(ledger),
            storage,
        })
    }

    /// Server configuration.
    pub const fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The hostel reference point.
    pub const fn hostel(&self) -> Coordinates {
        self.hostel
    }

    /// Get read access to the ledger.
    pub async fn ledger(&self) -> RwLockReadGuard<'_, AttendanceLedger> {
        self.ledger.read().await
    }

    /// Apply `change` to the ledger and persist the result when `change`
    /// reports that it modified anything.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be written.
    pub async fn update_ledger<T>(
        &self,
        change: impl FnOnce(&mut AttendanceLedger) -> (T, bool),
    ) -> Result<T> {
        let mut ledger = self.ledger.write().await;
        let (value, modified) = change(&mut ledger);
        if modified {
            if let Some(storage) = &self.storage {
                storage.save_ledger(ledger.records()).map_err(|e| {
                    error!(error = %e, "ledger_save_failed");
                    e
                })?;
            }
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_ledger_is_persisted_and_reloaded() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::new(ServerConfig::default(), Storage::new(dir.path())).unwrap();

        state
            .update_ledger(|ledger| {
                let (_, created) = ledger.open("pixel", Utc::now());
                ((), created)
            })
            .await
            .unwrap();

        let reloaded = AppState::new(ServerConfig::default(), Storage::new(dir.path())).unwrap();
        assert!(reloaded.ledger().await.open_session("pixel").is_some());
    }

    #[test]
    fn test_invalid_hostel_location_is_rejected() {
        let config = ServerConfig {
            hostel_latitude: 95.0,
            ..ServerConfig::default()
        };
        assert!(AppState::in_memory(config).is_err());
    }
}
