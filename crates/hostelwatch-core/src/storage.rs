//! Persistent storage using JSON files.
//!
//! Two documents live under the data directory:
//!
//! ```text
//! <data_dir>/marks.json         tracker-side MarkState (last entry mark)
//! <data_dir>/attendance.json    backend-side attendance ledger
//! ```
//!
//! Writes go to a temporary sibling first and are renamed into place.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::attendance::MarkState;
use crate::types::AttendanceRecord;

const MARKS_FILE: &str = "marks.json";
const LEDGER_FILE: &str = "attendance.json";

/// Errors from reading or writing persisted state.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A file exists but could not be read.
    #[error("failed to read {}: {source}", path.display())]
    ReadError {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// A file could not be written or moved into place.
    #[error("failed to write {}: {source}", path.display())]
    WriteError {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// A file's contents are not valid JSON for the expected type.
    #[error("failed to parse {}: {source}", path.display())]
    ParseError {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        source: serde_json::Error,
    },

    /// A value could not be serialized.
    #[error("failed to serialize: {0}")]
    SerializeError(#[from] serde_json::Error),

    /// The data directory could not be created.
    #[error("failed to create directory {}: {source}", path.display())]
    CreateDirError {
        /// Directory that failed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
}

/// Storage backend for hostelwatch data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Storage {
    data_dir: PathBuf,
}

impl Storage {
    /// Create a new storage instance rooted at `data_dir`.
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Directory holding the data files.
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Load the tracker's mark state. A missing file yields the empty state.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_mark_state(&self) -> Result<MarkState, StorageError> {
        self.read_or_default(MARKS_FILE)
    }

    /// Persist the tracker's mark state.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_mark_state(&self, state: &MarkState) -> Result<(), StorageError> {
        self.write(MARKS_FILE, state)
    }

    /// Load all attendance records. A missing file yields an empty ledger.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_ledger(&self) -> Result<Vec<AttendanceRecord>, StorageError> {
        self.read_or_default(LEDGER_FILE)
    }

    /// Persist all attendance records.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_ledger(&self, records: &[AttendanceRecord]) -> Result<(), StorageError> {
        self.write(LEDGER_FILE, records)
    }

    fn read_or_default<T: DeserializeOwned + Default>(
        &self,
        file: &str,
    ) -> Result<T, StorageError> {
        let path = self.data_dir.join(file);
        if !path.exists() {
            return Ok(T::default());
        }
        let content = std::fs::read_to_string(&path).map_err(|source| StorageError::ReadError {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| StorageError::ParseError { path, source })
    }

    fn write<T: Serialize + ?Sized>(&self, file: &str, value: &T) -> Result<(), StorageError> {
        std::fs::create_dir_all(&self.data_dir).map_err(|source| StorageError::CreateDirError {
            path: self.data_dir.clone(),
            source,
        })?;

        let path = self.data_dir.join(file);
        let tmp = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(value)?;

        std::fs::write(&tmp, content).map_err(|source| StorageError::WriteError {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, &path).map_err(|source| StorageError::WriteError { path, source })
    }
}

/// Get the default data directory.
///
/// Uses the platform data directory (`~/.local/share/hostelwatch` on Linux),
/// falling back to `./data`.
#[must_use]
pub fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "hostelwatch")
        .map_or_else(|| PathBuf::from("./data"), |dirs| dirs.data_dir().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    #[test]
    fn test_missing_files_load_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path().join("nested"));

        assert_eq!(storage.load_mark_state().unwrap(), MarkState::default());
        assert!(storage.load_ledger().unwrap().is_empty());
    }

    #[test]
    fn test_mark_state_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path());
        let marked = MarkState {
            last_marked_at: Some(Utc.with_ymd_and_hms(2025, 1, 15, 18, 30, 0).unwrap()),
        };

        storage.save_mark_state(&marked).unwrap();

        let reopened = Storage::new(dir.path());
        assert_eq!(reopened.load_mark_state().unwrap(), marked);
        assert!(!dir.path().join("marks.json.tmp").exists());
    }

    #[test]
    fn test_ledger_round_trip_keeps_order() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path());
        let entry = Utc.with_ymd_and_hms(2025, 1, 15, 8, 0, 0).unwrap();
        let records = vec![
            AttendanceRecord {
                id: Uuid::now_v7(),
                user_id: "a".into(),
                entry_time: entry,
                exit_time: Some(entry + chrono::Duration::hours(2)),
                duration: Some(7200),
            },
            AttendanceRecord {
                id: Uuid::now_v7(),
                user_id: "b".into(),
                entry_time: entry,
                exit_time: None,
                duration: None,
            },
        ];

        storage.save_ledger(&records).unwrap();
        assert_eq!(storage.load_ledger().unwrap(), records);
    }

    #[test]
    fn test_corrupt_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marks.json"), "{not json").unwrap();

        let err = Storage::new(dir.path()).load_mark_state().unwrap_err();
        assert!(matches!(err, StorageError::ParseError { .. }));
    }

    #[test]
    fn test_default_data_dir_is_not_empty() {
        assert!(!default_data_dir().as_os_str().is_empty());
    }
}
