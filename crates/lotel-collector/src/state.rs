use std::fs;
use std::io;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use lotel_core::error::{LotelError, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Persisted description of the collector child currently under
/// supervision. Absence of the record on disk means no collector is
/// considered managed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StateRecord {
    pub pid: i32,
    pub binary: PathBuf,
    pub started_at: DateTime<Utc>,
    pub config_path: PathBuf,
    pub data_path: PathBuf,
}

/// Single-record store with atomic replacement: a concurrent reader sees
/// either the old record in full or the new one, never a partial write.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Reads the current record. An unparseable file is treated like a
    /// stale one: removed and reported as absent.
    pub fn read(&self) -> Result<Option<StateRecord>> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(LotelError::State(format!("reading state file: {e}"))),
        };

        match serde_json::from_slice(&raw) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "discarding unparseable state file");
                self.remove()?;
                Ok(None)
            }
        }
    }

    pub fn write(&self, record: &StateRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| LotelError::State(format!("creating state directory: {e}")))?;
        }

        let data = serde_json::to_vec(record)
            .map_err(|e| LotelError::State(format!("serializing state: {e}")))?;

        // Temp file in the same directory, then rename over the canonical
        // path, so the replacement is atomic even across crashes.
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, data).map_err(|e| LotelError::State(format!("writing state file: {e}")))?;
        fs::rename(&tmp, &self.path)
            .map_err(|e| LotelError::State(format!("replacing state file: {e}")))
    }

    /// Best-effort delete; a missing file is not an error.
    pub fn remove(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LotelError::State(format!("removing state file: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pid: i32) -> StateRecord {
        StateRecord {
            pid,
            binary: PathBuf::from("/usr/bin/otelcol-contrib"),
            started_at: Utc::now(),
            config_path: PathBuf::from("/tmp/collector-config.yaml"),
            data_path: PathBuf::from("/tmp/data"),
        }
    }

    #[test]
    fn read_returns_none_before_any_write() {
        let tmp = tempfile::tempdir().unwrap();
        let store = StateStore::new(tmp.path().join("collector.state"));
        assert_eq!(store.read().unwrap(), None);
    }

    #[test]
    fn write_read_remove_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let store = StateStore::new(tmp.path().join("collector.state"));

        let rec = record(12345);
        store.write(&rec).unwrap();
        assert_eq!(store.read().unwrap(), Some(rec));

        store.remove().unwrap();
        assert_eq!(store.read().unwrap(), None);
        // Removing again is fine.
        store.remove().unwrap();
    }

    #[test]
    fn read_observes_the_last_write() {
        let tmp = tempfile::tempdir().unwrap();
        let store = StateStore::new(tmp.path().join("collector.state"));

        store.write(&record(1)).unwrap();
        store.write(&record(2)).unwrap();
        assert_eq!(store.read().unwrap().unwrap().pid, 2);
    }

    #[test]
    fn corrupt_state_is_discarded() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("collector.state");
        fs::write(&path, "{ definitely not json").unwrap();

        let store = StateStore::new(path.clone());
        assert_eq!(store.read().unwrap(), None);
        assert!(!path.exists());
    }

    #[test]
    fn write_leaves_no_temp_file_behind() {
        let tmp = tempfile::tempdir().unwrap();
        let store = StateStore::new(tmp.path().join("collector.state"));
        store.write(&record(7)).unwrap();

        let entries: Vec<_> = fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("collector.state")]);
    }
}
