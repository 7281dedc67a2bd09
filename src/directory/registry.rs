//! The authoritative directory registry: an in-memory `name -> Record` map
//! with a TTL sweeper and durable JSON snapshots.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::DirectoryError;

use super::{now_unix, Record};

/// Handle to a running TTL-sweep thread.
pub struct SweeperHandle {
    stop: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl SweeperHandle {
    pub fn shutdown(mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

pub struct Registry {
    records: Mutex<HashMap<String, Record>>,
    snapshot_path: PathBuf,
}

impl Registry {
    /// Loads a snapshot from `snapshot_path` if it exists and parses; a
    /// missing or malformed file is treated as an empty registry.
    pub fn load(snapshot_path: PathBuf) -> Self {
        let records = std::fs::read_to_string(&snapshot_path)
            .ok()
            .and_then(|contents| serde_json::from_str(&contents).ok())
            .unwrap_or_default();
        tracing::info!(count = records_len(&records), path = %snapshot_path.display(), "loaded directory snapshot");
        Self {
            records: Mutex::new(records),
            snapshot_path,
        }
    }

    pub fn register(
        &self,
        name: &str,
        ip: String,
        port: i64,
        ttl: i64,
    ) -> Result<Record, DirectoryError> {
        if !(0..=65535).contains(&port) {
            return Err(DirectoryError::InvalidPort(port));
        }
        let record = Record {
            name: name.to_string(),
            ip,
            port: port as u16,
            expires_at: now_unix() + ttl,
        };
        self.records
            .lock()
            .unwrap()
            .insert(name.to_string(), record.clone());
        self.persist();
        tracing::debug!(name, port, ttl, "registered");
        Ok(record)
    }

    /// Returns the stored Record regardless of server-side freshness — the
    /// sweeper, not `query`, is what removes stale entries.
    pub fn query(&self, name: &str) -> Result<Record, DirectoryError> {
        self.records
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or(DirectoryError::NotFound)
    }

    pub fn deregister(&self, name: &str) -> Result<(), DirectoryError> {
        let removed = self.records.lock().unwrap().remove(name);
        if removed.is_some() {
            self.persist();
            tracing::debug!(name, "deregistered");
            Ok(())
        } else {
            Err(DirectoryError::NotFound)
        }
    }

    /// Deletes every entry with `expires_at <= now`, persisting a snapshot
    /// if anything changed.
    pub fn sweep(&self) {
        let now = now_unix();
        let removed = {
            let mut records = self.records.lock().unwrap();
            let before = records.len();
            records.retain(|_, r| !r.is_expired(now));
            before != records.len()
        };
        if removed {
            self.persist();
            tracing::debug!("swept expired directory entries");
        }
    }

    fn persist(&self) {
        let records = self.records.lock().unwrap();
        match serde_json::to_string_pretty(&*records) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&self.snapshot_path, json) {
                    tracing::warn!(error = %e, path = %self.snapshot_path.display(), "failed to persist directory snapshot");
                }
            }
            Err(e) => tracing::warn!(error = %e, "failed to serialize directory snapshot"),
        }
    }

    /// Spawns the periodic sweep thread, running every `interval` until
    /// `shutdown()` is called on the returned handle.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> SweeperHandle {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_for_loop = stop.clone();
        let registry = self.clone();
        let join = thread::spawn(move || {
            while !stop_for_loop.load(Ordering::SeqCst) {
                thread::sleep(interval);
                if stop_for_loop.load(Ordering::SeqCst) {
                    break;
                }
                registry.sweep();
            }
        });
        SweeperHandle {
            stop,
            join: Some(join),
        }
    }
}

fn records_len(records: &HashMap<String, Record>) -> usize {
    records.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn registry() -> (Arc<Registry>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("registry.json");
        (Arc::new(Registry::load(path)), dir)
    }

    #[test]
    fn register_then_query_returns_same_record() {
        let (reg, _dir) = registry();
        let record = reg.register("svc", "127.0.0.1".into(), 9000, 60).unwrap();
        let queried = reg.query("svc").unwrap();
        assert_eq!(record, queried);
    }

    #[test]
    fn query_missing_name_is_not_found() {
        let (reg, _dir) = registry();
        assert!(matches!(reg.query("nope"), Err(DirectoryError::NotFound)));
    }

    #[test]
    fn register_overwrites_existing_entry() {
        let (reg, _dir) = registry();
        reg.register("svc", "127.0.0.1".into(), 9000, 60).unwrap();
        let second = reg.register("svc", "127.0.0.1".into(), 9001, 60).unwrap();
        assert_eq!(reg.query("svc").unwrap().port, second.port);
    }

    #[test]
    fn deregister_removes_entry() {
        let (reg, _dir) = registry();
        reg.register("svc", "127.0.0.1".into(), 9000, 60).unwrap();
        reg.deregister("svc").unwrap();
        assert!(matches!(reg.query("svc"), Err(DirectoryError::NotFound)));
    }

    #[test]
    fn deregister_missing_name_is_not_found() {
        let (reg, _dir) = registry();
        assert!(matches!(reg.deregister("nope"), Err(DirectoryError::NotFound)));
    }

    #[test]
    fn out_of_range_port_is_rejected() {
        let (reg, _dir) = registry();
        let err = reg.register("svc", "127.0.0.1".into(), 70000, 60).unwrap_err();
        assert!(matches!(err, DirectoryError::InvalidPort(70000)));
    }

    #[test]
    fn sweep_removes_expired_entries() {
        let (reg, _dir) = registry();
        reg.register("svc", "127.0.0.1".into(), 9000, -1).unwrap();
        reg.sweep();
        assert!(matches!(reg.query("svc"), Err(DirectoryError::NotFound)));
    }

    #[test]
    fn snapshot_persists_across_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("registry.json");
        {
            let reg = Arc::new(Registry::load(path.clone()));
            reg.register("svc", "127.0.0.1".into(), 9000, 3600).unwrap();
        }
        let reloaded = Registry::load(path);
        let record = reloaded.query("svc").unwrap();
        assert_eq!(record.port, 9000);
    }
}
