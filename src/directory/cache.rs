//! Thread-safe client-side record cache with expiry-on-read
//! with expiry-on-read.

use std::collections::HashMap;
use std::sync::Mutex;

use super::{now_unix, Record};

pub struct RecordCache {
    inner: Mutex<HashMap<String, Record>>,
}

impl RecordCache {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Returns `None` if the entry is missing or `expires_at <= now`.
    pub fn get(&self, name: &str) -> Option<Record> {
        let map = self.inner.lock().unwrap();
        let record = map.get(name)?;
        if record.is_expired(now_unix()) {
            return None;
        }
        Some(record.clone())
    }

    pub fn put(&self, record: Record) {
        self.inner.lock().unwrap().insert(record.name.clone(), record);
    }

    pub fn remove(&self, name: &str) {
        self.inner.lock().unwrap().remove(name);
    }
}

impl Default for RecordCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expired_entry_reads_as_absent() {
        let cache = RecordCache::new();
        cache.put(Record {
            name: "svc".into(),
            ip: "127.0.0.1".into(),
            port: 9000,
            expires_at: now_unix() - 1,
        });
        assert!(cache.get("svc").is_none());
    }

    #[test]
    fn fresh_entry_is_returned() {
        let cache = RecordCache::new();
        cache.put(Record {
            name: "svc".into(),
            ip: "127.0.0.1".into(),
            port: 9000,
            expires_at: now_unix() + 60,
        });
        assert!(cache.get("svc").is_some());
    }

    #[test]
    fn remove_clears_entry() {
        let cache = RecordCache::new();
        cache.put(Record {
            name: "svc".into(),
            ip: "127.0.0.1".into(),
            port: 9000,
            expires_at: now_unix() + 60,
        });
        cache.remove("svc");
        assert!(cache.get("svc").is_none());
    }
}
