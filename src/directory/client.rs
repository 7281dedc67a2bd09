//! Synchronous directory client: request/response over UDP with a local
//! record cache.

use std::sync::Mutex;

use crate::config::DirectoryClientConfig;
use crate::error::DirectoryError;
use crate::net::datagram;

use super::protocol::{DirectoryRequest, DirectoryResponse, ERR_NOT_FOUND};
use super::{now_unix, RecordCache, Record};

/// The `op_lock` serializes `register`/`query`/`deregister` end to end —
/// including the network round-trip — matching the "mutually exclusive
/// under an internal lock" contract.
pub struct DirectoryClient {
    config: DirectoryClientConfig,
    cache: RecordCache,
    op_lock: Mutex<()>,
}

impl DirectoryClient {
    pub fn new(config: DirectoryClientConfig) -> Self {
        Self {
            config,
            cache: RecordCache::new(),
            op_lock: Mutex::new(()),
        }
    }

    /// Consults the cache first; bypasses it only if the caller's `ttl`
    /// would extend the cached `expires_at` (the Open Question resolution
    /// resolution).
    pub fn register(&self, name: &str, port: u16, ttl: i64) -> Result<Record, DirectoryError> {
        let _guard = self.op_lock.lock().unwrap();
        if let Some(cached) = self.cache.get(name) {
            let would_extend = now_unix() + ttl > cached.expires_at;
            if !would_extend {
                return Ok(cached);
            }
        }
        let request = DirectoryRequest::Register {
            name: name.to_string(),
            port: port as i64,
            ttl,
        };
        let record = self.roundtrip(&request)?;
        self.cache.put(record.clone());
        Ok(record)
    }

    /// Always hits the network.
    pub fn query(&self, name: &str) -> Result<Record, DirectoryError> {
        let _guard = self.op_lock.lock().unwrap();
        let request = DirectoryRequest::Query {
            name: name.to_string(),
        };
        self.roundtrip(&request)
    }

    pub fn deregister(&self, name: &str) -> Result<(), DirectoryError> {
        let _guard = self.op_lock.lock().unwrap();
        let request = DirectoryRequest::Deregister {
            name: name.to_string(),
        };
        match self.send_request(&request)? {
            DirectoryResponse::Ok { .. } => {
                self.cache.remove(name);
                Ok(())
            }
            DirectoryResponse::Error { msg } => Err(map_error(msg)),
        }
    }

    fn roundtrip(&self, request: &DirectoryRequest) -> Result<Record, DirectoryError> {
        match self.send_request(request)? {
            DirectoryResponse::Ok { data } => {
                serde_json::from_value(data).map_err(|e| DirectoryError::MalformedResponse(e.to_string()))
            }
            DirectoryResponse::Error { msg } => Err(map_error(msg)),
        }
    }

    fn send_request(&self, request: &DirectoryRequest) -> Result<DirectoryResponse, DirectoryError> {
        let bytes = serde_json::to_vec(request)
            .map_err(|e| DirectoryError::MalformedResponse(e.to_string()))?;
        let response_bytes = datagram::request(self.config.server_addr, &bytes, self.config.request_timeout)
            .map_err(|_| DirectoryError::Timeout)?;
        serde_json::from_slice(&response_bytes)
            .map_err(|e| DirectoryError::MalformedResponse(e.to_string()))
    }
}

fn map_error(msg: String) -> DirectoryError {
    if msg == ERR_NOT_FOUND {
        DirectoryError::NotFound
    } else {
        DirectoryError::Remote(msg)
    }
}
