use serde::{Deserialize, Serialize};

/// A directory entry binding a name to an endpoint.
/// Unique by `name`; `expires_at` is the authoritative freshness boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub name: String,
    pub ip: String,
    pub port: u16,
    pub expires_at: i64,
}

impl Record {
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at <= now
    }
}
