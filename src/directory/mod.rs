//! The name-resolution directory: an authoritative registry server, its
//! wire protocol, and the client-side cache.

pub mod cache;
pub mod client;
pub mod protocol;
pub mod record;
pub mod registry;
pub mod registry_controller;

pub use cache::RecordCache;
pub use client::DirectoryClient;
pub use protocol::{DirectoryRequest, DirectoryResponse};
pub use record::Record;
pub use registry::Registry;
pub use registry_controller::dispatch;

/// Seconds since the Unix epoch, as a signed integer to match `Record`'s
/// `expires_at` and the wire protocol's `ttl` fields.
pub(crate) fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_secs() as i64
}
