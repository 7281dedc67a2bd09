use serde::{Deserialize, Serialize};

/// A directory request datagram. `port` and `ttl` are
/// kept as `i64` rather than `u16`/range-checked types so an out-of-range
/// value still parses, letting the registry return its documented
/// `"Invalid port, got: ..."` validation error instead of a generic
/// deserialization failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method")]
pub enum DirectoryRequest {
    #[serde(rename = "REGISTER")]
    Register { name: String, port: i64, ttl: i64 },
    #[serde(rename = "QUERY")]
    Query { name: String },
    #[serde(rename = "DEREGISTER")]
    Deregister { name: String },
}

/// A directory response datagram. Internally tagged on `status` so the
/// two variants can carry different field sets (`data` vs `msg`) while
/// still matching the wire shape exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum DirectoryResponse {
    #[serde(rename = "OK")]
    Ok { data: serde_json::Value },
    #[serde(rename = "ERROR")]
    Error { msg: String },
}

/// The fixed error-message vocabulary the registry controller produces.
pub const ERR_NOT_FOUND: &str = crate::error::NOT_FOUND_MSG;
