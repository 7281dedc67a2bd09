use thiserror::Error;

/// Errors surfaced by the wire codec: a malformed or oversize header, or a
/// short read on one of the variable-length regions.
#[derive(Debug, Error, Clone)]
pub enum WireError {
    #[error("header JSON exceeds 256 bytes: {0} bytes")]
    HeaderTooLarge(usize),

    #[error("malformed header JSON: {0}")]
    MalformedHeader(String),

    #[error("short read: expected {expected} bytes, got {got}")]
    ShortRead { expected: usize, got: usize },

    #[error("connection closed mid-read")]
    ConnectionClosed,
}

/// Errors from the crypto primitives. Most of these are handled by dropping
/// the envelope rather than propagating, per the silent-drop policy (see
/// `MeshError::is_silent_drop`).
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("rsa error: {0}")]
    Rsa(#[from] rsa::Error),

    #[error("rsa pkcs8 error: {0}")]
    Pkcs8(String),

    #[error("aes-gcm authentication failed")]
    DecryptAuth,

    #[error("invalid key length: expected {expected}, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },
}

/// Transport-level failures: connect/accept/send errors and the
/// already-closed-peer condition.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("peer has no usable connection")]
    NoConnection,

    #[error("operation timed out")]
    Timeout,
}

/// The wire's "name not found" error string, shared between `DirectoryError`'s
/// `Display` and `directory::protocol::ERR_NOT_FOUND` so the two can't drift.
pub const NOT_FOUND_MSG: &str = "Not found";

/// Directory protocol errors, both client- and server-side.
#[derive(Debug, Error, Clone)]
pub enum DirectoryError {
    #[error("{0}")]
    Remote(String),

    #[error("{}", NOT_FOUND_MSG)]
    NotFound,

    #[error("Invalid port, got: {0}")]
    InvalidPort(i64),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("request timed out")]
    Timeout,
}

/// Crate-wide error type. Every module-local error composes into this via
/// `#[from]` so callers at any layer can propagate with `?`.
#[derive(Debug, Error)]
pub enum MeshError {
    #[error("wire error: {0}")]
    Wire(#[from] WireError),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("directory error: {0}")]
    Directory(#[from] DirectoryError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown group: {0}")]
    UnknownGroup(String),

    #[error("group token mismatch for {0}")]
    TokenMismatch(String),
}

pub type Result<T> = std::result::Result<T, MeshError>;
