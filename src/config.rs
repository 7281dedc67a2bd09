use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the directory server. There is no CLI flag surface
/// (the binary listens on a fixed address per the external-interfaces
/// contract); this struct exists so the registry can be constructed and
/// tested without touching process-global state.
#[derive(Debug, Clone)]
pub struct DirectoryServerConfig {
    pub bind_addr: SocketAddr,
    /// Where the registry snapshot is written after every mutation and sweep.
    pub snapshot_path: PathBuf,
    pub sweep_interval: Duration,
}

impl Default for DirectoryServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".parse().expect("valid default bind addr"),
            snapshot_path: PathBuf::from("registry.json"),
            sweep_interval: Duration::from_secs(5),
        }
    }
}

/// Configuration for the directory client.
#[derive(Debug, Clone)]
pub struct DirectoryClientConfig {
    pub server_addr: SocketAddr,
    pub request_timeout: Duration,
}

impl Default for DirectoryClientConfig {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:8080".parse().expect("valid default server addr"),
            request_timeout: Duration::from_secs(3),
        }
    }
}
