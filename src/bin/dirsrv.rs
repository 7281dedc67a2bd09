//! Directory server process entry point. Binds the fixed UDP port, loads
//! (or creates) the registry snapshot, serves REGISTER/QUERY/DEREGISTER,
//! and shuts down cleanly on SIGINT.

use std::sync::Arc;

use meshtalk::config::DirectoryServerConfig;
use meshtalk::directory::{self, Registry};
use meshtalk::net::datagram;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = DirectoryServerConfig::default();
    let registry = Arc::new(Registry::load(config.snapshot_path.clone()));
    let sweeper = registry.spawn_sweeper(config.sweep_interval);

    let registry_for_handler = registry.clone();
    let server = datagram::serve(config.bind_addr, move |req, from| {
        directory::dispatch(&registry_for_handler, req, from.ip().to_string())
    })?;
    tracing::info!(addr = %config.bind_addr, "directory server listening");

    tokio::signal::ctrl_c().await?;
    tracing::info!("received SIGINT, shutting down");

    server.shutdown();
    sweeper.shutdown();
    registry.sweep();

    Ok(())
}
