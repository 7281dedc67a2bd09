//! End-to-end directory scenarios: TTL expiry via the sweeper and
//! snapshot persistence across a server restart.

mod common;

use std::sync::Arc;
use std::time::Duration;

use meshtalk::config::DirectoryClientConfig;
use meshtalk::directory::{self, DirectoryClient, Registry};
use meshtalk::error::DirectoryError;
use meshtalk::net::datagram;

use common::{free_port, poll_until};

fn spawn_server(
    registry: Arc<Registry>,
) -> (std::net::SocketAddr, datagram::DatagramServerHandle) {
    let port = free_port();
    let addr: std::net::SocketAddr = format!("127.0.0.1:{port}").parse().unwrap();
    let registry_for_handler = registry.clone();
    let handle = datagram::serve(addr, move |req, from| {
        directory::dispatch(&registry_for_handler, req, from.ip().to_string())
    })
    .unwrap();
    (handle.local_addr(), handle)
}

#[test]
fn expired_registration_is_swept_and_becomes_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(Registry::load(dir.path().join("registry.json")));
    let sweeper = registry.spawn_sweeper(Duration::from_millis(50));
    let (addr, handle) = spawn_server(registry.clone());

    let client = DirectoryClient::new(DirectoryClientConfig {
        server_addr: addr,
        request_timeout: Duration::from_secs(2),
    });

    client.register("svc", 9000, 1).unwrap();
    assert!(client.query("svc").is_ok());

    // Wait past the 1-second ttl and at least one sweep cycle.
    let expired = poll_until(Duration::from_secs(5), || {
        matches!(client.query("svc"), Err(DirectoryError::NotFound))
    });
    assert!(expired, "expired registration was never swept");

    handle.shutdown();
    sweeper.shutdown();
}

#[test]
fn snapshot_survives_a_server_restart() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot_path = dir.path().join("registry.json");

    {
        let registry = Arc::new(Registry::load(snapshot_path.clone()));
        let (addr, handle) = spawn_server(registry.clone());
        let client = DirectoryClient::new(DirectoryClientConfig {
            server_addr: addr,
            request_timeout: Duration::from_secs(2),
        });
        client.register("svc", 9000, 3600).unwrap();
        handle.shutdown();
    }

    // A fresh Registry loaded from the same snapshot path, standing in for
    // a restarted dirsrv process, should already know about "svc".
    let reloaded = Arc::new(Registry::load(snapshot_path));
    let (addr, handle) = spawn_server(reloaded);
    let client = DirectoryClient::new(DirectoryClientConfig {
        server_addr: addr,
        request_timeout: Duration::from_secs(2),
    });

    let record = client.query("svc").unwrap();
    assert_eq!(record.port, 9000);
    assert_eq!(record.ip, "127.0.0.1");
    handle.shutdown();
}

#[test]
fn register_uses_datagram_source_ip_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(Registry::load(dir.path().join("registry.json")));
    let (addr, handle) = spawn_server(registry);

    let client = DirectoryClient::new(DirectoryClientConfig {
        server_addr: addr,
        request_timeout: Duration::from_secs(2),
    });
    let record = client.register("svc", 9000, 60).unwrap();
    // The client never tells the server its own IP; the only way this
    // could be "127.0.0.1" is the server reading the datagram's source.
    assert_eq!(record.ip, "127.0.0.1");
    handle.shutdown();
}
