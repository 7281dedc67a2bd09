//! Shared helpers for the integration test suite.

use std::time::{Duration, Instant};

/// Reserves an ephemeral port by binding to it and releasing it
/// immediately, matching the `127.0.0.1:0` convention used elsewhere in
/// this workspace's test suites.
pub fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Polls `check` until it returns `true` or `timeout` elapses, returning
/// whether it succeeded. Used throughout these tests in place of a fixed
/// sleep, since peer handshakes and gossip forwarding run on background
/// threads with no single synchronization point to join on.
pub fn poll_until<F: FnMut() -> bool>(timeout: Duration, mut check: F) -> bool {
    let start = Instant::now();
    loop {
        if check() {
            return true;
        }
        if start.elapsed() > timeout {
            return false;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}
