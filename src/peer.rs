//! Peer connection lifecycle and the condvar-based public-key handshake
//! wait.

use std::collections::HashSet;
use std::net::TcpStream;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use rsa::RsaPublicKey;

/// Observable connection state of a Peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    Unknown,
    Connecting,
    Ready,
}

struct PeerInner {
    conn: Option<TcpStream>,
    public_key: Option<RsaPublicKey>,
    public_key_sent: bool,
}

/// A remote peer, keyed by `(host, port)` within the process. Created on
/// first reference and never explicitly torn down.
pub struct Peer {
    pub address: (String, u16),
    inner: Mutex<PeerInner>,
    key_ready: Condvar,
    pub groups: Mutex<HashSet<String>>,
}

impl Peer {
    pub fn new(address: (String, u16)) -> Self {
        Self {
            address,
            inner: Mutex::new(PeerInner {
                conn: None,
                public_key: None,
                public_key_sent: false,
            }),
            key_ready: Condvar::new(),
            groups: Mutex::new(HashSet::new()),
        }
    }

    pub fn state(&self) -> PeerState {
        let inner = self.inner.lock().unwrap();
        match (&inner.conn, &inner.public_key) {
            (None, _) => PeerState::Unknown,
            (Some(_), None) => PeerState::Connecting,
            (Some(_), Some(_)) => PeerState::Ready,
        }
    }

    /// Installs (or replaces) the stream used to send to this peer,
    /// returning any previously-installed stream so the caller can shut it
    /// down explicitly.
    pub fn set_conn(&self, stream: TcpStream) -> Option<TcpStream> {
        let mut inner = self.inner.lock().unwrap();
        inner.conn.replace(stream)
    }

    /// A clone of the current send-side stream, if any.
    pub fn conn_clone(&self) -> Option<TcpStream> {
        let inner = self.inner.lock().unwrap();
        inner.conn.as_ref().and_then(|s| s.try_clone().ok())
    }

    pub fn public_key(&self) -> Option<RsaPublicKey> {
        self.inner.lock().unwrap().public_key.clone()
    }

    /// Records the peer's public key and wakes any thread blocked in
    /// `wait_public_key`.
    pub fn set_public_key(&self, key: RsaPublicKey) {
        let mut inner = self.inner.lock().unwrap();
        inner.public_key = Some(key);
        self.key_ready.notify_all();
    }

    /// `true` if we have already sent our PUBLIC_KEY on this peer; sets the
    /// flag atomically with the read so two racing handshakes only send
    /// once each way.
    pub fn mark_public_key_sent(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let already = inner.public_key_sent;
        inner.public_key_sent = true;
        already
    }

    /// Blocks until `public_key` is set, or until `timeout` elapses.
    /// Implemented with a condition variable rather than spinning — the
    /// redesign note: spinning is a defect, not a design choice.
    pub fn wait_public_key(&self, timeout: Option<Duration>) -> Option<RsaPublicKey> {
        let inner = self.inner.lock().unwrap();
        match timeout {
            Some(d) => {
                let (guard, _timed_out) = self
                    .key_ready
                    .wait_timeout_while(inner, d, |inner| inner.public_key.is_none())
                    .unwrap();
                guard.public_key.clone()
            }
            None => {
                let guard = self
                    .key_ready
                    .wait_while(inner, |inner| inner.public_key.is_none())
                    .unwrap();
                guard.public_key.clone()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keypair;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn state_transitions_unknown_connecting_ready() {
        let peer = Peer::new(("127.0.0.1".into(), 9000));
        assert_eq!(peer.state(), PeerState::Unknown);
    }

    #[test]
    fn wait_public_key_wakes_on_set() {
        let peer = Arc::new(Peer::new(("127.0.0.1".into(), 9000)));
        let waiter = peer.clone();
        let handle = thread::spawn(move || waiter.wait_public_key(Some(Duration::from_secs(2))));

        thread::sleep(Duration::from_millis(50));
        let kp = Keypair::generate();
        peer.set_public_key(kp.public.clone());

        let result = handle.join().unwrap();
        assert_eq!(result, Some(kp.public));
    }

    #[test]
    fn wait_public_key_times_out_when_never_set() {
        let peer = Peer::new(("127.0.0.1".into(), 9000));
        let result = peer.wait_public_key(Some(Duration::from_millis(100)));
        assert!(result.is_none());
    }

    #[test]
    fn mark_public_key_sent_is_one_shot() {
        let peer = Peer::new(("127.0.0.1".into(), 9000));
        assert!(!peer.mark_public_key_sent());
        assert!(peer.mark_public_key_sent());
    }
}
