use std::sync::{Arc, Mutex};

use rand::RngCore;

use crate::message::Message;
use crate::peer::Peer;

/// A named, token-authorised set of peers sharing one ordered message
/// sequence.
pub struct Group {
    pub name: String,
    pub token: String,
    pub peers: Mutex<Vec<Arc<Peer>>>,
    pub messages: Mutex<Vec<Message>>,
}

impl Group {
    /// Creates a group with a fresh random 16-byte (32 hex char) token.
    pub fn new(name: String) -> Self {
        Self::with_token(name, generate_token())
    }

    pub fn with_token(name: String, token: String) -> Self {
        Self {
            name,
            token,
            peers: Mutex::new(Vec::new()),
            messages: Mutex::new(Vec::new()),
        }
    }

    pub fn add_peer(&self, peer: Arc<Peer>) {
        let mut peers = self.peers.lock().unwrap();
        if !peers.iter().any(|p| p.address == peer.address) {
            peers.push(peer);
        }
    }

    /// Inserts `msg` keeping `messages` sorted by `sent_at`, via a linear
    /// scan from the end. Ties
    /// insert after existing elements with an equal timestamp.
    pub fn insert_message_sorted(&self, msg: Message) {
        let mut messages = self.messages.lock().unwrap();
        let mut idx = messages.len();
        while idx > 0 && messages[idx - 1].sent_at > msg.sent_at {
            idx -= 1;
        }
        messages.insert(idx, msg);
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
