//! `ChatModel`: the peer directory, group set, seen-set, and the receive
//! dispatch/forwarding logic that ties the wire, crypto, and transport
//! layers together.

use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::net::{SocketAddr, TcpStream};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::crypto::{self, Keypair};
use crate::error::{MeshError, Result, TransportError};
use crate::group::Group;
use crate::message::{now_secs, Message};
use crate::net::stream::{self, ListenerHandle};
use crate::peer::Peer;
use crate::wire::{
    AdvertisementBody, ConversationBody, Header, MessageId, MessageType, PublicKeyBody, RawEnvelope,
};

fn address_key(addr: &(String, u16)) -> String {
    format!("{}:{}", addr.0, addr.1)
}

fn to_socket_addr(addr: &(String, u16)) -> Result<SocketAddr> {
    format!("{}:{}", addr.0, addr.1)
        .parse()
        .map_err(|_| MeshError::Transport(TransportError::NoConnection))
}

/// The handshake timeout applied to `wait_public_key` in `advertise_group`:
/// generous enough for a LAN/loopback round-trip while still failing fast
/// on a dead peer.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Core peer/group chat model. Owns the process's long-term RSA identity,
/// the peer directory, the group set, and the forward-dedup seen-set.
pub struct ChatModel {
    pub local_addr: (String, u16),
    keypair: Keypair,
    peers: Mutex<HashMap<String, Arc<Peer>>>,
    groups: Mutex<HashMap<String, Arc<Group>>>,
    seen: Mutex<HashSet<MessageId>>,
}

impl ChatModel {
    pub fn new(local_addr: (String, u16)) -> Arc<Self> {
        Arc::new(Self {
            local_addr,
            keypair: Keypair::generate(),
            peers: Mutex::new(HashMap::new()),
            groups: Mutex::new(HashMap::new()),
            seen: Mutex::new(HashSet::new()),
        })
    }

    pub fn create_group(&self, name: &str) -> Arc<Group> {
        let group = Arc::new(Group::new(name.to_string()));
        self.groups
            .lock()
            .unwrap()
            .insert(name.to_string(), group.clone());
        group
    }

    pub fn group(&self, name: &str) -> Option<Arc<Group>> {
        self.groups.lock().unwrap().get(name).cloned()
    }

    /// A snapshot of all known groups, for UI rendering.
    pub fn groups_snapshot(&self) -> HashMap<String, Arc<Group>> {
        self.groups.lock().unwrap().clone()
    }

    fn get_or_create_peer(&self, addr: (String, u16)) -> Arc<Peer> {
        let key = address_key(&addr);
        let mut peers = self.peers.lock().unwrap();
        peers
            .entry(key)
            .or_insert_with(|| Arc::new(Peer::new(addr)))
            .clone()
    }

    /// Binds `bind_addr` and begins accepting peer connections, each
    /// dispatched to its own receive thread. Called once, at startup.
    pub fn listen(self: &Arc<Self>, bind_addr: SocketAddr) -> std::io::Result<ListenerHandle> {
        let model = self.clone();
        stream::listen(bind_addr, move |conn, remote| {
            model.clone().handle_connection(conn, remote);
        })
    }

    /// Connects to `addr`, completes the PUBLIC_KEY handshake, and sends
    /// an ADVERTISEMENT for `group_name`.
    pub fn advertise_group(self: &Arc<Self>, group_name: &str, addr: (String, u16)) -> Result<()> {
        let group = self
            .group(group_name)
            .ok_or_else(|| MeshError::UnknownGroup(group_name.to_string()))?;

        let peer = self.get_or_create_peer(addr.clone());
        if peer.conn_clone().is_none() {
            let socket_addr = to_socket_addr(&addr)?;
            let model = self.clone();
            let stream = stream::connect(socket_addr, move |conn| {
                model.handle_connection(conn, socket_addr);
            })?;
            peer.set_conn(stream);
        }
        self.ensure_public_key_sent(&peer)?;

        let public_key = peer
            .wait_public_key(Some(HANDSHAKE_TIMEOUT))
            .ok_or(MeshError::Transport(TransportError::Timeout))?;

        let body = AdvertisementBody {
            group: group.name.clone(),
            token: group.token.clone(),
        };
        let body_bytes = serde_json::to_vec(&body)?;
        let envelope = RawEnvelope::encrypted(
            MessageType::Advertisement,
            self.local_addr.clone(),
            &public_key,
            &body_bytes,
        )?;
        self.send_envelope(&peer, &envelope)?;

        group.add_peer(peer.clone());
        peer.groups.lock().unwrap().insert(group_name.to_string());
        Ok(())
    }

    /// Sends `content` to every member of `group_name`, and inserts it
    /// into the local message sequence as the originator.
    pub fn send(&self, group_name: &str, content: &str) -> Result<()> {
        let group = self
            .group(group_name)
            .ok_or_else(|| MeshError::UnknownGroup(group_name.to_string()))?;

        let now = now_secs();
        let message_id = MessageId::random();
        // Seed the seen-set before sending, so a forwarding loop back to
        // us never re-forwards our own message.
        self.seen.lock().unwrap().insert(message_id);

        group.insert_message_sorted(Message::originated(
            self.local_addr.clone(),
            content.to_string(),
            now,
        ));

        let body = ConversationBody {
            sender: self.local_addr.clone(),
            content: content.to_string(),
            timestamp: now,
            group: group.name.clone(),
            group_token: group.token.clone(),
        };
        let body_bytes = serde_json::to_vec(&body)?;

        let members: Vec<Arc<Peer>> = group.peers.lock().unwrap().clone();
        for peer in members {
            let Some(public_key) = peer.public_key() else {
                continue;
            };
            if peer.conn_clone().is_none() {
                continue;
            }
            let envelope = RawEnvelope::encrypted_with_id(
                MessageType::Conversation,
                message_id,
                self.local_addr.clone(),
                &public_key,
                &body_bytes,
            )?;
            self.send_envelope(&peer, &envelope)?;
        }
        Ok(())
    }

    fn send_envelope(&self, peer: &Peer, envelope: &RawEnvelope) -> Result<()> {
        let bytes = envelope.to_bytes()?;
        let mut conn = peer.conn_clone().ok_or(TransportError::NoConnection)?;
        conn.write_all(&bytes).map_err(TransportError::Io)?;
        Ok(())
    }

    fn ensure_public_key_sent(&self, peer: &Peer) -> Result<()> {
        if peer.mark_public_key_sent() {
            return Ok(());
        }
        let body = PublicKeyBody {
            public_key: self.keypair.public_pem(),
        };
        let body_bytes = serde_json::to_vec(&body)?;
        let envelope =
            RawEnvelope::cleartext(MessageType::PublicKey, self.local_addr.clone(), body_bytes)?;
        self.send_envelope(peer, &envelope)
    }

    fn decrypt_required(&self, envelope: &RawEnvelope) -> Option<Vec<u8>> {
        if envelope.header.key_len == 0 || envelope.header.nonce_len == 0 {
            return None;
        }
        envelope.decrypt_body(&self.keypair.private)
    }

    /// Receive loop for one connection: reads envelopes until the peer
    /// closes or sends a malformed header, dispatching each to
    /// `process_envelope`.
    fn handle_connection(self: Arc<Self>, conn: TcpStream, remote_addr: SocketAddr) {
        let mut reader = conn;
        loop {
            match RawEnvelope::read_from(&mut reader) {
                Ok(envelope) => self.process_envelope(envelope, &reader, remote_addr),
                Err(e) => {
                    tracing::debug!(%remote_addr, error = %e, "closing receive loop");
                    break;
                }
            }
        }
    }

    fn process_envelope(self: &Arc<Self>, envelope: RawEnvelope, writer: &TcpStream, remote_addr: SocketAddr) {
        let header = envelope.header.clone();
        // Dedup applies to every inbound envelope regardless of type
        // so it runs before any type-specific dispatch.
        if !self.seen.lock().unwrap().insert(header.id) {
            tracing::trace!(id = %header.id, %remote_addr, "dropping duplicate envelope");
            return;
        }

        let sender_peer = self.get_or_create_peer(header.sender.clone());

        match header.kind {
            MessageType::Ping => self.handle_ping(writer),
            MessageType::Pong => {}
            MessageType::PublicKey => self.handle_public_key(&envelope, &sender_peer, writer),
            MessageType::Advertisement => self.handle_advertisement(&envelope, &sender_peer),
            MessageType::Conversation => self.handle_conversation(&envelope, &header),
        }
    }

    fn handle_ping(&self, writer: &TcpStream) {
        let envelope = match RawEnvelope::cleartext(MessageType::Pong, self.local_addr.clone(), Vec::new()) {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(error = %e, "failed to build PONG envelope");
                return;
            }
        };
        if let Err(e) = stream::write_all(writer, &envelope.to_bytes().unwrap_or_default()) {
            tracing::debug!(error = %e, "failed to send PONG");
        }
    }

    fn handle_public_key(&self, envelope: &RawEnvelope, sender_peer: &Arc<Peer>, writer: &TcpStream) {
        if envelope.header.key_len != 0 || envelope.header.nonce_len != 0 {
            tracing::debug!("dropping PUBLIC_KEY envelope with unexpected encryption");
            return;
        }
        let body: PublicKeyBody = match serde_json::from_slice(&envelope.body_raw) {
            Ok(b) => b,
            Err(e) => {
                tracing::debug!(error = %e, "malformed PUBLIC_KEY body");
                return;
            }
        };
        let public_key = match crypto::public_key_from_pem(&body.public_key) {
            Ok(pk) => pk,
            Err(e) => {
                tracing::debug!(error = %e, "invalid PUBLIC_KEY PEM");
                return;
            }
        };
        sender_peer.set_public_key(public_key);
        if let Ok(bound) = writer.try_clone() {
            sender_peer.set_conn(bound);
        }
        if let Err(e) = self.ensure_public_key_sent(sender_peer) {
            tracing::debug!(error = %e, "failed to reply with our own PUBLIC_KEY");
        }
    }

    fn handle_advertisement(&self, envelope: &RawEnvelope, sender_peer: &Arc<Peer>) {
        let Some(body_bytes) = self.decrypt_required(envelope) else {
            tracing::debug!("dropping ADVERTISEMENT: not decryptable");
            return;
        };
        let body: AdvertisementBody = match serde_json::from_slice(&body_bytes) {
            Ok(b) => b,
            Err(e) => {
                tracing::debug!(error = %e, "malformed ADVERTISEMENT body");
                return;
            }
        };
        // Unconditional overwrite on ADVERTISEMENT is the documented
        // behavior, not a bug.
        let group = Arc::new(Group::with_token(body.group.clone(), body.token));
        group.add_peer(sender_peer.clone());
        sender_peer.groups.lock().unwrap().insert(body.group.clone());
        self.groups.lock().unwrap().insert(body.group, group);
    }

    fn handle_conversation(self: &Arc<Self>, envelope: &RawEnvelope, header: &Header) {
        let Some(body_bytes) = self.decrypt_required(envelope) else {
            tracing::debug!("dropping CONVERSATION: not decryptable");
            return;
        };
        let body: ConversationBody = match serde_json::from_slice(&body_bytes) {
            Ok(b) => b,
            Err(e) => {
                tracing::debug!(error = %e, "malformed CONVERSATION body");
                return;
            }
        };
        let Some(group) = self.group(&body.group) else {
            tracing::debug!(group = %body.group, "dropping CONVERSATION: unknown group");
            return;
        };
        if group.token != body.group_token {
            tracing::debug!(group = %body.group, "dropping CONVERSATION: token mismatch");
            return;
        }

        let message = Message {
            sender: body.sender,
            content: body.content,
            sent_at: body.timestamp,
            received_at: now_secs(),
        };
        group.insert_message_sorted(message);
        self.forward_conversation(&group, envelope, header);
    }

    /// Re-sends a received CONVERSATION to every other group member under
    /// its own public key, reusing the nonce and ciphertext verbatim
    /// its own public key, reusing the nonce and ciphertext verbatim.
    fn forward_conversation(&self, group: &Group, envelope: &RawEnvelope, header: &Header) {
        let members: Vec<Arc<Peer>> = group.peers.lock().unwrap().clone();
        for peer in members {
            if peer.address == header.sender {
                continue;
            }
            let (Some(mut conn), Some(public_key)) = (peer.conn_clone(), peer.public_key()) else {
                continue;
            };
            match envelope.rewrap_for(&self.keypair.private, &public_key) {
                Ok(rewrapped) => match rewrapped.to_bytes() {
                    Ok(bytes) => {
                        if let Err(e) = conn.write_all(&bytes) {
                            tracing::debug!(peer = %address_key(&peer.address), error = %e, "forward failed");
                        }
                    }
                    Err(e) => tracing::debug!(error = %e, "failed to serialize forwarded envelope"),
                },
                Err(e) => {
                    tracing::debug!(peer = %address_key(&peer.address), error = %e, "failed to rewrap key for forward")
                }
            }
        }
    }
}
