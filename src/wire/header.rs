use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::WireError;

pub const HEADER_LEN: usize = 256;

/// The five envelope kinds carried in `Header.kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    #[serde(rename = "PUBLIC_KEY")]
    PublicKey,
    #[serde(rename = "ADVERTISEMENT")]
    Advertisement,
    #[serde(rename = "CONVERSATION")]
    Conversation,
    #[serde(rename = "PING")]
    Ping,
    #[serde(rename = "PONG")]
    Pong,
}

/// A 128-bit message id, rendered on the wire as 32 lowercase hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageId(pub u128);

impl MessageId {
    pub fn random() -> Self {
        use rand::RngCore;
        let mut bytes = [0u8; 16];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(u128::from_be_bytes(bytes))
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl std::str::FromStr for MessageId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(u128::from_str_radix(s, 16)?))
    }
}

// Hand-rolled rather than `#[serde(transparent)]` over the inner `u128` so
// the wire form is the 32-hex-char string other peers expect, not a raw
// JSON number.
impl Serialize for MessageId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for MessageId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(|_| D::Error::custom(format!("invalid message id hex string: {s}")))
    }
}

/// The fixed 256-byte header preceding every envelope. Serialized as UTF-8
/// JSON and right-padded with ASCII spaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Header {
    #[serde(rename = "type")]
    pub kind: MessageType,
    pub id: MessageId,
    pub sender: (String, u16),
    pub key_len: u32,
    pub nonce_len: u32,
    pub body_len: u32,
}

impl Header {
    /// Encodes to exactly `HEADER_LEN` bytes, space-padded. Fails if the
    /// compact JSON encoding itself would not fit.
    pub fn encode(&self) -> Result<[u8; HEADER_LEN], WireError> {
        let json = serde_json::to_vec(self)
            .map_err(|e| WireError::MalformedHeader(e.to_string()))?;
        if json.len() > HEADER_LEN {
            return Err(WireError::HeaderTooLarge(json.len()));
        }
        let mut buf = [b' '; HEADER_LEN];
        buf[..json.len()].copy_from_slice(&json);
        Ok(buf)
    }

    /// Decodes a 256-byte buffer, trimming trailing ASCII-space padding
    /// before parsing JSON.
    pub fn decode(buf: &[u8; HEADER_LEN]) -> Result<Self, WireError> {
        let trimmed = {
            let mut end = buf.len();
            while end > 0 && buf[end - 1] == b' ' {
                end -= 1;
            }
            &buf[..end]
        };
        serde_json::from_slice(trimmed).map_err(|e| WireError::MalformedHeader(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Header {
        Header {
            kind: MessageType::Conversation,
            id: MessageId::random(),
            sender: ("127.0.0.1".to_string(), 8081),
            key_len: 256,
            nonce_len: 12,
            body_len: 48,
        }
    }

    #[test]
    fn encode_is_exactly_256_bytes_and_space_padded() {
        let h = sample();
        let buf = h.encode().unwrap();
        assert_eq!(buf.len(), HEADER_LEN);
        let json = serde_json::to_vec(&h).unwrap();
        assert!(buf[json.len()..].iter().all(|&b| b == b' '));
    }

    #[test]
    fn decode_roundtrips() {
        let h = sample();
        let buf = h.encode().unwrap();
        let decoded = Header::decode(&buf).unwrap();
        assert_eq!(decoded.id, h.id);
        assert_eq!(decoded.kind, h.kind);
        assert_eq!(decoded.sender, h.sender);
        assert_eq!(decoded.key_len, h.key_len);
    }

    #[test]
    fn message_id_display_is_32_hex_chars() {
        let id = MessageId::random();
        let s = id.to_string();
        assert_eq!(s.len(), 32);
        assert!(s.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn message_id_serializes_as_hex_string_not_a_number() {
        let id = MessageId::random();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
        let decoded: MessageId = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, id);
    }
}
