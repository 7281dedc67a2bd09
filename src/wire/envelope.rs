use std::io::Read;

use crate::crypto::{self, AES_KEY_LEN, GCM_NONCE_LEN};
use crate::error::{CryptoError, WireError};
use rsa::{RsaPrivateKey, RsaPublicKey};

use super::header::{Header, MessageId, MessageType, HEADER_LEN};

/// A fully-decoded envelope as it sits on the wire: header plus the three
/// variable regions. `body_raw` is kept verbatim (still encrypted, if it
/// was) so it can be forwarded without re-encrypting from plaintext.
#[derive(Debug, Clone)]
pub struct RawEnvelope {
    pub header: Header,
    pub key: Vec<u8>,
    pub nonce: Vec<u8>,
    pub body_raw: Vec<u8>,
}

impl RawEnvelope {
    /// Builds a cleartext envelope (used for PUBLIC_KEY and PING/PONG) with
    /// a fresh random id.
    pub fn cleartext(
        kind: MessageType,
        sender: (String, u16),
        body: Vec<u8>,
    ) -> Result<Self, WireError> {
        Self::cleartext_with_id(kind, MessageId::random(), sender, body)
    }

    /// Same as `cleartext`, but with a caller-supplied id. Needed when the
    /// same logical message is sent to several recipients under the same
    /// id (so the seen-set dedups it as one message across every path).
    pub fn cleartext_with_id(
        kind: MessageType,
        id: MessageId,
        sender: (String, u16),
        body: Vec<u8>,
    ) -> Result<Self, WireError> {
        let header = Header {
            kind,
            id,
            sender,
            key_len: 0,
            nonce_len: 0,
            body_len: body.len() as u32,
        };
        // Validate the header fits before handing the envelope back — a
        // send-time framing failure must surface here, not at write time.
        header.encode()?;
        Ok(Self {
            header,
            key: Vec::new(),
            nonce: Vec::new(),
            body_raw: body,
        })
    }

    /// Builds an encrypted envelope (ADVERTISEMENT / CONVERSATION) with a
    /// fresh random id, sealing `plaintext_body` with a fresh AES key
    /// wrapped under `recipient`.
    pub fn encrypted(
        kind: MessageType,
        sender: (String, u16),
        recipient: &RsaPublicKey,
        plaintext_body: &[u8],
    ) -> Result<Self, CryptoError> {
        Self::encrypted_with_id(kind, MessageId::random(), sender, recipient, plaintext_body)
    }

    /// Same as `encrypted`, but with a caller-supplied id — used when
    /// sealing the same conversation message separately for each group
    /// member so that every copy shares one id for seen-set dedup.
    pub fn encrypted_with_id(
        kind: MessageType,
        id: MessageId,
        sender: (String, u16),
        recipient: &RsaPublicKey,
        plaintext_body: &[u8],
    ) -> Result<Self, CryptoError> {
        let aes_key = crypto::generate_aes_key();
        let (nonce, ciphertext) = crypto::aes_encrypt(&aes_key, plaintext_body);
        let wrapped_key = crypto::rsa_encrypt(recipient, &aes_key)?;
        let header = Header {
            kind,
            id,
            sender,
            key_len: wrapped_key.len() as u32,
            nonce_len: nonce.len() as u32,
            body_len: ciphertext.len() as u32,
        };
        // Header-size framing failures surface later, from `to_bytes()`;
        // this constructor only fails on crypto errors.
        Ok(Self {
            header,
            key: wrapped_key,
            nonce: nonce.to_vec(),
            body_raw: ciphertext,
        })
    }

    /// Serializes `HEADER || KEY || NONCE || BODY`.
    pub fn to_bytes(&self) -> Result<Vec<u8>, WireError> {
        let header_bytes = self.header.encode()?;
        let mut out =
            Vec::with_capacity(HEADER_LEN + self.key.len() + self.nonce.len() + self.body_raw.len());
        out.extend_from_slice(&header_bytes);
        out.extend_from_slice(&self.key);
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.body_raw);
        Ok(out)
    }

    /// Reads one envelope from a blocking stream: 256-byte header first,
    /// then the three variable regions sized by the header's lengths.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, WireError> {
        let mut header_buf = [0u8; HEADER_LEN];
        read_exact_or_closed(reader, &mut header_buf)?;
        let header = Header::decode(&header_buf)?;

        let mut key = vec![0u8; header.key_len as usize];
        read_exact_or_closed(reader, &mut key)?;

        let mut nonce = vec![0u8; header.nonce_len as usize];
        read_exact_or_closed(reader, &mut nonce)?;

        let mut body_raw = vec![0u8; header.body_len as usize];
        read_exact_or_closed(reader, &mut body_raw)?;

        Ok(Self {
            header,
            key,
            nonce,
            body_raw,
        })
    }

    /// Decrypts the body, or returns it verbatim if this envelope carries
    /// no key/nonce (cleartext). Returns `None` on RSA or AES-GCM failure
    /// — callers must treat this as a silent drop, per the error-handling
    /// design: wrong recipient or tampered ciphertext, not a hard
    /// error worth propagating.
    pub fn decrypt_body(&self, private: &RsaPrivateKey) -> Option<Vec<u8>> {
        if self.header.key_len == 0 && self.header.nonce_len == 0 {
            return Some(self.body_raw.clone());
        }
        let aes_key_bytes = crypto::rsa_decrypt(private, &self.key).ok()?;
        let aes_key: [u8; AES_KEY_LEN] = aes_key_bytes.try_into().ok()?;
        if self.nonce.len() != GCM_NONCE_LEN {
            return None;
        }
        crypto::aes_decrypt(&aes_key, &self.nonce, &self.body_raw).ok()
    }

    /// Re-wraps the AES key for a new recipient, reusing nonce and
    /// ciphertext verbatim (the forwarding rule).
    pub fn rewrap_for(
        &self,
        own_private: &RsaPrivateKey,
        next_hop: &RsaPublicKey,
    ) -> Result<Self, CryptoError> {
        let aes_key = crypto::rsa_decrypt(own_private, &self.key)?;
        let new_key = crypto::rsa_encrypt(next_hop, &aes_key)?;
        let mut header = self.header.clone();
        header.key_len = new_key.len() as u32;
        Ok(Self {
            header,
            key: new_key,
            nonce: self.nonce.clone(),
            body_raw: self.body_raw.clone(),
        })
    }
}

fn read_exact_or_closed<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<(), WireError> {
    if buf.is_empty() {
        return Ok(());
    }
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            WireError::ConnectionClosed
        } else {
            WireError::ShortRead {
                expected: buf.len(),
                got: 0,
            }
        }
    })
}
