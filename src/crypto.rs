//! Hybrid RSA/AES-GCM primitives.
//!
//! Every conversation envelope is sealed with a fresh AES-256 key; that key
//! is wrapped per-recipient with RSA-OAEP so a forwarder can re-wrap it for
//! the next hop without touching the AES ciphertext.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use rsa::pkcs8::{DecodePublicKey, EncodePublicKey, LineEnding};
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;

use crate::error::CryptoError;

pub const AES_KEY_LEN: usize = 32;
pub const GCM_NONCE_LEN: usize = 12;
const RSA_KEY_BITS: usize = 2048;

/// A long-term RSA identity keypair.
pub struct Keypair {
    pub private: RsaPrivateKey,
    pub public: RsaPublicKey,
}

impl Keypair {
    /// Generates a fresh 2048-bit RSA keypair with the standard e=65537.
    pub fn generate() -> Self {
        let mut rng = OsRng;
        let private =
            RsaPrivateKey::new(&mut rng, RSA_KEY_BITS).expect("RSA keygen should not fail at 2048 bits");
        let public = RsaPublicKey::from(&private);
        Self { private, public }
    }

    /// Exports the public half as a PEM `SubjectPublicKeyInfo` string, the
    /// wire form used in `PUBLIC_KEY` body payloads.
    pub fn public_pem(&self) -> String {
        self.public
            .to_public_key_pem(LineEnding::LF)
            .expect("public key PEM encoding should not fail")
    }
}

/// Parses a PEM `SubjectPublicKeyInfo` string received from a peer.
pub fn public_key_from_pem(pem: &str) -> std::result::Result<RsaPublicKey, CryptoError> {
    RsaPublicKey::from_public_key_pem(pem).map_err(|e| CryptoError::Pkcs8(e.to_string()))
}

fn oaep() -> Oaep {
    Oaep::new::<Sha256>()
}

/// RSA-OAEP-SHA256 encrypts `data` (expected to be a 32-byte AES key) under
/// `recipient`.
pub fn rsa_encrypt(recipient: &RsaPublicKey, data: &[u8]) -> std::result::Result<Vec<u8>, CryptoError> {
    let mut rng = OsRng;
    recipient
        .encrypt(&mut rng, oaep(), data)
        .map_err(CryptoError::Rsa)
}

/// RSA-OAEP-SHA256 decrypts a key region with our own private key.
pub fn rsa_decrypt(private: &RsaPrivateKey, ciphertext: &[u8]) -> std::result::Result<Vec<u8>, CryptoError> {
    private.decrypt(oaep(), ciphertext).map_err(CryptoError::Rsa)
}

/// Generates a fresh random 32-byte AES-256 key.
pub fn generate_aes_key() -> [u8; AES_KEY_LEN] {
    let mut key = [0u8; AES_KEY_LEN];
    OsRng.fill_bytes(&mut key);
    key
}

/// AES-256-GCM seals `plaintext` under `key` with a fresh random nonce and
/// empty AAD. Returns `(nonce, ciphertext||tag)`.
pub fn aes_encrypt(
    key: &[u8; AES_KEY_LEN],
    plaintext: &[u8],
) -> ([u8; GCM_NONCE_LEN], Vec<u8>) {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let mut nonce_bytes = [0u8; GCM_NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);
    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .expect("AES-GCM encryption with a valid 32-byte key cannot fail");
    (nonce_bytes, ciphertext)
}

/// AES-256-GCM opens `ciphertext` (including trailing tag) under `key` and
/// `nonce`. Fails with `DecryptAuth` on tag mismatch, meaning wrong key or
/// tampered data — the caller must treat this as a silent drop, not a
/// hard error.
pub fn aes_decrypt(
    key: &[u8; AES_KEY_LEN],
    nonce: &[u8],
    ciphertext: &[u8],
) -> std::result::Result<Vec<u8>, CryptoError> {
    if nonce.len() != GCM_NONCE_LEN {
        return Err(CryptoError::InvalidKeyLength {
            expected: GCM_NONCE_LEN,
            got: nonce.len(),
        });
    }
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| CryptoError::DecryptAuth)
}
