//! Authenticated encryption of note bodies.
//!
//! Encrypted bodies travel as `enc:v1:` followed by base64(nonce || ciphertext),
//! where the ciphertext carries the AES-256-GCM tag. Anything without the
//! prefix is a legacy plaintext body.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine;
use sha2::Sha256;
use std::fmt;
use thiserror::Error;

pub const ENCRYPTED_PREFIX: &str = "enc:v1:";
pub const MIN_KDF_ITERATIONS: u32 = 100_000;
const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// AES-256 key handed out by the vault. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct NoteKey([u8; KEY_LEN]);

impl NoteKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn generate() -> Self {
        Self(rand::random())
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.0))
    }
}

impl fmt::Debug for NoteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NoteKey(..)")
    }
}

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("key derivation needs at least {minimum} iterations, got {requested}")]
    WeakIterations { requested: u32, minimum: u32 },
    #[error("key derivation salt must not be empty")]
    EmptySalt,
    #[error("cipher failure: {0}")]
    Cipher(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecryptionError {
    #[error("payload is not encrypted")]
    NotEncrypted,
    #[error("malformed ciphertext: {0}")]
    Malformed(String),
    #[error("authentication failed")]
    Authentication,
}

/// A body as found on the wire, resolved by sniffing the prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload<'a> {
    Plaintext(&'a str),
    Ciphertext { nonce: [u8; NONCE_LEN], bytes: Vec<u8> },
}

impl<'a> Payload<'a> {
    pub fn parse(raw: &'a str) -> Result<Self, DecryptionError> {
        let Some(encoded) = raw.strip_prefix(ENCRYPTED_PREFIX) else {
            return Ok(Self::Plaintext(raw));
        };
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|error| DecryptionError::Malformed(error.to_string()))?;
        if decoded.len() < NONCE_LEN + TAG_LEN {
            return Err(DecryptionError::Malformed(format!(
                "payload too short ({} bytes)",
                decoded.len()
            )));
        }
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&decoded[..NONCE_LEN]);
        Ok(Self::Ciphertext {
            nonce,
            bytes: decoded[NONCE_LEN..].to_vec(),
        })
    }
}

pub fn derive_key(secret: &[u8], salt: &[u8], iterations: u32) -> Result<NoteKey, CryptoError> {
    if iterations < MIN_KDF_ITERATIONS {
        return Err(CryptoError::WeakIterations {
            requested: iterations,
            minimum: MIN_KDF_ITERATIONS,
        });
    }
    if salt.is_empty() {
        return Err(CryptoError::EmptySalt);
    }
    let mut key = [0u8; KEY_LEN];
    pbkdf2::pbkdf2_hmac::<Sha256>(secret, salt, iterations, &mut key);
    Ok(NoteKey(key))
}

pub fn encrypt(plaintext: &str, key: &NoteKey) -> Result<String, CryptoError> {
    let nonce_bytes: [u8; NONCE_LEN] = rand::random();
    let nonce = Nonce::from_slice(&nonce_bytes);
    let encrypted = key
        .cipher()
        .encrypt(nonce, plaintext.as_bytes())
        .map_err(|error| CryptoError::Cipher(error.to_string()))?;

    let mut framed = Vec::with_capacity(NONCE_LEN + encrypted.len());
    framed.extend_from_slice(&nonce_bytes);
    framed.extend_from_slice(&encrypted);
    Ok(format!(
        "{}{}",
        ENCRYPTED_PREFIX,
        base64::engine::general_purpose::STANDARD.encode(framed)
    ))
}

pub fn decrypt(raw: &str, key: &NoteKey) -> Result<String, DecryptionError> {
    let (nonce, bytes) = match Payload::parse(raw)? {
        Payload::Plaintext(_) => return Err(DecryptionError::NotEncrypted),
        Payload::Ciphertext { nonce, bytes } => (nonce, bytes),
    };
    let plaintext = key
        .cipher()
        .decrypt(Nonce::from_slice(&nonce), bytes.as_slice())
        .map_err(|_| DecryptionError::Authentication)?;
    String::from_utf8(plaintext).map_err(|error| DecryptionError::Malformed(error.to_string()))
}

pub fn is_encrypted(value: &str) -> bool {
    value.starts_with(ENCRYPTED_PREFIX)
}
