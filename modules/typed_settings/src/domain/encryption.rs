//! Encryption of settings payloads at rest

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::RngCore;
use sha2::{Digest, Sha256};

const NONCE_LEN: usize = 12;

/// Error type for encrypter operations
#[derive(Debug, thiserror::Error)]
pub enum EncryptionError {
    #[error("encryption failed: {0}")]
    Encrypt(String),

    #[error("decryption failed: {0}")]
    Decrypt(String),
}

/// Symmetric encryption of text payloads
pub trait Encrypter: Send + Sync {
    fn encrypt(&self, plaintext: &str) -> Result<String, EncryptionError>;

    fn decrypt(&self, ciphertext: &str) -> Result<String, EncryptionError>;
}

/// AES-256-GCM with a random nonce per message.
///
/// Output is `base64(nonce || ciphertext)`.
#[derive(Clone)]
pub struct AesGcmEncrypter {
    key: [u8; 32],
}

impl AesGcmEncrypter {
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Derive the key from an arbitrary secret with SHA-256
    pub fn from_secret(secret: &str) -> Self {
        let digest = Sha256::digest(secret.as_bytes());
        let mut key = [0u8; 32];
        key.copy_from_slice(&digest);
        Self { key }
    }

    fn cipher(&self) -> Result<Aes256Gcm, String> {
        Aes256Gcm::new_from_slice(&self.key).map_err(|e| e.to_string())
    }
}

impl std::fmt::Debug for AesGcmEncrypter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesGcmEncrypter").finish_non_exhaustive()
    }
}

impl Encrypter for AesGcmEncrypter {
    fn encrypt(&self, plaintext: &str) -> Result<String, EncryptionError> {
        let cipher = self.cipher().map_err(EncryptionError::Encrypt)?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| EncryptionError::Encrypt(e.to_string()))?;

        let mut payload = nonce_bytes.to_vec();
        payload.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(payload))
    }

    fn decrypt(&self, ciphertext: &str) -> Result<String, EncryptionError> {
        let payload = STANDARD
            .decode(ciphertext)
            .map_err(|e| EncryptionError::Decrypt(e.to_string()))?;
        if payload.len() < NONCE_LEN {
            return Err(EncryptionError::Decrypt("payload too short".to_string()));
        }

        let cipher = self.cipher().map_err(EncryptionError::Decrypt)?;
        let (nonce_bytes, body) = payload.split_at(NONCE_LEN);
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce_bytes), body)
            .map_err(|e| EncryptionError::Decrypt(e.to_string()))?;

        String::from_utf8(plaintext).map_err(|e| EncryptionError::Decrypt(e.to_string()))
    }
}
