use crate::errors::ServiceError;
use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use std::sync::Arc;

/// AES-GCM nonce length in bytes (96 bits).
const NONCE_LEN: usize = 12;

/// Narrow port for field-level encryption so persistence code never sees
/// plaintext PSP transaction ids.
pub trait EncryptionService: Send + Sync {
    fn encrypt(&self, plaintext: &str) -> Result<String, ServiceError>;
    fn decrypt(&self, ciphertext: &str) -> Result<String, ServiceError>;
}

/// AES-256-GCM field cipher. Each encryption draws a fresh random nonce,
/// prefixes it to the ciphertext, and base64-encodes the result for storage.
#[derive(Clone)]
pub struct AesGcmFieldCipher {
    cipher: Arc<Aes256Gcm>,
}

impl AesGcmFieldCipher {
    /// The key must be exactly 32 bytes (256 bits).
    pub fn new(key: &[u8]) -> Result<Self, ServiceError> {
        let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| {
            ServiceError::EncryptionError("encryption key must be 32 bytes".to_string())
        })?;
        Ok(Self {
            cipher: Arc::new(cipher),
        })
    }
}

impl EncryptionService for AesGcmFieldCipher {
    fn encrypt(&self, plaintext: &str) -> Result<String, ServiceError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| ServiceError::EncryptionError(format!("encryption failed: {}", e)))?;

        let mut combined = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        combined.extend_from_slice(&nonce);
        combined.extend_from_slice(&ciphertext);

        Ok(BASE64.encode(combined))
    }

    fn decrypt(&self, ciphertext: &str) -> Result<String, ServiceError> {
        let combined = BASE64
            .decode(ciphertext)
            .map_err(|e| ServiceError::EncryptionError(format!("invalid base64: {}", e)))?;

        if combined.len() <= NONCE_LEN {
            return Err(ServiceError::EncryptionError(
                "ciphertext too short".to_string(),
            ));
        }

        let (nonce_bytes, encrypted) = combined.split_at(NONCE_LEN);
        let nonce = Nonce::clone_from_slice(nonce_bytes);

        let plaintext = self
            .cipher
            .decrypt(&nonce, encrypted)
            .map_err(|e| ServiceError::EncryptionError(format!("decryption failed: {}", e)))?;

        String::from_utf8(plaintext)
            .map_err(|e| ServiceError::EncryptionError(format!("invalid utf-8: {}", e)))
    }
}
