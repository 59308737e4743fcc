// Encryption-at-rest for provider secrets (§9 supplemented feature): an
// envelope scheme trimmed to a single-key need — resolved provider API keys
// cached to disk alongside `ConfigModel`, not user passwords.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StorageError};

const NONCE_SIZE: usize = 12;
const KEY_SIZE: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedPayload {
    pub nonce: String,
    pub ciphertext: String,
}

/// Wraps a single AES-256-GCM key read from `SECRETS_ENCRYPTION_KEY`.
/// Absent entirely when the env var is unset — callers degrade to storing
/// cleartext rather than failing startup (§9 "graceful degrade when unset").
#[derive(Clone)]
pub struct EncryptionService {
    cipher: Aes256Gcm,
}

impl EncryptionService {
    pub fn from_base64_key(key: &str) -> Result<Self> {
        let bytes = BASE64
            .decode(key)
            .map_err(|e| StorageError::Encryption(format!("invalid base64 key: {e}")))?;
        if bytes.len() != KEY_SIZE {
            return Err(StorageError::Encryption(format!(
                "encryption key must be {KEY_SIZE} bytes, got {}",
                bytes.len()
            )));
        }
        let cipher = Aes256Gcm::new_from_slice(&bytes)
            .map_err(|e| StorageError::Encryption(e.to_string()))?;
        Ok(Self { cipher })
    }

    /// Returns `Ok(None)` when `SECRETS_ENCRYPTION_KEY` is unset, so callers
    /// can fall back to cleartext rather than treating a missing key as a
    /// startup error.
    pub fn from_env() -> Result<Option<Self>> {
        match std::env::var("SECRETS_ENCRYPTION_KEY") {
            Ok(key) => Self::from_base64_key(&key).map(Some),
            Err(_) => Ok(None),
        }
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<EncryptedPayload> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| StorageError::Encryption(e.to_string()))?;

        Ok(EncryptedPayload {
            nonce: BASE64.encode(nonce_bytes),
            ciphertext: BASE64.encode(ciphertext),
        })
    }

    pub fn decrypt(&self, payload: &EncryptedPayload) -> Result<String> {
        let nonce_bytes = BASE64
            .decode(&payload.nonce)
            .map_err(|e| StorageError::Encryption(e.to_string()))?;
        let ciphertext = BASE64
            .decode(&payload.ciphertext)
            .map_err(|e| StorageError::Encryption(e.to_string()))?;
        let nonce = Nonce::from_slice(&nonce_bytes);

        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext.as_slice())
            .map_err(|e| StorageError::Encryption(e.to_string()))?;

        String::from_utf8(plaintext).map_err(|e| StorageError::Encryption(e.to_string()))
    }
}

/// A 32-byte key suitable for `SECRETS_ENCRYPTION_KEY`, base64-encoded.
pub fn generate_encryption_key() -> String {
    let mut bytes = [0u8; KEY_SIZE];
    rand::thread_rng().fill_bytes(&mut bytes);
    BASE64.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_encrypt_decrypt() {
        let key = generate_encryption_key();
        let service = EncryptionService::from_base64_key(&key).unwrap();
        let payload = service.encrypt("sk-provider-secret").unwrap();
        assert_eq!(service.decrypt(&payload).unwrap(), "sk-provider-secret");
    }

    #[test]
    fn missing_env_var_degrades_to_none_not_error() {
        std::env::remove_var("SECRETS_ENCRYPTION_KEY");
        assert!(EncryptionService::from_env().unwrap().is_none());
    }

    #[test]
    fn rejects_key_of_wrong_length() {
        let short_key = BASE64.encode([0u8; 16]);
        assert!(EncryptionService::from_base64_key(&short_key).is_err());
    }
}
