//! Note-text confidentiality. Encryption must not be deterministic across
//! calls; both directions are total over well-formed input.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::RngCore;

use crate::error::CoreError;

/// AES-256 key size in bytes
pub const KEY_SIZE: usize = 32;

/// Nonce size for AES-GCM
pub const NONCE_SIZE: usize = 12;

/// Opaque encrypt/decrypt of note text. Failures are fatal for the current
/// operation and never retried or swallowed.
pub trait CipherService: Send + Sync {
    fn encrypt(&self, plaintext: &str) -> Result<String, CoreError>;
    fn decrypt(&self, ciphertext: &str) -> Result<String, CoreError>;
}

/// AES-256-GCM with a fresh random nonce per call. Wire form is
/// `<nonce-hex>:<ciphertext-hex>` so ciphertexts are self-contained strings.
pub struct AesGcmCipher {
    key: [u8; KEY_SIZE],
}

impl AesGcmCipher {
    pub fn new(key: [u8; KEY_SIZE]) -> Self {
        Self { key }
    }

    /// Parse a 64-char hex key, as handed over via `AFTERCARE_ENCRYPTION_KEY`.
    pub fn from_hex_key(hex_key: &str) -> Result<Self, CoreError> {
        let bytes = hex::decode(hex_key.trim())
            .map_err(|_| CoreError::Cipher("encryption key is not valid hex".to_string()))?;
        let key: [u8; KEY_SIZE] = bytes
            .try_into()
            .map_err(|_| CoreError::Cipher("encryption key must be 32 bytes".to_string()))?;
        Ok(Self::new(key))
    }

    fn cipher(&self) -> Result<Aes256Gcm, CoreError> {
        Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| CoreError::Cipher(format!("failed to create cipher: {e}")))
    }
}

impl CipherService for AesGcmCipher {
    fn encrypt(&self, plaintext: &str) -> Result<String, CoreError> {
        let cipher = self.cipher()?;

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let encrypted = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| CoreError::Cipher(format!("encryption failed: {e}")))?;

        Ok(format!(
            "{}:{}",
            hex::encode(nonce_bytes),
            hex::encode(encrypted)
        ))
    }

    fn decrypt(&self, ciphertext: &str) -> Result<String, CoreError> {
        let (nonce_hex, body_hex) = ciphertext
            .split_once(':')
            .ok_or_else(|| CoreError::Cipher("ciphertext is missing the nonce prefix".to_string()))?;

        let nonce_bytes = hex::decode(nonce_hex)
            .map_err(|_| CoreError::Cipher("ciphertext nonce is not valid hex".to_string()))?;
        if nonce_bytes.len() != NONCE_SIZE {
            return Err(CoreError::Cipher("ciphertext nonce has wrong length".to_string()));
        }
        let body = hex::decode(body_hex)
            .map_err(|_| CoreError::Cipher("ciphertext body is not valid hex".to_string()))?;

        let cipher = self.cipher()?;
        let decrypted = cipher
            .decrypt(Nonce::from_slice(&nonce_bytes), body.as_ref())
            .map_err(|e| CoreError::Cipher(format!("decryption failed: {e}")))?;

        String::from_utf8(decrypted)
            .map_err(|_| CoreError::Cipher("decrypted bytes are not UTF-8".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_KEY: &str = "f3bdfaf6bdcd810396812312a4d09d8f2feea24e3fe27111aea0d8dd54a8ff6c";

    #[test]
    fn round_trips_note_text() {
        let cipher = AesGcmCipher::from_hex_key(TEST_KEY).unwrap();
        let encrypted = cipher.encrypt("Patient reports mild headaches.").unwrap();

        assert!(encrypted.contains(':'));
        assert_eq!(
            cipher.decrypt(&encrypted).unwrap(),
            "Patient reports mild headaches."
        );
    }

    #[test]
    fn encryption_is_not_deterministic_across_calls() {
        let cipher = AesGcmCipher::from_hex_key(TEST_KEY).unwrap();
        let first = cipher.encrypt("same plaintext").unwrap();
        let second = cipher.encrypt("same plaintext").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn rejects_malformed_ciphertext() {
        let cipher = AesGcmCipher::from_hex_key(TEST_KEY).unwrap();
        assert!(matches!(
            cipher.decrypt("invalid-format").unwrap_err(),
            CoreError::Cipher(_)
        ));
        assert!(matches!(
            cipher.decrypt("abcd:not-hex").unwrap_err(),
            CoreError::Cipher(_)
        ));
    }

    #[test]
    fn rejects_wrong_key() {
        let cipher = AesGcmCipher::from_hex_key(TEST_KEY).unwrap();
        let other = AesGcmCipher::new([7u8; KEY_SIZE]);

        let encrypted = cipher.encrypt("Secret message").unwrap();
        assert!(matches!(
            other.decrypt(&encrypted).unwrap_err(),
            CoreError::Cipher(_)
        ));
    }

    #[test]
    fn rejects_bad_key_material() {
        assert!(AesGcmCipher::from_hex_key("not hex").is_err());
        assert!(AesGcmCipher::from_hex_key("abcd").is_err());
    }
}
