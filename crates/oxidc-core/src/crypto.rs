//! Symmetric encryption for at-rest token storage.
//!
//! Refresh tokens are long-lived bearer credentials and are stored
//! encrypted inside the user session. The [`TokenCipher`] trait is the
//! seam the trust core depends on; [`AesGcmCipher`] is the default
//! AES-256-GCM implementation.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;

use crate::{AuthError, AuthResult};

/// AES-256-GCM nonce size in bytes.
const NONCE_SIZE: usize = 12;

/// Opaque symmetric encryption facility.
pub trait TokenCipher: Send + Sync {
    /// Encrypts a plaintext into an opaque, printable ciphertext.
    ///
    /// # Errors
    ///
    /// Returns an error if encryption fails.
    fn encrypt(&self, plaintext: &str) -> AuthResult<String>;

    /// Decrypts a ciphertext previously produced by [`TokenCipher::encrypt`].
    ///
    /// # Errors
    ///
    /// Returns an error if the ciphertext is malformed or fails
    /// authentication.
    fn decrypt(&self, ciphertext: &str) -> AuthResult<String>;
}

/// AES-256-GCM cipher producing base64url(nonce || ciphertext).
#[derive(Clone)]
pub struct AesGcmCipher {
    key: [u8; 32],
}

impl AesGcmCipher {
    /// Creates a cipher from a 32-byte key.
    #[must_use]
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Creates a cipher from a base64url-encoded 32-byte key.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the key does not decode to 32 bytes.
    pub fn from_base64(encoded: &str) -> AuthResult<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|e| AuthError::configuration(format!("invalid base64 cipher key: {e}")))?;
        let key: [u8; 32] = bytes
            .try_into()
            .map_err(|_| AuthError::configuration("cipher key must be 32 bytes"))?;
        Ok(Self::new(key))
    }
}

impl TokenCipher for AesGcmCipher {
    fn encrypt(&self, plaintext: &str) -> AuthResult<String> {
        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| AuthError::internal(format!("cipher init failed: {e}")))?;

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| AuthError::internal("encryption failed"))?;

        let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(URL_SAFE_NO_PAD.encode(out))
    }

    fn decrypt(&self, ciphertext: &str) -> AuthResult<String> {
        let bytes = URL_SAFE_NO_PAD
            .decode(ciphertext)
            .map_err(|_| AuthError::internal("ciphertext is not valid base64url"))?;
        if bytes.len() < NONCE_SIZE {
            return Err(AuthError::internal("ciphertext too short"));
        }

        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| AuthError::internal(format!("cipher init failed: {e}")))?;

        let (nonce_bytes, payload) = bytes.split_at(NONCE_SIZE);
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce_bytes), payload)
            .map_err(|_| AuthError::internal("decryption failed"))?;

        String::from_utf8(plaintext).map_err(|_| AuthError::internal("plaintext is not UTF-8"))
    }
}

/// No-op cipher for tests that do not exercise encryption.
#[derive(Default, Clone, Copy)]
pub struct NoopCipher;

impl TokenCipher for NoopCipher {
    fn encrypt(&self, plaintext: &str) -> AuthResult<String> {
        Ok(plaintext.to_string())
    }

    fn decrypt(&self, ciphertext: &str) -> AuthResult<String> {
        Ok(ciphertext.to_string())
    }
}

/// Generates a random 32-byte cipher key.
#[must_use]
pub fn generate_key() -> [u8; 32] {
    let mut key = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut key);
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_round_trip() {
        let cipher = AesGcmCipher::new(generate_key());
        let encrypted = cipher.encrypt("refresh-token-value").unwrap();

        assert_ne!(encrypted, "refresh-token-value");
        assert_eq!(cipher.decrypt(&encrypted).unwrap(), "refresh-token-value");
    }

    #[test]
    fn test_encrypt_is_randomized() {
        let cipher = AesGcmCipher::new(generate_key());
        let a = cipher.encrypt("same-plaintext").unwrap();
        let b = cipher.encrypt("same-plaintext").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_decrypt_rejects_wrong_key() {
        let cipher1 = AesGcmCipher::new(generate_key());
        let cipher2 = AesGcmCipher::new(generate_key());

        let encrypted = cipher1.encrypt("secret").unwrap();
        assert!(cipher2.decrypt(&encrypted).is_err());
    }

    #[test]
    fn test_decrypt_rejects_garbage() {
        let cipher = AesGcmCipher::new(generate_key());
        assert!(cipher.decrypt("not base64url!!!").is_err());
        assert!(cipher.decrypt("c2hvcnQ").is_err());
    }

    #[test]
    fn test_from_base64_key_validation() {
        let key = URL_SAFE_NO_PAD.encode(generate_key());
        assert!(AesGcmCipher::from_base64(&key).is_ok());

        let short = URL_SAFE_NO_PAD.encode([0u8; 16]);
        assert!(AesGcmCipher::from_base64(&short).is_err());
        assert!(AesGcmCipher::from_base64("!!!").is_err());
    }

    #[test]
    fn test_noop_cipher() {
        let cipher = NoopCipher;
        assert_eq!(cipher.encrypt("x").unwrap(), "x");
        assert_eq!(cipher.decrypt("x").unwrap(), "x");
    }
}
