//! Passcode-based encryption for vault passwords.
//!
//! Every blob is self-describing: `BASE64(salt || nonce || ciphertext || tag)`.
//! The AES-256-GCM key is re-derived from the session passcode with
//! PBKDF2-HMAC-SHA256 on each call, so no key material outlives a call.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::RngCore;
use sha2::Sha256;
use thiserror::Error;
use zeroize::Zeroizing;

/// PBKDF2 iteration count.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Salt length in bytes.
pub const SALT_LENGTH: usize = 16;

/// Nonce length in bytes (96 bits for AES-GCM)
pub const NONCE_LENGTH: usize = 12;

/// Key length in bytes (256 bits for AES-256)
pub const KEY_LENGTH: usize = 32;

/// GCM authentication tag length in bytes.
pub const TAG_LENGTH: usize = 16;

/// Smallest decodable blob (empty plaintext).
pub const MIN_BLOB_LENGTH: usize = SALT_LENGTH + NONCE_LENGTH + TAG_LENGTH;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("Encryption failed")]
    EncryptionFailed,

    /// Covers wrong passcode, tampered blob and malformed input alike.
    #[error("Decryption failed - incorrect passcode or corrupted data")]
    DecryptionFailed,
}

/// Stateless cipher over passcode-derived keys.
#[derive(Debug, Clone, Copy)]
pub struct VaultCipher {
    iterations: u32,
}

impl Default for VaultCipher {
    fn default() -> Self {
        Self {
            iterations: PBKDF2_ITERATIONS,
        }
    }
}

impl VaultCipher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blobs produced with a non-default count cannot be read by the default cipher.
    #[cfg(test)]
    pub(crate) fn with_iterations(iterations: u32) -> Self {
        Self { iterations }
    }

    /// Derive the AES-256 key for `passcode` and `salt`.
    pub fn derive_key(&self, passcode: &str, salt: &[u8]) -> Zeroizing<[u8; KEY_LENGTH]> {
        let mut key = Zeroizing::new([0u8; KEY_LENGTH]);
        pbkdf2::pbkdf2_hmac::<Sha256>(passcode.as_bytes(), salt, self.iterations, &mut *key);
        key
    }

    /// Encrypt `plaintext` under `passcode`, returning the base64 blob.
    pub fn encrypt(&self, plaintext: &str, passcode: &str) -> Result<String, CryptoError> {
        let mut salt = [0u8; SALT_LENGTH];
        let mut nonce_bytes = [0u8; NONCE_LENGTH];
        let mut rng = rand::thread_rng();
        rng.fill_bytes(&mut salt);
        rng.fill_bytes(&mut nonce_bytes);

        let key = self.derive_key(passcode, &salt);
        let cipher =
            Aes256Gcm::new_from_slice(&key[..]).map_err(|_| CryptoError::EncryptionFailed)?;
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
            .map_err(|_| CryptoError::EncryptionFailed)?;

        let mut combined = Vec::with_capacity(SALT_LENGTH + NONCE_LENGTH + ciphertext.len());
        combined.extend_from_slice(&salt);
        combined.extend_from_slice(&nonce_bytes);
        combined.extend_from_slice(&ciphertext);

        Ok(BASE64.encode(&combined))
    }

    /// Decrypt a blob produced by [`VaultCipher::encrypt`].
    pub fn decrypt(&self, blob: &str, passcode: &str) -> Result<String, CryptoError> {
        let combined = BASE64
            .decode(blob)
            .map_err(|_| CryptoError::DecryptionFailed)?;
        if combined.len() < MIN_BLOB_LENGTH {
            return Err(CryptoError::DecryptionFailed);
        }

        let (salt, rest) = combined.split_at(SALT_LENGTH);
        let (nonce_bytes, ciphertext) = rest.split_at(NONCE_LENGTH);

        let key = self.derive_key(passcode, salt);
        let cipher =
            Aes256Gcm::new_from_slice(&key[..]).map_err(|_| CryptoError::DecryptionFailed)?;
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| CryptoError::DecryptionFailed)?;

        String::from_utf8(plaintext).map_err(|_| CryptoError::DecryptionFailed)
    }

    /// Whether `passcode` unlocks `blob`.
    pub fn validate(&self, blob: &str, passcode: &str) -> bool {
        self.decrypt(blob, passcode).is_ok()
    }
}

/// Encrypt with the default cipher parameters.
pub fn encrypt_password(plaintext: &str, passcode: &str) -> Result<String, CryptoError> {
    VaultCipher::default().encrypt(plaintext, passcode)
}

/// Decrypt with the default cipher parameters.
pub fn decrypt_password(blob: &str, passcode: &str) -> Result<String, CryptoError> {
    VaultCipher::default().decrypt(blob, passcode)
}

/// Non-failing check that `passcode` decrypts `blob`.
pub fn validate_passcode(blob: &str, passcode: &str) -> bool {
    VaultCipher::default().validate(blob, passcode)
}
