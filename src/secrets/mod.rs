//! Session passcode encryption for vault passwords.
//!
//! ## Architecture
//!
//! ```text
//!   unlock(passcode, confirm)
//!            │
//!            ▼
//!   ┌─────────────────┐   passcode   ┌──────────────────────────────┐
//!   │  SessionStore   │ ───────────▶ │  VaultCipher                 │
//!   │ (memory only)   │              │  PBKDF2-SHA256 → AES-256-GCM │
//!   └─────────────────┘              └──────────────┬───────────────┘
//!                                                   │
//!                                                   ▼
//!                             BASE64(salt[16] || nonce[12] || ciphertext || tag[16])
//! ```
//!
//! The passcode is never persisted. A blob is readable only by whoever knows
//! the passcode that produced it.
//!
//! ## Usage
//!
//! ```ignore
//! let passcode = SessionPasscode::new("demo1234", "demo1234")?;
//! let blob = encrypt_password("Sup3rSecret!", passcode.expose())?;
//! assert!(validate_passcode(&blob, "demo1234"));
//! ```

mod crypto;
mod session;

pub use crypto::{
    decrypt_password, encrypt_password, validate_passcode, CryptoError, VaultCipher,
    KEY_LENGTH, MIN_BLOB_LENGTH, NONCE_LENGTH, PBKDF2_ITERATIONS, SALT_LENGTH, TAG_LENGTH,
};
pub use session::{
    PasscodeError, SessionPasscode, SessionStore, SharedSessionStore, MIN_PASSCODE_CHARS,
};
