//! # Session Vault
//!
//! Self-hosted vault for passwords, documents and notes.
//!
//! Passwords are encrypted with a key derived from a passcode the user enters
//! per session. The passcode lives in memory only, so a stored entry is
//! readable solely by someone who knows the passcode that produced it.
//!
//! ## Modules
//! - `secrets`: passcode cipher and in-memory vault sessions
//! - `vault`: records, stores, file storage, CSV export and the vault service
//! - `api`: axum HTTP API with dashboard JWT auth
//! - `config`: environment configuration

pub mod api;
pub mod config;
pub mod secrets;
pub mod util;
pub mod vault;

pub use config::Config;
pub use secrets::{decrypt_password, encrypt_password, validate_passcode, CryptoError};
pub use vault::{VaultError, VaultService};
