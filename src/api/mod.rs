//! HTTP API for the vault.
//!
//! ## Endpoints
//!
//! - `GET /api/health` - Health check
//! - `POST /api/auth/login` - Exchange the dashboard password for a JWT
//! - `GET /api/files/{key}` - Signed download of an uploaded file
//! - `POST /api/vault/unlock` - Open a vault session with a passcode
//! - `POST /api/vault/lock` - End the vault session
//! - `GET /api/vault/status` - Whether the session is unlocked
//! - `POST /api/vault/rotate` - Re-encrypt passwords under a new passcode
//! - `GET /api/vault/tags` - All tags in use
//! - `GET|POST /api/vault/passwords` - List or add password entries
//! - `DELETE /api/vault/passwords/{id}` - Delete a password entry
//! - `POST /api/vault/passwords/{id}/reveal` - Decrypt with the session passcode
//! - `POST /api/vault/passwords/{id}/validate` - Check a passcode against an entry
//! - `GET /api/vault/passwords/export` - CSV metadata export
//! - `GET /api/vault/documents` - List documents and notes
//! - `POST /api/vault/documents/notes` - Add a note
//! - `POST /api/vault/documents/upload` - Upload a file (multipart)
//! - `DELETE /api/vault/documents/{id}` - Delete a document or note
//! - `GET /api/vault/documents/{id}/url` - Signed download link
//! - `GET /api/vault/documents/export` - CSV metadata export

mod auth;
mod files;
mod routes;
pub mod types;
pub mod vault;

pub use auth::{AuthUser, DEV_USER_HEADER};
pub use routes::{router, serve, AppState};
pub use types::*;
pub use vault::SESSION_HEADER;
