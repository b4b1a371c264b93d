//! The vault: password entries, documents and notes for one owner each.
//!
//! - `types`: records and listing filters
//! - `store`: record persistence (memory or sqlite)
//! - `files`: uploaded file storage and signed download links
//! - `export`: CSV metadata export
//! - `service`: the operations the API calls, tying the above to the session cipher

pub mod export;
pub mod files;
mod service;
pub mod store;
mod types;

pub use files::{FileStore, FileStoreError, SignedUrl, FILES_ROUTE_PREFIX};
pub use service::{
    ClearReport, NewNote, NewPassword, NewUpload, RotationReport, SharedVaultService, VaultError,
    VaultResult, VaultService,
};
pub use store::{open_store, SharedVaultStore, VaultStore};
pub use types::{
    all_tags, non_empty, parse_tags, DocumentFilter, DocumentKind, PasswordFilter, PasswordItem,
    Sensitivity, VaultItem,
};
