//! Vault record storage with pluggable backends.
//!
//! Supports:
//! - `memory`: In-memory storage (non-persistent, for testing)
//! - `sqlite`: SQLite database (`vault_items` and `password_items` tables)

mod memory;
mod sqlite;

pub use memory::InMemoryVaultStore;
pub use sqlite::SqliteVaultStore;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use super::types::{PasswordItem, VaultItem};
use crate::config::StoreBackend;

pub type SharedVaultStore = Arc<dyn VaultStore>;

/// Vault store trait - implemented by all storage backends.
///
/// Listings are scoped to one user and ordered by `created_at` descending.
#[async_trait]
pub trait VaultStore: Send + Sync {
    /// Whether this store persists data across restarts.
    fn is_persistent(&self) -> bool;

    async fn list_documents(&self, user_id: &str) -> Result<Vec<VaultItem>, String>;

    async fn get_document(&self, id: Uuid) -> Result<Option<VaultItem>, String>;

    async fn insert_document(&self, item: &VaultItem) -> Result<(), String>;

    /// Delete a document record. Returns false if it did not exist.
    async fn delete_document(&self, id: Uuid) -> Result<bool, String>;

    async fn list_passwords(&self, user_id: &str) -> Result<Vec<PasswordItem>, String>;

    async fn get_password(&self, id: Uuid) -> Result<Option<PasswordItem>, String>;

    async fn insert_password(&self, item: &PasswordItem) -> Result<(), String>;

    /// Replace the encrypted blob of a password item.
    async fn update_password_blob(&self, id: Uuid, password_enc: &str) -> Result<(), String>;

    /// Delete a password record. Returns false if it did not exist.
    async fn delete_password(&self, id: Uuid) -> Result<bool, String>;

    /// Delete every record of every user. Returns `(documents, passwords)` removed.
    async fn clear_all(&self) -> Result<(usize, usize), String>;
}

/// Open the configured backend.
pub async fn open_store(backend: StoreBackend, data_dir: &Path) -> Result<SharedVaultStore, String> {
    match backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory vault store; records will not survive a restart");
            Ok(Arc::new(InMemoryVaultStore::new()))
        }
        StoreBackend::Sqlite => {
            let store = SqliteVaultStore::new(data_dir.to_path_buf()).await?;
            Ok(Arc::new(store))
        }
    }
}
