//! In-memory vault store (non-persistent).

use super::VaultStore;
use crate::vault::types::{PasswordItem, VaultItem};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Clone)]
pub struct InMemoryVaultStore {
    documents: Arc<RwLock<HashMap<Uuid, VaultItem>>>,
    passwords: Arc<RwLock<HashMap<Uuid, PasswordItem>>>,
}

impl InMemoryVaultStore {
    pub fn new() -> Self {
        Self {
            documents: Arc::new(RwLock::new(HashMap::new())),
            passwords: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryVaultStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VaultStore for InMemoryVaultStore {
    fn is_persistent(&self) -> bool {
        false
    }

    async fn list_documents(&self, user_id: &str) -> Result<Vec<VaultItem>, String> {
        let mut items: Vec<VaultItem> = self
            .documents
            .read()
            .await
            .values()
            .filter(|d| d.user_id == user_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }

    async fn get_document(&self, id: Uuid) -> Result<Option<VaultItem>, String> {
        Ok(self.documents.read().await.get(&id).cloned())
    }

    async fn insert_document(&self, item: &VaultItem) -> Result<(), String> {
        let mut documents = self.documents.write().await;
        if documents.contains_key(&item.id) {
            return Err(format!("Document {} already exists", item.id));
        }
        documents.insert(item.id, item.clone());
        Ok(())
    }

    async fn delete_document(&self, id: Uuid) -> Result<bool, String> {
        Ok(self.documents.write().await.remove(&id).is_some())
    }

    async fn list_passwords(&self, user_id: &str) -> Result<Vec<PasswordItem>, String> {
        let mut items: Vec<PasswordItem> = self
            .passwords
            .read()
            .await
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }

    async fn get_password(&self, id: Uuid) -> Result<Option<PasswordItem>, String> {
        Ok(self.passwords.read().await.get(&id).cloned())
    }

    async fn insert_password(&self, item: &PasswordItem) -> Result<(), String> {
        let mut passwords = self.passwords.write().await;
        if passwords.contains_key(&item.id) {
            return Err(format!("Password item {} already exists", item.id));
        }
        passwords.insert(item.id, item.clone());
        Ok(())
    }

    async fn update_password_blob(&self, id: Uuid, password_enc: &str) -> Result<(), String> {
        let mut passwords = self.passwords.write().await;
        let item = passwords
            .get_mut(&id)
            .ok_or_else(|| format!("Password item {} not found", id))?;
        item.password_enc = password_enc.to_string();
        Ok(())
    }

    async fn delete_password(&self, id: Uuid) -> Result<bool, String> {
        Ok(self.passwords.write().await.remove(&id).is_some())
    }

    async fn clear_all(&self) -> Result<(usize, usize), String> {
        let mut documents = self.documents.write().await;
        let mut passwords = self.passwords.write().await;
        let counts = (documents.len(), passwords.len());
        documents.clear();
        passwords.clear();
        Ok(counts)
    }
}
