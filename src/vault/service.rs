//! Vault operations: records, files and session-passcode encryption together.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;
use zeroize::Zeroizing;

use super::export;
use super::files::{FileStore, FileStoreError, SignedUrl};
use super::store::SharedVaultStore;
use super::types::{
    all_tags, non_empty, DocumentFilter, DocumentKind, PasswordFilter, PasswordItem, Sensitivity,
    VaultItem,
};
use crate::secrets::{
    CryptoError, PasscodeError, SessionPasscode, SharedSessionStore, VaultCipher,
};

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("Vault is locked")]
    Locked,

    #[error(transparent)]
    Passcode(#[from] PasscodeError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error(transparent)]
    File(#[from] FileStoreError),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type VaultResult<T> = Result<T, VaultError>;

/// Input for a new password entry. `password` is plaintext and is encrypted
/// before it reaches the store.
#[derive(Debug, Clone, Deserialize)]
pub struct NewPassword {
    pub title: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    pub password: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub ftu_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewNote {
    pub title: String,
    pub value: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub ftu_id: Option<String>,
    #[serde(default)]
    pub sensitivity: Sensitivity,
}

#[derive(Debug, Clone)]
pub struct NewUpload {
    /// Falls back to the file name when blank.
    pub title: Option<String>,
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
    pub tags: Vec<String>,
    pub ftu_id: Option<String>,
    pub sensitivity: Sensitivity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RotationReport {
    pub reencrypted: usize,
    /// Items that the old passcode could not open; left untouched.
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClearReport {
    pub documents: usize,
    pub passwords: usize,
    pub files: usize,
}

pub struct VaultService {
    store: SharedVaultStore,
    files: Arc<FileStore>,
    sessions: SharedSessionStore,
    cipher: VaultCipher,
    signed_url_ttl: Duration,
    /// Serializes passcode rotation against new password writes, per user.
    write_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

pub type SharedVaultService = Arc<VaultService>;

fn required_title(title: &str) -> VaultResult<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(VaultError::InvalidInput("Title is required".to_string()));
    }
    Ok(title.to_string())
}

fn clean_tags(tags: Vec<String>) -> Vec<String> {
    tags.into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

impl VaultService {
    pub fn new(
        store: SharedVaultStore,
        files: Arc<FileStore>,
        sessions: SharedSessionStore,
        signed_url_ttl: Duration,
    ) -> Self {
        Self {
            store,
            files,
            sessions,
            cipher: VaultCipher::default(),
            signed_url_ttl,
            write_locks: Mutex::new(HashMap::new()),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_cipher(mut self, cipher: VaultCipher) -> Self {
        self.cipher = cipher;
        self
    }

    pub fn is_persistent(&self) -> bool {
        self.store.is_persistent()
    }

    pub fn files(&self) -> &FileStore {
        &self.files
    }

    pub fn sessions(&self) -> &SharedSessionStore {
        &self.sessions
    }

    // PBKDF2 is CPU-bound; keep it off the async workers.
    async fn encrypt(&self, plaintext: Zeroizing<String>, passcode: SessionPasscode) -> VaultResult<String> {
        let cipher = self.cipher;
        tokio::task::spawn_blocking(move || cipher.encrypt(&plaintext, passcode.expose()))
            .await
            .map_err(|e| VaultError::Internal(e.to_string()))?
            .map_err(VaultError::from)
    }

    async fn decrypt(&self, blob: String, passcode: SessionPasscode) -> VaultResult<Zeroizing<String>> {
        let cipher = self.cipher;
        tokio::task::spawn_blocking(move || cipher.decrypt(&blob, passcode.expose()).map(Zeroizing::new))
            .await
            .map_err(|e| VaultError::Internal(e.to_string()))?
            .map_err(VaultError::from)
    }

    async fn session_passcode(&self, user_id: &str, session_id: Option<Uuid>) -> VaultResult<SessionPasscode> {
        let session_id = session_id.ok_or(VaultError::Locked)?;
        self.sessions
            .passcode(session_id, user_id)
            .await
            .ok_or(VaultError::Locked)
    }

    async fn write_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.write_locks.lock().await;
        Arc::clone(locks.entry(user_id.to_string()).or_default())
    }

    async fn owned_password(&self, user_id: &str, id: Uuid) -> VaultResult<PasswordItem> {
        self.store
            .get_password(id)
            .await
            .map_err(VaultError::Store)?
            .filter(|p| p.user_id == user_id)
            .ok_or_else(|| VaultError::NotFound("Password item".to_string()))
    }

    async fn owned_document(&self, user_id: &str, id: Uuid) -> VaultResult<VaultItem> {
        self.store
            .get_document(id)
            .await
            .map_err(VaultError::Store)?
            .filter(|d| d.user_id == user_id)
            .ok_or_else(|| VaultError::NotFound("Document".to_string()))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Session
    // ─────────────────────────────────────────────────────────────────────

    /// Open a vault session with a passcode entered twice.
    pub async fn unlock(&self, user_id: &str, passcode: &str, confirm: &str) -> VaultResult<Uuid> {
        let passcode = SessionPasscode::new(passcode, confirm)?;
        Ok(self.sessions.unlock(user_id, passcode).await)
    }

    pub async fn lock(&self, user_id: &str, session_id: Uuid) -> bool {
        self.sessions.lock(session_id, user_id).await
    }

    pub async fn is_unlocked(&self, user_id: &str, session_id: Option<Uuid>) -> bool {
        self.session_passcode(user_id, session_id).await.is_ok()
    }

    /// Re-encrypt every password of the user under a new passcode.
    ///
    /// Entries the current passcode cannot open are skipped. If a store write
    /// fails, entries already rewritten are restored and the session keeps its
    /// old passcode.
    pub async fn rotate_passcode(
        &self,
        user_id: &str,
        session_id: Option<Uuid>,
        new_passcode: &str,
        confirm: &str,
    ) -> VaultResult<RotationReport> {
        let lock = self.write_lock(user_id).await;
        let _guard = lock.lock().await;

        let old = self.session_passcode(user_id, session_id).await?;
        let new = SessionPasscode::new(new_passcode, confirm)?;

        let items = self
            .store
            .list_passwords(user_id)
            .await
            .map_err(VaultError::Store)?;

        let mut rewritten: Vec<(Uuid, String)> = Vec::new();
        let mut skipped = 0;
        for item in items {
            let plaintext = match self.decrypt(item.password_enc.clone(), old.clone()).await {
                Ok(p) => p,
                Err(VaultError::Crypto(_)) => {
                    skipped += 1;
                    continue;
                }
                Err(e) => {
                    self.restore_blobs(&rewritten).await;
                    return Err(e);
                }
            };
            let blob = match self.encrypt(plaintext, new.clone()).await {
                Ok(blob) => blob,
                Err(e) => {
                    self.restore_blobs(&rewritten).await;
                    return Err(e);
                }
            };
            if let Err(e) = self.store.update_password_blob(item.id, &blob).await {
                tracing::error!("Passcode rotation failed on item {}: {}", item.id, e);
                self.restore_blobs(&rewritten).await;
                return Err(VaultError::Store(e));
            }
            rewritten.push((item.id, item.password_enc));
        }

        let replaced = match session_id {
            Some(session_id) => self.sessions.replace_passcode(session_id, user_id, new).await,
            None => false,
        };
        if !replaced {
            tracing::warn!(
                "Vault session for {} ended during rotation; unlock again with the new passcode",
                user_id
            );
        }
        tracing::info!(
            "Rotated vault passcode for {}: {} re-encrypted, {} skipped",
            user_id,
            rewritten.len(),
            skipped
        );
        Ok(RotationReport {
            reencrypted: rewritten.len(),
            skipped,
        })
    }

    async fn restore_blobs(&self, originals: &[(Uuid, String)]) {
        for (id, blob) in originals {
            if let Err(e) = self.store.update_password_blob(*id, blob).await {
                tracing::error!("Failed to restore password item {}: {}", id, e);
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Passwords
    // ─────────────────────────────────────────────────────────────────────

    pub async fn add_password(
        &self,
        user_id: &str,
        session_id: Option<Uuid>,
        req: NewPassword,
    ) -> VaultResult<PasswordItem> {
        let lock = self.write_lock(user_id).await;
        let _guard = lock.lock().await;

        let passcode = self.session_passcode(user_id, session_id).await?;
        let title = required_title(&req.title)?;
        let password_enc = self.encrypt(Zeroizing::new(req.password), passcode).await?;

        let item = PasswordItem {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            title,
            username: non_empty(req.username),
            url: non_empty(req.url),
            password_enc,
            tags: clean_tags(req.tags),
            ftu_id: non_empty(req.ftu_id),
            created_at: Utc::now(),
        };
        self.store
            .insert_password(&item)
            .await
            .map_err(VaultError::Store)?;
        tracing::info!("Added password item {} for {}", item.id, user_id);
        Ok(item)
    }

    /// Decrypt one password with the session passcode.
    pub async fn reveal_password(
        &self,
        user_id: &str,
        session_id: Option<Uuid>,
        id: Uuid,
    ) -> VaultResult<Zeroizing<String>> {
        let passcode = self.session_passcode(user_id, session_id).await?;
        let item = self.owned_password(user_id, id).await?;
        self.decrypt(item.password_enc, passcode).await
    }

    /// Whether `passcode` opens the given entry. Does not need an open session.
    pub async fn validate_password_passcode(
        &self,
        user_id: &str,
        id: Uuid,
        passcode: &str,
    ) -> VaultResult<bool> {
        let item = self.owned_password(user_id, id).await?;
        let cipher = self.cipher;
        let passcode = Zeroizing::new(passcode.to_string());
        tokio::task::spawn_blocking(move || cipher.validate(&item.password_enc, &passcode))
            .await
            .map_err(|e| VaultError::Internal(e.to_string()))
    }

    pub async fn list_passwords(
        &self,
        user_id: &str,
        filter: &PasswordFilter,
    ) -> VaultResult<Vec<PasswordItem>> {
        let items = self
            .store
            .list_passwords(user_id)
            .await
            .map_err(VaultError::Store)?;
        Ok(items.into_iter().filter(|p| filter.matches(p)).collect())
    }

    pub async fn delete_password(&self, user_id: &str, id: Uuid) -> VaultResult<()> {
        self.owned_password(user_id, id).await?;
        self.store
            .delete_password(id)
            .await
            .map_err(VaultError::Store)?;
        tracing::info!("Deleted password item {}", id);
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Documents
    // ─────────────────────────────────────────────────────────────────────

    pub async fn add_note(&self, user_id: &str, req: NewNote) -> VaultResult<VaultItem> {
        let item = VaultItem {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            title: required_title(&req.title)?,
            kind: DocumentKind::Note,
            value: Some(req.value),
            storage_path: None,
            file_size: None,
            file_type: None,
            tags: clean_tags(req.tags),
            ftu_id: non_empty(req.ftu_id),
            sensitivity: req.sensitivity,
            created_at: Utc::now(),
        };
        self.store
            .insert_document(&item)
            .await
            .map_err(VaultError::Store)?;
        Ok(item)
    }

    /// Store the file, then its record. A failed insert removes the file again.
    pub async fn upload_document(&self, user_id: &str, req: NewUpload) -> VaultResult<VaultItem> {
        let title = match non_empty(req.title) {
            Some(title) => title,
            None => required_title(&req.file_name)?,
        };
        let storage_path = self
            .files
            .upload(user_id, &req.file_name, &req.bytes)
            .await?;

        let item = VaultItem {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            title,
            kind: DocumentKind::Doc,
            value: None,
            storage_path: Some(storage_path.clone()),
            file_size: Some(req.bytes.len() as u64),
            file_type: non_empty(req.content_type),
            tags: clean_tags(req.tags),
            ftu_id: non_empty(req.ftu_id),
            sensitivity: req.sensitivity,
            created_at: Utc::now(),
        };

        if let Err(e) = self.store.insert_document(&item).await {
            if let Err(cleanup) = self.files.remove(&storage_path).await {
                tracing::warn!("Failed to remove orphaned upload {}: {}", storage_path, cleanup);
            }
            return Err(VaultError::Store(e));
        }
        tracing::info!("Uploaded document {} ({} bytes)", item.id, req.bytes.len());
        Ok(item)
    }

    pub async fn document_url(&self, user_id: &str, id: Uuid) -> VaultResult<SignedUrl> {
        let item = self.owned_document(user_id, id).await?;
        let path = item
            .storage_path
            .ok_or_else(|| VaultError::InvalidInput("Item has no stored file".to_string()))?;
        Ok(self.files.signed_url(&path, self.signed_url_ttl))
    }

    /// Remove the stored file (if any) and then the record.
    ///
    /// A storage failure is logged and does not block deleting the record.
    pub async fn delete_document(&self, user_id: &str, id: Uuid) -> VaultResult<()> {
        let item = self.owned_document(user_id, id).await?;
        if let Some(path) = item.storage_path.as_deref() {
            if let Err(e) = self.files.remove(path).await {
                tracing::warn!("Failed to delete storage file {}: {}", path, e);
            }
        }
        self.store
            .delete_document(id)
            .await
            .map_err(VaultError::Store)?;
        tracing::info!("Deleted document {}", id);
        Ok(())
    }

    pub async fn list_documents(
        &self,
        user_id: &str,
        filter: &DocumentFilter,
    ) -> VaultResult<Vec<VaultItem>> {
        let items = self
            .store
            .list_documents(user_id)
            .await
            .map_err(VaultError::Store)?;
        Ok(items.into_iter().filter(|d| filter.matches(d)).collect())
    }

    pub async fn all_tags(&self, user_id: &str) -> VaultResult<Vec<String>> {
        let documents = self
            .store
            .list_documents(user_id)
            .await
            .map_err(VaultError::Store)?;
        let passwords = self
            .store
            .list_passwords(user_id)
            .await
            .map_err(VaultError::Store)?;
        Ok(all_tags(&documents, &passwords))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Export & maintenance
    // ─────────────────────────────────────────────────────────────────────

    pub async fn export_documents_csv(
        &self,
        user_id: &str,
        filter: &DocumentFilter,
    ) -> VaultResult<String> {
        let items = self.list_documents(user_id, filter).await?;
        Ok(export::documents_csv(&items))
    }

    pub async fn export_passwords_csv(
        &self,
        user_id: &str,
        filter: &PasswordFilter,
    ) -> VaultResult<String> {
        let items = self.list_passwords(user_id, filter).await?;
        Ok(export::passwords_csv(&items))
    }

    /// Wipe every record of every user and all stored files.
    pub async fn clear_all(&self) -> VaultResult<ClearReport> {
        let (documents, passwords) = self.store.clear_all().await.map_err(VaultError::Store)?;
        let files = self.files.clear().await?;
        Ok(ClearReport {
            documents,
            passwords,
            files,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::SessionStore;
    use crate::vault::store::InMemoryVaultStore;

    struct Fixture {
        service: VaultService,
        _temp: tempfile::TempDir,
    }

    fn fixture() -> Fixture {
        let temp = tempfile::tempdir().expect("tempdir");
        let files = FileStore::new(temp.path().join("files"), "test-secret", 1024);
        let service = VaultService::new(
            Arc::new(InMemoryVaultStore::new()),
            Arc::new(files),
            Arc::new(SessionStore::new(Duration::from_secs(60))),
            Duration::from_secs(60),
        )
        .with_cipher(VaultCipher::with_iterations(10));
        Fixture {
            service,
            _temp: temp,
        }
    }

    fn new_password(title: &str, password: &str) -> NewPassword {
        NewPassword {
            title: title.to_string(),
            username: Some("ceo@example.com".to_string()),
            url: Some("  ".to_string()),
            password: password.to_string(),
            tags: vec![" finance ".to_string(), "".to_string()],
            ftu_id: None,
        }
    }

    fn upload(name: &str, bytes: &'static [u8]) -> NewUpload {
        NewUpload {
            title: None,
            file_name: name.to_string(),
            content_type: Some("application/pdf".to_string()),
            bytes: Bytes::from_static(bytes),
            tags: vec!["legal".to_string()],
            ftu_id: None,
            sensitivity: Sensitivity::High,
        }
    }

    #[tokio::test]
    async fn add_and_reveal_password() {
        let f = fixture();
        let session = f.service.unlock("alice", "demo1234", "demo1234").await.unwrap();

        let item = f
            .service
            .add_password("alice", Some(session), new_password("Bank", "Sup3rSecret!"))
            .await
            .unwrap();
        assert_ne!(item.password_enc, "Sup3rSecret!");
        assert_eq!(item.url, None);
        assert_eq!(item.tags, vec!["finance"]);

        let revealed = f
            .service
            .reveal_password("alice", Some(session), item.id)
            .await
            .unwrap();
        assert_eq!(revealed.as_str(), "Sup3rSecret!");

        assert!(f
            .service
            .validate_password_passcode("alice", item.id, "demo1234")
            .await
            .unwrap());
        assert!(!f
            .service
            .validate_password_passcode("alice", item.id, "wrongpass")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn locked_vault_rejects_secret_operations() {
        let f = fixture();
        let result = f
            .service
            .add_password("alice", None, new_password("Bank", "x"))
            .await;
        assert!(matches!(result, Err(VaultError::Locked)));

        let session = f.service.unlock("alice", "demo1234", "demo1234").await.unwrap();
        assert!(f.service.is_unlocked("alice", Some(session)).await);
        assert!(!f.service.is_unlocked("bob", Some(session)).await);
        assert!(f.service.lock("alice", session).await);

        let result = f
            .service
            .add_password("alice", Some(session), new_password("Bank", "x"))
            .await;
        assert!(matches!(result, Err(VaultError::Locked)));
    }

    #[tokio::test]
    async fn unlock_enforces_passcode_policy() {
        let f = fixture();
        assert!(matches!(
            f.service.unlock("alice", "abc", "abc").await,
            Err(VaultError::Passcode(PasscodeError::TooShort))
        ));
        assert!(matches!(
            f.service.unlock("alice", "abcd", "abcx").await,
            Err(VaultError::Passcode(PasscodeError::Mismatch))
        ));
    }

    #[tokio::test]
    async fn reveal_with_other_sessions_passcode_fails_generically() {
        let f = fixture();
        let first = f.service.unlock("alice", "first-pass", "first-pass").await.unwrap();
        let item = f
            .service
            .add_password("alice", Some(first), new_password("Bank", "secret"))
            .await
            .unwrap();

        let second = f.service.unlock("alice", "second-pass", "second-pass").await.unwrap();
        let result = f.service.reveal_password("alice", Some(second), item.id).await;
        assert!(matches!(
            result,
            Err(VaultError::Crypto(CryptoError::DecryptionFailed))
        ));
    }

    #[tokio::test]
    async fn other_users_items_are_not_found() {
        let f = fixture();
        let session = f.service.unlock("alice", "demo1234", "demo1234").await.unwrap();
        let item = f
            .service
            .add_password("alice", Some(session), new_password("Bank", "secret"))
            .await
            .unwrap();

        assert!(matches!(
            f.service.delete_password("bob", item.id).await,
            Err(VaultError::NotFound(_))
        ));
        assert!(f
            .service
            .list_passwords("bob", &PasswordFilter::default())
            .await
            .unwrap()
            .is_empty());
        f.service.delete_password("alice", item.id).await.unwrap();
    }

    #[tokio::test]
    async fn rotation_reencrypts_readable_items_only() {
        let f = fixture();
        let old_session = f.service.unlock("alice", "old-pass", "old-pass").await.unwrap();
        let a = f
            .service
            .add_password("alice", Some(old_session), new_password("A", "alpha"))
            .await
            .unwrap();
        let b = f
            .service
            .add_password("alice", Some(old_session), new_password("B", "beta"))
            .await
            .unwrap();
        let foreign_session = f.service.unlock("alice", "foreign", "foreign").await.unwrap();
        let c = f
            .service
            .add_password("alice", Some(foreign_session), new_password("C", "gamma"))
            .await
            .unwrap();

        let report = f
            .service
            .rotate_passcode("alice", Some(old_session), "new-pass", "new-pass")
            .await
            .unwrap();
        assert_eq!(
            report,
            RotationReport {
                reencrypted: 2,
                skipped: 1
            }
        );

        for (id, expected) in [(a.id, "alpha"), (b.id, "beta")] {
            let revealed = f
                .service
                .reveal_password("alice", Some(old_session), id)
                .await
                .unwrap();
            assert_eq!(revealed.as_str(), expected);
        }
        assert!(f
            .service
            .validate_password_passcode("alice", c.id, "foreign")
            .await
            .unwrap());
        assert!(!f
            .service
            .validate_password_passcode("alice", a.id, "old-pass")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn password_added_during_rotation_uses_new_passcode() {
        let f = fixture();
        let session = f.service.unlock("alice", "old-pass", "old-pass").await.unwrap();
        for i in 0..5 {
            f.service
                .add_password("alice", Some(session), new_password(&format!("P{i}"), "x"))
                .await
                .unwrap();
        }

        let (report, added) = tokio::join!(
            f.service
                .rotate_passcode("alice", Some(session), "new-pass", "new-pass"),
            f.service
                .add_password("alice", Some(session), new_password("Late", "late-secret")),
        );
        report.unwrap();
        added.unwrap();

        let items = f
            .service
            .list_passwords("alice", &PasswordFilter::default())
            .await
            .unwrap();
        assert_eq!(items.len(), 6);
        for item in items {
            assert!(f
                .service
                .validate_password_passcode("alice", item.id, "new-pass")
                .await
                .unwrap());
        }
    }

    #[tokio::test]
    async fn upload_list_and_delete_documents() {
        let f = fixture();
        let doc = f
            .service
            .upload_document("alice", upload("Term Sheet.pdf", b"%PDF"))
            .await
            .unwrap();
        assert_eq!(doc.title, "Term Sheet.pdf");
        assert_eq!(doc.file_size, Some(4));
        let note = f
            .service
            .add_note(
                "alice",
                NewNote {
                    title: "Ideas".to_string(),
                    value: "private".to_string(),
                    tags: vec!["board".to_string()],
                    ftu_id: None,
                    sensitivity: Sensitivity::Low,
                },
            )
            .await
            .unwrap();

        let notes_only = DocumentFilter {
            kind: Some(DocumentKind::Note),
            ..Default::default()
        };
        let listed = f.service.list_documents("alice", &notes_only).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, note.id);

        assert_eq!(f.service.all_tags("alice").await.unwrap().len(), 2);

        let signed = f.service.document_url("alice", doc.id).await.unwrap();
        let key = doc.storage_path.clone().unwrap();
        let sig = signed.url.rsplit("sig=").next().unwrap();
        assert!(f.service.files().verify(&key, signed.expires, sig));
        assert!(matches!(
            f.service.document_url("alice", note.id).await,
            Err(VaultError::InvalidInput(_))
        ));

        f.service.delete_document("alice", doc.id).await.unwrap();
        assert!(matches!(
            f.service.files().open(&key).await,
            Err(FileStoreError::NotFound)
        ));
        // Record deletion proceeds even when the file is already gone.
        let orphan = f
            .service
            .upload_document("alice", upload("x.pdf", b"x"))
            .await
            .unwrap();
        f.service
            .files()
            .remove(orphan.storage_path.as_deref().unwrap())
            .await
            .unwrap();
        f.service.delete_document("alice", orphan.id).await.unwrap();
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected() {
        let f = fixture();
        static BIG: [u8; 2048] = [0u8; 2048];
        let result = f.service.upload_document("alice", upload("big.bin", &BIG)).await;
        assert!(matches!(
            result,
            Err(VaultError::File(FileStoreError::TooLarge { .. }))
        ));
        assert!(f
            .service
            .list_documents("alice", &DocumentFilter::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn export_and_clear() {
        let f = fixture();
        let session = f.service.unlock("alice", "demo1234", "demo1234").await.unwrap();
        let item = f
            .service
            .add_password("alice", Some(session), new_password("Bank", "Sup3rSecret!"))
            .await
            .unwrap();
        f.service
            .upload_document("alice", upload("deck.pdf", b"deck"))
            .await
            .unwrap();

        let csv = f
            .service
            .export_passwords_csv("alice", &PasswordFilter::default())
            .await
            .unwrap();
        assert!(csv.contains("Bank"));
        assert!(!csv.contains(&item.password_enc));

        let report = f.service.clear_all().await.unwrap();
        assert_eq!(
            report,
            ClearReport {
                documents: 1,
                passwords: 1,
                files: 1
            }
        );
    }
}
