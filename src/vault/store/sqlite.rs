//! SQLite-based vault store.

use super::VaultStore;
use crate::vault::types::{DocumentKind, PasswordItem, Sensitivity, VaultItem};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

const SCHEMA: &str = r#"
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS vault_items (
    id TEXT PRIMARY KEY NOT NULL,
    user_id TEXT NOT NULL,
    title TEXT NOT NULL,
    kind TEXT NOT NULL DEFAULT 'doc',
    value TEXT,
    storage_path TEXT,
    file_size INTEGER,
    file_type TEXT,
    tags TEXT NOT NULL DEFAULT '[]',
    ftu_id TEXT,
    sensitivity TEXT NOT NULL DEFAULT 'Low',
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_vault_items_user_created ON vault_items(user_id, created_at DESC);

CREATE TABLE IF NOT EXISTS password_items (
    id TEXT PRIMARY KEY NOT NULL,
    user_id TEXT NOT NULL,
    title TEXT NOT NULL,
    username TEXT,
    url TEXT,
    password_enc TEXT NOT NULL,
    tags TEXT NOT NULL DEFAULT '[]',
    ftu_id TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_password_items_user_created ON password_items(user_id, created_at DESC);
"#;

const DOCUMENT_COLUMNS: &str = "id, user_id, title, kind, value, storage_path, file_size, \
     file_type, tags, ftu_id, sensitivity, created_at";

const PASSWORD_COLUMNS: &str =
    "id, user_id, title, username, url, password_enc, tags, ftu_id, created_at";

pub struct SqliteVaultStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteVaultStore {
    pub async fn new(base_dir: PathBuf) -> Result<Self, String> {
        tokio::fs::create_dir_all(&base_dir)
            .await
            .map_err(|e| format!("Failed to create vault store dir: {}", e))?;
        let db_path = base_dir.join("vault.db");

        // Open database in blocking task
        let conn = tokio::task::spawn_blocking(move || {
            let conn = Connection::open(&db_path)
                .map_err(|e| format!("Failed to open SQLite database: {}", e))?;
            conn.execute_batch(SCHEMA)
                .map_err(|e| format!("Failed to run schema: {}", e))?;
            tracing::info!("Opened vault database at {}", db_path.display());
            Ok::<_, String>(conn)
        })
        .await
        .map_err(|e| format!("Task join error: {}", e))??;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn parse_timestamp(value: &str) -> rusqlite::Result<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
            })
    }

    fn parse_uuid(value: &str) -> rusqlite::Result<Uuid> {
        Uuid::parse_str(value).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })
    }

    fn parse_tags(value: &str) -> Vec<String> {
        serde_json::from_str(value).unwrap_or_default()
    }

    fn encode_tags(tags: &[String]) -> String {
        serde_json::to_string(tags).unwrap_or_else(|_| "[]".to_string())
    }

    fn row_to_document(row: &Row<'_>) -> rusqlite::Result<VaultItem> {
        let id: String = row.get(0)?;
        let kind: String = row.get(3)?;
        let file_size: Option<i64> = row.get(6)?;
        let tags: String = row.get(8)?;
        let sensitivity: String = row.get(10)?;
        let created_at: String = row.get(11)?;
        Ok(VaultItem {
            id: Self::parse_uuid(&id)?,
            user_id: row.get(1)?,
            title: row.get(2)?,
            kind: DocumentKind::parse(&kind).unwrap_or(DocumentKind::Doc),
            value: row.get(4)?,
            storage_path: row.get(5)?,
            file_size: file_size.map(|s| s.max(0) as u64),
            file_type: row.get(7)?,
            tags: Self::parse_tags(&tags),
            ftu_id: row.get(9)?,
            sensitivity: Sensitivity::parse(&sensitivity).unwrap_or_default(),
            created_at: Self::parse_timestamp(&created_at)?,
        })
    }

    fn row_to_password(row: &Row<'_>) -> rusqlite::Result<PasswordItem> {
        let id: String = row.get(0)?;
        let tags: String = row.get(6)?;
        let created_at: String = row.get(8)?;
        Ok(PasswordItem {
            id: Self::parse_uuid(&id)?,
            user_id: row.get(1)?,
            title: row.get(2)?,
            username: row.get(3)?,
            url: row.get(4)?,
            password_enc: row.get(5)?,
            tags: Self::parse_tags(&tags),
            ftu_id: row.get(7)?,
            created_at: Self::parse_timestamp(&created_at)?,
        })
    }
}

#[async_trait]
impl VaultStore for SqliteVaultStore {
    fn is_persistent(&self) -> bool {
        true
    }

    async fn list_documents(&self, user_id: &str) -> Result<Vec<VaultItem>, String> {
        let conn = self.conn.clone();
        let user_id = user_id.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM vault_items WHERE user_id = ?1 ORDER BY created_at DESC",
                    DOCUMENT_COLUMNS
                ))
                .map_err(|e| e.to_string())?;
            let rows = stmt
                .query_map(params![user_id], Self::row_to_document)
                .map_err(|e| e.to_string())?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(|e| e.to_string())
        })
        .await
        .map_err(|e| e.to_string())?
    }

    async fn get_document(&self, id: Uuid) -> Result<Option<VaultItem>, String> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            conn.query_row(
                &format!("SELECT {} FROM vault_items WHERE id = ?1", DOCUMENT_COLUMNS),
                params![id.to_string()],
                Self::row_to_document,
            )
            .optional()
            .map_err(|e| e.to_string())
        })
        .await
        .map_err(|e| e.to_string())?
    }

    async fn insert_document(&self, item: &VaultItem) -> Result<(), String> {
        let conn = self.conn.clone();
        let item = item.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            conn.execute(
                "INSERT INTO vault_items (id, user_id, title, kind, value, storage_path, \
                 file_size, file_type, tags, ftu_id, sensitivity, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    item.id.to_string(),
                    item.user_id,
                    item.title,
                    item.kind.as_str(),
                    item.value,
                    item.storage_path,
                    item.file_size.map(|s| s as i64),
                    item.file_type,
                    Self::encode_tags(&item.tags),
                    item.ftu_id,
                    item.sensitivity.as_str(),
                    item.created_at.to_rfc3339(),
                ],
            )
            .map_err(|e| format!("Failed to insert document: {}", e))?;
            Ok(())
        })
        .await
        .map_err(|e| e.to_string())?
    }

    async fn delete_document(&self, id: Uuid) -> Result<bool, String> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let deleted = conn
                .execute(
                    "DELETE FROM vault_items WHERE id = ?1",
                    params![id.to_string()],
                )
                .map_err(|e| e.to_string())?;
            Ok(deleted > 0)
        })
        .await
        .map_err(|e| e.to_string())?
    }

    async fn list_passwords(&self, user_id: &str) -> Result<Vec<PasswordItem>, String> {
        let conn = self.conn.clone();
        let user_id = user_id.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM password_items WHERE user_id = ?1 ORDER BY created_at DESC",
                    PASSWORD_COLUMNS
                ))
                .map_err(|e| e.to_string())?;
            let rows = stmt
                .query_map(params![user_id], Self::row_to_password)
                .map_err(|e| e.to_string())?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(|e| e.to_string())
        })
        .await
        .map_err(|e| e.to_string())?
    }

    async fn get_password(&self, id: Uuid) -> Result<Option<PasswordItem>, String> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            conn.query_row(
                &format!("SELECT {} FROM password_items WHERE id = ?1", PASSWORD_COLUMNS),
                params![id.to_string()],
                Self::row_to_password,
            )
            .optional()
            .map_err(|e| e.to_string())
        })
        .await
        .map_err(|e| e.to_string())?
    }

    async fn insert_password(&self, item: &PasswordItem) -> Result<(), String> {
        let conn = self.conn.clone();
        let item = item.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            conn.execute(
                "INSERT INTO password_items (id, user_id, title, username, url, password_enc, \
                 tags, ftu_id, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    item.id.to_string(),
                    item.user_id,
                    item.title,
                    item.username,
                    item.url,
                    item.password_enc,
                    Self::encode_tags(&item.tags),
                    item.ftu_id,
                    item.created_at.to_rfc3339(),
                ],
            )
            .map_err(|e| format!("Failed to insert password item: {}", e))?;
            Ok(())
        })
        .await
        .map_err(|e| e.to_string())?
    }

    async fn update_password_blob(&self, id: Uuid, password_enc: &str) -> Result<(), String> {
        let conn = self.conn.clone();
        let password_enc = password_enc.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let updated = conn
                .execute(
                    "UPDATE password_items SET password_enc = ?1 WHERE id = ?2",
                    params![password_enc, id.to_string()],
                )
                .map_err(|e| e.to_string())?;
            if updated == 0 {
                return Err(format!("Password item {} not found", id));
            }
            Ok(())
        })
        .await
        .map_err(|e| e.to_string())?
    }

    async fn delete_password(&self, id: Uuid) -> Result<bool, String> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let deleted = conn
                .execute(
                    "DELETE FROM password_items WHERE id = ?1",
                    params![id.to_string()],
                )
                .map_err(|e| e.to_string())?;
            Ok(deleted > 0)
        })
        .await
        .map_err(|e| e.to_string())?
    }

    async fn clear_all(&self) -> Result<(usize, usize), String> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.blocking_lock();
            let tx = conn.transaction().map_err(|e| e.to_string())?;
            let documents = tx
                .execute("DELETE FROM vault_items", [])
                .map_err(|e| e.to_string())?;
            let passwords = tx
                .execute("DELETE FROM password_items", [])
                .map_err(|e| e.to_string())?;
            tx.commit().map_err(|e| e.to_string())?;
            Ok((documents, passwords))
        })
        .await
        .map_err(|e| e.to_string())?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn password(user_id: &str, title: &str, age_minutes: i64) -> PasswordItem {
        PasswordItem {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            title: title.to_string(),
            username: Some("ceo".to_string()),
            url: None,
            password_enc: "blob".to_string(),
            tags: vec!["finance".to_string()],
            ftu_id: Some("FTU-1".to_string()),
            created_at: Utc::now() - Duration::minutes(age_minutes),
        }
    }

    #[tokio::test]
    async fn sqlite_password_crud() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = SqliteVaultStore::new(temp.path().to_path_buf())
            .await
            .expect("open store");

        let older = password("alice", "Older", 10);
        let newer = password("alice", "Newer", 1);
        let other = password("bob", "Bob's", 0);
        for item in [&older, &newer, &other] {
            store.insert_password(item).await.expect("insert");
        }

        let listed = store.list_passwords("alice").await.expect("list");
        let titles: Vec<_> = listed.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["Newer", "Older"]);
        assert_eq!(listed[0].tags, vec!["finance"]);
        assert_eq!(listed[0].ftu_id.as_deref(), Some("FTU-1"));

        store
            .update_password_blob(older.id, "rotated")
            .await
            .expect("update");
        let fetched = store.get_password(older.id).await.expect("get").unwrap();
        assert_eq!(fetched.password_enc, "rotated");
        assert!(store.update_password_blob(Uuid::new_v4(), "x").await.is_err());

        assert!(store.delete_password(older.id).await.expect("delete"));
        assert!(!store.delete_password(older.id).await.expect("delete again"));
    }

    #[tokio::test]
    async fn sqlite_documents_survive_reopen() {
        let temp = tempfile::tempdir().expect("tempdir");
        let item = VaultItem {
            id: Uuid::new_v4(),
            user_id: "alice".to_string(),
            title: "Term sheet".to_string(),
            kind: DocumentKind::Doc,
            value: None,
            storage_path: Some("alice/1-term_sheet.pdf".to_string()),
            file_size: Some(2048),
            file_type: Some("application/pdf".to_string()),
            tags: vec!["legal".to_string()],
            ftu_id: None,
            sensitivity: Sensitivity::High,
            created_at: Utc::now(),
        };

        {
            let store = SqliteVaultStore::new(temp.path().to_path_buf())
                .await
                .expect("open store");
            store.insert_document(&item).await.expect("insert");
        }

        let store = SqliteVaultStore::new(temp.path().to_path_buf())
            .await
            .expect("reopen store");
        let fetched = store.get_document(item.id).await.expect("get").unwrap();
        assert_eq!(fetched.title, item.title);
        assert_eq!(fetched.sensitivity, Sensitivity::High);
        assert_eq!(fetched.file_size, Some(2048));
        assert_eq!(fetched.storage_path, item.storage_path);

        store.insert_password(&password("bob", "x", 0)).await.expect("insert");
        assert_eq!(store.clear_all().await.expect("clear"), (1, 1));
        assert!(store.list_documents("alice").await.expect("list").is_empty());
    }
}
