//! Local object storage for uploaded vault documents.
//!
//! Objects live under `{root}/{user}/{unix_millis}-{clean_name}`. Downloads go
//! through short-lived signed URLs: `/api/files/{key}?expires={unix}&sig={hex}`
//! where `sig = HMAC-SHA256(secret, "{key}\n{expires}")`.

use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

use chrono::Utc;
use hmac::{Hmac, Mac};
use regex::Regex;
use serde::Serialize;
use sha2::Sha256;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

use crate::util::sanitize_filename;

type HmacSha256 = Hmac<Sha256>;

const MAX_KEY_ATTEMPTS: usize = 1000;

async fn write_all(file: &mut tokio::fs::File, bytes: &[u8]) -> std::io::Result<()> {
    file.write_all(bytes).await?;
    file.flush().await
}

/// Route prefix under which signed downloads are served.
pub const FILES_ROUTE_PREFIX: &str = "/api/files";

#[derive(Debug, Error)]
pub enum FileStoreError {
    #[error("File must be {limit} bytes or less (got {size})")]
    TooLarge { size: usize, limit: usize },

    #[error("Invalid storage path")]
    InvalidKey,

    #[error("File not found")]
    NotFound,

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A time-limited download link.
#[derive(Debug, Clone, Serialize)]
pub struct SignedUrl {
    pub url: String,
    /// Expiration as unix seconds.
    pub expires: i64,
}

/// Replace every character outside `[A-Za-z0-9.-]` with `_`.
pub fn clean_file_name(name: &str) -> String {
    static UNSAFE_CHARS: OnceLock<Regex> = OnceLock::new();
    let re = UNSAFE_CHARS.get_or_init(|| Regex::new(r"[^a-zA-Z0-9.\-]").expect("static pattern"));
    let cleaned = re.replace_all(name, "_").into_owned();
    if cleaned.is_empty() {
        "upload.bin".to_string()
    } else {
        cleaned
    }
}

#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    signing_key: Vec<u8>,
    max_bytes: usize,
}

impl FileStore {
    pub fn new(root: PathBuf, signing_secret: &str, max_bytes: usize) -> Self {
        Self {
            root,
            signing_key: signing_secret.as_bytes().to_vec(),
            max_bytes,
        }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Map an object key to a path under the root, rejecting traversal.
    fn resolve(&self, key: &str) -> Result<PathBuf, FileStoreError> {
        if key.contains('\\')
            || key
                .split('/')
                .any(|part| part.is_empty() || part == "." || part == "..")
        {
            return Err(FileStoreError::InvalidKey);
        }
        Ok(self.root.join(key))
    }

    /// Store `bytes` for `user_id`, returning the new object key.
    pub async fn upload(
        &self,
        user_id: &str,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<String, FileStoreError> {
        if bytes.len() > self.max_bytes {
            return Err(FileStoreError::TooLarge {
                size: bytes.len(),
                limit: self.max_bytes,
            });
        }

        let user_dir = sanitize_filename(user_id);
        let clean_name = clean_file_name(file_name);
        let mut millis = Utc::now().timestamp_millis();

        // Never overwrite: a taken key moves to the next millisecond.
        for _ in 0..MAX_KEY_ATTEMPTS {
            let key = format!("{}/{}-{}", user_dir, millis, clean_name);
            let path = self.resolve(&key)?;
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let mut file = match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => file,
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    millis += 1;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            if let Err(e) = write_all(&mut file, bytes).await {
                drop(file);
                let _ = tokio::fs::remove_file(&path).await;
                return Err(e.into());
            }
            tracing::debug!("Stored vault file {} ({} bytes)", key, bytes.len());
            return Ok(key);
        }

        Err(FileStoreError::Io(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("no free storage key for {}", clean_name),
        )))
    }

    pub async fn open(&self, key: &str) -> Result<tokio::fs::File, FileStoreError> {
        let path = self.resolve(key)?;
        match tokio::fs::File::open(&path).await {
            Ok(file) => Ok(file),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(FileStoreError::NotFound),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn remove(&self, key: &str) -> Result<(), FileStoreError> {
        let path = self.resolve(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(FileStoreError::NotFound),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove every stored object. Returns the number of files deleted.
    pub async fn clear(&self) -> Result<usize, FileStoreError> {
        let mut removed = 0;
        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                if entry.file_type().await?.is_dir() {
                    pending.push(entry.path());
                } else {
                    tokio::fs::remove_file(entry.path()).await?;
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    fn signature(&self, key: &str, expires: i64) -> HmacSha256 {
        let mut mac =
            HmacSha256::new_from_slice(&self.signing_key).expect("HMAC accepts any key length");
        mac.update(key.as_bytes());
        mac.update(b"\n");
        mac.update(expires.to_string().as_bytes());
        mac
    }

    /// Build a download link for `key` valid for `ttl`.
    pub fn signed_url(&self, key: &str, ttl: Duration) -> SignedUrl {
        let expires = Utc::now().timestamp() + ttl.as_secs() as i64;
        let sig = hex::encode(self.signature(key, expires).finalize().into_bytes());
        let encoded_key = key
            .split('/')
            .map(|part| urlencoding::encode(part).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        SignedUrl {
            url: format!(
                "{}/{}?expires={}&sig={}",
                FILES_ROUTE_PREFIX, encoded_key, expires, sig
            ),
            expires,
        }
    }

    /// Check a download link. Constant-time on the signature.
    pub fn verify(&self, key: &str, expires: i64, sig: &str) -> bool {
        if expires < Utc::now().timestamp() {
            return false;
        }
        let Ok(sig_bytes) = hex::decode(sig) else {
            return false;
        };
        self.signature(key, expires).verify_slice(&sig_bytes).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tokio::io::AsyncReadExt;

    fn store(root: &Path) -> FileStore {
        FileStore::new(root.to_path_buf(), "test-secret", 1024)
    }

    #[test]
    fn clean_file_name_replaces_unsafe_chars() {
        assert_eq!(clean_file_name("Q3 report (final).pdf"), "Q3_report__final_.pdf");
        assert_eq!(clean_file_name("../etc/passwd"), ".._etc_passwd");
        assert_eq!(clean_file_name("résumé.txt"), "r_sum_.txt");
        assert_eq!(clean_file_name(""), "upload.bin");
    }

    #[tokio::test]
    async fn upload_open_remove() {
        let temp = tempfile::tempdir().expect("tempdir");
        let files = store(temp.path());

        let key = files
            .upload("alice", "board deck.pdf", b"%PDF-1.7")
            .await
            .expect("upload");
        assert!(key.starts_with("alice/"));
        assert!(key.ends_with("-board_deck.pdf"));

        let mut contents = Vec::new();
        files
            .open(&key)
            .await
            .expect("open")
            .read_to_end(&mut contents)
            .await
            .expect("read");
        assert_eq!(contents, b"%PDF-1.7");

        files.remove(&key).await.expect("remove");
        assert!(matches!(files.open(&key).await, Err(FileStoreError::NotFound)));
        assert!(matches!(files.remove(&key).await, Err(FileStoreError::NotFound)));
    }

    #[tokio::test]
    async fn same_name_uploads_get_distinct_keys() {
        let temp = tempfile::tempdir().expect("tempdir");
        let files = store(temp.path());

        let mut keys = Vec::new();
        for i in 0..20u8 {
            let key = files
                .upload("alice", "deck.pdf", &[i])
                .await
                .expect("upload");
            keys.push(key);
        }

        let mut unique = keys.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), keys.len());

        for (i, key) in keys.iter().enumerate() {
            let mut contents = Vec::new();
            files
                .open(key)
                .await
                .expect("open")
                .read_to_end(&mut contents)
                .await
                .expect("read");
            assert_eq!(contents, vec![i as u8]);
        }
    }

    #[tokio::test]
    async fn upload_rejects_oversized_files() {
        let temp = tempfile::tempdir().expect("tempdir");
        let files = store(temp.path());
        let result = files.upload("alice", "big.bin", &[0u8; 1025]).await;
        assert!(matches!(
            result,
            Err(FileStoreError::TooLarge { size: 1025, limit: 1024 })
        ));
    }

    #[tokio::test]
    async fn traversal_keys_are_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let files = store(temp.path());
        for key in ["../secret", "/etc/passwd", "alice//x", "", "alice/./x"] {
            assert!(
                matches!(files.open(key).await, Err(FileStoreError::InvalidKey)),
                "{key}"
            );
        }
    }

    #[tokio::test]
    async fn clear_removes_everything() {
        let temp = tempfile::tempdir().expect("tempdir");
        let files = store(temp.path());
        files.upload("alice", "a.txt", b"a").await.expect("upload");
        files.upload("bob", "b.txt", b"b").await.expect("upload");
        assert_eq!(files.clear().await.expect("clear"), 2);
        assert_eq!(files.clear().await.expect("clear again"), 0);
    }

    #[test]
    fn signed_urls_verify_and_expire() {
        let files = store(Path::new("/unused"));
        let key = "alice/1700000000000-deck.pdf";
        let signed = files.signed_url(key, Duration::from_secs(60));

        assert!(signed.url.starts_with("/api/files/alice/1700000000000-deck.pdf?expires="));
        let sig = signed.url.rsplit("sig=").next().unwrap();
        assert!(files.verify(key, signed.expires, sig));
        assert!(!files.verify("bob/other.pdf", signed.expires, sig));
        assert!(!files.verify(key, signed.expires + 1, sig));
        assert!(!files.verify(key, signed.expires, "zz"));

        let other = FileStore::new(PathBuf::from("/unused"), "other-secret", 1024);
        assert!(!other.verify(key, signed.expires, sig));

        let expired = Utc::now().timestamp() - 1;
        let stale_sig = hex::encode(files.signature(key, expired).finalize().into_bytes());
        assert!(!files.verify(key, expired, &stale_sig));
    }
}
