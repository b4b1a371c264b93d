//! Vault record types and listing filters.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of a document-tab entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Doc,
    Note,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Doc => "doc",
            DocumentKind::Note => "note",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "doc" => Some(DocumentKind::Doc),
            "note" => Some(DocumentKind::Note),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sensitivity {
    #[default]
    Low,
    Medium,
    High,
}

impl Sensitivity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sensitivity::Low => "Low",
            Sensitivity::Medium => "Medium",
            Sensitivity::High => "High",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "low" => Some(Sensitivity::Low),
            "medium" => Some(Sensitivity::Medium),
            "high" => Some(Sensitivity::High),
            _ => None,
        }
    }
}

/// A document or note in the vault (`vault_items` table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaultItem {
    pub id: Uuid,
    pub user_id: String,
    pub title: String,
    pub kind: DocumentKind,
    /// Inline note body. Not set for uploaded files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Object key in the file store for uploaded documents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ftu_id: Option<String>,
    #[serde(default)]
    pub sensitivity: Sensitivity,
    pub created_at: DateTime<Utc>,
}

/// A stored credential (`password_items` table).
///
/// `password_enc` is a session-cipher blob; the plaintext never reaches the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PasswordItem {
    pub id: Uuid,
    pub user_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub password_enc: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ftu_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Split comma-separated tag input, trimming and dropping empties.
pub fn parse_tags(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Treat blank strings as absent.
pub fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Listing filter for documents. `None` fields match everything.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentFilter {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub kind: Option<DocumentKind>,
    #[serde(default)]
    pub tag: Option<String>,
}

impl DocumentFilter {
    pub fn matches(&self, item: &VaultItem) -> bool {
        let matches_search = match self.search.as_deref().map(str::trim) {
            Some(q) if !q.is_empty() => item.title.to_lowercase().contains(&q.to_lowercase()),
            _ => true,
        };
        let matches_kind = self.kind.map_or(true, |k| item.kind == k);
        matches_search && matches_kind && matches_tag(self.tag.as_deref(), &item.tags)
    }
}

/// Listing filter for passwords. Search also covers the username.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PasswordFilter {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
}

impl PasswordFilter {
    pub fn matches(&self, item: &PasswordItem) -> bool {
        let matches_search = match self.search.as_deref().map(str::trim) {
            Some(q) if !q.is_empty() => {
                let q = q.to_lowercase();
                item.title.to_lowercase().contains(&q)
                    || item
                        .username
                        .as_deref()
                        .is_some_and(|u| u.to_lowercase().contains(&q))
            }
            _ => true,
        };
        matches_search && matches_tag(self.tag.as_deref(), &item.tags)
    }
}

// "all" is what the dashboard sends for "no tag filter".
fn matches_tag(tag: Option<&str>, tags: &[String]) -> bool {
    match tag {
        None | Some("") | Some("all") => true,
        Some(t) => tags.iter().any(|x| x == t),
    }
}

/// Union of tags over both collections, in first-seen order.
pub fn all_tags(documents: &[VaultItem], passwords: &[PasswordItem]) -> Vec<String> {
    let mut seen = HashSet::new();
    documents
        .iter()
        .flat_map(|d| d.tags.iter())
        .chain(passwords.iter().flat_map(|p| p.tags.iter()))
        .filter(|t| seen.insert(t.as_str()))
        .cloned()
        .collect()
}
