//! API request and response types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::vault::{DocumentFilter, DocumentKind, PasswordFilter};

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,

    /// Whether the server is running in dev mode (auth disabled)
    pub dev_mode: bool,

    /// Whether auth is required for API requests (dev_mode=false)
    pub auth_required: bool,

    /// Whether records survive a restart
    pub persistent_store: bool,
}

/// Login request for dashboard auth.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: Option<String>,
    pub password: String,
}

/// Login response containing a JWT for API authentication.
#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub token: String,
    /// Expiration as unix seconds.
    pub exp: i64,
}

/// Passcode entered twice to open a vault session.
#[derive(Debug, Clone, Deserialize)]
pub struct UnlockRequest {
    pub passcode: String,
    pub confirm: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnlockResponse {
    /// Send back as `X-Vault-Session` on passcode-bound requests.
    pub session_id: Uuid,
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct VaultStatusResponse {
    pub unlocked: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RotateRequest {
    pub new_passcode: String,
    pub confirm: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValidateRequest {
    pub passcode: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RevealResponse {
    pub password: String,
}

/// Query string for document listings and exports.
///
/// `kind` and `tag` accept `all` to disable the filter.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentQuery {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
}

impl DocumentQuery {
    pub fn into_filter(self) -> Result<DocumentFilter, String> {
        let kind = match self.kind.as_deref().map(str::trim) {
            None | Some("") | Some("all") => None,
            Some(raw) => Some(
                DocumentKind::parse(raw).ok_or_else(|| format!("Unknown document type: {}", raw))?,
            ),
        };
        Ok(DocumentFilter {
            search: self.search,
            kind,
            tag: self.tag,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PasswordQuery {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
}

impl From<PasswordQuery> for PasswordFilter {
    fn from(q: PasswordQuery) -> Self {
        PasswordFilter {
            search: q.search,
            tag: q.tag,
        }
    }
}
