//! API endpoints for the vault.
//!
//! Passcode-bound operations read the vault session from the
//! `X-Vault-Session` header returned by `POST /api/vault/unlock`.

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Extension, Multipart, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json},
    routing::{delete, get, post},
    Router,
};
use uuid::Uuid;

use crate::vault::{
    export, parse_tags, FileStoreError, NewNote, NewPassword, NewUpload, PasswordItem,
    RotationReport, Sensitivity, SignedUrl, VaultError, VaultItem,
};

use super::auth::AuthUser;
use super::routes::AppState;
use super::types::{
    DocumentQuery, PasswordQuery, RevealResponse, RotateRequest, UnlockRequest, UnlockResponse,
    ValidateRequest, ValidateResponse, VaultStatusResponse,
};

pub const SESSION_HEADER: &str = "x-vault-session";

// Room for the multipart envelope and text fields around the file.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Create the vault API routes.
pub fn routes(max_upload_bytes: usize) -> Router<Arc<AppState>> {
    let upload_route = Router::new()
        .route("/documents/upload", post(upload_document))
        .layer(DefaultBodyLimit::max(
            max_upload_bytes + MULTIPART_OVERHEAD_BYTES,
        ));

    Router::new()
        .route("/unlock", post(unlock))
        .route("/lock", post(lock))
        .route("/status", get(status))
        .route("/rotate", post(rotate))
        .route("/tags", get(list_tags))
        .route("/passwords", get(list_passwords).post(add_password))
        .route("/passwords/export", get(export_passwords))
        .route("/passwords/:id", delete(delete_password))
        .route("/passwords/:id/reveal", post(reveal_password))
        .route("/passwords/:id/validate", post(validate_password))
        .route("/documents", get(list_documents))
        .route("/documents/export", get(export_documents))
        .route("/documents/notes", post(add_note))
        .merge(upload_route)
        .route("/documents/:id", delete(delete_document))
        .route("/documents/:id/url", get(document_url))
}

/// Map a vault failure to an HTTP status. Decryption failures stay generic.
pub fn vault_error(e: VaultError) -> (StatusCode, String) {
    let status = match &e {
        VaultError::Locked => StatusCode::LOCKED,
        VaultError::Passcode(_) | VaultError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        VaultError::Crypto(_) => StatusCode::UNPROCESSABLE_ENTITY,
        VaultError::NotFound(_) => StatusCode::NOT_FOUND,
        VaultError::File(FileStoreError::TooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
        VaultError::File(FileStoreError::InvalidKey) => StatusCode::BAD_REQUEST,
        VaultError::File(FileStoreError::NotFound) => StatusCode::NOT_FOUND,
        VaultError::File(FileStoreError::Io(_)) | VaultError::Store(_) | VaultError::Internal(_) => {
            tracing::error!("Vault operation failed: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal error".to_string(),
            );
        }
    };
    (status, e.to_string())
}

/// Session id from `X-Vault-Session`. A malformed value counts as no session.
pub fn session_id(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get(SESSION_HEADER)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| Uuid::parse_str(v.trim()).ok())
}

fn csv_response(prefix: &str, body: String) -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!(
                    "attachment; filename=\"{}\"",
                    export::export_file_name(prefix)
                ),
            ),
        ],
        body,
    )
}

/// POST /api/vault/unlock
async fn unlock(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<UnlockRequest>,
) -> Result<Json<UnlockResponse>, (StatusCode, String)> {
    let session_id = state
        .vault
        .unlock(&user.id, &req.passcode, &req.confirm)
        .await
        .map_err(vault_error)?;
    Ok(Json(UnlockResponse {
        session_id,
        idle_timeout_secs: state.config.session_idle_ttl.as_secs(),
    }))
}

/// POST /api/vault/lock
async fn lock(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    headers: HeaderMap,
) -> Json<VaultStatusResponse> {
    if let Some(id) = session_id(&headers) {
        state.vault.lock(&user.id, id).await;
    }
    Json(VaultStatusResponse { unlocked: false })
}

/// GET /api/vault/status
async fn status(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    headers: HeaderMap,
) -> Json<VaultStatusResponse> {
    let unlocked = state
        .vault
        .is_unlocked(&user.id, session_id(&headers))
        .await;
    Json(VaultStatusResponse { unlocked })
}

/// POST /api/vault/rotate
/// Re-encrypt the caller's passwords under a new passcode.
async fn rotate(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    headers: HeaderMap,
    Json(req): Json<RotateRequest>,
) -> Result<Json<RotationReport>, (StatusCode, String)> {
    let report = state
        .vault
        .rotate_passcode(
            &user.id,
            session_id(&headers),
            &req.new_passcode,
            &req.confirm,
        )
        .await
        .map_err(vault_error)?;
    Ok(Json(report))
}

/// GET /api/vault/tags
async fn list_tags(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<String>>, (StatusCode, String)> {
    let tags = state.vault.all_tags(&user.id).await.map_err(vault_error)?;
    Ok(Json(tags))
}

// ─────────────────────────────────────────────────────────────────────────────
// Passwords
// ─────────────────────────────────────────────────────────────────────────────

/// GET /api/vault/passwords
async fn list_passwords(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(q): Query<PasswordQuery>,
) -> Result<Json<Vec<PasswordItem>>, (StatusCode, String)> {
    let items = state
        .vault
        .list_passwords(&user.id, &q.into())
        .await
        .map_err(vault_error)?;
    Ok(Json(items))
}

/// POST /api/vault/passwords
async fn add_password(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    headers: HeaderMap,
    Json(req): Json<NewPassword>,
) -> Result<(StatusCode, Json<PasswordItem>), (StatusCode, String)> {
    let item = state
        .vault
        .add_password(&user.id, session_id(&headers), req)
        .await
        .map_err(vault_error)?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// DELETE /api/vault/passwords/:id
async fn delete_password(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    state
        .vault
        .delete_password(&user.id, id)
        .await
        .map_err(vault_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/vault/passwords/:id/reveal
async fn reveal_password(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<RevealResponse>, (StatusCode, String)> {
    let password = state
        .vault
        .reveal_password(&user.id, session_id(&headers), id)
        .await
        .map_err(vault_error)?;
    Ok(Json(RevealResponse {
        password: password.to_string(),
    }))
}

/// POST /api/vault/passwords/:id/validate
async fn validate_password(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<ValidateRequest>,
) -> Result<Json<ValidateResponse>, (StatusCode, String)> {
    let valid = state
        .vault
        .validate_password_passcode(&user.id, id, &req.passcode)
        .await
        .map_err(vault_error)?;
    Ok(Json(ValidateResponse { valid }))
}

/// GET /api/vault/passwords/export
async fn export_passwords(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(q): Query<PasswordQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let csv = state
        .vault
        .export_passwords_csv(&user.id, &q.into())
        .await
        .map_err(vault_error)?;
    Ok(csv_response("passwords-metadata", csv))
}

// ─────────────────────────────────────────────────────────────────────────────
// Documents
// ─────────────────────────────────────────────────────────────────────────────

/// GET /api/vault/documents
async fn list_documents(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(q): Query<DocumentQuery>,
) -> Result<Json<Vec<VaultItem>>, (StatusCode, String)> {
    let filter = q
        .into_filter()
        .map_err(|e| (StatusCode::BAD_REQUEST, e))?;
    let items = state
        .vault
        .list_documents(&user.id, &filter)
        .await
        .map_err(vault_error)?;
    Ok(Json(items))
}

/// POST /api/vault/documents/notes
async fn add_note(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<NewNote>,
) -> Result<(StatusCode, Json<VaultItem>), (StatusCode, String)> {
    let item = state
        .vault
        .add_note(&user.id, req)
        .await
        .map_err(vault_error)?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// POST /api/vault/documents/upload
///
/// Multipart fields: `file` (required), `title`, `tags` (comma-separated),
/// `ftu_id`, `sensitivity` (`Low|Medium|High`).
async fn upload_document(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<VaultItem>), (StatusCode, String)> {
    let mut file = None;
    let mut title = None;
    let mut tags = Vec::new();
    let mut ftu_id = None;
    let mut sensitivity = Sensitivity::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (e.status(), e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            let file_name = field
                .file_name()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "upload.bin".to_string());
            let content_type = field.content_type().map(|s| s.to_string());
            let bytes = field
                .bytes()
                .await
                .map_err(|e| (e.status(), e.body_text()))?;
            file = Some((file_name, content_type, bytes));
            continue;
        }

        let text = field
            .text()
            .await
            .map_err(|e| (e.status(), e.body_text()))?;
        match name.as_str() {
            "title" => title = Some(text),
            "tags" => tags = parse_tags(&text),
            "ftu_id" | "ftuId" => ftu_id = Some(text),
            "sensitivity" => {
                sensitivity = Sensitivity::parse(&text).ok_or_else(|| {
                    (
                        StatusCode::BAD_REQUEST,
                        format!("Unknown sensitivity: {}", text),
                    )
                })?;
            }
            _ => {}
        }
    }

    let (file_name, content_type, bytes) =
        file.ok_or_else(|| (StatusCode::BAD_REQUEST, "Missing file field".to_string()))?;

    let item = state
        .vault
        .upload_document(
            &user.id,
            NewUpload {
                title,
                file_name,
                content_type,
                bytes,
                tags,
                ftu_id,
                sensitivity,
            },
        )
        .await
        .map_err(vault_error)?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// DELETE /api/vault/documents/:id
async fn delete_document(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    state
        .vault
        .delete_document(&user.id, id)
        .await
        .map_err(vault_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/vault/documents/:id/url
/// Short-lived download link for an uploaded file.
async fn document_url(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<SignedUrl>, (StatusCode, String)> {
    let signed = state
        .vault
        .document_url(&user.id, id)
        .await
        .map_err(vault_error)?;
    Ok(Json(signed))
}

/// GET /api/vault/documents/export
async fn export_documents(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(q): Query<DocumentQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let filter = q
        .into_filter()
        .map_err(|e| (StatusCode::BAD_REQUEST, e))?;
    let csv = state
        .vault
        .export_documents_csv(&user.id, &filter)
        .await
        .map_err(vault_error)?;
    Ok(csv_response("vault-metadata", csv))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::{CryptoError, PasscodeError};
    use axum::http::HeaderValue;

    #[test]
    fn vault_errors_map_to_statuses() {
        assert_eq!(vault_error(VaultError::Locked).0, StatusCode::LOCKED);
        assert_eq!(
            vault_error(VaultError::Passcode(PasscodeError::TooShort)),
            (
                StatusCode::BAD_REQUEST,
                "Passcode must be at least 4 characters".to_string()
            )
        );
        assert_eq!(
            vault_error(VaultError::Crypto(CryptoError::DecryptionFailed)).0,
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            vault_error(VaultError::NotFound("Document".to_string())).0,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            vault_error(VaultError::File(FileStoreError::TooLarge {
                size: 2,
                limit: 1
            }))
            .0,
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            vault_error(VaultError::Store(
                "database is locked: /srv/data/vault.db".to_string()
            )),
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal error".to_string()
            )
        );
        let io = std::io::Error::new(std::io::ErrorKind::Other, "/srv/data/vault-files/alice");
        let (status, body) = vault_error(VaultError::File(FileStoreError::Io(io)));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body.contains("/srv"));
    }

    #[test]
    fn session_header_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(session_id(&headers), None);

        headers.insert(SESSION_HEADER, HeaderValue::from_static("not-a-uuid"));
        assert_eq!(session_id(&headers), None);

        let id = Uuid::new_v4();
        headers.insert(
            SESSION_HEADER,
            HeaderValue::from_str(&id.to_string()).unwrap(),
        );
        assert_eq!(session_id(&headers), Some(id));
    }
}
