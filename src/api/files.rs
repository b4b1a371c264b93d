//! Signed download endpoint for uploaded vault files.
//!
//! `GET /api/files/{key}?expires=..&sig=..` is public: the HMAC in the link is
//! the credential, and links expire after `SIGNED_URL_TTL_SECS`.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tokio_util::io::ReaderStream;

use crate::vault::FileStoreError;

use super::routes::AppState;

#[derive(Debug, Deserialize)]
pub struct SignedQuery {
    pub expires: i64,
    pub sig: String,
}

fn content_type_for_name(name: &str) -> &'static str {
    let ext = name.rsplit('.').next().unwrap_or("").to_lowercase();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "txt" | "md" => "text/plain; charset=utf-8",
        "csv" => "text/csv; charset=utf-8",
        "json" => "application/json",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        _ => "application/octet-stream",
    }
}

/// Name shown to the browser: the key's last segment without the timestamp prefix.
fn download_name(key: &str) -> &str {
    let last = key.rsplit('/').next().unwrap_or(key);
    match last.split_once('-') {
        Some((millis, rest)) if !rest.is_empty() && millis.bytes().all(|b| b.is_ascii_digit()) => {
            rest
        }
        _ => last,
    }
}

pub async fn download(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Query(q): Query<SignedQuery>,
) -> Result<Response, (StatusCode, String)> {
    let files = state.vault.files();
    if !files.verify(&key, q.expires, &q.sig) {
        tracing::warn!("Rejected download link for {}", key);
        return Err((
            StatusCode::FORBIDDEN,
            "Invalid or expired link".to_string(),
        ));
    }

    let file = files.open(&key).await.map_err(|e| match e {
        FileStoreError::NotFound => (StatusCode::NOT_FOUND, e.to_string()),
        FileStoreError::InvalidKey => (StatusCode::BAD_REQUEST, e.to_string()),
        other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
    })?;

    let filename = download_name(&key);
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_DISPOSITION,
        format!("attachment; filename=\"{}\"", filename)
            .parse()
            .map_err(|_| {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Filename produces an invalid header value: {}", filename),
                )
            })?,
    );
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(content_type_for_name(filename)),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));

    let stream = ReaderStream::new(file);
    Ok((headers, Body::from_stream(stream)).into_response())
}
