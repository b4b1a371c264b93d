//! Minimal JWT auth for the vault dashboard.
//!
//! - Dashboard submits a username and that user's password to `/api/auth/login`
//!   (`DASHBOARD_USERS`; a missing username means `admin` / `DASHBOARD_PASSWORD`)
//! - Server returns a JWT valid for `JWT_TTL_DAYS` (default 30)
//! - When `DEV_MODE=false`, all vault endpoints require `Authorization: Bearer <jwt>`
//!
//! The token subject is the vault owner: every record and vault session is
//! scoped to it. In dev mode the owner comes from `X-User-Id`, else `dev`, so
//! dev mode must never face untrusted clients.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};

use super::routes::AppState;
use super::types::{LoginRequest, LoginResponse};
use crate::config::{AuthConfig, DEFAULT_OWNER};

pub const DEV_USER_HEADER: &str = "x-user-id";
const DEV_USER: &str = "dev";

/// Authenticated vault owner, inserted as a request extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: String,
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct Claims {
    /// Vault owner
    sub: String,
    /// Issued-at unix seconds
    iat: i64,
    /// Expiration unix seconds
    exp: i64,
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();
    if a_bytes.len() != b_bytes.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for i in 0..a_bytes.len() {
        diff |= a_bytes[i] ^ b_bytes[i];
    }
    diff == 0
}

fn issue_jwt(subject: &str, secret: &str, ttl_days: i64) -> anyhow::Result<(String, i64)> {
    let now = Utc::now();
    let exp = now + Duration::days(ttl_days.max(1));
    let claims = Claims {
        sub: subject.to_string(),
        iat: now.timestamp(),
        exp: exp.timestamp(),
    };
    let token = jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok((token, claims.exp))
}

fn verify_jwt(token: &str, secret: &str) -> anyhow::Result<Claims> {
    let validation = Validation::default();
    let token_data = jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )?;
    Ok(token_data.claims)
}

fn login_subject(username: Option<&str>) -> String {
    username
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .unwrap_or(DEFAULT_OWNER)
        .to_string()
}

/// Check `password` against the named owner's own password.
/// Returns the JWT subject on success.
fn authenticate(auth: &AuthConfig, username: Option<&str>, password: &str) -> Option<String> {
    let subject = login_subject(username);
    let expected = auth.password_for(&subject)?;
    constant_time_eq(password.trim(), expected).then_some(subject)
}

pub async fn login(
    State(state): State<std::sync::Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, (StatusCode, String)> {
    let Some(subject) = authenticate(&state.config.auth, req.username.as_deref(), &req.password)
    else {
        tracing::warn!("Rejected dashboard login");
        return Err((
            StatusCode::UNAUTHORIZED,
            "Invalid username or password".to_string(),
        ));
    };

    let secret = state.config.auth.jwt_secret.as_deref().ok_or_else(|| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "JWT_SECRET not configured".to_string(),
        )
    })?;

    let (token, exp) = issue_jwt(&subject, secret, state.config.auth.jwt_ttl_days)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    tracing::info!("Issued dashboard token for {}", subject);
    Ok(Json(LoginResponse { token, exp }))
}

pub async fn require_auth(
    State(state): State<std::sync::Arc<AppState>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    // Dev mode => no auth checks.
    if state.config.dev_mode {
        let id = req
            .headers()
            .get(DEV_USER_HEADER)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(DEV_USER)
            .to_string();
        req.extensions_mut().insert(AuthUser { id });
        return next.run(req).await;
    }

    // If auth isn't configured, fail closed in non-dev mode.
    let secret = match state.config.auth.jwt_secret.as_deref() {
        Some(s) => s,
        None => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "JWT_SECRET not configured",
            )
                .into_response();
        }
    };

    let auth_header = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");

    let token = auth_header
        .strip_prefix("Bearer ")
        .or_else(|| auth_header.strip_prefix("bearer "))
        .unwrap_or("");

    if token.is_empty() {
        return (StatusCode::UNAUTHORIZED, "Missing Authorization header").into_response();
    }

    match verify_jwt(token, secret) {
        Ok(claims) => {
            req.extensions_mut().insert(AuthUser { id: claims.sub });
            next.run(req).await
        }
        Err(_) => (StatusCode::UNAUTHORIZED, "Invalid or expired token").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_time_eq_compares_content() {
        assert!(constant_time_eq("hunter2", "hunter2"));
        assert!(!constant_time_eq("hunter2", "hunter3"));
        assert!(!constant_time_eq("short", "longer"));
    }

    #[test]
    fn jwt_roundtrip_keeps_subject() {
        let (token, exp) = issue_jwt("alice", "secret", 30).expect("issue");
        let claims = verify_jwt(&token, "secret").expect("verify");
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.exp, exp);
        assert!(verify_jwt(&token, "other-secret").is_err());
    }

    fn auth_with_users(raw: &str) -> AuthConfig {
        AuthConfig {
            users: crate::config::parse_dashboard_users(raw).expect("users"),
            jwt_secret: Some("secret".to_string()),
            jwt_ttl_days: 30,
        }
    }

    #[test]
    fn login_requires_the_named_users_own_password() {
        let auth = auth_with_users("alice:alice-pass,bob:bob-pass");

        assert_eq!(
            authenticate(&auth, Some("bob"), "bob-pass"),
            Some("bob".to_string())
        );
        assert_eq!(authenticate(&auth, Some("bob"), "alice-pass"), None);
        assert_eq!(authenticate(&auth, Some("mallory"), "alice-pass"), None);
        assert_eq!(authenticate(&auth, None, "alice-pass"), None);
    }

    #[test]
    fn default_owner_logs_in_without_username() {
        let auth = auth_with_users("admin:shared,bob:bob-pass");
        assert_eq!(authenticate(&auth, None, "shared"), Some("admin".to_string()));
        assert_eq!(authenticate(&auth, Some("bob"), "shared"), None);
        assert_eq!(authenticate(&AuthConfig::default(), None, ""), None);
    }

    #[test]
    fn login_subject_defaults_to_admin() {
        assert_eq!(login_subject(None), "admin");
        assert_eq!(login_subject(Some("  ")), "admin");
        assert_eq!(login_subject(Some(" ceo ")), "ceo");
    }
}
