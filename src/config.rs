//! Configuration management for the vault server.
//!
//! Configuration can be set via environment variables:
//! - `HOST` - Optional. Server host. Defaults to `127.0.0.1`.
//! - `PORT` - Optional. Server port. Defaults to `3000`.
//! - `DATA_DIR` - Optional. Root for the sqlite database and stored files. Defaults to `./data`.
//! - `VAULT_STORE` - Optional. `sqlite` or `memory`. Defaults to `sqlite`.
//! - `DEV_MODE` - Optional. Disables dashboard auth when true.
//! - `DASHBOARD_USERS` - Vault owners and their login passwords, `name:password,name:password`.
//! - `DASHBOARD_PASSWORD` - Optional. Login password for the owner `admin`.
//! - `JWT_SECRET` - Secret for signing dashboard tokens. Required unless `DEV_MODE`.
//! - `JWT_TTL_DAYS` - Optional. Token lifetime. Defaults to `30`.
//! - `SESSION_IDLE_TTL_SECS` - Optional. Vault session idle timeout. Defaults to `1800`.
//! - `SIGNED_URL_TTL_SECS` - Optional. Download link lifetime. Defaults to `60`.
//! - `URL_SIGNING_SECRET` - Optional. Falls back to `JWT_SECRET`, then a random per-process value.
//! - `MAX_UPLOAD_BYTES` - Optional. Defaults to `1048576`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use rand::RngCore;
use thiserror::Error;

use crate::util::{env_var_bool, env_var_non_empty};

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 1024 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Which record store backs the vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Sqlite,
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(ConfigError::InvalidValue(
                "VAULT_STORE".to_string(),
                format!("unknown backend '{}' (expected sqlite or memory)", other),
            )),
        }
    }
}

/// Owner name that `DASHBOARD_PASSWORD` logs in as.
pub const DEFAULT_OWNER: &str = "admin";

/// Dashboard authentication settings.
///
/// Every vault owner has their own login password. The JWT subject is the
/// owner name, and all records and vault sessions are scoped to it.
#[derive(Clone)]
pub struct AuthConfig {
    /// Owner name -> login password
    pub users: HashMap<String, String>,
    pub jwt_secret: Option<String>,
    pub jwt_ttl_days: i64,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut users: Vec<&str> = self.users.keys().map(String::as_str).collect();
        users.sort_unstable();
        f.debug_struct("AuthConfig")
            .field("users", &users)
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "<redacted>"))
            .field("jwt_ttl_days", &self.jwt_ttl_days)
            .finish()
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            users: HashMap::new(),
            jwt_secret: None,
            jwt_ttl_days: 30,
        }
    }
}

impl AuthConfig {
    pub fn auth_required(&self, dev_mode: bool) -> bool {
        !dev_mode
    }

    /// Login password configured for `user`, if that owner exists.
    pub fn password_for(&self, user: &str) -> Option<&str> {
        self.users
            .get(user)
            .map(String::as_str)
            .filter(|p| !p.is_empty())
    }
}

/// Parse `name:password,name:password`. Passwords may contain `:` but not `,`.
pub fn parse_dashboard_users(raw: &str) -> Result<HashMap<String, String>, ConfigError> {
    let mut users = HashMap::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let invalid = |reason: &str| {
            ConfigError::InvalidValue("DASHBOARD_USERS".to_string(), reason.to_string())
        };
        let (name, password) = entry
            .split_once(':')
            .ok_or_else(|| invalid("expected name:password entries"))?;
        let name = name.trim();
        if name.is_empty() || password.is_empty() {
            return Err(invalid("empty user name or password"));
        }
        if users.insert(name.to_string(), password.to_string()).is_some() {
            return Err(invalid(&format!("duplicate user '{}'", name)));
        }
    }
    Ok(users)
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,

    /// Root for `vault.db` and `vault-files/`
    pub data_dir: PathBuf,

    pub store_backend: StoreBackend,

    /// Skip dashboard auth (local development)
    pub dev_mode: bool,

    pub auth: AuthConfig,

    /// Idle timeout after which an unlocked vault session is dropped
    pub session_idle_ttl: Duration,

    pub signed_url_ttl: Duration,

    /// HMAC key for download links
    pub url_signing_secret: String,

    pub max_upload_bytes: usize,
}

fn parse_env<T: FromStr>(name: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env_var_non_empty(name) {
        Some(raw) => raw
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        None => Ok(default),
    }
}

fn random_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if auth is required and `JWT_SECRET`
    /// is unset, or `ConfigError::InvalidValue` for unparseable values.
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = env_var_non_empty("HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = parse_env("PORT", 3000u16)?;
        let (data_dir, store_backend) = Self::storage_from_env()?;
        let dev_mode = env_var_bool("DEV_MODE", false);

        let mut users = match env_var_non_empty("DASHBOARD_USERS") {
            Some(raw) => parse_dashboard_users(&raw)?,
            None => HashMap::new(),
        };
        if let Some(password) = env_var_non_empty("DASHBOARD_PASSWORD") {
            if users.contains_key(DEFAULT_OWNER) {
                return Err(ConfigError::InvalidValue(
                    "DASHBOARD_PASSWORD".to_string(),
                    format!("'{}' is already defined in DASHBOARD_USERS", DEFAULT_OWNER),
                ));
            }
            users.insert(DEFAULT_OWNER.to_string(), password);
        }

        let auth = AuthConfig {
            users,
            jwt_secret: env_var_non_empty("JWT_SECRET"),
            jwt_ttl_days: parse_env("JWT_TTL_DAYS", 30i64)?,
        };
        if auth.auth_required(dev_mode) && auth.jwt_secret.is_none() {
            return Err(ConfigError::MissingEnvVar("JWT_SECRET".to_string()));
        }

        let session_idle_ttl = Duration::from_secs(parse_env("SESSION_IDLE_TTL_SECS", 1800u64)?);
        let signed_url_ttl = Duration::from_secs(parse_env("SIGNED_URL_TTL_SECS", 60u64)?);
        let url_signing_secret = env_var_non_empty("URL_SIGNING_SECRET")
            .or_else(|| auth.jwt_secret.clone())
            .unwrap_or_else(random_secret);
        let max_upload_bytes = parse_env("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?;

        Ok(Self {
            host,
            port,
            data_dir,
            store_backend,
            dev_mode,
            auth,
            session_idle_ttl,
            signed_url_ttl,
            url_signing_secret,
            max_upload_bytes,
        })
    }

    /// Read only `DATA_DIR` and `VAULT_STORE`. Maintenance tools need no auth settings.
    pub fn storage_from_env() -> Result<(PathBuf, StoreBackend), ConfigError> {
        let data_dir = env_var_non_empty("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./data"));
        let store_backend = match env_var_non_empty("VAULT_STORE") {
            Some(raw) => raw.parse()?,
            None => StoreBackend::Sqlite,
        };
        Ok((data_dir, store_backend))
    }

    /// Create a config with custom values (useful for testing).
    ///
    /// In-memory store, dev mode on, random signing secret.
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            data_dir,
            store_backend: StoreBackend::Memory,
            dev_mode: true,
            auth: AuthConfig::default(),
            session_idle_ttl: Duration::from_secs(1800),
            signed_url_ttl: Duration::from_secs(60),
            url_signing_secret: random_secret(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn files_dir(&self) -> PathBuf {
        self.data_dir.join("vault-files")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_backend_parses_known_values() {
        assert_eq!("sqlite".parse::<StoreBackend>().unwrap(), StoreBackend::Sqlite);
        assert_eq!(" Memory ".parse::<StoreBackend>().unwrap(), StoreBackend::Memory);
        assert!(matches!(
            "postgres".parse::<StoreBackend>(),
            Err(ConfigError::InvalidValue(name, _)) if name == "VAULT_STORE"
        ));
    }

    #[test]
    fn dashboard_users_parse_per_user_passwords() {
        let users = parse_dashboard_users("alice:a-pass, bob:b:pass,").unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users["alice"], "a-pass");
        assert_eq!(users["bob"], "b:pass");

        assert!(parse_dashboard_users("alice").is_err());
        assert!(parse_dashboard_users(":pw").is_err());
        assert!(parse_dashboard_users("alice:").is_err());
        assert!(parse_dashboard_users("alice:x,alice:y").is_err());
    }

    #[test]
    fn auth_config_debug_hides_passwords() {
        let auth = AuthConfig {
            users: parse_dashboard_users("alice:hunter2").unwrap(),
            jwt_secret: Some("jwt-secret".to_string()),
            jwt_ttl_days: 30,
        };
        let debug = format!("{:?}", auth);
        assert!(debug.contains("alice"));
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("jwt-secret"));
        assert_eq!(auth.password_for("alice"), Some("hunter2"));
        assert_eq!(auth.password_for("bob"), None);
    }

    #[test]
    fn new_config_uses_defaults() {
        let config = Config::new(PathBuf::from("/tmp/vault"));
        assert_eq!(config.files_dir(), PathBuf::from("/tmp/vault/vault-files"));
        assert_eq!(config.max_upload_bytes, 1_048_576);
        assert_eq!(config.signed_url_ttl, Duration::from_secs(60));
        assert_eq!(config.url_signing_secret.len(), 64);
        assert!(!config.auth.auth_required(config.dev_mode));
    }
}
