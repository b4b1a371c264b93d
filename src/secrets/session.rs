//! Session-scoped passcode holder.
//!
//! A passcode lives only in process memory, bound to one vault session and the
//! user that opened it. It is dropped on explicit lock or once the session has
//! been idle longer than the configured TTL.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Minimum passcode length, in characters.
pub const MIN_PASSCODE_CHARS: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PasscodeError {
    #[error("Passcode must be at least 4 characters")]
    TooShort,

    #[error("Passcodes do not match")]
    Mismatch,
}

/// The passcode for one vault session. Wiped from memory on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SessionPasscode(String);

impl SessionPasscode {
    /// Accept a passcode entered twice.
    pub fn new(passcode: &str, confirm: &str) -> Result<Self, PasscodeError> {
        if passcode.chars().count() < MIN_PASSCODE_CHARS {
            return Err(PasscodeError::TooShort);
        }
        if passcode != confirm {
            return Err(PasscodeError::Mismatch);
        }
        Ok(Self(passcode.to_string()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionPasscode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionPasscode(<redacted>)")
    }
}

struct VaultSession {
    user_id: String,
    passcode: SessionPasscode,
    last_used: Instant,
}

/// In-memory map of open vault sessions.
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, VaultSession>>,
    idle_ttl: Duration,
}

pub type SharedSessionStore = Arc<SessionStore>;

impl SessionStore {
    pub fn new(idle_ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            idle_ttl,
        }
    }

    /// Open a new session for `user_id` holding `passcode`.
    pub async fn unlock(&self, user_id: &str, passcode: SessionPasscode) -> Uuid {
        let id = Uuid::new_v4();
        self.sessions.write().await.insert(
            id,
            VaultSession {
                user_id: user_id.to_string(),
                passcode,
                last_used: Instant::now(),
            },
        );
        tracing::debug!(session_id = %id, user_id, "Vault session unlocked");
        id
    }

    /// Fetch the passcode for a live session owned by `user_id`.
    ///
    /// Refreshes the idle timer. Expired sessions are removed and yield `None`.
    pub async fn passcode(&self, session_id: Uuid, user_id: &str) -> Option<SessionPasscode> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(&session_id)?;
        if session.user_id != user_id {
            return None;
        }
        if session.last_used.elapsed() > self.idle_ttl {
            sessions.remove(&session_id);
            tracing::debug!(session_id = %session_id, "Vault session expired");
            return None;
        }
        session.last_used = Instant::now();
        Some(session.passcode.clone())
    }

    /// Swap the passcode of a live session. Returns false if the session is gone.
    pub async fn replace_passcode(
        &self,
        session_id: Uuid,
        user_id: &str,
        passcode: SessionPasscode,
    ) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(&session_id) {
            Some(session) if session.user_id == user_id => {
                session.passcode = passcode;
                session.last_used = Instant::now();
                true
            }
            _ => false,
        }
    }

    /// End a session. Returns true if it existed.
    pub async fn lock(&self, session_id: Uuid, user_id: &str) -> bool {
        let mut sessions = self.sessions.write().await;
        let owned = sessions
            .get(&session_id)
            .is_some_and(|s| s.user_id == user_id);
        if !owned {
            return false;
        }
        sessions.remove(&session_id);
        tracing::debug!(session_id = %session_id, "Vault session locked");
        true
    }

    /// Drop every session idle for longer than the TTL.
    pub async fn purge_expired(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        let ttl = self.idle_ttl;
        sessions.retain(|_, s| s.last_used.elapsed() <= ttl);
        before - sessions.len()
    }

    pub async fn active_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drop every session. Returns how many were open.
    pub async fn clear(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let count = sessions.len();
        sessions.clear();
        count
    }

    /// Periodically evict idle sessions until the process exits.
    pub fn start_cleanup_task(self: Arc<Self>) {
        let period = (self.idle_ttl / 4).max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let purged = self.purge_expired().await;
                if purged > 0 {
                    tracing::info!("Purged {} idle vault sessions", purged);
                }
            }
        });
    }
}
