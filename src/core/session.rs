//! Session store for refresh and password-reset tokens
//!
//! Maps opaque tokens to user IDs in the key-value backend:
//! - Refresh tokens live for 7 days and are reusable until revoked or expired
//! - Reset tokens live for 15 minutes, are stored under their SHA-256 hash,
//!   and are consumed atomically on first redemption
//!
//! `None` means the token is unknown, expired, or already consumed. Backend failures
//! and timeouts are returned as [`KvError`] and are never folded into `None`.

use std::sync::Arc;
use std::time::Duration;

use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::core::deadline::{DEFAULT_BACKEND_TIMEOUT, within};
use crate::core::kv::{KeyValueStore, KvError};

/// Refresh token lifetime (7 days)
pub const REFRESH_TOKEN_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Reset token lifetime (15 minutes)
pub const RESET_TOKEN_TTL: Duration = Duration::from_secs(15 * 60);

/// Random bytes per generated token (256 bits)
const TOKEN_BYTES: usize = 32;

const REFRESH_PREFIX: &str = "refresh:";
const RESET_PREFIX: &str = "reset:";

/// Generate an opaque, unguessable token (64 hex characters)
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Hash a token using SHA-256
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Token-to-user mappings in the key-value backend
#[derive(Clone)]
pub struct SessionStore {
    kv: Arc<dyn KeyValueStore>,
    timeout: Duration,
}

impl SessionStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            timeout: DEFAULT_BACKEND_TIMEOUT,
        }
    }

    /// Set the deadline applied to every backend call
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn refresh_key(token: &str) -> String {
        format!("{REFRESH_PREFIX}{}", hash_token(token))
    }

    fn reset_key(token: &str) -> String {
        format!("{RESET_PREFIX}{}", hash_token(token))
    }

    /// Register a refresh token. Registering the same token again resets its TTL.
    pub async fn register_refresh(&self, token: &str, user_id: &str) -> Result<(), KvError> {
        let key = Self::refresh_key(token);
        within(
            self.timeout,
            self.kv.set_with_ttl(&key, user_id, REFRESH_TOKEN_TTL),
        )
        .await
    }

    /// Look up the user behind a refresh token without consuming it
    pub async fn resolve_refresh(&self, token: &str) -> Result<Option<String>, KvError> {
        let key = Self::refresh_key(token);
        within(self.timeout, self.kv.get(&key)).await
    }

    /// Delete a refresh token. Revoking an unknown token succeeds.
    pub async fn revoke_refresh(&self, token: &str) -> Result<(), KvError> {
        let key = Self::refresh_key(token);
        within(self.timeout, self.kv.delete(&key)).await
    }

    /// Atomically resolve and delete a refresh token (rotating refresh)
    pub async fn take_refresh(&self, token: &str) -> Result<Option<String>, KvError> {
        let key = Self::refresh_key(token);
        within(self.timeout, self.kv.take(&key)).await
    }

    /// Register a single-use reset token; only its hash reaches the backend
    pub async fn register_reset(&self, token: &str, user_id: &str) -> Result<(), KvError> {
        let key = Self::reset_key(token);
        within(
            self.timeout,
            self.kv.set_with_ttl(&key, user_id, RESET_TOKEN_TTL),
        )
        .await
    }

    /// Redeem a reset token. At most one caller ever receives the user ID.
    pub async fn consume_reset(&self, token: &str) -> Result<Option<String>, KvError> {
        let key = Self::reset_key(token);
        within(self.timeout, self.kv.take(&key)).await
    }
}
