//! Key-value backend used by the session store and the rate limiter
//!
//! The backend must provide per-key TTLs plus two atomic primitives:
//! - `take`: get-and-delete in one step (single-use tokens)
//! - `increment_window`: increment, attaching the window TTL on the first increment
//!
//! Two implementations are provided:
//! - [`RedisStore`] for production (`GETDEL` and a Lua script)
//! - [`MemoryStore`] for tests and single-process development

pub mod memory;
pub mod redis_store;

use std::time::Duration;

use async_trait::async_trait;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

/// Key-value backend errors
#[derive(Debug, thiserror::Error)]
pub enum KvError {
    #[error("Key-value backend unavailable: {0}")]
    Unavailable(String),

    #[error("Key-value backend timed out")]
    Timeout,

    #[error("Value at key is not an integer")]
    NotAnInteger,
}

impl From<redis::RedisError> for KvError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_timeout() {
            KvError::Timeout
        } else {
            KvError::Unavailable(err.to_string())
        }
    }
}

impl From<tokio::time::error::Elapsed> for KvError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        KvError::Timeout
    }
}

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Store `value` at `key`, replacing any previous value and TTL
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), KvError>;

    /// Read the value at `key`
    async fn get(&self, key: &str) -> Result<Option<String>, KvError>;

    /// Delete `key`. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), KvError>;

    /// Atomically read and delete `key`.
    ///
    /// Of any number of concurrent callers on the same key, at most one observes the value.
    async fn take(&self, key: &str) -> Result<Option<String>, KvError>;

    /// Atomically increment the counter at `key` and return the new count.
    ///
    /// When the increment creates the counter (0 -> 1) the key expires after `window`.
    async fn increment_window(&self, key: &str, window: Duration) -> Result<i64, KvError>;

    /// Check that the backend is reachable
    async fn ping(&self) -> Result<(), KvError>;
}
