//! Fixed-window request limiting per (client, route)
//!
//! Each call increments a counter at `rl:{client}:{route}` in the key-value backend.
//! The first increment of a window attaches the window TTL; once the count exceeds the
//! rule's limit, calls are rejected until the key expires. Rejected calls still count,
//! so hammering a limited route cannot shorten the window.
//!
//! Bursts straddling a window boundary can reach twice the limit; that is the accepted
//! cost of a fixed window over a sliding log.
//!
//! # Usage Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use authgate::core::kv::MemoryStore;
//! use authgate::core::rate_limiter::{RateLimitRule, RateLimiter};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let limiter = RateLimiter::new(Arc::new(MemoryStore::new()));
//! let rule = RateLimitRule::new(5, Duration::from_secs(60));
//!
//! if limiter.allow("203.0.113.9", "/auth/login", rule).await.unwrap() {
//!     // Handle request
//! } else {
//!     // Reject with 429
//! }
//! # }
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::core::deadline::{DEFAULT_BACKEND_TIMEOUT, within};
use crate::core::kv::{KeyValueStore, KvError};

/// Limit and window for one route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitRule {
    /// Requests allowed per window
    pub limit: u32,
    /// Window length
    pub window: Duration,
}

impl RateLimitRule {
    pub const fn new(limit: u32, window: Duration) -> Self {
        Self { limit, window }
    }

    pub const fn per_minute(limit: u32) -> Self {
        Self::new(limit, Duration::from_secs(60))
    }
}

impl fmt::Display for RateLimitRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.limit, self.window.as_secs())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Invalid rate limit rule '{0}' (expected <limit>/<window_secs>)")]
pub struct ParseRuleError(pub String);

/// Parses `<limit>/<window_secs>`, e.g. `5/60`
impl FromStr for RateLimitRule {
    type Err = ParseRuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseRuleError(s.to_string());
        let (limit, window) = s.trim().split_once('/').ok_or_else(err)?;
        let limit: u32 = limit.trim().parse().map_err(|_| err())?;
        let window: u64 = window.trim().parse().map_err(|_| err())?;
        if window == 0 {
            return Err(err());
        }
        Ok(Self::new(limit, Duration::from_secs(window)))
    }
}

/// Fixed-window rate limiter over the shared key-value backend
#[derive(Clone)]
pub struct RateLimiter {
    kv: Arc<dyn KeyValueStore>,
    timeout: Duration,
}

impl RateLimiter {
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

    fn counter_key(client: &str, route: &str) -> String {
        format!("rl:{client}:{route}")
    }

    /// Count one request from `client` on `route` and report whether it is within `rule`
    pub async fn allow(
        &self,
        client: &str,
        route: &str,
        rule: RateLimitRule,
    ) -> Result<bool, KvError> {
        let key = Self::counter_key(client, route);
        let count = within(self.timeout, self.kv.increment_window(&key, rule.window)).await?;

        Ok(count <= i64::from(rule.limit))
    }
}
