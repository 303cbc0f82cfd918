//! Common test utilities for authgate integration tests

pub mod mock_repos;

use std::sync::Arc;

use authgate::core::auth::{
    AuthApiState, AuthService, JwtConfig, JwtService, PasswordHasher, auth_api_router,
};
use authgate::core::config::RateLimits;
use authgate::core::kv::{KeyValueStore, MemoryStore};
use authgate::core::notify::NotificationSender;
use authgate::core::rate_limiter::{RateLimitRule, RateLimiter};
use authgate::core::session::SessionStore;
use axum::Router;
use tokio::sync::mpsc;

#[allow(unused_imports)]
pub use mock_repos::{
    FailingSender, FlakyStore, MockIdentityStore, RecordingSender, SentLink, UnavailableStore,
};

pub const TEST_JWT_SECRET: &str = "test-secret-key-that-is-at-least-32-bytes-long";
pub const TEST_BASE_URL: &str = "http://auth.test";

/// Lowest bcrypt cost, keeps tests fast
pub const TEST_BCRYPT_COST: u32 = 4;

/// Limits high enough that no test trips them by accident
#[allow(dead_code)]
pub fn generous_limits() -> RateLimits {
    let rule = RateLimitRule::per_minute(1_000);
    RateLimits {
        signup: rule,
        login: rule,
        refresh: rule,
        logout: rule,
        forgot_password: rule,
        reset_password: rule,
    }
}

/// A fully wired service over in-memory collaborators
pub struct TestApp {
    pub service: AuthService,
    pub identities: MockIdentityStore,
    /// Backing store, unless the builder was given another one
    pub kv: MemoryStore,
    pub outbox: mpsc::UnboundedReceiver<SentLink>,
    pub rate_limiter: RateLimiter,
    pub rate_limits: RateLimits,
}

#[allow(dead_code)]
impl TestApp {
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> TestAppBuilder {
        TestAppBuilder::default()
    }

    /// HTTP router over this app's service
    pub fn router(&self) -> Router {
        auth_api_router(AuthApiState {
            auth_service: self.service.clone(),
            rate_limiter: self.rate_limiter.clone(),
            rate_limits: self.rate_limits,
            trust_forwarded_for: false,
        })
    }
}

#[derive(Default)]
pub struct TestAppBuilder {
    rotate_refresh_tokens: bool,
    failing_sender: bool,
    kv: Option<Arc<dyn KeyValueStore>>,
    rate_limits: Option<RateLimits>,
}

#[allow(dead_code)]
impl TestAppBuilder {
    pub fn rotate_refresh_tokens(mut self) -> Self {
        self.rotate_refresh_tokens = true;
        self
    }

    pub fn failing_sender(mut self) -> Self {
        self.failing_sender = true;
        self
    }

    /// Back sessions and rate limits with `kv` instead of a fresh memory store
    pub fn kv(mut self, kv: Arc<dyn KeyValueStore>) -> Self {
        self.kv = Some(kv);
        self
    }

    pub fn rate_limits(mut self, rate_limits: RateLimits) -> Self {
        self.rate_limits = Some(rate_limits);
        self
    }

    pub fn build(self) -> TestApp {
        let memory = MemoryStore::new();
        let kv: Arc<dyn KeyValueStore> = self
            .kv
            .unwrap_or_else(|| Arc::new(memory.clone()));

        let identities = MockIdentityStore::new();
        let (recorder, outbox) = RecordingSender::new();
        let sender: Arc<dyn NotificationSender> = if self.failing_sender {
            Arc::new(FailingSender)
        } else {
            Arc::new(recorder)
        };

        let service = AuthService::new(
            Arc::new(identities.clone()),
            SessionStore::new(Arc::clone(&kv)),
            JwtService::new(JwtConfig::new(TEST_JWT_SECRET)),
            PasswordHasher::new(TEST_BCRYPT_COST).expect("bcrypt cost 4 is valid"),
            sender,
        )
        .rotate_refresh_tokens(self.rotate_refresh_tokens)
        .public_base_url(TEST_BASE_URL);

        TestApp {
            service,
            identities,
            kv: memory,
            outbox,
            rate_limiter: RateLimiter::new(kv),
            rate_limits: self.rate_limits.unwrap_or_default(),
        }
    }
}
