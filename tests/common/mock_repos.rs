//! In-memory collaborators for testing

use async_trait::async_trait;
use authgate::core::db::{Identity, IdentityStore, IdentityStoreError};
use authgate::core::kv::{KeyValueStore, KvError, MemoryStore};
use authgate::core::notify::{NotificationSender, NotifyError};
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

/// In-memory identity store for testing
#[derive(Default, Clone)]
pub struct MockIdentityStore {
    identities: Arc<DashMap<Uuid, Identity>>,
    by_email: Arc<DashMap<String, Uuid>>,
    unavailable: Arc<AtomicBool>,
}

impl MockIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail as if the database timed out
    #[allow(dead_code)]
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Delete an identity behind the service's back
    #[allow(dead_code)]
    pub fn remove(&self, id: Uuid) {
        if let Some((_, identity)) = self.identities.remove(&id) {
            self.by_email.remove(&identity.email);
        }
    }

    #[allow(dead_code)]
    pub fn get(&self, id: Uuid) -> Option<Identity> {
        self.identities.get(&id).map(|r| r.value().clone())
    }

    fn check(&self) -> Result<(), IdentityStoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(IdentityStoreError::Timeout);
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityStore for MockIdentityStore {
    async fn create(
        &self,
        id: Uuid,
        email: &str,
        password_hash: &str,
    ) -> Result<Identity, IdentityStoreError> {
        self.check()?;

        match self.by_email.entry(email.to_string()) {
            Entry::Occupied(_) => Err(IdentityStoreError::DuplicateEmail),
            Entry::Vacant(slot) => {
                let identity = Identity {
                    id,
                    email: email.to_string(),
                    password_hash: password_hash.to_string(),
                    created_at: Utc::now(),
                };
                self.identities.insert(id, identity.clone());
                slot.insert(id);
                Ok(identity)
            }
        }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, IdentityStoreError> {
        self.check()?;
        Ok(self
            .by_email
            .get(email)
            .and_then(|id| self.identities.get(id.value()).map(|r| r.value().clone())))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>, IdentityStoreError> {
        self.check()?;
        Ok(self.identities.get(&id).map(|r| r.value().clone()))
    }

    async fn update_password_hash(
        &self,
        id: Uuid,
        password_hash: &str,
    ) -> Result<(), IdentityStoreError> {
        self.check()?;
        match self.identities.get_mut(&id) {
            Some(mut identity) => {
                identity.password_hash = password_hash.to_string();
                Ok(())
            }
            None => Err(IdentityStoreError::NotFound),
        }
    }
}

/// A reset link handed to the sender
#[derive(Debug, Clone)]
pub struct SentLink {
    pub email: String,
    pub url: String,
}

impl SentLink {
    /// The raw reset token carried by the link
    pub fn token(&self) -> String {
        self.url
            .split_once("token=")
            .map(|(_, token)| token.to_string())
            .unwrap_or_default()
    }
}

/// Sender that records every link on a channel
#[derive(Clone)]
pub struct RecordingSender {
    tx: mpsc::UnboundedSender<SentLink>,
}

impl RecordingSender {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SentLink>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl NotificationSender for RecordingSender {
    async fn send_reset_link(&self, email: &str, reset_url: &str) -> Result<(), NotifyError> {
        let _ = self.tx.send(SentLink {
            email: email.to_string(),
            url: reset_url.to_string(),
        });
        Ok(())
    }
}

/// Sender whose provider always rejects
#[derive(Clone, Copy, Default)]
pub struct FailingSender;

#[async_trait]
impl NotificationSender for FailingSender {
    async fn send_reset_link(&self, _email: &str, _reset_url: &str) -> Result<(), NotifyError> {
        Err(NotifyError::Rejected { status: 500 })
    }
}

/// Key-value backend that is always down
#[derive(Clone, Copy, Default)]
pub struct UnavailableStore;

#[async_trait]
impl KeyValueStore for UnavailableStore {
    async fn set_with_ttl(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), KvError> {
        Err(KvError::Unavailable("connection refused".to_string()))
    }

    async fn get(&self, _key: &str) -> Result<Option<String>, KvError> {
        Err(KvError::Unavailable("connection refused".to_string()))
    }

    async fn delete(&self, _key: &str) -> Result<(), KvError> {
        Err(KvError::Unavailable("connection refused".to_string()))
    }

    async fn take(&self, _key: &str) -> Result<Option<String>, KvError> {
        Err(KvError::Unavailable("connection refused".to_string()))
    }

    async fn increment_window(&self, _key: &str, _window: Duration) -> Result<i64, KvError> {
        Err(KvError::Unavailable("connection refused".to_string()))
    }

    async fn ping(&self) -> Result<(), KvError> {
        Err(KvError::Unavailable("connection refused".to_string()))
    }
}

/// Memory store whose next `n` writes fail
#[allow(dead_code)]
#[derive(Clone, Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    failing_writes: Arc<AtomicUsize>,
}

#[allow(dead_code)]
impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_writes(&self, n: usize) {
        self.failing_writes.store(n, Ordering::SeqCst);
    }

    fn write_fails(&self) -> bool {
        self.failing_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl KeyValueStore for FlakyStore {
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), KvError> {
        if self.write_fails() {
            return Err(KvError::Unavailable("write dropped".to_string()));
        }
        self.inner.set_with_ttl(key, value, ttl).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        self.inner.get(key).await
    }

    async fn delete(&self, key: &str) -> Result<(), KvError> {
        self.inner.delete(key).await
    }

    async fn take(&self, key: &str) -> Result<Option<String>, KvError> {
        self.inner.take(key).await
    }

    async fn increment_window(&self, key: &str, window: Duration) -> Result<i64, KvError> {
        self.inner.increment_window(key, window).await
    }

    async fn ping(&self) -> Result<(), KvError> {
        self.inner.ping().await
    }
}
