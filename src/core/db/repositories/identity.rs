//! Identity store
//!
//! The lifecycle service only ever reads identities and replaces password hashes, so the
//! store contract is small. [`PgIdentityStore`] keeps users in PostgreSQL; the email column
//! carries a unique constraint and a violation maps to [`IdentityStoreError::DuplicateEmail`].

use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::core::db::models::Identity;
use crate::core::deadline::{DEFAULT_BACKEND_TIMEOUT, within};

/// Identity store error types
#[derive(Debug, thiserror::Error)]
pub enum IdentityStoreError {
    #[error("Email already exists")]
    DuplicateEmail,

    #[error("Identity not found")]
    NotFound,

    #[error("Identity store timed out")]
    Timeout,

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

impl From<tokio::time::error::Elapsed> for IdentityStoreError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        IdentityStoreError::Timeout
    }
}

#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Persist a new identity; fails with `DuplicateEmail` if the email is taken
    async fn create(
        &self,
        id: Uuid,
        email: &str,
        password_hash: &str,
    ) -> Result<Identity, IdentityStoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, IdentityStoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>, IdentityStoreError>;

    /// Replace the password hash; fails with `NotFound` for an unknown id
    async fn update_password_hash(
        &self,
        id: Uuid,
        password_hash: &str,
    ) -> Result<(), IdentityStoreError>;
}

/// PostgreSQL-backed identity store
#[derive(Clone)]
pub struct PgIdentityStore {
    pool: PgPool,
    timeout: Duration,
}

impl PgIdentityStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            timeout: DEFAULT_BACKEND_TIMEOUT,
        }
    }

    /// Set the deadline applied to every query
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl IdentityStore for PgIdentityStore {
    async fn create(
        &self,
        id: Uuid,
        email: &str,
        password_hash: &str,
    ) -> Result<Identity, IdentityStoreError> {
        let query = sqlx::query_as::<_, Identity>(
            r#"
            INSERT INTO users (id, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, email, password_hash, created_at
            "#,
        )
        .bind(id)
        .bind(email)
        .bind(password_hash)
        .fetch_one(&self.pool);

        within(self.timeout, async {
            query.await.map_err(|e| {
                if is_unique_violation(&e) {
                    IdentityStoreError::DuplicateEmail
                } else {
                    IdentityStoreError::DatabaseError(e)
                }
            })
        })
        .await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, IdentityStoreError> {
        let query = sqlx::query_as::<_, Identity>(
            r#"
            SELECT id, email, password_hash, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool);

        within(self.timeout, async { Ok(query.await?) }).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>, IdentityStoreError> {
        let query = sqlx::query_as::<_, Identity>(
            r#"
            SELECT id, email, password_hash, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool);

        within(self.timeout, async { Ok(query.await?) }).await
    }

    async fn update_password_hash(
        &self,
        id: Uuid,
        password_hash: &str,
    ) -> Result<(), IdentityStoreError> {
        let query = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(password_hash)
        .execute(&self.pool);

        let result = within(self.timeout, async { Ok::<_, IdentityStoreError>(query.await?) }).await?;

        if result.rows_affected() == 0 {
            return Err(IdentityStoreError::NotFound);
        }
        Ok(())
    }
}
