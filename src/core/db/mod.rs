//! Database module for authgate
//!
//! PostgreSQL connectivity, the identity model and the identity store.

pub mod models;
pub mod pool;
pub mod repositories;

pub use models::Identity;
pub use pool::{DbConfig, DbError, create_pool, create_pool_with_migrations};
pub use repositories::{IdentityStore, IdentityStoreError, PgIdentityStore};

pub use sqlx::PgPool;
