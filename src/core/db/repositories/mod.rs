//! Database repositories for authgate

pub mod identity;

pub use identity::{IdentityStore, IdentityStoreError, PgIdentityStore};
