//! Core of the auth service: credential lifecycle, session storage and rate limiting

pub mod auth;
pub mod config;
pub mod db;
pub mod deadline;
pub mod kv;
pub mod notify;
pub mod rate_limiter;
pub mod session;
