//! authgate - session and token lifecycle service
//!
//! Issues short-lived access tokens, keeps refresh and password-reset tokens in a
//! key-value backend, and rate limits every auth route per client.

pub mod core;
