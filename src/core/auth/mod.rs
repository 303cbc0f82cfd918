//! Authentication module for authgate
//!
//! This module provides authentication functionality including:
//! - Password hashing and verification
//! - Access token (JWT) issuing and validation
//! - The credential lifecycle service (signup, login, refresh, logout, password reset)
//! - REST API endpoints for auth operations

pub mod api;
pub mod jwt;
pub mod password;
pub mod service;

pub use api::{AuthApiState, auth_api_router};
pub use jwt::{AccessToken, Claims, JwtConfig, JwtError, JwtService};
pub use password::{PasswordError, PasswordHasher};
pub use service::{
    AuthError, AuthService, ForgotPasswordRequest, LoginRequest, RefreshRequest,
    ResetPasswordRequest, SignupRequest, TokenResponse,
};
