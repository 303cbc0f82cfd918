//! Authentication service
//!
//! Drives the credential lifecycle: signup, login, token refresh, logout and the
//! forgot/reset password pair. Coordinates the identity store, the session store,
//! the password hasher, the JWT service and the notification sender.
//!
//! Every failure leaves the service as an [`AuthError`]. Variants carry fixed public
//! messages; backend detail stays in the variant payload for logging only.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::core::auth::jwt::{Claims, JwtError, JwtService};
use crate::core::auth::password::{MAX_PASSWORD_BYTES, PasswordError, PasswordHasher};
use crate::core::db::Identity;
use crate::core::db::repositories::{IdentityStore, IdentityStoreError};
use crate::core::deadline::{DEFAULT_BACKEND_TIMEOUT, within};
use crate::core::kv::KvError;
use crate::core::notify::NotificationSender;
use crate::core::session::{SessionStore, generate_token};

/// Acknowledgement returned by forgot-password whether or not the email is known
pub const FORGOT_PASSWORD_ACK: &str = "If the email exists, a reset link has been sent";

/// Authentication service error types
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(&'static str),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Email already registered")]
    DuplicateEmail,

    #[error("User not found")]
    IdentityNotFound,

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Service temporarily unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl AuthError {
    /// Message safe to show to clients
    pub fn public_message(&self) -> String {
        match self {
            AuthError::Unavailable(_) => "Service temporarily unavailable".to_string(),
            AuthError::InternalError(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<KvError> for AuthError {
    fn from(err: KvError) -> Self {
        AuthError::Unavailable(err.to_string())
    }
}

impl From<IdentityStoreError> for AuthError {
    fn from(err: IdentityStoreError) -> Self {
        match err {
            IdentityStoreError::DuplicateEmail => AuthError::DuplicateEmail,
            IdentityStoreError::NotFound => AuthError::IdentityNotFound,
            _ => AuthError::Unavailable(err.to_string()),
        }
    }
}

impl From<JwtError> for AuthError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::EncodingError(_) => AuthError::InternalError(err.to_string()),
            _ => AuthError::InvalidToken,
        }
    }
}

impl From<PasswordError> for AuthError {
    fn from(err: PasswordError) -> Self {
        AuthError::InternalError(err.to_string())
    }
}

/// Signup request data
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(default)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
}

/// Login request data
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Token refresh (and logout) request
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(default)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(default)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(default)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

/// Tokens handed to the client after login or refresh
#[derive(Debug, Clone, serde::Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Present after login, and after refresh when rotation is enabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub token_type: String,
    /// Access token expiration (Unix timestamp)
    pub expires_at: i64,
}

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    identities: Arc<dyn IdentityStore>,
    sessions: SessionStore,
    jwt_service: JwtService,
    hasher: PasswordHasher,
    sender: Arc<dyn NotificationSender>,
    timeout: Duration,
    rotate_refresh_tokens: bool,
    public_base_url: String,
}

impl AuthService {
    /// Create a new authentication service
    pub fn new(
        identities: Arc<dyn IdentityStore>,
        sessions: SessionStore,
        jwt_service: JwtService,
        hasher: PasswordHasher,
        sender: Arc<dyn NotificationSender>,
    ) -> Self {
        Self {
            identities,
            sessions,
            jwt_service,
            hasher,
            sender,
            timeout: DEFAULT_BACKEND_TIMEOUT,
            rotate_refresh_tokens: false,
            public_base_url: "http://localhost:8080".to_string(),
        }
    }

    /// Set the deadline for reset link delivery
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Replace the refresh token on every refresh
    pub fn rotate_refresh_tokens(mut self, rotate: bool) -> Self {
        self.rotate_refresh_tokens = rotate;
        self
    }

    /// Base URL that reset links point at
    pub fn public_base_url(mut self, url: impl Into<String>) -> Self {
        self.public_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Validate email shape: exactly one `@` with something on both sides
    fn validate_email(email: &str) -> Result<(), AuthError> {
        match email.split_once('@') {
            Some((local, domain))
                if !local.is_empty() && !domain.is_empty() && !domain.contains('@') =>
            {
                Ok(())
            }
            _ => Err(AuthError::Validation("Invalid email format")),
        }
    }

    fn validate_password(password: &str) -> Result<(), AuthError> {
        if password.is_empty() {
            return Err(AuthError::Validation("Password is required"));
        }
        if password.len() > MAX_PASSWORD_BYTES {
            return Err(AuthError::Validation("Password must be at most 72 bytes"));
        }
        Ok(())
    }

    fn reset_url(&self, token: &str) -> String {
        format!("{}/auth/reset-password?token={}", self.public_base_url, token)
    }

    fn token_response(
        &self,
        identity: &Identity,
        refresh_token: Option<String>,
    ) -> Result<TokenResponse, AuthError> {
        let access = self.jwt_service.issue(identity)?;
        Ok(TokenResponse {
            access_token: access.token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_at: access.expires_at,
        })
    }

    async fn find_by_id(&self, user_id: &str) -> Result<Identity, AuthError> {
        // Values in the session store are always ids we wrote
        let id = Uuid::parse_str(user_id).map_err(|_| AuthError::InvalidToken)?;

        self.identities
            .find_by_id(id)
            .await?
            .ok_or(AuthError::IdentityNotFound)
    }

    /// Register a new identity. Does not open a session.
    pub async fn signup(&self, request: SignupRequest) -> Result<Identity, AuthError> {
        if request.email.is_empty() || request.password.is_empty() {
            return Err(AuthError::Validation("Email and password are required"));
        }
        Self::validate_email(&request.email)?;
        Self::validate_password(&request.password)?;

        let password_hash = self.hasher.hash(&request.password).await?;

        let identity = self
            .identities
            .create(Uuid::new_v4(), &request.email, &password_hash)
            .await?;

        tracing::info!(user_id = %identity.id, "Identity registered");
        Ok(identity)
    }

    /// Verify credentials and open a session
    pub async fn login(&self, request: LoginRequest) -> Result<TokenResponse, AuthError> {
        let identity = self.identities.find_by_email(&request.email).await?;

        let identity = match identity {
            Some(identity) => {
                if !self
                    .hasher
                    .verify(&request.password, &identity.password_hash)
                    .await?
                {
                    return Err(AuthError::InvalidCredentials);
                }
                identity
            }
            None => {
                self.hasher.verify_absent(&request.password).await?;
                return Err(AuthError::InvalidCredentials);
            }
        };

        let refresh_token = generate_token();
        self.sessions
            .register_refresh(&refresh_token, &identity.id.to_string())
            .await?;

        let response = self.token_response(&identity, Some(refresh_token))?;

        tracing::info!(user_id = %identity.id, "User logged in");
        Ok(response)
    }

    /// Exchange a refresh token for a new access token
    pub async fn refresh(&self, request: RefreshRequest) -> Result<TokenResponse, AuthError> {
        if request.refresh_token.is_empty() {
            return Err(AuthError::InvalidToken);
        }

        if !self.rotate_refresh_tokens {
            let user_id = self
                .sessions
                .resolve_refresh(&request.refresh_token)
                .await?
                .ok_or(AuthError::InvalidToken)?;

            let identity = self.find_by_id(&user_id).await?;
            return self.token_response(&identity, None);
        }

        // Lookups and signing happen before the take so their failures cannot spend the token
        let user_id = self
            .sessions
            .resolve_refresh(&request.refresh_token)
            .await?
            .ok_or(AuthError::InvalidToken)?;
        let identity = self.find_by_id(&user_id).await?;
        let refresh_token = generate_token();
        let response = self.token_response(&identity, Some(refresh_token.clone()))?;

        let user_id = self
            .sessions
            .take_refresh(&request.refresh_token)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        if let Err(e) = self
            .sessions
            .register_refresh(&refresh_token, &user_id)
            .await
        {
            if let Err(restore) = self
                .sessions
                .register_refresh(&request.refresh_token, &user_id)
                .await
            {
                tracing::error!(
                    %user_id,
                    error = %restore,
                    "refresh: restoring rotated token failed"
                );
            }
            return Err(e.into());
        }

        tracing::debug!(user_id = %identity.id, "Refresh token rotated");
        Ok(response)
    }

    /// Revoke a refresh token. Unknown and empty tokens succeed.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), AuthError> {
        if refresh_token.is_empty() {
            return Ok(());
        }

        self.sessions.revoke_refresh(refresh_token).await?;
        Ok(())
    }

    /// Start a password reset.
    ///
    /// Returns the same acknowledgement for known and unknown emails. Lookup, storage and
    /// delivery failures are logged and never reach the caller; delivery runs in the
    /// background.
    pub async fn forgot_password(
        &self,
        request: ForgotPasswordRequest,
    ) -> Result<&'static str, AuthError> {
        if request.email.is_empty() {
            return Err(AuthError::Validation("Email is required"));
        }

        let lookup = self.identities.find_by_email(&request.email).await;
        let identity = match lookup {
            Ok(Some(identity)) => identity,
            Ok(None) => return Ok(FORGOT_PASSWORD_ACK),
            Err(e) => {
                tracing::warn!(error = %e, "forgot-password: identity lookup failed");
                return Ok(FORGOT_PASSWORD_ACK);
            }
        };

        let token = generate_token();
        if let Err(e) = self
            .sessions
            .register_reset(&token, &identity.id.to_string())
            .await
        {
            tracing::warn!(
                user_id = %identity.id,
                error = %e,
                "forgot-password: storing reset token failed"
            );
            return Ok(FORGOT_PASSWORD_ACK);
        }

        let sender = Arc::clone(&self.sender);
        let timeout = self.timeout;
        let reset_url = self.reset_url(&token);
        let user_id = identity.id;
        let email = identity.email;

        tokio::spawn(async move {
            match within(timeout, sender.send_reset_link(&email, &reset_url)).await {
                Ok(()) => tracing::info!(%user_id, "Reset link sent"),
                Err(e) => {
                    tracing::warn!(%user_id, error = %e, "forgot-password: sending reset link failed")
                }
            }
        });

        Ok(FORGOT_PASSWORD_ACK)
    }

    /// Redeem a reset token and set a new password
    pub async fn reset_password(&self, request: ResetPasswordRequest) -> Result<(), AuthError> {
        Self::validate_password(&request.new_password)?;
        if request.token.is_empty() {
            return Err(AuthError::InvalidToken);
        }

        let user_id = self
            .sessions
            .consume_reset(&request.token)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        match self.apply_reset(&user_id, &request.new_password).await {
            Err(e @ (AuthError::Unavailable(_) | AuthError::InternalError(_))) => {
                // Hand the token back so the caller can retry
                if let Err(restore) = self
                    .sessions
                    .register_reset(&request.token, &user_id)
                    .await
                {
                    tracing::error!(
                        %user_id,
                        error = %restore,
                        "reset-password: restoring reset token failed"
                    );
                }
                Err(e)
            }
            result => result,
        }
    }

    async fn apply_reset(&self, user_id: &str, new_password: &str) -> Result<(), AuthError> {
        let id = Uuid::parse_str(user_id).map_err(|_| AuthError::InvalidToken)?;

        let password_hash = self.hasher.hash(new_password).await?;

        self.identities
            .update_password_hash(id, &password_hash)
            .await
            .map_err(|e| match e {
                IdentityStoreError::NotFound => AuthError::InvalidToken,
                other => other.into(),
            })?;

        tracing::info!(user_id = %id, "Password reset");
        Ok(())
    }

    /// Validate an access token and return its claims
    pub fn verify_access_token(&self, token: &str) -> Result<Claims, AuthError> {
        let claims = self.jwt_service.validate(token)?;
        claims.user_id()?;
        Ok(claims)
    }
}
