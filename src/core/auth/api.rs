//! Auth API endpoints
//!
//! Provides REST API endpoints for authentication:
//! - POST /auth/signup - Register a new user
//! - POST /auth/login - Login and get tokens
//! - POST /auth/refresh - Get a new access token from a refresh token
//! - POST /auth/logout - Revoke a refresh token
//! - POST /auth/forgot-password - Email a password reset link
//! - POST /auth/reset-password - Set a new password with a reset token
//! - GET /api/me - Identity behind a bearer access token
//! - GET /health - Liveness
//!
//! Every `/auth/*` route sits behind its own rate limit rule, keyed on the client address.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{ConnectInfo, Request, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::core::auth::service::{
    AuthError, AuthService, ForgotPasswordRequest, LoginRequest, RefreshRequest,
    ResetPasswordRequest, SignupRequest, TokenResponse,
};
use crate::core::config::RateLimits;
use crate::core::rate_limiter::{RateLimitRule, RateLimiter};

/// Header carrying the refresh token on logout
pub const REFRESH_TOKEN_HEADER: &str = "x-refresh-token";

const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Auth API state containing the auth service
#[derive(Clone)]
pub struct AuthApiState {
    pub auth_service: AuthService,
    pub rate_limiter: RateLimiter,
    pub rate_limits: RateLimits,
    /// Key rate limits on `X-Forwarded-For` (only behind a trusted proxy)
    pub trust_forwarded_for: bool,
}

/// API error response
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    pub code: String,
}

impl ApiError {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
        }
    }
}

/// Convert AuthError to API response
impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AuthError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            AuthError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "INVALID_CREDENTIALS"),
            AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "INVALID_TOKEN"),
            AuthError::DuplicateEmail => (StatusCode::CONFLICT, "EMAIL_EXISTS"),
            AuthError::IdentityNotFound => (StatusCode::NOT_FOUND, "USER_NOT_FOUND"),
            AuthError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED"),
            AuthError::Unavailable(detail) => {
                tracing::error!(%detail, "Backend unavailable");
                (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE")
            }
            AuthError::InternalError(detail) => {
                tracing::error!(%detail, "Internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        };

        let body = ApiError::new(self.public_message(), code);

        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for AuthError {
    fn from(_: JsonRejection) -> Self {
        AuthError::Validation("Invalid request payload")
    }
}

/// Generic acknowledgement
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Response for GET /api/me
#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user_id: String,
    pub email: String,
}

/// Rate limit settings for one route, carried by its middleware
#[derive(Clone)]
struct RouteLimit {
    limiter: RateLimiter,
    route: &'static str,
    rule: RateLimitRule,
    trust_forwarded_for: bool,
}

/// Create the auth API router
pub fn auth_api_router(state: AuthApiState) -> Router {
    let limits = state.rate_limits;
    let guard = |route: &'static str, rule: RateLimitRule| {
        middleware::from_fn_with_state(
            RouteLimit {
                limiter: state.rate_limiter.clone(),
                route,
                rule,
                trust_forwarded_for: state.trust_forwarded_for,
            },
            rate_limit,
        )
    };

    let auth_routes = Router::new()
        .route(
            "/auth/signup",
            post(signup_handler).route_layer(guard("/auth/signup", limits.signup)),
        )
        .route(
            "/auth/login",
            post(login_handler).route_layer(guard("/auth/login", limits.login)),
        )
        .route(
            "/auth/refresh",
            post(refresh_handler).route_layer(guard("/auth/refresh", limits.refresh)),
        )
        .route(
            "/auth/logout",
            post(logout_handler).route_layer(guard("/auth/logout", limits.logout)),
        )
        .route(
            "/auth/forgot-password",
            post(forgot_password_handler)
                .route_layer(guard("/auth/forgot-password", limits.forgot_password)),
        )
        .route(
            "/auth/reset-password",
            post(reset_password_handler)
                .route_layer(guard("/auth/reset-password", limits.reset_password)),
        );

    let state = Arc::new(state);

    auth_routes
        .route("/api/me", get(me_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Count the request against its route's rule before running the handler
async fn rate_limit(State(limit): State<RouteLimit>, request: Request, next: Next) -> Response {
    let client = client_key(&request, limit.trust_forwarded_for);

    match limit.limiter.allow(&client, limit.route, limit.rule).await {
        Ok(true) => next.run(request).await,
        Ok(false) => {
            tracing::debug!(%client, route = limit.route, "Rate limit exceeded");
            AuthError::RateLimited.into_response()
        }
        Err(e) => AuthError::from(e).into_response(),
    }
}

/// Client identity for rate limiting: peer IP, or the first forwarded hop when trusted
fn client_key(request: &Request, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let forwarded = request
            .headers()
            .get(FORWARDED_FOR_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(hop) = forwarded {
            return hop.to_string();
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// POST /auth/signup
async fn signup_handler(
    State(state): State<Arc<AuthApiState>>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<MessageResponse>), AuthError> {
    let Json(request) = payload?;

    state.auth_service.signup(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("signup success")),
    ))
}

/// POST /auth/login
async fn login_handler(
    State(state): State<Arc<AuthApiState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, AuthError> {
    let Json(request) = payload?;

    let tokens = state.auth_service.login(request).await?;

    Ok(Json(tokens))
}

/// POST /auth/refresh
async fn refresh_handler(
    State(state): State<Arc<AuthApiState>>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, AuthError> {
    // A malformed body cannot name a session
    let Json(request) = payload.map_err(|_| AuthError::InvalidToken)?;

    tracing::debug!("Token refresh request");

    let tokens = state.auth_service.refresh(request).await?;

    Ok(Json(tokens))
}

/// POST /auth/logout
/// Token from `X-Refresh-Token`, or `{"refresh_token": ...}` in the body
async fn logout_handler(
    State(state): State<Arc<AuthApiState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<MessageResponse>, AuthError> {
    let token = extract_refresh_token(&headers, &body);

    state.auth_service.logout(&token).await?;

    Ok(Json(MessageResponse::new("logged out")))
}

/// POST /auth/forgot-password
async fn forgot_password_handler(
    State(state): State<Arc<AuthApiState>>,
    payload: Result<Json<ForgotPasswordRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AuthError> {
    let Json(request) = payload?;

    let message = state.auth_service.forgot_password(request).await?;

    Ok(Json(MessageResponse::new(message)))
}

/// POST /auth/reset-password
async fn reset_password_handler(
    State(state): State<Arc<AuthApiState>>,
    payload: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AuthError> {
    let Json(request) = payload?;

    state.auth_service.reset_password(request).await?;

    Ok(Json(MessageResponse::new("password reset successful")))
}

/// GET /api/me
async fn me_handler(
    State(state): State<Arc<AuthApiState>>,
    headers: HeaderMap,
) -> Result<Json<MeResponse>, AuthError> {
    let token = extract_bearer_token(&headers)?;

    let claims = state.auth_service.verify_access_token(&token)?;

    Ok(Json(MeResponse {
        user_id: claims.sub,
        email: claims.email,
    }))
}

/// GET /health
async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Refresh token for logout: header first, then JSON body. Empty if neither is present.
fn extract_refresh_token(headers: &HeaderMap, body: &[u8]) -> String {
    let from_header = headers
        .get(REFRESH_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    if let Some(token) = from_header {
        return token.to_string();
    }

    serde_json::from_slice::<RefreshRequest>(body)
        .map(|r| r.refresh_token)
        .unwrap_or_default()
}

/// Extract Bearer token from Authorization header
fn extract_bearer_token(headers: &HeaderMap) -> Result<String, AuthError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::InvalidToken)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidToken)?
        .trim();

    if token.is_empty() {
        return Err(AuthError::InvalidToken);
    }

    Ok(token.to_string())
}
