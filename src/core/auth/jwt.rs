//! Access token issuing and validation
//!
//! Access tokens are HS256 JWTs that live for exactly 15 minutes. They are never stored:
//! a token is valid if and only if its signature verifies against a known key and its
//! expiry has not passed. There is no way to extend a token; clients refresh instead.
//!
//! Keys form a small ring: one active key signs new tokens (its id goes into the `kid`
//! header) and any number of previous keys stay accepted for verification, so a secret
//! can be rotated by redeploying without logging everyone out.

use std::collections::HashMap;
use std::fmt;

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::db::Identity;

/// Access token lifetime (15 minutes)
pub const ACCESS_TOKEN_EXPIRATION_MINUTES: i64 = 15;

/// Key id used when none is configured
pub const DEFAULT_KEY_ID: &str = "primary";

/// Default `iss` claim
pub const DEFAULT_ISSUER: &str = "authgate";

/// JWT configuration
#[derive(Clone)]
pub struct JwtConfig {
    /// Secret key for signing tokens
    pub secret: String,
    /// Key id written to the `kid` header of issued tokens
    pub key_id: String,
    /// Retired keys (`kid` -> secret), accepted for verification only
    pub previous_keys: Vec<(String, String)>,
    /// Token issuer
    pub issuer: String,
}

impl JwtConfig {
    /// Create a new JWT configuration
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            key_id: DEFAULT_KEY_ID.to_string(),
            previous_keys: Vec::new(),
            issuer: DEFAULT_ISSUER.to_string(),
        }
    }

    /// Set the id of the active signing key
    pub fn key_id(mut self, key_id: impl Into<String>) -> Self {
        self.key_id = key_id.into();
        self
    }

    /// Accept tokens signed with a retired key
    pub fn previous_key(mut self, key_id: impl Into<String>, secret: impl Into<String>) -> Self {
        self.previous_keys.push((key_id.into(), secret.into()));
        self
    }

    /// Set issuer
    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let previous: Vec<&str> = self.previous_keys.iter().map(|(k, _)| k.as_str()).collect();
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("key_id", &self.key_id)
            .field("previous_keys", &previous)
            .field("issuer", &self.issuer)
            .finish()
    }
}

/// JWT errors
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Token encoding failed: {0}")]
    EncodingError(String),

    #[error("Token decoding failed: {0}")]
    DecodingError(String),

    #[error("Token expired")]
    Expired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Unknown signing key")]
    UnknownKey,
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => JwtError::Expired,
            ErrorKind::InvalidToken | ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                JwtError::InvalidToken
            }
            _ => JwtError::DecodingError(err.to_string()),
        }
    }
}

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// User email
    pub email: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issuer
    pub iss: String,
    /// JWT ID (unique identifier for this token)
    pub jti: String,
}

impl Claims {
    /// Get user ID as UUID
    pub fn user_id(&self) -> Result<Uuid, JwtError> {
        Uuid::parse_str(&self.sub).map_err(|_| JwtError::InvalidToken)
    }
}

/// A freshly signed access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessToken {
    pub token: String,
    /// Expiration (Unix timestamp)
    pub expires_at: i64,
}

/// JWT service for token operations
#[derive(Clone)]
pub struct JwtService {
    issuer: String,
    key_id: String,
    encoding_key: EncodingKey,
    decoding_keys: HashMap<String, DecodingKey>,
}

impl JwtService {
    /// Create a new JWT service
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());

        let mut decoding_keys = HashMap::new();
        for (key_id, secret) in &config.previous_keys {
            decoding_keys.insert(key_id.clone(), DecodingKey::from_secret(secret.as_bytes()));
        }
        // The active key wins if a retired key reuses its id
        decoding_keys.insert(
            config.key_id.clone(),
            DecodingKey::from_secret(config.secret.as_bytes()),
        );

        Self {
            issuer: config.issuer,
            key_id: config.key_id,
            encoding_key,
            decoding_keys,
        }
    }

    /// Issue an access token for `identity`
    pub fn issue(&self, identity: &Identity) -> Result<AccessToken, JwtError> {
        let now = Utc::now();
        let exp = now + Duration::minutes(ACCESS_TOKEN_EXPIRATION_MINUTES);

        let claims = Claims {
            sub: identity.id.to_string(),
            email: identity.email.clone(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            iss: self.issuer.clone(),
            jti: Uuid::new_v4().to_string(),
        };

        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some(self.key_id.clone());

        let token = encode(&header, &claims, &self.encoding_key)
            .map_err(|e| JwtError::EncodingError(e.to_string()))?;

        Ok(AccessToken {
            token,
            expires_at: exp.timestamp(),
        })
    }

    /// Validate and decode an access token
    pub fn validate(&self, token: &str) -> Result<Claims, JwtError> {
        let header = jsonwebtoken::decode_header(token)?;
        let key_id = header.kid.as_deref().unwrap_or(&self.key_id);
        let key = self.decoding_keys.get(key_id).ok_or(JwtError::UnknownKey)?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iat", "iss", "sub"]);
        // Set leeway to 0 for strict expiration checking
        validation.leeway = 0;

        let token_data = decode::<Claims>(token, key, &validation)?;

        Ok(token_data.claims)
    }

    /// Id of the key currently used for signing
    pub fn active_key_id(&self) -> &str {
        &self.key_id
    }
}
