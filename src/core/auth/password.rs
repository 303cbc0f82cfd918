//! Password hashing and verification with bcrypt
//!
//! Hashing runs on the blocking thread pool because bcrypt is deliberately slow.
//! Verification never reports *why* a check failed: a wrong password, a malformed
//! stored hash and an unknown account all come back as `false`.

/// Cost factor for bcrypt hashing (12 is recommended for production)
pub const DEFAULT_BCRYPT_COST: u32 = 12;

/// bcrypt only reads the first 72 bytes of its input
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Password hashing errors
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("Password hashing failed: {0}")]
    HashingError(String),

    #[error("Password hashing task failed: {0}")]
    TaskFailed(String),
}

/// Hashes new passwords and checks presented ones
#[derive(Clone)]
pub struct PasswordHasher {
    cost: u32,
    /// Hash verified against when the account does not exist, so both failure paths cost the same
    dummy_hash: String,
}

impl PasswordHasher {
    /// Create a hasher with the given bcrypt cost (4..=31)
    pub fn new(cost: u32) -> Result<Self, PasswordError> {
        let dummy_hash = bcrypt::hash("authgate-dummy-password", cost)
            .map_err(|e| PasswordError::HashingError(e.to_string()))?;
        Ok(Self { cost, dummy_hash })
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Hash a password using bcrypt with automatic salt generation
    pub async fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let password = password.to_owned();
        let cost = self.cost;

        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| PasswordError::TaskFailed(e.to_string()))?
            .map_err(|e| PasswordError::HashingError(e.to_string()))
    }

    /// Verify a password against a bcrypt hash. Malformed hashes never match.
    pub async fn verify(&self, password: &str, hash: &str) -> Result<bool, PasswordError> {
        let password = password.to_owned();
        let hash = hash.to_owned();

        tokio::task::spawn_blocking(move || verify_blocking(&password, &hash))
            .await
            .map_err(|e| PasswordError::TaskFailed(e.to_string()))
    }

    /// Burn the same verification time as a real check, always failing
    pub async fn verify_absent(&self, password: &str) -> Result<bool, PasswordError> {
        self.verify(password, &self.dummy_hash).await?;
        Ok(false)
    }
}

fn verify_blocking(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}
