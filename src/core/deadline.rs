//! Deadlines for calls that leave the process.
//!
//! Every call into the key-value backend, the identity store and the notification
//! sender goes through [`within`], so a hung dependency surfaces as that layer's
//! timeout error instead of stalling the request.

use std::future::Future;
use std::time::Duration;

use tokio::time::error::Elapsed;

/// Default deadline applied to external calls
pub const DEFAULT_BACKEND_TIMEOUT: Duration = Duration::from_millis(2000);

/// Run `fut` with a deadline, converting an elapsed deadline into the caller's error type
pub async fn within<F, T, E>(limit: Duration, fut: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: From<Elapsed>,
{
    tokio::time::timeout(limit, fut).await?
}
