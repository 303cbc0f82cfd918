//! Outbound notifications
//!
//! The lifecycle service hands reset links to a [`NotificationSender`] and never waits on
//! the outcome for the caller. [`BrevoSender`] delivers through the Brevo transactional
//! email API; [`DisabledSender`] is used when no API key is configured.

pub mod brevo;
pub mod templates;

use async_trait::async_trait;

pub use brevo::{BrevoConfig, BrevoSender};

/// Notification errors
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Email delivery is not configured")]
    NotConfigured,

    #[error("Email request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Email provider rejected the message with status {status}")]
    Rejected { status: u16 },

    #[error("Email provider timed out")]
    Timeout,
}

impl From<tokio::time::error::Elapsed> for NotifyError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        NotifyError::Timeout
    }
}

#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// Deliver a password reset link to `email`
    async fn send_reset_link(&self, email: &str, reset_url: &str) -> Result<(), NotifyError>;
}

/// Sender that refuses every message
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledSender;

#[async_trait]
impl NotificationSender for DisabledSender {
    async fn send_reset_link(&self, _email: &str, _reset_url: &str) -> Result<(), NotifyError> {
        Err(NotifyError::NotConfigured)
    }
}
