//! Brevo transactional email sender

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use super::templates::{RESET_PASSWORD_SUBJECT, reset_password_template};
use super::{NotificationSender, NotifyError};
use crate::core::deadline::{DEFAULT_BACKEND_TIMEOUT, within};

/// Brevo transactional email endpoint
pub const BREVO_API_URL: &str = "https://api.brevo.com/v3/smtp/email";

/// Display name used when none is configured
pub const DEFAULT_SENDER_NAME: &str = "Auth Service";

/// Brevo account settings
#[derive(Clone)]
pub struct BrevoConfig {
    pub api_key: String,
    pub sender_email: String,
    pub sender_name: String,
    pub api_url: String,
}

impl BrevoConfig {
    pub fn new(api_key: impl Into<String>, sender_email: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            sender_email: sender_email.into(),
            sender_name: DEFAULT_SENDER_NAME.to_string(),
            api_url: BREVO_API_URL.to_string(),
        }
    }

    pub fn sender_name(mut self, name: impl Into<String>) -> Self {
        self.sender_name = name.into();
        self
    }

    /// Override the endpoint, e.g. to point at a local stub
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }
}

impl std::fmt::Debug for BrevoConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrevoConfig")
            .field("api_key", &"<redacted>")
            .field("sender_email", &self.sender_email)
            .field("sender_name", &self.sender_name)
            .field("api_url", &self.api_url)
            .finish()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendEmailRequest<'a> {
    sender: Contact<'a>,
    to: Vec<Contact<'a>>,
    subject: &'a str,
    html_content: String,
}

#[derive(Debug, Serialize)]
struct Contact<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

/// Sends reset links through Brevo
#[derive(Clone)]
pub struct BrevoSender {
    client: reqwest::Client,
    config: BrevoConfig,
    timeout: Duration,
}

impl BrevoSender {
    pub fn new(config: BrevoConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            timeout: DEFAULT_BACKEND_TIMEOUT,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn build_request<'a>(&'a self, to: &'a str, reset_url: &str) -> SendEmailRequest<'a> {
        SendEmailRequest {
            sender: Contact {
                email: &self.config.sender_email,
                name: Some(&self.config.sender_name),
            },
            to: vec![Contact {
                email: to,
                name: None,
            }],
            subject: RESET_PASSWORD_SUBJECT,
            html_content: reset_password_template(reset_url),
        }
    }
}

#[async_trait]
impl NotificationSender for BrevoSender {
    async fn send_reset_link(&self, email: &str, reset_url: &str) -> Result<(), NotifyError> {
        let body = self.build_request(email, reset_url);

        let response = within(self.timeout, async {
            self.client
                .post(&self.config.api_url)
                .header("api-key", &self.config.api_key)
                .header("Accept", "application/json")
                .json(&body)
                .send()
                .await
                .map_err(NotifyError::from)
        })
        .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
            });
        }

        tracing::debug!(status = status.as_u16(), "Reset email accepted by Brevo");
        Ok(())
    }
}
