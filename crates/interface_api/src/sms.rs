//! SMS gateway adapter
//!
//! Delivers notifications through a Mocean-style REST gateway: a form POST
//! authenticated with a bearer token. Gateway failures map to `PortError`
//! so callers can treat delivery as best effort:
//!
//! - timeouts -> `PortError::Timeout`
//! - connection failures and 5xx -> `PortError::ServiceUnavailable`
//! - other non-success statuses -> `PortError::Internal`

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use core_kernel::{truncate_message, DomainPort, NotificationSender, PortError};

const SERVICE: &str = "sms-gateway";
const REQUEST_TIMEOUT_SECS: u64 = 15;

/// Sends texts through an HTTP SMS gateway
#[derive(Debug, Clone)]
pub struct HttpSmsSender {
    client: Client,
    endpoint: String,
    token: String,
    sender: String,
}

impl HttpSmsSender {
    pub fn new(
        endpoint: impl Into<String>,
        token: impl Into<String>,
        sender: impl Into<String>,
    ) -> Result<Self, PortError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| PortError::internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            token: token.into(),
            sender: sender.into(),
        })
    }

    /// Form fields for one message, text cut to the gateway limit
    fn form(&self, recipient: &str, text: &str) -> [(&'static str, String); 3] {
        [
            ("mocean-from", self.sender.clone()),
            ("mocean-to", recipient.to_string()),
            ("mocean-text", truncate_message(text)),
        ]
    }
}

fn map_request_error(err: reqwest::Error) -> PortError {
    if err.is_timeout() {
        PortError::Timeout {
            operation: "send sms".to_string(),
            duration_ms: REQUEST_TIMEOUT_SECS * 1000,
        }
    } else {
        warn!(error = %err, "SMS gateway unreachable");
        PortError::ServiceUnavailable {
            service: SERVICE.to_string(),
        }
    }
}

impl DomainPort for HttpSmsSender {}

#[async_trait]
impl NotificationSender for HttpSmsSender {
    async fn send(&self, recipient_phone: &str, text: &str) -> Result<(), PortError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .form(&self.form(recipient_phone, text))
            .send()
            .await
            .map_err(map_request_error)?;

        let status = response.status();
        if status.is_success() {
            debug!(recipient = %recipient_phone, "SMS accepted by gateway");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        warn!(status = status.as_u16(), body = %body, "SMS gateway rejected message");
        if status.is_server_error() {
            Err(PortError::ServiceUnavailable {
                service: SERVICE.to_string(),
            })
        } else {
            Err(PortError::internal(format!(
                "SMS gateway returned {}",
                status.as_u16()
            )))
        }
    }
}
