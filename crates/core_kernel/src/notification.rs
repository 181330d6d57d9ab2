//! Outbound notification port (SMS)

use async_trait::async_trait;

use crate::ports::{DomainPort, PortError};

/// Maximum length of an outbound text
pub const MAX_MESSAGE_CHARS: usize = 1000;

/// Sends short text messages to a phone number
///
/// Delivery is best effort; callers log failures and carry on.
#[async_trait]
pub trait NotificationSender: DomainPort {
    async fn send(&self, recipient_phone: &str, text: &str) -> Result<(), PortError>;
}

/// Truncates a message to [`MAX_MESSAGE_CHARS`] characters
pub fn truncate_message(text: &str) -> String {
    text.chars().take(MAX_MESSAGE_CHARS).collect()
}

/// Sender that drops every message, logging it at debug level
#[derive(Debug, Default, Clone)]
pub struct NoopNotificationSender;

impl DomainPort for NoopNotificationSender {}

#[async_trait]
impl NotificationSender for NoopNotificationSender {
    async fn send(&self, recipient_phone: &str, text: &str) -> Result<(), PortError> {
        tracing::debug!(recipient = %recipient_phone, chars = text.chars().count(), "notification dropped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_counts_characters_not_bytes() {
        let text = "₱".repeat(MAX_MESSAGE_CHARS + 5);
        let truncated = truncate_message(&text);
        assert_eq!(truncated.chars().count(), MAX_MESSAGE_CHARS);
    }
}
