//! Recording chat transport.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::traits::ChatTransport;
use crate::types::{ContentRef, MarketError, MarketResult, UserId};

/// Which transport call produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Send,
    File,
    Notify,
}

/// A recorded outbound message for test assertions.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedMessage {
    pub user: UserId,
    pub channel: Channel,
    /// Message text, or the caption for files
    pub text: String,
    pub content: Option<ContentRef>,
}

/// Transport that records every call and can be told to fail.
///
/// Failed calls are not recorded.
#[derive(Debug, Clone, Default)]
pub struct RecordingTransport {
    messages: Arc<RwLock<Vec<RecordedMessage>>>,
    fail_sends: Arc<AtomicBool>,
    fail_notifications: Arc<AtomicBool>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `send` and `deliver_file` fail.
    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Make `notify` fail.
    pub fn set_fail_notifications(&self, fail: bool) {
        self.fail_notifications.store(fail, Ordering::SeqCst);
    }

    pub async fn messages(&self) -> Vec<RecordedMessage> {
        self.messages.read().await.clone()
    }

    pub async fn messages_to(&self, user: UserId) -> Vec<RecordedMessage> {
        self.messages
            .read()
            .await
            .iter()
            .filter(|m| m.user == user)
            .cloned()
            .collect()
    }

    /// Text of the most recent message to `user`, if any.
    pub async fn last_text_to(&self, user: UserId) -> Option<String> {
        self.messages
            .read()
            .await
            .iter()
            .rev()
            .find(|m| m.user == user)
            .map(|m| m.text.clone())
    }

    /// Files delivered to `user`.
    pub async fn files_to(&self, user: UserId) -> Vec<ContentRef> {
        self.messages
            .read()
            .await
            .iter()
            .filter(|m| m.user == user && m.channel == Channel::File)
            .filter_map(|m| m.content.clone())
            .collect()
    }

    pub async fn clear(&self) {
        self.messages.write().await.clear();
    }

    async fn record(&self, message: RecordedMessage, fail: &AtomicBool) -> MarketResult<()> {
        if fail.load(Ordering::SeqCst) {
            return Err(MarketError::delivery_failed(
                message.user,
                "simulated transport failure",
            ));
        }
        self.messages.write().await.push(message);
        Ok(())
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn send(&self, user: UserId, text: &str) -> MarketResult<()> {
        let message = RecordedMessage {
            user,
            channel: Channel::Send,
            text: text.to_string(),
            content: None,
        };
        self.record(message, &self.fail_sends).await
    }

    async fn deliver_file(
        &self,
        user: UserId,
        content: &ContentRef,
        caption: &str,
    ) -> MarketResult<()> {
        let message = RecordedMessage {
            user,
            channel: Channel::File,
            text: caption.to_string(),
            content: Some(content.clone()),
        };
        self.record(message, &self.fail_sends).await
    }

    async fn notify(&self, user: UserId, text: &str) -> MarketResult<()> {
        let message = RecordedMessage {
            user,
            channel: Channel::Notify,
            text: text.to_string(),
            content: None,
        };
        self.record(message, &self.fail_notifications).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ContentKind;

    #[tokio::test]
    async fn test_records_in_order() {
        let transport = RecordingTransport::new();
        transport.send(1, "hello").await.unwrap();
        transport
            .deliver_file(2, &ContentRef::new("blob-1", ContentKind::Text), "notes")
            .await
            .unwrap();
        transport.notify(1, "approved").await.unwrap();

        assert_eq!(transport.messages().await.len(), 3);
        assert_eq!(transport.last_text_to(1).await.as_deref(), Some("approved"));
        assert_eq!(transport.files_to(2).await.len(), 1);
    }

    #[tokio::test]
    async fn test_failures_are_not_recorded() {
        let transport = RecordingTransport::new();
        transport.set_fail_notifications(true);

        let result = transport.notify(1, "approved").await;

        assert!(matches!(result, Err(MarketError::DeliveryFailed { .. })));
        assert!(transport.send(1, "still works").await.is_ok());
        assert_eq!(transport.messages().await.len(), 1);
    }
}
