//! Chat transport abstraction.
//!
//! Everything the core says to a user goes through [`ChatTransport`]. From the
//! core's point of view every call is fire-and-forget: a failed send is logged
//! and never rolls back the ledger mutation it reports on.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::types::{ContentRef, MarketResult, UserId};

/// Outbound side of the chat transport.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send a reply in the user's conversation.
    async fn send(&self, user: UserId, text: &str) -> MarketResult<()>;

    /// Deliver stored content (a purchased item, a broadcast attachment).
    async fn deliver_file(&self, user: UserId, content: &ContentRef, caption: &str)
        -> MarketResult<()>;

    /// Send an out-of-band notification (moderation results, admin alerts).
    async fn notify(&self, user: UserId, text: &str) -> MarketResult<()>;
}

/// Swallow a best-effort delivery result, logging the failure.
///
/// Returns whether the delivery succeeded.
pub fn best_effort(result: MarketResult<()>, user: UserId, what: &str) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            warn!(user, what, error = %e, "Dropped best-effort delivery");
            false
        }
    }
}

/// Notify every recipient, best-effort
///
/// Returns how many notifications were delivered.
pub async fn notify_all(transport: &dyn ChatTransport, recipients: &[UserId], text: &str) -> usize {
    let mut delivered = 0;
    for &user in recipients {
        if best_effort(transport.notify(user, text).await, user, "notify") {
            delivered += 1;
        }
    }
    delivered
}

/// Transport used by the replay driver: every outbound message becomes a log line.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTransport;

#[async_trait]
impl ChatTransport for LogTransport {
    async fn send(&self, user: UserId, text: &str) -> MarketResult<()> {
        info!(user, text, "send");
        Ok(())
    }

    async fn deliver_file(
        &self,
        user: UserId,
        content: &ContentRef,
        caption: &str,
    ) -> MarketResult<()> {
        info!(user, handle = %content.handle, kind = %content.kind, caption, "deliver_file");
        Ok(())
    }

    async fn notify(&self, user: UserId, text: &str) -> MarketResult<()> {
        info!(user, text, "notify");
        Ok(())
    }
}
