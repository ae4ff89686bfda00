//! Per-user conversation storage
//!
//! Ephemeral key-value storage: one [`Conversation`] per user, cleared on
//! cancel or completion and dropped by [`ConversationStore::purge_idle`]
//! once abandoned. A per-user turn lock serializes inbound events so each
//! event observes the state committed by the previous one.

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use tokio::sync::OwnedMutexGuard;

use super::state::Conversation;
use crate::core::locks::UserLocks;
use crate::types::UserId;

#[derive(Debug, Default)]
pub struct ConversationStore {
    conversations: DashMap<UserId, Conversation>,
    turns: UserLocks,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the user's turn; hold the guard while reading and writing state
    pub async fn lock(&self, user: UserId) -> OwnedMutexGuard<()> {
        self.turns.acquire(user).await
    }

    pub fn get(&self, user: UserId) -> Option<Conversation> {
        self.conversations.get(&user).map(|c| c.value().clone())
    }

    pub fn set(&self, user: UserId, conversation: Conversation) {
        self.conversations.insert(user, conversation);
    }

    /// Forget the user's flow and everything it collected
    pub fn clear(&self, user: UserId) -> bool {
        self.conversations.remove(&user).is_some()
    }

    pub fn touch(&self, user: UserId, now: DateTime<Utc>) {
        if let Some(mut conversation) = self.conversations.get_mut(&user) {
            conversation.last_activity = now;
        }
    }

    /// Drop flows idle for longer than `max_idle`, and turn locks nobody holds
    ///
    /// # Returns
    ///
    /// Number of flows dropped
    pub fn purge_idle(&self, now: DateTime<Utc>, max_idle: TimeDelta) -> usize {
        let before = self.conversations.len();
        self.conversations
            .retain(|_, conversation| now - conversation.last_activity <= max_idle);
        self.turns.prune();
        before.saturating_sub(self.conversations.len())
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }
}
