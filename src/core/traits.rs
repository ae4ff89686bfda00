//! Core trait for the ledger store
//!
//! This module defines the storage contract the rest of the core is written
//! against. The in-memory [`MemoryLedger`](super::ledger::MemoryLedger) is the
//! production implementation; tests wrap it to inject storage faults.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::types::{
    BalanceRequest, CatalogFilter, Feedback, FeedbackId, Item, ItemDraft, ItemEdit, ItemId,
    MarketResult, OwnedItem, Proof, Purchase, RequestId, RequestKind, RequestStatus, User, UserId,
};

/// Durable record of users, balances, items, purchases and requests
///
/// Every method is a single atomic unit against the store. Multi-step
/// sequences (check balance, debit, record purchase) are composed and
/// serialized per user by the
/// [`TransactionCoordinator`](super::coordinator::TransactionCoordinator),
/// never by callers of this trait directly.
///
/// Mutating methods return `Err` only on storage-level failure or when a
/// uniqueness/lifecycle rule of the store itself is violated. Business rules
/// such as "balance must cover the price" are the caller's responsibility.
pub trait LedgerStore: Send + Sync {
    // ---- users ----

    /// Create the user on first contact, or refresh their display name
    ///
    /// Never touches the balance.
    fn ensure_user(&self, id: UserId, display_name: &str) -> MarketResult<User>;

    fn get_user(&self, id: UserId) -> Option<User>;

    /// Snapshot of every known user, in arbitrary order
    fn all_users(&self) -> Vec<User>;

    /// Current balance, zero for unknown users
    fn get_balance(&self, id: UserId) -> Decimal {
        self.get_user(id)
            .map(|user| user.balance)
            .unwrap_or(Decimal::ZERO)
    }

    /// Apply a signed delta to a user's balance
    ///
    /// Creates the user with a placeholder name if absent, so an admin credit
    /// that arrives before first contact does not fail.
    ///
    /// # Returns
    ///
    /// The balance after the change.
    fn adjust_balance(&self, id: UserId, delta: Decimal) -> MarketResult<Decimal>;

    // ---- subjects ----

    /// Register a subject; `Ok(false)` if it already exists
    fn add_subject(&self, name: &str) -> MarketResult<bool>;

    /// All subjects in insertion order
    fn subjects(&self) -> Vec<String>;

    // ---- items ----

    /// Store a draft as a new pending item
    fn insert_item(&self, draft: ItemDraft, submitted_at: DateTime<Utc>) -> MarketResult<Item>;

    /// Raw lookup, ignoring access rules
    fn item_record(&self, id: ItemId) -> Option<Item>;

    /// Lookup with access rules: authors see their own items, everyone else
    /// only approved ones
    fn get_item(&self, id: ItemId, requesting_user: UserId) -> Option<Item> {
        self.item_record(id)
            .filter(|item| item.is_visible_to(requesting_user))
    }

    /// Apply an in-place correction; moderation status is left untouched
    fn edit_item(&self, id: ItemId, edit: &ItemEdit) -> MarketResult<Item>;

    /// Transition a pending item to approved
    ///
    /// `Ok(false)` if the item does not exist or is not pending.
    fn approve_item(&self, id: ItemId, approved_at: DateTime<Utc>) -> MarketResult<bool>;

    /// Delete a pending item
    ///
    /// `Ok(false)` if the item does not exist or is already approved.
    fn reject_item(&self, id: ItemId) -> MarketResult<bool>;

    /// Approved items plus the requesting user's own items
    ///
    /// Ordered by approval time, most recent first; unapproved own items come
    /// last. Ties are broken by item id, highest first.
    fn list_catalog(&self, filter: &CatalogFilter, requesting_user: UserId) -> Vec<Item>;

    /// Items the user authored (any status) followed by items they bought
    fn list_owned(&self, user: UserId, filter: &CatalogFilter) -> Vec<OwnedItem>;

    /// Items awaiting moderation, oldest first
    fn list_pending_items(&self) -> Vec<Item>;

    // ---- purchases ----

    fn has_purchase(&self, user: UserId, item: ItemId) -> bool;

    /// Append a purchase record
    ///
    /// Fails with `DuplicatePurchase` if the `(user, item)` pair exists.
    fn record_purchase(
        &self,
        user: UserId,
        item: ItemId,
        price: Decimal,
        purchased_at: DateTime<Utc>,
    ) -> MarketResult<Purchase>;

    fn purchases_of(&self, user: UserId) -> Vec<Purchase>;

    // ---- balance and withdraw requests ----

    fn create_request(
        &self,
        kind: RequestKind,
        user: UserId,
        amount: Decimal,
        proof: Option<Proof>,
        created_at: DateTime<Utc>,
    ) -> MarketResult<BalanceRequest>;

    fn get_request(&self, id: RequestId) -> Option<BalanceRequest>;

    /// Pending requests, optionally of one kind, oldest first
    fn list_pending_requests(&self, kind: Option<RequestKind>) -> Vec<BalanceRequest>;

    /// Resolve a pending request exactly once
    ///
    /// Fails with `NotFound` if the request is absent and `AlreadyResolved`
    /// if it is no longer pending. The balance is not touched here.
    fn resolve_request(
        &self,
        id: RequestId,
        status: RequestStatus,
        admin: UserId,
        resolved_at: DateTime<Utc>,
    ) -> MarketResult<BalanceRequest>;

    /// Record that an approved request's balance change has landed
    fn mark_request_applied(&self, id: RequestId) -> MarketResult<()>;

    /// Approved requests whose balance change never landed
    fn unapplied_requests(&self) -> Vec<BalanceRequest>;

    // ---- feedback ----

    fn create_feedback(
        &self,
        user: UserId,
        message: &str,
        created_at: DateTime<Utc>,
    ) -> MarketResult<Feedback>;

    fn get_feedback(&self, id: FeedbackId) -> Option<Feedback>;

    /// Resolve a pending feedback record exactly once
    fn resolve_feedback(
        &self,
        id: FeedbackId,
        status: RequestStatus,
        admin: UserId,
        resolved_at: DateTime<Utc>,
    ) -> MarketResult<Feedback>;
}
