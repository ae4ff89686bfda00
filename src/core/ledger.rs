//! Thread-safe in-memory ledger store
//!
//! This module provides the `MemoryLedger` struct, the [`LedgerStore`]
//! implementation used by both replay strategies and by the tests.
//!
//! # Design
//!
//! Each logical table lives in its own `DashMap`, so operations on different
//! users, items or requests proceed in parallel while operations on the same
//! entry are serialized by the map's internal sharding. Every trait method
//! touches a single entry under its shard lock, which makes each one an atomic
//! unit; no method holds a reference into one map while mutating another.
//!
//! ```text
//! MemoryLedger
//!     ├── users      DashMap<UserId, User>
//!     ├── subjects   DashMap<String, seq>
//!     ├── items      DashMap<ItemId, Item>
//!     ├── purchases  DashMap<(UserId, ItemId), Purchase>
//!     ├── requests   DashMap<RequestId, BalanceRequest>
//!     └── feedback   DashMap<FeedbackId, Feedback>
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;

use super::traits::LedgerStore;
use crate::types::{
    BalanceRequest, CatalogFilter, Feedback, FeedbackId, Item, ItemDraft, ItemEdit, ItemId,
    MarketError, MarketResult, ModerationStatus, OwnedItem, Proof, Purchase, RequestId,
    RequestKind, RequestStatus, User, UserId,
};

/// In-memory ledger backed by concurrent hash maps
#[derive(Debug)]
pub struct MemoryLedger {
    users: DashMap<UserId, User>,

    /// Subject name to insertion sequence number
    subjects: DashMap<String, u64>,

    items: DashMap<ItemId, Item>,

    /// Keyed by `(buyer, item)`; the key itself enforces pair uniqueness
    purchases: DashMap<(UserId, ItemId), Purchase>,

    requests: DashMap<RequestId, BalanceRequest>,
    feedback: DashMap<FeedbackId, Feedback>,

    next_subject: AtomicU64,
    next_item: AtomicU64,
    next_request: AtomicU64,
    next_feedback: AtomicU64,
}

impl MemoryLedger {
    /// Create an empty ledger
    ///
    /// Identifiers for items, requests and feedback start at 1.
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
            subjects: DashMap::new(),
            items: DashMap::new(),
            purchases: DashMap::new(),
            requests: DashMap::new(),
            feedback: DashMap::new(),
            next_subject: AtomicU64::new(0),
            next_item: AtomicU64::new(1),
            next_request: AtomicU64::new(1),
            next_feedback: AtomicU64::new(1),
        }
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

/// Catalog ordering: most recently approved first, unapproved last, then id descending
fn catalog_order(a: &Item, b: &Item) -> std::cmp::Ordering {
    b.approved_at
        .cmp(&a.approved_at)
        .then_with(|| b.id.cmp(&a.id))
}

impl LedgerStore for MemoryLedger {
    fn ensure_user(&self, id: UserId, display_name: &str) -> MarketResult<User> {
        let name = display_name.trim();
        let mut entry = self.users.entry(id).or_insert_with(|| {
            if name.is_empty() {
                User::new(id, User::placeholder_name(id))
            } else {
                User::new(id, name)
            }
        });

        if !name.is_empty() && entry.display_name != name {
            entry.display_name = name.to_string();
        }

        Ok(entry.value().clone())
    }

    fn get_user(&self, id: UserId) -> Option<User> {
        self.users.get(&id).map(|entry| entry.value().clone())
    }

    fn all_users(&self) -> Vec<User> {
        self.users
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    fn adjust_balance(&self, id: UserId, delta: Decimal) -> MarketResult<Decimal> {
        let mut entry = self
            .users
            .entry(id)
            .or_insert_with(|| User::new(id, User::placeholder_name(id)));

        let balance = entry
            .balance
            .checked_add(delta)
            .ok_or_else(|| MarketError::arithmetic_overflow("adjust_balance", id))?;
        entry.balance = balance;

        Ok(balance)
    }

    fn add_subject(&self, name: &str) -> MarketResult<bool> {
        let name = name.trim();
        if name.is_empty() {
            return Err(MarketError::validation("subject", "must not be empty"));
        }

        let mut inserted = false;
        self.subjects.entry(name.to_string()).or_insert_with(|| {
            inserted = true;
            self.next_subject.fetch_add(1, Ordering::SeqCst)
        });

        Ok(inserted)
    }

    fn subjects(&self) -> Vec<String> {
        let mut subjects: Vec<(u64, String)> = self
            .subjects
            .iter()
            .map(|entry| (*entry.value(), entry.key().clone()))
            .collect();
        subjects.sort_unstable();
        subjects.into_iter().map(|(_, name)| name).collect()
    }

    fn insert_item(&self, draft: ItemDraft, submitted_at: DateTime<Utc>) -> MarketResult<Item> {
        let id = self.next_item.fetch_add(1, Ordering::SeqCst);
        let item = Item::from_draft(id, draft, submitted_at);
        self.items.insert(id, item.clone());
        Ok(item)
    }

    fn item_record(&self, id: ItemId) -> Option<Item> {
        self.items.get(&id).map(|entry| entry.value().clone())
    }

    fn edit_item(&self, id: ItemId, edit: &ItemEdit) -> MarketResult<Item> {
        let mut entry = self
            .items
            .get_mut(&id)
            .ok_or_else(|| MarketError::not_found("item", id))?;

        match edit {
            ItemEdit::Name(name) => entry.name = name.clone(),
            ItemEdit::Price(price) => entry.price = *price,
        }

        Ok(entry.value().clone())
    }

    fn approve_item(&self, id: ItemId, approved_at: DateTime<Utc>) -> MarketResult<bool> {
        let Some(mut entry) = self.items.get_mut(&id) else {
            return Ok(false);
        };

        if entry.status != ModerationStatus::Pending {
            return Ok(false);
        }

        entry.status = ModerationStatus::Approved;
        entry.approved_at = Some(approved_at);
        Ok(true)
    }

    fn reject_item(&self, id: ItemId) -> MarketResult<bool> {
        let removed = self
            .items
            .remove_if(&id, |_, item| item.status == ModerationStatus::Pending);
        Ok(removed.is_some())
    }

    fn list_catalog(&self, filter: &CatalogFilter, requesting_user: UserId) -> Vec<Item> {
        let mut items: Vec<Item> = self
            .items
            .iter()
            .filter(|entry| entry.is_visible_to(requesting_user) && filter.matches(entry))
            .map(|entry| entry.value().clone())
            .collect();

        items.sort_by(catalog_order);
        items
    }

    fn list_owned(&self, user: UserId, filter: &CatalogFilter) -> Vec<OwnedItem> {
        let mut authored: Vec<Item> = self
            .items
            .iter()
            .filter(|entry| entry.author == user && filter.matches(entry))
            .map(|entry| entry.value().clone())
            .collect();
        authored.sort_by_key(|item| item.id);

        let mut bought: Vec<(DateTime<Utc>, ItemId)> = self
            .purchases
            .iter()
            .filter(|entry| entry.key().0 == user)
            .map(|entry| (entry.purchased_at, entry.item))
            .collect();
        bought.sort_unstable();

        let mut owned: Vec<OwnedItem> = authored
            .into_iter()
            .map(|item| OwnedItem {
                item,
                purchased: false,
            })
            .collect();

        owned.extend(
            bought
                .into_iter()
                .filter_map(|(_, id)| self.item_record(id))
                .filter(|item| item.author != user && filter.matches(item))
                .map(|item| OwnedItem {
                    item,
                    purchased: true,
                }),
        );

        owned
    }

    fn list_pending_items(&self) -> Vec<Item> {
        let mut items: Vec<Item> = self
            .items
            .iter()
            .filter(|entry| entry.status == ModerationStatus::Pending)
            .map(|entry| entry.value().clone())
            .collect();
        items.sort_by_key(|item| item.id);
        items
    }

    fn has_purchase(&self, user: UserId, item: ItemId) -> bool {
        self.purchases.contains_key(&(user, item))
    }

    fn record_purchase(
        &self,
        user: UserId,
        item: ItemId,
        price: Decimal,
        purchased_at: DateTime<Utc>,
    ) -> MarketResult<Purchase> {
        let mut inserted = false;
        let purchase = self
            .purchases
            .entry((user, item))
            .or_insert_with(|| {
                inserted = true;
                Purchase {
                    user,
                    item,
                    price,
                    purchased_at,
                }
            })
            .value()
            .clone();

        if !inserted {
            return Err(MarketError::DuplicatePurchase { user, item });
        }

        Ok(purchase)
    }

    fn purchases_of(&self, user: UserId) -> Vec<Purchase> {
        let mut purchases: Vec<Purchase> = self
            .purchases
            .iter()
            .filter(|entry| entry.key().0 == user)
            .map(|entry| entry.value().clone())
            .collect();
        purchases.sort_by_key(|purchase| (purchase.purchased_at, purchase.item));
        purchases
    }

    fn create_request(
        &self,
        kind: RequestKind,
        user: UserId,
        amount: Decimal,
        proof: Option<Proof>,
        created_at: DateTime<Utc>,
    ) -> MarketResult<BalanceRequest> {
        let id = self.next_request.fetch_add(1, Ordering::SeqCst);
        let request = BalanceRequest::new(id, kind, user, amount, proof, created_at);
        self.requests.insert(id, request.clone());
        Ok(request)
    }

    fn get_request(&self, id: RequestId) -> Option<BalanceRequest> {
        self.requests.get(&id).map(|entry| entry.value().clone())
    }

    fn list_pending_requests(&self, kind: Option<RequestKind>) -> Vec<BalanceRequest> {
        let mut requests: Vec<BalanceRequest> = self
            .requests
            .iter()
            .filter(|entry| entry.status.is_pending() && kind.map_or(true, |k| k == entry.kind))
            .map(|entry| entry.value().clone())
            .collect();
        requests.sort_by_key(|request| request.id);
        requests
    }

    fn resolve_request(
        &self,
        id: RequestId,
        status: RequestStatus,
        admin: UserId,
        resolved_at: DateTime<Utc>,
    ) -> MarketResult<BalanceRequest> {
        if status.is_pending() {
            return Err(MarketError::validation(
                "status",
                "a request cannot be resolved to pending",
            ));
        }

        let mut entry = self
            .requests
            .get_mut(&id)
            .ok_or_else(|| MarketError::not_found("request", id))?;

        // Compare-and-set under the entry lock: only the first resolver wins
        if !entry.status.is_pending() {
            return Err(MarketError::already_resolved("request", id));
        }

        entry.status = status;
        entry.resolved_by = Some(admin);
        entry.resolved_at = Some(resolved_at);

        Ok(entry.value().clone())
    }

    fn mark_request_applied(&self, id: RequestId) -> MarketResult<()> {
        let mut entry = self
            .requests
            .get_mut(&id)
            .ok_or_else(|| MarketError::not_found("request", id))?;

        if entry.status != RequestStatus::Approved {
            return Err(MarketError::validation(
                "status",
                "only approved requests can be applied",
            ));
        }

        entry.balance_applied = true;
        Ok(())
    }

    fn unapplied_requests(&self) -> Vec<BalanceRequest> {
        let mut requests: Vec<BalanceRequest> = self
            .requests
            .iter()
            .filter(|entry| entry.is_unapplied())
            .map(|entry| entry.value().clone())
            .collect();
        requests.sort_by_key(|request| request.id);
        requests
    }

    fn create_feedback(
        &self,
        user: UserId,
        message: &str,
        created_at: DateTime<Utc>,
    ) -> MarketResult<Feedback> {
        let id = self.next_feedback.fetch_add(1, Ordering::SeqCst);
        let feedback = Feedback {
            id,
            user,
            message: message.to_string(),
            status: RequestStatus::Pending,
            resolved_by: None,
            resolved_at: None,
            created_at,
        };
        self.feedback.insert(id, feedback.clone());
        Ok(feedback)
    }

    fn get_feedback(&self, id: FeedbackId) -> Option<Feedback> {
        self.feedback.get(&id).map(|entry| entry.value().clone())
    }

    fn resolve_feedback(
        &self,
        id: FeedbackId,
        status: RequestStatus,
        admin: UserId,
        resolved_at: DateTime<Utc>,
    ) -> MarketResult<Feedback> {
        if status.is_pending() {
            return Err(MarketError::validation(
                "status",
                "feedback cannot be resolved to pending",
            ));
        }

        let mut entry = self
            .feedback
            .get_mut(&id)
            .ok_or_else(|| MarketError::not_found("feedback", id))?;

        if !entry.status.is_pending() {
            return Err(MarketError::already_resolved("feedback", id));
        }

        entry.status = status;
        entry.resolved_by = Some(admin);
        entry.resolved_at = Some(resolved_at);

        Ok(entry.value().clone())
    }
}
