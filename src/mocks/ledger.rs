//! Ledger wrapper that injects storage failures.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashSet;
use rust_decimal::Decimal;

use crate::core::{LedgerStore, MemoryLedger};
use crate::types::{
    BalanceRequest, CatalogFilter, Feedback, FeedbackId, Item, ItemDraft, ItemEdit, ItemId,
    MarketError, MarketResult, OwnedItem, Proof, Purchase, RequestId, RequestKind, RequestStatus,
    User, UserId,
};

/// Storage operation that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedgerFault {
    /// `record_purchase`
    RecordPurchase,
    /// `adjust_balance` with a positive delta
    Credit,
    /// `adjust_balance` with a negative delta
    Debit,
    /// `mark_request_applied`
    MarkApplied,
}

/// [`MemoryLedger`] with switchable failures; everything else delegates.
#[derive(Debug, Default)]
pub struct FaultyLedger {
    inner: Arc<MemoryLedger>,
    faults: DashSet<LedgerFault>,
}

impl FaultyLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// The wrapped ledger, for inspecting state behind the faults.
    pub fn inner(&self) -> &Arc<MemoryLedger> {
        &self.inner
    }

    pub fn inject(&self, fault: LedgerFault) {
        self.faults.insert(fault);
    }

    pub fn heal(&self, fault: LedgerFault) {
        self.faults.remove(&fault);
    }

    fn check(&self, fault: LedgerFault) -> MarketResult<()> {
        if self.faults.contains(&fault) {
            Err(MarketError::storage(format!("injected {:?} failure", fault)))
        } else {
            Ok(())
        }
    }
}

impl LedgerStore for FaultyLedger {
    fn ensure_user(&self, id: UserId, display_name: &str) -> MarketResult<User> {
        self.inner.ensure_user(id, display_name)
    }

    fn get_user(&self, id: UserId) -> Option<User> {
        self.inner.get_user(id)
    }

    fn all_users(&self) -> Vec<User> {
        self.inner.all_users()
    }

    fn adjust_balance(&self, id: UserId, delta: Decimal) -> MarketResult<Decimal> {
        if delta > Decimal::ZERO {
            self.check(LedgerFault::Credit)?;
        } else if delta < Decimal::ZERO {
            self.check(LedgerFault::Debit)?;
        }
        self.inner.adjust_balance(id, delta)
    }

    fn add_subject(&self, name: &str) -> MarketResult<bool> {
        self.inner.add_subject(name)
    }

    fn subjects(&self) -> Vec<String> {
        self.inner.subjects()
    }

    fn insert_item(&self, draft: ItemDraft, submitted_at: DateTime<Utc>) -> MarketResult<Item> {
        self.inner.insert_item(draft, submitted_at)
    }

    fn item_record(&self, id: ItemId) -> Option<Item> {
        self.inner.item_record(id)
    }

    fn edit_item(&self, id: ItemId, edit: &ItemEdit) -> MarketResult<Item> {
        self.inner.edit_item(id, edit)
    }

    fn approve_item(&self, id: ItemId, approved_at: DateTime<Utc>) -> MarketResult<bool> {
        self.inner.approve_item(id, approved_at)
    }

    fn reject_item(&self, id: ItemId) -> MarketResult<bool> {
        self.inner.reject_item(id)
    }

    fn list_catalog(&self, filter: &CatalogFilter, requesting_user: UserId) -> Vec<Item> {
        self.inner.list_catalog(filter, requesting_user)
    }

    fn list_owned(&self, user: UserId, filter: &CatalogFilter) -> Vec<OwnedItem> {
        self.inner.list_owned(user, filter)
    }

    fn list_pending_items(&self) -> Vec<Item> {
        self.inner.list_pending_items()
    }

    fn has_purchase(&self, user: UserId, item: ItemId) -> bool {
        self.inner.has_purchase(user, item)
    }

    fn record_purchase(
        &self,
        user: UserId,
        item: ItemId,
        price: Decimal,
        purchased_at: DateTime<Utc>,
    ) -> MarketResult<Purchase> {
        self.check(LedgerFault::RecordPurchase)?;
        self.inner.record_purchase(user, item, price, purchased_at)
    }

    fn purchases_of(&self, user: UserId) -> Vec<Purchase> {
        self.inner.purchases_of(user)
    }

    fn create_request(
        &self,
        kind: RequestKind,
        user: UserId,
        amount: Decimal,
        proof: Option<Proof>,
        created_at: DateTime<Utc>,
    ) -> MarketResult<BalanceRequest> {
        self.inner.create_request(kind, user, amount, proof, created_at)
    }

    fn get_request(&self, id: RequestId) -> Option<BalanceRequest> {
        self.inner.get_request(id)
    }

    fn list_pending_requests(&self, kind: Option<RequestKind>) -> Vec<BalanceRequest> {
        self.inner.list_pending_requests(kind)
    }

    fn resolve_request(
        &self,
        id: RequestId,
        status: RequestStatus,
        admin: UserId,
        resolved_at: DateTime<Utc>,
    ) -> MarketResult<BalanceRequest> {
        self.inner.resolve_request(id, status, admin, resolved_at)
    }

    fn mark_request_applied(&self, id: RequestId) -> MarketResult<()> {
        self.check(LedgerFault::MarkApplied)?;
        self.inner.mark_request_applied(id)
    }

    fn unapplied_requests(&self) -> Vec<BalanceRequest> {
        self.inner.unapplied_requests()
    }

    fn create_feedback(
        &self,
        user: UserId,
        message: &str,
        created_at: DateTime<Utc>,
    ) -> MarketResult<Feedback> {
        self.inner.create_feedback(user, message, created_at)
    }

    fn get_feedback(&self, id: FeedbackId) -> Option<Feedback> {
        self.inner.get_feedback(id)
    }

    fn resolve_feedback(
        &self,
        id: FeedbackId,
        status: RequestStatus,
        admin: UserId,
        resolved_at: DateTime<Utc>,
    ) -> MarketResult<Feedback> {
        self.inner.resolve_feedback(id, status, admin, resolved_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_faults_toggle() {
        let ledger = FaultyLedger::new();
        ledger.ensure_user(1, "Ann").unwrap();

        ledger.inject(LedgerFault::Credit);
        assert!(matches!(
            ledger.adjust_balance(1, Decimal::ONE),
            Err(MarketError::Storage { .. })
        ));
        // Debits are unaffected by a credit fault
        assert!(ledger.adjust_balance(1, Decimal::NEGATIVE_ONE).is_ok());

        ledger.heal(LedgerFault::Credit);
        assert_eq!(ledger.adjust_balance(1, Decimal::ONE).unwrap(), Decimal::ZERO);
    }
}
