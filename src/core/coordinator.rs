//! Balance-moving operations
//!
//! This module provides the `TransactionCoordinator`, the only component that
//! mutates user balances. It composes single-entry ledger operations into
//! multi-step sequences and makes each sequence atomic per user.
//!
//! # Design
//!
//! Every sequence follows the same shape:
//! 1. Acquire the user's lock from [`UserLocks`]
//! 2. Read and check (visibility, ownership, balance)
//! 3. Mutate the ledger, compensating explicitly on partial failure
//! 4. Release the lock
//! 5. Notify or deliver, best-effort
//!
//! Notifications never run under the lock and their failures never reach the
//! financial outcome they report on.
//!
//! # Architecture
//!
//! ```text
//! TransactionCoordinator
//!     ├── Arc<dyn LedgerStore>    (balances, purchases, requests)
//!     ├── Arc<dyn ChatTransport>  (delivery and notifications)
//!     ├── Arc<dyn AdminIdentity>  (admin gate)
//!     ├── Arc<dyn Clock>          (timestamps)
//!     └── UserLocks               (per-user serialization)
//! ```

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{error, info, warn};

use super::locks::UserLocks;
use super::messages;
use super::traits::LedgerStore;
use crate::traits::{best_effort, notify_all, AdminIdentity, ChatTransport, Clock};
use crate::types::{
    BalanceRequest, ContentRef, Decision, Item, ItemId, MarketError, MarketResult, Proof,
    RequestId, RequestKind, User, UserId,
};

/// How many times a compensating credit is attempted before giving up
const COMPENSATION_ATTEMPTS: usize = 3;

/// Result of a successful purchase call
#[derive(Debug, Clone, PartialEq)]
pub enum PurchaseOutcome {
    /// The buyer was debited and a purchase was recorded
    Purchased { item: Item, balance: Decimal },
    /// The buyer is the author or already bought it; content re-delivered for free
    AlreadyOwned { item: Item },
}

impl PurchaseOutcome {
    pub fn item(&self) -> &Item {
        match self {
            PurchaseOutcome::Purchased { item, .. } => item,
            PurchaseOutcome::AlreadyOwned { item } => item,
        }
    }

    /// Content reference handed to the transport
    pub fn content(&self) -> &ContentRef {
        &self.item().content
    }
}

/// Executes purchases and balance adjustments atomically per user
pub struct TransactionCoordinator {
    ledger: Arc<dyn LedgerStore>,
    transport: Arc<dyn ChatTransport>,
    admins: Arc<dyn AdminIdentity>,
    clock: Arc<dyn Clock>,
    locks: UserLocks,
}

impl TransactionCoordinator {
    /// Create a new TransactionCoordinator
    ///
    /// # Arguments
    ///
    /// * `ledger` - Store holding balances, purchases and requests
    /// * `transport` - Chat transport for delivery and notifications
    /// * `admins` - Admin predicate gating request resolution
    /// * `clock` - Source of timestamps
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        transport: Arc<dyn ChatTransport>,
        admins: Arc<dyn AdminIdentity>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            ledger,
            transport,
            admins,
            clock,
            locks: UserLocks::new(),
        }
    }

    pub fn balance(&self, user: UserId) -> Decimal {
        self.ledger.get_balance(user)
    }

    /// Drop per-user locks that are not in use; returns how many
    pub fn prune_locks(&self) -> usize {
        self.locks.prune()
    }

    fn require_admin(&self, user: UserId, action: &str) -> MarketResult<()> {
        if self.admins.is_admin(user) {
            Ok(())
        } else {
            warn!(user, action, "Rejected admin action from non-admin");
            Err(MarketError::unauthorized(user, action))
        }
    }

    fn user_or_placeholder(&self, user: UserId) -> User {
        self.ledger
            .get_user(user)
            .unwrap_or_else(|| User::new(user, User::placeholder_name(user)))
    }

    /// Buy an item
    ///
    /// Authors and previous buyers get the content again without any balance
    /// movement. Everyone else is debited the catalog price; if recording the
    /// purchase then fails, the debit is reversed before the error is returned.
    ///
    /// # Returns
    ///
    /// * `Ok(PurchaseOutcome)` - The item was bought or re-delivered
    /// * `Err(MarketError::NotFound)` - The item does not exist or is not visible to `user`
    /// * `Err(MarketError::InsufficientFunds)` - Balance below price; nothing was mutated
    /// * `Err(MarketError::TransactionFailed)` - Debit or record failed; balance is unchanged
    pub async fn purchase(&self, user: UserId, item_id: ItemId) -> MarketResult<PurchaseOutcome> {
        let outcome = {
            let _guard = self.locks.acquire(user).await;
            self.purchase_locked(user, item_id)?
        };

        let caption = match &outcome {
            PurchaseOutcome::Purchased { item, balance } => messages::purchased(item, *balance),
            PurchaseOutcome::AlreadyOwned { item } => messages::item_caption(item),
        };
        best_effort(
            self.transport
                .deliver_file(user, outcome.content(), &caption)
                .await,
            user,
            "deliver item",
        );

        Ok(outcome)
    }

    fn purchase_locked(&self, user: UserId, item_id: ItemId) -> MarketResult<PurchaseOutcome> {
        let item = self
            .ledger
            .get_item(item_id, user)
            .ok_or_else(|| MarketError::not_found("item", item_id))?;

        if item.author == user || self.ledger.has_purchase(user, item.id) {
            info!(user, item = item.id, "Re-delivering owned item");
            return Ok(PurchaseOutcome::AlreadyOwned { item });
        }

        let balance = self.ledger.get_balance(user);
        if balance < item.price {
            return Err(MarketError::insufficient_funds(user, balance, item.price));
        }

        let balance = self.ledger.adjust_balance(user, -item.price).map_err(|e| {
            error!(user, item = item.id, error = %e, "Purchase debit failed");
            MarketError::transaction_failed("purchase debit", user, e)
        })?;

        let now = self.clock.now();
        if let Err(e) = self.ledger.record_purchase(user, item.id, item.price, now) {
            error!(user, item = item.id, error = %e, "Recording purchase failed, reversing debit");
            self.compensate(user, item.price, item.id);
            return Err(MarketError::transaction_failed("record purchase", user, e));
        }

        info!(user, item = item.id, price = %item.price, %balance, "Item purchased");
        Ok(PurchaseOutcome::Purchased { item, balance })
    }

    /// Credit back a debit whose purchase record could not be written
    fn compensate(&self, user: UserId, amount: Decimal, item: ItemId) {
        for attempt in 1..=COMPENSATION_ATTEMPTS {
            match self.ledger.adjust_balance(user, amount) {
                Ok(balance) => {
                    warn!(user, item, %amount, %balance, attempt, "Purchase debit reversed");
                    return;
                }
                Err(e) => {
                    error!(user, item, %amount, attempt, error = %e, "Compensating credit failed");
                }
            }
        }

        error!(
            user,
            item,
            %amount,
            "Debit could not be reversed; balance requires manual reconciliation"
        );
    }

    /// Resolve a top-up request
    ///
    /// See [`resolve_request`](Self::resolve_request).
    pub async fn resolve_balance_request(
        &self,
        admin: UserId,
        request: RequestId,
        decision: Decision,
    ) -> MarketResult<BalanceRequest> {
        self.resolve_request(admin, RequestKind::TopUp, request, decision)
            .await
    }

    /// Resolve a withdraw request
    ///
    /// Approval re-checks the balance at resolution time and fails with
    /// `InsufficientFunds`, leaving the request pending, if it no longer covers
    /// the amount.
    pub async fn resolve_withdraw_request(
        &self,
        admin: UserId,
        request: RequestId,
        decision: Decision,
    ) -> MarketResult<BalanceRequest> {
        self.resolve_request(admin, RequestKind::Withdraw, request, decision)
            .await
    }

    /// Resolve a pending balance or withdraw request exactly once
    ///
    /// The resolution is recorded before the balance changes. If the balance
    /// change then fails the request stays approved but unapplied and shows up
    /// in [`LedgerStore::unapplied_requests`]; it is never re-applied
    /// automatically.
    ///
    /// # Returns
    ///
    /// * `Ok(BalanceRequest)` - The resolved request
    /// * `Err(MarketError::Unauthorized)` - `admin` is not an admin
    /// * `Err(MarketError::NotFound)` - No request of this kind with this id
    /// * `Err(MarketError::AlreadyResolved)` - The request is no longer pending
    /// * `Err(MarketError::InsufficientFunds)` - Withdraw approval exceeds the balance
    /// * `Err(MarketError::TransactionFailed)` - Approved, but the balance change failed
    pub async fn resolve_request(
        &self,
        admin: UserId,
        kind: RequestKind,
        request_id: RequestId,
        decision: Decision,
    ) -> MarketResult<BalanceRequest> {
        self.require_admin(admin, "resolve requests")?;

        let request = self
            .ledger
            .get_request(request_id)
            .filter(|request| request.kind == kind)
            .ok_or_else(|| MarketError::not_found("request", request_id))?;

        if !request.status.is_pending() {
            return Err(MarketError::already_resolved("request", request_id));
        }

        let (resolved, balance) = {
            let _guard = self.locks.acquire(request.user).await;

            if kind == RequestKind::Withdraw && decision == Decision::Approve {
                let balance = self.ledger.get_balance(request.user);
                if balance < request.amount {
                    return Err(MarketError::insufficient_funds(
                        request.user,
                        balance,
                        request.amount,
                    ));
                }
            }

            let resolved =
                self.ledger
                    .resolve_request(request_id, decision.into(), admin, self.clock.now())?;

            let balance = match decision {
                Decision::Approve => self.apply_request(&resolved)?,
                Decision::Reject => self.ledger.get_balance(resolved.user),
            };

            (resolved, balance)
        };

        info!(
            admin,
            request = resolved.id,
            kind = %resolved.kind,
            user = resolved.user,
            amount = %resolved.amount,
            status = %resolved.status,
            "Request resolved"
        );

        best_effort(
            self.transport
                .notify(
                    resolved.user,
                    &messages::request_resolved(&resolved, balance),
                )
                .await,
            resolved.user,
            "request resolution",
        );

        Ok(resolved)
    }

    fn apply_request(&self, request: &BalanceRequest) -> MarketResult<Decimal> {
        let delta = match request.kind {
            RequestKind::TopUp => request.amount,
            RequestKind::Withdraw => -request.amount,
        };

        let balance = self
            .ledger
            .adjust_balance(request.user, delta)
            .map_err(|e| {
                error!(
                    request = request.id,
                    user = request.user,
                    amount = %request.amount,
                    error = %e,
                    "Request approved but balance change not applied"
                );
                MarketError::transaction_failed("apply request", request.user, e)
            })?;

        if let Err(e) = self.ledger.mark_request_applied(request.id) {
            error!(request = request.id, error = %e, "Could not mark request as applied");
        }

        Ok(balance)
    }

    /// Credit a user directly, on an admin's behalf
    ///
    /// The target does not need to have contacted the bot yet.
    pub async fn admin_credit(
        &self,
        admin: UserId,
        target: UserId,
        amount: Decimal,
    ) -> MarketResult<Decimal> {
        self.require_admin(admin, "credit balances")?;

        if amount <= Decimal::ZERO {
            return Err(MarketError::validation("amount", "must be greater than zero"));
        }

        let balance = {
            let _guard = self.locks.acquire(target).await;
            self.ledger.adjust_balance(target, amount).map_err(|e| {
                error!(admin, target, %amount, error = %e, "Admin credit failed");
                MarketError::transaction_failed("admin credit", target, e)
            })?
        };

        info!(admin, target, %amount, %balance, "Admin credit applied");

        best_effort(
            self.transport
                .notify(target, &messages::credit_received(amount, balance))
                .await,
            target,
            "credit notification",
        );

        Ok(balance)
    }

    /// File a top-up request and alert the admins
    pub async fn file_top_up_request(
        &self,
        user: UserId,
        amount: Decimal,
        proof: Proof,
    ) -> MarketResult<BalanceRequest> {
        if amount <= Decimal::ZERO {
            return Err(MarketError::validation("amount", "must be greater than zero"));
        }

        let request = self.ledger.create_request(
            RequestKind::TopUp,
            user,
            amount,
            Some(proof),
            self.clock.now(),
        )?;

        info!(user, request = request.id, %amount, "Top-up request filed");
        self.alert_admins(&request).await;

        Ok(request)
    }

    /// File a withdraw request and alert the admins
    ///
    /// The amount must be positive and covered by the balance at filing time.
    /// Nothing is debited until an admin approves.
    pub async fn file_withdraw_request(
        &self,
        user: UserId,
        amount: Decimal,
        details: String,
    ) -> MarketResult<BalanceRequest> {
        if amount <= Decimal::ZERO {
            return Err(MarketError::validation("amount", "must be greater than zero"));
        }

        let request = {
            let _guard = self.locks.acquire(user).await;

            let balance = self.ledger.get_balance(user);
            if amount > balance {
                return Err(MarketError::insufficient_funds(user, balance, amount));
            }

            self.ledger.create_request(
                RequestKind::Withdraw,
                user,
                amount,
                Some(Proof::Text(details)),
                self.clock.now(),
            )?
        };

        info!(user, request = request.id, %amount, "Withdraw request filed");
        self.alert_admins(&request).await;

        Ok(request)
    }

    async fn alert_admins(&self, request: &BalanceRequest) {
        let author = self.user_or_placeholder(request.user);
        let text = messages::admin_new_request(request, &author);
        notify_all(self.transport.as_ref(), &self.admins.admins(), &text).await;
    }
}
