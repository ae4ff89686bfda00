//! Moderation of items and feedback
//!
//! Item lifecycle:
//!
//! ```text
//! pending --approve--> approved (terminal)
//! pending --reject---> removed  (terminal, record deleted)
//! approved --edit(name|price)--> approved
//! ```
//!
//! Nothing ever moves back to pending. Feedback follows the request lifecycle:
//! pending, then approved or rejected exactly once.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use super::messages;
use super::traits::LedgerStore;
use super::validation;
use crate::config::MarketConfig;
use crate::traits::{best_effort, notify_all, AdminIdentity, ChatTransport, Clock, ContentStore};
use crate::types::{
    Decision, Feedback, FeedbackId, Item, ItemDraft, ItemEdit, ItemId, MarketError,
    MarketResult, User, UserId,
};

/// Admin gate controlling catalog visibility
pub struct ModerationEngine {
    ledger: Arc<dyn LedgerStore>,
    content: Arc<dyn ContentStore>,
    transport: Arc<dyn ChatTransport>,
    admins: Arc<dyn AdminIdentity>,
    clock: Arc<dyn Clock>,
    config: Arc<MarketConfig>,
    /// Held across every status change so a rejection cannot race an approval
    transitions: Mutex<()>,
}

impl ModerationEngine {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        content: Arc<dyn ContentStore>,
        transport: Arc<dyn ChatTransport>,
        admins: Arc<dyn AdminIdentity>,
        clock: Arc<dyn Clock>,
        config: Arc<MarketConfig>,
    ) -> Self {
        Self {
            ledger,
            content,
            transport,
            admins,
            clock,
            config,
            transitions: Mutex::new(()),
        }
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

    /// Store a draft as a pending item and alert the admins
    ///
    /// `draft.price` is the price the author entered; the stored catalog price
    /// is derived from it through the configured pricing policy. The entered
    /// price only appears in the admin notification. The subject is created
    /// if it does not exist yet.
    pub async fn submit_for_review(&self, mut draft: ItemDraft) -> MarketResult<Item> {
        draft.name = validation::validate_name(&draft.name, self.config.name_limit)?;
        validation::validate_term(draft.term, self.config.terms)?;
        let entered = validation::validate_price(draft.price)?;

        if self.ledger.add_subject(&draft.subject)? {
            info!(subject = %draft.subject, "Subject created");
        }

        draft.price = self
            .config
            .pricing
            .catalog_price(entered)
            .ok_or_else(|| MarketError::arithmetic_overflow("catalog price", draft.author))?;
        let item = self.ledger.insert_item(draft, self.clock.now())?;

        info!(
            item = item.id,
            author = item.author,
            subject = %item.subject,
            %entered,
            price = %item.price,
            "Item submitted for review"
        );

        let author = self.user_or_placeholder(item.author);
        let text =
            messages::admin_new_item(&item, &author, entered, self.config.pricing.percent());
        notify_all(self.transport.as_ref(), &self.admins.admins(), &text).await;

        Ok(item)
    }

    /// Approve a pending item
    ///
    /// # Returns
    ///
    /// * `Ok(Item)` - The approved item, with its approval time set
    /// * `Err(MarketError::NotFound)` - No such item (it may have been rejected)
    /// * `Err(MarketError::AlreadyResolved)` - The item is already approved
    pub async fn approve(&self, admin: UserId, item_id: ItemId) -> MarketResult<Item> {
        self.require_admin(admin, "approve items")?;

        {
            let _transition = self.transitions.lock().await;
            if !self.ledger.approve_item(item_id, self.clock.now())? {
                return Err(self.lost_transition(item_id));
            }
        }

        let item = self
            .ledger
            .item_record(item_id)
            .ok_or_else(|| MarketError::not_found("item", item_id))?;

        info!(admin, item = item.id, "Item approved");

        best_effort(
            self.transport
                .notify(item.author, &messages::item_approved(&item))
                .await,
            item.author,
            "approval notification",
        );

        Ok(item)
    }

    /// Reject a pending item, deleting it and its content
    ///
    /// The author is notified before deletion; a failed notification does not
    /// block the deletion. The pending check, the notification and the delete
    /// happen under one transition lock, so an author is never told about a
    /// rejection that lost to an approval.
    pub async fn reject(&self, admin: UserId, item_id: ItemId) -> MarketResult<Item> {
        self.require_admin(admin, "reject items")?;

        let _transition = self.transitions.lock().await;
        let item = self
            .ledger
            .item_record(item_id)
            .ok_or_else(|| MarketError::not_found("item", item_id))?;
        if item.is_approved() {
            return Err(MarketError::already_resolved("item", item_id));
        }

        best_effort(
            self.transport
                .notify(item.author, &messages::item_rejected(&item))
                .await,
            item.author,
            "rejection notification",
        );

        if !self.ledger.reject_item(item_id)? {
            return Err(self.lost_transition(item_id));
        }

        if let Err(e) = self.content.remove(&item.content).await {
            warn!(item = item_id, handle = %item.content.handle, error = %e, "Could not remove rejected content");
        }

        info!(admin, item = item_id, author = item.author, "Item rejected and removed");
        Ok(item)
    }

    /// Error for a transition that did not apply: gone, or someone else got there first
    fn lost_transition(&self, item_id: ItemId) -> MarketError {
        match self.ledger.item_record(item_id) {
            Some(_) => MarketError::already_resolved("item", item_id),
            None => MarketError::not_found("item", item_id),
        }
    }

    /// Correct an item's name or catalog price in place
    ///
    /// The moderation status does not change. A price given here is the final
    /// catalog price; no markup is applied.
    pub async fn edit(&self, admin: UserId, item_id: ItemId, edit: ItemEdit) -> MarketResult<Item> {
        self.require_admin(admin, "edit items")?;

        let edit = match edit {
            ItemEdit::Name(name) => {
                ItemEdit::Name(validation::validate_name(&name, self.config.name_limit)?)
            }
            ItemEdit::Price(price) => {
                let mut price = validation::validate_price(price)?.round_dp(2);
                price.rescale(2);
                ItemEdit::Price(price)
            }
        };

        let item = self.ledger.edit_item(item_id, &edit)?;
        info!(admin, item = item.id, name = %item.name, price = %item.price, "Item edited");
        Ok(item)
    }

    /// Store feedback and alert the admins
    pub async fn submit_feedback(&self, user: UserId, message: &str) -> MarketResult<Feedback> {
        let message = validation::validate_feedback(message, self.config.feedback_limit)?;
        let feedback = self
            .ledger
            .create_feedback(user, &message, self.clock.now())?;

        info!(user, feedback = feedback.id, "Feedback received");

        let author = self.user_or_placeholder(user);
        let text = messages::admin_new_feedback(&feedback, &author);
        notify_all(self.transport.as_ref(), &self.admins.admins(), &text).await;

        Ok(feedback)
    }

    /// Resolve feedback exactly once and tell its author
    pub async fn resolve_feedback(
        &self,
        admin: UserId,
        feedback_id: FeedbackId,
        decision: Decision,
    ) -> MarketResult<Feedback> {
        self.require_admin(admin, "resolve feedback")?;

        let feedback =
            self.ledger
                .resolve_feedback(feedback_id, decision.into(), admin, self.clock.now())?;

        info!(admin, feedback = feedback.id, status = %feedback.status, "Feedback resolved");

        best_effort(
            self.transport
                .notify(feedback.user, &messages::feedback_resolved(&feedback))
                .await,
            feedback.user,
            "feedback resolution",
        );

        Ok(feedback)
    }

    /// Pending items, oldest first, for the admin queue
    pub fn pending_items(&self, admin: UserId) -> MarketResult<Vec<Item>> {
        self.require_admin(admin, "list pending items")?;
        Ok(self.ledger.list_pending_items())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PricingPolicy;
    use crate::core::ledger::MemoryLedger;
    use crate::mocks::{Channel, RecordingTransport};
    use crate::traits::{MemoryContentStore, StaticAdmins, SystemClock};
    use crate::types::{Category, ContentKind, ContentRef, ModerationStatus, RequestStatus};
    use rust_decimal::Decimal;

    const ADMIN: UserId = 1;

    struct Fixture {
        ledger: Arc<MemoryLedger>,
        content: Arc<MemoryContentStore>,
        transport: RecordingTransport,
        engine: ModerationEngine,
    }

    fn fixture() -> Fixture {
        fixture_with(MarketConfig::default())
    }

    fn fixture_with(config: MarketConfig) -> Fixture {
        let ledger = Arc::new(MemoryLedger::new());
        let content = Arc::new(MemoryContentStore::new());
        let transport = RecordingTransport::new();
        let engine = ModerationEngine::new(
            ledger.clone(),
            content.clone(),
            Arc::new(transport.clone()),
            Arc::new(StaticAdmins::new([ADMIN])),
            Arc::new(SystemClock::new()),
            Arc::new(config),
        );
        Fixture {
            ledger,
            content,
            transport,
            engine,
        }
    }

    async fn submit(fixture: &Fixture, author: UserId, price: Decimal) -> Item {
        let content = fixture
            .content
            .store(b"formulas".to_vec(), ContentKind::Text)
            .await
            .unwrap();
        fixture
            .engine
            .submit_for_review(ItemDraft {
                subject: "Math".to_string(),
                term: 2,
                category: Category::Formulas,
                name: " Calc Formulas ".to_string(),
                content,
                price,
                author,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_submit_applies_markup_and_creates_subject() {
        let fixture = fixture();

        let item = submit(&fixture, 10, Decimal::new(100, 0)).await;

        assert_eq!(item.price.to_string(), "110.00");
        assert_eq!(item.name, "Calc Formulas");
        assert_eq!(item.status, ModerationStatus::Pending);
        assert_eq!(fixture.ledger.subjects(), vec!["Math"]);
    }

    #[tokio::test]
    async fn test_submit_rejects_invalid_draft() {
        let fixture = fixture();
        let result = fixture
            .engine
            .submit_for_review(ItemDraft {
                subject: "Math".to_string(),
                term: 9,
                category: Category::Theory,
                name: "x".to_string(),
                content: ContentRef::new("blob-1", ContentKind::Text),
                price: Decimal::ONE,
                author: 10,
            })
            .await;

        assert!(matches!(result, Err(MarketError::Validation { .. })));
        assert!(fixture.ledger.list_pending_items().is_empty());
    }

    #[tokio::test]
    async fn test_submit_price_overflow_is_refused() {
        // Built directly: MarketConfig::new would cap this markup
        let fixture = fixture_with(MarketConfig {
            pricing: PricingPolicy::new(Decimal::from_scientific("1e20").unwrap()),
            ..MarketConfig::default()
        });

        let result = fixture
            .engine
            .submit_for_review(ItemDraft {
                subject: "Math".to_string(),
                term: 1,
                category: Category::Formulas,
                name: "Calc Formulas".to_string(),
                content: ContentRef::new("blob-1", ContentKind::Text),
                price: Decimal::from(1_000_000_000),
                author: 10,
            })
            .await;

        assert!(matches!(result, Err(MarketError::ArithmeticOverflow { .. })));
        assert!(fixture.ledger.list_pending_items().is_empty());
    }

    #[tokio::test]
    async fn test_approve_once() {
        let fixture = fixture();
        let item = submit(&fixture, 10, Decimal::new(100, 0)).await;

        let approved = fixture.engine.approve(ADMIN, item.id).await.unwrap();
        let again = fixture.engine.approve(ADMIN, item.id).await;

        assert!(approved.approved_at.is_some());
        assert!(matches!(again, Err(MarketError::AlreadyResolved { .. })));
    }

    #[tokio::test]
    async fn test_reject_removes_item_and_content() {
        let fixture = fixture();
        let item = submit(&fixture, 10, Decimal::new(100, 0)).await;

        fixture.engine.reject(ADMIN, item.id).await.unwrap();

        assert!(fixture.ledger.item_record(item.id).is_none());
        assert!(fixture.content.is_empty());
        assert!(matches!(
            fixture.engine.approve(ADMIN, item.id).await,
            Err(MarketError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_cannot_reject_approved_item() {
        let fixture = fixture();
        let item = submit(&fixture, 10, Decimal::new(100, 0)).await;
        fixture.engine.approve(ADMIN, item.id).await.unwrap();

        let result = fixture.engine.reject(ADMIN, item.id).await;

        assert!(matches!(result, Err(MarketError::AlreadyResolved { .. })));
        assert!(fixture.ledger.item_record(item.id).is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_approve_and_reject_agree() {
        for _ in 0..50 {
            let fixture = Arc::new(fixture());
            let item = submit(&fixture, 10, Decimal::new(100, 0)).await;
            let id = item.id;

            let approving = {
                let fixture = fixture.clone();
                tokio::spawn(async move { fixture.engine.approve(ADMIN, id).await })
            };
            let rejecting = {
                let fixture = fixture.clone();
                tokio::spawn(async move { fixture.engine.reject(ADMIN, id).await })
            };
            let approved = approving.await.unwrap();
            let rejected = rejecting.await.unwrap();

            assert_ne!(approved.is_ok(), rejected.is_ok());

            let rejection_notices = fixture
                .transport
                .messages_to(10)
                .await
                .into_iter()
                .filter(|m| m.channel == Channel::Notify && m.text == messages::item_rejected(&item))
                .count();
            match fixture.ledger.item_record(item.id) {
                Some(stored) => {
                    assert!(approved.is_ok());
                    assert_eq!(stored.status, ModerationStatus::Approved);
                    assert_eq!(rejection_notices, 0);
                }
                None => {
                    assert!(rejected.is_ok());
                    assert_eq!(rejection_notices, 1);
                }
            }
        }
    }

    #[tokio::test]
    async fn test_moderation_requires_admin() {
        let fixture = fixture();
        let item = submit(&fixture, 10, Decimal::new(100, 0)).await;

        let approve = fixture.engine.approve(10, item.id).await;
        let reject = fixture.engine.reject(10, item.id).await;

        assert!(matches!(approve, Err(MarketError::Unauthorized { .. })));
        assert!(matches!(reject, Err(MarketError::Unauthorized { .. })));
    }

    #[tokio::test]
    async fn test_edit_price_keeps_status() {
        let fixture = fixture();
        let item = submit(&fixture, 10, Decimal::new(100, 0)).await;
        fixture.engine.approve(ADMIN, item.id).await.unwrap();

        let edited = fixture
            .engine
            .edit(ADMIN, item.id, ItemEdit::Price(Decimal::new(995, 1)))
            .await
            .unwrap();

        assert_eq!(edited.price.to_string(), "99.50");
        assert_eq!(edited.status, ModerationStatus::Approved);

        let bad = fixture
            .engine
            .edit(ADMIN, item.id, ItemEdit::Name("   ".to_string()))
            .await;
        assert!(matches!(bad, Err(MarketError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_feedback_lifecycle() {
        let fixture = fixture();

        let feedback = fixture
            .engine
            .submit_feedback(10, "more physics please")
            .await
            .unwrap();
        let resolved = fixture
            .engine
            .resolve_feedback(ADMIN, feedback.id, Decision::Approve)
            .await
            .unwrap();
        let again = fixture
            .engine
            .resolve_feedback(ADMIN, feedback.id, Decision::Reject)
            .await;

        assert_eq!(resolved.status, RequestStatus::Approved);
        assert!(matches!(again, Err(MarketError::AlreadyResolved { .. })));
    }
}
