//! Marketplace facade
//!
//! Entry point for inbound chat events. Each event registers its sender,
//! takes the sender's conversation turn and is routed either to a direct
//! action (buy, open, moderation, request resolution) or to the
//! conversation engine. Completed flows are executed here against the
//! moderation engine and the transaction coordinator.

use std::sync::Arc;

use chrono::TimeDelta;
use tracing::{debug, error, info, warn};

use super::conversation::{ConversationEngine, Flow, FlowAction, StepOutcome, SubmissionForm};
use super::coordinator::{PurchaseOutcome, TransactionCoordinator};
use super::messages;
use super::moderation::ModerationEngine;
use super::traits::LedgerStore;
use super::validation::RawPayload;
use crate::config::MarketConfig;
use crate::traits::{best_effort, AdminIdentity, ChatTransport, Clock, ContentStore};
use crate::types::{
    CatalogFilter, Command, Decision, InboundEvent, Input, Item, ItemDraft, ItemId, MarketError,
    MarketResult, MenuAction, Proof, UserId,
};

/// The study marketplace: ledger, moderation, payments and conversations
pub struct Marketplace {
    ledger: Arc<dyn LedgerStore>,
    content: Arc<dyn ContentStore>,
    transport: Arc<dyn ChatTransport>,
    admins: Arc<dyn AdminIdentity>,
    coordinator: TransactionCoordinator,
    moderation: ModerationEngine,
    conversations: ConversationEngine,
}

impl Marketplace {
    /// Create a marketplace and register the configured subjects
    ///
    /// # Arguments
    ///
    /// * `ledger` - Durable store of users, items, purchases and requests
    /// * `content` - Store for uploaded files and text bodies
    /// * `transport` - Outbound chat transport
    /// * `admins` - Admin predicate
    /// * `clock` - Source of timestamps
    /// * `config` - Pricing, limits and seeded subjects
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        content: Arc<dyn ContentStore>,
        transport: Arc<dyn ChatTransport>,
        admins: Arc<dyn AdminIdentity>,
        clock: Arc<dyn Clock>,
        config: Arc<MarketConfig>,
    ) -> MarketResult<Self> {
        for subject in &config.subjects {
            ledger.add_subject(subject)?;
        }

        let coordinator = TransactionCoordinator::new(
            ledger.clone(),
            transport.clone(),
            admins.clone(),
            clock.clone(),
        );
        let moderation = ModerationEngine::new(
            ledger.clone(),
            content.clone(),
            transport.clone(),
            admins.clone(),
            clock.clone(),
            config.clone(),
        );
        let conversations = ConversationEngine::new(ledger.clone(), admins.clone(), clock, config);

        Ok(Self {
            ledger,
            content,
            transport,
            admins,
            coordinator,
            moderation,
            conversations,
        })
    }

    pub fn ledger(&self) -> &Arc<dyn LedgerStore> {
        &self.ledger
    }

    pub fn coordinator(&self) -> &TransactionCoordinator {
        &self.coordinator
    }

    pub fn moderation(&self) -> &ModerationEngine {
        &self.moderation
    }

    pub fn conversations(&self) -> &ConversationEngine {
        &self.conversations
    }

    pub fn is_admin(&self, user: UserId) -> bool {
        self.admins.is_admin(user)
    }

    /// Catalog query: items matching `filter` that `user` may see
    pub fn search(&self, filter: &CatalogFilter, user: UserId) -> Vec<Item> {
        self.ledger.list_catalog(filter, user)
    }

    /// Drop conversations abandoned for longer than `max_idle`
    ///
    /// Unused per-user locks are released at the same time.
    pub fn purge_idle(&self, max_idle: TimeDelta) -> usize {
        let purged = self.conversations.purge_idle(max_idle);
        let locks = self.coordinator.prune_locks();
        debug!(purged, locks, "Idle state released");
        purged
    }

    /// Handle one inbound event
    ///
    /// Events from the same user are processed one at a time; events from
    /// different users proceed concurrently. A failure is reported to the
    /// user before it is returned.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The event was handled, including validation re-prompts
    /// * `Err(MarketError)` - The action failed; the user has been told why
    pub async fn handle(&self, event: InboundEvent) -> MarketResult<()> {
        let user = event.user;
        self.ledger
            .ensure_user(user, event.display_name.as_deref().unwrap_or_default())?;

        let _turn = self.conversations.lock(user).await;
        debug!(user, input = event.input.label(), "Handling event");

        let result = match &event.input {
            Input::Command(command) => self.command(user, command).await,
            input => {
                let outcome = self.conversations.advance(user, input);
                self.step(user, outcome).await
            }
        };

        if let Err(e) = &result {
            match e {
                MarketError::TransactionFailed { .. }
                | MarketError::Storage { .. }
                | MarketError::ArithmeticOverflow { .. } => {
                    error!(user, error = %e, "Event failed")
                }
                _ => info!(user, error = %e, "Event refused"),
            }
            self.reply(user, &messages::user_error(e)).await;
        }

        result
    }

    async fn command(&self, user: UserId, command: &Command) -> MarketResult<()> {
        match command {
            Command::Menu(action) => self.menu(user, *action).await,
            Command::Cancel => self.step(user, Ok(self.conversations.cancel(user))).await,
            Command::Back => self.step(user, Ok(self.conversations.back(user))).await,
            Command::Open(item) => self.open(user, *item).await,
            Command::Buy(item) => {
                // Delivery and the receipt caption are handled by the coordinator
                match self.coordinator.purchase(user, *item).await? {
                    PurchaseOutcome::Purchased { item, balance } => {
                        info!(user, item = item.id, %balance, "Purchase completed")
                    }
                    PurchaseOutcome::AlreadyOwned { item } => {
                        debug!(user, item = item.id, "Re-delivered owned item")
                    }
                }
                Ok(())
            }
            Command::Moderate { item, decision } => {
                let item = match decision {
                    Decision::Approve => self.moderation.approve(user, *item).await?,
                    Decision::Reject => self.moderation.reject(user, *item).await?,
                };
                self.reply(user, &messages::moderated(&item, *decision)).await;
                Ok(())
            }
            Command::Edit { item, field } => {
                let outcome = self.conversations.start_admin_edit(user, *item, *field);
                self.step(user, outcome).await
            }
            Command::Resolve {
                kind,
                request,
                decision,
            } => {
                let request = self
                    .coordinator
                    .resolve_request(user, *kind, *request, *decision)
                    .await?;
                self.reply(user, &messages::request_decided(&request)).await;
                Ok(())
            }
            Command::ResolveFeedback { feedback, decision } => {
                let feedback = self
                    .moderation
                    .resolve_feedback(user, *feedback, *decision)
                    .await?;
                self.reply(user, &messages::feedback_decided(&feedback)).await;
                Ok(())
            }
            Command::Subject(_) | Command::Term(_) | Command::Category(_) | Command::Confirm(_) => {
                let outcome = self
                    .conversations
                    .advance(user, &Input::Command(command.clone()));
                self.step(user, outcome).await
            }
        }
    }

    async fn menu(&self, user: UserId, action: MenuAction) -> MarketResult<()> {
        let flow = match action {
            MenuAction::Start => {
                self.conversations.cancel(user);
                self.reply(user, messages::WELCOME).await;
                return Ok(());
            }
            MenuAction::Help => {
                self.reply(user, messages::HELP).await;
                return Ok(());
            }
            MenuAction::Balance => {
                let balance = self.coordinator.balance(user);
                self.reply(user, &messages::balance(balance)).await;
                return Ok(());
            }
            MenuAction::Search => Flow::Search,
            MenuAction::Submit => Flow::Submit,
            MenuAction::MyItems => Flow::MyItems,
            MenuAction::TopUp => Flow::TopUp,
            MenuAction::Withdraw => Flow::Withdraw,
            MenuAction::Feedback => Flow::Feedback,
            MenuAction::AddBalance => Flow::AdminCredit,
            MenuAction::Broadcast => Flow::Broadcast,
        };

        let outcome = self.conversations.start(user, flow);
        self.step(user, outcome).await
    }

    async fn step(&self, user: UserId, outcome: MarketResult<StepOutcome>) -> MarketResult<()> {
        match outcome? {
            StepOutcome::Prompt(text) | StepOutcome::Reprompt(text) | StepOutcome::Refused(text) => {
                self.reply(user, &text).await;
                Ok(())
            }
            StepOutcome::Cancelled => {
                self.reply(user, messages::CANCELLED).await;
                Ok(())
            }
            StepOutcome::Idle => {
                self.reply(user, messages::NO_ACTIVE_FLOW).await;
                Ok(())
            }
            StepOutcome::Completed(action) => self.execute(user, action).await,
        }
    }

    async fn execute(&self, user: UserId, action: FlowAction) -> MarketResult<()> {
        match action {
            FlowAction::Search(filter) => {
                let items = self.search(&filter, user);
                self.reply(user, &messages::catalog(&items, user)).await;
            }
            FlowAction::MyItems(filter) => {
                let items = self.ledger.list_owned(user, &filter);
                self.reply(user, &messages::owned(&items)).await;
            }
            FlowAction::Submit(form) => {
                let item = self.submit(user, form).await?;
                self.reply(user, &messages::submitted(item.price)).await;
            }
            FlowAction::TopUp { amount, proof } => {
                let proof = match proof {
                    RawPayload::Text(text) => Proof::Text(text),
                    RawPayload::Content(raw) => {
                        Proof::Content(self.content.store(raw.data, raw.kind).await?)
                    }
                };
                let request = self
                    .coordinator
                    .file_top_up_request(user, amount, proof)
                    .await?;
                self.reply(user, &messages::request_filed(&request)).await;
            }
            FlowAction::Withdraw { amount, details } => {
                let request = self
                    .coordinator
                    .file_withdraw_request(user, amount, details)
                    .await?;
                self.reply(user, &messages::request_filed(&request)).await;
            }
            FlowAction::Feedback(message) => {
                self.moderation.submit_feedback(user, &message).await?;
                self.reply(user, messages::FEEDBACK_SENT).await;
            }
            FlowAction::Edit { item, edit } => {
                let item = self.moderation.edit(user, item, edit).await?;
                self.reply(user, &messages::item_edited(&item)).await;
            }
            FlowAction::Credit { target, amount } => {
                let balance = self.coordinator.admin_credit(user, target, amount).await?;
                self.reply(user, &messages::credited(target, amount, balance))
                    .await;
            }
            FlowAction::Broadcast(payload) => {
                let (sent, total) = self.broadcast(user, payload).await?;
                self.reply(user, &messages::broadcast_done(sent, total)).await;
            }
        }
        Ok(())
    }

    /// Store the content of a completed submission and queue it for review
    ///
    /// The stored blob is removed again if the submission is refused.
    async fn submit(&self, user: UserId, form: SubmissionForm) -> MarketResult<Item> {
        let content = self.content.store(form.content.data, form.content.kind).await?;
        let draft = ItemDraft {
            subject: form.subject,
            term: form.term,
            category: form.category,
            name: form.name,
            content: content.clone(),
            price: form.price,
            author: user,
        };

        match self.moderation.submit_for_review(draft).await {
            Ok(item) => Ok(item),
            Err(e) => {
                if let Err(cleanup) = self.content.remove(&content).await {
                    warn!(user, handle = %content.handle, error = %cleanup, "Orphaned content");
                }
                Err(e)
            }
        }
    }

    /// Deliver an item the user may open
    ///
    /// Authors and buyers get the content; everyone else sees the offer.
    async fn open(&self, user: UserId, item_id: ItemId) -> MarketResult<()> {
        let item = self
            .ledger
            .get_item(item_id, user)
            .ok_or_else(|| MarketError::not_found("item", item_id))?;

        if item.author == user || self.ledger.has_purchase(user, item_id) {
            best_effort(
                self.transport
                    .deliver_file(user, &item.content, &messages::item_caption(&item))
                    .await,
                user,
                "deliver item",
            );
        } else {
            self.reply(user, &messages::item_offer(&item)).await;
        }
        Ok(())
    }

    /// Send a message to every known user
    ///
    /// # Returns
    ///
    /// `(sent, total)`: successful deliveries and the number of recipients
    pub async fn broadcast(&self, admin: UserId, payload: RawPayload) -> MarketResult<(usize, usize)> {
        if !self.admins.is_admin(admin) {
            warn!(user = admin, "Non-admin tried to broadcast");
            return Err(MarketError::unauthorized(admin, "broadcast"));
        }

        let (text, content) = match payload {
            RawPayload::Text(text) => (text, None),
            RawPayload::Content(raw) => (
                String::new(),
                Some(self.content.store(raw.data, raw.kind).await?),
            ),
        };

        let recipients = self.ledger.all_users();
        let total = recipients.len();
        let mut sent = 0;
        for recipient in recipients {
            let result = match &content {
                None => self.transport.send(recipient.id, &text).await,
                Some(content) => self.transport.deliver_file(recipient.id, content, "").await,
            };
            if best_effort(result, recipient.id, "broadcast") {
                sent += 1;
            }
        }

        info!(admin, sent, total, "Broadcast finished");
        Ok((sent, total))
    }

    async fn reply(&self, user: UserId, text: &str) {
        best_effort(self.transport.send(user, text).await, user, "reply");
    }
}
