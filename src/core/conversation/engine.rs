//! Conversation engine
//!
//! Drives the per-user flows step by step. The engine only reads the ledger
//! (subjects, balances, item existence); once a flow has collected every
//! value it hands back a [`FlowAction`] and the caller performs the
//! mutation. Validation failures re-prompt and keep the flow where it is.

use std::sync::Arc;

use chrono::TimeDelta;
use rust_decimal::Decimal;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, warn};

use super::state::{
    BroadcastStep, Conversation, CreditStep, Flow, FlowContext, SelectionStep, Step, SubmitStep,
    TopUpStep, WithdrawStep,
};
use super::store::ConversationStore;
use crate::config::MarketConfig;
use crate::core::messages;
use crate::core::traits::LedgerStore;
use crate::core::validation::{self, RawContent, RawPayload};
use crate::traits::{AdminIdentity, Clock};
use crate::types::{
    CatalogFilter, Category, Command, EditField, Input, ItemEdit, ItemId, MarketError,
    MarketResult, Term, UserId,
};

/// Values collected by a completed submit flow
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionForm {
    pub subject: String,
    pub term: Term,
    pub category: Category,
    pub name: String,
    pub content: RawContent,
    /// Price as entered, before markup
    pub price: Decimal,
}

/// Work a completed flow asks the caller to perform
#[derive(Debug, Clone, PartialEq)]
pub enum FlowAction {
    Search(CatalogFilter),
    MyItems(CatalogFilter),
    Submit(SubmissionForm),
    TopUp { amount: Decimal, proof: RawPayload },
    Withdraw { amount: Decimal, details: String },
    Feedback(String),
    Edit { item: ItemId, edit: ItemEdit },
    Credit { target: UserId, amount: Decimal },
    Broadcast(RawPayload),
}

/// Result of feeding one input to the engine
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// Moved to a new step; send this prompt
    Prompt(String),
    /// Input rejected; the step is unchanged
    Reprompt(String),
    /// Flow finished and its state is cleared
    Completed(FlowAction),
    /// Flow abandoned and its state is cleared
    Cancelled,
    /// The user has no active flow
    Idle,
    /// The flow could not be started
    Refused(String),
}

enum Transition {
    Next(Step),
    Done(FlowAction),
    Abort,
}

pub struct ConversationEngine {
    ledger: Arc<dyn LedgerStore>,
    admins: Arc<dyn AdminIdentity>,
    clock: Arc<dyn Clock>,
    config: Arc<MarketConfig>,
    store: ConversationStore,
}

impl ConversationEngine {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        admins: Arc<dyn AdminIdentity>,
        clock: Arc<dyn Clock>,
        config: Arc<MarketConfig>,
    ) -> Self {
        Self {
            ledger,
            admins,
            clock,
            config,
            store: ConversationStore::new(),
        }
    }

    /// Take the user's turn; see [`ConversationStore::lock`]
    pub async fn lock(&self, user: UserId) -> OwnedMutexGuard<()> {
        self.store.lock(user).await
    }

    pub fn current(&self, user: UserId) -> Option<Conversation> {
        self.store.get(user)
    }

    /// Start a flow, discarding whatever flow the user was in
    ///
    /// # Returns
    ///
    /// * `Ok(StepOutcome::Prompt)` - The first step's prompt
    /// * `Ok(StepOutcome::Refused)` - Withdraw with an empty balance
    /// * `Err(MarketError::Unauthorized)` - Admin-only flow started by a non-admin
    pub fn start(&self, user: UserId, flow: Flow) -> MarketResult<StepOutcome> {
        self.store.clear(user);

        if flow.requires_admin() && !self.admins.is_admin(user) {
            warn!(user, flow = flow.as_str(), "Non-admin tried to start an admin flow");
            return Err(MarketError::unauthorized(user, flow.as_str()));
        }

        if flow == Flow::Withdraw && self.ledger.get_balance(user) <= Decimal::ZERO {
            return Ok(StepOutcome::Refused(messages::EMPTY_BALANCE.to_string()));
        }

        Ok(self.enter(user, Step::first(flow), FlowContext::default()))
    }

    /// Start an admin's in-place correction of an item field
    pub fn start_admin_edit(
        &self,
        user: UserId,
        item: ItemId,
        field: EditField,
    ) -> MarketResult<StepOutcome> {
        self.store.clear(user);

        if !self.admins.is_admin(user) {
            warn!(user, item, "Non-admin tried to edit an item");
            return Err(MarketError::unauthorized(user, "edit items"));
        }
        if self.ledger.item_record(item).is_none() {
            return Err(MarketError::not_found("item", item));
        }

        Ok(self.enter(user, Step::AdminEdit { item, field }, FlowContext::default()))
    }

    /// Feed one input to the user's active flow
    pub fn advance(&self, user: UserId, input: &Input) -> MarketResult<StepOutcome> {
        let Some(mut conversation) = self.store.get(user) else {
            return Ok(StepOutcome::Idle);
        };

        match self.accept(user, conversation.step, &mut conversation.context, input) {
            Ok(Transition::Next(step)) => Ok(self.enter(user, step, conversation.context)),
            Ok(Transition::Done(action)) => {
                self.store.clear(user);
                debug!(user, "Flow completed");
                Ok(StepOutcome::Completed(action))
            }
            Ok(Transition::Abort) => {
                self.store.clear(user);
                Ok(StepOutcome::Cancelled)
            }
            Err(error) if error.is_user_recoverable() => {
                self.store.touch(user, self.clock.now());
                let prompt = self.prompt(user, &conversation.step);
                Ok(StepOutcome::Reprompt(messages::reprompt(&error, &prompt)))
            }
            Err(error) => {
                self.store.clear(user);
                Err(error)
            }
        }
    }

    /// Leave the active flow, dropping everything it collected
    pub fn cancel(&self, user: UserId) -> StepOutcome {
        if self.store.clear(user) {
            StepOutcome::Cancelled
        } else {
            StepOutcome::Idle
        }
    }

    /// Return to the previous step; at the first step this leaves the flow
    pub fn back(&self, user: UserId) -> StepOutcome {
        let Some(mut conversation) = self.store.get(user) else {
            return StepOutcome::Idle;
        };

        match conversation.step.previous() {
            Some(previous) => {
                conversation.context.rewind(&previous);
                self.enter(user, previous, conversation.context)
            }
            None => {
                self.store.clear(user);
                StepOutcome::Cancelled
            }
        }
    }

    /// Drop flows abandoned for longer than `max_idle`
    pub fn purge_idle(&self, max_idle: TimeDelta) -> usize {
        let purged = self.store.purge_idle(self.clock.now(), max_idle);
        if purged > 0 {
            debug!(purged, "Purged idle conversations");
        }
        purged
    }

    fn enter(&self, user: UserId, step: Step, context: FlowContext) -> StepOutcome {
        let prompt = self.prompt(user, &step);
        self.store.set(
            user,
            Conversation {
                step,
                context,
                last_activity: self.clock.now(),
            },
        );
        StepOutcome::Prompt(prompt)
    }

    fn prompt(&self, user: UserId, step: &Step) -> String {
        match step {
            Step::Search(selection) | Step::MyItems(selection) => match selection {
                SelectionStep::Subject => messages::select_subject(&self.ledger.subjects()),
                SelectionStep::Term => messages::select_term(self.config.terms),
                SelectionStep::Category => messages::select_category(),
            },
            Step::Submit(submit) => match submit {
                SubmitStep::Subject => messages::select_subject(&self.ledger.subjects()),
                SubmitStep::Term => messages::select_term(self.config.terms),
                SubmitStep::Category => messages::select_category(),
                SubmitStep::Name => messages::ENTER_NAME.to_string(),
                SubmitStep::Content => messages::SEND_CONTENT.to_string(),
                SubmitStep::Price => messages::ENTER_PRICE.to_string(),
            },
            Step::TopUp(TopUpStep::Amount) => messages::ENTER_TOPUP_AMOUNT.to_string(),
            Step::TopUp(TopUpStep::Proof) => messages::SEND_PROOF.to_string(),
            Step::Withdraw(WithdrawStep::Amount) => {
                messages::enter_withdraw_amount(self.ledger.get_balance(user))
            }
            Step::Withdraw(WithdrawStep::Details) => messages::ENTER_WITHDRAW_DETAILS.to_string(),
            Step::Feedback => messages::ENTER_FEEDBACK.to_string(),
            Step::AdminEdit {
                field: EditField::Name,
                ..
            } => messages::ENTER_NEW_NAME.to_string(),
            Step::AdminEdit {
                field: EditField::Price,
                ..
            } => messages::ENTER_NEW_PRICE.to_string(),
            Step::AdminCredit(CreditStep::User) => messages::ENTER_USER_ID.to_string(),
            Step::AdminCredit(CreditStep::Amount) => messages::ENTER_CREDIT_AMOUNT.to_string(),
            Step::Broadcast(BroadcastStep::Content) => messages::BROADCAST_CONTENT.to_string(),
            Step::Broadcast(BroadcastStep::Confirmation) => {
                messages::BROADCAST_CONFIRM.to_string()
            }
        }
    }

    fn accept(
        &self,
        user: UserId,
        step: Step,
        context: &mut FlowContext,
        input: &Input,
    ) -> MarketResult<Transition> {
        let transition = match step {
            Step::Search(selection) => match self.select(selection, context, input)? {
                Some(next) => Transition::Next(Step::Search(next)),
                None => Transition::Done(FlowAction::Search(filter_of(context))),
            },
            Step::MyItems(selection) => match self.select(selection, context, input)? {
                Some(next) => Transition::Next(Step::MyItems(next)),
                None => Transition::Done(FlowAction::MyItems(filter_of(context))),
            },
            Step::Submit(submit) => self.accept_submit(submit, context, input)?,
            Step::TopUp(TopUpStep::Amount) => {
                context.amount = Some(validation::parse_amount(text_of(input, "amount")?)?);
                Transition::Next(Step::TopUp(TopUpStep::Proof))
            }
            Step::TopUp(TopUpStep::Proof) => Transition::Done(FlowAction::TopUp {
                amount: required(context.amount, "amount")?,
                proof: validation::payload(input)?,
            }),
            Step::Withdraw(WithdrawStep::Amount) => {
                let amount = validation::parse_amount(text_of(input, "amount")?)?;
                let balance = self.ledger.get_balance(user);
                if amount > balance {
                    return Err(MarketError::validation(
                        "amount",
                        &format!("amount must be at most {}", balance),
                    ));
                }
                context.amount = Some(amount);
                Transition::Next(Step::Withdraw(WithdrawStep::Details))
            }
            Step::Withdraw(WithdrawStep::Details) => {
                let details = text_of(input, "details")?.trim();
                if details.is_empty() {
                    return Err(MarketError::validation("details", "details must not be empty"));
                }
                Transition::Done(FlowAction::Withdraw {
                    amount: required(context.amount, "amount")?,
                    details: details.to_string(),
                })
            }
            Step::Feedback => Transition::Done(FlowAction::Feedback(
                validation::validate_feedback(
                    text_of(input, "feedback")?,
                    self.config.feedback_limit,
                )?,
            )),
            Step::AdminEdit { item, field } => {
                let value = text_of(input, "value")?;
                let edit = match field {
                    EditField::Name => {
                        ItemEdit::Name(validation::validate_name(value, self.config.name_limit)?)
                    }
                    EditField::Price => ItemEdit::Price(validation::parse_price(value)?),
                };
                Transition::Done(FlowAction::Edit { item, edit })
            }
            Step::AdminCredit(CreditStep::User) => {
                context.target_user = Some(validation::parse_user_id(text_of(input, "user")?)?);
                Transition::Next(Step::AdminCredit(CreditStep::Amount))
            }
            Step::AdminCredit(CreditStep::Amount) => Transition::Done(FlowAction::Credit {
                target: required(context.target_user, "user")?,
                amount: validation::parse_amount(text_of(input, "amount")?)?,
            }),
            Step::Broadcast(BroadcastStep::Content) => {
                context.payload = Some(validation::payload(input)?);
                Transition::Next(Step::Broadcast(BroadcastStep::Confirmation))
            }
            Step::Broadcast(BroadcastStep::Confirmation) => match input {
                Input::Command(Command::Confirm(true)) => Transition::Done(FlowAction::Broadcast(
                    required(context.payload.take(), "broadcast content")?,
                )),
                Input::Command(Command::Confirm(false)) => Transition::Abort,
                _ => {
                    return Err(MarketError::validation(
                        "confirmation",
                        "answer confirm:yes or confirm:no",
                    ))
                }
            },
        };

        Ok(transition)
    }

    fn accept_submit(
        &self,
        step: SubmitStep,
        context: &mut FlowContext,
        input: &Input,
    ) -> MarketResult<Transition> {
        let next = match step {
            SubmitStep::Subject => {
                context.subject = Some(self.subject_of(input)?);
                SubmitStep::Term
            }
            SubmitStep::Term => {
                context.term = Some(self.term_of(input)?);
                SubmitStep::Category
            }
            SubmitStep::Category => {
                context.category = Some(category_of(input)?);
                SubmitStep::Name
            }
            SubmitStep::Name => {
                context.name = Some(validation::validate_name(
                    text_of(input, "name")?,
                    self.config.name_limit,
                )?);
                SubmitStep::Content
            }
            SubmitStep::Content => {
                context.content = Some(validation::item_content(input, &self.config)?);
                SubmitStep::Price
            }
            SubmitStep::Price => {
                let price = validation::parse_price(text_of(input, "price")?)?;
                return Ok(Transition::Done(FlowAction::Submit(SubmissionForm {
                    subject: required(context.subject.take(), "subject")?,
                    term: required(context.term, "term")?,
                    category: required(context.category, "category")?,
                    name: required(context.name.take(), "name")?,
                    content: required(context.content.take(), "content")?,
                    price,
                })));
            }
        };
        Ok(Transition::Next(Step::Submit(next)))
    }

    /// Shared subject -> term -> category selection; `None` once complete
    fn select(
        &self,
        step: SelectionStep,
        context: &mut FlowContext,
        input: &Input,
    ) -> MarketResult<Option<SelectionStep>> {
        match step {
            SelectionStep::Subject => {
                context.subject = Some(self.subject_of(input)?);
                Ok(Some(SelectionStep::Term))
            }
            SelectionStep::Term => {
                context.term = Some(self.term_of(input)?);
                Ok(Some(SelectionStep::Category))
            }
            SelectionStep::Category => {
                context.category = Some(category_of(input)?);
                Ok(None)
            }
        }
    }

    /// Subject selection, checked against the subjects registered right now
    fn subject_of(&self, input: &Input) -> MarketResult<String> {
        let chosen = match input {
            Input::Command(Command::Subject(name)) => name.as_str(),
            Input::Text(text) => text.trim(),
            _ => return Err(MarketError::validation("subject", "choose a subject")),
        };

        self.ledger
            .subjects()
            .into_iter()
            .find(|subject| subject == chosen)
            .ok_or_else(|| {
                MarketError::validation("subject", &format!("unknown subject '{}'", chosen))
            })
    }

    fn term_of(&self, input: &Input) -> MarketResult<Term> {
        let term = match input {
            Input::Command(Command::Term(term)) => *term,
            Input::Text(text) => text.trim().parse::<Term>().map_err(|_| {
                MarketError::validation("term", "term must be a number")
            })?,
            _ => return Err(MarketError::validation("term", "choose a term")),
        };
        validation::validate_term(term, self.config.terms)
    }
}

fn category_of(input: &Input) -> MarketResult<Category> {
    match input {
        Input::Command(Command::Category(category)) => Ok(*category),
        Input::Text(text) => text.parse(),
        _ => Err(MarketError::validation("category", "choose a category")),
    }
}

fn text_of<'a>(input: &'a Input, field: &str) -> MarketResult<&'a str> {
    match input {
        Input::Text(text) => Ok(text.as_str()),
        _ => Err(MarketError::validation(field, "please answer with text")),
    }
}

fn filter_of(context: &FlowContext) -> CatalogFilter {
    CatalogFilter::new(context.subject.clone(), context.term, context.category)
}

/// Value a previous step must have collected
fn required<T>(value: Option<T>, what: &str) -> MarketResult<T> {
    value.ok_or_else(|| MarketError::storage(format!("conversation lost its {}", what)))
}
