//! Conversation state types
//!
//! A conversation is a tagged step plus the context collected so far. Each
//! flow's steps are an explicit enum, so a flow can only be in a step it
//! actually has.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::core::validation::{RawContent, RawPayload};
use crate::types::{Category, EditField, ItemId, Term, UserId};

/// Flows a user can start from the menu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Search,
    MyItems,
    Submit,
    TopUp,
    Withdraw,
    Feedback,
    AdminCredit,
    Broadcast,
}

impl Flow {
    pub fn requires_admin(&self) -> bool {
        matches!(self, Flow::AdminCredit | Flow::Broadcast)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Flow::Search => "search",
            Flow::MyItems => "my_items",
            Flow::Submit => "submit",
            Flow::TopUp => "topup",
            Flow::Withdraw => "withdraw",
            Flow::Feedback => "feedback",
            Flow::AdminCredit => "admin_credit",
            Flow::Broadcast => "broadcast",
        }
    }
}

/// Subject, term and category selection shared by search and my-items
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionStep {
    Subject,
    Term,
    Category,
}

impl SelectionStep {
    fn previous(&self) -> Option<Self> {
        match self {
            SelectionStep::Subject => None,
            SelectionStep::Term => Some(SelectionStep::Subject),
            SelectionStep::Category => Some(SelectionStep::Term),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitStep {
    Subject,
    Term,
    Category,
    Name,
    Content,
    Price,
}

impl SubmitStep {
    fn previous(&self) -> Option<Self> {
        match self {
            SubmitStep::Subject => None,
            SubmitStep::Term => Some(SubmitStep::Subject),
            SubmitStep::Category => Some(SubmitStep::Term),
            SubmitStep::Name => Some(SubmitStep::Category),
            SubmitStep::Content => Some(SubmitStep::Name),
            SubmitStep::Price => Some(SubmitStep::Content),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopUpStep {
    Amount,
    Proof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WithdrawStep {
    Amount,
    Details,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditStep {
    User,
    Amount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastStep {
    Content,
    Confirmation,
}

/// Current step of a user's active flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Search(SelectionStep),
    MyItems(SelectionStep),
    Submit(SubmitStep),
    TopUp(TopUpStep),
    Withdraw(WithdrawStep),
    Feedback,
    AdminEdit { item: ItemId, field: EditField },
    AdminCredit(CreditStep),
    Broadcast(BroadcastStep),
}

impl Step {
    /// First step of a flow
    pub fn first(flow: Flow) -> Self {
        match flow {
            Flow::Search => Step::Search(SelectionStep::Subject),
            Flow::MyItems => Step::MyItems(SelectionStep::Subject),
            Flow::Submit => Step::Submit(SubmitStep::Subject),
            Flow::TopUp => Step::TopUp(TopUpStep::Amount),
            Flow::Withdraw => Step::Withdraw(WithdrawStep::Amount),
            Flow::Feedback => Step::Feedback,
            Flow::AdminCredit => Step::AdminCredit(CreditStep::User),
            Flow::Broadcast => Step::Broadcast(BroadcastStep::Content),
        }
    }

    /// Step that `back` returns to, `None` at the start of a flow
    pub fn previous(&self) -> Option<Step> {
        match self {
            Step::Search(step) => step.previous().map(Step::Search),
            Step::MyItems(step) => step.previous().map(Step::MyItems),
            Step::Submit(step) => step.previous().map(Step::Submit),
            Step::TopUp(TopUpStep::Proof) => Some(Step::TopUp(TopUpStep::Amount)),
            Step::Withdraw(WithdrawStep::Details) => Some(Step::Withdraw(WithdrawStep::Amount)),
            Step::AdminCredit(CreditStep::Amount) => Some(Step::AdminCredit(CreditStep::User)),
            Step::Broadcast(BroadcastStep::Confirmation) => {
                Some(Step::Broadcast(BroadcastStep::Content))
            }
            _ => None,
        }
    }
}

/// Values collected by the steps of the active flow
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlowContext {
    pub subject: Option<String>,
    pub term: Option<Term>,
    pub category: Option<Category>,
    pub name: Option<String>,
    pub content: Option<RawContent>,
    pub amount: Option<Decimal>,
    pub payload: Option<RawPayload>,
    pub target_user: Option<UserId>,
}

impl FlowContext {
    /// Forget everything collected at `step` and after it
    pub fn rewind(&mut self, step: &Step) {
        match step {
            Step::Search(selection) | Step::MyItems(selection) => match selection {
                SelectionStep::Subject => *self = FlowContext::default(),
                SelectionStep::Term => {
                    self.term = None;
                    self.category = None;
                }
                SelectionStep::Category => self.category = None,
            },
            Step::Submit(submit) => {
                let rank = *submit as u8;
                if rank <= SubmitStep::Subject as u8 {
                    self.subject = None;
                }
                if rank <= SubmitStep::Term as u8 {
                    self.term = None;
                }
                if rank <= SubmitStep::Category as u8 {
                    self.category = None;
                }
                if rank <= SubmitStep::Name as u8 {
                    self.name = None;
                }
                if rank <= SubmitStep::Content as u8 {
                    self.content = None;
                }
            }
            Step::TopUp(TopUpStep::Amount) | Step::Withdraw(WithdrawStep::Amount) => {
                self.amount = None;
                self.payload = None;
            }
            Step::AdminCredit(CreditStep::User) => {
                self.target_user = None;
                self.amount = None;
            }
            Step::Broadcast(BroadcastStep::Content) => self.payload = None,
            _ => {}
        }
    }
}

/// A user's active flow
#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    pub step: Step,
    pub context: FlowContext,
    pub last_activity: DateTime<Utc>,
}

impl Conversation {
    pub fn new(step: Step, now: DateTime<Utc>) -> Self {
        Self {
            step,
            context: FlowContext::default(),
            last_activity: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Step::Search(SelectionStep::Subject), None)]
    #[case(Step::Search(SelectionStep::Category), Some(Step::Search(SelectionStep::Term)))]
    #[case(Step::Submit(SubmitStep::Price), Some(Step::Submit(SubmitStep::Content)))]
    #[case(Step::TopUp(TopUpStep::Proof), Some(Step::TopUp(TopUpStep::Amount)))]
    #[case(Step::Feedback, None)]
    #[case(Step::AdminEdit { item: 1, field: EditField::Name }, None)]
    fn test_previous_step(#[case] step: Step, #[case] expected: Option<Step>) {
        assert_eq!(step.previous(), expected);
    }

    #[test]
    fn test_rewind_discards_later_selections() {
        let mut context = FlowContext {
            subject: Some("Math".to_string()),
            term: Some(2),
            category: Some(Category::Theory),
            name: Some("Limits".to_string()),
            ..FlowContext::default()
        };

        context.rewind(&Step::Submit(SubmitStep::Term));

        assert_eq!(context.subject.as_deref(), Some("Math"));
        assert_eq!(context.term, None);
        assert_eq!(context.category, None);
        assert_eq!(context.name, None);
    }

    #[test]
    fn test_rewind_to_first_step_clears_everything() {
        let mut context = FlowContext {
            subject: Some("Math".to_string()),
            term: Some(2),
            ..FlowContext::default()
        };

        context.rewind(&Step::Search(SelectionStep::Subject));

        assert_eq!(context, FlowContext::default());
    }

    #[test]
    fn test_admin_flows() {
        assert!(Flow::Broadcast.requires_admin());
        assert!(Flow::AdminCredit.requires_admin());
        assert!(!Flow::Withdraw.requires_admin());
    }
}
