//! Typed inbound actions
//!
//! Callback data arriving from the chat transport is decoded exactly once,
//! here, into a [`Command`]. Handlers only ever see structured values.
//!
//! # Wire format
//!
//! ```text
//! menu:<action>                  start a menu action (search, submit, ...)
//! cancel | back                  flow navigation
//! subject:<name>                 selection steps
//! term:<n>
//! category:<formulas|theory>
//! open:<item> | buy:<item>       catalog actions
//! item:<approve|reject>:<item>   moderation
//! item:<edit_name|edit_price>:<item>
//! <topup|withdraw>:<approve|reject>:<request>
//! feedback:<approve|reject>:<feedback>
//! confirm:<yes|no>
//! ```

use super::error::MarketError;
use super::item::{Category, ItemId, Term};
use super::request::{Decision, FeedbackId, RequestId, RequestKind};
use super::user::UserId;
use std::fmt;
use std::str::FromStr;

/// Main-menu entries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    Start,
    Help,
    Search,
    Submit,
    MyItems,
    Balance,
    TopUp,
    Withdraw,
    Feedback,
    /// Admin: credit a user directly
    AddBalance,
    /// Admin: send a message to every user
    Broadcast,
}

impl MenuAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            MenuAction::Start => "start",
            MenuAction::Help => "help",
            MenuAction::Search => "search",
            MenuAction::Submit => "submit",
            MenuAction::MyItems => "my_items",
            MenuAction::Balance => "balance",
            MenuAction::TopUp => "topup",
            MenuAction::Withdraw => "withdraw",
            MenuAction::Feedback => "feedback",
            MenuAction::AddBalance => "add_balance",
            MenuAction::Broadcast => "broadcast",
        }
    }
}

impl FromStr for MenuAction {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let action = match s {
            "start" => MenuAction::Start,
            "help" => MenuAction::Help,
            "search" => MenuAction::Search,
            "submit" => MenuAction::Submit,
            "my_items" => MenuAction::MyItems,
            "balance" => MenuAction::Balance,
            "topup" => MenuAction::TopUp,
            "withdraw" => MenuAction::Withdraw,
            "feedback" => MenuAction::Feedback,
            "add_balance" => MenuAction::AddBalance,
            "broadcast" => MenuAction::Broadcast,
            other => return Err(MarketError::invalid_command(other)),
        };
        Ok(action)
    }
}

/// Item field an admin may correct in place
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditField {
    Name,
    Price,
}

/// A decoded inbound command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Menu(MenuAction),
    Cancel,
    Back,
    Subject(String),
    Term(Term),
    Category(Category),
    Open(ItemId),
    Buy(ItemId),
    Moderate {
        item: ItemId,
        decision: Decision,
    },
    Edit {
        item: ItemId,
        field: EditField,
    },
    Resolve {
        kind: RequestKind,
        request: RequestId,
        decision: Decision,
    },
    ResolveFeedback {
        feedback: FeedbackId,
        decision: Decision,
    },
    Confirm(bool),
}

fn parse_id<T: FromStr>(raw: &str, data: &str) -> Result<T, MarketError> {
    raw.parse::<T>()
        .map_err(|_| MarketError::invalid_command(data))
}

impl FromStr for Command {
    type Err = MarketError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let data = data.trim();
        let parts: Vec<&str> = data.split(':').collect();

        let command = match parts.as_slice() {
            ["cancel"] => Command::Cancel,
            ["back"] => Command::Back,
            ["menu", action] => Command::Menu(action.parse()?),
            // Subject names may themselves contain ':'
            ["subject", _, ..] => match data.strip_prefix("subject:").map(str::trim) {
                Some(name) if !name.is_empty() => Command::Subject(name.to_string()),
                _ => return Err(MarketError::invalid_command(data)),
            },
            ["term", term] => Command::Term(parse_id(term, data)?),
            ["category", category] => Command::Category(category.parse()?),
            ["open", item] => Command::Open(parse_id(item, data)?),
            ["buy", item] => Command::Buy(parse_id(item, data)?),
            ["item", "edit_name", item] => Command::Edit {
                item: parse_id(item, data)?,
                field: EditField::Name,
            },
            ["item", "edit_price", item] => Command::Edit {
                item: parse_id(item, data)?,
                field: EditField::Price,
            },
            ["item", decision, item] => Command::Moderate {
                item: parse_id(item, data)?,
                decision: decision.parse()?,
            },
            ["topup", decision, request] => Command::Resolve {
                kind: RequestKind::TopUp,
                request: parse_id(request, data)?,
                decision: decision.parse()?,
            },
            ["withdraw", decision, request] => Command::Resolve {
                kind: RequestKind::Withdraw,
                request: parse_id(request, data)?,
                decision: decision.parse()?,
            },
            ["feedback", decision, feedback] => Command::ResolveFeedback {
                feedback: parse_id(feedback, data)?,
                decision: decision.parse()?,
            },
            ["confirm", "yes"] => Command::Confirm(true),
            ["confirm", "no"] => Command::Confirm(false),
            _ => return Err(MarketError::invalid_command(data)),
        };

        Ok(command)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Menu(action) => write!(f, "menu:{}", action.as_str()),
            Command::Cancel => f.write_str("cancel"),
            Command::Back => f.write_str("back"),
            Command::Subject(name) => write!(f, "subject:{}", name),
            Command::Term(term) => write!(f, "term:{}", term),
            Command::Category(category) => write!(f, "category:{}", category),
            Command::Open(item) => write!(f, "open:{}", item),
            Command::Buy(item) => write!(f, "buy:{}", item),
            Command::Moderate { item, decision } => write!(f, "item:{}:{}", decision, item),
            Command::Edit { item, field } => match field {
                EditField::Name => write!(f, "item:edit_name:{}", item),
                EditField::Price => write!(f, "item:edit_price:{}", item),
            },
            Command::Resolve {
                kind,
                request,
                decision,
            } => write!(f, "{}:{}:{}", kind, decision, request),
            Command::ResolveFeedback { feedback, decision } => {
                write!(f, "feedback:{}:{}", decision, feedback)
            }
            Command::Confirm(true) => f.write_str("confirm:yes"),
            Command::Confirm(false) => f.write_str("confirm:no"),
        }
    }
}

/// Payload of an inbound chat event
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    /// Free text typed by the user
    Text(String),
    /// A photo upload
    Photo { data: Vec<u8> },
    /// A document upload
    Document { file_name: String, data: Vec<u8> },
    /// A menu selection or button press
    Command(Command),
}

impl Input {
    /// Short label used in logs
    pub fn label(&self) -> &'static str {
        match self {
            Input::Text(_) => "text",
            Input::Photo { .. } => "photo",
            Input::Document { .. } => "document",
            Input::Command(_) => "command",
        }
    }
}

/// One inbound chat event
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    pub user: UserId,
    pub display_name: Option<String>,
    pub input: Input,
}

impl InboundEvent {
    pub fn new(user: UserId, input: Input) -> Self {
        Self {
            user,
            display_name: None,
            input,
        }
    }

    pub fn text(user: UserId, text: impl Into<String>) -> Self {
        Self::new(user, Input::Text(text.into()))
    }

    pub fn command(user: UserId, command: Command) -> Self {
        Self::new(user, Input::Command(command))
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::menu("menu:search", Command::Menu(MenuAction::Search))]
    #[case::cancel("cancel", Command::Cancel)]
    #[case::back(" back ", Command::Back)]
    #[case::subject("subject:Math", Command::Subject("Math".into()))]
    #[case::subject_with_colon("subject:C++: basics", Command::Subject("C++: basics".into()))]
    #[case::term("term:3", Command::Term(3))]
    #[case::category("category:theory", Command::Category(Category::Theory))]
    #[case::buy("buy:12", Command::Buy(12))]
    #[case::open("open:4", Command::Open(4))]
    #[case::approve_item("item:approve:7", Command::Moderate { item: 7, decision: Decision::Approve })]
    #[case::reject_item("item:reject:7", Command::Moderate { item: 7, decision: Decision::Reject })]
    #[case::edit_name("item:edit_name:7", Command::Edit { item: 7, field: EditField::Name })]
    #[case::edit_price("item:edit_price:7", Command::Edit { item: 7, field: EditField::Price })]
    #[case::topup(
        "topup:approve:5",
        Command::Resolve { kind: RequestKind::TopUp, request: 5, decision: Decision::Approve }
    )]
    #[case::withdraw(
        "withdraw:reject:9",
        Command::Resolve { kind: RequestKind::Withdraw, request: 9, decision: Decision::Reject }
    )]
    #[case::feedback(
        "feedback:approve:2",
        Command::ResolveFeedback { feedback: 2, decision: Decision::Approve }
    )]
    #[case::confirm_yes("confirm:yes", Command::Confirm(true))]
    #[case::confirm_no("confirm:no", Command::Confirm(false))]
    fn test_command_parsing(#[case] data: &str, #[case] expected: Command) {
        assert_eq!(data.parse::<Command>().unwrap(), expected);
    }

    #[rstest]
    #[case::empty("")]
    #[case::unknown_menu("menu:dance")]
    #[case::bad_item_id("buy:abc")]
    #[case::negative_item_id("buy:-1")]
    #[case::missing_id("item:approve")]
    #[case::bad_decision("topup:maybe:1")]
    #[case::empty_subject("subject:")]
    #[case::bare_subject("subject")]
    #[case::blank_subject("subject:   ")]
    #[case::term_overflow("term:300")]
    #[case::unknown_prefix("balance_approve_1")]
    fn test_command_parsing_errors(#[case] data: &str) {
        let result = data.parse::<Command>();
        assert!(
            matches!(result, Err(MarketError::Validation { .. })),
            "expected validation error for {:?}, got {:?}",
            data,
            result
        );
    }

    #[rstest]
    #[case("menu:my_items")]
    #[case("item:edit_price:3")]
    #[case("withdraw:approve:11")]
    #[case("subject:Physics")]
    fn test_command_display_matches_wire_format(#[case] data: &str) {
        let command: Command = data.parse().unwrap();
        assert_eq!(command.to_string(), data);
    }

    #[test]
    fn test_inbound_event_builders() {
        let event = InboundEvent::text(3, "hello").with_name("bob");

        assert_eq!(event.user, 3);
        assert_eq!(event.display_name.as_deref(), Some("bob"));
        assert_eq!(event.input, Input::Text("hello".to_string()));
        assert_eq!(event.input.label(), "text");
    }
}
