//! User-facing message texts
//!
//! Every string the core sends through the chat transport is built here, so
//! handlers deal in values and wording changes stay in one place.

use rust_decimal::Decimal;

use crate::types::{
    BalanceRequest, Category, Decision, Feedback, Item, MarketError, OwnedItem, RequestKind,
    RequestStatus, Term, User, UserId,
};

pub const WELCOME: &str = "Welcome to the study market! Search the catalog, submit your own \
    cheatsheets and manage your balance from the menu.";
pub const HELP: &str = "menu:search - browse the catalog\n\
    menu:submit - submit a cheatsheet for review\n\
    menu:my_items - items you wrote or bought\n\
    menu:balance - show your balance\n\
    menu:topup / menu:withdraw - request a balance change\n\
    menu:feedback - write to the admins\n\
    cancel - leave the current step";

pub const ENTER_NAME: &str = "Enter the cheatsheet name (1-100 characters):";
pub const SEND_CONTENT: &str =
    "Send the content: a photo, a PDF/JPG/PNG document, or plain text.";
pub const ENTER_PRICE: &str = "Enter your price (0 or more):";
pub const ENTER_TOPUP_AMOUNT: &str = "Enter the amount to top up:";
pub const SEND_PROOF: &str = "Send the payment proof: a screenshot, a document or a text reference.";
pub const ENTER_WITHDRAW_DETAILS: &str = "Enter the payout details:";
pub const EMPTY_BALANCE: &str = "Your balance is empty, there is nothing to withdraw.";
pub const ENTER_FEEDBACK: &str = "Write your feedback (up to 1000 characters):";
pub const FEEDBACK_SENT: &str = "Thank you! Your feedback was sent to the admins.";
pub const ENTER_USER_ID: &str = "Enter the user id to credit:";
pub const ENTER_CREDIT_AMOUNT: &str = "Enter the amount to credit:";
pub const BROADCAST_CONTENT: &str = "Send the broadcast content: text, a photo or a document.";
pub const BROADCAST_CONFIRM: &str = "Send this to every user? (confirm:yes / confirm:no)";
pub const CANCELLED: &str = "Cancelled.";
pub const NOTHING_FOUND: &str = "Nothing found.";
pub const NO_ACTIVE_FLOW: &str = "Choose an action from the menu.";
pub const ENTER_NEW_NAME: &str = "Enter the new name:";
pub const ENTER_NEW_PRICE: &str = "Enter the new catalog price:";

pub fn select_subject(subjects: &[String]) -> String {
    if subjects.is_empty() {
        return "No subjects yet. Ask an admin to add one.".to_string();
    }
    format!("Choose a subject: {}", subjects.join(", "))
}

pub fn select_term(terms: Term) -> String {
    format!("Choose a term (1-{}):", terms)
}

pub fn select_category() -> String {
    let names: Vec<&str> = Category::ALL.iter().map(|c| c.as_str()).collect();
    format!("Choose a category: {}", names.join(", "))
}

pub fn reprompt(error: &MarketError, prompt: &str) -> String {
    format!("{}\n{}", user_error(error), prompt)
}

pub fn submitted(price: Decimal) -> String {
    format!(
        "Your cheatsheet was sent for review. Catalog price: {}",
        price
    )
}

pub fn catalog(items: &[Item], viewer: UserId) -> String {
    if items.is_empty() {
        return NOTHING_FOUND.to_string();
    }

    items
        .iter()
        .map(|item| {
            let mut line = format!("#{} {} - {} (open:{})", item.id, item.name, item.price, item.id);
            if item.author == viewer && !item.is_approved() {
                line.push_str(" [pending review]");
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn owned(items: &[OwnedItem]) -> String {
    if items.is_empty() {
        return NOTHING_FOUND.to_string();
    }

    items
        .iter()
        .map(|owned| {
            let origin = if owned.purchased {
                "bought"
            } else if owned.item.is_approved() {
                "yours"
            } else {
                "yours, pending review"
            };
            format!(
                "#{} {} ({}) (open:{})",
                owned.item.id, owned.item.name, origin, owned.item.id
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn item_offer(item: &Item) -> String {
    format!(
        "{}\nSubject: {}, term {}, {}\nPrice: {} (buy:{})",
        item.name, item.subject, item.term, item.category, item.price, item.id
    )
}

pub fn item_caption(item: &Item) -> String {
    format!("{} ({}, term {}, {})", item.name, item.subject, item.term, item.category)
}

pub fn purchased(item: &Item, balance: Decimal) -> String {
    format!(
        "You bought \"{}\" for {}. Balance: {}",
        item.name, item.price, balance
    )
}

pub fn balance(balance: Decimal) -> String {
    format!("Your balance: {}", balance)
}

pub fn enter_withdraw_amount(balance: Decimal) -> String {
    format!("Enter the amount to withdraw (at most {}):", balance)
}

pub fn request_filed(request: &BalanceRequest) -> String {
    match request.kind {
        RequestKind::TopUp => format!(
            "Top-up request #{} for {} sent to the admins.",
            request.id, request.amount
        ),
        RequestKind::Withdraw => format!(
            "Withdraw request #{} for {} sent to the admins.",
            request.id, request.amount
        ),
    }
}

pub fn credited(target: UserId, amount: Decimal, balance: Decimal) -> String {
    format!("Credited {} to user {}. New balance: {}", amount, target, balance)
}

pub fn broadcast_done(sent: usize, total: usize) -> String {
    format!("Broadcast delivered to {} of {} users.", sent, total)
}

pub fn item_edited(item: &Item) -> String {
    format!("Item #{} updated: {} - {}", item.id, item.name, item.price)
}

pub fn moderated(item: &Item, decision: Decision) -> String {
    match decision {
        Decision::Approve => format!("Item #{} \"{}\" approved.", item.id, item.name),
        Decision::Reject => format!("Item #{} \"{}\" rejected and removed.", item.id, item.name),
    }
}

pub fn request_decided(request: &BalanceRequest) -> String {
    format!(
        "{} request #{} for {} from user {}: {}.",
        capitalize(request.kind.as_str()),
        request.id,
        request.amount,
        request.user,
        request.status
    )
}

pub fn feedback_decided(feedback: &Feedback) -> String {
    format!("Feedback #{}: {}.", feedback.id, feedback.status)
}

// ---- notifications ----

pub fn item_approved(item: &Item) -> String {
    format!("Your cheatsheet \"{}\" was approved and is now in the catalog.", item.name)
}

pub fn item_rejected(item: &Item) -> String {
    format!("Your cheatsheet \"{}\" was rejected.", item.name)
}

pub fn request_resolved(request: &BalanceRequest, balance: Decimal) -> String {
    let what = match request.kind {
        RequestKind::TopUp => "top-up",
        RequestKind::Withdraw => "withdraw",
    };
    match request.status {
        RequestStatus::Approved => format!(
            "Your {} request #{} for {} was approved. Balance: {}",
            what, request.id, request.amount, balance
        ),
        _ => format!(
            "Your {} request #{} for {} was rejected.",
            what, request.id, request.amount
        ),
    }
}

pub fn feedback_resolved(feedback: &Feedback) -> String {
    match feedback.status {
        RequestStatus::Approved => "Your feedback was accepted. Thank you!".to_string(),
        _ => "Your feedback was reviewed and declined.".to_string(),
    }
}

pub fn credit_received(amount: Decimal, balance: Decimal) -> String {
    format!("An admin credited {} to your balance. Balance: {}", amount, balance)
}

pub fn admin_new_item(item: &Item, author: &User, entered: Decimal, percent: Decimal) -> String {
    format!(
        "New cheatsheet #{} from {} ({})\n{}: term {}, {}\n\"{}\"\nEntered price: {}, \
         catalog price: {} (+{}%)\nitem:approve:{} | item:reject:{} | item:edit_name:{} | item:edit_price:{}",
        item.id,
        author.display_name,
        author.id,
        item.subject,
        item.term,
        item.category,
        item.name,
        entered,
        item.price,
        percent,
        item.id,
        item.id,
        item.id,
        item.id
    )
}

pub fn admin_new_request(request: &BalanceRequest, author: &User) -> String {
    let kind = request.kind.as_str();
    format!(
        "New {} request #{} from {} ({}): {}\n{}:{}:{} | {}:{}:{}",
        kind,
        request.id,
        author.display_name,
        author.id,
        request.amount,
        kind,
        Decision::Approve,
        request.id,
        kind,
        Decision::Reject,
        request.id
    )
}

pub fn admin_new_feedback(feedback: &Feedback, author: &User) -> String {
    format!(
        "Feedback #{} from {} ({}):\n{}\nfeedback:approve:{} | feedback:reject:{}",
        feedback.id, author.display_name, author.id, feedback.message, feedback.id, feedback.id
    )
}

/// Message shown to a user when an operation fails
///
/// Storage failures are reported generically; the details only go to the log.
pub fn user_error(error: &MarketError) -> String {
    match error {
        MarketError::Validation { message, .. } => format!("{}. Please try again.", message),
        MarketError::NotFound { entity, .. } => format!("That {} was not found.", entity),
        MarketError::AlreadyResolved { entity, id } => {
            format!("{} #{} has already been handled.", capitalize(entity), id)
        }
        MarketError::InsufficientFunds {
            balance, required, ..
        } => format!(
            "Not enough funds: your balance is {}, {} is required.",
            balance, required
        ),
        MarketError::Unauthorized { .. } => "This action is for admins only.".to_string(),
        MarketError::DuplicatePurchase { .. } => "You already own this item.".to_string(),
        _ => "Something went wrong. No money was moved; please try again later.".to_string(),
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
