//! Error types for the study marketplace
//!
//! This module defines all error types that can occur while handling chat
//! events, moderating items and moving balances.
//!
//! # Error Categories
//!
//! - **Validation Errors**: bad user input, answered with a re-prompt
//! - **Lookup Errors**: missing items, requests or feedback; races on resolution
//! - **Ledger Errors**: insufficient funds, failed multi-step mutations, storage faults
//! - **Delivery Errors**: best-effort notifications that never affect money
//! - **Replay Errors**: reading the CSV event log

use super::item::ItemId;
use super::user::UserId;
use rust_decimal::Decimal;
use thiserror::Error;

/// Result alias used across the crate
pub type MarketResult<T> = Result<T, MarketError>;

/// Main error type for the marketplace
///
/// Each variant carries enough context to produce a user-facing message
/// and a useful log line.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MarketError {
    /// User input failed a step's validation rule
    ///
    /// Handled at the conversation step: the user is re-prompted and the
    /// flow keeps its state.
    #[error("Invalid {field}: {message}")]
    Validation {
        /// Which input was rejected
        field: String,
        /// Human readable reason
        message: String,
    },

    /// Referenced entity does not exist (or is not visible to the caller)
    #[error("{entity} {id} not found")]
    NotFound {
        /// Entity kind ("item", "request", "feedback", "user")
        entity: String,
        /// Identifier as given
        id: String,
    },

    /// Entity was already resolved by someone else
    ///
    /// Surfaced to the admin; never retried.
    #[error("{entity} {id} is already resolved")]
    AlreadyResolved {
        /// Entity kind
        entity: String,
        /// Identifier
        id: u64,
    },

    /// Balance does not cover the operation; nothing was mutated
    #[error("Insufficient funds for user {user}: balance {balance}, required {required}")]
    InsufficientFunds {
        /// User ID
        user: UserId,
        /// Current balance
        balance: Decimal,
        /// Amount the operation needs
        required: Decimal,
    },

    /// A multi-step ledger mutation failed
    ///
    /// By the time this is returned any compensation has already run.
    #[error("Transaction failed during {operation} for user {user}: {message}")]
    TransactionFailed {
        /// Operation that failed
        operation: String,
        /// User whose balance was involved
        user: UserId,
        /// Underlying cause
        message: String,
    },

    /// Best-effort delivery or notification failed
    #[error("Delivery to user {user} failed: {message}")]
    DeliveryFailed {
        /// Recipient
        user: UserId,
        /// Transport error
        message: String,
    },

    /// Admin-only action attempted by a regular user
    #[error("User {user} is not allowed to {action}")]
    Unauthorized {
        /// Caller
        user: UserId,
        /// Attempted action
        action: String,
    },

    /// `(user, item)` purchase pair already exists
    #[error("User {user} already purchased item {item}")]
    DuplicatePurchase {
        /// Buyer
        user: UserId,
        /// Item
        item: ItemId,
    },

    /// Storage-level failure reported by the ledger store
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the failure
        message: String,
    },

    /// Checked decimal arithmetic would overflow
    #[error("Arithmetic overflow in {operation} for user {user}")]
    ArithmeticOverflow {
        /// Operation that would overflow
        operation: String,
        /// User ID
        user: UserId,
    },

    /// I/O error while reading the event log or writing output
    #[error("I/O error: {message}")]
    IoError {
        /// Description of the I/O error
        message: String,
    },

    /// Malformed record in the event log
    #[error("CSV parse error{}: {message}", line.map(|l| format!(" at line {}", l)).unwrap_or_default())]
    ParseError {
        /// Line number where the error occurred (if available)
        line: Option<u64>,
        /// Description of the parsing error
        message: String,
    },
}

impl From<std::io::Error> for MarketError {
    fn from(error: std::io::Error) -> Self {
        MarketError::IoError {
            message: error.to_string(),
        }
    }
}

impl From<csv::Error> for MarketError {
    fn from(error: csv::Error) -> Self {
        let line = error.position().map(|pos| pos.line());

        MarketError::ParseError {
            line,
            message: error.to_string(),
        }
    }
}

// Helper functions for creating common errors

impl MarketError {
    /// Create a Validation error
    pub fn validation(field: &str, message: &str) -> Self {
        MarketError::Validation {
            field: field.to_string(),
            message: message.to_string(),
        }
    }

    /// Create a Validation error for undecodable callback data
    pub fn invalid_command(data: &str) -> Self {
        MarketError::validation("command", &format!("unrecognised action '{}'", data))
    }

    /// Create a NotFound error
    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        MarketError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    /// Create an AlreadyResolved error
    pub fn already_resolved(entity: &str, id: u64) -> Self {
        MarketError::AlreadyResolved {
            entity: entity.to_string(),
            id,
        }
    }

    /// Create an InsufficientFunds error
    pub fn insufficient_funds(user: UserId, balance: Decimal, required: Decimal) -> Self {
        MarketError::InsufficientFunds {
            user,
            balance,
            required,
        }
    }

    /// Create a TransactionFailed error
    pub fn transaction_failed(operation: &str, user: UserId, message: impl ToString) -> Self {
        MarketError::TransactionFailed {
            operation: operation.to_string(),
            user,
            message: message.to_string(),
        }
    }

    /// Create a DeliveryFailed error
    pub fn delivery_failed(user: UserId, message: impl ToString) -> Self {
        MarketError::DeliveryFailed {
            user,
            message: message.to_string(),
        }
    }

    /// Create an Unauthorized error
    pub fn unauthorized(user: UserId, action: &str) -> Self {
        MarketError::Unauthorized {
            user,
            action: action.to_string(),
        }
    }

    /// Create a Storage error
    pub fn storage(message: impl ToString) -> Self {
        MarketError::Storage {
            message: message.to_string(),
        }
    }

    /// Create an ArithmeticOverflow error
    pub fn parse_error(line: Option<u64>, message: impl ToString) -> Self {
        MarketError::ParseError {
            line,
            message: message.to_string(),
        }
    }

    pub fn arithmetic_overflow(operation: &str, user: UserId) -> Self {
        MarketError::ArithmeticOverflow {
            operation: operation.to_string(),
            user,
        }
    }

    /// Whether the flow that produced this error may continue
    ///
    /// Only validation errors keep the conversation alive; everything else
    /// ends the current flow.
    pub fn is_user_recoverable(&self) -> bool {
        matches!(self, MarketError::Validation { .. })
    }
}
