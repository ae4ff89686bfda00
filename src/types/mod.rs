//! Types module
//!
//! Contains core data structures used throughout the marketplace.
//! This module organizes types into logical submodules:
//! - `user`: User accounts and balances
//! - `item`: Catalog items, content references and purchases
//! - `request`: Balance/withdraw requests and feedback
//! - `command`: Typed inbound actions decoded at the transport boundary
//! - `error`: Error types for the marketplace core

pub mod command;
pub mod error;
pub mod item;
pub mod request;
pub mod user;

pub use command::{Command, EditField, InboundEvent, Input, MenuAction};
pub use error::{MarketError, MarketResult};
pub use item::{
    CatalogFilter, Category, ContentKind, ContentRef, Item, ItemDraft, ItemEdit, ItemId,
    ModerationStatus, OwnedItem, Purchase, Term,
};
pub use request::{
    BalanceRequest, Decision, Feedback, FeedbackId, Proof, RequestId, RequestKind, RequestStatus,
};
pub use user::{User, UserId};
