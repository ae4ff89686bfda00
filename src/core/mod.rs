//! Core business logic module
//!
//! This module contains the marketplace components:
//! - `traits` - The `LedgerStore` abstraction over durable state
//! - `ledger` - In-memory `LedgerStore` backed by concurrent maps
//! - `locks` - Per-user async locks
//! - `validation` - Input parsing and validation rules
//! - `messages` - User-facing texts
//! - `moderation` - Item review and feedback handling
//! - `coordinator` - Purchases and balance adjustments
//! - `conversation` - Multi-step conversation flows
//! - `marketplace` - Inbound event routing
//! - `batch_processor` - Concurrent replay with per-user ordering

pub mod batch_processor;
pub mod conversation;
pub mod coordinator;
pub mod ledger;
pub mod locks;
pub mod marketplace;
pub mod messages;
pub mod moderation;
pub mod traits;
pub mod validation;

pub use batch_processor::{BatchProcessor, ProcessingResult};
pub use conversation::{ConversationEngine, Flow, FlowAction, StepOutcome};
pub use coordinator::{PurchaseOutcome, TransactionCoordinator};
pub use ledger::MemoryLedger;
pub use locks::UserLocks;
pub use marketplace::Marketplace;
pub use moderation::ModerationEngine;
pub use traits::LedgerStore;
