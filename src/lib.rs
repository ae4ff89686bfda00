//! Study Market Library
//!
//! # Overview
//!
//! Core of a chat-driven marketplace for study cheatsheets. Students submit
//! items for moderation, browse and buy approved items with an internal
//! balance, and ask admins to top up or pay out that balance.
//!
//! # Architecture
//!
//! - [`types`] - Core data types (users, items, requests, commands, errors)
//! - [`traits`] - External collaborators: chat transport, content store, admin identity, clock
//! - [`core`] - Business logic components:
//!   - [`core::ledger`] - Users, balances, items, purchases and requests
//!   - [`core::moderation`] - Item review and feedback
//!   - [`core::coordinator`] - Purchases and balance adjustments, serialized per user
//!   - [`core::conversation`] - Multi-step conversation flows
//!   - [`core::marketplace`] - Inbound event routing
//! - [`config`] - Pricing policy and operator settings
//! - [`io`] / [`strategy`] / [`cli`] - CSV event-log replay driver
//! - [`mocks`] - Test doubles
//!
//! # Money rules
//!
//! - A balance changes only through a purchase, an approved request or an
//!   admin credit, and never goes negative
//! - A user buys an item at most once; authors and buyers get re-delivery for free
//! - A balance request is resolved exactly once

pub mod cli;
pub mod config;
pub mod core;
pub mod io;
pub mod logging;
pub mod mocks;
pub mod strategy;
pub mod traits;
pub mod types;

pub use config::{MarketConfig, PricingPolicy};
pub use core::{LedgerStore, Marketplace, MemoryLedger, TransactionCoordinator};
pub use io::write_balances_csv;
pub use types::{Command, InboundEvent, Input, MarketError, MarketResult, UserId};
