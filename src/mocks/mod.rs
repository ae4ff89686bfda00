//! Test doubles for the marketplace's collaborators.
//!
//! Compiled into the library so integration tests and benchmarks can use
//! them alongside the unit tests.

pub mod clock;
pub mod ledger;
pub mod market;
pub mod transport;

pub use clock::ManualClock;
pub use ledger::{FaultyLedger, LedgerFault};
pub use market::TestMarket;
pub use transport::{Channel, RecordedMessage, RecordingTransport};
