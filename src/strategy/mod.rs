//! Replay strategy module
//!
//! The chat transport is external, so the binary drives the marketplace from
//! a CSV event log. A strategy covers the whole pipeline: reading events,
//! handling them through a [`Marketplace`] and writing the final balances.
//! Strategies are selected at runtime.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use crate::cli::StrategyType;
use crate::config::MarketConfig;
use crate::core::{MemoryLedger, Marketplace};
use crate::traits::{LogTransport, MemoryContentStore, StaticAdmins, SystemClock};
use crate::types::MarketResult;

pub mod r#async;
pub mod sync;

pub use self::r#async::{AsyncProcessingStrategy, BatchConfig};
pub use sync::SyncProcessingStrategy;

/// Replay pipeline: event log in, balance report out
pub trait ProcessingStrategy: Send + Sync {
    /// Replay the events in `input_path` and write `user,balance` rows to `output`
    ///
    /// # Returns
    ///
    /// * `Ok(())` if the log was replayed, including events that were refused
    /// * `Err(MarketError)` on a fatal error: unreadable input, unwritable output
    ///
    /// Individual event failures are logged and do not stop the replay.
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> MarketResult<()>;
}

/// Wire a marketplace over in-memory stores and the logging transport
pub fn build_marketplace(config: &MarketConfig) -> MarketResult<Arc<Marketplace>> {
    let market = Marketplace::new(
        Arc::new(MemoryLedger::new()),
        Arc::new(MemoryContentStore::new()),
        Arc::new(LogTransport),
        Arc::new(StaticAdmins::new(config.admins.iter().copied())),
        Arc::new(SystemClock::new()),
        Arc::new(config.clone()),
    )?;
    Ok(Arc::new(market))
}

/// Create a replay strategy
///
/// # Arguments
///
/// * `strategy_type` - Sync or Async
/// * `market` - Marketplace policy shared by both strategies
/// * `batch` - Batch settings for the async strategy (ignored for sync)
pub fn create_strategy(
    strategy_type: StrategyType,
    market: MarketConfig,
    batch: Option<BatchConfig>,
) -> Box<dyn ProcessingStrategy> {
    match strategy_type {
        StrategyType::Sync => Box::new(SyncProcessingStrategy::new(market)),
        StrategyType::Async => {
            let batch = batch.unwrap_or_default();
            Box::new(AsyncProcessingStrategy::new(market, batch))
        }
    }
}
