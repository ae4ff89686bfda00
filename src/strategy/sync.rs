//! Sequential replay strategy
//!
//! Events are read one at a time with [`SyncReader`] and handled strictly in
//! file order on a single-threaded runtime. This is the reference behaviour
//! the async strategy must reproduce.

use std::io::Write;
use std::path::Path;

use tracing::{info, warn};

use crate::config::MarketConfig;
use crate::io::csv_format::write_balances_csv;
use crate::io::sync_reader::SyncReader;
use crate::strategy::{build_marketplace, ProcessingStrategy};
use crate::types::{MarketError, MarketResult};

#[derive(Debug, Clone)]
pub struct SyncProcessingStrategy {
    config: MarketConfig,
}

impl SyncProcessingStrategy {
    pub fn new(config: MarketConfig) -> Self {
        Self { config }
    }
}

impl ProcessingStrategy for SyncProcessingStrategy {
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> MarketResult<()> {
        let reader = SyncReader::new(input_path)?;
        let market = build_marketplace(&self.config)?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .map_err(|e| MarketError::IoError {
                message: format!("Failed to create tokio runtime: {}", e),
            })?;

        let (handled, failed) = runtime.block_on(async {
            let mut handled = 0usize;
            let mut failed = 0usize;

            for event in reader {
                match event {
                    Ok(event) => {
                        handled += 1;
                        // The user has already been told; the error only needs counting
                        if market.handle(event).await.is_err() {
                            failed += 1;
                        }
                    }
                    Err(e) => warn!(error = %e, "Skipping event"),
                }
            }

            (handled, failed)
        });

        info!(handled, failed, "Replay finished");
        write_balances_csv(&market.ledger().all_users(), output)
    }
}
