//! Asynchronous batch replay strategy
//!
//! ```text
//! AsyncProcessingStrategy
//!     ├── BatchConfig (batch_size, max_concurrent_batches)
//!     ├── AsyncReader (batch CSV reading)
//!     └── BatchProcessor (per-user partitioning, admin barriers)
//!         └── Marketplace
//! ```
//!
//! Batches are processed one after another so a user's events keep their
//! file order across batch boundaries. Inside a batch, different users run
//! concurrently on the multi-threaded runtime.

use std::io::Write;
use std::path::Path;

use tracing::{info, warn};

use crate::config::MarketConfig;
use crate::core::BatchProcessor;
use crate::io::async_reader::AsyncReader;
use crate::io::csv_format::write_balances_csv;
use crate::strategy::{build_marketplace, ProcessingStrategy};
use crate::types::{MarketError, MarketResult};

/// Configuration for batch processing
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchConfig {
    /// Number of events per batch
    pub batch_size: usize,
    /// Worker threads for the runtime
    pub max_concurrent_batches: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            max_concurrent_batches: num_cpus::get(),
        }
    }
}

impl BatchConfig {
    /// Create a BatchConfig; zero values fall back to the defaults
    pub fn new(batch_size: usize, max_concurrent_batches: usize) -> Self {
        let default = Self::default();

        let batch_size = if batch_size == 0 {
            warn!(
                batch_size,
                default = default.batch_size,
                "Invalid batch_size, using default"
            );
            default.batch_size
        } else {
            batch_size
        };

        let max_concurrent_batches = if max_concurrent_batches == 0 {
            warn!(
                max_concurrent_batches,
                default = default.max_concurrent_batches,
                "Invalid max_concurrent_batches, using default"
            );
            default.max_concurrent_batches
        } else {
            max_concurrent_batches
        };

        Self {
            batch_size,
            max_concurrent_batches,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AsyncProcessingStrategy {
    market: MarketConfig,
    batch: BatchConfig,
}

impl AsyncProcessingStrategy {
    pub fn new(market: MarketConfig, batch: BatchConfig) -> Self {
        Self { market, batch }
    }
}

impl ProcessingStrategy for AsyncProcessingStrategy {
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> MarketResult<()> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.batch.max_concurrent_batches)
            .build()
            .map_err(|e| MarketError::IoError {
                message: format!("Failed to create tokio runtime: {}", e),
            })?;

        runtime.block_on(async {
            let market = build_marketplace(&self.market)?;
            let processor = BatchProcessor::new(market.clone());

            let file = tokio::fs::File::open(input_path)
                .await
                .map_err(|e| MarketError::IoError {
                    message: format!("Failed to open file '{}': {}", input_path.display(), e),
                })?;

            // csv-async reads futures::io, tokio files need the compat layer
            let compat_file = tokio_util::compat::TokioAsyncReadCompatExt::compat(file);
            let mut reader = AsyncReader::new(compat_file);

            let mut handled = 0usize;
            let mut failed = 0usize;
            loop {
                let batch = reader.read_batch(self.batch.batch_size).await;
                if batch.is_empty() {
                    break;
                }

                let results = processor.process_batch(batch).await;
                handled += results.len();
                failed += results.iter().filter(|r| r.result.is_err()).count();
            }

            info!(handled, failed, "Replay finished");
            write_balances_csv(&market.ledger().all_users(), output)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(content.as_bytes())
            .expect("Failed to write to temp file");
        file.flush().expect("Failed to flush temp file");
        file
    }

    #[rstest]
    #[case::defaults(1000, 4, 1000, 4)]
    #[case::zero_batch_size(0, 4, 1000, 4)]
    #[case::zero_workers(50, 0, 50, num_cpus::get())]
    fn test_batch_config_new(
        #[case] batch_size: usize,
        #[case] workers: usize,
        #[case] expected_batch_size: usize,
        #[case] expected_workers: usize,
    ) {
        let config = BatchConfig::new(batch_size, workers);
        assert_eq!(config.batch_size, expected_batch_size);
        assert_eq!(config.max_concurrent_batches, expected_workers);
    }

    #[test]
    fn test_async_strategy_small_batches_keep_user_order() {
        // Batch size 1 forces every step of the flow into its own batch
        let file = create_temp_csv(
            "user,name,kind,payload\n\
             2,Bo,command,menu:topup\n\
             3,Cy,command,menu:topup\n\
             2,Bo,text,200\n\
             3,Cy,text,50\n\
             2,Bo,text,ref 1\n\
             3,Cy,text,ref 2\n\
             1,Admin,command,topup:approve:1\n\
             1,Admin,command,topup:approve:2\n",
        );
        let strategy = AsyncProcessingStrategy::new(
            MarketConfig::new(rust_decimal::Decimal::new(10, 2), vec![1], Vec::new()),
            BatchConfig::new(1, 2),
        );
        let mut output = Vec::new();

        strategy.process(file.path(), &mut output).unwrap();

        assert_eq!(
            String::from_utf8(output).unwrap(),
            "user,balance\n1,0.00\n2,200.00\n3,50.00\n"
        );
    }

    #[test]
    fn test_async_strategy_missing_file() {
        let strategy = AsyncProcessingStrategy::new(MarketConfig::default(), BatchConfig::default());
        let mut output = Vec::new();

        let result = strategy.process(Path::new("/nonexistent/events.csv"), &mut output);

        assert!(matches!(result, Err(MarketError::IoError { .. })));
    }
}
