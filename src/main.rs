//! Study Market replay CLI
//!
//! Replays a CSV log of chat events through the marketplace and prints the
//! final balances.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- --admin 1 events.csv > balances.csv
//! cargo run -- --admin 1 --markup 0.15 --strategy sync events.csv > balances.csv
//! cargo run -- --strategy async --batch-size 2000 --max-concurrent 8 events.csv > balances.csv
//! ```
//!
//! Outbound chat messages are written to the log on stderr.
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error (missing arguments, file not found, file not readable, etc.)

use std::process;

use study_market::{cli, logging, strategy};
use tracing::error;

fn main() {
    let args = cli::parse_args();
    logging::init(&args.log_level);

    let strategy = {
        let batch = if matches!(args.strategy, cli::StrategyType::Async) {
            Some(args.to_batch_config())
        } else {
            None
        };
        strategy::create_strategy(args.strategy, args.to_market_config(), batch)
    };

    let mut output = std::io::stdout();
    if let Err(e) = strategy.process(&args.input_file, &mut output) {
        error!(error = %e, "Replay failed");
        process::exit(1);
    }
}
