//! Command-line arguments for the replay driver

use clap::{Parser, ValueEnum};
use rust_decimal::Decimal;
use std::path::PathBuf;

use crate::config::MarketConfig;
use crate::strategy::BatchConfig;
use crate::types::UserId;

#[derive(Parser, Debug)]
#[command(name = "study-market")]
#[command(
    about = "Replay a study-market chat event log and print the final balances",
    long_about = None
)]
pub struct CliArgs {
    #[arg(value_name = "EVENTS", help = "Path to the input CSV event log")]
    pub input_file: PathBuf,

    #[arg(
        long = "markup",
        value_name = "FRACTION",
        default_value = "0.10",
        help = "Catalog markup applied to entered prices (0.10 = +10%)"
    )]
    pub markup: Decimal,

    #[arg(
        long = "admin",
        value_name = "ID",
        env = "MARKET_ADMINS",
        value_delimiter = ',',
        help = "Admin user id; repeat or comma-separate for several"
    )]
    pub admins: Vec<UserId>,

    #[arg(
        long = "subject",
        value_name = "NAME",
        help = "Subject to register at startup; repeatable (default: built-in list)"
    )]
    pub subjects: Vec<String>,

    #[arg(
        long = "strategy",
        value_name = "STRATEGY",
        default_value = "async",
        help = "Replay strategy: 'sync' for sequential or 'async' for concurrent batches"
    )]
    pub strategy: StrategyType,

    #[arg(
        long = "batch-size",
        value_name = "SIZE",
        help = "Number of events per batch (default: 1000)"
    )]
    pub batch_size: Option<usize>,

    #[arg(
        long = "max-concurrent",
        value_name = "COUNT",
        help = "Worker threads for the async strategy (default: CPU cores)"
    )]
    pub max_concurrent_batches: Option<usize>,

    #[arg(
        long = "log-level",
        value_name = "LEVEL",
        default_value = "info",
        help = "Log level when RUST_LOG is not set (error, warn, info, debug, trace)"
    )]
    pub log_level: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StrategyType {
    Sync,
    Async,
}

impl CliArgs {
    pub fn to_batch_config(&self) -> BatchConfig {
        if self.batch_size.is_some() || self.max_concurrent_batches.is_some() {
            let default = BatchConfig::default();
            BatchConfig::new(
                self.batch_size.unwrap_or(default.batch_size),
                self.max_concurrent_batches
                    .unwrap_or(default.max_concurrent_batches),
            )
        } else {
            BatchConfig::default()
        }
    }

    pub fn to_market_config(&self) -> MarketConfig {
        MarketConfig::new(self.markup, self.admins.clone(), self.subjects.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_SUBJECTS;
    use rstest::rstest;

    #[rstest]
    #[case::default_strategy(&["program", "events.csv"], StrategyType::Async)]
    #[case::explicit_sync(&["program", "--strategy", "sync", "events.csv"], StrategyType::Sync)]
    #[case::explicit_async(&["program", "--strategy", "async", "events.csv"], StrategyType::Async)]
    fn test_strategy_parsing(#[case] args: &[&str], #[case] expected: StrategyType) {
        let parsed = CliArgs::try_parse_from(args).unwrap();
        assert_eq!(parsed.strategy, expected);
    }

    #[rstest]
    #[case::all_defaults(&["program", "events.csv"], 1000, num_cpus::get())]
    #[case::custom_batch_size(&["program", "--batch-size", "2000", "events.csv"], 2000, num_cpus::get())]
    #[case::custom_max_concurrent(&["program", "--max-concurrent", "8", "events.csv"], 1000, 8)]
    #[case::zero_batch_size(&["program", "--batch-size", "0", "events.csv"], 1000, num_cpus::get())]
    fn test_batch_config_conversion(
        #[case] args: &[&str],
        #[case] expected_batch_size: usize,
        #[case] expected_max_concurrent: usize,
    ) {
        let config = CliArgs::try_parse_from(args).unwrap().to_batch_config();

        assert_eq!(config.batch_size, expected_batch_size);
        assert_eq!(config.max_concurrent_batches, expected_max_concurrent);
    }

    #[test]
    fn test_market_config_defaults() {
        let config = CliArgs::try_parse_from(["program", "events.csv"])
            .unwrap()
            .to_market_config();

        assert_eq!(config.pricing.markup, Decimal::new(10, 2));
        assert_eq!(config.subjects, DEFAULT_SUBJECTS.map(String::from).to_vec());
    }

    #[test]
    fn test_market_config_options() {
        let parsed = CliArgs::try_parse_from([
            "program",
            "--markup",
            "0.25",
            "--admin",
            "1,7",
            "--admin",
            "9",
            "--subject",
            "Chemistry",
            "events.csv",
        ])
        .unwrap();
        let config = parsed.to_market_config();

        assert_eq!(config.pricing.markup, Decimal::new(25, 2));
        assert_eq!(config.admins, vec![1, 7, 9]);
        assert_eq!(config.subjects, vec!["Chemistry".to_string()]);
    }

    #[rstest]
    #[case::missing_input(&["program"])]
    #[case::invalid_strategy(&["program", "--strategy", "invalid", "events.csv"])]
    #[case::invalid_markup(&["program", "--markup", "ten", "events.csv"])]
    #[case::invalid_admin(&["program", "--admin", "root", "events.csv"])]
    fn test_parsing_errors(#[case] args: &[&str]) {
        assert!(CliArgs::try_parse_from(args).is_err());
    }
}
