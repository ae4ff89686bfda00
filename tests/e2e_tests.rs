//! End-to-end integration tests
//!
//! These tests replay recorded event logs through the complete marketplace
//! using predefined CSV test fixtures. Each test:
//! 1. Reads input.csv from a fixture directory
//! 2. Replays every event through the marketplace
//! 3. Generates the balances CSV
//! 4. Compares actual output with expected.csv
//!
//! Test fixtures are located in tests/fixtures/ and cover:
//! - Happy path (submit, approve, top-up, purchase, repeat purchase)
//! - Insufficient funds on purchase and withdraw
//! - Double resolution of balance requests
//! - Withdraw approval re-checking the balance
//! - Moderation visibility and destructive rejection
//! - Markup rounding and admin price edits
//! - Malformed rows and commands
//!
//! Each fixture runs twice: once with the sequential strategy and once with
//! the batched async strategy. Both must produce identical balances.

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use rust_decimal::Decimal;
    use std::fs;
    use std::io::Write;
    use std::path::Path;
    use study_market::cli::StrategyType;
    use study_market::config::MarketConfig;
    use study_market::strategy::create_strategy;
    use study_market::strategy::BatchConfig;
    use tempfile::NamedTempFile;

    /// Admin 1, 10% markup, default subjects
    fn fixture_config() -> MarketConfig {
        MarketConfig::new(Decimal::new(10, 2), vec![1], Vec::new())
    }

    /// Replay `tests/fixtures/{fixture_name}/input.csv` and compare with expected.csv
    ///
    /// # Panics
    ///
    /// Panics if:
    /// - Input or expected files cannot be read
    /// - Output doesn't match expected
    fn run_test_fixture(
        fixture_name: &str,
        strategy_type: StrategyType,
        batch: Option<BatchConfig>,
    ) {
        let fixture_dir = format!("tests/fixtures/{}", fixture_name);
        let input_path = format!("{}/input.csv", fixture_dir);
        let expected_path = format!("{}/expected.csv", fixture_dir);

        assert!(
            Path::new(&input_path).exists(),
            "Input file not found: {}",
            input_path
        );
        assert!(
            Path::new(&expected_path).exists(),
            "Expected file not found: {}",
            expected_path
        );

        let strategy = create_strategy(strategy_type, fixture_config(), batch);

        let mut temp_output = NamedTempFile::new().expect("Failed to create temp file");

        strategy
            .process(Path::new(&input_path), &mut temp_output)
            .unwrap_or_else(|e| panic!("Failed to replay events: {}", e));

        temp_output.flush().expect("Failed to flush temp file");

        let actual_output = fs::read_to_string(temp_output.path())
            .unwrap_or_else(|e| panic!("Failed to read temp output file: {}", e));

        let expected_output = fs::read_to_string(&expected_path)
            .unwrap_or_else(|e| panic!("Failed to read expected file {}: {}", expected_path, e));

        assert_eq!(
            actual_output, expected_output,
            "\n\nOutput mismatch for fixture: {} (strategy: {:?})\n\nActual output:\n{}\n\nExpected output:\n{}\n",
            fixture_name, strategy_type, actual_output, expected_output
        );
    }

    /// End-to-end test for all fixtures with both strategies
    #[rstest]
    #[case("happy_path")]
    #[case("insufficient_funds")]
    #[case("double_resolution")]
    #[case("withdraw_recheck")]
    #[case("moderation_visibility")]
    #[case("precision")]
    #[case("malformed_data")]
    fn test_fixtures(
        #[case] fixture: &str,
        #[values(StrategyType::Sync, StrategyType::Async)] strategy: StrategyType,
    ) {
        run_test_fixture(fixture, strategy, None);
    }

    /// Tiny batches split every fixture across many reads
    #[rstest]
    #[case("happy_path")]
    #[case("withdraw_recheck")]
    #[case("precision")]
    fn test_fixtures_small_batches(#[case] fixture: &str) {
        run_test_fixture(fixture, StrategyType::Async, Some(BatchConfig::new(3, 2)));
    }
}
