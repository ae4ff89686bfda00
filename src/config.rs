//! Marketplace policy configuration
//!
//! Operator-tunable values live here rather than being scattered through the
//! flows: the catalog markup, the admin list, the seeded subjects and the
//! input limits the conversation steps validate against.

use rust_decimal::{Decimal, RoundingStrategy};
use tracing::warn;

use crate::types::{Term, UserId};

/// Largest accepted markup, `10` means +1000%
pub const MAX_MARKUP: Decimal = Decimal::TEN;

/// Subjects registered at startup when none are configured
pub const DEFAULT_SUBJECTS: [&str; 4] = ["Mathematics", "Physics", "Programming", "English"];

/// Single pricing policy applied once, at submission time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricingPolicy {
    /// Markup as a fraction, `0.10` means +10%
    pub markup: Decimal,
}

impl PricingPolicy {
    pub fn new(markup: Decimal) -> Self {
        Self { markup }
    }

    /// Catalog price for an entered price: `entered * (1 + markup)`, 2 decimals
    ///
    /// Midpoints round away from zero. `None` if the result does not fit in a
    /// `Decimal`.
    pub fn catalog_price(&self, entered: Decimal) -> Option<Decimal> {
        let factor = Decimal::ONE.checked_add(self.markup)?;
        let mut price = entered
            .checked_mul(factor)?
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        price.rescale(2);
        Some(price)
    }

    /// Markup expressed as a whole percentage for notifications
    pub fn percent(&self) -> Decimal {
        (self.markup * Decimal::ONE_HUNDRED).normalize()
    }
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self::new(Decimal::new(10, 2))
    }
}

/// Marketplace configuration
#[derive(Debug, Clone)]
pub struct MarketConfig {
    pub pricing: PricingPolicy,

    /// Users allowed to moderate, resolve requests and broadcast
    pub admins: Vec<UserId>,

    /// Subjects registered at startup, in menu order
    pub subjects: Vec<String>,

    /// Lowercase document extensions accepted as item content, dot included
    pub allowed_extensions: Vec<String>,

    /// Maximum item name length, in characters
    pub name_limit: usize,

    /// Maximum feedback length, in characters
    pub feedback_limit: usize,

    /// Number of academic terms; valid terms are `1..=terms`
    pub terms: Term,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            pricing: PricingPolicy::default(),
            admins: Vec::new(),
            subjects: DEFAULT_SUBJECTS.iter().map(|s| s.to_string()).collect(),
            allowed_extensions: [".pdf", ".jpg", ".jpeg", ".png"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            name_limit: 100,
            feedback_limit: 1000,
            terms: 8,
        }
    }
}

impl MarketConfig {
    /// Create a config with custom pricing, admins and subjects
    ///
    /// A negative markup or one above [`MAX_MARKUP`] falls back to the default
    /// with a warning, and an empty subject list falls back to
    /// [`DEFAULT_SUBJECTS`].
    pub fn new(markup: Decimal, admins: Vec<UserId>, subjects: Vec<String>) -> Self {
        let default = Self::default();

        let pricing = if markup.is_sign_negative() || markup > MAX_MARKUP {
            warn!(
                %markup,
                default = %default.pricing.markup,
                "Invalid markup, using default"
            );
            default.pricing
        } else {
            PricingPolicy::new(markup)
        };

        let subjects: Vec<String> = subjects
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let subjects = if subjects.is_empty() {
            default.subjects
        } else {
            subjects
        };

        Self {
            pricing,
            admins,
            subjects,
            ..default
        }
    }

    /// Whether a document file name carries an accepted extension
    pub fn is_allowed_document(&self, file_name: &str) -> bool {
        let lower = file_name.to_lowercase();
        self.allowed_extensions
            .iter()
            .any(|ext| lower.ends_with(ext.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::ten_percent("0.10", "100", "110.00")]
    #[case::rounds_to_cents("0.10", "12.34", "13.57")]
    #[case::midpoint_away_from_zero("0.10", "0.05", "0.06")]
    #[case::zero_markup("0", "42.5", "42.50")]
    #[case::free_item("0.10", "0", "0.00")]
    fn test_catalog_price(#[case] markup: &str, #[case] entered: &str, #[case] expected: &str) {
        let policy = PricingPolicy::new(markup.parse().unwrap());
        let price = policy.catalog_price(entered.parse().unwrap()).unwrap();
        assert_eq!(price.to_string(), expected);
    }

    #[test]
    fn test_catalog_price_overflow() {
        let policy = PricingPolicy::new(Decimal::from_scientific("1e20").unwrap());
        assert_eq!(policy.catalog_price(Decimal::from(1_000_000_000)), None);
        assert_eq!(PricingPolicy::new(Decimal::MAX).catalog_price(Decimal::ONE), None);
    }

    #[test]
    fn test_percent() {
        assert_eq!(PricingPolicy::default().percent().to_string(), "10");
    }

    #[test]
    fn test_negative_markup_falls_back() {
        let config = MarketConfig::new(Decimal::new(-5, 2), vec![1], vec![]);

        assert_eq!(config.pricing, PricingPolicy::default());
        assert_eq!(config.admins, vec![1]);
        assert_eq!(config.subjects.len(), DEFAULT_SUBJECTS.len());
    }

    #[rstest]
    #[case::huge(Decimal::from_scientific("1e20").unwrap())]
    #[case::just_above_cap(Decimal::new(1001, 2))]
    fn test_oversized_markup_falls_back(#[case] markup: Decimal) {
        let config = MarketConfig::new(markup, vec![1], vec![]);

        assert_eq!(config.pricing, PricingPolicy::default());
    }

    #[test]
    fn test_markup_at_cap_is_kept() {
        let config = MarketConfig::new(MAX_MARKUP, vec![1], vec![]);
        assert_eq!(config.pricing.markup, MAX_MARKUP);
    }

    #[test]
    fn test_custom_subjects_trimmed() {
        let config = MarketConfig::new(
            Decimal::new(20, 2),
            vec![],
            vec![" Chemistry ".to_string(), "".to_string()],
        );

        assert_eq!(config.subjects, vec!["Chemistry"]);
        assert_eq!(config.pricing.markup, Decimal::new(20, 2));
    }

    #[rstest]
    #[case("notes.pdf", true)]
    #[case("SCAN.JPEG", true)]
    #[case("photo.png", true)]
    #[case("archive.zip", false)]
    #[case("pdf", false)]
    fn test_allowed_documents(#[case] file_name: &str, #[case] expected: bool) {
        assert_eq!(MarketConfig::default().is_allowed_document(file_name), expected);
    }
}
