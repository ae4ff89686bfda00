//! Input validation for conversation steps and the moderation surface
//!
//! Every function here is pure: it either returns the parsed value or a
//! `MarketError::Validation` describing what to fix. Callers decide whether
//! that means a re-prompt or a rejected API call.

use rust_decimal::Decimal;
use std::str::FromStr;

use crate::config::MarketConfig;
use crate::types::{ContentKind, Input, MarketError, MarketResult, Term, UserId};

/// Upper bound for prices and amounts; keeps markup arithmetic far from overflow
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

/// Raw content collected from a content step, ready for the content store
#[derive(Debug, Clone, PartialEq)]
pub struct RawContent {
    pub kind: ContentKind,
    pub data: Vec<u8>,
}

fn parse_decimal(field: &str, input: &str) -> MarketResult<Decimal> {
    let normalized = input.trim().replace(',', ".");
    Decimal::from_str(&normalized)
        .map_err(|_| MarketError::validation(field, &format!("'{}' is not a number", input.trim())))
}

/// Item display name: 1..=limit characters after trimming
pub fn validate_name(input: &str, limit: usize) -> MarketResult<String> {
    let name = input.trim();
    if name.is_empty() {
        return Err(MarketError::validation("name", "name must not be empty"));
    }
    if name.chars().count() > limit {
        return Err(MarketError::validation(
            "name",
            &format!("name must be at most {} characters", limit),
        ));
    }
    Ok(name.to_string())
}

/// Price check shared by text input and direct API calls
pub fn validate_price(price: Decimal) -> MarketResult<Decimal> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(MarketError::validation("price", "price must not be negative"));
    }
    if price > MAX_AMOUNT {
        return Err(MarketError::validation(
            "price",
            &format!("price must be at most {}", MAX_AMOUNT),
        ));
    }
    Ok(price)
}

/// Non-negative price
pub fn parse_price(input: &str) -> MarketResult<Decimal> {
    validate_price(parse_decimal("price", input)?)
}

/// Strictly positive amount, rounded to cents
pub fn validate_amount(amount: Decimal) -> MarketResult<Decimal> {
    let amount = amount.round_dp(2);
    if amount <= Decimal::ZERO {
        return Err(MarketError::validation(
            "amount",
            "amount must be greater than zero",
        ));
    }
    if amount > MAX_AMOUNT {
        return Err(MarketError::validation(
            "amount",
            &format!("amount must be at most {}", MAX_AMOUNT),
        ));
    }
    Ok(amount)
}

pub fn parse_amount(input: &str) -> MarketResult<Decimal> {
    validate_amount(parse_decimal("amount", input)?)
}

/// Term in `1..=terms`
pub fn validate_term(term: Term, terms: Term) -> MarketResult<Term> {
    if term == 0 || term > terms {
        return Err(MarketError::validation(
            "term",
            &format!("term must be between 1 and {}", terms),
        ));
    }
    Ok(term)
}

pub fn parse_user_id(input: &str) -> MarketResult<UserId> {
    input
        .trim()
        .parse::<UserId>()
        .map_err(|_| MarketError::validation("user", "user id must be a whole number"))
}

/// Feedback text: non-empty, at most `limit` characters
pub fn validate_feedback(input: &str, limit: usize) -> MarketResult<String> {
    let message = input.trim();
    if message.is_empty() {
        return Err(MarketError::validation("feedback", "feedback must not be empty"));
    }
    if message.chars().count() > limit {
        return Err(MarketError::validation(
            "feedback",
            &format!("feedback must be at most {} characters", limit),
        ));
    }
    Ok(message.to_string())
}

/// Item content: a photo, a document with an allowed extension, or non-empty text
pub fn item_content(input: &Input, config: &MarketConfig) -> MarketResult<RawContent> {
    match input {
        Input::Photo { data } => Ok(RawContent {
            kind: ContentKind::Image,
            data: data.clone(),
        }),
        Input::Document { file_name, data } if config.is_allowed_document(file_name) => {
            Ok(RawContent {
                kind: ContentKind::Document,
                data: data.clone(),
            })
        }
        Input::Document { file_name, .. } => Err(MarketError::validation(
            "content",
            &format!(
                "'{}' is not accepted; allowed types: {}",
                file_name,
                config.allowed_extensions.join(" ")
            ),
        )),
        Input::Text(text) if !text.trim().is_empty() => Ok(RawContent {
            kind: ContentKind::Text,
            data: text.trim().as_bytes().to_vec(),
        }),
        Input::Text(_) => Err(MarketError::validation("content", "text must not be empty")),
        Input::Command(_) => Err(MarketError::validation(
            "content",
            "send a photo, a document or text",
        )),
    }
}

/// Free-form payload: a payment proof or a broadcast message
#[derive(Debug, Clone, PartialEq)]
pub enum RawPayload {
    Text(String),
    Content(RawContent),
}

/// Any photo or document, or non-empty text
pub fn payload(input: &Input) -> MarketResult<RawPayload> {
    match input {
        Input::Text(text) if !text.trim().is_empty() => {
            Ok(RawPayload::Text(text.trim().to_string()))
        }
        Input::Photo { data } => Ok(RawPayload::Content(RawContent {
            kind: ContentKind::Image,
            data: data.clone(),
        })),
        Input::Document { data, .. } => Ok(RawPayload::Content(RawContent {
            kind: ContentKind::Document,
            data: data.clone(),
        })),
        _ => Err(MarketError::validation(
            "content",
            "send text, a photo or a document",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Command;
    use rstest::rstest;

    #[rstest]
    #[case::plain("Calc Formulas", Ok("Calc Formulas"))]
    #[case::trimmed("  Limits  ", Ok("Limits"))]
    #[case::empty("   ", Err(()))]
    fn test_validate_name(#[case] input: &str, #[case] expected: Result<&str, ()>) {
        let result = validate_name(input, 100);
        match expected {
            Ok(name) => assert_eq!(result.unwrap(), name),
            Err(()) => assert!(matches!(result, Err(MarketError::Validation { .. }))),
        }
    }

    #[test]
    fn test_name_length_limit() {
        assert!(validate_name(&"a".repeat(100), 100).is_ok());
        assert!(validate_name(&"a".repeat(101), 100).is_err());
    }

    #[test]
    fn test_name_limit_counts_characters() {
        let cyrillic = "ф".repeat(100);
        assert!(validate_name(&cyrillic, 100).is_ok());
    }

    #[rstest]
    #[case::integer("100", Some("100"))]
    #[case::zero("0", Some("0"))]
    #[case::fraction("12.5", Some("12.5"))]
    #[case::comma("12,5", Some("12.5"))]
    #[case::negative("-1", None)]
    #[case::text("cheap", None)]
    #[case::too_large("1000000001", None)]
    fn test_parse_price(#[case] input: &str, #[case] expected: Option<&str>) {
        let result = parse_price(input);
        match expected {
            Some(value) => assert_eq!(result.unwrap(), Decimal::from_str(value).unwrap()),
            None => assert!(result.is_err()),
        }
    }

    #[rstest]
    #[case::positive("500", true)]
    #[case::cents("0.01", true)]
    #[case::zero("0", false)]
    #[case::rounds_to_zero("0.001", false)]
    #[case::negative("-5", false)]
    #[case::garbage("five", false)]
    fn test_parse_amount(#[case] input: &str, #[case] ok: bool) {
        assert_eq!(parse_amount(input).is_ok(), ok);
    }

    #[rstest]
    #[case(1, true)]
    #[case(8, true)]
    #[case(0, false)]
    #[case(9, false)]
    fn test_validate_term(#[case] term: Term, #[case] ok: bool) {
        assert_eq!(validate_term(term, 8).is_ok(), ok);
    }

    #[rstest]
    #[case::photo(Input::Photo { data: vec![1, 2] }, Some(ContentKind::Image))]
    #[case::pdf(Input::Document { file_name: "notes.PDF".into(), data: vec![1] }, Some(ContentKind::Document))]
    #[case::zip(Input::Document { file_name: "notes.zip".into(), data: vec![1] }, None)]
    #[case::text(Input::Text("d/dx sin x = cos x".into()), Some(ContentKind::Text))]
    #[case::blank_text(Input::Text("  ".into()), None)]
    #[case::command(Input::Command(Command::Back), None)]
    fn test_item_content(#[case] input: Input, #[case] expected: Option<ContentKind>) {
        let result = item_content(&input, &MarketConfig::default());
        match expected {
            Some(kind) => assert_eq!(result.unwrap().kind, kind),
            None => assert!(matches!(result, Err(MarketError::Validation { .. }))),
        }
    }

    #[test]
    fn test_payload() {
        assert_eq!(
            payload(&Input::Text(" transfer #123 ".into())).unwrap(),
            RawPayload::Text("transfer #123".to_string())
        );
        assert!(matches!(
            payload(&Input::Document {
                file_name: "receipt.heic".into(),
                data: vec![0]
            }),
            Ok(RawPayload::Content(RawContent {
                kind: ContentKind::Document,
                ..
            }))
        ));
        assert!(payload(&Input::Text(String::new())).is_err());
    }

    #[rstest]
    #[case("42", Some(42))]
    #[case(" -7 ", Some(-7))]
    #[case("alice", None)]
    fn test_parse_user_id(#[case] input: &str, #[case] expected: Option<UserId>) {
        assert_eq!(parse_user_id(input).ok(), expected);
    }

    #[test]
    fn test_validate_feedback() {
        assert_eq!(validate_feedback(" great ", 1000).unwrap(), "great");
        assert!(validate_feedback("", 1000).is_err());
        assert!(validate_feedback(&"x".repeat(1001), 1000).is_err());
    }
}
