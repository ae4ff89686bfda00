//! CSV format handling for event logs and balance output
//!
//! This module centralizes all CSV format concerns, providing:
//! - EventRecord structure for deserialization
//! - Conversion from CSV records to inbound events
//! - Balance output serialization
//!
//! All functions are pure (no I/O) for easy testing.
//!
//! # Input format
//!
//! ```text
//! user,name,kind,payload
//! 2,Bo,command,menu:topup
//! 2,Bo,text,500
//! 2,Bo,photo,receipt-bytes
//! 3,,document,notes.pdf
//! ```
//!
//! `kind` is one of `text`, `command`, `photo` or `document`. Command payloads
//! are callback data decoded into [`Command`]; document payloads are the
//! file name. Photo and document bodies are stand-ins taken from the payload.

use std::io::Write;

use serde::Deserialize;

use crate::types::{Command, InboundEvent, Input, MarketError, MarketResult, User, UserId};

/// One row of the event log
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct EventRecord {
    pub user: UserId,

    /// Display name; empty keeps the stored name
    pub name: Option<String>,

    pub kind: String,

    pub payload: Option<String>,
}

/// Convert a CSV row into an inbound event
///
/// # Returns
///
/// * `Ok(InboundEvent)` - The decoded event
/// * `Err(MarketError::Validation)` - Unknown kind, missing payload or bad command data
pub fn convert_event_record(record: EventRecord) -> MarketResult<InboundEvent> {
    let payload = record.payload.unwrap_or_default();

    let input = match record.kind.trim().to_lowercase().as_str() {
        "text" => Input::Text(payload),
        "command" => Input::Command(payload.parse::<Command>()?),
        "photo" => Input::Photo {
            data: payload.into_bytes(),
        },
        "document" => {
            if payload.trim().is_empty() {
                return Err(MarketError::validation(
                    "payload",
                    &format!("document event for user {} needs a file name", record.user),
                ));
            }
            Input::Document {
                data: payload.clone().into_bytes(),
                file_name: payload,
            }
        }
        other => {
            return Err(MarketError::validation(
                "kind",
                &format!("unknown event kind '{}' for user {}", other, record.user),
            ))
        }
    };

    let event = InboundEvent::new(record.user, input);
    Ok(match record.name.filter(|name| !name.trim().is_empty()) {
        Some(name) => event.with_name(name),
        None => event,
    })
}

/// Write `user,balance` rows sorted by user id, balances with 2 decimals
pub fn write_balances_csv(users: &[User], output: &mut dyn Write) -> MarketResult<()> {
    use csv::Writer;

    let mut writer = Writer::from_writer(output);

    writer.write_record(["user", "balance"])?;

    // Sort by user id for deterministic output
    let mut sorted = users.to_vec();
    sorted.sort_by_key(|user| user.id);

    for user in sorted {
        writer.write_record(&[user.id.to_string(), format!("{:.2}", user.balance)])?;
    }

    writer.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MenuAction;
    use rstest::rstest;
    use rust_decimal::Decimal;

    fn record(kind: &str, payload: Option<&str>) -> EventRecord {
        EventRecord {
            user: 7,
            name: Some("Ann".to_string()),
            kind: kind.to_string(),
            payload: payload.map(|p| p.to_string()),
        }
    }

    #[rstest]
    #[case::text("text", Some("500"), Input::Text("500".into()))]
    #[case::command("command", Some("menu:balance"), Input::Command(Command::Menu(MenuAction::Balance)))]
    #[case::command_upper_kind("COMMAND", Some("buy:3"), Input::Command(Command::Buy(3)))]
    #[case::photo("photo", Some("img"), Input::Photo { data: b"img".to_vec() })]
    #[case::document(
        "document",
        Some("notes.pdf"),
        Input::Document { file_name: "notes.pdf".into(), data: b"notes.pdf".to_vec() }
    )]
    #[case::empty_text("text", None, Input::Text(String::new()))]
    fn test_convert_event_record(
        #[case] kind: &str,
        #[case] payload: Option<&str>,
        #[case] expected: Input,
    ) {
        let event = convert_event_record(record(kind, payload)).unwrap();

        assert_eq!(event.user, 7);
        assert_eq!(event.display_name.as_deref(), Some("Ann"));
        assert_eq!(event.input, expected);
    }

    #[rstest]
    #[case::unknown_kind("sticker", Some("x"))]
    #[case::bad_command("command", Some("buy:abc"))]
    #[case::bare_subject("command", Some("subject"))]
    #[case::document_without_name("document", None)]
    fn test_convert_event_record_rejects(#[case] kind: &str, #[case] payload: Option<&str>) {
        let result = convert_event_record(record(kind, payload));
        assert!(matches!(result, Err(MarketError::Validation { .. })));
    }

    #[test]
    fn test_blank_name_is_dropped() {
        let mut row = record("text", Some("hi"));
        row.name = Some("  ".to_string());

        let event = convert_event_record(row).unwrap();

        assert_eq!(event.display_name, None);
    }

    #[test]
    fn test_write_balances_csv_sorted_two_decimals() {
        let mut bo = User::new(3, "Bo");
        bo.balance = Decimal::new(9, 0);
        let mut ann = User::new(2, "Ann");
        ann.balance = Decimal::new(905, 1);

        let mut output = Vec::new();
        write_balances_csv(&[bo, ann], &mut output).unwrap();

        assert_eq!(
            String::from_utf8(output).unwrap(),
            "user,balance\n2,90.50\n3,9.00\n"
        );
    }

    #[test]
    fn test_write_balances_csv_empty() {
        let mut output = Vec::new();
        write_balances_csv(&[], &mut output).unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), "user,balance\n");
    }
}
