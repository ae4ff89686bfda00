//! Item-related types for the marketplace
//!
//! This module defines catalog items (study cheatsheets), their opaque content
//! references, the moderation status that controls catalog visibility, and
//! the append-only purchase record.

use super::error::MarketError;
use super::user::UserId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;

/// Item identifier
pub type ItemId = u64;

/// Academic term (semester) an item belongs to, `1..=8` by default
pub type Term = u8;

/// Item classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Formula sheets
    Formulas,
    /// Theory summaries
    Theory,
}

impl Category {
    /// All categories, in menu order
    pub const ALL: [Category; 2] = [Category::Formulas, Category::Theory];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Formulas => "formulas",
            Category::Theory => "theory",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "formulas" => Ok(Category::Formulas),
            "theory" => Ok(Category::Theory),
            other => Err(MarketError::validation(
                "category",
                &format!("unknown category '{}'", other),
            )),
        }
    }
}

/// Kind of content behind a content reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    Image,
    Document,
    Text,
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentKind::Image => f.write_str("image"),
            ContentKind::Document => f.write_str("document"),
            ContentKind::Text => f.write_str("text"),
        }
    }
}

/// Opaque handle to a stored blob
///
/// The core never looks inside the blob; it only passes the handle between
/// the content store and the chat transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentRef {
    pub handle: String,
    pub kind: ContentKind,
}

impl ContentRef {
    pub fn new(handle: impl Into<String>, kind: ContentKind) -> Self {
        Self {
            handle: handle.into(),
            kind,
        }
    }
}

/// Moderation status of an item
///
/// There is no rejected state: rejection deletes the item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModerationStatus {
    Pending,
    Approved,
}

impl fmt::Display for ModerationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModerationStatus::Pending => f.write_str("pending"),
            ModerationStatus::Approved => f.write_str("approved"),
        }
    }
}

/// Everything collected by the submit flow, ready to be stored as a pending item
#[derive(Debug, Clone, PartialEq)]
pub struct ItemDraft {
    pub subject: String,
    pub term: Term,
    pub category: Category,
    pub name: String,
    pub content: ContentRef,
    /// Price as entered by the author; the markup is applied on submission
    pub price: Decimal,
    pub author: UserId,
}

/// A catalog item
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub id: ItemId,
    pub subject: String,
    pub term: Term,
    pub category: Category,
    pub name: String,
    pub content: ContentRef,
    /// Catalog price, markup included
    pub price: Decimal,
    pub author: UserId,
    pub status: ModerationStatus,
    pub submitted_at: DateTime<Utc>,

    /// Set only on approval; drives catalog ordering
    pub approved_at: Option<DateTime<Utc>>,
}

impl Item {
    /// Build a pending item from a draft whose price is already the catalog price
    pub fn from_draft(id: ItemId, draft: ItemDraft, submitted_at: DateTime<Utc>) -> Self {
        Item {
            id,
            subject: draft.subject,
            term: draft.term,
            category: draft.category,
            name: draft.name,
            content: draft.content,
            price: draft.price,
            author: draft.author,
            status: ModerationStatus::Pending,
            submitted_at,
            approved_at: None,
        }
    }

    pub fn is_approved(&self) -> bool {
        self.status == ModerationStatus::Approved
    }

    /// Authors always see their own items; everyone else only approved ones
    pub fn is_visible_to(&self, user: UserId) -> bool {
        self.is_approved() || self.author == user
    }
}

/// Optional filters applied to catalog queries
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogFilter {
    pub subject: Option<String>,
    pub term: Option<Term>,
    pub category: Option<Category>,
}

impl CatalogFilter {
    pub fn new(subject: Option<String>, term: Option<Term>, category: Option<Category>) -> Self {
        Self {
            subject,
            term,
            category,
        }
    }

    pub fn matches(&self, item: &Item) -> bool {
        self.subject.as_ref().map_or(true, |s| *s == item.subject)
            && self.term.map_or(true, |t| t == item.term)
            && self.category.map_or(true, |c| c == item.category)
    }
}

/// In-place admin correction of an item
#[derive(Debug, Clone, PartialEq)]
pub enum ItemEdit {
    Name(String),
    Price(Decimal),
}

/// Append-only record of a purchase
///
/// The existence of a `(user, item)` pair is the authority for "already owns".
#[derive(Debug, Clone, PartialEq)]
pub struct Purchase {
    pub user: UserId,
    pub item: ItemId,
    pub price: Decimal,
    pub purchased_at: DateTime<Utc>,
}

/// An item in a user's library, either authored or bought
#[derive(Debug, Clone, PartialEq)]
pub struct OwnedItem {
    pub item: Item,
    pub purchased: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn sample_item(author: UserId, status: ModerationStatus) -> Item {
        Item {
            id: 1,
            subject: "Math".to_string(),
            term: 2,
            category: Category::Formulas,
            name: "Calc Formulas".to_string(),
            content: ContentRef::new("blob-1", ContentKind::Text),
            price: Decimal::new(11000, 2),
            author,
            status,
            submitted_at: DateTime::<Utc>::UNIX_EPOCH,
            approved_at: None,
        }
    }

    #[rstest]
    #[case::author_pending(10, ModerationStatus::Pending, 10, true)]
    #[case::stranger_pending(10, ModerationStatus::Pending, 11, false)]
    #[case::stranger_approved(10, ModerationStatus::Approved, 11, true)]
    #[case::author_approved(10, ModerationStatus::Approved, 10, true)]
    fn test_visibility(
        #[case] author: UserId,
        #[case] status: ModerationStatus,
        #[case] viewer: UserId,
        #[case] expected: bool,
    ) {
        assert_eq!(sample_item(author, status).is_visible_to(viewer), expected);
    }

    #[rstest]
    #[case::no_filters(CatalogFilter::default(), true)]
    #[case::subject_match(CatalogFilter::new(Some("Math".into()), None, None), true)]
    #[case::subject_mismatch(CatalogFilter::new(Some("Physics".into()), None, None), false)]
    #[case::term_mismatch(CatalogFilter::new(None, Some(3), None), false)]
    #[case::all_match(
        CatalogFilter::new(Some("Math".into()), Some(2), Some(Category::Formulas)),
        true
    )]
    #[case::category_mismatch(CatalogFilter::new(None, None, Some(Category::Theory)), false)]
    fn test_filter_matches(#[case] filter: CatalogFilter, #[case] expected: bool) {
        let item = sample_item(1, ModerationStatus::Approved);
        assert_eq!(filter.matches(&item), expected);
    }

    #[rstest]
    #[case("formulas", Category::Formulas)]
    #[case("Theory", Category::Theory)]
    #[case(" theory ", Category::Theory)]
    fn test_category_parsing(#[case] input: &str, #[case] expected: Category) {
        assert_eq!(input.parse::<Category>().unwrap(), expected);
    }

    #[test]
    fn test_category_parsing_rejects_unknown() {
        let result = "recipes".parse::<Category>();
        assert!(matches!(result, Err(MarketError::Validation { .. })));
    }

    #[test]
    fn test_from_draft_is_pending() {
        let draft = ItemDraft {
            subject: "Math".to_string(),
            term: 1,
            category: Category::Theory,
            name: "Limits".to_string(),
            content: ContentRef::new("blob-9", ContentKind::Image),
            price: Decimal::new(5500, 2),
            author: 3,
        };

        let item = Item::from_draft(9, draft, DateTime::<Utc>::UNIX_EPOCH);

        assert_eq!(item.id, 9);
        assert_eq!(item.status, ModerationStatus::Pending);
        assert_eq!(item.approved_at, None);
        assert_eq!(item.author, 3);
    }
}
