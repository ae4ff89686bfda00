//! User-related types
//!
//! Users are created on first contact (or on the first credit addressed to
//! them) and are never deleted.

use rust_decimal::Decimal;

/// User identifier
///
/// Assigned externally by the chat transport and stable for the lifetime of
/// the account.
pub type UserId = i64;

/// A marketplace user and their internal balance
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    /// Externally assigned identifier
    pub id: UserId,

    /// Name shown to admins in notifications
    pub display_name: String,

    /// Current balance
    ///
    /// Only the transaction coordinator mutates this field, and no committed
    /// operation leaves it below zero.
    pub balance: Decimal,
}

impl User {
    /// Create a new user with a zero balance
    pub fn new(id: UserId, display_name: impl Into<String>) -> Self {
        User {
            id,
            display_name: display_name.into(),
            balance: Decimal::ZERO,
        }
    }

    /// Placeholder name used when a user is created before first contact
    pub fn placeholder_name(id: UserId) -> String {
        format!("user_{}", id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_has_zero_balance() {
        let user = User::new(7, "alice");

        assert_eq!(user.id, 7);
        assert_eq!(user.display_name, "alice");
        assert_eq!(user.balance, Decimal::ZERO);
    }

    #[test]
    fn test_placeholder_name() {
        assert_eq!(User::placeholder_name(42), "user_42");
    }
}
