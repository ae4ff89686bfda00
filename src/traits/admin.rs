//! Admin identity predicate.

use crate::types::UserId;

/// Decides which users may moderate, resolve requests and broadcast.
pub trait AdminIdentity: Send + Sync {
    fn is_admin(&self, user: UserId) -> bool;

    /// Every admin, used as the recipient list for admin notifications.
    fn admins(&self) -> Vec<UserId>;
}

/// Fixed admin list taken from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticAdmins {
    ids: Vec<UserId>,
}

impl StaticAdmins {
    pub fn new(ids: impl IntoIterator<Item = UserId>) -> Self {
        let mut ids: Vec<UserId> = ids.into_iter().collect();
        ids.sort_unstable();
        ids.dedup();
        Self { ids }
    }
}

impl AdminIdentity for StaticAdmins {
    fn is_admin(&self, user: UserId) -> bool {
        self.ids.binary_search(&user).is_ok()
    }

    fn admins(&self) -> Vec<UserId> {
        self.ids.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_admins_dedup_and_lookup() {
        let admins = StaticAdmins::new([7, 1, 7]);

        assert!(admins.is_admin(1));
        assert!(admins.is_admin(7));
        assert!(!admins.is_admin(2));
        assert_eq!(admins.admins(), vec![1, 7]);
    }

    #[test]
    fn test_no_admins() {
        let admins = StaticAdmins::default();
        assert!(!admins.is_admin(1));
        assert!(admins.admins().is_empty());
    }
}
