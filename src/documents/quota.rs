use crate::models::User;

/// Per-user document allowance. A negative limit means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentQuota {
    pub created: i32,
    pub limit: i32,
}

impl DocumentQuota {
    pub fn new(created: i32, limit: i32) -> Self {
        Self { created, limit }
    }

    pub fn for_user(user: &User) -> Self {
        Self::new(user.documents_created, user.documents_limit)
    }

    pub fn is_unlimited(&self) -> bool {
        self.limit < 0
    }

    pub fn allows_another(&self) -> bool {
        self.is_unlimited() || self.created < self.limit
    }

    /// Documents left before the limit, `None` when unlimited.
    pub fn remaining(&self) -> Option<i32> {
        (!self.is_unlimited()).then(|| (self.limit - self.created).max(0))
    }
}

#[cfg(test)]
mod tests {
    use super::DocumentQuota;

    #[test]
    fn rejects_when_created_reaches_limit() {
        assert!(DocumentQuota::new(2, 3).allows_another());
        assert!(!DocumentQuota::new(3, 3).allows_another());
        assert!(!DocumentQuota::new(4, 3).allows_another());
    }

    #[test]
    fn zero_limit_blocks_everything() {
        assert!(!DocumentQuota::new(0, 0).allows_another());
    }

    #[test]
    fn minus_one_is_never_exhausted() {
        let quota = DocumentQuota::new(10_000, -1);
        assert!(quota.allows_another());
        assert_eq!(quota.remaining(), None);
    }

    #[test]
    fn remaining_never_goes_negative() {
        assert_eq!(DocumentQuota::new(1, 3).remaining(), Some(2));
        assert_eq!(DocumentQuota::new(5, 3).remaining(), Some(0));
    }
}
