//! Membership roles and the permission gates built on them.

pub const ROLE_OWNER: &str = "owner";
pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_MEMBER: &str = "member";
pub const ROLE_ANON: &str = "anon";
pub const ROLE_PENDING: &str = "pending";
pub const ROLE_REJECTED: &str = "rejected";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MembershipRole {
    Owner,
    Admin,
    Member,
    Anon,
    Pending,
    Rejected,
}

impl MembershipRole {
    /// Roles are stored as strings. An unrecognized value is None, which
    /// downstream counter code tolerates silently.
    pub fn from_str(raw: &str) -> Option<Self> {
        match raw {
            ROLE_OWNER => Some(Self::Owner),
            ROLE_ADMIN => Some(Self::Admin),
            ROLE_MEMBER => Some(Self::Member),
            ROLE_ANON => Some(Self::Anon),
            ROLE_PENDING => Some(Self::Pending),
            ROLE_REJECTED => Some(Self::Rejected),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => ROLE_OWNER,
            Self::Admin => ROLE_ADMIN,
            Self::Member => ROLE_MEMBER,
            Self::Anon => ROLE_ANON,
            Self::Pending => ROLE_PENDING,
            Self::Rejected => ROLE_REJECTED,
        }
    }

    /// Pending and rejected memberships exist as records but are never
    /// allowed to act as members.
    pub fn is_approved(&self) -> bool {
        !matches!(self, Self::Pending | Self::Rejected)
    }

    pub fn is_owner(&self) -> bool {
        matches!(self, Self::Owner)
    }
}

/// A membership row's role string is approved when it parses to an
/// approved role. Unknown strings are not approved.
pub fn is_approved_role(raw: &str) -> bool {
    MembershipRole::from_str(raw).map_or(false, |r| r.is_approved())
}

/// Whether a caller may edit or delete an existing item.
/// Only the original author and the community owner qualify.
pub fn can_mutate_item(role: &str, caller_id: &str, author_id: &str) -> bool {
    if caller_id == author_id {
        return true;
    }
    MembershipRole::from_str(role).map_or(false, |r| r.is_owner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip() {
        for raw in [
            ROLE_OWNER,
            ROLE_ADMIN,
            ROLE_MEMBER,
            ROLE_ANON,
            ROLE_PENDING,
            ROLE_REJECTED,
        ] {
            assert_eq!(MembershipRole::from_str(raw).unwrap().as_str(), raw);
        }
        assert!(MembershipRole::from_str("sysop").is_none());
    }

    #[test]
    fn test_approved_gate() {
        assert!(is_approved_role(ROLE_OWNER));
        assert!(is_approved_role(ROLE_ADMIN));
        assert!(is_approved_role(ROLE_MEMBER));
        assert!(is_approved_role(ROLE_ANON));
        assert!(!is_approved_role(ROLE_PENDING));
        assert!(!is_approved_role(ROLE_REJECTED));
        assert!(!is_approved_role("sysop"));
    }

    #[test]
    fn test_mutation_gate_matrix() {
        // Authors may always mutate their own items, regardless of role.
        for role in [
            ROLE_OWNER,
            ROLE_ADMIN,
            ROLE_MEMBER,
            ROLE_ANON,
            ROLE_PENDING,
            ROLE_REJECTED,
        ] {
            assert!(can_mutate_item(role, "alice", "alice"));
        }
        // Only the owner may mutate another member's items.
        assert!(can_mutate_item(ROLE_OWNER, "alice", "bob"));
        for role in [ROLE_ADMIN, ROLE_MEMBER, ROLE_ANON, ROLE_PENDING, ROLE_REJECTED] {
            assert!(!can_mutate_item(role, "alice", "bob"));
        }
        assert!(!can_mutate_item("sysop", "alice", "bob"));
    }
}
