//! Policy keys.
//!
//! A key is the (client, user, privilege) pattern triple a record matches.
//! Keys are unique within a bucket.

use privd_core::AdminError;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::pattern::{PatternRank, PolicyPattern};

/// The specificity of a key, compared client first, then user, then privilege.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Specificity {
    /// Rank of the client pattern.
    pub client: PatternRank,

    /// Rank of the user pattern.
    pub user: PatternRank,

    /// Rank of the privilege pattern.
    pub privilege: PatternRank,
}

/// The pattern triple of a policy record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PolicyKey {
    /// Pattern over the client label.
    pub client: PolicyPattern,

    /// Pattern over the user.
    pub user: PolicyPattern,

    /// Pattern over the privilege.
    pub privilege: PolicyPattern,
}

impl PolicyKey {
    /// Create a key from already-built patterns.
    pub fn new(client: PolicyPattern, user: PolicyPattern, privilege: PolicyPattern) -> Self {
        Self {
            client,
            user,
            privilege,
        }
    }

    /// Create a key from the text form of each pattern.
    pub fn parse(client: &str, user: &str, privilege: &str) -> Result<Self, AdminError> {
        Ok(Self::new(
            PolicyPattern::parse(client)?,
            PolicyPattern::parse(user)?,
            PolicyPattern::parse(privilege)?,
        ))
    }

    /// Whether this key matches the concrete query values.
    pub fn matches(&self, client: &str, user: &str, privilege: &str) -> bool {
        self.client.matches(client) && self.user.matches(user) && self.privilege.matches(privilege)
    }

    /// The specificity used to rank matching keys.
    pub fn specificity(&self) -> Specificity {
        Specificity {
            client: self.client.rank(),
            user: self.user.rank(),
            privilege: self.privilege.rank(),
        }
    }
}

impl fmt::Display for PolicyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{};{};{}", self.client, self.user, self.privilege)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_all_components() {
        let key = PolicyKey::parse("app1", "*", "read").unwrap();
        assert!(key.matches("app1", "alice", "read"));
        assert!(!key.matches("app2", "alice", "read"));
        assert!(!key.matches("app1", "alice", "write"));
    }

    #[test]
    fn test_specificity_is_client_first() {
        let client_exact = PolicyKey::parse("app1", "*", "*").unwrap();
        let user_and_privilege_exact = PolicyKey::parse("*", "alice", "read").unwrap();
        assert!(client_exact.specificity() > user_and_privilege_exact.specificity());

        let typed_client = PolicyKey::parse("app*", "alice", "read").unwrap();
        assert!(client_exact.specificity() > typed_client.specificity());
        assert!(typed_client.specificity() > user_and_privilege_exact.specificity());
    }

    #[test]
    fn test_display() {
        let key = PolicyKey::parse("app1", "*", "~r.*").unwrap();
        assert_eq!(key.to_string(), "app1;*;~r.*");
    }
}
