//! Policy records.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::{PolicyKey, PolicyResult};

/// One rule: the key it matches and the result it yields.
///
/// Records are immutable; updating a rule replaces the whole record stored
/// under its key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PolicyRecord {
    #[serde(flatten)]
    key: PolicyKey,

    #[serde(flatten)]
    result: PolicyResult,
}

impl PolicyRecord {
    /// Create a record.
    pub fn new(key: PolicyKey, result: PolicyResult) -> Self {
        Self { key, result }
    }

    /// The key this record matches.
    pub fn key(&self) -> &PolicyKey {
        &self.key
    }

    /// The result this record yields.
    pub fn result(&self) -> &PolicyResult {
        &self.result
    }
}

impl fmt::Display for PolicyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.key, self.result)
    }
}
