//! Policy results.
//!
//! This module defines what a record, or a bucket default, resolves to.

use privd_core::utils::DefaultDecision;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::model::ROOT_BUCKET;

/// The kind of a policy result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PolicyType {
    /// Refuse the privilege.
    Deny,

    /// Grant the privilege.
    Allow,

    /// Continue resolution in the bucket named by the result metadata.
    Bucket,

    /// Defer the decision to an interactive agent.
    Ask,
}

impl PolicyType {
    /// Every supported result kind, in code order.
    pub const ALL: [PolicyType; 4] = [Self::Deny, Self::Allow, Self::Bucket, Self::Ask];

    /// The integer code of this kind on the transport boundary.
    pub fn code(&self) -> i32 {
        match self {
            Self::Deny => 0,
            Self::Allow => 2,
            Self::Bucket => 3,
            Self::Ask => 4,
        }
    }

    /// Look a kind up by its integer code.
    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.code() == code)
    }

    /// The canonical name of this kind.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Deny => "DENY",
            Self::Allow => "ALLOW",
            Self::Bucket => "BUCKET",
            Self::Ask => "ASK",
        }
    }

    /// Whether resolution stops at a result of this kind.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Bucket)
    }
}

impl fmt::Display for PolicyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for PolicyType {
    type Err = String;

    /// Accepts the name in any case, or the integer code.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(code) = s.parse::<i32>() {
            return Self::from_code(code).ok_or_else(|| format!("unknown result code {}", code));
        }
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown result type '{}'", s))
    }
}

/// A result kind plus its opaque metadata.
///
/// For `BUCKET` results the metadata names the target bucket; for every
/// other kind it is carried through resolution verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PolicyResult {
    /// The result kind.
    #[serde(rename = "result")]
    pub kind: PolicyType,

    /// Opaque metadata attached to the result.
    #[serde(
        rename = "result_extra",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub extra: Option<String>,
}

impl PolicyResult {
    /// Create a result with optional metadata.
    pub fn new(kind: PolicyType, extra: Option<String>) -> Self {
        Self { kind, extra }
    }

    /// An `ALLOW` result without metadata.
    pub fn allow() -> Self {
        Self::new(PolicyType::Allow, None)
    }

    /// A `DENY` result without metadata.
    pub fn deny() -> Self {
        Self::new(PolicyType::Deny, None)
    }

    /// An `ASK` result with the metadata the agent should receive.
    pub fn ask(extra: Option<String>) -> Self {
        Self::new(PolicyType::Ask, extra)
    }

    /// A link to another bucket.
    pub fn bucket(target: impl Into<String>) -> Self {
        Self::new(PolicyType::Bucket, Some(target.into()))
    }

    /// Attach metadata to this result.
    pub fn with_extra(mut self, extra: impl Into<String>) -> Self {
        self.extra = Some(extra.into());
        self
    }

    /// The target of a `BUCKET` result; absent metadata names the root bucket.
    pub fn bucket_target(&self) -> Option<&str> {
        match self.kind {
            PolicyType::Bucket => Some(self.extra.as_deref().unwrap_or(ROOT_BUCKET)),
            _ => None,
        }
    }
}

impl From<DefaultDecision> for PolicyResult {
    fn from(decision: DefaultDecision) -> Self {
        match decision {
            DefaultDecision::Allow => Self::allow(),
            DefaultDecision::Deny => Self::deny(),
            DefaultDecision::Ask => Self::ask(None),
        }
    }
}

impl fmt::Display for PolicyResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.extra {
            Some(extra) => write!(f, "{}({})", self.kind, extra),
            None => write!(f, "{}", self.kind),
        }
    }
}
