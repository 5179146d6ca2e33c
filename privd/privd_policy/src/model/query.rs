//! Check queries and their decisions.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::{PolicyResult, PolicyType};

/// A privilege check as delivered by the transport.
///
/// The session is opaque: it is recorded for audit but never matched
/// against policy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Query {
    /// Client label of the caller.
    pub client: String,

    /// Transport-scoped session id.
    pub session: String,

    /// User the client acts as.
    pub user: String,

    /// Privilege being exercised.
    pub privilege: String,
}

impl Query {
    /// Create a query.
    pub fn new(
        client: impl Into<String>,
        session: impl Into<String>,
        user: impl Into<String>,
        privilege: impl Into<String>,
    ) -> Self {
        Self {
            client: client.into(),
            session: session.into(),
            user: user.into(),
            privilege: privilege.into(),
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "client={} user={} privilege={}",
            self.client, self.user, self.privilege
        )
    }
}

/// A terminal answer to a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    /// The privilege is granted.
    Allow,

    /// The privilege is refused.
    Deny,

    /// The caller must consult an interactive agent.
    Ask,
}

impl Verdict {
    /// The integer code on the transport boundary.
    pub fn code(&self) -> i32 {
        PolicyType::from(*self).code()
    }

    /// Whether results with this verdict may be cached.
    pub fn is_cacheable(&self) -> bool {
        matches!(self, Self::Allow | Self::Deny)
    }
}

impl From<Verdict> for PolicyType {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Allow => Self::Allow,
            Verdict::Deny => Self::Deny,
            Verdict::Ask => Self::Ask,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", PolicyType::from(*self))
    }
}

/// The final result of a resolution: a verdict plus the opaque metadata of
/// the record or default that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Decision {
    /// The verdict.
    pub verdict: Verdict,

    /// Metadata carried verbatim from the deciding result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<String>,
}

impl Decision {
    /// Convert a terminal policy result; `BUCKET` results have no decision.
    pub fn from_result(result: &PolicyResult) -> Option<Self> {
        let verdict = match result.kind {
            PolicyType::Allow => Verdict::Allow,
            PolicyType::Deny => Verdict::Deny,
            PolicyType::Ask => Verdict::Ask,
            PolicyType::Bucket => return None,
        };
        Some(Self {
            verdict,
            extra: result.extra.clone(),
        })
    }

    /// Whether the verdict is `ALLOW`.
    pub fn is_allowed(&self) -> bool {
        self.verdict == Verdict::Allow
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.extra {
            Some(extra) => write!(f, "{}({})", self.verdict, extra),
            None => write!(f, "{}", self.verdict),
        }
    }
}
