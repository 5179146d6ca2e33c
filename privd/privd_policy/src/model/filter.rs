//! Listing filters.
//!
//! Filters select records for listing and erasing. Unlike patterns they
//! compare record keys textually: `*` selects only wildcard records, while
//! `#` selects every record regardless of that component.

use privd_core::AdminError;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::{PolicyKey, PolicyPattern};

/// Text selecting any record component.
pub const ANY: &str = "#";

/// One component of a filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FilterComponent {
    /// Selects every record.
    Any,

    /// Selects records whose component is exactly this pattern.
    Pattern(PolicyPattern),
}

impl FilterComponent {
    /// Parse the text form of a filter component.
    pub fn parse(text: &str) -> Result<Self, AdminError> {
        if text == ANY {
            Ok(Self::Any)
        } else {
            Ok(Self::Pattern(PolicyPattern::parse(text)?))
        }
    }

    fn selects(&self, pattern: &PolicyPattern) -> bool {
        match self {
            Self::Any => true,
            Self::Pattern(expected) => expected == pattern,
        }
    }
}

impl fmt::Display for FilterComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "{}", ANY),
            Self::Pattern(pattern) => write!(f, "{}", pattern),
        }
    }
}

impl TryFrom<String> for FilterComponent {
    type Error = AdminError;

    fn try_from(text: String) -> Result<Self, Self::Error> {
        Self::parse(&text)
    }
}

impl From<FilterComponent> for String {
    fn from(component: FilterComponent) -> Self {
        component.to_string()
    }
}

fn any_component() -> FilterComponent {
    FilterComponent::Any
}

/// A filter over record keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyKeyFilter {
    /// Client component.
    #[serde(default = "any_component")]
    pub client: FilterComponent,

    /// User component.
    #[serde(default = "any_component")]
    pub user: FilterComponent,

    /// Privilege component.
    #[serde(default = "any_component")]
    pub privilege: FilterComponent,
}

impl PolicyKeyFilter {
    /// A filter selecting every record.
    pub fn any() -> Self {
        Self {
            client: FilterComponent::Any,
            user: FilterComponent::Any,
            privilege: FilterComponent::Any,
        }
    }

    /// Build a filter from the text form of each component.
    pub fn parse(client: &str, user: &str, privilege: &str) -> Result<Self, AdminError> {
        Ok(Self {
            client: FilterComponent::parse(client)?,
            user: FilterComponent::parse(user)?,
            privilege: FilterComponent::parse(privilege)?,
        })
    }

    /// Whether a record key is selected.
    pub fn matches(&self, key: &PolicyKey) -> bool {
        self.client.selects(&key.client)
            && self.user.selects(&key.user)
            && self.privilege.selects(&key.privilege)
    }
}

impl Default for PolicyKeyFilter {
    fn default() -> Self {
        Self::any()
    }
}

impl fmt::Display for PolicyKeyFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{};{};{}", self.client, self.user, self.privilege)
    }
}
