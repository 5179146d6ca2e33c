//! Key patterns.
//!
//! A pattern matches one component (client, user or privilege) of a query.
//! Patterns have a compact text form used in batch files and on the command
//! line:
//!
//! | Text          | Pattern                         |
//! |---------------|---------------------------------|
//! | `*`           | wildcard, matches anything      |
//! | `~<regex>`    | anchored regular expression     |
//! | `\<text>`     | exact value, taken literally    |
//! | `<text>*`     | prefix                          |
//! | anything else | exact value                     |
//!
//! The escape is how exact values such as `*`, `~x` or `file*` are written;
//! `Display` adds it where needed. A prefix whose text starts with `~` or `\`
//! has no text form.

use lazy_static::lazy_static;
use privd_core::AdminError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Text of the wildcard pattern.
pub const WILDCARD: &str = "*";

/// Prefix marking a regular-expression pattern.
pub const REGEX_MARKER: char = '~';

/// Prefix marking the rest of the text as an exact value.
pub const ESCAPE: char = '\\';

lazy_static! {
    static ref CONTROL_CHARS: Regex = Regex::new(r"[\x00-\x1f\x7f]").expect("valid regex");
}

/// How specific a pattern is. Higher ranks win during resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PatternRank {
    /// Matches any value.
    Wildcard = 0,

    /// Matches a family of values.
    Typed = 1,

    /// Matches a single value.
    Exact = 2,
}

/// A compiled, anchored regular expression that compares by its source text.
#[derive(Clone)]
pub struct RegexPattern {
    source: String,
    compiled: Regex,
}

impl RegexPattern {
    /// Compile `source` so that it must match a whole value.
    pub fn new(source: &str) -> Result<Self, AdminError> {
        let compiled = Regex::new(&format!("^(?:{})$", source))
            .map_err(|e| AdminError::Validation(format!("invalid regex '{}': {}", source, e)))?;
        Ok(Self {
            source: source.to_string(),
            compiled,
        })
    }

    /// The expression as written, without anchors.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether the expression matches the whole of `value`.
    pub fn is_match(&self, value: &str) -> bool {
        self.compiled.is_match(value)
    }
}

impl fmt::Debug for RegexPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RegexPattern").field(&self.source).finish()
    }
}

impl PartialEq for RegexPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for RegexPattern {}

impl Hash for RegexPattern {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.source.hash(state);
    }
}

impl PartialOrd for RegexPattern {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RegexPattern {
    fn cmp(&self, other: &Self) -> Ordering {
        self.source.cmp(&other.source)
    }
}

/// A pattern over one key component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PolicyPattern {
    /// Any value.
    Wildcard,

    /// Exactly this value.
    Exact(String),

    /// Any value starting with this text.
    Prefix(String),

    /// Any value matching this expression.
    Regex(RegexPattern),
}

impl PolicyPattern {
    /// Parse the text form of a pattern.
    pub fn parse(text: &str) -> Result<Self, AdminError> {
        if text.is_empty() {
            return Err(AdminError::Validation(
                "pattern must not be empty".to_string(),
            ));
        }

        if CONTROL_CHARS.is_match(text) {
            return Err(AdminError::Validation(format!(
                "pattern {:?} contains control characters",
                text
            )));
        }

        if let Some(literal) = text.strip_prefix(ESCAPE) {
            if literal.is_empty() {
                return Err(AdminError::Validation(
                    "escaped pattern must not be empty".to_string(),
                ));
            }
            return Ok(Self::Exact(literal.to_string()));
        }

        if text == WILDCARD {
            return Ok(Self::Wildcard);
        }

        if let Some(source) = text.strip_prefix(REGEX_MARKER) {
            if source.is_empty() {
                return Err(AdminError::Validation(
                    "regex pattern must not be empty".to_string(),
                ));
            }
            return Ok(Self::Regex(RegexPattern::new(source)?));
        }

        if let Some(prefix) = text.strip_suffix(WILDCARD) {
            return Ok(Self::Prefix(prefix.to_string()));
        }

        Ok(Self::Exact(text.to_string()))
    }

    /// An exact pattern, without interpreting special characters.
    pub fn exact(value: impl Into<String>) -> Self {
        Self::Exact(value.into())
    }

    /// Whether this pattern matches a concrete query value.
    pub fn matches(&self, value: &str) -> bool {
        match self {
            Self::Wildcard => true,
            Self::Exact(expected) => expected == value,
            Self::Prefix(prefix) => value.starts_with(prefix.as_str()),
            Self::Regex(regex) => regex.is_match(value),
        }
    }

    /// The specificity rank of this pattern.
    pub fn rank(&self) -> PatternRank {
        match self {
            Self::Wildcard => PatternRank::Wildcard,
            Self::Prefix(_) | Self::Regex(_) => PatternRank::Typed,
            Self::Exact(_) => PatternRank::Exact,
        }
    }

    /// Whether this is the wildcard pattern.
    pub fn is_wildcard(&self) -> bool {
        matches!(self, Self::Wildcard)
    }
}

impl fmt::Display for PolicyPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wildcard => write!(f, "{}", WILDCARD),
            Self::Exact(value) if needs_escape(value) => write!(f, "{}{}", ESCAPE, value),
            Self::Exact(value) => write!(f, "{}", value),
            Self::Prefix(prefix) => write!(f, "{}{}", prefix, WILDCARD),
            Self::Regex(regex) => write!(f, "{}{}", REGEX_MARKER, regex.source()),
        }
    }
}

/// Whether an exact value would parse as something else without the escape.
fn needs_escape(value: &str) -> bool {
    value.starts_with(REGEX_MARKER) || value.starts_with(ESCAPE) || value.ends_with(WILDCARD)
}

impl TryFrom<String> for PolicyPattern {
    type Error = AdminError;

    fn try_from(text: String) -> Result<Self, Self::Error> {
        Self::parse(&text)
    }
}

impl From<PolicyPattern> for String {
    fn from(pattern: PolicyPattern) -> Self {
        pattern.to_string()
    }
}
