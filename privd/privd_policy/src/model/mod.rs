//! Policy data model.
//!
//! Patterns, keys, results, records and buckets, plus the queries and
//! administrative operations that act on them.

mod bucket;
mod filter;
mod key;
mod operation;
mod pattern;
mod query;
mod record;
mod result;

pub use bucket::{validate_bucket_id, validate_default_result, PolicyBucket, ROOT_BUCKET};
pub use filter::{FilterComponent, PolicyKeyFilter, ANY};
pub use key::{PolicyKey, Specificity};
pub use operation::{PolicyBatch, PolicyOperation};
pub use pattern::{PatternRank, PolicyPattern, RegexPattern, ESCAPE, REGEX_MARKER, WILDCARD};
pub use query::{Decision, Query, Verdict};
pub use record::PolicyRecord;
pub use result::{PolicyResult, PolicyType};
