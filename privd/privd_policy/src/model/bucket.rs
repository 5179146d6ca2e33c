//! Policy buckets.
//!
//! A bucket groups records under a name and provides the default result used
//! when none of its records match a query.

use lazy_static::lazy_static;
use privd_core::{AdminError, PolicyError};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::model::{PolicyKey, PolicyKeyFilter, PolicyRecord, PolicyResult, PolicyType};

/// Name of the root bucket, where every check starts.
pub const ROOT_BUCKET: &str = "";

lazy_static! {
    static ref BUCKET_ID: Regex = Regex::new(r"^[-_A-Za-z0-9]*$").expect("valid regex");
}

/// Check that `id` is a well-formed bucket name.
pub fn validate_bucket_id(id: &str) -> Result<(), AdminError> {
    if BUCKET_ID.is_match(id) {
        Ok(())
    } else {
        Err(AdminError::Validation(format!(
            "bucket id {:?} may only contain letters, digits, '-' and '_'",
            id
        )))
    }
}

/// Check that `result` may serve as a bucket default.
pub fn validate_default_result(result: &PolicyResult) -> Result<(), PolicyError> {
    if result.kind == PolicyType::Bucket {
        return Err(PolicyError::InvalidResult(
            "a bucket default cannot be BUCKET".to_string(),
        ));
    }
    Ok(())
}

/// A named collection of policy records plus a default result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyBucket {
    id: String,
    default: PolicyResult,
    records: BTreeMap<PolicyKey, Arc<PolicyRecord>>,
}

impl PolicyBucket {
    /// Create an empty bucket. The default must not be `BUCKET`.
    pub fn new(id: impl Into<String>, default: PolicyResult) -> Result<Self, PolicyError> {
        validate_default_result(&default)?;
        Ok(Self {
            id: id.into(),
            default,
            records: BTreeMap::new(),
        })
    }

    /// The bucket name.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The result used when no record matches.
    pub fn default_result(&self) -> &PolicyResult {
        &self.default
    }

    /// Replace the default result. The default must not be `BUCKET`.
    pub fn set_default(&mut self, default: PolicyResult) -> Result<(), PolicyError> {
        validate_default_result(&default)?;
        self.default = default;
        Ok(())
    }

    /// Insert a record, replacing any record with the same key.
    pub fn upsert(&mut self, record: PolicyRecord) -> Option<Arc<PolicyRecord>> {
        self.records
            .insert(record.key().clone(), Arc::new(record))
    }

    /// Remove the record stored under `key`, if any.
    pub fn remove(&mut self, key: &PolicyKey) -> Option<Arc<PolicyRecord>> {
        self.records.remove(key)
    }

    /// Get the record stored under `key`.
    pub fn get(&self, key: &PolicyKey) -> Option<&Arc<PolicyRecord>> {
        self.records.get(key)
    }

    /// All records, ordered by key.
    pub fn records(&self) -> impl Iterator<Item = &Arc<PolicyRecord>> {
        self.records.values()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the bucket holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records matching a listing filter.
    pub fn filtered(&self, filter: &PolicyKeyFilter) -> Vec<Arc<PolicyRecord>> {
        self.records
            .values()
            .filter(|record| filter.matches(record.key()))
            .cloned()
            .collect()
    }

    /// Remove every record for which `remove` returns true; returns how many went.
    pub fn remove_where<F>(&mut self, mut remove: F) -> usize
    where
        F: FnMut(&PolicyRecord) -> bool,
    {
        let before = self.records.len();
        self.records.retain(|_, record| !remove(record));
        before - self.records.len()
    }

    /// Names of the buckets this bucket's records link to.
    pub fn link_targets(&self) -> impl Iterator<Item = &str> {
        self.records
            .values()
            .filter_map(|record| record.result().bucket_target())
    }

    /// Select the most specific record matching the query values.
    ///
    /// Returns `Ok(None)` when nothing matches. Two matching records with the
    /// same specificity are a data error rather than something to break ties
    /// on.
    pub fn best_match(
        &self,
        client: &str,
        user: &str,
        privilege: &str,
    ) -> Result<Option<&Arc<PolicyRecord>>, PolicyError> {
        let mut best: Option<&Arc<PolicyRecord>> = None;
        let mut tied: Option<&Arc<PolicyRecord>> = None;

        for record in self.records.values() {
            if !record.key().matches(client, user, privilege) {
                continue;
            }

            match best {
                None => best = Some(record),
                Some(current) => {
                    let specificity = record.key().specificity();
                    let current_specificity = current.key().specificity();
                    if specificity > current_specificity {
                        best = Some(record);
                        tied = None;
                    } else if specificity == current_specificity {
                        tied = Some(record);
                    }
                }
            }
        }

        if let (Some(first), Some(second)) = (best, tied) {
            return Err(PolicyError::AmbiguousPolicy {
                bucket: self.id.clone(),
                first: first.key().to_string(),
                second: second.key().to_string(),
            });
        }

        Ok(best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(client: &str, user: &str, privilege: &str, result: PolicyResult) -> PolicyRecord {
        PolicyRecord::new(PolicyKey::parse(client, user, privilege).unwrap(), result)
    }

    #[test]
    fn test_bucket_id_validation() {
        assert!(validate_bucket_id(ROOT_BUCKET).is_ok());
        assert!(validate_bucket_id("apps-2_x").is_ok());
        assert!(validate_bucket_id("bad id").is_err());
        assert!(validate_bucket_id("../etc").is_err());
    }

    #[test]
    fn test_default_cannot_be_bucket() {
        let err = PolicyBucket::new("b", PolicyResult::bucket("c")).unwrap_err();
        assert!(matches!(err, PolicyError::InvalidResult(_)));

        let mut bucket = PolicyBucket::new("b", PolicyResult::deny()).unwrap();
        assert!(bucket.set_default(PolicyResult::bucket("c")).is_err());
        assert_eq!(bucket.default_result(), &PolicyResult::deny());
    }

    #[test]
    fn test_upsert_replaces_same_key() {
        let mut bucket = PolicyBucket::new("b", PolicyResult::deny()).unwrap();
        assert!(bucket
            .upsert(record("app1", "*", "read", PolicyResult::deny()))
            .is_none());
        let replaced = bucket.upsert(record("app1", "*", "read", PolicyResult::allow()));
        assert_eq!(replaced.unwrap().result(), &PolicyResult::deny());
        assert_eq!(bucket.len(), 1);
    }

    #[test]
    fn test_best_match_prefers_exact_client() {
        let mut bucket = PolicyBucket::new("", PolicyResult::deny()).unwrap();
        bucket.upsert(record("*", "*", "read", PolicyResult::deny()));
        bucket.upsert(record("app1", "*", "read", PolicyResult::allow()));

        let best = bucket.best_match("app1", "*", "read").unwrap().unwrap();
        assert_eq!(best.result(), &PolicyResult::allow());

        let best = bucket.best_match("app2", "*", "read").unwrap().unwrap();
        assert_eq!(best.result(), &PolicyResult::deny());

        assert!(bucket.best_match("app1", "*", "write").unwrap().is_none());
    }

    #[test]
    fn test_best_match_reports_ties() {
        let mut bucket = PolicyBucket::new("b", PolicyResult::deny()).unwrap();
        bucket.upsert(record("app*", "*", "read", PolicyResult::allow()));
        bucket.upsert(record("~app[0-9]", "*", "read", PolicyResult::deny()));

        let err = bucket.best_match("app1", "alice", "read").unwrap_err();
        assert!(matches!(err, PolicyError::AmbiguousPolicy { .. }));

        // A more specific record resolves the tie
        bucket.upsert(record("app1", "*", "read", PolicyResult::allow()));
        assert!(bucket.best_match("app1", "alice", "read").is_ok());
    }

    #[test]
    fn test_remove_where_and_links() {
        let mut bucket = PolicyBucket::new("b", PolicyResult::deny()).unwrap();
        bucket.upsert(record("a", "*", "*", PolicyResult::bucket("x")));
        bucket.upsert(record("b", "*", "*", PolicyResult::bucket("y")));
        bucket.upsert(record("c", "*", "*", PolicyResult::allow()));

        let mut targets: Vec<_> = bucket.link_targets().collect();
        targets.sort();
        assert_eq!(targets, vec!["x", "y"]);

        let removed = bucket.remove_where(|r| r.result().bucket_target() == Some("x"));
        assert_eq!(removed, 1);
        assert_eq!(bucket.len(), 2);
    }
}
