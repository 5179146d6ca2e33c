//! Bucket resolution.
//!
//! The resolver walks buckets starting from the root (or any bucket, for
//! administrative checks), picks the most specific matching record in each,
//! and follows `BUCKET` results until a terminal result is reached. Chains are
//! followed iteratively with a hop bound, so cyclic data terminates with
//! `ChainTooDeep` instead of looping.

use privd_core::PolicyError;
use std::sync::Arc;

use crate::model::{Decision, PolicyRecord, PolicyResult, Query, ROOT_BUCKET};
use crate::store::Buckets;

/// Default bound on followed bucket links.
pub const DEFAULT_MAX_CHAIN_HOPS: usize = 16;

/// The outcome of resolving a query against one state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// The result that ended resolution.
    ///
    /// Always terminal for recursive resolutions.
    pub result: PolicyResult,

    /// Buckets visited, in order.
    pub path: Vec<String>,

    /// The record that produced `result`, or `None` if it was a bucket default.
    pub matched: Option<Arc<PolicyRecord>>,

    /// Generation of the state the resolution ran against.
    pub generation: u64,
}

impl Resolution {
    /// The decision, if the result is terminal.
    pub fn decision(&self) -> Option<Decision> {
        Decision::from_result(&self.result)
    }

    /// Number of links followed.
    pub fn hops(&self) -> usize {
        self.path.len().saturating_sub(1)
    }
}

/// Resolves queries against a bucket state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolver {
    max_hops: usize,
}

impl Resolver {
    /// Create a resolver that follows at most `max_hops` links.
    pub fn new(max_hops: usize) -> Self {
        Self { max_hops }
    }

    /// The hop bound.
    pub fn max_hops(&self) -> usize {
        self.max_hops
    }

    /// Resolve a query from the root bucket to a terminal result.
    pub fn resolve(&self, buckets: &Buckets, query: &Query) -> Result<Resolution, PolicyError> {
        self.resolve_from(
            buckets,
            ROOT_BUCKET,
            &query.client,
            &query.user,
            &query.privilege,
            true,
        )
    }

    /// Resolve starting at `start`.
    ///
    /// When `recursive` is false the result of the start bucket is returned
    /// as-is, even if it is a `BUCKET` link.
    pub fn resolve_from(
        &self,
        buckets: &Buckets,
        start: &str,
        client: &str,
        user: &str,
        privilege: &str,
        recursive: bool,
    ) -> Result<Resolution, PolicyError> {
        let mut current = start.to_string();
        let mut path = Vec::new();
        let mut hops = 0;

        loop {
            let bucket = buckets.require(&current)?;
            path.push(current);

            let (result, matched) = match bucket.best_match(client, user, privilege)? {
                Some(record) => (record.result().clone(), Some(Arc::clone(record))),
                None => (bucket.default_result().clone(), None),
            };

            let next = match result.bucket_target() {
                Some(target) if recursive => target.to_string(),
                _ => {
                    return Ok(Resolution {
                        result,
                        path,
                        matched,
                        generation: buckets.generation(),
                    })
                }
            };

            hops += 1;
            if hops > self.max_hops {
                return Err(PolicyError::ChainTooDeep {
                    limit: self.max_hops,
                    bucket: next,
                });
            }
            current = next;
        }
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CHAIN_HOPS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PolicyKey, PolicyType, Verdict};

    fn record(client: &str, user: &str, privilege: &str, result: PolicyResult) -> PolicyRecord {
        PolicyRecord::new(PolicyKey::parse(client, user, privilege).unwrap(), result)
    }

    fn query(client: &str, user: &str, privilege: &str) -> Query {
        Query::new(client, "session", user, privilege)
    }

    fn buckets() -> Buckets {
        Buckets::with_root(PolicyResult::deny()).unwrap()
    }

    #[test]
    fn test_default_fallback() {
        let state = buckets();
        let resolution = Resolver::default()
            .resolve(&state, &query("app", "alice", "read"))
            .unwrap();
        assert_eq!(resolution.decision().unwrap().verdict, Verdict::Deny);
        assert!(resolution.matched.is_none());
        assert_eq!(resolution.path, vec![ROOT_BUCKET.to_string()]);
    }

    #[test]
    fn test_exact_client_beats_wildcard() {
        let mut state = buckets();
        state
            .upsert_policy(ROOT_BUCKET, record("*", "*", "read", PolicyResult::deny()))
            .unwrap();
        state
            .upsert_policy(ROOT_BUCKET, record("app1", "*", "read", PolicyResult::allow()))
            .unwrap();

        let resolver = Resolver::default();
        let allowed = resolver.resolve(&state, &query("app1", "bob", "read")).unwrap();
        assert_eq!(allowed.result, PolicyResult::allow());

        let denied = resolver.resolve(&state, &query("app2", "bob", "read")).unwrap();
        assert_eq!(denied.result, PolicyResult::deny());
        assert!(denied.matched.is_some());
    }

    #[test]
    fn test_client_specificity_outranks_user() {
        let mut state = buckets();
        state
            .upsert_policy(ROOT_BUCKET, record("app", "*", "read", PolicyResult::allow()))
            .unwrap();
        state
            .upsert_policy(ROOT_BUCKET, record("*", "alice", "read", PolicyResult::deny()))
            .unwrap();

        let resolution = Resolver::default()
            .resolve(&state, &query("app", "alice", "read"))
            .unwrap();
        assert_eq!(resolution.result.kind, PolicyType::Allow);
    }

    #[test]
    fn test_chaining_follows_links() {
        let mut state = buckets();
        state.create_bucket("b", PolicyResult::allow().with_extra("from b")).unwrap();
        state
            .upsert_policy(ROOT_BUCKET, record("*", "*", "*", PolicyResult::bucket("b")))
            .unwrap();

        let resolution = Resolver::default()
            .resolve(&state, &query("app", "alice", "read"))
            .unwrap();
        let decision = resolution.decision().unwrap();
        assert_eq!(decision.verdict, Verdict::Allow);
        assert_eq!(decision.extra.as_deref(), Some("from b"));
        assert_eq!(resolution.hops(), 1);
    }

    #[test]
    fn test_non_recursive_returns_link() {
        let mut state = buckets();
        state.create_bucket("b", PolicyResult::allow()).unwrap();
        state
            .upsert_policy(ROOT_BUCKET, record("*", "*", "*", PolicyResult::bucket("b")))
            .unwrap();

        let resolution = Resolver::default()
            .resolve_from(&state, ROOT_BUCKET, "app", "alice", "read", false)
            .unwrap();
        assert_eq!(resolution.result, PolicyResult::bucket("b"));
        assert!(resolution.decision().is_none());
    }

    #[test]
    fn test_cycle_hits_hop_bound() {
        let mut state = buckets();
        state.create_bucket("a", PolicyResult::deny()).unwrap();
        state.create_bucket("b", PolicyResult::deny()).unwrap();
        state
            .upsert_policy(ROOT_BUCKET, record("*", "*", "*", PolicyResult::bucket("a")))
            .unwrap();
        state
            .upsert_policy("a", record("*", "*", "*", PolicyResult::bucket("b")))
            .unwrap();
        state
            .upsert_policy("b", record("*", "*", "*", PolicyResult::bucket("a")))
            .unwrap();

        let err = Resolver::new(4)
            .resolve(&state, &query("app", "alice", "read"))
            .unwrap_err();
        assert!(matches!(err, PolicyError::ChainTooDeep { limit: 4, .. }));
    }

    #[test]
    fn test_chain_at_bound_succeeds() {
        let mut state = buckets();
        let mut previous = ROOT_BUCKET.to_string();
        for i in 0..3 {
            let name = format!("b{}", i);
            state.create_bucket(&name, PolicyResult::allow()).unwrap();
            state
                .upsert_policy(&previous, record("*", "*", "*", PolicyResult::bucket(&name)))
                .unwrap();
            previous = name;
        }

        let q = query("app", "alice", "read");
        assert!(Resolver::new(3).resolve(&state, &q).is_ok());
        assert!(Resolver::new(2).resolve(&state, &q).is_err());
    }

    #[test]
    fn test_ambiguous_typed_matchers() {
        let mut state = buckets();
        state
            .upsert_policy(ROOT_BUCKET, record("app*", "*", "*", PolicyResult::allow()))
            .unwrap();
        state
            .upsert_policy(ROOT_BUCKET, record("~a.p", "*", "*", PolicyResult::deny()))
            .unwrap();

        let err = Resolver::default()
            .resolve(&state, &query("app", "alice", "read"))
            .unwrap_err();
        assert!(matches!(err, PolicyError::AmbiguousPolicy { .. }));
    }

    #[test]
    fn test_unknown_start_bucket() {
        let state = buckets();
        let err = Resolver::default()
            .resolve_from(&state, "nope", "a", "b", "c", true)
            .unwrap_err();
        assert_eq!(err, PolicyError::UnknownBucket("nope".to_string()));
    }
}
