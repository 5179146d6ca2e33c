//! The read path.
//!
//! The query engine answers checks: it takes one snapshot of the store,
//! consults the result cache for that snapshot, resolves on a miss and
//! records the check in the audit.

use privd_core::{CheckId, PolicyError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use super::{CheckAudit, CheckRecord, Resolution, Resolver, ResultCache};
use crate::model::{Decision, Query};
use crate::store::{BucketStore, Buckets};

/// Answers privilege checks.
pub struct QueryEngine<S> {
    /// The bucket store.
    store: Arc<S>,

    /// The resolver.
    resolver: Resolver,

    /// Cache of decisions.
    cache: Arc<ResultCache>,

    /// Audit of checks.
    audit: Arc<CheckAudit>,

    /// Checks answered.
    checks: AtomicU64,

    /// Checks that failed.
    failures: AtomicU64,
}

impl<S> QueryEngine<S>
where
    S: BucketStore,
{
    /// Create a new query engine.
    ///
    /// # Arguments
    ///
    /// * `store` - The bucket store.
    /// * `resolver` - The resolver.
    /// * `cache` - The result cache, shared with the admin engine.
    /// * `audit` - The check audit.
    pub fn new(
        store: Arc<S>,
        resolver: Resolver,
        cache: Arc<ResultCache>,
        audit: Arc<CheckAudit>,
    ) -> Self {
        Self {
            store,
            resolver,
            cache,
            audit,
            checks: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// The resolver used by this engine.
    pub fn resolver(&self) -> Resolver {
        self.resolver
    }

    /// The result cache.
    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    /// The check audit.
    pub fn audit(&self) -> &Arc<CheckAudit> {
        &self.audit
    }

    /// Answer a check.
    ///
    /// # Arguments
    ///
    /// * `query` - The check to answer.
    ///
    /// # Returns
    ///
    /// * `Ok(Decision)` - `ALLOW`, `DENY` or `ASK`, with the deciding metadata.
    /// * `Err` - If the policy data is ambiguous or its links are too deep.
    pub fn check(&self, query: &Query) -> Result<Decision, PolicyError> {
        let id = CheckId::new();
        self.checks.fetch_add(1, Ordering::Relaxed);

        let snapshot = self.store.snapshot();
        let generation = snapshot.generation();

        if let Some(decision) =
            self.cache
                .get(&query.client, &query.user, &query.privilege, generation)
        {
            debug!(check = %id, %query, %decision, "Check answered from cache");
            self.audit
                .record(CheckRecord::decided(id, query, &decision, true));
            return Ok(decision);
        }

        match self.resolve(&snapshot, query) {
            Ok((resolution, decision)) => {
                self.cache.insert(
                    &query.client,
                    &query.user,
                    &query.privilege,
                    &decision,
                    &resolution.path,
                    generation,
                );
                debug!(
                    check = %id,
                    %query,
                    %decision,
                    hops = resolution.hops(),
                    "Check resolved"
                );
                self.audit
                    .record(CheckRecord::decided(id, query, &decision, false));
                Ok(decision)
            }
            Err(err) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                warn!(check = %id, %query, error = %err, "Check failed");
                self.audit.record(CheckRecord::failed(id, query, err.code()));
                Err(err)
            }
        }
    }

    fn resolve(
        &self,
        snapshot: &Buckets,
        query: &Query,
    ) -> Result<(Resolution, Decision), PolicyError> {
        let resolution = self.resolver.resolve(snapshot, query)?;
        let decision = resolution.decision().ok_or_else(|| {
            PolicyError::InvalidResult("resolution ended on a bucket link".to_string())
        })?;
        Ok((resolution, decision))
    }

    /// Number of checks answered so far.
    pub fn check_count(&self) -> u64 {
        self.checks.load(Ordering::Relaxed)
    }

    /// Number of checks that failed so far.
    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}
