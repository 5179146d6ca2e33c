//! Service lifecycle.
//!
//! `PrivilegeService` owns one bucket store and the engines built around it.
//! There is no process-wide state: everything lives from `initialize` to
//! `shutdown`.

use chrono::{DateTime, Utc};
use privd_core::{AdminError, EngineConfig, PolicyError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::engine::{
    AdminCaller, AdminEngine, CacheStats, CheckAudit, QueryEngine, Resolver, ResultCache,
};
use crate::model::{
    Decision, PolicyBatch, PolicyKey, PolicyKeyFilter, PolicyPattern, PolicyRecord, PolicyResult,
    Query, ROOT_BUCKET,
};
use crate::store::{BucketStore, Buckets, InMemoryBucketStore, TouchedBuckets};

/// A summary of the service state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStats {
    /// Number of buckets.
    pub buckets: usize,

    /// Number of records across all buckets.
    pub policies: usize,

    /// Generation of the published state.
    pub generation: u64,

    /// Checks answered.
    pub checks: u64,

    /// Checks that failed.
    pub failed_checks: u64,

    /// Audit records held.
    pub audited: usize,

    /// Result cache counters.
    pub cache: CacheStats,

    /// When the service was initialized.
    pub started_at: DateTime<Utc>,
}

/// The privilege-decision service.
pub struct PrivilegeService {
    config: EngineConfig,
    store: Arc<InMemoryBucketStore>,
    queries: Arc<QueryEngine<InMemoryBucketStore>>,
    admin: AdminEngine<InMemoryBucketStore>,
    started_at: DateTime<Utc>,
}

impl PrivilegeService {
    /// Build a service from a configuration.
    ///
    /// The store starts with the root bucket, whose default is
    /// `config.root_default`, and one record granting the administrative
    /// privilege to each bootstrap admin.
    pub fn initialize(config: EngineConfig) -> Result<Self> {
        config.validate()?;

        let store = Arc::new(InMemoryBucketStore::new(config.root_default.into())?);
        let cache = Arc::new(ResultCache::new(
            config.cache_capacity,
            config.cache_invalidation,
        ));
        let audit = Arc::new(
            CheckAudit::new(config.audit_capacity).with_max_clients(config.audit_max_clients),
        );
        let queries = Arc::new(QueryEngine::new(
            Arc::clone(&store),
            Resolver::new(config.max_chain_hops),
            cache,
            audit,
        ));
        let admin = AdminEngine::new(
            Arc::clone(&store),
            Arc::clone(&queries),
            config.admin_privilege.clone(),
        );

        if !config.bootstrap_admins.is_empty() {
            let grants = config
                .bootstrap_admins
                .iter()
                .map(|identity| -> std::result::Result<PolicyRecord, AdminError> {
                    let key = PolicyKey::new(
                        PolicyPattern::parse(&identity.client)?,
                        PolicyPattern::parse(&identity.user)?,
                        PolicyPattern::exact(config.admin_privilege.as_str()),
                    );
                    Ok(PolicyRecord::new(key, PolicyResult::allow()))
                })
                .collect::<std::result::Result<Vec<_>, _>>()?;

            store.commit(
                |buckets| {
                    let mut touched = TouchedBuckets::new();
                    for grant in grants {
                        touched.extend(buckets.upsert_policy(ROOT_BUCKET, grant)?);
                    }
                    Ok(touched)
                },
                |_, _| {},
            )?;
        }

        let service = Self {
            config,
            store,
            queries,
            admin,
            started_at: Utc::now(),
        };
        info!(
            max_chain_hops = service.config.max_chain_hops,
            cache_capacity = service.config.cache_capacity,
            bootstrap_admins = service.config.bootstrap_admins.len(),
            "Privilege service initialized"
        );
        Ok(service)
    }

    /// The configuration the service runs with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The currently published bucket state.
    ///
    /// Read-only: every mutation goes through `set_policies`.
    pub fn snapshot(&self) -> Arc<Buckets> {
        self.store.snapshot()
    }

    /// The query engine.
    pub fn queries(&self) -> &Arc<QueryEngine<InMemoryBucketStore>> {
        &self.queries
    }

    /// The admin engine.
    pub fn admin(&self) -> &AdminEngine<InMemoryBucketStore> {
        &self.admin
    }

    /// The check audit.
    pub fn audit(&self) -> &Arc<CheckAudit> {
        self.queries.audit()
    }

    /// Answer a check.
    pub fn check(&self, query: &Query) -> std::result::Result<Decision, PolicyError> {
        self.queries.check(query)
    }

    /// Apply a batch atomically.
    pub fn set_policies(
        &self,
        caller: &AdminCaller,
        batch: &PolicyBatch,
    ) -> std::result::Result<TouchedBuckets, AdminError> {
        self.admin.set_policies(caller, batch)
    }

    /// Resolve from any bucket, optionally without following links.
    pub fn admin_check(
        &self,
        caller: &AdminCaller,
        start_bucket: &str,
        recursive: bool,
        client: &str,
        user: &str,
        privilege: &str,
    ) -> std::result::Result<PolicyResult, AdminError> {
        self.admin
            .admin_check(caller, start_bucket, recursive, client, user, privilege)
    }

    /// List the records of a bucket selected by `filter`.
    pub fn list_policies(
        &self,
        caller: &AdminCaller,
        bucket: &str,
        filter: &PolicyKeyFilter,
    ) -> std::result::Result<Vec<Arc<PolicyRecord>>, AdminError> {
        self.admin.list_policies(caller, bucket, filter)
    }

    /// The supported result kinds as `(code, name)` pairs.
    pub fn list_descriptions(&self) -> Vec<(i32, &'static str)> {
        self.admin.list_descriptions()
    }

    /// Current statistics.
    pub fn stats(&self) -> ServiceStats {
        let snapshot = self.store.snapshot();
        ServiceStats {
            buckets: snapshot.len(),
            policies: snapshot.policy_count(),
            generation: snapshot.generation(),
            checks: self.queries.check_count(),
            failed_checks: self.queries.failure_count(),
            audited: self.audit().len(),
            cache: self.queries.cache().stats(),
            started_at: self.started_at,
        }
    }

    /// Stop the service, returning its final statistics.
    pub fn shutdown(self) -> ServiceStats {
        let stats = self.stats();
        info!(
            checks = stats.checks,
            failed_checks = stats.failed_checks,
            buckets = stats.buckets,
            policies = stats.policies,
            "Privilege service shut down"
        );
        stats
    }
}
