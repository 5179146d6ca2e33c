//! The write path.
//!
//! The admin engine authorizes callers through the query engine, then applies
//! batches to the store in one commit. Cache invalidation is part of that
//! commit, so no check can observe the new state next to a stale cached
//! decision.

use privd_core::{AdminError, BatchId};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{QueryEngine, ResultCache};
use crate::model::{
    PolicyBatch, PolicyKeyFilter, PolicyRecord, PolicyResult, PolicyType, Query, ROOT_BUCKET,
};
use crate::store::{BucketStore, Buckets, TouchedBuckets};

/// Default privilege a caller must hold to administer policies.
pub const DEFAULT_ADMIN_PRIVILEGE: &str = "privd.admin";

/// Who is issuing an administrative request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCaller {
    /// An in-process or offline administrator, never checked.
    Trusted,

    /// A caller identified by the transport, checked against the
    /// administrative privilege.
    Identity {
        /// Client label of the caller.
        client: String,

        /// User the caller acts as.
        user: String,

        /// Transport session of the caller.
        session: String,
    },
}

impl AdminCaller {
    /// An identified caller.
    pub fn identity(
        client: impl Into<String>,
        user: impl Into<String>,
        session: impl Into<String>,
    ) -> Self {
        Self::Identity {
            client: client.into(),
            user: user.into(),
            session: session.into(),
        }
    }
}

impl fmt::Display for AdminCaller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Trusted => write!(f, "trusted"),
            Self::Identity { client, user, .. } => write!(f, "client={} user={}", client, user),
        }
    }
}

/// Applies administrative requests.
pub struct AdminEngine<S> {
    /// The bucket store.
    store: Arc<S>,

    /// The query engine, used for authorization and resolution.
    queries: Arc<QueryEngine<S>>,

    /// The result cache invalidated on commit.
    cache: Arc<ResultCache>,

    /// The privilege callers must hold.
    admin_privilege: String,
}

impl<S> AdminEngine<S>
where
    S: BucketStore,
{
    /// Create a new admin engine.
    ///
    /// # Arguments
    ///
    /// * `store` - The bucket store.
    /// * `queries` - The query engine sharing the same store.
    /// * `admin_privilege` - The privilege callers must hold.
    pub fn new(
        store: Arc<S>,
        queries: Arc<QueryEngine<S>>,
        admin_privilege: impl Into<String>,
    ) -> Self {
        let cache = Arc::clone(queries.cache());
        Self {
            store,
            queries,
            cache,
            admin_privilege: admin_privilege.into(),
        }
    }

    /// The privilege callers must hold.
    pub fn admin_privilege(&self) -> &str {
        &self.admin_privilege
    }

    /// Check that `caller` may administer policies.
    ///
    /// The check runs through the query engine like any other check. `DENY`
    /// and `ASK` reject the caller; data errors are returned as they are.
    pub fn authorize(&self, caller: &AdminCaller) -> Result<(), AdminError> {
        let (client, user, session) = match caller {
            AdminCaller::Trusted => return Ok(()),
            AdminCaller::Identity {
                client,
                user,
                session,
            } => (client, user, session),
        };

        let query = Query::new(
            client.as_str(),
            session.as_str(),
            user.as_str(),
            self.admin_privilege.as_str(),
        );
        let decision = self.queries.check(&query)?;
        if decision.is_allowed() {
            return Ok(());
        }

        warn!(%caller, verdict = %decision.verdict, "Administrative request rejected");
        Err(AdminError::NotAuthorized {
            client: client.clone(),
            user: user.clone(),
        })
    }

    /// Check `caller` against the state a batch is about to be applied to.
    ///
    /// Runs under the store's writer lock, so a grant revoked by a batch that
    /// committed after `authorize` is seen here. Bypasses the cache and audit.
    fn verify_caller(&self, buckets: &Buckets, caller: &AdminCaller) -> Result<(), AdminError> {
        let AdminCaller::Identity { client, user, .. } = caller else {
            return Ok(());
        };

        let resolution = self.queries.resolver().resolve_from(
            buckets,
            ROOT_BUCKET,
            client,
            user,
            &self.admin_privilege,
            true,
        )?;
        if resolution.decision().is_some_and(|decision| decision.is_allowed()) {
            return Ok(());
        }

        warn!(
            %caller,
            generation = buckets.generation(),
            "Administrative grant revoked before commit"
        );
        Err(AdminError::NotAuthorized {
            client: client.clone(),
            user: user.clone(),
        })
    }

    /// Apply a batch atomically.
    ///
    /// # Arguments
    ///
    /// * `caller` - Who is issuing the batch.
    /// * `batch` - The operations, applied in order.
    ///
    /// # Returns
    ///
    /// * `Ok(TouchedBuckets)` - The buckets the batch changed; every change is
    ///   visible to checks started after this returns.
    /// * `Err` - If the caller is not authorized or any operation fails; the
    ///   store is then left exactly as it was.
    pub fn set_policies(
        &self,
        caller: &AdminCaller,
        batch: &PolicyBatch,
    ) -> Result<TouchedBuckets, AdminError> {
        self.authorize(caller)?;

        let id = BatchId::new();
        let cache = &self.cache;
        let outcome = self.store.commit(
            |buckets| {
                self.verify_caller(buckets, caller)?;
                let mut touched = TouchedBuckets::new();
                for (index, operation) in batch.operations.iter().enumerate() {
                    debug!(batch = %id, index, %operation, "Applying operation");
                    match buckets.apply(operation) {
                        Ok(changed) => touched.extend(changed),
                        Err(err) => {
                            warn!(
                                batch = %id,
                                index,
                                operation = operation.name(),
                                error = %err,
                                "Policy batch rejected"
                            );
                            return Err(err);
                        }
                    }
                }
                Ok(touched)
            },
            |buckets, touched| cache.invalidate(touched, buckets.generation()),
        )?;

        info!(
            batch = %id,
            %caller,
            operations = batch.len(),
            touched = outcome.len(),
            generation = self.store.snapshot().generation(),
            "Policy batch applied"
        );
        Ok(outcome)
    }

    /// Resolve from any bucket without consulting or filling the cache.
    ///
    /// # Arguments
    ///
    /// * `caller` - Who is asking.
    /// * `start_bucket` - The bucket to start in.
    /// * `recursive` - Whether to follow `BUCKET` results.
    /// * `client`, `user`, `privilege` - The query values.
    ///
    /// # Returns
    ///
    /// * `Ok(PolicyResult)` - The result; may be `BUCKET` when not recursive.
    /// * `Err` - If the caller is not authorized, the bucket does not exist,
    ///   or the data is ambiguous or too deep.
    pub fn admin_check(
        &self,
        caller: &AdminCaller,
        start_bucket: &str,
        recursive: bool,
        client: &str,
        user: &str,
        privilege: &str,
    ) -> Result<PolicyResult, AdminError> {
        self.authorize(caller)?;

        let snapshot = self.store.snapshot();
        let resolution = self.queries.resolver().resolve_from(
            &snapshot,
            start_bucket,
            client,
            user,
            privilege,
            recursive,
        )?;
        debug!(
            bucket = start_bucket,
            recursive,
            client,
            user,
            privilege,
            result = %resolution.result,
            "Administrative check"
        );
        Ok(resolution.result)
    }

    /// List the records of a bucket selected by `filter`.
    pub fn list_policies(
        &self,
        caller: &AdminCaller,
        bucket: &str,
        filter: &PolicyKeyFilter,
    ) -> Result<Vec<Arc<PolicyRecord>>, AdminError> {
        self.authorize(caller)?;

        let snapshot = self.store.snapshot();
        Ok(snapshot.require(bucket)?.filtered(filter))
    }

    /// The supported result kinds as `(code, name)` pairs.
    pub fn list_descriptions(&self) -> Vec<(i32, &'static str)> {
        PolicyType::ALL
            .into_iter()
            .map(|kind| (kind.code(), kind.name()))
            .collect()
    }
}
