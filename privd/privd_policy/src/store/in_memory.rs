//! In-memory bucket store.
//!
//! This module provides a copy-on-write, in-memory implementation of the
//! bucket store. Readers clone an `Arc` under a short read lock and then work
//! lock-free; writers are serialized and swap in a new state.

use parking_lot::{Mutex, RwLock};
use privd_core::{AdminError, PolicyError};
use std::sync::Arc;
use tracing::trace;

use super::{BucketStore, Buckets};
use crate::model::{PolicyBucket, PolicyKey, PolicyRecord, PolicyResult};

/// An in-memory bucket store.
pub struct InMemoryBucketStore {
    /// The published state.
    current: RwLock<Arc<Buckets>>,

    /// Serializes writers.
    writer: Mutex<()>,
}

impl InMemoryBucketStore {
    /// Create a store holding only the root bucket.
    pub fn new(root_default: PolicyResult) -> Result<Self, PolicyError> {
        Ok(Self::from_buckets(Buckets::with_root(root_default)?))
    }

    /// Create a store publishing an existing state.
    pub fn from_buckets(buckets: Buckets) -> Self {
        Self {
            current: RwLock::new(Arc::new(buckets)),
            writer: Mutex::new(()),
        }
    }

    /// Generation of the published state.
    pub fn generation(&self) -> u64 {
        self.current.read().generation()
    }
}

impl BucketStore for InMemoryBucketStore {
    fn create_bucket(&self, id: &str, default: PolicyResult) -> Result<(), AdminError> {
        self.commit(|buckets| buckets.create_bucket(id, default), |_, _| {})
            .map(|_| ())
    }

    fn upsert_policy(&self, bucket: &str, record: PolicyRecord) -> Result<(), AdminError> {
        self.commit(|buckets| buckets.upsert_policy(bucket, record), |_, _| {})
            .map(|_| ())
    }

    fn remove_policy(&self, bucket: &str, key: &PolicyKey) -> Result<(), AdminError> {
        self.commit(|buckets| buckets.remove_policy(bucket, key), |_, _| {})
            .map(|_| ())
    }

    fn remove_bucket(&self, id: &str) -> Result<(), AdminError> {
        self.commit(|buckets| buckets.remove_bucket(id), |_, _| {})
            .map(|_| ())
    }

    fn lookup(&self, id: &str) -> Result<Arc<PolicyBucket>, PolicyError> {
        self.snapshot().require(id).cloned()
    }

    fn snapshot(&self) -> Arc<Buckets> {
        Arc::clone(&*self.current.read())
    }

    fn commit<T, A, P>(&self, apply: A, publish: P) -> Result<T, AdminError>
    where
        A: FnOnce(&mut Buckets) -> Result<T, AdminError>,
        P: FnOnce(&Buckets, &T),
    {
        let _writer = self.writer.lock();

        let mut staged = Buckets::clone(&self.snapshot());
        let outcome = apply(&mut staged)?;
        staged.advance_generation();
        let staged = Arc::new(staged);

        let mut current = self.current.write();
        publish(&staged, &outcome);
        *current = staged;
        trace!(generation = current.generation(), "Published bucket state");

        Ok(outcome)
    }
}
