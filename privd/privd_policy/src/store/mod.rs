//! Bucket storage.
//!
//! This module provides storage for policy buckets. Stores publish complete
//! states (`Buckets`) so that a multi-hop resolution always reads one
//! consistent view.

mod buckets;
mod in_memory;

pub use buckets::{Buckets, TouchedBuckets};
pub use in_memory::InMemoryBucketStore;

use privd_core::{AdminError, PolicyError};
use std::sync::Arc;

use crate::model::{PolicyBucket, PolicyKey, PolicyRecord, PolicyResult};

/// Trait for bucket storage.
///
/// Every mutation that returns success is visible to every snapshot taken
/// afterwards.
pub trait BucketStore: Send + Sync {
    /// Create a bucket.
    ///
    /// # Arguments
    ///
    /// * `id` - The name of the new bucket.
    /// * `default` - The result used when no record in the bucket matches.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If the bucket was created.
    /// * `Err` - If the name is malformed or taken, or the default is `BUCKET`.
    fn create_bucket(&self, id: &str, default: PolicyResult) -> Result<(), AdminError>;

    /// Insert a record, replacing any record with the same key.
    ///
    /// # Arguments
    ///
    /// * `bucket` - The bucket receiving the record.
    /// * `record` - The record.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If the record was stored.
    /// * `Err` - `UnknownBucket` if the bucket does not exist, `InvalidResult`
    ///   if the record links to a missing bucket.
    fn upsert_policy(&self, bucket: &str, record: PolicyRecord) -> Result<(), AdminError>;

    /// Remove a record.
    ///
    /// # Arguments
    ///
    /// * `bucket` - The bucket holding the record.
    /// * `key` - The key of the record.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If the record was removed or was not there.
    /// * `Err` - `UnknownBucket` if the bucket does not exist.
    fn remove_policy(&self, bucket: &str, key: &PolicyKey) -> Result<(), AdminError>;

    /// Remove a bucket together with every record linking to it.
    ///
    /// # Arguments
    ///
    /// * `id` - The bucket to remove.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If the bucket was removed.
    /// * `Err` - If the bucket does not exist or is the root bucket.
    fn remove_bucket(&self, id: &str) -> Result<(), AdminError>;

    /// Get a bucket from the current state.
    ///
    /// # Arguments
    ///
    /// * `id` - The bucket to look up.
    ///
    /// # Returns
    ///
    /// * `Ok(Arc<PolicyBucket>)` - The bucket as currently published.
    /// * `Err` - `UnknownBucket` if the bucket does not exist.
    fn lookup(&self, id: &str) -> Result<Arc<PolicyBucket>, PolicyError>;

    /// The currently published state.
    fn snapshot(&self) -> Arc<Buckets>;

    /// Apply a group of changes atomically.
    ///
    /// `apply` runs against a private copy of the current state. If it fails
    /// the copy is discarded and nothing is published. Otherwise `publish`
    /// runs while readers are excluded, and the copy becomes the current
    /// state before any reader can take another snapshot.
    fn commit<T, A, P>(&self, apply: A, publish: P) -> Result<T, AdminError>
    where
        A: FnOnce(&mut Buckets) -> Result<T, AdminError>,
        P: FnOnce(&Buckets, &T);
}
