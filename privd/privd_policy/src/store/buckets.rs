//! The bucket map.
//!
//! `Buckets` is one complete, self-consistent state of the policy store.
//! Published states are immutable and shared behind an `Arc`; writers clone
//! one (buckets are shared until touched) and mutate the copy.

use privd_core::{AdminError, PolicyError};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;

use crate::model::{
    validate_bucket_id, PolicyBucket, PolicyKey, PolicyKeyFilter, PolicyOperation, PolicyRecord,
    PolicyResult, ROOT_BUCKET,
};

/// Names of the buckets changed by a mutation.
pub type TouchedBuckets = BTreeSet<String>;

/// A complete state of the policy store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Buckets {
    buckets: HashMap<String, Arc<PolicyBucket>>,
    generation: u64,
}

impl Buckets {
    /// A state holding only the root bucket.
    pub fn with_root(default: PolicyResult) -> Result<Self, PolicyError> {
        let root = PolicyBucket::new(ROOT_BUCKET, default)?;
        let mut buckets = HashMap::new();
        buckets.insert(ROOT_BUCKET.to_string(), Arc::new(root));
        Ok(Self {
            buckets,
            generation: 0,
        })
    }

    /// Generation of this state; every committed change increments it.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn advance_generation(&mut self) {
        self.generation += 1;
    }

    /// Get a bucket.
    pub fn get(&self, id: &str) -> Option<&Arc<PolicyBucket>> {
        self.buckets.get(id)
    }

    /// Get a bucket, failing with `UnknownBucket` if it does not exist.
    pub fn require(&self, id: &str) -> Result<&Arc<PolicyBucket>, PolicyError> {
        self.buckets
            .get(id)
            .ok_or_else(|| PolicyError::UnknownBucket(id.to_string()))
    }

    /// Whether a bucket exists.
    pub fn contains(&self, id: &str) -> bool {
        self.buckets.contains_key(id)
    }

    /// Bucket names in sorted order.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.buckets.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Number of buckets.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Always false: the root bucket cannot be removed.
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Total number of records across all buckets.
    pub fn policy_count(&self) -> usize {
        self.buckets.values().map(|bucket| bucket.len()).sum()
    }

    fn bucket_mut(&mut self, id: &str) -> Result<&mut PolicyBucket, PolicyError> {
        self.buckets
            .get_mut(id)
            .map(Arc::make_mut)
            .ok_or_else(|| PolicyError::UnknownBucket(id.to_string()))
    }

    /// Create a new bucket; fails if it already exists.
    pub fn create_bucket(
        &mut self,
        id: &str,
        default: PolicyResult,
    ) -> Result<TouchedBuckets, AdminError> {
        validate_bucket_id(id)?;
        if self.contains(id) {
            return Err(AdminError::Validation(format!(
                "bucket '{}' already exists",
                id
            )));
        }
        let bucket = PolicyBucket::new(id, default)?;
        self.buckets.insert(id.to_string(), Arc::new(bucket));
        Ok(TouchedBuckets::from([id.to_string()]))
    }

    /// Create a bucket, or replace the default of an existing one.
    pub fn set_bucket(
        &mut self,
        id: &str,
        default: PolicyResult,
    ) -> Result<TouchedBuckets, AdminError> {
        if self.contains(id) {
            self.bucket_mut(id)?.set_default(default)?;
            Ok(TouchedBuckets::from([id.to_string()]))
        } else {
            self.create_bucket(id, default)
        }
    }

    /// Insert or replace a record.
    ///
    /// A `BUCKET` record must target a bucket that exists in this state.
    pub fn upsert_policy(
        &mut self,
        bucket: &str,
        record: PolicyRecord,
    ) -> Result<TouchedBuckets, AdminError> {
        if !self.contains(bucket) {
            return Err(PolicyError::UnknownBucket(bucket.to_string()).into());
        }
        if let Some(target) = record.result().bucket_target() {
            if !self.contains(target) {
                return Err(PolicyError::InvalidResult(format!(
                    "record {} links to missing bucket '{}'",
                    record.key(),
                    target
                ))
                .into());
            }
        }
        self.bucket_mut(bucket)?.upsert(record);
        Ok(TouchedBuckets::from([bucket.to_string()]))
    }

    /// Remove the record with `key`. A missing record is not an error.
    pub fn remove_policy(
        &mut self,
        bucket: &str,
        key: &PolicyKey,
    ) -> Result<TouchedBuckets, AdminError> {
        if self.require(bucket)?.get(key).is_none() {
            return Ok(TouchedBuckets::new());
        }
        self.bucket_mut(bucket)?.remove(key);
        Ok(TouchedBuckets::from([bucket.to_string()]))
    }

    /// Remove a bucket and every record elsewhere that links to it.
    pub fn remove_bucket(&mut self, id: &str) -> Result<TouchedBuckets, AdminError> {
        if id == ROOT_BUCKET {
            return Err(AdminError::Validation(
                "the root bucket cannot be removed".to_string(),
            ));
        }
        if self.buckets.remove(id).is_none() {
            return Err(PolicyError::UnknownBucket(id.to_string()).into());
        }

        let mut touched = TouchedBuckets::from([id.to_string()]);
        let linking: Vec<String> = self
            .buckets
            .values()
            .filter(|bucket| bucket.link_targets().any(|target| target == id))
            .map(|bucket| bucket.id().to_string())
            .collect();

        for name in linking {
            self.bucket_mut(&name)?
                .remove_where(|record| record.result().bucket_target() == Some(id));
            touched.insert(name);
        }

        Ok(touched)
    }

    /// Remove the records selected by `filter` from `bucket` and, when
    /// `recursive`, from every bucket reachable from it through links.
    ///
    /// Reachability is computed before anything is removed.
    pub fn erase(
        &mut self,
        bucket: &str,
        recursive: bool,
        filter: &PolicyKeyFilter,
    ) -> Result<TouchedBuckets, AdminError> {
        self.require(bucket)?;

        let targets = if recursive {
            self.reachable_from(bucket)
        } else {
            vec![bucket.to_string()]
        };

        let mut touched = TouchedBuckets::new();
        for name in targets {
            let matching = self.require(&name)?.filtered(filter);
            if matching.is_empty() {
                continue;
            }
            self.bucket_mut(&name)?
                .remove_where(|record| filter.matches(record.key()));
            touched.insert(name);
        }

        Ok(touched)
    }

    /// Buckets reachable from `start` through links, `start` included.
    pub fn reachable_from(&self, start: &str) -> Vec<String> {
        let mut seen = BTreeSet::new();
        let mut order = Vec::new();
        let mut queue = VecDeque::from([start.to_string()]);

        while let Some(name) = queue.pop_front() {
            if !seen.insert(name.clone()) {
                continue;
            }
            if let Some(bucket) = self.buckets.get(&name) {
                queue.extend(bucket.link_targets().map(str::to_string));
                order.push(name);
            }
        }

        order
    }

    /// Apply one administrative operation.
    pub fn apply(&mut self, operation: &PolicyOperation) -> Result<TouchedBuckets, AdminError> {
        match operation {
            PolicyOperation::SetBucket { bucket, default } => {
                self.set_bucket(bucket, default.clone())
            }
            PolicyOperation::RemoveBucket { bucket } => self.remove_bucket(bucket),
            PolicyOperation::Upsert { bucket, record } => {
                self.upsert_policy(bucket, record.clone())
            }
            PolicyOperation::Remove { bucket, key } => self.remove_policy(bucket, key),
            PolicyOperation::Erase {
                bucket,
                recursive,
                filter,
            } => self.erase(bucket, *recursive, filter),
        }
    }
}
