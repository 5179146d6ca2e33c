//! # privd policy
//!
//! `privd_policy` is the policy resolution engine of the privd
//! privilege-decision service. It answers "may client C, acting as user U,
//! exercise privilege P?" and lets administrators mutate the policies behind
//! those answers while checks keep being served.
//!
//! Key concepts:
//!
//! 1. **Bucket**: A named set of policy records plus a default result. The
//!    root bucket (empty name) is where every check starts.
//!
//! 2. **Policy Record**: One rule mapping a client/user/privilege pattern to a
//!    result: `ALLOW`, `DENY`, `ASK` or `BUCKET` (continue in another bucket).
//!
//! 3. **Resolution**: Picking the most specific matching record in a bucket and
//!    following bucket links until a terminal result is reached.
//!
//! 4. **Snapshot**: Every check resolves against one immutable snapshot of the
//!    store; administrative batches publish a new snapshot atomically.

pub mod engine;
pub mod model;
pub mod service;
pub mod store;

// Re-export key types for convenience
pub use engine::{
    AdminCaller, AdminEngine, CheckAudit, CheckRecord, QueryEngine, Resolution, Resolver,
    ResultCache,
};
pub use model::{
    Decision, PolicyBatch, PolicyBucket, PolicyKey, PolicyKeyFilter, PolicyOperation,
    PolicyPattern, PolicyRecord, PolicyResult, PolicyType, Query, Verdict, ROOT_BUCKET,
};
pub use service::{PrivilegeService, ServiceStats};
pub use store::{BucketStore, Buckets, InMemoryBucketStore};
