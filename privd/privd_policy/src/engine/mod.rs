//! Policy engines.
//!
//! This module provides the resolver, the read path (`QueryEngine`), the
//! write path (`AdminEngine`) and their shared result cache and audit.

mod admin;
mod audit;
mod cache;
mod query;
mod resolver;

pub use admin::{AdminCaller, AdminEngine, DEFAULT_ADMIN_PRIVILEGE};
pub use audit::{
    CheckAudit, CheckOutcome, CheckRecord, DEFAULT_AUDIT_CAPACITY, DEFAULT_AUDIT_MAX_CLIENTS,
};
pub use cache::{CacheStats, ResultCache, DEFAULT_CACHE_CAPACITY};
pub use query::QueryEngine;
pub use resolver::{Resolution, Resolver, DEFAULT_MAX_CHAIN_HOPS};
