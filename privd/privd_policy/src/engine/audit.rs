//! Check auditing.
//!
//! This module records every privilege check, keeping a bounded history per
//! client for a bounded number of clients.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use privd_core::CheckId;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

use crate::model::{Decision, Query, Verdict};

/// Default number of records kept per client.
pub const DEFAULT_AUDIT_CAPACITY: usize = 1000;

/// Default number of clients with a history.
pub const DEFAULT_AUDIT_MAX_CLIENTS: usize = 1024;

/// How a check ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "value", rename_all = "snake_case")]
pub enum CheckOutcome {
    /// The check produced a verdict.
    Verdict(Verdict),

    /// The check failed with an error code.
    Failed(i32),
}

/// One audited check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRecord {
    /// Correlation id of the check.
    pub id: CheckId,

    /// Client of the query.
    pub client: String,

    /// Session of the query.
    pub session: String,

    /// User of the query.
    pub user: String,

    /// Privilege of the query.
    pub privilege: String,

    /// How the check ended.
    pub outcome: CheckOutcome,

    /// Whether the decision came from the result cache.
    pub cached: bool,

    /// When the check completed.
    pub timestamp: DateTime<Utc>,
}

impl CheckRecord {
    /// Record a check that produced a decision.
    pub fn decided(id: CheckId, query: &Query, decision: &Decision, cached: bool) -> Self {
        Self::new(id, query, CheckOutcome::Verdict(decision.verdict), cached)
    }

    /// Record a check that failed with `code`.
    pub fn failed(id: CheckId, query: &Query, code: i32) -> Self {
        Self::new(id, query, CheckOutcome::Failed(code), false)
    }

    fn new(id: CheckId, query: &Query, outcome: CheckOutcome, cached: bool) -> Self {
        Self {
            id,
            client: query.client.clone(),
            session: query.session.clone(),
            user: query.user.clone(),
            privilege: query.privilege.clone(),
            outcome,
            cached,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Default)]
struct ClientLog {
    last_seen: u64,
    records: VecDeque<CheckRecord>,
}

/// A check audit.
///
/// This audit records the most recent checks of each client. Once more than
/// `max_clients` clients have a history, the least recently seen client's
/// history is dropped.
#[derive(Clone)]
pub struct CheckAudit {
    /// The audit entries, by client.
    entries: Arc<DashMap<String, ClientLog>>,

    /// Orders client activity.
    clock: Arc<AtomicU64>,

    /// The maximum number of entries to keep per client.
    max_entries_per_client: usize,

    /// The maximum number of clients to keep a history for; zero is unbounded.
    max_clients: usize,
}

impl CheckAudit {
    /// Create a new check audit.
    ///
    /// # Arguments
    ///
    /// * `max_entries_per_client` - The maximum number of entries to keep per
    ///   client. Zero disables recording.
    pub fn new(max_entries_per_client: usize) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            clock: Arc::new(AtomicU64::new(0)),
            max_entries_per_client,
            max_clients: DEFAULT_AUDIT_MAX_CLIENTS,
        }
    }

    /// Limit the number of clients with a history; zero removes the limit.
    pub fn with_max_clients(mut self, max_clients: usize) -> Self {
        self.max_clients = max_clients;
        self
    }

    /// Number of clients with a history.
    pub fn client_count(&self) -> usize {
        self.entries.len()
    }

    /// Whether records are kept.
    pub fn is_enabled(&self) -> bool {
        self.max_entries_per_client > 0
    }

    /// Record a check.
    pub fn record(&self, record: CheckRecord) {
        if !self.is_enabled() {
            return;
        }

        let seen = self.clock.fetch_add(1, Ordering::Relaxed) + 1;
        {
            let mut log = self.entries.entry(record.client.clone()).or_default();
            log.last_seen = seen;
            log.records.push_back(record);
            while log.records.len() > self.max_entries_per_client {
                log.records.pop_front();
            }
        }

        if self.max_clients > 0 {
            while self.entries.len() > self.max_clients {
                if !self.evict_least_recent() {
                    break;
                }
            }
        }
    }

    fn evict_least_recent(&self) -> bool {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.value().last_seen)
            .map(|entry| entry.key().clone());

        match oldest {
            Some(client) => {
                trace!(%client, "Evicted audit history");
                self.entries.remove(&client).is_some()
            }
            None => false,
        }
    }

    /// Get the records of a client, oldest first.
    pub fn records_for(&self, client: &str) -> Vec<CheckRecord> {
        match self.entries.get(client) {
            Some(log) => log.records.iter().cloned().collect(),
            None => Vec::new(),
        }
    }

    /// Clear the records of a client.
    pub fn clear_client(&self, client: &str) {
        self.entries.remove(client);
    }

    /// Get all records.
    pub fn all_records(&self) -> Vec<CheckRecord> {
        let mut records = Vec::new();

        for entry in self.entries.iter() {
            records.extend(entry.value().records.iter().cloned());
        }

        records
    }

    /// Get records filtered by outcome.
    pub fn records_by_outcome(&self, outcome: &CheckOutcome) -> Vec<CheckRecord> {
        let mut records = Vec::new();

        for entry in self.entries.iter() {
            for record in &entry.value().records {
                if &record.outcome == outcome {
                    records.push(record.clone());
                }
            }
        }

        records
    }

    /// Total number of records held.
    pub fn len(&self) -> usize {
        self.entries
            .iter()
            .map(|entry| entry.value().records.len())
            .sum()
    }

    /// Whether no records are held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for CheckAudit {
    fn default() -> Self {
        Self::new(DEFAULT_AUDIT_CAPACITY)
    }
}
