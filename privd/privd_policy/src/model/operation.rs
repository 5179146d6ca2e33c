//! Administrative operations and batches.
//!
//! A batch is an ordered list of operations applied atomically. Batches have
//! a file form (TOML or JSON) in which each operation is a table tagged by
//! `op`:
//!
//! ```toml
//! [[operations]]
//! op = "set_bucket"
//! bucket = "apps"
//! result = "DENY"
//!
//! [[operations]]
//! op = "upsert"
//! bucket = ""
//! client = "*"
//! user = "*"
//! privilege = "*"
//! result = "BUCKET"
//! result_extra = "apps"
//! ```

use privd_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::model::{PolicyKey, PolicyKeyFilter, PolicyRecord, PolicyResult};

/// One administrative operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PolicyOperation {
    /// Create a bucket, or replace the default of an existing one.
    SetBucket {
        /// Bucket to create or update.
        bucket: String,

        /// The bucket's default result.
        #[serde(flatten)]
        default: PolicyResult,
    },

    /// Delete a bucket, its records and every record linking to it.
    RemoveBucket {
        /// Bucket to delete.
        bucket: String,
    },

    /// Insert a record, replacing any record with the same key.
    Upsert {
        /// Bucket receiving the record.
        bucket: String,

        /// The record.
        #[serde(flatten)]
        record: PolicyRecord,
    },

    /// Delete the record with the given key, if present.
    Remove {
        /// Bucket holding the record.
        bucket: String,

        /// Key of the record.
        #[serde(flatten)]
        key: PolicyKey,
    },

    /// Delete every record selected by a filter.
    Erase {
        /// Bucket to erase from.
        bucket: String,

        /// Also erase from every bucket reachable through links.
        #[serde(default)]
        recursive: bool,

        /// Records to erase.
        #[serde(default)]
        filter: PolicyKeyFilter,
    },
}

impl PolicyOperation {
    /// The bucket this operation addresses.
    pub fn bucket(&self) -> &str {
        match self {
            Self::SetBucket { bucket, .. }
            | Self::RemoveBucket { bucket }
            | Self::Upsert { bucket, .. }
            | Self::Remove { bucket, .. }
            | Self::Erase { bucket, .. } => bucket,
        }
    }

    /// Short operation name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetBucket { .. } => "set_bucket",
            Self::RemoveBucket { .. } => "remove_bucket",
            Self::Upsert { .. } => "upsert",
            Self::Remove { .. } => "remove",
            Self::Erase { .. } => "erase",
        }
    }
}

impl fmt::Display for PolicyOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SetBucket { bucket, default } => {
                write!(f, "set_bucket '{}' default {}", bucket, default)
            }
            Self::RemoveBucket { bucket } => write!(f, "remove_bucket '{}'", bucket),
            Self::Upsert { bucket, record } => write!(f, "upsert '{}' {}", bucket, record),
            Self::Remove { bucket, key } => write!(f, "remove '{}' {}", bucket, key),
            Self::Erase {
                bucket,
                recursive,
                filter,
            } => write!(
                f,
                "erase '{}' {} recursive={}",
                bucket, filter, recursive
            ),
        }
    }
}

/// An ordered list of operations applied as one unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyBatch {
    /// The operations, in application order.
    #[serde(default)]
    pub operations: Vec<PolicyOperation>,
}

impl PolicyBatch {
    /// Create a batch from operations.
    pub fn new(operations: Vec<PolicyOperation>) -> Self {
        Self { operations }
    }

    /// Append an operation.
    pub fn push(&mut self, operation: PolicyOperation) -> &mut Self {
        self.operations.push(operation);
        self
    }

    /// Number of operations.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Whether the batch has no operations.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Parse a batch from TOML.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Parse a batch from JSON.
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Load a batch file; `.json` files are parsed as JSON, everything else as TOML.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&text),
            _ => Self::from_toml_str(&text),
        }
    }

    /// Render the batch as TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| Error::Serialization(e.to_string()))
    }
}

impl From<Vec<PolicyOperation>> for PolicyBatch {
    fn from(operations: Vec<PolicyOperation>) -> Self {
        Self::new(operations)
    }
}
