//! Error types for the privd service.
//!
//! Errors are organised by subsystem. `PolicyError` covers resolution and
//! store failures, `AdminError` covers rejected administrative batches and
//! `ConfigError` covers configuration loading. The root `Error` wraps all of
//! them so callers that do not care about the subsystem can use `?` freely.
//!
//! Every error maps to a stable negative integer through `code()`, which is
//! what the transport boundary hands back to clients.

use thiserror::Error;

/// Result code: referenced bucket does not exist.
pub const CODE_UNKNOWN_BUCKET: i32 = -1;
/// Result code: record carries a result the store cannot accept.
pub const CODE_INVALID_RESULT: i32 = -2;
/// Result code: two records match a query with equal specificity.
pub const CODE_AMBIGUOUS_POLICY: i32 = -3;
/// Result code: bucket chain exceeded the hop bound.
pub const CODE_CHAIN_TOO_DEEP: i32 = -4;
/// Result code: malformed administrative operation.
pub const CODE_VALIDATION_ERROR: i32 = -5;
/// Result code: caller lacks the administrative privilege.
pub const CODE_ADMIN_NOT_AUTHORIZED: i32 = -6;
/// Result code: anything else.
pub const CODE_UNEXPECTED: i32 = -7;

/// Root error type for privd.
#[derive(Debug, Error)]
pub enum Error {
    /// Policy resolution and store errors
    #[error("Policy error: {0}")]
    Policy(#[from] PolicyError),

    /// Administrative batch errors
    #[error("Admin error: {0}")]
    Admin(#[from] AdminError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Failed to install the logging subscriber
    #[error("Logging initialization failed: {0}")]
    Logging(String),
}

impl Error {
    /// The integer result code reported across the transport boundary.
    pub fn code(&self) -> i32 {
        match self {
            Self::Policy(err) => err.code(),
            Self::Admin(err) => err.code(),
            Self::Config(_) | Self::Io(_) | Self::Serialization(_) | Self::Logging(_) => {
                CODE_UNEXPECTED
            }
        }
    }
}

/// Errors raised by the bucket store and the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    /// The named bucket does not exist
    #[error("Bucket not found: '{0}'")]
    UnknownBucket(String),

    /// The record's result cannot be stored, e.g. a chain to a missing bucket
    #[error("Invalid result: {0}")]
    InvalidResult(String),

    /// Two records match the query with the same specificity
    #[error("Ambiguous policy in bucket '{bucket}': {first} and {second} match equally")]
    AmbiguousPolicy {
        /// Bucket holding the conflicting records
        bucket: String,

        /// Key of the first conflicting record
        first: String,

        /// Key of the second conflicting record
        second: String,
    },

    /// Resolution followed more bucket links than allowed
    #[error("Bucket chain exceeded {limit} hops at bucket '{bucket}'")]
    ChainTooDeep {
        /// The configured hop bound
        limit: usize,

        /// The bucket resolution would have entered next
        bucket: String,
    },
}

impl PolicyError {
    /// The integer result code of this error.
    pub fn code(&self) -> i32 {
        match self {
            Self::UnknownBucket(_) => CODE_UNKNOWN_BUCKET,
            Self::InvalidResult(_) => CODE_INVALID_RESULT,
            Self::AmbiguousPolicy { .. } => CODE_AMBIGUOUS_POLICY,
            Self::ChainTooDeep { .. } => CODE_CHAIN_TOO_DEEP,
        }
    }

    /// Whether this error signals inconsistent policy data rather than bad input.
    pub fn is_data_error(&self) -> bool {
        matches!(self, Self::AmbiguousPolicy { .. } | Self::ChainTooDeep { .. })
    }
}

/// Errors raised while applying administrative batches.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdminError {
    /// The operation is malformed
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The caller does not hold the administrative privilege
    #[error("Caller client='{client}' user='{user}' is not authorized to administer policies")]
    NotAuthorized {
        /// Client of the rejected caller
        client: String,

        /// User of the rejected caller
        user: String,
    },

    /// A store or resolution error raised while applying the batch
    #[error(transparent)]
    Policy(#[from] PolicyError),
}

impl AdminError {
    /// The integer result code of this error.
    pub fn code(&self) -> i32 {
        match self {
            Self::Validation(_) => CODE_VALIDATION_ERROR,
            Self::NotAuthorized { .. } => CODE_ADMIN_NOT_AUTHORIZED,
            Self::Policy(err) => err.code(),
        }
    }
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration source could not be read
    #[error("Failed to load configuration: {0}")]
    LoadFailed(String),

    /// The configuration could not be parsed
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    /// The configuration parsed but holds invalid values
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Result type used throughout privd.
pub type Result<T> = std::result::Result<T, Error>;
