//! # privd core
//!
//! `privd_core` holds the building blocks shared by every privd crate:
//! the error hierarchy and its integer result codes, strongly-typed
//! identifiers, engine configuration and logging setup.
//!
//! The policy engine itself lives in `privd_policy`; this crate carries no
//! decision logic.
//!
//! ## Crate Structure
//!
//! - **error**: Error types and transport result codes
//! - **id**: Strongly-typed identifier types
//! - **utils**: Configuration and logging helpers

pub mod error;
pub mod id;
pub mod utils;

pub use error::{AdminError, ConfigError, Error, PolicyError, Result};
pub use id::{BatchId, CheckId};
pub use utils::{AdminIdentity, DefaultDecision, EngineConfig, InvalidationMode, LogLevel};
