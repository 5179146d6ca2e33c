//! Utility types.
//!
//! Engine configuration and logging setup shared by the privd crates.

pub mod config;
pub mod logging;

pub use config::{AdminIdentity, DefaultDecision, EngineConfig, InvalidationMode};
pub use logging::{init_logging, LogLevel};
