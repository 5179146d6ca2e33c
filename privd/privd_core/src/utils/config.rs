//! Engine configuration.
//!
//! Handles loading and validating the configuration of the policy engine.
//! Every field has a default, so an empty TOML document is a valid
//! configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::utils::logging::LogLevel;

/// How the result cache is invalidated after an administrative batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InvalidationMode {
    /// Drop only entries whose resolution visited a mutated bucket.
    #[default]
    Scoped,

    /// Drop every entry.
    Global,
}

/// A terminal decision usable as the root bucket's initial default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum DefaultDecision {
    /// Grant the privilege.
    Allow,

    /// Refuse the privilege.
    #[default]
    Deny,

    /// Defer to an interactive agent.
    Ask,
}

/// An identity that is granted the administrative privilege at start-up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminIdentity {
    /// Client label of the administrator.
    pub client: String,

    /// User of the administrator.
    pub user: String,
}

/// Policy engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum number of bucket links a single resolution may follow
    #[serde(default = "default_max_chain_hops")]
    pub max_chain_hops: usize,

    /// Number of cached check results; zero disables the cache
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Cache invalidation strategy
    #[serde(default)]
    pub cache_invalidation: InvalidationMode,

    /// Default result of the root bucket at start-up
    #[serde(default)]
    pub root_default: DefaultDecision,

    /// Privilege a caller must hold to administer policies
    #[serde(default = "default_admin_privilege")]
    pub admin_privilege: String,

    /// Identities granted the administrative privilege at start-up
    #[serde(default)]
    pub bootstrap_admins: Vec<AdminIdentity>,

    /// Audit records kept per client; zero disables auditing
    #[serde(default = "default_audit_capacity")]
    pub audit_capacity: usize,

    /// Clients with an audit history; the least recently seen is dropped
    /// beyond this. Zero is unbounded
    #[serde(default = "default_audit_max_clients")]
    pub audit_max_clients: usize,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: LogLevel,

    /// Emit logs as JSON lines
    #[serde(default)]
    pub log_json: bool,
}

fn default_max_chain_hops() -> usize {
    16
}

fn default_cache_capacity() -> usize {
    10_000
}

fn default_admin_privilege() -> String {
    "privd.admin".to_string()
}

fn default_audit_capacity() -> usize {
    1000
}

fn default_audit_max_clients() -> usize {
    1024
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_chain_hops: default_max_chain_hops(),
            cache_capacity: default_cache_capacity(),
            cache_invalidation: InvalidationMode::default(),
            root_default: DefaultDecision::default(),
            admin_privilege: default_admin_privilege(),
            bootstrap_admins: Vec::new(),
            audit_capacity: default_audit_capacity(),
            audit_max_clients: default_audit_max_clients(),
            log_level: default_log_level(),
            log_json: false,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(text).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load, parse and validate a configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadFailed(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    /// Check the configuration for values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_chain_hops == 0 {
            return Err(ConfigError::Invalid(
                "max_chain_hops must be at least 1".to_string(),
            ));
        }

        if self.admin_privilege.is_empty() {
            return Err(ConfigError::Invalid(
                "admin_privilege must not be empty".to_string(),
            ));
        }

        for admin in &self.bootstrap_admins {
            if admin.client.is_empty() || admin.user.is_empty() {
                return Err(ConfigError::Invalid(
                    "bootstrap admin client and user must not be empty".to_string(),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config.max_chain_hops, 16);
        assert_eq!(config.cache_capacity, 10_000);
        assert_eq!(config.cache_invalidation, InvalidationMode::Scoped);
        assert_eq!(config.root_default, DefaultDecision::Deny);
        assert_eq!(config.admin_privilege, "privd.admin");
        assert!(config.bootstrap_admins.is_empty());
        assert_eq!(config.audit_max_clients, 1024);
        assert_eq!(config.log_level, LogLevel::Info);
    }

    #[test]
    fn test_parse_full_document() {
        let text = r#"
            max_chain_hops = 4
            cache_capacity = 0
            cache_invalidation = "global"
            root_default = "ALLOW"
            admin_privilege = "policy.admin"
            log_level = "debug"

            [[bootstrap_admins]]
            client = "setup"
            user = "root"
        "#;
        let config = EngineConfig::from_toml_str(text).unwrap();
        assert_eq!(config.max_chain_hops, 4);
        assert_eq!(config.cache_capacity, 0);
        assert_eq!(config.cache_invalidation, InvalidationMode::Global);
        assert_eq!(config.root_default, DefaultDecision::Allow);
        assert_eq!(config.admin_privilege, "policy.admin");
        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(
            config.bootstrap_admins,
            vec![AdminIdentity {
                client: "setup".into(),
                user: "root".into()
            }]
        );
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = EngineConfig::from_toml_str("max_chain_hops = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = EngineConfig::from_toml_str("admin_privilege = \"\"").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        // A chain is never a valid root default
        let err = EngineConfig::from_toml_str("root_default = \"BUCKET\"").unwrap_err();
        assert!(matches!(err, ConfigError::ParseFailed(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "cache_capacity = 12").unwrap();
        let config = EngineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.cache_capacity, 12);

        let err = EngineConfig::from_file("/nonexistent/privd.toml").unwrap_err();
        assert!(matches!(err, ConfigError::LoadFailed(_)));
    }
}
