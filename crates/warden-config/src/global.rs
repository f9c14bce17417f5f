//! Global Configuration (~/.warden/config.toml)
//!
//! Handles user-level configuration stored in `~/.warden/config.toml`.

use crate::project::AuditConfig;
use crate::values::{
    validate_audit_backend, validate_lookup, validate_permission, validate_sentinel_key,
};
use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Global user configuration from ~/.warden/config.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct GlobalConfig {
    /// Default settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defaults: Option<DefaultsConfig>,

    /// Audit trail settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit: Option<AuditConfig>,
}

/// Default settings applied when a project does not override them
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct DefaultsConfig {
    /// Default store policy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_policy: Option<String>,

    /// Default registry lookup mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lookup: Option<String>,

    /// Default sentinel key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentinel_key: Option<String>,
}

impl GlobalConfig {
    /// Load global configuration from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            file: path.to_path_buf(),
            error: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the global configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(defaults) = &self.defaults {
            if let Some(policy) = &defaults.default_policy {
                validate_permission("defaults.default_policy", policy)?;
            }
            if let Some(lookup) = &defaults.lookup {
                validate_lookup("defaults.lookup", lookup)?;
            }
            if let Some(sentinel) = &defaults.sentinel_key {
                validate_sentinel_key("defaults.sentinel_key", sentinel)?;
            }
        }

        if let Some(backend) = self.audit.as_ref().and_then(|a| a.backend.as_ref()) {
            validate_audit_backend("audit.backend", backend)?;
        }

        Ok(())
    }

    /// Get the global config file path (~/.warden/config.toml)
    pub fn global_config_path() -> ConfigResult<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Ok(home.join(".warden").join("config.toml"))
    }

    /// Get the default store policy
    pub fn default_policy(&self) -> Option<&str> {
        self.defaults
            .as_ref()
            .and_then(|d| d.default_policy.as_deref())
    }

    /// Get the default lookup mode
    pub fn lookup(&self) -> Option<&str> {
        self.defaults.as_ref().and_then(|d| d.lookup.as_deref())
    }

    /// Get the default sentinel key
    pub fn sentinel_key(&self) -> Option<&str> {
        self.defaults.as_ref().and_then(|d| d.sentinel_key.as_deref())
    }

    /// Get the default audit backend
    pub fn audit_backend(&self) -> Option<&str> {
        self.audit.as_ref().and_then(|a| a.backend.as_deref())
    }

    /// Merge another global config into this one
    /// Other config takes precedence for non-None values
    pub fn merge(&mut self, other: &GlobalConfig) {
        if other.defaults.is_some() {
            self.defaults = other.defaults.clone();
        }
        if other.audit.is_some() {
            self.audit = other.audit.clone();
        }
    }
}
