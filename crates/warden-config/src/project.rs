//! Project Configuration (warden.toml)
//!
//! Handles project-level configuration stored in `warden.toml` at the project root.

use crate::values::{
    validate_audit_backend, validate_lookup, validate_permission, validate_sentinel_key,
};
use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name searched for when discovering a project
pub const PROJECT_CONFIG_FILE: &str = "warden.toml";

/// Project configuration from warden.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Store defaults
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store: Option<StoreConfig>,

    /// Permission registry settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry: Option<RegistryConfig>,

    /// Audit trail settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit: Option<AuditConfig>,
}

/// Store defaults
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Fallback permission for undeclared fields ("read-write", "none", ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_policy: Option<String>,

    /// Key that promotes a nested object into a child store (default: "store")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentinel_key: Option<String>,
}

/// Permission registry settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct RegistryConfig {
    /// Lookup mode ("per-field" or "nearest-entry")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lookup: Option<String>,

    /// Policy documents applied in order, relative to the project root
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub policies: Vec<PathBuf>,
}

/// Audit trail settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// Backend ("none", "memory", "log")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
}

impl ProjectConfig {
    /// Load project configuration from a file
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

    /// Validate the project configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(store) = &self.store {
            if let Some(policy) = &store.default_policy {
                validate_permission("store.default_policy", policy)?;
            }
            if let Some(sentinel) = &store.sentinel_key {
                validate_sentinel_key("store.sentinel_key", sentinel)?;
            }
        }

        if let Some(registry) = &self.registry {
            if let Some(lookup) = &registry.lookup {
                validate_lookup("registry.lookup", lookup)?;
            }
            for policy in &registry.policies {
                if policy.as_os_str().is_empty() {
                    return Err(ConfigError::InvalidValue {
                        field: "registry.policies".to_string(),
                        reason: "policy path cannot be empty".to_string(),
                    });
                }
            }
        }

        if let Some(backend) = self.audit.as_ref().and_then(|a| a.backend.as_ref()) {
            validate_audit_backend("audit.backend", backend)?;
        }

        Ok(())
    }

    /// Get the default policy, if present
    pub fn default_policy(&self) -> Option<&str> {
        self.store.as_ref().and_then(|s| s.default_policy.as_deref())
    }

    /// Get the sentinel key, if present
    pub fn sentinel_key(&self) -> Option<&str> {
        self.store.as_ref().and_then(|s| s.sentinel_key.as_deref())
    }

    /// Get the registry lookup mode, if present
    pub fn lookup(&self) -> Option<&str> {
        self.registry.as_ref().and_then(|r| r.lookup.as_deref())
    }

    /// Get the audit backend, if present
    pub fn audit_backend(&self) -> Option<&str> {
        self.audit.as_ref().and_then(|a| a.backend.as_deref())
    }

    /// Policy documents as written in the file
    pub fn policies(&self) -> &[PathBuf] {
        self.registry
            .as_ref()
            .map(|r| r.policies.as_slice())
            .unwrap_or(&[])
    }

    /// Merge another project config into this one
    /// Other config takes precedence for non-None values
    pub fn merge(&mut self, other: &ProjectConfig) {
        if other.store.is_some() {
            self.store = other.store.clone();
        }
        if other.registry.is_some() {
            self.registry = other.registry.clone();
        }
        if other.audit.is_some() {
            self.audit = other.audit.clone();
        }
    }
}
