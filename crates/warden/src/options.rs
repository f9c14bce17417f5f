//! Store construction options
//!
//! Bundles the collaborators every store needs: the registry its type is
//! resolved against, the audit backend, the sentinel key used to promote
//! child stores, and the default policy for new stores.

use crate::audit::{AuditLogger, LogAuditLogger, MemoryAuditLogger, NullAuditLogger};
use crate::permission::Permission;
use crate::policy::{PolicyDocument, PolicyError};
use crate::registry::{LookupMode, PermissionRegistry};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use warden_config::Config;

/// Default sentinel key for child store promotion
pub const DEFAULT_SENTINEL_KEY: &str = "store";

/// Errors turning configuration into store options
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OptionsError {
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Failed to apply policy {path}: {source}")]
    Policy {
        path: PathBuf,
        #[source]
        source: PolicyError,
    },
}

#[derive(Clone)]
pub struct StoreOptions {
    pub registry: Arc<PermissionRegistry>,
    pub audit: Arc<dyn AuditLogger>,
    pub sentinel_key: String,
    pub default_policy: Permission,
}

impl StoreOptions {
    pub fn with_registry(mut self, registry: Arc<PermissionRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditLogger>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_sentinel_key(mut self, key: impl Into<String>) -> Self {
        self.sentinel_key = key.into();
        self
    }

    pub fn with_default_policy(mut self, policy: Permission) -> Self {
        self.default_policy = policy;
        self
    }

    /// Build options from loaded configuration.
    ///
    /// A fresh registry is created with the configured lookup mode and every
    /// configured policy file is applied to it in order.
    pub fn from_config(config: &Config) -> Result<Self, OptionsError> {
        let default_policy = parse_value::<Permission>("default_policy", config.default_policy())?;
        let lookup = parse_value::<LookupMode>("lookup", config.lookup())?;

        let registry = Arc::new(PermissionRegistry::with_lookup(lookup));
        for path in config.policy_files() {
            PolicyDocument::load(&path)
                .and_then(|document| document.apply(&registry))
                .map_err(|source| OptionsError::Policy {
                    path: path.clone(),
                    source,
                })?;
        }

        let audit: Arc<dyn AuditLogger> = match config.audit_backend() {
            "none" => Arc::new(NullAuditLogger::new()),
            "memory" => Arc::new(MemoryAuditLogger::new()),
            "log" => Arc::new(LogAuditLogger::new()),
            other => {
                return Err(OptionsError::InvalidValue {
                    field: "audit.backend".to_string(),
                    reason: format!("unknown backend '{}'", other),
                })
            }
        };

        log::debug!(
            "store options: default {}, lookup {}, sentinel '{}', audit {}",
            default_policy,
            lookup,
            config.sentinel_key(),
            config.audit_backend()
        );

        Ok(Self {
            registry,
            audit,
            sentinel_key: config.sentinel_key().to_string(),
            default_policy,
        })
    }
}

fn parse_value<T>(field: &str, value: &str) -> Result<T, OptionsError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    value.parse().map_err(|e: T::Err| OptionsError::InvalidValue {
        field: field.to_string(),
        reason: e.to_string(),
    })
}

impl Default for StoreOptions {
    /// Global registry, no auditing, `"store"` sentinel, read-write default
    fn default() -> Self {
        Self {
            registry: PermissionRegistry::global(),
            audit: Arc::new(NullAuditLogger::new()),
            sentinel_key: DEFAULT_SENTINEL_KEY.to_string(),
            default_policy: Permission::ReadWrite,
        }
    }
}

impl fmt::Debug for StoreOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreOptions")
            .field("lookup", &self.registry.lookup_mode())
            .field("sentinel_key", &self.sentinel_key)
            .field("default_policy", &self.default_policy)
            .finish_non_exhaustive()
    }
}
