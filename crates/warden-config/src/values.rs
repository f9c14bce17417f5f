//! Accepted values for string-typed configuration keys.
//!
//! The config crate stays independent of the store crate, so permission and
//! lookup names are validated here as plain strings and parsed into typed
//! values by `warden` when a store is built.

use crate::{ConfigError, ConfigResult};

/// Default policy used when no layer sets one
pub const DEFAULT_POLICY: &str = "read-write";

/// Key that promotes a JSON fragment into a child store
pub const DEFAULT_SENTINEL_KEY: &str = "store";

/// Registry lookup mode used when no layer sets one
pub const DEFAULT_LOOKUP: &str = "per-field";

/// Audit backend used when no layer sets one
pub const DEFAULT_AUDIT_BACKEND: &str = "none";

/// Permission spellings, long and short form
pub const PERMISSION_NAMES: &[&str] = &[
    "read-only",
    "write-only",
    "read-write",
    "none",
    "r",
    "w",
    "rw",
];

/// Registry lookup modes
pub const LOOKUP_MODES: &[&str] = &["per-field", "nearest-entry"];

/// Audit backends
pub const AUDIT_BACKENDS: &[&str] = &["none", "memory", "log"];

/// Validate a permission name
pub fn validate_permission(field: &str, value: &str) -> ConfigResult<()> {
    validate_one_of(field, value, PERMISSION_NAMES)
}

/// Validate a registry lookup mode
pub fn validate_lookup(field: &str, value: &str) -> ConfigResult<()> {
    validate_one_of(field, value, LOOKUP_MODES)
}

/// Validate an audit backend name
pub fn validate_audit_backend(field: &str, value: &str) -> ConfigResult<()> {
    validate_one_of(field, value, AUDIT_BACKENDS)
}

/// Validate a sentinel key
///
/// The key must be usable as a single path segment, so it cannot be empty
/// or contain the `:` separator.
pub fn validate_sentinel_key(field: &str, value: &str) -> ConfigResult<()> {
    if value.is_empty() {
        return Err(ConfigError::InvalidValue {
            field: field.to_string(),
            reason: "sentinel key cannot be empty".to_string(),
        });
    }
    if value.contains(':') {
        return Err(ConfigError::InvalidValue {
            field: field.to_string(),
            reason: format!("sentinel key '{}' cannot contain ':'", value),
        });
    }
    Ok(())
}

fn validate_one_of(field: &str, value: &str, allowed: &[&str]) -> ConfigResult<()> {
    if allowed.contains(&value) {
        return Ok(());
    }
    Err(ConfigError::InvalidValue {
        field: field.to_string(),
        reason: format!("must be one of {}, got '{}'", allowed.join(", "), value),
    })
}
