//! Declarative type policies
//!
//! A policy document lists store types, their parents and field
//! restrictions, and can be written in TOML or JSON:
//!
//! ```toml
//! [[types]]
//! name = "AdminStore"
//! extends = "Store"
//!
//! [types.fields]
//! user = "read-only"
//! name = "clear"
//! ```
//!
//! Applying a document defines its types parents-first, so a document may
//! list them in any order.

use crate::permission::Restriction;
use crate::registry::{PermissionRegistry, RegistryError, TypeKey, BASE_TYPE};
use crate::resolver::DEFAULT_POLICY_KEY;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use thiserror::Error;

/// Policy document errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PolicyError {
    #[error("Policy parse error: {0}")]
    ParseError(String),

    #[error("Failed to read policy file {path}: {reason}")]
    ReadError { path: String, reason: String },

    #[error("Policy validation error: {0}")]
    ValidationError(String),

    #[error("Invalid policy field: {field} - {reason}")]
    InvalidField { field: String, reason: String },

    #[error("Type '{name}' extends unknown type '{parent}'")]
    UnknownParent { name: String, parent: String },

    #[error("Inheritance cycle between types: {}", .0.join(", "))]
    Cycle(Vec<String>),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// A set of store type definitions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyDocument {
    #[serde(default)]
    pub types: Vec<TypeDefinition>,
}

/// One store type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TypeDefinition {
    pub name: String,

    /// Parent type; the base type when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Field restrictions declared by this type
    #[serde(default)]
    pub fields: BTreeMap<String, Restriction>,
}

impl TypeDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extends: None,
            description: None,
            fields: BTreeMap::new(),
        }
    }

    pub fn parent(&self) -> &str {
        self.extends.as_deref().unwrap_or(BASE_TYPE)
    }
}

impl PolicyDocument {
    /// Load policy from TOML string
    pub fn from_toml(content: &str) -> Result<Self, PolicyError> {
        toml::from_str(content).map_err(|e| PolicyError::ParseError(e.to_string()))
    }

    /// Load policy from JSON string
    pub fn from_json(content: &str) -> Result<Self, PolicyError> {
        serde_json::from_str(content).map_err(|e| PolicyError::ParseError(e.to_string()))
    }

    /// Load a policy file; `.json` files are parsed as JSON, anything else as TOML
    pub fn load(path: &Path) -> Result<Self, PolicyError> {
        let content = std::fs::read_to_string(path).map_err(|e| PolicyError::ReadError {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let document = if is_json {
            Self::from_json(&content)?
        } else {
            Self::from_toml(&content)?
        };
        document.validate()?;
        Ok(document)
    }

    /// Validate policy
    pub fn validate(&self) -> Result<(), PolicyError> {
        let mut seen = HashSet::new();

        for definition in &self.types {
            if definition.name.is_empty() {
                return Err(PolicyError::ValidationError(
                    "Type name cannot be empty".to_string(),
                ));
            }
            if definition.name == BASE_TYPE {
                return Err(PolicyError::InvalidField {
                    field: "name".to_string(),
                    reason: format!("'{}' is the built-in base type", BASE_TYPE),
                });
            }
            if !seen.insert(definition.name.as_str()) {
                return Err(PolicyError::ValidationError(format!(
                    "Type '{}' is defined more than once",
                    definition.name
                )));
            }
            if definition.parent() == definition.name {
                return Err(PolicyError::Cycle(vec![definition.name.clone()]));
            }

            for field in definition.fields.keys() {
                validate_field_name(&definition.name, field)?;
            }
        }

        Ok(())
    }

    /// Define every type in `registry`, parents first.
    ///
    /// Returns the keys in the order they were defined.
    pub fn apply(&self, registry: &PermissionRegistry) -> Result<Vec<TypeKey>, PolicyError> {
        self.validate()?;

        let mut pending: Vec<&TypeDefinition> = self.types.iter().collect();
        let mut applied = Vec::with_capacity(pending.len());

        while !pending.is_empty() {
            let waiting: HashSet<&str> = pending.iter().map(|&d| d.name.as_str()).collect();
            let (ready, blocked): (Vec<_>, Vec<_>) = pending.into_iter().partition(|d| {
                !waiting.contains(d.parent()) && registry.contains(&TypeKey::from(d.parent()))
            });

            if ready.is_empty() {
                if let Some(orphan) = blocked.iter().find(|d| !waiting.contains(d.parent())) {
                    return Err(PolicyError::UnknownParent {
                        name: orphan.name.clone(),
                        parent: orphan.parent().to_string(),
                    });
                }
                let mut names: Vec<String> = blocked.iter().map(|d| d.name.clone()).collect();
                names.sort();
                return Err(PolicyError::Cycle(names));
            }

            for definition in ready {
                let key = registry.define(definition.name.as_str(), definition.parent())?;
                for (field, restriction) in &definition.fields {
                    registry.declare(&key, field.as_str(), *restriction)?;
                }
                log::debug!(
                    "applied policy for {} ({} fields)",
                    key,
                    definition.fields.len()
                );
                applied.push(key);
            }

            pending = blocked;
        }

        Ok(applied)
    }
}

fn validate_field_name(type_name: &str, field: &str) -> Result<(), PolicyError> {
    let reason = if field.is_empty() {
        "field name cannot be empty"
    } else if field.contains(crate::path::SEPARATOR) {
        "field name cannot contain ':'"
    } else if field == DEFAULT_POLICY_KEY {
        "defaultPolicy is reserved"
    } else {
        return Ok(());
    };

    Err(PolicyError::InvalidField {
        field: format!("{}.{}", type_name, field),
        reason: reason.to_string(),
    })
}
