//! Type-level permission registry
//!
//! Permissions belong to store *types*, not instances. Each type is defined
//! once with a parent pointer, forming a single-inheritance tree rooted at
//! [`BASE_TYPE`]. Restriction declarations attach to exactly one type;
//! resolution walks from the most-derived type towards the root.

use crate::permission::{Permission, Restriction};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};
use thiserror::Error;

/// Name of the built-in root type every store type descends from
pub const BASE_TYPE: &str = "Store";

/// Registry definition errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Unknown store type: {0}")]
    UnknownType(String),

    #[error("Store type '{name}' already extends '{existing}', cannot redefine it to extend '{requested}'")]
    ParentMismatch {
        name: String,
        existing: String,
        requested: String,
    },

    #[error("Unknown lookup mode '{0}' (expected per-field or nearest-entry)")]
    UnknownLookupMode(String),
}

/// Stable identity of a store type
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeKey(Arc<str>);

impl TypeKey {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    /// The built-in base type
    pub fn base() -> Self {
        Self::new(BASE_TYPE)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_base(&self) -> bool {
        &*self.0 == BASE_TYPE
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeKey {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for TypeKey {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

/// What a single type says about a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Declaration {
    Granted(Permission),
    /// Tombstone left by a `clear` restriction
    Cleared,
}

impl From<Restriction> for Declaration {
    fn from(restriction: Restriction) -> Self {
        match restriction {
            Restriction::Set(permission) => Declaration::Granted(permission),
            Restriction::Clear => Declaration::Cleared,
        }
    }
}

/// How resolution treats a field missing from a type's declarations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LookupMode {
    /// Keep walking to the ancestor when the field is missing; a `clear`
    /// tombstone stops the walk.
    #[default]
    PerField,
    /// The first type with any declarations at all is authoritative.
    NearestEntry,
}

impl LookupMode {
    pub fn as_str(self) -> &'static str {
        match self {
            LookupMode::PerField => "per-field",
            LookupMode::NearestEntry => "nearest-entry",
        }
    }
}

impl fmt::Display for LookupMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LookupMode {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "per-field" => Ok(LookupMode::PerField),
            "nearest-entry" => Ok(LookupMode::NearestEntry),
            other => Err(RegistryError::UnknownLookupMode(other.to_string())),
        }
    }
}

type Declarations = HashMap<String, Declaration>;

#[derive(Debug, Clone, Default)]
struct TypeEntry {
    parent: Option<TypeKey>,
    declarations: Option<Arc<Declarations>>,
}

/// Table of store types and their field declarations
///
/// Internally locked so one instance can be shared process-wide through
/// [`PermissionRegistry::global`].
#[derive(Debug)]
pub struct PermissionRegistry {
    types: RwLock<HashMap<TypeKey, TypeEntry>>,
    lookup: LookupMode,
}

impl PermissionRegistry {
    /// Create a registry holding only the base type
    pub fn new() -> Self {
        Self::with_lookup(LookupMode::default())
    }

    pub fn with_lookup(lookup: LookupMode) -> Self {
        let mut types = HashMap::new();
        types.insert(TypeKey::base(), TypeEntry::default());
        Self {
            types: RwLock::new(types),
            lookup,
        }
    }

    /// Process-wide registry used by stores built with default options
    pub fn global() -> Arc<PermissionRegistry> {
        static GLOBAL: OnceLock<Arc<PermissionRegistry>> = OnceLock::new();
        GLOBAL
            .get_or_init(|| Arc::new(PermissionRegistry::new()))
            .clone()
    }

    pub fn lookup_mode(&self) -> LookupMode {
        self.lookup
    }

    /// Define `name` as a subtype of `parent`.
    ///
    /// Redefining a type with the same parent is a no-op; a different
    /// parent is rejected so the hierarchy can never form a cycle.
    pub fn define(
        &self,
        name: impl Into<TypeKey>,
        parent: impl Into<TypeKey>,
    ) -> Result<TypeKey, RegistryError> {
        let name = name.into();
        let parent = parent.into();
        let mut types = self.types.write().unwrap_or_else(PoisonError::into_inner);

        if !types.contains_key(&parent) {
            return Err(RegistryError::UnknownType(parent.to_string()));
        }

        if let Some(existing) = types.get(&name) {
            return match &existing.parent {
                Some(current) if *current == parent => Ok(name),
                current => Err(RegistryError::ParentMismatch {
                    name: name.to_string(),
                    existing: current
                        .as_ref()
                        .map(TypeKey::to_string)
                        .unwrap_or_else(|| "nothing".to_string()),
                    requested: parent.to_string(),
                }),
            };
        }

        log::debug!("defined store type {} extends {}", name, parent);
        types.insert(
            name.clone(),
            TypeEntry {
                parent: Some(parent),
                declarations: None,
            },
        );
        Ok(name)
    }

    /// Record a restriction for `field` on exactly `ty`.
    ///
    /// The last declaration per field wins. Ancestor entries are untouched,
    /// and snapshots taken with [`declarations`](Self::declarations) before
    /// the call keep their contents.
    pub fn declare(
        &self,
        ty: &TypeKey,
        field: impl Into<String>,
        restriction: impl Into<Restriction>,
    ) -> Result<(), RegistryError> {
        let mut types = self.types.write().unwrap_or_else(PoisonError::into_inner);
        let entry = types
            .get_mut(ty)
            .ok_or_else(|| RegistryError::UnknownType(ty.to_string()))?;

        let field = field.into();
        let declaration = Declaration::from(restriction.into());
        log::trace!("{}.{} declared {:?}", ty, field, declaration);

        let declarations = entry.declarations.get_or_insert_with(Default::default);
        Arc::make_mut(declarations).insert(field, declaration);
        Ok(())
    }

    /// Declared permission for `field`, if any type in the chain declares one
    pub fn resolve(&self, ty: &TypeKey, field: &str) -> Option<Permission> {
        self.lookup(ty, field).map(|(_, permission)| permission)
    }

    /// Like [`resolve`](Self::resolve), also naming the declaring type
    pub fn lookup(&self, ty: &TypeKey, field: &str) -> Option<(TypeKey, Permission)> {
        let types = self.types.read().unwrap_or_else(PoisonError::into_inner);
        let mut current = Some(ty);

        while let Some(key) = current {
            let entry = types.get(key)?;

            if let Some(declarations) = &entry.declarations {
                match (declarations.get(field), self.lookup) {
                    (Some(Declaration::Granted(permission)), _) => {
                        return Some((key.clone(), *permission));
                    }
                    (Some(Declaration::Cleared), _) => return None,
                    (None, LookupMode::NearestEntry) => return None,
                    (None, LookupMode::PerField) => {}
                }
            }

            current = entry.parent.as_ref();
        }

        None
    }

    /// Check if `ty` has been defined
    pub fn contains(&self, ty: &TypeKey) -> bool {
        self.types
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(ty)
    }

    /// Parent of `ty` (`None` for the base type or unknown types)
    pub fn parent(&self, ty: &TypeKey) -> Option<TypeKey> {
        self.types
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(ty)
            .and_then(|entry| entry.parent.clone())
    }

    /// `ty` followed by its ancestors up to the base type
    pub fn ancestry(&self, ty: &TypeKey) -> Vec<TypeKey> {
        let types = self.types.read().unwrap_or_else(PoisonError::into_inner);
        let mut chain = Vec::new();
        let mut current = types.contains_key(ty).then(|| ty.clone());

        while let Some(key) = current {
            current = types.get(&key).and_then(|entry| entry.parent.clone());
            chain.push(key);
        }

        chain
    }

    /// Snapshot of the declarations made directly on `ty`
    pub fn declarations(&self, ty: &TypeKey) -> Option<Arc<HashMap<String, Declaration>>> {
        self.types
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(ty)
            .and_then(|entry| entry.declarations.clone())
    }

    /// All defined types, sorted by name
    pub fn types(&self) -> Vec<TypeKey> {
        let mut keys: Vec<TypeKey> = self
            .types
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }
}

impl Default for PermissionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder describing a store type and its field restrictions
///
/// ```
/// use warden::{Permission, PermissionRegistry, StoreType};
///
/// let registry = PermissionRegistry::new();
/// let admin = StoreType::new("AdminStore")
///     .restrict("user", Permission::ReadOnly)
///     .clear("name")
///     .register(&registry)
///     .unwrap();
///
/// assert_eq!(registry.resolve(&admin, "user"), Some(Permission::ReadOnly));
/// assert_eq!(registry.resolve(&admin, "name"), None);
/// ```
#[derive(Debug, Clone)]
pub struct StoreType {
    name: TypeKey,
    parent: TypeKey,
    restrictions: Vec<(String, Restriction)>,
}

impl StoreType {
    /// Start describing a direct subtype of the base type
    pub fn new(name: impl Into<TypeKey>) -> Self {
        Self {
            name: name.into(),
            parent: TypeKey::base(),
            restrictions: Vec::new(),
        }
    }

    pub fn extends(mut self, parent: impl Into<TypeKey>) -> Self {
        self.parent = parent.into();
        self
    }

    pub fn restrict(mut self, field: impl Into<String>, permission: Permission) -> Self {
        self.restrictions
            .push((field.into(), Restriction::Set(permission)));
        self
    }

    pub fn clear(mut self, field: impl Into<String>) -> Self {
        self.restrictions.push((field.into(), Restriction::Clear));
        self
    }

    /// Define the type and apply its restrictions in order
    pub fn register(self, registry: &PermissionRegistry) -> Result<TypeKey, RegistryError> {
        let key = registry.define(self.name, self.parent)?;
        for (field, restriction) in self.restrictions {
            registry.declare(&key, field, restriction)?;
        }
        Ok(key)
    }
}
