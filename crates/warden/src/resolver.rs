//! Effective permission of a field on a store instance

use crate::permission::Permission;
use crate::registry::{PermissionRegistry, TypeKey};

/// Field name reserved for the store's own default policy
pub const DEFAULT_POLICY_KEY: &str = "defaultPolicy";

/// How a field's effective permission was decided
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The reserved `defaultPolicy` key, never accessible through paths
    Reserved,
    /// Declared by `by` (the store's own type or one of its ancestors)
    Declared { permission: Permission, by: TypeKey },
    /// Nothing declared; the store's default policy applies
    Default(Permission),
}

impl Resolution {
    pub fn permission(&self) -> Permission {
        match self {
            Resolution::Reserved => Permission::None,
            Resolution::Declared { permission, .. } => *permission,
            Resolution::Default(permission) => *permission,
        }
    }
}

/// Resolves field permissions for one store: its type plus its default policy
#[derive(Debug, Clone, Copy)]
pub struct PermissionResolver<'a> {
    registry: &'a PermissionRegistry,
    store_type: &'a TypeKey,
    default_policy: Permission,
}

impl<'a> PermissionResolver<'a> {
    pub fn new(
        registry: &'a PermissionRegistry,
        store_type: &'a TypeKey,
        default_policy: Permission,
    ) -> Self {
        Self {
            registry,
            store_type,
            default_policy,
        }
    }

    pub fn resolve(&self, field: &str) -> Resolution {
        if field == DEFAULT_POLICY_KEY {
            return Resolution::Reserved;
        }

        match self.registry.lookup(self.store_type, field) {
            Some((by, permission)) => Resolution::Declared { permission, by },
            None => Resolution::Default(self.default_policy),
        }
    }

    pub fn permission(&self, field: &str) -> Permission {
        self.resolve(field).permission()
    }

    pub fn can_read(&self, field: &str) -> bool {
        self.permission(field).allows_read()
    }

    pub fn can_write(&self, field: &str) -> bool {
        self.permission(field).allows_write()
    }
}
