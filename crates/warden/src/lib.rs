//! Warden - hierarchical key-value store with per-field permissions
//!
//! Every field of a [`Store`] carries a read/write [`Permission`]. Permissions
//! are declared on store *types* in a [`PermissionRegistry`] and inherited by
//! subtypes; fields nobody declared fall back to the store's default policy.
//!
//! Fields are addressed with colon-delimited paths. Nested stores keep their
//! own type, so a path crossing into one is judged by that store's rules.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use warden::{Permission, PermissionRegistry, Store, StoreOptions, StoreType, StoreValue};
//!
//! let registry = Arc::new(PermissionRegistry::new());
//! let profile = StoreType::new("Profile")
//!     .restrict("id", Permission::ReadOnly)
//!     .register(&registry)
//!     .unwrap();
//!
//! let options = StoreOptions::default().with_registry(registry);
//! let mut store = Store::with_options(profile, options).with_field("id", 7);
//!
//! assert!(store.write("id", 8).is_err());
//! store.write("settings:theme", "dark").unwrap();
//! assert_eq!(
//!     store.read("settings:theme").unwrap(),
//!     Some(StoreValue::from("dark"))
//! );
//! ```

pub mod audit;
pub mod error;
pub mod options;
pub mod path;
pub mod permission;
pub mod policy;
pub mod preprocess;
pub mod registry;
pub mod resolver;
pub mod store;
pub mod value;

pub use audit::{
    AuditEntry, AuditEvent, AuditLogger, LogAuditLogger, MemoryAuditLogger, NullAuditLogger,
};
pub use error::{Operation, StoreError, StoreResult};
pub use options::{OptionsError, StoreOptions};
pub use path::StorePath;
pub use permission::{Permission, Restriction};
pub use policy::{PolicyDocument, PolicyError, TypeDefinition};
pub use registry::{LookupMode, PermissionRegistry, RegistryError, StoreType, TypeKey, BASE_TYPE};
pub use resolver::{Resolution, DEFAULT_POLICY_KEY};
pub use store::{Store, MAX_ARRAY_GAP};
pub use value::{Provider, SharedStore, StoreMap, StoreValue};
