//! Shared helpers for warden integration tests

#![allow(dead_code)]

use std::sync::Arc;
use warden::{
    LookupMode, MemoryAuditLogger, Operation, PermissionRegistry, StoreError, StoreOptions,
    StoreResult,
};

// Re-export testing utilities
pub use pretty_assertions::{assert_eq, assert_ne};

/// Options backed by a private registry and an in-memory audit trail
pub fn isolated_options(lookup: LookupMode) -> (StoreOptions, MemoryAuditLogger) {
    let audit = MemoryAuditLogger::new();
    let options = StoreOptions::default()
        .with_registry(Arc::new(PermissionRegistry::with_lookup(lookup)))
        .with_audit(Arc::new(audit.clone()));
    (options, audit)
}

/// Assert that a store operation was denied for `field`
pub fn assert_denied<T: std::fmt::Debug>(result: StoreResult<T>, operation: Operation, field: &str) {
    match result {
        Err(StoreError::PermissionDenied {
            operation: op,
            field: f,
            ..
        }) => {
            assert_eq!(op, operation, "wrong operation denied");
            assert_eq!(f, field, "wrong field denied");
        }
        other => panic!("Expected {} of '{}' to be denied, got {:?}", operation, field, other),
    }
}
