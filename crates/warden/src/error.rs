//! Store access errors

use std::fmt;
use thiserror::Error;

/// Kind of access being checked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Read,
    Write,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Read => f.write_str("read"),
            Operation::Write => f.write_str("write"),
        }
    }
}

/// Errors raised by store operations
///
/// Absent data is never an error: reads that run out of structure return
/// `Ok(None)`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Permission denied: {operation} access to '{field}' (path '{path}')")]
    PermissionDenied {
        operation: Operation,
        field: String,
        path: String,
    },

    /// A nested store on the path is mutably borrowed by an operation that
    /// is not part of this one.
    #[error("Store busy: {operation} through '{field}' reached a store already in use (path '{path}')")]
    Busy {
        operation: Operation,
        field: String,
        path: String,
    },
}

impl StoreError {
    /// The field the failure is reported against
    pub fn field(&self) -> &str {
        match self {
            StoreError::PermissionDenied { field, .. } | StoreError::Busy { field, .. } => field,
        }
    }

    /// The operation that failed
    pub fn operation(&self) -> Operation {
        match self {
            StoreError::PermissionDenied { operation, .. }
            | StoreError::Busy { operation, .. } => *operation,
        }
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;
