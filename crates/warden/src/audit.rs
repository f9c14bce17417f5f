//! Permission audit trail
//!
//! Every permission check a store performs is reported to an [`AuditLogger`],
//! along with entries skipped by bulk writes, provider invocations and
//! child-store promotions. Backends are pluggable so tests can capture
//! events in memory while applications forward them to the `log` facade.

use crate::error::Operation;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

/// Audit event types
#[derive(Debug, Clone, PartialEq)]
pub enum AuditEvent {
    /// Permission check on a single field
    PermissionCheck {
        operation: Operation,
        field: String,
        path: String,
        granted: bool,
    },
    /// Bulk write skipped a field that is not writable
    EntrySkipped { field: String },
    /// A lazy value provider was invoked to realize a field
    ProviderInvoked { field: String },
    /// A plain object was promoted to a child store
    StorePromoted { at: String },
}

impl AuditEvent {
    /// Check if this event records a denial
    pub fn is_denial(&self) -> bool {
        matches!(
            self,
            AuditEvent::PermissionCheck { granted: false, .. } | AuditEvent::EntrySkipped { .. }
        )
    }
}

impl fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditEvent::PermissionCheck {
                operation,
                field,
                path,
                granted,
            } => {
                let status = if *granted { "GRANTED" } else { "DENIED" };
                write!(
                    f,
                    "Permission {}: {} access to '{}' (path '{}')",
                    status, operation, field, path
                )
            }
            AuditEvent::EntrySkipped { field } => {
                write!(f, "Entry skipped: '{}' is not writable", field)
            }
            AuditEvent::ProviderInvoked { field } => {
                write!(f, "Provider invoked for '{}'", field)
            }
            AuditEvent::StorePromoted { at } => {
                write!(f, "Child store created at '{}'", at)
            }
        }
    }
}

/// Audit log entry with timestamp
#[derive(Debug, Clone)]
pub struct AuditEntry {
    /// Event timestamp (Unix timestamp in milliseconds)
    pub timestamp: u64,
    /// Audit event
    pub event: AuditEvent,
}

impl AuditEntry {
    /// Create a new audit entry with current timestamp
    pub fn new(event: AuditEvent) -> Self {
        Self {
            timestamp: current_timestamp_ms(),
            event,
        }
    }

    /// Format as log line
    pub fn to_log_line(&self) -> String {
        format!(
            "[{}+{:03}ms] {}",
            self.timestamp / 1000,
            self.timestamp % 1000,
            self.event
        )
    }
}

fn current_timestamp_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Audit logger trait for customizable logging backends
pub trait AuditLogger: Send + Sync {
    /// Log an audit event
    fn log(&self, event: AuditEvent);

    /// Get all logged entries (for testing)
    fn entries(&self) -> Vec<AuditEntry>;

    /// Clear all logged entries (for testing)
    fn clear(&self);
}

/// In-memory audit logger
#[derive(Debug, Clone, Default)]
pub struct MemoryAuditLogger {
    entries: Arc<Mutex<Vec<AuditEntry>>>,
}

impl MemoryAuditLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events only, without timestamps
    pub fn events(&self) -> Vec<AuditEvent> {
        self.lock().iter().map(|e| e.event.clone()).collect()
    }

    /// Number of recorded denials
    pub fn denials(&self) -> usize {
        self.lock().iter().filter(|e| e.event.is_denial()).count()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<AuditEntry>> {
        // A panic while holding the lock cannot leave a half-pushed entry.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl AuditLogger for MemoryAuditLogger {
    fn log(&self, event: AuditEvent) {
        self.lock().push(AuditEntry::new(event));
    }

    fn entries(&self) -> Vec<AuditEntry> {
        self.lock().clone()
    }

    fn clear(&self) {
        self.lock().clear();
    }
}

/// Null audit logger (no-op)
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAuditLogger;

impl NullAuditLogger {
    pub fn new() -> Self {
        Self
    }
}

impl AuditLogger for NullAuditLogger {
    fn log(&self, _event: AuditEvent) {}

    fn entries(&self) -> Vec<AuditEntry> {
        Vec::new()
    }

    fn clear(&self) {}
}

/// Forwards audit events to the `log` facade
///
/// Denials go out at `warn`, everything else at `debug`. Nothing is
/// retained, so `entries` is always empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAuditLogger;

impl LogAuditLogger {
    pub fn new() -> Self {
        Self
    }
}

impl AuditLogger for LogAuditLogger {
    fn log(&self, event: AuditEvent) {
        if event.is_denial() {
            log::warn!(target: "warden::audit", "{}", event);
        } else {
            log::debug!(target: "warden::audit", "{}", event);
        }
    }

    fn entries(&self) -> Vec<AuditEntry> {
        Vec::new()
    }

    fn clear(&self) {}
}
