//! Field permissions and restriction declarations

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when a permission or restriction name is not recognized
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown permission '{0}' (expected read-only, write-only, read-write, none or clear)")]
pub struct ParsePermissionError(pub String);

/// Access granted on a single field
///
/// Only membership matters: a permission either allows reading, writing,
/// both, or neither. There is no ordering between permissions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Permission {
    ReadOnly,
    WriteOnly,
    #[default]
    ReadWrite,
    None,
}

impl Permission {
    /// Check if this permission allows reading
    pub fn allows_read(self) -> bool {
        matches!(self, Permission::ReadOnly | Permission::ReadWrite)
    }

    /// Check if this permission allows writing
    pub fn allows_write(self) -> bool {
        matches!(self, Permission::WriteOnly | Permission::ReadWrite)
    }

    /// Canonical name
    pub fn as_str(self) -> &'static str {
        match self {
            Permission::ReadOnly => "read-only",
            Permission::WriteOnly => "write-only",
            Permission::ReadWrite => "read-write",
            Permission::None => "none",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = ParsePermissionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read-only" | "r" => Ok(Permission::ReadOnly),
            "write-only" | "w" => Ok(Permission::WriteOnly),
            "read-write" | "rw" => Ok(Permission::ReadWrite),
            "none" => Ok(Permission::None),
            other => Err(ParsePermissionError(other.to_string())),
        }
    }
}

impl TryFrom<String> for Permission {
    type Error = ParsePermissionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Permission> for String {
    fn from(permission: Permission) -> Self {
        permission.as_str().to_string()
    }
}

/// Payload of a restriction declaration on a type
///
/// `Clear` removes whatever the same type declared before for the field, so
/// the field falls back to the store's default policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Restriction {
    Set(Permission),
    Clear,
}

impl fmt::Display for Restriction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Restriction::Set(permission) => permission.fmt(f),
            Restriction::Clear => f.write_str("clear"),
        }
    }
}

impl FromStr for Restriction {
    type Err = ParsePermissionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "clear" {
            return Ok(Restriction::Clear);
        }
        s.parse().map(Restriction::Set)
    }
}

impl TryFrom<String> for Restriction {
    type Error = ParsePermissionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Restriction> for String {
    fn from(restriction: Restriction) -> Self {
        restriction.to_string()
    }
}

impl From<Permission> for Restriction {
    fn from(permission: Permission) -> Self {
        Restriction::Set(permission)
    }
}
