//! Colon-delimited store paths
//!
//! Parses paths like `user:profile:name` into an ordered list of segments.
//! There is no escaping: a literal `:` cannot appear inside a segment.

use std::fmt;

/// Segment separator
pub const SEPARATOR: char = ':';

/// A parsed store path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorePath {
    raw: String,
    segments: Vec<String>,
}

impl StorePath {
    /// Split a path string on `:`.
    ///
    /// Parsing never fails. An empty string is a single empty segment, and
    /// empty segments between separators are kept as-is.
    pub fn parse(input: &str) -> Self {
        Self {
            raw: input.to_string(),
            segments: input.split(SEPARATOR).map(str::to_string).collect(),
        }
    }

    /// All segments in order
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Segment at `index`
    pub fn segment(&self, index: usize) -> Option<&str> {
        self.segments.get(index).map(String::as_str)
    }

    /// Number of segments (always at least one)
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Always false, since parsing yields at least one segment
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Check if `index` is the final segment
    pub fn is_last(&self, index: usize) -> bool {
        index + 1 == self.segments.len()
    }

    /// The original path string
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<&str> for StorePath {
    fn from(input: &str) -> Self {
        StorePath::parse(input)
    }
}
