//! Dotted document paths with optional array indexes.
//!
//! A path such as `address[0].city` is split on `.`; each segment names a
//! field and may carry a trailing `[n]` index into the array held by that
//! field.

use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

/// Represents a path into a document
///
/// # Examples
///
/// - `name.given` - nested objects
/// - `identifiers[0].value` - first element of an array, then a field
/// - `tags[2]` - third element of an array
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentPath {
    /// The raw path string
    pub raw: String,
    /// Parsed path segments
    pub segments: Vec<PathSegment>,
}

/// A segment in a document path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSegment {
    /// Field name (e.g., "address")
    pub key: String,
    /// Array index when the segment ends in `[n]`
    pub index: Option<usize>,
}

impl PathSegment {
    pub fn field(key: &str) -> Self {
        Self {
            key: key.to_string(),
            index: None,
        }
    }

    pub fn indexed(key: &str, index: usize) -> Self {
        Self {
            key: key.to_string(),
            index: Some(index),
        }
    }
}

fn index_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^([^\[]*)\[(\d+)\]").expect("index pattern is valid"))
}

impl DocumentPath {
    /// Parse a dotted path.
    ///
    /// Empty segments are ignored. A segment whose bracket suffix is not a
    /// non-negative integer is kept verbatim as a field name.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use recordmap::path::DocumentPath;
    ///
    /// let path = DocumentPath::parse("a.b[1].c");
    /// assert_eq!(path.segments.len(), 3);
    /// assert_eq!(path.segments[1].index, Some(1));
    /// ```
    pub fn parse(path: &str) -> Self {
        let segments = path
            .split('.')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| match index_pattern().captures(s) {
                Some(caps) => match caps[2].parse::<usize>() {
                    Ok(index) => PathSegment::indexed(&caps[1], index),
                    Err(_) => PathSegment::field(s),
                },
                None => PathSegment::field(s),
            })
            .collect();

        Self {
            raw: path.to_string(),
            segments,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}
