//! Structural paths into object trees

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, Result};

/// Ordered key segments addressing a location inside an [`ObjectTree`](crate::ObjectTree)
///
/// The dot-joined form (`metadata.labels`) is what users type, what reports
/// show and how the path serializes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ParamPath(Vec<String>);

impl ParamPath {
    /// Build a path from segments, rejecting empty paths and empty segments
    pub fn new<I, S>(segments: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            return Err(CoreError::InvalidParam {
                path: String::new(),
                message: "path is empty".to_string(),
            });
        }
        if segments.iter().any(|s| s.is_empty()) {
            return Err(CoreError::InvalidParam {
                path: segments.join("."),
                message: "path contains an empty segment".to_string(),
            });
        }
        if segments.iter().any(|s| s.contains('.')) {
            return Err(CoreError::InvalidParam {
                path: segments.join("."),
                message: "path segments cannot contain '.'".to_string(),
            });
        }
        Ok(Self(segments))
    }

    /// Parse a dot-joined key such as `spec.version`
    pub fn parse(dotted: &str) -> Result<Self> {
        Self::new(dotted.split('.'))
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Dot-joined key
    pub fn key(&self) -> String {
        self.0.join(".")
    }

    /// True if `self` is a proper prefix of `other`
    pub fn is_ancestor_of(&self, other: &ParamPath) -> bool {
        self.0.len() < other.0.len() && other.0.starts_with(&self.0)
    }
}

impl fmt::Display for ParamPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl FromStr for ParamPath {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ParamPath {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<ParamPath> for String {
    fn from(path: ParamPath) -> Self {
        path.key()
    }
}

// Ordered by the dot-joined key so listings sort the way they print.
impl Ord for ParamPath {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl PartialOrd for ParamPath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
