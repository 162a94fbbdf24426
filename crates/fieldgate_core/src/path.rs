//! Dotted-path addressing over JSON value trees.
//!
//! A path such as `posts.nested` walks object keys one segment at a time.
//! Array elements are addressed by decimal index (`items.0.title`).

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A parsed dotted path
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct DottedPath {
    raw: String,
    segments: Vec<String>,
}

impl DottedPath {
    /// Parse a path by splitting on `.`
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
            segments: raw.split('.').map(str::to_string).collect(),
        }
    }

    /// The path as originally written
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Path segments in walk order
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Look up the value at this path, `None` when any step is missing
    #[must_use]
    pub fn lookup<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        self.segments
            .iter()
            .try_fold(root, |node, segment| step(node, segment))
    }

    /// Get the value at this path
    ///
    /// # Errors
    ///
    /// Returns `NestedPathNotFound` carrying the full path if any step is missing
    pub fn get<'a>(&self, root: &'a Value, verbose: bool) -> CoreResult<&'a Value> {
        self.lookup(root)
            .ok_or_else(|| CoreError::nested_path(self.raw.clone(), verbose))
    }

    /// Replace the value at this path.
    ///
    /// Only meant to be called on a path that a prior [`DottedPath::get`] on
    /// the same root resolved; the parent chain is not re-validated beyond
    /// what walking it requires.
    ///
    /// # Errors
    ///
    /// Returns `NestedPathNotFound` if the parent chain cannot be walked
    pub fn set(&self, root: &mut Value, value: Value, verbose: bool) -> CoreResult<()> {
        let missing = || CoreError::nested_path(self.raw.clone(), verbose);
        let (last, parents) = self.segments.split_last().ok_or_else(missing)?;

        let mut node = root;
        for segment in parents {
            node = step_mut(node, segment).ok_or_else(missing)?;
        }

        match node {
            Value::Object(map) => {
                map.insert(last.clone(), value);
                Ok(())
            }
            Value::Array(items) => {
                let idx = last.parse::<usize>().map_err(|_| missing())?;
                let slot = items.get_mut(idx).ok_or_else(missing)?;
                *slot = value;
                Ok(())
            }
            _ => Err(missing()),
        }
    }
}

fn step<'a>(node: &'a Value, segment: &str) -> Option<&'a Value> {
    match node {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|idx| items.get(idx)),
        _ => None,
    }
}

fn step_mut<'a>(node: &'a mut Value, segment: &str) -> Option<&'a mut Value> {
    match node {
        Value::Object(map) => map.get_mut(segment),
        Value::Array(items) => match segment.parse::<usize>() {
            Ok(idx) => items.get_mut(idx),
            Err(_) => None,
        },
        _ => None,
    }
}

impl fmt::Display for DottedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<String> for DottedPath {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<&str> for DottedPath {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl From<DottedPath> for String {
    fn from(path: DottedPath) -> Self {
        path.raw
    }
}

/// Get the value at a dotted path
///
/// # Errors
///
/// Returns `NestedPathNotFound` if the path does not resolve
pub fn get_nested<'a>(root: &'a Value, path: &str, verbose: bool) -> CoreResult<&'a Value> {
    DottedPath::parse(path).get(root, verbose)
}

/// Set the value at a dotted path previously resolved with [`get_nested`]
///
/// # Errors
///
/// Returns `NestedPathNotFound` if the parent chain does not resolve
pub fn set_nested(root: &mut Value, path: &str, value: Value, verbose: bool) -> CoreResult<()> {
    DottedPath::parse(path).set(root, value, verbose)
}
