//! Attribute path parsing and resolution
//!
//! An [`AttributePath`] addresses one node inside a view-model's object graph
//! using dotted member access and bracketed sequence indices:
//!
//! ```text
//! ranges[1].min_value
//! └──┬─┘└┬┘ └───┬───┘
//!  attr idx    attr
//! ```
//!
//! Paths are parsed once (at bind time) and reused for every access. The
//! resolver works over [`serde_json::Value`] trees, which is the common
//! representation every linked object can be projected into.
//!
//! ## Write atomicity
//!
//! [`set`] resolves the full parent chain before touching anything, so a
//! failure at any segment leaves the root exactly as it was.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// One step of an attribute path
///
/// Deserializes untagged so a validator can report locations as plain JSON
/// arrays such as `["ranges", 1, "min_value"]`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    /// Member access by name
    Attribute(String),
    /// Sequence element access
    Index(usize),
}

impl From<&str> for PathSegment {
    fn from(name: &str) -> Self {
        Self::Attribute(name.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(name: String) -> Self {
        Self::Attribute(name)
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

/// A parsed dotted/bracketed path
///
/// The empty path addresses the root itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AttributePath {
    segments: Vec<PathSegment>,
}

impl AttributePath {
    /// The root path
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a path string such as `a.b[0].c`
    pub fn parse(raw: &str) -> Result<Self> {
        let mut segments = Vec::new();
        if raw.is_empty() {
            return Ok(Self { segments });
        }

        for (position, part) in raw.split('.').enumerate() {
            let (base, mut rest) = match part.find('[') {
                Some(open) => (&part[..open], &part[open..]),
                None => (part, ""),
            };

            if base.is_empty() && (position > 0 || rest.is_empty()) {
                return Err(Error::invalid_path(raw, "empty attribute name"));
            }
            if base.contains(']') {
                return Err(Error::invalid_path(raw, format!("unexpected ']' in '{part}'")));
            }
            if !base.is_empty() {
                segments.push(PathSegment::Attribute(base.to_string()));
            }

            while !rest.is_empty() {
                let close = rest
                    .find(']')
                    .ok_or_else(|| Error::invalid_path(raw, format!("unclosed '[' in '{part}'")))?;
                if !rest.starts_with('[') {
                    return Err(Error::invalid_path(
                        raw,
                        format!("unexpected characters after index in '{part}'"),
                    ));
                }
                let digits = &rest[1..close];
                let not_an_index =
                    || Error::invalid_path(raw, format!("'{digits}' is not a non-negative integer"));
                if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(not_an_index());
                }
                let index = digits.parse::<usize>().map_err(|_| not_an_index())?;
                segments.push(PathSegment::Index(index));
                rest = &rest[close + 1..];
            }
        }

        Ok(Self { segments })
    }

    /// Build a path directly from segments
    pub fn from_segments(segments: impl IntoIterator<Item = PathSegment>) -> Self {
        Self {
            segments: segments.into_iter().collect(),
        }
    }

    /// The parsed segments
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Whether this is the root path
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Number of segments
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Same as [`is_root`](Self::is_root)
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Append a segment, returning the extended path
    pub fn child(&self, segment: impl Into<PathSegment>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }

    /// The path without its last segment; `None` for the root
    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// The last segment; `None` for the root
    pub fn last(&self) -> Option<&PathSegment> {
        self.segments.last()
    }

    /// Whether `self` is a strict prefix of `other`
    ///
    /// The root is an ancestor of every non-root path.
    pub fn is_ancestor_of(&self, other: &AttributePath) -> bool {
        self.segments.len() < other.segments.len() && other.segments.starts_with(&self.segments)
    }

    /// Drop one trailing index segment, if present
    ///
    /// `run_numbers[2]` becomes `run_numbers`; `a.b` is returned unchanged.
    pub fn without_trailing_index(&self) -> Self {
        match self.segments.last() {
            Some(PathSegment::Index(_)) => Self {
                segments: self.segments[..self.segments.len() - 1].to_vec(),
            },
            _ => self.clone(),
        }
    }

    /// Remove a leading attribute named `name`
    ///
    /// Returns `None` if the path does not start with that attribute.
    pub fn strip_attribute_prefix(&self, name: &str) -> Option<Self> {
        match self.segments.first() {
            Some(PathSegment::Attribute(first)) if first == name => Some(Self {
                segments: self.segments[1..].to_vec(),
            }),
            _ => None,
        }
    }

    /// Split `{head}.{rest}` into the head attribute name and the remainder
    pub fn split_first_attribute(&self) -> Option<(&str, Self)> {
        match self.segments.first() {
            Some(PathSegment::Attribute(first)) => Some((
                first.as_str(),
                Self {
                    segments: self.segments[1..].to_vec(),
                },
            )),
            _ => None,
        }
    }

    /// Flattened form used inside store keys, e.g. `ranges[1]_min_value`
    pub fn store_suffix(&self, dot_replacement: &str) -> String {
        self.to_string().replace('.', dot_replacement)
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (position, segment) in self.segments.iter().enumerate() {
            match segment {
                PathSegment::Attribute(name) if position == 0 => write!(f, "{name}")?,
                PathSegment::Attribute(name) => write!(f, ".{name}")?,
                PathSegment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

impl FromStr for AttributePath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for AttributePath {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for AttributePath {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<AttributePath> for String {
    fn from(path: AttributePath) -> Self {
        path.to_string()
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "object",
    }
}

fn prefix_string(path: &AttributePath, upto: usize) -> String {
    AttributePath::from_segments(path.segments[..upto].iter().cloned()).to_string()
}

/// Read the value at `path`
pub fn get<'a>(root: &'a Value, path: &AttributePath) -> Result<&'a Value> {
    let mut current = root;
    for (position, segment) in path.segments.iter().enumerate() {
        current = match (segment, current) {
            (PathSegment::Attribute(name), Value::Object(map)) => map.get(name).ok_or_else(|| {
                Error::path_resolution(path.to_string(), format!("no attribute '{name}'"))
            })?,
            (PathSegment::Index(index), Value::Array(items)) => {
                items.get(*index).ok_or_else(|| {
                    Error::path_resolution(
                        path.to_string(),
                        format!(
                            "index {index} out of range for '{}' (len {})",
                            prefix_string(path, position),
                            items.len()
                        ),
                    )
                })?
            }
            (segment, other) => {
                return Err(mismatch(path, position, segment, other));
            }
        };
    }
    Ok(current)
}

/// Mutable counterpart of [`get`]
pub fn get_mut<'a>(root: &'a mut Value, path: &AttributePath) -> Result<&'a mut Value> {
    let mut current = root;
    for (position, segment) in path.segments.iter().enumerate() {
        current = match (segment, current) {
            (PathSegment::Attribute(name), Value::Object(map)) => {
                map.get_mut(name).ok_or_else(|| {
                    Error::path_resolution(path.to_string(), format!("no attribute '{name}'"))
                })?
            }
            (PathSegment::Index(index), Value::Array(items)) => {
                let len = items.len();
                items.get_mut(*index).ok_or_else(|| {
                    Error::path_resolution(
                        path.to_string(),
                        format!(
                            "index {index} out of range for '{}' (len {len})",
                            prefix_string(path, position)
                        ),
                    )
                })?
            }
            (segment, other) => {
                return Err(mismatch(path, position, segment, other));
            }
        };
    }
    Ok(current)
}

/// Write `value` at `path`
///
/// An attribute leaf is inserted or overwritten on its parent object; an
/// index leaf must address an existing element. The empty path replaces
/// `root` wholesale.
pub fn set(root: &mut Value, path: &AttributePath, value: Value) -> Result<()> {
    let Some(parent_path) = path.parent() else {
        *root = value;
        return Ok(());
    };
    let leaf_position = parent_path.len();
    let parent = get_mut(root, &parent_path)?;

    match (&path.segments[leaf_position], parent) {
        (PathSegment::Attribute(name), Value::Object(map)) => {
            map.insert(name.clone(), value);
            Ok(())
        }
        (PathSegment::Index(index), Value::Array(items)) => {
            let len = items.len();
            let slot = items.get_mut(*index).ok_or_else(|| {
                Error::path_resolution(
                    path.to_string(),
                    format!("index {index} out of range for '{parent_path}' (len {len})"),
                )
            })?;
            *slot = value;
            Ok(())
        }
        (segment, other) => Err(mismatch(path, leaf_position, segment, other)),
    }
}

fn mismatch(path: &AttributePath, position: usize, segment: &PathSegment, found: &Value) -> Error {
    let at = prefix_string(path, position);
    let target = if at.is_empty() { "root".to_string() } else { format!("'{at}'") };
    let reason = match segment {
        PathSegment::Attribute(name) => {
            format!("cannot read attribute '{name}' of {target}: it is a {}", kind_of(found))
        }
        PathSegment::Index(index) => {
            format!("cannot index {target} with [{index}]: it is a {}", kind_of(found))
        }
    };
    Error::path_resolution(path.to_string(), reason)
}

/// Collect every non-private leaf attribute path below `value`
///
/// Keys starting with `_` are skipped. Objects are walked recursively;
/// anything else (including sequences) is a leaf.
pub fn nested_attributes(value: &Value) -> Vec<AttributePath> {
    let mut out = Vec::new();
    collect_attributes(value, &AttributePath::root(), &mut out);
    out
}

fn collect_attributes(value: &Value, prefix: &AttributePath, out: &mut Vec<AttributePath>) {
    let Value::Object(map) = value else {
        return;
    };
    for (key, child) in map {
        if key.starts_with('_') {
            continue;
        }
        let path = prefix.child(key.as_str());
        if child.is_object() {
            collect_attributes(child, &path, out);
        } else {
            out.push(path);
        }
    }
}
