//! Structural diff between two versions of a view-model
//!
//! Reports leaf values that differ plus sequence elements that were added or
//! removed. For additions and removals the trailing index is stripped, so
//! the reported path names the containing field (`run_numbers`, not
//! `run_numbers[2]`).
//!
//! Sequences are compared position by position; a key present on only one
//! side of an object comparison is reported as a changed value at that key.

use crate::path::AttributePath;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;

/// What kind of difference was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// A value differs between the two versions
    ValueChanged,
    /// A sequence grew
    ItemAdded,
    /// A sequence shrank
    ItemRemoved,
}

/// One reported difference
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ChangedPath {
    /// Where the difference was found
    pub path: AttributePath,
    /// Kind of difference
    pub kind: ChangeKind,
}

impl ChangedPath {
    /// Whether this change is relevant to a tracked path
    ///
    /// True when the change is at the tracked path, inside it, or at a
    /// container that holds it.
    pub fn affects(&self, tracked: &AttributePath) -> bool {
        &self.path == tracked || tracked.is_ancestor_of(&self.path) || self.path.is_ancestor_of(tracked)
    }
}

/// Compute every difference between `old` and `new`
pub fn diff(old: &Value, new: &Value) -> BTreeSet<ChangedPath> {
    let mut out = BTreeSet::new();
    walk(old, new, &AttributePath::root(), &mut out);
    out
}

/// Changed paths as strings, deduplicated
pub fn updated_fields(old: &Value, new: &Value) -> Vec<String> {
    let paths: BTreeSet<String> = diff(old, new)
        .into_iter()
        .map(|change| change.path.to_string())
        .collect();
    paths.into_iter().collect()
}

fn walk(old: &Value, new: &Value, at: &AttributePath, out: &mut BTreeSet<ChangedPath>) {
    match (old, new) {
        (Value::Object(before), Value::Object(after)) => {
            for (key, old_child) in before {
                match after.get(key) {
                    Some(new_child) => walk(old_child, new_child, &at.child(key.as_str()), out),
                    None => record(out, at.child(key.as_str()), ChangeKind::ValueChanged),
                }
            }
            for key in after.keys().filter(|k| !before.contains_key(*k)) {
                record(out, at.child(key.as_str()), ChangeKind::ValueChanged);
            }
        }
        (Value::Array(before), Value::Array(after)) => {
            let common = before.len().min(after.len());
            for index in 0..common {
                walk(&before[index], &after[index], &at.child(index), out);
            }
            if after.len() > common {
                record(out, at.clone(), ChangeKind::ItemAdded);
            }
            if before.len() > common {
                record(out, at.clone(), ChangeKind::ItemRemoved);
            }
        }
        (a, b) if a != b => record(out, at.clone(), ChangeKind::ValueChanged),
        _ => {}
    }
}

fn record(out: &mut BTreeSet<ChangedPath>, path: AttributePath, kind: ChangeKind) {
    out.insert(ChangedPath { path, kind });
}
