//! Validation-gated writes
//!
//! A write into a schema-backed record runs as a two-phase commit:
//!
//! 1. **Stage**: clone the model, write the candidate at the path on the
//!    clone, validate the whole clone.
//! 2. **Commit**: only if no error maps to the edited path, replace the real
//!    model with the staged (normalized) instance.
//!
//! The staged copy is never exposed; on rejection it is dropped and the
//! real model is untouched.
//!
//! ## Error matching
//!
//! A validation run may report errors anywhere in the model. An error
//! blames the edited path when its location is, in order of preference:
//!
//! - exactly the edited path
//! - inside the written subtree (the edited path is an ancestor of it)
//! - the deepest ancestor of the edited path (a rule attached to a
//!   composite parent such as a whole `ranges[1]` object, or a root-level
//!   failure)
//!
//! Errors at unrelated locations do not block the write.

use crate::error::{Error, Result};
use crate::path::{self, AttributePath};
use crate::schema::{FieldInfo, Schema, ValidationErrors};
use serde_json::Value;
use tracing::debug;

/// Why a candidate write was refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    /// The field reported as errored
    ///
    /// Either the edited path, or the composite ancestor the failing rule
    /// was attached to.
    pub field: AttributePath,
    /// The validator's message
    pub message: String,
}

/// Outcome of staging a candidate write
#[derive(Debug, Clone, PartialEq)]
pub enum StagedWrite {
    /// The write may be committed; holds the instance to commit
    Accepted(Value),
    /// The write was rejected
    Rejected(Rejection),
}

/// Stage `value` at `path` on a copy of `model` and validate the copy
///
/// `model` is not modified. Fails only if `path` cannot be resolved.
pub fn stage_candidate(
    schema: &dyn Schema,
    model: &Value,
    path: &AttributePath,
    value: Value,
) -> Result<StagedWrite> {
    let mut working = model.clone();
    path::set(&mut working, path, value)?;

    match schema.validate(&working) {
        Ok(normalized) => Ok(StagedWrite::Accepted(normalized)),
        Err(errors) => match match_error(&errors, path) {
            Some(rejection) => Ok(StagedWrite::Rejected(rejection)),
            None => {
                debug!(
                    "{} reported {} error(s) unrelated to '{}', accepting write",
                    schema.name(),
                    errors.len(),
                    path
                );
                Ok(StagedWrite::Accepted(working))
            }
        },
    }
}

/// Validate `value` at `path` and commit it to `model` on success
///
/// Returns the rejection if the write was refused, in which case `model`
/// is unchanged.
pub fn validate_candidate(
    schema: &dyn Schema,
    model: &mut Value,
    path: &AttributePath,
    value: Value,
) -> Result<Option<Rejection>> {
    match stage_candidate(schema, model, path, value)? {
        StagedWrite::Accepted(staged) => {
            *model = staged;
            Ok(None)
        }
        StagedWrite::Rejected(rejection) => {
            debug!(
                "{} rejected write to '{}': {}",
                schema.name(),
                path,
                rejection.message
            );
            Ok(Some(rejection))
        }
    }
}

/// Find the error that should be blamed on a write to `path`
pub fn match_error(errors: &ValidationErrors, path: &AttributePath) -> Option<Rejection> {
    if let Some(exact) = errors.iter().find(|e| &e.location == path) {
        return Some(Rejection {
            field: path.clone(),
            message: exact.message.clone(),
        });
    }

    if let Some(inner) = errors.iter().find(|e| path.is_ancestor_of(&e.location)) {
        return Some(Rejection {
            field: path.clone(),
            message: inner.message.clone(),
        });
    }

    errors
        .iter()
        .filter(|e| e.location.is_ancestor_of(path))
        .max_by_key(|e| e.location.len())
        .map(|ancestor| Rejection {
            field: if ancestor.location.is_root() {
                path.clone()
            } else {
                ancestor.location.clone()
            },
            message: ancestor.message.clone(),
        })
}

/// Metadata for the field at `path`, without writing anything
pub fn field_info(schema: &dyn Schema, path: &AttributePath) -> Result<FieldInfo> {
    schema
        .field_info(path)
        .ok_or_else(|| Error::field_not_found(path.to_string()))
}
