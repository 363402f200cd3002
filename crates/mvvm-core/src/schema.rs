// # Schema Capability
//
// The binding engine never type-checks view-models itself. It hands a full
// candidate instance to a `Schema` and gets back either the normalized
// instance or a list of located errors.
//
// ## Implementations
//
// - `TypedSchema<T>`: serde round-trip through a Rust type plus the type's
//   own `ViewModel::violations` rules (cross-field rules included)
// - Custom: implement `Schema` directly for hand-written validators
//
// ## Error locations
//
// A location is a sequence of segments, strings for attribute names and
// integers for sequence indices, exactly like an `AttributePath`. An empty
// location means the error applies to the instance as a whole.

use crate::path::{AttributePath, PathSegment};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;

/// A single located validation failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Where the failure was detected
    pub location: AttributePath,
    /// Human-readable description
    pub message: String,
}

impl FieldError {
    /// Create a field error at `location`
    pub fn new(location: AttributePath, message: impl Into<String>) -> Self {
        Self {
            location,
            message: message.into(),
        }
    }

    /// Create a field error from raw location segments
    pub fn at<I, S>(location: I, message: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<PathSegment>,
    {
        Self::new(
            AttributePath::from_segments(location.into_iter().map(Into::into)),
            message,
        )
    }
}

/// All failures reported by one validation run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    /// Create an empty error list
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a list holding one error
    pub fn single(location: AttributePath, message: impl Into<String>) -> Self {
        Self {
            errors: vec![FieldError::new(location, message)],
        }
    }

    /// Append an error
    pub fn push(&mut self, error: FieldError) {
        self.errors.push(error);
    }

    /// Iterate over the errors in report order
    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.errors.iter()
    }

    /// Number of errors
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Whether no error was recorded
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Every error location formatted as a path string
    ///
    /// `["ranges", 1, "min_value"]` becomes `ranges[1].min_value`.
    pub fn errored_fields(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.location.to_string()).collect()
    }
}

impl From<Vec<FieldError>> for ValidationErrors {
    fn from(errors: Vec<FieldError>) -> Self {
        Self { errors }
    }
}

impl IntoIterator for ValidationErrors {
    type Item = FieldError;
    type IntoIter = std::vec::IntoIter<FieldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} validation error(s)", self.errors.len())?;
        for error in &self.errors {
            if error.location.is_root() {
                write!(f, "; {}", error.message)?;
            } else {
                write!(f, "; {}: {}", error.location, error.message)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Descriptive metadata for a single field
///
/// Used by view code to render labels, hints and tooltips.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldInfo {
    /// Short label
    pub title: Option<String>,
    /// Longer description
    pub description: Option<String>,
    /// Example values
    #[serde(default)]
    pub examples: Vec<Value>,
}

impl FieldInfo {
    /// Create empty metadata
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Add an example value
    pub fn with_example(mut self, example: impl Into<Value>) -> Self {
        self.examples.push(example.into());
        self
    }
}

/// Trait for schema implementations
///
/// # Contract
///
/// - `validate` receives a complete instance, never a single field, so
///   rules spanning several fields can run.
/// - On success it returns the normalized instance (after coercions,
///   defaults, etc.). The engine commits that value, not the raw candidate.
/// - It must be pure: no side effects, same input gives same output.
pub trait Schema: Send + Sync {
    /// Name of the model type, used in log messages
    fn name(&self) -> &str {
        "model"
    }

    /// Validate a complete candidate instance
    fn validate(&self, candidate: &Value) -> Result<Value, ValidationErrors>;

    /// Metadata for the field at `path`, if the schema knows it
    fn field_info(&self, _path: &AttributePath) -> Option<FieldInfo> {
        None
    }
}

/// Rules and metadata carried by a typed view-model
///
/// ```rust
/// use mvvm_core::schema::{FieldError, FieldInfo, ViewModel};
/// use mvvm_core::path::AttributePath;
///
/// #[derive(serde::Serialize, serde::Deserialize)]
/// struct User {
///     username: String,
/// }
///
/// impl ViewModel for User {
///     fn violations(&self) -> Vec<FieldError> {
///         if self.username.is_empty() {
///             return vec![FieldError::at(["username"], "should have at least 1 character")];
///         }
///         Vec::new()
///     }
///
///     fn describe(field: &AttributePath) -> Option<FieldInfo> {
///         (field.to_string() == "username").then(|| FieldInfo::new().with_title("User Name"))
///     }
/// }
/// ```
pub trait ViewModel: Serialize + DeserializeOwned {
    /// Rule violations of this instance; empty when valid
    fn violations(&self) -> Vec<FieldError> {
        Vec::new()
    }

    /// Metadata for a field
    ///
    /// Index segments are stripped before the call: `ranges[3].min_value`
    /// is looked up as `ranges.min_value`.
    fn describe(_field: &AttributePath) -> Option<FieldInfo> {
        None
    }
}

/// Schema backed by a Rust type
///
/// Deserialization failures are reported at the root location because
/// serde does not expose the failing field.
pub struct TypedSchema<T> {
    name: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T: ViewModel> TypedSchema<T> {
    /// Create a schema named after the type
    pub fn new() -> Self {
        let full = std::any::type_name::<T>();
        let name = full.rsplit("::").next().unwrap_or(full).to_string();
        Self {
            name,
            _marker: PhantomData,
        }
    }
}

impl<T: ViewModel> Default for TypedSchema<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ViewModel> Schema for TypedSchema<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn validate(&self, candidate: &Value) -> Result<Value, ValidationErrors> {
        let instance: T = serde_json::from_value(candidate.clone())
            .map_err(|e| ValidationErrors::single(AttributePath::root(), e.to_string()))?;

        let violations = instance.violations();
        if !violations.is_empty() {
            return Err(violations.into());
        }

        serde_json::to_value(&instance)
            .map_err(|e| ValidationErrors::single(AttributePath::root(), e.to_string()))
    }

    fn field_info(&self, path: &AttributePath) -> Option<FieldInfo> {
        let type_level = AttributePath::from_segments(
            path.segments()
                .iter()
                .filter(|s| matches!(s, PathSegment::Attribute(_)))
                .cloned(),
        );
        T::describe(&type_level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Serialize, Deserialize)]
    struct Range {
        min_value: i64,
        max_value: i64,
    }

    #[derive(Serialize, Deserialize)]
    struct Limits {
        ranges: Vec<Range>,
    }

    impl ViewModel for Limits {
        fn violations(&self) -> Vec<FieldError> {
            self.ranges
                .iter()
                .enumerate()
                .filter(|(_, r)| r.min_value >= r.max_value)
                .map(|(i, _)| FieldError::at([PathSegment::from("ranges"), i.into()], "min must be below max"))
                .collect()
        }

        fn describe(field: &AttributePath) -> Option<FieldInfo> {
            match field.to_string().as_str() {
                "ranges.min_value" => Some(FieldInfo::new().with_description("lower bound")),
                _ => None,
            }
        }
    }

    #[test]
    fn test_typed_schema_accepts_and_normalizes() {
        let schema = TypedSchema::<Limits>::new();
        assert_eq!(schema.name(), "Limits");

        let out = schema
            .validate(&json!({"ranges": [{"min_value": 0, "max_value": 1}], "extra": true}))
            .unwrap();
        // unknown keys are dropped by the round-trip
        assert_eq!(out, json!({"ranges": [{"min_value": 0, "max_value": 1}]}));
    }

    #[test]
    fn test_typed_schema_reports_rule_location() {
        let schema = TypedSchema::<Limits>::new();
        let err = schema
            .validate(&json!({"ranges": [{"min_value": 0, "max_value": 1}, {"min_value": 5, "max_value": 1}]}))
            .unwrap_err();
        assert_eq!(err.errored_fields(), vec!["ranges[1]".to_string()]);
    }

    #[test]
    fn test_typed_schema_type_error_is_root_located() {
        let schema = TypedSchema::<Limits>::new();
        let err = schema
            .validate(&json!({"ranges": [{"min_value": "bla", "max_value": 1}]}))
            .unwrap_err();
        assert_eq!(err.len(), 1);
        assert!(err.iter().next().unwrap().location.is_root());
    }

    #[test]
    fn test_field_info_strips_indices() {
        let schema = TypedSchema::<Limits>::new();
        let info = schema
            .field_info(&AttributePath::parse("ranges[3].min_value").unwrap())
            .unwrap();
        assert_eq!(info.description.as_deref(), Some("lower bound"));
        assert!(schema.field_info(&AttributePath::parse("ranges").unwrap()).is_none());
    }

    #[test]
    fn test_location_deserializes_from_segment_array() {
        let segments: Vec<PathSegment> = serde_json::from_value(json!(["ranges", 1, "min_value"])).unwrap();
        let path = AttributePath::from_segments(segments);
        assert_eq!(path.to_string(), "ranges[1].min_value");
    }
}
