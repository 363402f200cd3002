//! Linked objects
//!
//! A communicator is bound to exactly one linked object. The object comes in
//! one of four shapes:
//!
//! - [`LinkedObject::Record`]: a schema-validated record; every write is
//!   validation-gated
//! - [`LinkedObject::Mapping`]: a plain string-keyed mapping, merged into
//!   without validation
//! - [`LinkedObject::Callable`]: a sink that receives every value pushed
//!   from the view
//! - [`LinkedObject::Object`]: an arbitrary attribute-bearing object,
//!   written through paths without validation
//!
//! The caller owns the object through a [`SharedModel`] handle; the
//! communicator and its connection hold clones of the same handle.

use crate::error::{Error, Result};
use crate::path::{self, AttributePath};
use crate::schema::{Schema, TypedSchema, ValidationErrors, ViewModel};
use crate::validator::{self, Rejection};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Sink invoked with each value pushed into a callable linked object
pub type ModelSink = Arc<dyn Fn(Value) + Send + Sync>;

/// Shape tag of a linked object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkedShape {
    /// Schema-validated record
    Record,
    /// String-keyed mapping
    Mapping,
    /// Callable sink
    Callable,
    /// Attribute-bearing object
    Object,
}

impl fmt::Display for LinkedShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LinkedShape::Record => "record",
            LinkedShape::Mapping => "mapping",
            LinkedShape::Callable => "callable",
            LinkedShape::Object => "object",
        };
        f.write_str(name)
    }
}

/// A schema-validated record
#[derive(Clone)]
pub struct RecordModel {
    value: Value,
    schema: Arc<dyn Schema>,
}

impl RecordModel {
    /// Create a record, validating (and normalizing) the initial value
    pub fn new(value: Value, schema: Arc<dyn Schema>) -> Result<Self> {
        let value = schema
            .validate(&value)
            .map_err(|errors| Error::validation(errors.to_string()))?;
        Ok(Self { value, schema })
    }

    /// Create a record from a typed view-model instance
    pub fn typed<T: ViewModel + 'static>(model: &T) -> Result<Self> {
        Self::new(serde_json::to_value(model)?, Arc::new(TypedSchema::<T>::new()))
    }

    /// Current value
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// The record's schema
    pub fn schema(&self) -> &Arc<dyn Schema> {
        &self.schema
    }

    /// Validation-gated write of `value` at `path`
    pub fn validate_candidate(&mut self, path: &AttributePath, value: Value) -> Result<Option<Rejection>> {
        validator::validate_candidate(self.schema.as_ref(), &mut self.value, path, value)
    }

    /// Validate a complete replacement instance without committing it
    pub fn validate_replacement(&self, candidate: &Value) -> std::result::Result<Value, ValidationErrors> {
        self.schema.validate(candidate)
    }

    pub(crate) fn commit(&mut self, value: Value) {
        self.value = value;
    }
}

impl fmt::Debug for RecordModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordModel")
            .field("schema", &self.schema.name())
            .field("value", &self.value)
            .finish()
    }
}

/// The view-model, tagged by shape
pub enum LinkedObject {
    /// Schema-validated record
    Record(RecordModel),
    /// String-keyed mapping
    Mapping(Map<String, Value>),
    /// Callable sink
    Callable(ModelSink),
    /// Attribute-bearing object
    Object(Value),
}

impl LinkedObject {
    /// Shape tag
    pub fn shape(&self) -> LinkedShape {
        match self {
            LinkedObject::Record(_) => LinkedShape::Record,
            LinkedObject::Mapping(_) => LinkedShape::Mapping,
            LinkedObject::Callable(_) => LinkedShape::Callable,
            LinkedObject::Object(_) => LinkedShape::Object,
        }
    }

    /// Current data as a value; `None` for a callable sink
    pub fn snapshot(&self) -> Option<Value> {
        match self {
            LinkedObject::Record(record) => Some(record.value.clone()),
            LinkedObject::Mapping(map) => Some(Value::Object(map.clone())),
            LinkedObject::Callable(_) => None,
            LinkedObject::Object(value) => Some(value.clone()),
        }
    }
}

impl fmt::Debug for LinkedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkedObject::Record(record) => f.debug_tuple("Record").field(record).finish(),
            LinkedObject::Mapping(map) => f.debug_tuple("Mapping").field(map).finish(),
            LinkedObject::Callable(_) => f.write_str("Callable(..)"),
            LinkedObject::Object(value) => f.debug_tuple("Object").field(value).finish(),
        }
    }
}

/// Shared handle to a linked object
///
/// Cloning the handle shares the object. Sinks, post-update callbacks and
/// store hooks run after the lock is released; schema validation
/// (`Schema::validate`, `ViewModel::violations`) runs while it is held and
/// must not touch this model.
#[derive(Clone, Debug)]
pub struct SharedModel {
    inner: Arc<Mutex<LinkedObject>>,
}

impl SharedModel {
    /// Wrap a linked object
    pub fn new(object: LinkedObject) -> Self {
        Self {
            inner: Arc::new(Mutex::new(object)),
        }
    }

    /// Record shape from an already constructed record
    pub fn record(record: RecordModel) -> Self {
        Self::new(LinkedObject::Record(record))
    }

    /// Record shape from a typed view-model instance
    pub fn typed<T: ViewModel + 'static>(model: &T) -> Result<Self> {
        Ok(Self::record(RecordModel::typed(model)?))
    }

    /// Mapping shape
    pub fn mapping(map: Map<String, Value>) -> Self {
        Self::new(LinkedObject::Mapping(map))
    }

    /// Callable shape
    pub fn callable<F>(sink: F) -> Self
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        Self::new(LinkedObject::Callable(Arc::new(sink)))
    }

    /// Attribute-bearing object shape
    pub fn object(value: Value) -> Self {
        Self::new(LinkedObject::Object(value))
    }

    /// Shape tag
    pub fn shape(&self) -> LinkedShape {
        self.inner.lock().shape()
    }

    /// Current data; `None` for a callable sink
    pub fn snapshot(&self) -> Option<Value> {
        self.inner.lock().snapshot()
    }

    /// Read the value at a path
    pub fn get(&self, path: &str) -> Result<Value> {
        let path = AttributePath::parse(path)?;
        let guard = self.inner.lock();
        match &*guard {
            LinkedObject::Record(record) => path::get(&record.value, &path).cloned(),
            LinkedObject::Object(value) => path::get(value, &path).cloned(),
            LinkedObject::Mapping(map) => {
                let Some((head, rest)) = path.split_first_attribute() else {
                    return Ok(Value::Object(map.clone()));
                };
                let child = map
                    .get(head)
                    .ok_or_else(|| Error::path_resolution(path.to_string(), format!("no key '{head}'")))?;
                path::get(child, &rest).cloned()
            }
            LinkedObject::Callable(_) => Err(Error::unsupported("a callable sink cannot be read")),
        }
    }

    /// Deserialize the current data into `T`
    pub fn get_as<T: DeserializeOwned>(&self) -> Result<T> {
        let value = self
            .snapshot()
            .ok_or_else(|| Error::unsupported("a callable sink cannot be read"))?;
        Ok(serde_json::from_value(value)?)
    }

    /// Run `f` with exclusive access to the object
    ///
    /// `f` must not call back into anything that locks this model.
    pub fn with<R>(&self, f: impl FnOnce(&mut LinkedObject) -> R) -> R {
        f(&mut self.inner.lock())
    }
}
