//! The immutable request context.

use super::PartialContext;
use crate::errors::{FrameflowError, FrameflowResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Everything known about a request at one point in the pipeline.
///
/// A `FrameContext` is never mutated after construction. Cloning shares the
/// underlying field map, so handing the same context to many concurrent stages
/// costs one reference count per stage. New contexts are produced with
/// [`FrameContext::merge`] and [`FrameContext::fold`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameContext {
    fields: Arc<Map<String, Value>>,
}

impl FrameContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context from an existing field map.
    #[must_use]
    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self {
            fields: Arc::new(fields),
        }
    }

    /// Returns a new context with one field added or replaced.
    #[must_use]
    pub fn with(&self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.merge(&PartialContext::new().with(field, value))
    }

    /// Gets a raw field value.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Gets a field value, failing if it is absent.
    ///
    /// # Errors
    ///
    /// Returns `MissingField` if the context does not carry `field`.
    pub fn require(&self, field: &str) -> FrameflowResult<&Value> {
        self.get(field)
            .ok_or_else(|| FrameflowError::missing_field(field))
    }

    /// Deserializes a field into `T`.
    ///
    /// Absent and `null` fields both read as `None`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidField` if the value does not deserialize into `T`.
    pub fn get_as<T: DeserializeOwned>(&self, field: &str) -> FrameflowResult<Option<T>> {
        match self.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => T::deserialize(value)
                .map(Some)
                .map_err(|e| FrameflowError::invalid_field(field, e.to_string())),
        }
    }

    /// Deserializes a field into `T`, failing if it is absent or `null`.
    ///
    /// # Errors
    ///
    /// Returns `MissingField` or `InvalidField`.
    pub fn require_as<T: DeserializeOwned>(&self, field: &str) -> FrameflowResult<T> {
        self.get_as(field)?
            .ok_or_else(|| FrameflowError::missing_field(field))
    }

    /// Checks if a field exists.
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Returns the number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the context has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns the field names in key order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Returns the underlying field map.
    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Returns a new context with `partial` applied on top of this one.
    ///
    /// Fields in `partial` override same-named fields here. An empty partial
    /// returns a clone that shares this context's storage.
    #[must_use]
    pub fn merge(&self, partial: &PartialContext) -> Self {
        self.fold(std::iter::once(partial))
    }

    /// Applies `partials` in iteration order, last write wins per field.
    #[must_use]
    pub fn fold<'a, I>(&self, partials: I) -> Self
    where
        I: IntoIterator<Item = &'a PartialContext>,
    {
        let mut merged: Option<Map<String, Value>> = None;

        for partial in partials {
            if partial.is_empty() {
                continue;
            }
            let fields = merged.get_or_insert_with(|| (*self.fields).clone());
            for (field, value) in partial.iter() {
                fields.insert(field.to_string(), value.clone());
            }
        }

        merged.map_or_else(|| self.clone(), Self::from_map)
    }

    /// Converts to a JSON object.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Object((*self.fields).clone())
    }
}

impl TryFrom<Value> for FrameContext {
    type Error = FrameflowError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(fields) => Ok(Self::from_map(fields)),
            other => Err(FrameflowError::invalid_field(
                "<context>",
                format!("expected a JSON object, got {other}"),
            )),
        }
    }
}

impl From<Map<String, Value>> for FrameContext {
    fn from(fields: Map<String, Value>) -> Self {
        Self::from_map(fields)
    }
}

impl Serialize for FrameContext {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for FrameContext {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Map::deserialize(deserializer).map(Self::from_map)
    }
}
