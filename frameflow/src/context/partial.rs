//! Context fragments produced by individual stages.

use crate::errors::FrameflowResult;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The fields one stage adds to or overrides in the context it received.
///
/// A stage hands a `PartialContext` to its continuation. In a sequential
/// chain it is merged onto the stage's input before the next stage runs; in
/// a concurrent group it is recorded and merged once every member has settled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartialContext {
    fields: Map<String, Value>,
}

impl PartialContext {
    /// Creates an empty partial context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    /// Adds a field by serializing `value`.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if `value` cannot be represented as JSON.
    pub fn with_serialized<T: Serialize>(
        mut self,
        field: impl Into<String>,
        value: &T,
    ) -> FrameflowResult<Self> {
        let value = serde_json::to_value(value)?;
        self.insert(field, value);
        Ok(self)
    }

    /// Adds or replaces a field in place.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    /// Copies every field of `other` into this partial, replacing any field
    /// already present.
    pub fn absorb(&mut self, other: &Self) {
        for (field, value) in &other.fields {
            self.fields.insert(field.clone(), value.clone());
        }
    }

    /// Gets a field value.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Returns the number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the partial adds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns the field names.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Iterates over fields.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }
}

impl From<Map<String, Value>> for PartialContext {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for PartialContext {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}
