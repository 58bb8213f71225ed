//! Declared field capabilities of a stage.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The context fields a stage reads and the fields it may add.
///
/// Declarations are descriptive. Composers never check them at runtime; they
/// feed [`crate::pipeline::audit`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSet {
    /// Fields the stage expects to find in its input context.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub requires: BTreeSet<String>,
    /// Fields the stage may add to the context.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub provides: BTreeSet<String>,
}

impl FieldSet {
    /// Creates an empty field set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares required fields.
    #[must_use]
    pub fn requires<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requires.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Declares provided fields.
    #[must_use]
    pub fn provides<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.provides.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Returns true if nothing is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.requires.is_empty() && self.provides.is_empty()
    }
}
