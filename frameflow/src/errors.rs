//! Error types for the frameflow engine.
//!
//! Composition errors are reported synchronously when a topology is built.
//! Everything raised while a pipeline runs is a [`FrameflowError`] and is
//! propagated to the driver unchanged.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type FrameflowResult<T> = Result<T, FrameflowError>;

/// The main error type for frameflow operations.
#[derive(Debug, Error)]
pub enum FrameflowError {
    /// A composer was handed no stages.
    #[error("{0}")]
    EmptyComposition(#[from] EmptyCompositionError),

    /// A stage body raised an error.
    #[error("Stage '{stage}' failed: {source}")]
    Stage {
        /// The stage that raised the error.
        stage: String,
        /// The underlying error.
        #[source]
        source: anyhow::Error,
    },

    /// A concurrently dispatched stage panicked.
    #[error("Stage '{stage}' panicked: {message}")]
    StagePanicked {
        /// The stage whose task panicked.
        stage: String,
        /// The join error description.
        message: String,
    },

    /// A required context field is absent.
    #[error("Missing context field '{field}'")]
    MissingField {
        /// The field name.
        field: String,
    },

    /// A context field is present but does not have the expected shape.
    #[error("Invalid context field '{field}': {reason}")]
    InvalidField {
        /// The field name.
        field: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// An inbound frame request parameter could not be parsed.
    #[error("Invalid frame parameter '{param}': {reason}")]
    InvalidParams {
        /// The parameter name.
        param: String,
        /// Why parsing failed.
        reason: String,
    },

    /// The inbound frame action failed signature verification.
    #[error("Frame message signature failed verification")]
    SignatureInvalid,

    /// The pipeline completed without producing a response.
    #[error("Pipeline '{pipeline}' finished without a response")]
    NoResponse {
        /// The pipeline name.
        pipeline: String,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FrameflowError {
    /// Wraps an arbitrary error raised inside a stage body.
    pub fn stage(stage: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self::Stage {
            stage: stage.into(),
            source: source.into(),
        }
    }

    /// Creates a missing field error.
    #[must_use]
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Creates an invalid field error.
    #[must_use]
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Returns the name of the stage the error originated in, if known.
    #[must_use]
    pub fn stage_name(&self) -> Option<&str> {
        match self {
            Self::Stage { stage, .. } | Self::StagePanicked { stage, .. } => Some(stage),
            _ => None,
        }
    }

    /// Converts to a dictionary representation for outward error responses.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let kind = match self {
            Self::EmptyComposition(_) => "EmptyComposition",
            Self::Stage { .. } => "StageError",
            Self::StagePanicked { .. } => "StagePanicked",
            Self::MissingField { .. } => "MissingField",
            Self::InvalidField { .. } => "InvalidField",
            Self::InvalidParams { .. } => "InvalidParams",
            Self::SignatureInvalid => "SignatureInvalid",
            Self::NoResponse { .. } => "NoResponse",
            Self::Serialization(_) => "Serialization",
        };

        let mut map = HashMap::new();
        map.insert("type".to_string(), serde_json::json!(kind));
        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        if let Some(stage) = self.stage_name() {
            map.insert("stage".to_string(), serde_json::json!(stage));
        }
        if let Self::EmptyComposition(err) = self {
            let info: serde_json::Map<String, serde_json::Value> =
                err.error_info.to_dict().into_iter().collect();
            map.insert("error_info".to_string(), serde_json::Value::Object(info));
        }
        map
    }
}

/// Metadata about a contract error for better diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ContractErrorInfo {
    /// Error code (e.g., "COMPOSE-001-EMPTY").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ContractErrorInfo {
    /// Creates a new contract error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("code".to_string(), serde_json::Value::String(self.code.clone()));
        map.insert("summary".to_string(), serde_json::Value::String(self.summary.clone()));

        if let Some(ref hint) = self.fix_hint {
            map.insert("fix_hint".to_string(), serde_json::Value::String(hint.clone()));
        }
        if !self.context.is_empty() {
            let context_map: serde_json::Map<String, serde_json::Value> = self
                .context
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                .collect();
            map.insert("context".to_string(), serde_json::Value::Object(context_map));
        }

        map
    }
}

/// Which composer rejected the stage list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositionKind {
    /// `compose_sequential`.
    Sequential,
    /// `compose_concurrent`.
    Concurrent,
}

impl fmt::Display for CompositionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequential => write!(f, "sequential"),
            Self::Concurrent => write!(f, "concurrent"),
        }
    }
}

/// Raised at composition time when a composer receives zero stages.
#[derive(Debug, Clone, Error)]
#[error("No stages provided to {kind} composition")]
pub struct EmptyCompositionError {
    /// The composer that was called.
    pub kind: CompositionKind,
    /// Contract error info.
    pub error_info: Box<ContractErrorInfo>,
}

impl EmptyCompositionError {
    /// Creates a new empty composition error.
    #[must_use]
    pub fn new(kind: CompositionKind) -> Self {
        let info = ContractErrorInfo::new(
            "COMPOSE-001-EMPTY",
            format!("Cannot build a {kind} composition without stages"),
        )
        .with_fix_hint("Pass at least one stage to the composer.")
        .with_context_entry("kind", kind.to_string());

        Self {
            kind,
            error_info: Box::new(info),
        }
    }
}
