//! Composition and driver configuration.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a concurrent group runs its members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dispatch {
    /// Each member runs as its own tokio task and may execute in parallel.
    #[default]
    Spawn,
    /// Members are polled concurrently on the caller's task.
    Inline,
}

impl fmt::Display for Dispatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spawn => write!(f, "spawn"),
            Self::Inline => write!(f, "inline"),
        }
    }
}

/// Configuration for a concurrent group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupConfig {
    /// Name used in logs, events, and topology descriptions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Member dispatch mode.
    #[serde(default)]
    pub dispatch: Dispatch,
}

impl GroupConfig {
    /// Creates a default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the group name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the dispatch mode.
    #[must_use]
    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = dispatch;
        self
    }
}

/// Configuration for a pipeline driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// The pipeline name.
    pub name: String,
    /// Whether invocations report `pipeline.*` and `group.*` events.
    #[serde(default = "default_emit_events")]
    pub emit_events: bool,
    /// Fields every initial context is expected to carry, used by audits.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub initial_fields: Vec<String>,
}

const fn default_emit_events() -> bool {
    true
}

impl PipelineConfig {
    /// Creates a configuration with defaults for the given pipeline name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            emit_events: default_emit_events(),
            initial_fields: Vec::new(),
        }
    }

    /// Enables or disables event emission.
    #[must_use]
    pub fn with_events(mut self, emit_events: bool) -> Self {
        self.emit_events = emit_events;
        self
    }

    /// Declares fields the initial context always carries.
    #[must_use]
    pub fn with_initial_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.initial_fields.extend(fields.into_iter().map(Into::into));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_config_defaults() {
        let config = GroupConfig::new();
        assert_eq!(config.dispatch, Dispatch::Spawn);
        assert!(config.name.is_none());
    }

    #[test]
    fn test_group_config_deserialize() {
        let config: GroupConfig =
            serde_json::from_str(r#"{"name": "lookups", "dispatch": "inline"}"#).unwrap();

        assert_eq!(config.name.as_deref(), Some("lookups"));
        assert_eq!(config.dispatch, Dispatch::Inline);

        let config: GroupConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, GroupConfig::default());
    }

    #[test]
    fn test_pipeline_config_defaults() {
        let config: PipelineConfig = serde_json::from_str(r#"{"name": "frame"}"#).unwrap();
        assert!(config.emit_events);
        assert!(config.initial_fields.is_empty());

        let config = PipelineConfig::new("frame")
            .with_events(false)
            .with_initial_fields(["url", "headers"]);
        assert!(!config.emit_events);
        assert_eq!(config.initial_fields, vec!["url", "headers"]);
    }

    #[test]
    fn test_dispatch_display() {
        assert_eq!(Dispatch::Spawn.to_string(), "spawn");
        assert_eq!(Dispatch::Inline.to_string(), "inline");
    }
}
