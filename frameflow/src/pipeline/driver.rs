//! Pipeline driver: a composed topology plus a terminal handler.

use super::config::{GroupConfig, PipelineConfig};
use super::concurrent::compose_concurrent_with;
use super::sequential::compose_sequential;
use super::topology::{audit, FieldIssue, Topology};
use crate::context::FrameContext;
use crate::core::Flow;
use crate::errors::{EmptyCompositionError, FrameflowError, FrameflowResult};
use crate::events::{self, EventSink, NoOpEventSink};
use crate::observability::SpanTimer;
use crate::stages::{Next, SharedStage, Stage};
use async_trait::async_trait;
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Turns the final context into the pipeline's response.
#[async_trait]
pub trait Terminal<R>: Send + Sync {
    /// Produces the response.
    async fn respond(&self, ctx: FrameContext) -> FrameflowResult<R>;
}

#[async_trait]
impl<R, F> Terminal<R> for F
where
    F: Fn(FrameContext) -> FrameflowResult<R> + Send + Sync,
    R: Send + 'static,
{
    async fn respond(&self, ctx: FrameContext) -> FrameflowResult<R> {
        self(ctx)
    }
}

/// A built pipeline, invoked once per inbound request.
pub struct Pipeline<R> {
    config: PipelineConfig,
    root: SharedStage<R>,
    terminal: Arc<dyn Terminal<R>>,
    event_sink: Option<Arc<dyn EventSink>>,
}

impl<R> fmt::Debug for Pipeline<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl<R: Send + 'static> Pipeline<R> {
    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Describes the composed stages.
    #[must_use]
    pub fn topology(&self) -> Topology {
        self.root.topology()
    }

    /// Audits declared fields against the configured initial fields.
    #[must_use]
    pub fn audit(&self) -> Vec<FieldIssue> {
        audit(&self.topology(), self.config.initial_fields.iter().cloned())
    }

    /// Runs the pipeline for one request.
    ///
    /// # Errors
    ///
    /// Returns whatever error a stage or group raised, unchanged, or
    /// `NoResponse` if the topology finished without producing one.
    pub async fn handle(&self, initial: FrameContext) -> FrameflowResult<R> {
        let invocation_id = Uuid::new_v4();
        let span = info_span!("pipeline", name = %self.config.name, %invocation_id);

        let sink: Arc<dyn EventSink> = if self.config.emit_events {
            self.event_sink
                .clone()
                .unwrap_or_else(events::get_event_sink)
        } else {
            Arc::new(NoOpEventSink)
        };

        events::scoped(Arc::clone(&sink), self.invoke(initial, invocation_id, sink))
            .instrument(span)
            .await
    }

    async fn invoke(
        &self,
        initial: FrameContext,
        invocation_id: Uuid,
        sink: Arc<dyn EventSink>,
    ) -> FrameflowResult<R> {
        let timer = SpanTimer::start(&self.config.name);
        debug!(fields = initial.len(), "Pipeline invocation started");
        sink.try_emit(
            "pipeline.started",
            Some(json!({
                "pipeline": self.config.name,
                "invocation_id": invocation_id.to_string(),
                "fields": initial.field_names().collect::<Vec<_>>(),
            })),
        );

        let terminal = Arc::clone(&self.terminal);
        let next = Next::extending(initial.clone(), move |ctx| async move {
            terminal.respond(ctx).await.map(Flow::Done)
        });

        let outcome = match self.root.call(initial, next).await {
            Ok(Flow::Done(response)) => Ok(response),
            Ok(Flow::Recorded) => Err(FrameflowError::NoResponse {
                pipeline: self.config.name.clone(),
            }),
            Err(err) => Err(err),
        };

        let duration_ms = timer.finish();
        match &outcome {
            Ok(_) => {
                info!(duration_ms, "Pipeline invocation completed");
                sink.try_emit(
                    "pipeline.completed",
                    Some(json!({
                        "pipeline": self.config.name,
                        "invocation_id": invocation_id.to_string(),
                        "duration_ms": duration_ms,
                    })),
                );
            }
            Err(err) => {
                warn!(error = %err, duration_ms, "Pipeline invocation failed");
                sink.try_emit(
                    "pipeline.failed",
                    Some(json!({
                        "pipeline": self.config.name,
                        "invocation_id": invocation_id.to_string(),
                        "duration_ms": duration_ms,
                        "error": err.to_dict(),
                    })),
                );
            }
        }

        outcome
    }
}

/// Builder for pipelines.
///
/// Stages added to the builder run in order. Concurrent groups are added as
/// a single step.
pub struct PipelineBuilder<R> {
    config: PipelineConfig,
    stages: Vec<SharedStage<R>>,
    event_sink: Option<Arc<dyn EventSink>>,
}

impl<R> fmt::Debug for PipelineBuilder<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("config", &self.config)
            .field("stages", &self.stages.len())
            .finish_non_exhaustive()
    }
}

impl<R: Send + 'static> PipelineBuilder<R> {
    /// Creates a new builder.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::from_config(PipelineConfig::new(name))
    }

    /// Creates a builder from a configuration.
    #[must_use]
    pub fn from_config(config: PipelineConfig) -> Self {
        Self {
            config,
            stages: Vec::new(),
            event_sink: None,
        }
    }

    /// Appends a stage.
    #[must_use]
    pub fn stage(self, stage: impl Stage<R> + 'static) -> Self {
        self.shared_stage(Arc::new(stage))
    }

    /// Appends an already shared stage, such as a composed one.
    #[must_use]
    pub fn shared_stage(mut self, stage: SharedStage<R>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Appends a concurrent group with default settings.
    ///
    /// # Errors
    ///
    /// Returns `EmptyCompositionError` if `stages` is empty.
    pub fn concurrent(self, stages: Vec<SharedStage<R>>) -> Result<Self, EmptyCompositionError> {
        self.concurrent_with(GroupConfig::default(), stages)
    }

    /// Appends a concurrent group.
    ///
    /// # Errors
    ///
    /// Returns `EmptyCompositionError` if `stages` is empty.
    pub fn concurrent_with(
        self,
        config: GroupConfig,
        stages: Vec<SharedStage<R>>,
    ) -> Result<Self, EmptyCompositionError> {
        let group = compose_concurrent_with(config, stages)?;
        Ok(self.shared_stage(group))
    }

    /// Reports events to `sink` instead of the global default.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = Some(sink);
        self
    }

    /// Declares fields every initial context carries.
    #[must_use]
    pub fn with_initial_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config = self.config.with_initial_fields(fields);
        self
    }

    /// Composes the stages sequentially and attaches `terminal`.
    ///
    /// Field audit issues are logged as warnings and never fail the build.
    ///
    /// # Errors
    ///
    /// Returns `EmptyCompositionError` if no stages were added.
    pub fn build<T>(self, terminal: T) -> Result<Pipeline<R>, EmptyCompositionError>
    where
        T: Terminal<R> + 'static,
    {
        let root = compose_sequential(self.stages)?;
        let pipeline = Pipeline {
            config: self.config,
            root,
            terminal: Arc::new(terminal),
            event_sink: self.event_sink,
        };

        for issue in pipeline.audit() {
            warn!(pipeline = %pipeline.name(), %issue, "Field audit issue");
        }
        info!(
            pipeline = %pipeline.name(),
            stages = pipeline.topology().stage_count(),
            "Built pipeline"
        );

        Ok(pipeline)
    }
}
