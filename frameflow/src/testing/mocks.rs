//! Mock stages for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::fmt::Debug;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::context::{FieldSet, FrameContext, PartialContext};
use crate::core::Flow;
use crate::errors::{FrameflowError, FrameflowResult};
use crate::stages::{Next, SharedStage, Stage};

/// A shared counter handed out by mock stages.
#[derive(Debug, Clone, Default)]
pub struct CallCounter(Arc<AtomicUsize>);

impl CallCounter {
    /// Returns the current count.
    #[must_use]
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn increment(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// A log of stage names, shared between mocks to observe ordering.
pub type CompletionLog = Arc<Mutex<Vec<String>>>;

/// A stage that optionally waits, then continues with fixed additions.
#[derive(Debug)]
pub struct ExtendStage {
    name: String,
    additions: PartialContext,
    fields: FieldSet,
    delay: Option<Duration>,
    calls: CallCounter,
    completions: CallCounter,
    log: Option<CompletionLog>,
}

impl ExtendStage {
    /// Creates a stage that adds `additions`.
    #[must_use]
    pub fn new(name: impl Into<String>, additions: PartialContext) -> Self {
        let fields = FieldSet::new().provides(additions.field_names());
        Self {
            name: name.into(),
            additions,
            fields,
            delay: None,
            calls: CallCounter::default(),
            completions: CallCounter::default(),
            log: None,
        }
    }

    /// Waits `delay` before continuing.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Overrides the declared fields.
    #[must_use]
    pub fn with_fields(mut self, fields: FieldSet) -> Self {
        self.fields = fields;
        self
    }

    /// Appends the stage name to `log` once its delay has elapsed.
    #[must_use]
    pub fn with_log(mut self, log: CompletionLog) -> Self {
        self.log = Some(log);
        self
    }

    /// Counts how often the stage was entered.
    #[must_use]
    pub fn calls(&self) -> CallCounter {
        self.calls.clone()
    }

    /// Counts how often the stage finished its delay.
    #[must_use]
    pub fn completions(&self) -> CallCounter {
        self.completions.clone()
    }

    /// Wraps the stage for use in a composition.
    #[must_use]
    pub fn shared<R: Send + 'static>(self) -> SharedStage<R> {
        Arc::new(self)
    }
}

#[async_trait]
impl<R: Send + 'static> Stage<R> for ExtendStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn fields(&self) -> FieldSet {
        self.fields.clone()
    }

    async fn call(&self, _ctx: FrameContext, next: Next<R>) -> FrameflowResult<Flow<R>> {
        self.calls.increment();
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.completions.increment();
        if let Some(log) = &self.log {
            log.lock().push(self.name.clone());
        }
        next.run(self.additions.clone()).await
    }
}

/// A stage that answers itself and never calls its continuation.
#[derive(Debug)]
pub struct ShortCircuitStage<R> {
    name: String,
    response: R,
    calls: CallCounter,
}

impl<R: Clone + Debug + Send + Sync + 'static> ShortCircuitStage<R> {
    /// Creates a stage that always responds with `response`.
    #[must_use]
    pub fn new(name: impl Into<String>, response: R) -> Self {
        Self {
            name: name.into(),
            response,
            calls: CallCounter::default(),
        }
    }

    /// Counts how often the stage was entered.
    #[must_use]
    pub fn calls(&self) -> CallCounter {
        self.calls.clone()
    }

    /// Wraps the stage for use in a composition.
    #[must_use]
    pub fn shared(self) -> SharedStage<R> {
        Arc::new(self)
    }
}

#[async_trait]
impl<R: Clone + Debug + Send + Sync + 'static> Stage<R> for ShortCircuitStage<R> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn call(&self, _ctx: FrameContext, _next: Next<R>) -> FrameflowResult<Flow<R>> {
        self.calls.increment();
        Ok(Flow::Done(self.response.clone()))
    }
}

/// A stage that always fails.
#[derive(Debug)]
pub struct FailingStage {
    name: String,
    error: String,
    delay: Option<Duration>,
}

impl FailingStage {
    /// Creates a new failing stage.
    #[must_use]
    pub fn new(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            error: error.into(),
            delay: None,
        }
    }

    /// Waits `delay` before failing.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Wraps the stage for use in a composition.
    #[must_use]
    pub fn shared<R: Send + 'static>(self) -> SharedStage<R> {
        Arc::new(self)
    }
}

#[async_trait]
impl<R: Send + 'static> Stage<R> for FailingStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn call(&self, _ctx: FrameContext, _next: Next<R>) -> FrameflowResult<Flow<R>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Err(FrameflowError::stage(
            self.name.clone(),
            anyhow::anyhow!(self.error.clone()),
        ))
    }
}

/// A pass-through stage that records every context it receives.
#[derive(Debug, Default)]
pub struct RecordingStage {
    name: String,
    seen: Arc<Mutex<Vec<FrameContext>>>,
}

impl RecordingStage {
    /// Creates a new recording stage.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            seen: Arc::default(),
        }
    }

    /// Returns a handle to the recorded contexts.
    #[must_use]
    pub fn seen(&self) -> Arc<Mutex<Vec<FrameContext>>> {
        Arc::clone(&self.seen)
    }

    /// Wraps the stage for use in a composition.
    #[must_use]
    pub fn shared<R: Send + 'static>(self) -> SharedStage<R> {
        Arc::new(self)
    }
}

#[async_trait]
impl<R: Send + 'static> Stage<R> for RecordingStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn call(&self, ctx: FrameContext, next: Next<R>) -> FrameflowResult<Flow<R>> {
        self.seen.lock().push(ctx);
        next.proceed().await
    }
}
