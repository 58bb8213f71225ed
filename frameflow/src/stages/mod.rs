//! Stage trait and implementations.
//!
//! Stages are the fundamental units of work in a frameflow pipeline. A stage
//! receives the current context and a [`Next`] continuation and decides what
//! happens downstream:
//!
//! - pass through unchanged with [`Next::proceed`]
//! - extend the context with [`Next::run`]
//! - short-circuit by returning [`Flow::Done`] without calling `next`
//! - abort by returning an error

mod next;

pub use next::Next;

use crate::context::{FieldSet, FrameContext};
use crate::core::Flow;
use crate::errors::FrameflowResult;
use crate::pipeline::Topology;
use async_trait::async_trait;
use std::fmt::Debug;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

/// A stage shared between pipelines and concurrent tasks.
pub type SharedStage<R> = Arc<dyn Stage<R>>;

/// Trait for pipeline stages.
///
/// `R` is the pipeline's final response type.
#[async_trait]
pub trait Stage<R>: Send + Sync + Debug {
    /// Returns the name of the stage.
    fn name(&self) -> &str;

    /// Declares the fields this stage reads and adds.
    fn fields(&self) -> FieldSet {
        FieldSet::default()
    }

    /// Describes this stage for audits and diagnostics.
    fn topology(&self) -> Topology {
        Topology::stage(self.name(), self.fields())
    }

    /// Runs the stage.
    ///
    /// # Arguments
    ///
    /// * `ctx` - The context as seen by this stage
    /// * `next` - The continuation for everything downstream
    async fn call(&self, ctx: FrameContext, next: Next<R>) -> FrameflowResult<Flow<R>>;
}

/// A closure-based stage.
pub struct FnStage<F, R> {
    name: String,
    fields: FieldSet,
    func: F,
    _response: PhantomData<fn() -> R>,
}

impl<F, Fut, R> FnStage<F, R>
where
    F: Fn(FrameContext, Next<R>) -> Fut + Send + Sync,
    Fut: Future<Output = FrameflowResult<Flow<R>>> + Send,
    R: Send + 'static,
{
    /// Creates a new closure-based stage.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            fields: FieldSet::default(),
            func,
            _response: PhantomData,
        }
    }

    /// Declares the fields the closure reads and adds.
    #[must_use]
    pub fn with_fields(mut self, fields: FieldSet) -> Self {
        self.fields = fields;
        self
    }

    /// Wraps the stage for use in a composition.
    #[must_use]
    pub fn shared(self) -> SharedStage<R>
    where
        F: 'static,
    {
        Arc::new(self)
    }
}

impl<F, R> Debug for FnStage<F, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStage")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<F, Fut, R> Stage<R> for FnStage<F, R>
where
    F: Fn(FrameContext, Next<R>) -> Fut + Send + Sync,
    Fut: Future<Output = FrameflowResult<Flow<R>>> + Send,
    R: Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn fields(&self) -> FieldSet {
        self.fields.clone()
    }

    async fn call(&self, ctx: FrameContext, next: Next<R>) -> FrameflowResult<Flow<R>> {
        (self.func)(ctx, next).await
    }
}

/// A stage that passes control on without touching the context.
#[derive(Debug, Clone)]
pub struct PassThroughStage {
    name: String,
}

impl PassThroughStage {
    /// Creates a new pass-through stage.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl<R: Send + 'static> Stage<R> for PassThroughStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn call(&self, _ctx: FrameContext, next: Next<R>) -> FrameflowResult<Flow<R>> {
        next.proceed().await
    }
}
