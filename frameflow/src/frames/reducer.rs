//! Frame state reduction.

use super::fields;
use super::params::{FrameFields, FrameState};
use crate::context::{FieldSet, FrameContext, PartialContext};
use crate::core::Flow;
use crate::errors::FrameflowResult;
use crate::stages::{Next, Stage};
use async_trait::async_trait;
use std::fmt;
use tracing::debug;

/// Computes this round trip's frame state.
///
/// Returns `initial` unless the context carries both a previous state and an
/// inbound action, in which case the reducer decides.
///
/// # Errors
///
/// Returns `InvalidField` if either field is present but malformed.
pub fn reduce_frame_state<F>(
    reducer: F,
    initial: FrameState,
    ctx: &FrameContext,
) -> FrameflowResult<FrameState>
where
    F: FnOnce(FrameState, &FrameContext) -> FrameState,
{
    match (ctx.prev_state()?, ctx.action()?) {
        (Some(prev), Some(_)) => Ok(reducer(prev, ctx)),
        _ => Ok(initial),
    }
}

/// A stage that writes the reduced state into `frame_state`.
pub struct ReduceFrameState<F> {
    name: String,
    initial: FrameState,
    reducer: F,
}

impl<F> ReduceFrameState<F>
where
    F: Fn(FrameState, &FrameContext) -> FrameState + Send + Sync,
{
    /// Creates the stage.
    pub fn new(initial: FrameState, reducer: F) -> Self {
        Self {
            name: "reduce_frame_state".to_string(),
            initial,
            reducer,
        }
    }

    /// Overrides the stage name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl<F> fmt::Debug for ReduceFrameState<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReduceFrameState")
            .field("name", &self.name)
            .field("initial", &self.initial)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<F, R> Stage<R> for ReduceFrameState<F>
where
    F: Fn(FrameState, &FrameContext) -> FrameState + Send + Sync,
    R: Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn fields(&self) -> FieldSet {
        FieldSet::new()
            .requires([fields::FRAME_PREV_STATE, fields::FRAME_ACTION_RECEIVED])
            .provides([fields::FRAME_STATE])
    }

    async fn call(&self, ctx: FrameContext, next: Next<R>) -> FrameflowResult<Flow<R>> {
        let state = reduce_frame_state(&self.reducer, self.initial.clone(), &ctx)?;
        debug!(stage = %self.name, keys = state.len(), "Reduced frame state");

        next.run(PartialContext::new().with_serialized(fields::FRAME_STATE, &state)?)
            .await
    }
}
