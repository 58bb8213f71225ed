//! Sequential composition.

use super::Topology;
use crate::context::{FieldSet, FrameContext, PartialContext};
use crate::core::Flow;
use crate::errors::{CompositionKind, EmptyCompositionError, FrameflowResult};
use crate::stages::{Next, SharedStage, Stage};
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// Chains `stages` so each one controls whether and how the next runs.
///
/// A single stage is returned unchanged.
///
/// # Errors
///
/// Returns `EmptyCompositionError` if `stages` is empty.
pub fn compose_sequential<R: Send + 'static>(
    mut stages: Vec<SharedStage<R>>,
) -> Result<SharedStage<R>, EmptyCompositionError> {
    match stages.len() {
        0 => Err(EmptyCompositionError::new(CompositionKind::Sequential)),
        1 => stages
            .pop()
            .ok_or_else(|| EmptyCompositionError::new(CompositionKind::Sequential)),
        _ => Ok(Arc::new(Sequence::new(stages))),
    }
}

/// An ordered chain of stages that behaves as one stage.
///
/// Invoking the sequence with `(ctx, next)` runs the first stage with `ctx`;
/// each stage's continuation runs the following stage with the extended
/// context, and the last stage's continuation is `next` itself. The additions
/// handed to `next` are everything the chain added, relative to `ctx`.
pub struct Sequence<R> {
    name: String,
    stages: Arc<[SharedStage<R>]>,
}

impl<R> fmt::Debug for Sequence<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sequence")
            .field("name", &self.name)
            .field("stages", &self.stages.len())
            .finish_non_exhaustive()
    }
}

impl<R: Send + 'static> Sequence<R> {
    fn new(stages: Vec<SharedStage<R>>) -> Self {
        let name = stages
            .iter()
            .map(|stage| stage.name())
            .collect::<Vec<_>>()
            .join(" > ");

        debug!(sequence = %name, stages = stages.len(), "Composed sequential stages");

        Self {
            name,
            stages: stages.into(),
        }
    }

    /// Returns the member stages in order.
    #[must_use]
    pub fn stages(&self) -> &[SharedStage<R>] {
        &self.stages
    }
}

#[async_trait]
impl<R: Send + 'static> Stage<R> for Sequence<R> {
    fn name(&self) -> &str {
        &self.name
    }

    fn fields(&self) -> FieldSet {
        Stage::topology(self).fields()
    }

    fn topology(&self) -> Topology {
        Topology::Sequence {
            name: self.name.clone(),
            children: self.stages.iter().map(|stage| stage.topology()).collect(),
        }
    }

    async fn call(&self, ctx: FrameContext, next: Next<R>) -> FrameflowResult<Flow<R>> {
        run_from(Arc::clone(&self.stages), 0, ctx, PartialContext::new(), next).await
    }
}

/// Runs `stages[index..]`, then `tail`.
///
/// `added` accumulates what earlier stages in this chain contributed so the
/// tail receives its additions relative to the chain's own input.
fn run_from<R: Send + 'static>(
    stages: Arc<[SharedStage<R>]>,
    index: usize,
    ctx: FrameContext,
    added: PartialContext,
    tail: Next<R>,
) -> BoxFuture<'static, FrameflowResult<Flow<R>>> {
    async move {
        let Some(stage) = stages.get(index).cloned() else {
            return tail.run(added).await;
        };

        trace!(stage = stage.name(), index, "Entering stage");

        let base = ctx.clone();
        let next = Next::new(move |additions: PartialContext| {
            let extended = base.merge(&additions);
            let mut added = added;
            added.absorb(&additions);
            run_from(stages, index + 1, extended, added, tail)
        });

        stage.call(ctx, next).await
    }
    .boxed()
}
