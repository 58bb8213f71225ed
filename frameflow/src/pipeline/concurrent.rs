//! Concurrent composition.
//!
//! A concurrent group hands the same input context to every member at once.
//! Each member gets its own recording continuation instead of the real one,
//! so members can extend the context but cannot run anything downstream.
//! Once every member has settled the group folds the recorded partials in
//! declaration order and calls its own continuation exactly once.

use super::config::{Dispatch, GroupConfig};
use super::Topology;
use crate::context::{FieldSet, FrameContext, PartialContext};
use crate::core::{Flow, GroupState};
use crate::errors::{CompositionKind, EmptyCompositionError, FrameflowError, FrameflowResult};
use crate::events::{self, EventSink};
use crate::observability::SpanTimer;
use crate::stages::{Next, SharedStage, Stage};
use async_trait::async_trait;
use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

/// Runs `stages` concurrently with default settings.
///
/// A single stage is returned unchanged.
///
/// # Errors
///
/// Returns `EmptyCompositionError` if `stages` is empty.
pub fn compose_concurrent<R: Send + 'static>(
    stages: Vec<SharedStage<R>>,
) -> Result<SharedStage<R>, EmptyCompositionError> {
    compose_concurrent_with(GroupConfig::default(), stages)
}

/// Runs `stages` concurrently using `config`.
///
/// # Errors
///
/// Returns `EmptyCompositionError` if `stages` is empty.
pub fn compose_concurrent_with<R: Send + 'static>(
    config: GroupConfig,
    mut stages: Vec<SharedStage<R>>,
) -> Result<SharedStage<R>, EmptyCompositionError> {
    match stages.len() {
        0 => Err(EmptyCompositionError::new(CompositionKind::Concurrent)),
        1 => {
            debug!(group = ?config.name, "Single-member group returned unchanged");
            stages
                .pop()
                .ok_or_else(|| EmptyCompositionError::new(CompositionKind::Concurrent))
        }
        _ => Ok(Arc::new(ConcurrentGroup::new(config, stages))),
    }
}

/// A set of stages run against the same context, behaving as one stage.
pub struct ConcurrentGroup<R> {
    name: String,
    dispatch: Dispatch,
    members: Arc<[SharedStage<R>]>,
}

impl<R> fmt::Debug for ConcurrentGroup<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcurrentGroup")
            .field("name", &self.name)
            .field("dispatch", &self.dispatch)
            .field("members", &self.members.len())
            .finish_non_exhaustive()
    }
}

impl<R: Send + 'static> ConcurrentGroup<R> {
    fn new(config: GroupConfig, members: Vec<SharedStage<R>>) -> Self {
        let name = config.name.unwrap_or_else(|| {
            let names: Vec<_> = members.iter().map(|stage| stage.name()).collect();
            format!("[{}]", names.join(" | "))
        });

        debug!(
            group = %name,
            members = members.len(),
            dispatch = %config.dispatch,
            "Composed concurrent group"
        );

        Self {
            name,
            dispatch: config.dispatch,
            members: members.into(),
        }
    }

    /// Returns the members in declaration order.
    #[must_use]
    pub fn members(&self) -> &[SharedStage<R>] {
        &self.members
    }

    /// Returns the dispatch mode.
    #[must_use]
    pub const fn dispatch(&self) -> Dispatch {
        self.dispatch
    }

    fn transition(&self, from: GroupState, to: GroupState) -> GroupState {
        debug_assert!(from.can_transition_to(to), "illegal group transition {from} -> {to}");
        trace!(group = %self.name, from = %from, to = %to, "Group state changed");
        to
    }

    /// Starts `member` and returns a future that settles with its outcome.
    ///
    /// Spawned members start running immediately. Inline members start when
    /// the returned future is first polled.
    fn start(
        &self,
        member: SharedStage<R>,
        ctx: FrameContext,
        slot: oneshot::Sender<PartialContext>,
        sink: &Arc<dyn EventSink>,
    ) -> BoxFuture<'static, FrameflowResult<()>> {
        let next = Next::recorder(slot);

        match self.dispatch {
            Dispatch::Inline => async move { member.call(ctx, next).await.map(drop) }.boxed(),
            Dispatch::Spawn => {
                let stage = member.name().to_string();
                let handle = tokio::spawn(events::scoped(Arc::clone(sink), async move {
                    member.call(ctx, next).await.map(drop)
                }));

                async move {
                    handle.await.unwrap_or_else(|err| {
                        Err(FrameflowError::StagePanicked {
                            stage,
                            message: err.to_string(),
                        })
                    })
                }
                .boxed()
            }
        }
    }
}

#[async_trait]
impl<R: Send + 'static> Stage<R> for ConcurrentGroup<R> {
    fn name(&self) -> &str {
        &self.name
    }

    fn fields(&self) -> FieldSet {
        Stage::topology(self).fields()
    }

    fn topology(&self) -> Topology {
        Topology::Concurrent {
            name: self.name.clone(),
            children: self.members.iter().map(|stage| stage.topology()).collect(),
        }
    }

    async fn call(&self, ctx: FrameContext, next: Next<R>) -> FrameflowResult<Flow<R>> {
        let sink = events::current_event_sink();
        let timer = SpanTimer::start(&self.name);
        let mut state = GroupState::default();

        let mut slots = Vec::with_capacity(self.members.len());
        let mut running = Vec::with_capacity(self.members.len());
        for member in self.members.iter() {
            let (tx, rx) = oneshot::channel();
            slots.push(rx);
            running.push(self.start(Arc::clone(member), ctx.clone(), tx, &sink));
        }

        state = self.transition(state, GroupState::Dispatched);
        sink.try_emit(
            "group.dispatched",
            Some(json!({
                "group": self.name,
                "members": self.members.len(),
                "dispatch": self.dispatch,
            })),
        );

        // Every member settles before the group decides anything.
        state = self.transition(state, GroupState::Waiting);
        let outcomes = join_all(running).await;

        let mut failure = None;
        for (member, outcome) in self.members.iter().zip(outcomes) {
            if let Err(err) = outcome {
                if failure.is_none() {
                    failure = Some(err);
                } else {
                    debug!(group = %self.name, stage = member.name(), error = %err, "Discarding later member failure");
                }
            }
        }

        if let Some(err) = failure {
            self.transition(state, GroupState::Aborted);
            warn!(group = %self.name, error = %err, "Concurrent group aborted");
            sink.try_emit(
                "group.aborted",
                Some(json!({
                    "group": self.name,
                    "error": err.to_dict(),
                    "duration_ms": timer.finish(),
                })),
            );
            return Err(err);
        }

        state = self.transition(state, GroupState::Merging);
        let mut merged = PartialContext::new();
        let mut contributors = 0_usize;
        for mut slot in slots {
            // A member that never called its continuation contributes nothing.
            if let Ok(partial) = slot.try_recv() {
                contributors += 1;
                merged.absorb(&partial);
            }
        }

        self.transition(state, GroupState::Done);
        debug!(group = %self.name, contributors, fields = merged.len(), "Concurrent group merged");
        sink.try_emit(
            "group.merged",
            Some(json!({
                "group": self.name,
                "contributors": contributors,
                "fields": merged.field_names().collect::<Vec<_>>(),
                "duration_ms": timer.finish(),
            })),
        );

        next.run(merged).await
    }
}
