//! The continuation handed to every stage.

use crate::context::{FrameContext, PartialContext};
use crate::core::Flow;
use crate::errors::FrameflowResult;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::fmt;
use std::future::Future;
use tokio::sync::oneshot;

type Continuation<R> =
    Box<dyn FnOnce(PartialContext) -> BoxFuture<'static, FrameflowResult<Flow<R>>> + Send>;

/// Passes control, and optionally some context additions, onward.
///
/// A `Next` is consumed when called, so a stage can invoke it at most once.
/// Dropping it without calling it short-circuits everything downstream.
pub struct Next<R> {
    continuation: Continuation<R>,
}

impl<R: Send + 'static> Next<R> {
    /// Creates a continuation from a closure over the stage's additions.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: FnOnce(PartialContext) -> Fut + Send + 'static,
        Fut: Future<Output = FrameflowResult<Flow<R>>> + Send + 'static,
    {
        Self {
            continuation: Box::new(move |additions| f(additions).boxed()),
        }
    }

    /// Creates a continuation that merges the additions onto `base` and
    /// hands the extended context to `f`.
    pub fn extending<F, Fut>(base: FrameContext, f: F) -> Self
    where
        F: FnOnce(FrameContext) -> Fut + Send + 'static,
        Fut: Future<Output = FrameflowResult<Flow<R>>> + Send + 'static,
    {
        Self::new(move |additions| f(base.merge(&additions)))
    }

    /// Creates a continuation that stores the additions in `slot`.
    ///
    /// Used for concurrent group members. The call itself has no
    /// consequence beyond the recording and yields [`Flow::Recorded`].
    pub(crate) fn recorder(slot: oneshot::Sender<PartialContext>) -> Self {
        Self::new(move |additions| async move {
            // The receiver lives until the group has joined every member.
            let _ = slot.send(additions);
            Ok(Flow::Recorded)
        })
    }

    /// Continues with the given context additions.
    pub async fn run(self, additions: PartialContext) -> FrameflowResult<Flow<R>> {
        (self.continuation)(additions).await
    }

    /// Continues with the context unchanged.
    pub async fn proceed(self) -> FrameflowResult<Flow<R>> {
        self.run(PartialContext::new()).await
    }
}

impl<R> fmt::Debug for Next<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_extending_merges_onto_base() {
        let base = FrameContext::new().with("a", 1);
        let next: Next<FrameContext> = Next::extending(base, |ctx| async move { Ok(Flow::Done(ctx)) });

        let flow = next.run(PartialContext::new().with("b", 2)).await.unwrap();
        let ctx = flow.into_response().unwrap();

        assert_eq!(ctx.get("a"), Some(&json!(1)));
        assert_eq!(ctx.get("b"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn test_recorder_stores_additions() {
        let (tx, mut rx) = oneshot::channel();
        let next: Next<()> = Next::recorder(tx);

        let flow = next.run(PartialContext::new().with("x", 1)).await.unwrap();

        assert_eq!(flow, Flow::Recorded);
        assert_eq!(rx.try_recv().unwrap().get("x"), Some(&json!(1)));
    }

    #[tokio::test]
    async fn test_dropped_recorder_records_nothing() {
        let (tx, mut rx) = oneshot::channel::<PartialContext>();
        drop(Next::<()>::recorder(tx));

        assert!(rx.try_recv().is_err());
    }
}
