//! End-to-end tests for composed pipelines.

#[cfg(test)]
mod tests {
    use crate::context::{FieldSet, FrameContext, PartialContext};
    use crate::core::Flow;
    use crate::errors::{CompositionKind, FrameflowError, FrameflowResult};
    use crate::events::CollectingEventSink;
    use crate::pipeline::{
        compose_concurrent, compose_concurrent_with, compose_sequential, Dispatch, FieldIssue,
        GroupConfig, PipelineBuilder, Topology,
    };
    use crate::stages::{FnStage, Next, SharedStage};
    use crate::testing::{
        assert_field, assert_fields, assert_missing_field, CompletionLog, ExtendStage,
        FailingStage, RecordingStage, ShortCircuitStage,
    };
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Barrier;

    fn echo(ctx: FrameContext) -> FrameflowResult<FrameContext> {
        Ok(ctx)
    }

    fn extend(name: &str, field: &str, value: serde_json::Value) -> SharedStage<FrameContext> {
        ExtendStage::new(name, PartialContext::new().with(field, value)).shared()
    }

    /// Counts terminal invocations.
    fn counting_terminal(
        count: Arc<AtomicUsize>,
    ) -> impl Fn(FrameContext) -> FrameflowResult<FrameContext> + Send + Sync {
        move |ctx| {
            count.fetch_add(1, Ordering::SeqCst);
            Ok(ctx)
        }
    }

    /// Waits on `barrier` before continuing, so every holder must run at once.
    fn rendezvous(name: &str, barrier: Arc<Barrier>) -> SharedStage<FrameContext> {
        let field = name.to_string();
        FnStage::new(name, move |_ctx: FrameContext, next: Next<FrameContext>| {
            let barrier = Arc::clone(&barrier);
            let field = field.clone();
            async move {
                barrier.wait().await;
                next.run(PartialContext::new().with(field, true)).await
            }
        })
        .shared()
    }

    #[tokio::test]
    async fn test_declaration_order_last_write_wins() {
        let group = compose_concurrent(vec![
            extend("a", "x", json!(1)),
            extend("b", "y", json!(2)),
            extend("c", "x", json!(3)),
        ])
        .unwrap();

        let pipeline = PipelineBuilder::new("merge")
            .shared_stage(group)
            .build(echo)
            .unwrap();
        let ctx = pipeline
            .handle(FrameContext::new().with("input", "kept"))
            .await
            .unwrap();

        assert_fields(&ctx, &json!({"input": "kept", "x": 3, "y": 2}));
    }

    #[tokio::test]
    async fn test_merge_order_ignores_completion_order() {
        let log: CompletionLog = CompletionLog::default();
        let group = compose_concurrent(vec![
            ExtendStage::new("inc_a", PartialContext::new().with("count", 1))
                .with_delay(Duration::from_millis(40))
                .with_log(Arc::clone(&log))
                .shared(),
            ExtendStage::new("inc_b", PartialContext::new().with("count", 2))
                .with_log(Arc::clone(&log))
                .shared(),
        ])
        .unwrap();

        let pipeline = PipelineBuilder::new("count")
            .shared_stage(group)
            .build(echo)
            .unwrap();
        let ctx = pipeline
            .handle(FrameContext::new().with("count", 0))
            .await
            .unwrap();

        assert_eq!(*log.lock(), vec!["inc_b", "inc_a"]);
        assert_fields(&ctx, &json!({"count": 2}));
    }

    #[tokio::test]
    async fn test_merge_order_holds_when_last_member_finishes_first() {
        let group = compose_concurrent(vec![
            ExtendStage::new("inc_a", PartialContext::new().with("count", 1)).shared(),
            ExtendStage::new("inc_b", PartialContext::new().with("count", 2))
                .with_delay(Duration::from_millis(40))
                .shared(),
        ])
        .unwrap();

        let pipeline = PipelineBuilder::new("count")
            .shared_stage(group)
            .build(echo)
            .unwrap();
        let ctx = pipeline
            .handle(FrameContext::new().with("count", 0))
            .await
            .unwrap();

        assert_field(&ctx, "count", 2);
    }

    #[tokio::test]
    async fn test_short_circuited_member_contributes_nothing() {
        let calls = Arc::new(AtomicUsize::new(0));
        let group = compose_concurrent(vec![
            extend("a", "a", json!(1)),
            ShortCircuitStage::new("quiet", FrameContext::new().with("ignored", true)).shared(),
            extend("c", "c", json!(3)),
        ])
        .unwrap();

        let pipeline = PipelineBuilder::new("short")
            .shared_stage(group)
            .build(counting_terminal(Arc::clone(&calls)))
            .unwrap();
        let ctx = pipeline.handle(FrameContext::new()).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_fields(&ctx, &json!({"a": 1, "c": 3}));
        assert_missing_field(&ctx, "ignored");
    }

    #[tokio::test]
    async fn test_group_failure_skips_continuation_and_discards_partials() {
        let calls = Arc::new(AtomicUsize::new(0));
        let after = RecordingStage::new("after");
        let seen = after.seen();
        let producer = ExtendStage::new("producer", PartialContext::new().with("x", 1));
        let produced = producer.completions();

        let pipeline = PipelineBuilder::new("abort")
            .concurrent(vec![
                producer.shared(),
                FailingStage::new("verify", "hub unreachable")
                    .with_delay(Duration::from_millis(20))
                    .shared(),
            ])
            .unwrap()
            .stage(after)
            .build(counting_terminal(Arc::clone(&calls)))
            .unwrap();

        let err = pipeline.handle(FrameContext::new()).await.unwrap_err();

        assert_eq!(err.stage_name(), Some("verify"));
        assert_eq!(produced.get(), 1);
        assert!(seen.lock().is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_sequential_short_circuit_never_runs_second() {
        let second = ExtendStage::new("second", PartialContext::new().with("second", true));
        let second_calls = second.calls();
        let terminal_calls = Arc::new(AtomicUsize::new(0));

        let pipeline = PipelineBuilder::new("short")
            .stage(ShortCircuitStage::new(
                "first",
                FrameContext::new().with("early", true),
            ))
            .stage(second)
            .build(counting_terminal(Arc::clone(&terminal_calls)))
            .unwrap();

        let ctx = pipeline.handle(FrameContext::new()).await.unwrap();

        assert_fields(&ctx, &json!({"early": true}));
        assert_eq!(second_calls.get(), 0);
        assert_eq!(terminal_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_repeated_invocations_are_independent() {
        let pipeline = PipelineBuilder::new("repeat")
            .stage(ExtendStage::new("seed", PartialContext::new().with("seeded", true)))
            .concurrent(vec![
                extend("a", "a", json!(1)),
                extend("b", "b", json!(2)),
            ])
            .unwrap()
            .build(echo)
            .unwrap();

        let initial = FrameContext::new().with("url", "https://example.com/frames");
        let first = pipeline.handle(initial.clone()).await.unwrap();
        let second = pipeline.handle(initial.clone()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(initial.len(), 1);
    }

    #[tokio::test]
    async fn test_nested_topology() {
        // validate -> [profile, (casts -> summary)] -> render
        let recorder = RecordingStage::new("render_input");
        let seen = recorder.seen();

        let casts_then_summary = compose_sequential(vec![
            extend("casts", "casts", json!(["gm"])),
            FnStage::new("summary", |ctx: FrameContext, next: Next<FrameContext>| async move {
                let casts: Vec<String> = ctx.require_as("casts")?;
                next.run(PartialContext::new().with("summary", casts.len())).await
            })
            .shared(),
        ])
        .unwrap();

        let pipeline = PipelineBuilder::new("nested")
            .stage(ExtendStage::new("validate", PartialContext::new().with("valid", true)))
            .concurrent_with(
                GroupConfig::new().with_name("lookups"),
                vec![extend("profile", "profile", json!({"fid": 1})), casts_then_summary],
            )
            .unwrap()
            .stage(recorder)
            .build(echo)
            .unwrap();

        let ctx = pipeline.handle(FrameContext::new()).await.unwrap();

        assert_fields(
            &ctx,
            &json!({
                "valid": true,
                "profile": {"fid": 1},
                "casts": ["gm"],
                "summary": 1,
            }),
        );
        assert_eq!(seen.lock().len(), 1);

        let topology = pipeline.topology();
        assert!(matches!(topology, Topology::Sequence { .. }));
        assert_eq!(topology.stage_count(), 5);
        assert_eq!(topology.children()[1].name(), "lookups");
    }

    #[tokio::test]
    async fn test_nested_groups_merge_inner_first() {
        let inner = compose_concurrent(vec![
            extend("inner_a", "shared", json!("inner_a")),
            extend("inner_b", "shared", json!("inner_b")),
        ])
        .unwrap();
        let outer = compose_concurrent(vec![extend("outer_a", "shared", json!("outer_a")), inner])
            .unwrap();

        let pipeline = PipelineBuilder::new("nested")
            .shared_stage(outer)
            .build(echo)
            .unwrap();
        let ctx = pipeline.handle(FrameContext::new()).await.unwrap();

        assert_field(&ctx, "shared", "inner_b");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_spawned_members_run_in_parallel() {
        let barrier = Arc::new(Barrier::new(3));
        let group = compose_concurrent(vec![
            rendezvous("a", Arc::clone(&barrier)),
            rendezvous("b", Arc::clone(&barrier)),
            rendezvous("c", Arc::clone(&barrier)),
        ])
        .unwrap();
        let pipeline = PipelineBuilder::new("parallel")
            .shared_stage(group)
            .build(echo)
            .unwrap();

        let ctx = tokio::time::timeout(Duration::from_secs(5), pipeline.handle(FrameContext::new()))
            .await
            .expect("members should meet at the barrier")
            .unwrap();

        assert_fields(&ctx, &json!({"a": true, "b": true, "c": true}));
    }

    #[tokio::test]
    async fn test_inline_members_run_concurrently() {
        let barrier = Arc::new(Barrier::new(2));
        let group = compose_concurrent_with(
            GroupConfig::new().with_dispatch(Dispatch::Inline),
            vec![
                rendezvous("a", Arc::clone(&barrier)),
                rendezvous("b", Arc::clone(&barrier)),
            ],
        )
        .unwrap();
        let pipeline = PipelineBuilder::new("inline")
            .shared_stage(group)
            .build(echo)
            .unwrap();

        let ctx = tokio::time::timeout(Duration::from_secs(5), pipeline.handle(FrameContext::new()))
            .await
            .expect("members should meet at the barrier")
            .unwrap();

        assert_fields(&ctx, &json!({"a": true, "b": true}));
    }

    #[tokio::test]
    async fn test_sibling_dependency_yields_missing_field_not_error() {
        let reader: SharedStage<FrameContext> = FnStage::new("reader", |ctx: FrameContext, next: Next<FrameContext>| async move {
            let saw = ctx.get("profile").is_some();
            next.run(PartialContext::new().with("reader_saw_profile", saw)).await
        })
        .with_fields(FieldSet::new().requires(["profile"]).provides(["reader_saw_profile"]))
        .shared();

        let pipeline = PipelineBuilder::new("misuse")
            .concurrent(vec![extend("profile", "profile", json!({"fid": 1})), reader])
            .unwrap()
            .build(echo)
            .unwrap();

        let ctx = pipeline.handle(FrameContext::new()).await.unwrap();
        assert_field(&ctx, "reader_saw_profile", false);

        assert_eq!(
            pipeline.audit(),
            vec![FieldIssue::SiblingDependency {
                stage: "reader".into(),
                field: "profile".into(),
                sibling: "profile".into(),
            }]
        );
    }

    #[test]
    fn test_empty_compositions_fail_before_any_invocation() {
        let err = compose_concurrent::<FrameContext>(Vec::new()).unwrap_err();
        assert_eq!(err.kind, CompositionKind::Concurrent);

        let err = PipelineBuilder::<FrameContext>::new("empty")
            .concurrent(Vec::new())
            .unwrap_err();
        assert_eq!(err.kind, CompositionKind::Concurrent);

        let err = FrameflowError::from(err);
        assert_eq!(err.to_dict()["type"], "EmptyComposition");
    }

    #[tokio::test]
    async fn test_single_member_group_keeps_short_circuit() {
        // Wrapping would make the group call its continuation anyway.
        let calls = Arc::new(AtomicUsize::new(0));
        let only = ShortCircuitStage::new("only", FrameContext::new().with("from", "only")).shared();
        let group = compose_concurrent(vec![Arc::clone(&only)]).unwrap();
        assert!(Arc::ptr_eq(&only, &group));

        let pipeline = PipelineBuilder::new("single")
            .shared_stage(group)
            .build(counting_terminal(Arc::clone(&calls)))
            .unwrap();
        let ctx = pipeline.handle(FrameContext::new()).await.unwrap();

        assert_field(&ctx, "from", "only");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_group_inside_short_circuited_sequence_never_runs() {
        let member = ExtendStage::new("member", PartialContext::new());
        let member_calls = member.calls();
        let sink = Arc::new(CollectingEventSink::new());

        let pipeline = PipelineBuilder::new("skipped")
            .with_event_sink(sink.clone())
            .stage(ShortCircuitStage::new("halt", FrameContext::new()))
            .concurrent(vec![member.shared(), extend("b", "b", json!(1))])
            .unwrap()
            .build(echo)
            .unwrap();

        pipeline.handle(FrameContext::new()).await.unwrap();

        assert_eq!(member_calls.get(), 0);
        assert!(sink.events_of_type("group.").is_empty());
        assert_eq!(sink.events_of_type("pipeline.completed").len(), 1);
    }

    #[tokio::test]
    async fn test_stage_wrapping_next_sees_downstream_result() {
        let wrapper: SharedStage<FrameContext> = FnStage::new("wrapper", |_ctx: FrameContext, next: Next<FrameContext>| async move {
            let flow = next.proceed().await?;
            Ok(flow.map(|ctx| ctx.with("wrapped", true)))
        })
        .shared();

        let pipeline = PipelineBuilder::new("wrap")
            .shared_stage(wrapper)
            .concurrent(vec![extend("a", "a", json!(1)), extend("b", "b", json!(2))])
            .unwrap()
            .build(echo)
            .unwrap();

        let ctx = pipeline.handle(FrameContext::new()).await.unwrap();

        assert_fields(&ctx, &json!({"a": 1, "b": 2, "wrapped": true}));
    }

    /// A response type without `Debug`.
    struct Rendered(usize);

    #[tokio::test]
    async fn test_composites_accept_responses_without_debug() {
        let group = compose_concurrent(vec![
            ExtendStage::new("a", PartialContext::new().with("a", 1)).shared::<Rendered>(),
            ExtendStage::new("b", PartialContext::new().with("b", 2)).shared(),
        ])
        .unwrap();
        assert!(format!("{group:?}").starts_with("ConcurrentGroup"));

        let pipeline = PipelineBuilder::new("render")
            .stage(ExtendStage::new("seed", PartialContext::new().with("seed", 0)))
            .shared_stage(group)
            .build(|ctx: FrameContext| -> FrameflowResult<Rendered> { Ok(Rendered(ctx.len())) })
            .unwrap();

        let rendered = pipeline.handle(FrameContext::new()).await.unwrap();

        assert_eq!(rendered.0, 3);
        assert!(format!("{pipeline:?}").contains("Sequence"));
    }

    #[tokio::test]
    async fn test_member_that_records_then_fails_is_discarded() {
        let late = FnStage::new("late", |_ctx: FrameContext, next: Next<FrameContext>| async move {
            let recorded = next.run(PartialContext::new().with("late", 1)).await;
            assert!(recorded.is_ok());
            Err::<Flow<FrameContext>, _>(FrameflowError::stage(
                "late",
                anyhow::anyhow!("failed after recording"),
            ))
        })
        .shared();
        let count = Arc::new(AtomicUsize::new(0));

        let pipeline = PipelineBuilder::new("late")
            .concurrent(vec![late, extend("b", "b", json!(2))])
            .unwrap()
            .build(counting_terminal(Arc::clone(&count)))
            .unwrap();

        let err = pipeline.handle(FrameContext::new()).await.unwrap_err();

        assert_eq!(err.stage_name(), Some("late"));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_sequence_inside_inline_group_is_repeatable() {
        let inner = compose_sequential(vec![extend("a", "a", json!(1)), extend("x2", "x", json!(2))])
            .unwrap();
        let pipeline = PipelineBuilder::new("nested")
            .concurrent_with(
                GroupConfig::new().with_dispatch(Dispatch::Inline),
                vec![inner, extend("x3", "x", json!(3))],
            )
            .unwrap()
            .build(echo)
            .unwrap();

        let first = pipeline.handle(FrameContext::new().with("in", 0)).await.unwrap();
        let second = pipeline.handle(FrameContext::new().with("in", 0)).await.unwrap();

        assert_eq!(first.to_value(), json!({"in": 0, "a": 1, "x": 3}));
        assert_eq!(second, first);
    }
}
