//! End-to-end scenarios: dispatch through a local bus, threads per
//! controller, and aggregation on the event.

#[cfg(test)]
mod tests {
    use crate::context::ContextConfig;
    use crate::core::{ExecutorKind, ExecutorState, NotificationKind};
    use crate::errors::{CommandError, EventError};
    use crate::events::{Listener, Notification};
    use crate::executors::{
        Command, CommandSpec, ConditionalSpec, EventSpec, FunctionSpec, Predicate, PromiseSpec, Spec,
        SpecRegistry,
    };
    use crate::inject::Args;
    use crate::testing::{CallLog, TestHarness};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_test::{assert_err, assert_ok};

    fn nested(outer: bool, inner: bool, log: &CallLog) -> Spec {
        ConditionalSpec::new(Predicate::constant(outer))
            .then(
                ConditionalSpec::new(Predicate::constant(inner))
                    .then(log.recorder("true/true"))
                    .otherwise(log.recorder("true/false")),
            )
            .otherwise(
                ConditionalSpec::new(Predicate::constant(inner))
                    .then(log.recorder("false/true"))
                    .otherwise(log.recorder("false/false")),
            )
            .into()
    }

    #[tokio::test]
    async fn test_nested_conditionals_resolve_depth_first() {
        let cases = [
            (true, true, "true/true"),
            (true, false, "true/false"),
            (false, true, "false/true"),
            (false, false, "false/false"),
        ];

        for (outer, inner, expected) in cases {
            let harness = TestHarness::new();
            let log = CallLog::new();
            harness.controller("form", "decide", vec![nested(outer, inner, &log)]);

            let (_, settled) = harness.dispatch(harness.ctx.event("decide")).await.unwrap();

            assert_ok!(settled);
            assert_eq!(log.entries(), vec![expected.to_string()], "outer={outer} inner={inner}");
        }
    }

    #[tokio::test]
    async fn test_conditional_runs_exactly_one_branch() {
        let harness = TestHarness::new();
        let log = CallLog::new();
        let is_admin = Predicate::new("is_admin", &["role"], |args| Ok(args.value("role") == Some(&json!("admin"))));
        harness.controller(
            "form",
            "open",
            vec![ConditionalSpec::new(is_admin)
                .then(log.recorder("admin"))
                .otherwise(log.recorder("guest"))
                .into()],
        );

        harness
            .dispatch(harness.ctx.event("open").with_value("role", json!("admin")))
            .await
            .unwrap();
        harness
            .dispatch(harness.ctx.event("open").with_value("role", json!("viewer")))
            .await
            .unwrap();

        assert_eq!(log.entries(), vec!["admin", "guest"]);
    }

    #[tokio::test]
    async fn test_omitted_branch_completes_immediately() {
        let harness = TestHarness::new();
        let log = CallLog::new();
        harness.controller(
            "form",
            "open",
            vec![
                ConditionalSpec::new(Predicate::constant(false)).then(log.recorder("never")).into(),
                log.recorder("after"),
            ],
        );

        let (event, settled) = harness.dispatch(harness.ctx.event("open")).await.unwrap();

        assert_ok!(settled);
        assert_eq!(log.entries(), vec!["after"]);
        assert_eq!(event.notifications(), vec![Notification::Done]);
    }

    #[tokio::test]
    async fn test_truthy_missing_key_takes_else_branch() {
        let harness = TestHarness::new();
        let log = CallLog::new();
        let branch = || {
            ConditionalSpec::new(Predicate::truthy("draft"))
                .then(log.recorder("has_draft"))
                .otherwise(log.recorder("no_draft"))
        };
        harness.controller("form", "save", vec![branch().into()]);
        let defaults = Arc::new(
            harness
                .ctx
                .controller("defaults")
                .with_injection("draft", json!({"body": ""})),
        );
        harness.listen(&defaults, "save", vec![branch().into()]);

        let (_, settled) = harness.dispatch(harness.ctx.event("save")).await.unwrap();

        assert_ok!(settled);
        let mut entries = log.entries();
        entries.sort();
        assert_eq!(entries, vec!["has_draft", "no_draft"]);
    }

    #[tokio::test]
    async fn test_controller_injection_and_override() {
        let harness = TestHarness::new();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = seen.clone();
        let controller = Arc::new(
            harness
                .ctx
                .controller("form")
                .with_injection("some_injection", json!({"test": "test"})),
        );
        harness.listen(
            &controller,
            "save",
            vec![FunctionSpec::new("read", &["some_injection"], move |args| {
                sink.lock().push(args.value("some_injection").cloned().unwrap_or(Value::Null));
                Ok(())
            })
            .into()],
        );

        harness.dispatch(harness.ctx.event("save")).await.unwrap();
        harness
            .dispatch(harness.ctx.event("save").with_value("some_injection", json!("override")))
            .await
            .unwrap();

        assert_eq!(*seen.lock(), vec![json!({"test": "test"}), json!("override")]);
    }

    #[tokio::test]
    async fn test_two_controllers_done_after_both() {
        let harness = TestHarness::new();
        let log = CallLog::new();
        let slow = PromiseSpec::new("slow", &[], |_| async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok(json!("slow"))
        });
        harness.controller("fast", "save", vec![log.recorder("fast")]);
        harness.controller("slow", "save", vec![slow.into(), log.recorder("slow")]);

        let (event, settled) = harness.dispatch(harness.ctx.event("save")).await.unwrap();

        assert_ok!(settled);
        assert_eq!(log.count("fast"), 1);
        assert_eq!(log.count("slow"), 1);
        assert_eq!(event.completed().len(), 2);
        assert_eq!(event.notifications(), vec![Notification::Done]);
    }

    #[tokio::test]
    async fn test_one_failure_makes_event_fail() {
        let harness = TestHarness::new();
        let log = CallLog::new();
        harness.controller("ok", "save", vec![log.recorder("ok")]);
        harness.controller("broken", "save", vec![log.failer("broken"), log.recorder("after")]);

        let (event, settled) = harness.dispatch(harness.ctx.event("save")).await.unwrap();

        let err = assert_err!(settled);
        assert_eq!(err.message, "broken");
        assert_eq!(log.count("after"), 1);
        assert!(event.is_settled());
        assert_eq!(event.errors(), vec![CommandError::new("broken")]);
        assert!(event.in_flight().is_empty());
        assert_eq!(
            event.notifications(),
            vec![
                Notification::Fail(CommandError::new("broken")),
                Notification::Fail(CommandError::new("broken")),
            ]
        );
    }

    #[tokio::test]
    async fn test_late_listener_sees_history() {
        let harness = TestHarness::new();
        let log = CallLog::new();
        harness.controller("form", "save", vec![log.recorder("a")]);
        let (event, _) = harness.dispatch(harness.ctx.event("save")).await.unwrap();

        let first = log.clone();
        let listener = Listener::new(move |_| first.record("listener"));
        event.add_listener(NotificationKind::Done, listener.clone()).unwrap();
        assert!(matches!(
            event.add_listener(NotificationKind::Done, listener),
            Err(EventError::DuplicateListener { .. })
        ));

        let second = log.clone();
        event
            .add_listener(NotificationKind::Done, Listener::new(move |_| second.record("other")))
            .unwrap();

        assert_eq!(log.entries(), vec!["a", "listener", "other"]);
    }

    #[tokio::test]
    async fn test_double_dispatch_rejected() {
        let harness = TestHarness::new();
        let (event, _) = harness.dispatch(harness.ctx.event("save")).await.unwrap();

        let err = event.dispatch(&harness.ctx).unwrap_err();
        assert!(matches!(err, EventError::DoubleDispatch { .. }));
    }

    #[tokio::test]
    async fn test_sub_event_inherits_promise_result() {
        let harness = TestHarness::new();
        let seen = Arc::new(parking_lot::Mutex::new(None));
        let sink = seen.clone();
        harness.controller(
            "loader",
            "load",
            vec![
                PromiseSpec::new("fetch", &["id"], |args| async move {
                    let id: u64 = args.parse("id")?;
                    Ok::<_, CommandError>(json!({"id": id, "name": "draft"}))
                })
                .into(),
                Spec::event("loaded"),
            ],
        );
        harness.controller(
            "view",
            "loaded",
            vec![FunctionSpec::new("render", &["promise_result"], move |args| {
                *sink.lock() = args.value("promise_result").cloned();
                Ok(())
            })
            .into()],
        );

        let (event, settled) = harness.dispatch(harness.ctx.event("load").with_value("id", json!(4))).await.unwrap();

        assert_ok!(settled);
        assert_eq!(*seen.lock(), Some(json!({"id": 4, "name": "draft"})));
        assert_eq!(event.promise_result(), Some(json!({"id": 4, "name": "draft"})));
    }

    #[tokio::test]
    async fn test_rejected_promise_is_recoverable() {
        let harness = TestHarness::new();
        let log = CallLog::new();
        let after = log.clone();
        harness.controller(
            "loader",
            "load",
            vec![
                PromiseSpec::new("fetch", &[], |_| async { Err(CommandError::new("offline")) }).into(),
                FunctionSpec::new("report", &["promise_error"], move |args| {
                    if let Some(crate::inject::Arg::Error(Some(err))) = args.get("promise_error") {
                        after.record(&err.message);
                    }
                    Ok(())
                })
                .into(),
            ],
        );

        let (event, settled) = harness.dispatch(harness.ctx.event("load")).await.unwrap();

        assert_eq!(assert_err!(settled).message, "offline");
        assert_eq!(log.entries(), vec!["offline"]);
        assert_eq!(event.promise_error(), Some(CommandError::new("offline")));
    }

    #[tokio::test]
    async fn test_failed_sub_event_fails_trigger() {
        let harness = TestHarness::new();
        let log = CallLog::new();
        harness.controller("parent", "save", vec![Spec::event("validate"), log.recorder("after")]);
        harness.controller("validator", "validate", vec![log.failer("invalid")]);

        let (event, settled) = harness.dispatch(harness.ctx.event("save")).await.unwrap();

        assert_eq!(assert_err!(settled).message, "invalid");
        assert_eq!(log.entries(), vec!["invalid", "after"]);
        assert_eq!(event.errors().len(), 1);
    }

    #[tokio::test]
    async fn test_sub_event_trigger_waits_for_slow_controller_after_failure() {
        let harness = TestHarness::new();
        let log = CallLog::new();
        let slow_log = log.clone();
        let slow = PromiseSpec::new("slow", &[], move |_| {
            let log = slow_log.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                log.record("slow");
                Ok(Value::Null)
            }
        });
        harness.controller("parent", "save", vec![Spec::event("validate"), log.recorder("after")]);
        harness.controller("strict", "validate", vec![log.failer("invalid")]);
        harness.controller("thorough", "validate", vec![slow.into()]);

        let (event, settled) = harness.dispatch(harness.ctx.event("save")).await.unwrap();

        assert_eq!(assert_err!(settled).message, "invalid");
        assert_eq!(log.entries(), vec!["invalid", "slow", "after"]);
        assert!(event.in_flight().is_empty());
    }

    #[tokio::test]
    async fn test_parallel_group_waits_for_all() {
        let harness = TestHarness::new();
        let log = CallLog::new();
        let slow_log = log.clone();
        let slow = PromiseSpec::new("slow", &[], move |_| {
            let log = slow_log.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                log.record("slow");
                Ok(Value::Null)
            }
        });
        harness.controller(
            "form",
            "save",
            vec![Spec::parallel(vec![slow.into(), log.recorder("quick")]), log.recorder("after")],
        );

        let (_, settled) = harness.dispatch(harness.ctx.event("save")).await.unwrap();

        assert_ok!(settled);
        assert_eq!(log.entries(), vec!["quick", "slow", "after"]);
    }

    #[tokio::test]
    async fn test_parallel_group_fails_if_any_member_fails() {
        let harness = TestHarness::new();
        let log = CallLog::new();
        harness.controller(
            "form",
            "save",
            vec![Spec::parallel(vec![log.recorder("a"), log.failer("b"), log.recorder("c")])],
        );

        let (event, settled) = harness.dispatch(harness.ctx.event("save")).await.unwrap();

        assert_eq!(assert_err!(settled).message, "b");
        assert_eq!(log.count("a") + log.count("b") + log.count("c"), 3);
        assert_eq!(event.errors().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_parallel_group_completes() {
        let harness = TestHarness::new();
        let log = CallLog::new();
        harness.controller("form", "save", vec![Spec::Parallel(Vec::new()), log.recorder("after")]);

        let (_, settled) = harness.dispatch(harness.ctx.event("save")).await.unwrap();

        assert_ok!(settled);
        assert_eq!(log.entries(), vec!["after"]);
    }

    struct Autosave {
        log: CallLog,
    }

    #[async_trait]
    impl Command for Autosave {
        fn arguments(&self) -> &[&str] {
            &["draft", "thread", "done"]
        }

        async fn execute(&mut self, args: Args) -> Result<(), CommandError> {
            let draft: String = args.parse("draft")?;
            let done = args.done().cloned().ok_or("done not injected")?;
            let thread = args.thread().cloned().ok_or("thread not injected")?;
            self.log.record(&format!("saving {draft}"));

            thread
                .trigger("autosaved", [("draft", json!(draft))])
                .map_err(|e| CommandError::new(e.to_string()))?;
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(2)).await;
                done.done();
            });
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_command_completes_through_continuation() {
        let harness = TestHarness::new();
        let log = CallLog::new();
        let command_log = log.clone();
        let notified = log.clone();
        harness.controller(
            "editor",
            "save",
            vec![
                CommandSpec::new("autosave", move || Autosave { log: command_log.clone() }).into(),
                log.recorder("after"),
            ],
        );
        harness.controller(
            "status",
            "autosaved",
            vec![FunctionSpec::new("notify", &["draft"], move |args| {
                let draft: String = args.parse("draft")?;
                notified.record(&format!("autosaved {draft}"));
                Ok(())
            })
            .into()],
        );

        let (_, settled) = harness
            .dispatch(harness.ctx.event("save").with_value("draft", json!("hello")))
            .await
            .unwrap();

        assert_ok!(settled);
        assert_eq!(log.entries(), vec!["saving hello", "autosaved hello", "after"]);
    }

    #[tokio::test]
    async fn test_unresolved_argument_fails_event_with_diagnostics() {
        let harness = TestHarness::new();
        let log = CallLog::new();
        harness.controller(
            "form",
            "save",
            vec![FunctionSpec::new("store", &["draft", "user"], |_| Ok(())).into(), log.recorder("after")],
        );

        let (_, settled) = harness
            .dispatch(harness.ctx.event("save").with_value("draft", json!("x")))
            .await
            .unwrap();

        let err = assert_err!(settled);
        assert_eq!(err.code(), Some(CommandError::UNRESOLVED_ARGUMENT));
        assert!(err.message.contains("'user'"));
        assert!(err.message.contains("draft, user"));
        assert!(err.message.contains("controller 'form'"));
        assert!(log.entries().is_empty());
    }

    #[tokio::test]
    async fn test_declarative_specs() {
        let harness = TestHarness::new();
        let log = CallLog::new();
        let registry = SpecRegistry::new();
        registry.register("validate", log.recorder("validate"));
        registry.register("insert", log.recorder("insert"));
        registry.register("update", log.recorder("update"));
        registry.register_predicate(
            "is_new",
            Predicate::new("is_new", &["id"], |args| Ok(args.value("id") == Some(&Value::Null))),
        );

        let specs = registry
            .build_str(
                r#"[
                    {"run": "validate"},
                    {"if": "is_new", "then": {"run": "insert"}, "else": {"run": "update"}},
                    {"event": "stored", "values": {"source": "form"}}
                ]"#,
            )
            .unwrap();
        harness.controller("form", "save", specs);
        harness.controller(
            "audit",
            "stored",
            vec![ConditionalSpec::new(Predicate::truthy("source")).then(log.recorder("audit")).into()],
        );

        let (_, settled) = harness
            .dispatch(harness.ctx.event("save").with_value("id", Value::Null))
            .await
            .unwrap();

        assert_ok!(settled);
        assert_eq!(log.entries(), vec!["validate", "insert", "audit"]);
    }

    #[tokio::test]
    async fn test_uncaught_required_event_is_diagnosed() {
        let harness = TestHarness::new();
        harness.controller("form", "save", vec![Spec::Event(EventSpec::new("nobody").require_catch())]);

        let (_, settled) = harness.dispatch(harness.ctx.event("save")).await.unwrap();

        assert_ok!(settled);
        let uncaught = harness.sink.events_of_type("event.uncaught");
        assert_eq!(uncaught.len(), 1);
        assert_eq!(uncaught[0].1.as_ref().and_then(|d| d.get("event_type")), Some(&json!("nobody")));
    }

    #[tokio::test]
    async fn test_teardown_rejects_dispatch_and_threads() {
        let harness = TestHarness::with_config(ContextConfig::default().with_name("page"));
        let log = CallLog::new();
        harness.controller("form", "save", vec![log.recorder("a")]);

        harness.ctx.teardown();

        let err = harness.ctx.dispatch(harness.ctx.event("save")).unwrap_err();
        assert_eq!(err, EventError::TornDown { context: "page".to_string() });
        assert!(harness.ctx.thread(vec![log.recorder("b")]).is_destroyed());
        assert!(log.entries().is_empty());
    }

    #[tokio::test]
    async fn test_thread_records_executed_steps() {
        let harness = TestHarness::new();
        let log = CallLog::new();
        let thread = harness.ctx.thread(vec![
            log.recorder("a"),
            Spec::conditional(Predicate::constant(true), Some(log.recorder("b")), None),
        ]);

        let handle = thread.run(Arc::new(harness.ctx.event("save")), |_| {}, |_, _, _| {}).unwrap();
        handle.await.unwrap();

        let steps = thread.executed();
        assert_eq!(
            steps.iter().map(|s| s.kind).collect::<Vec<_>>(),
            vec![ExecutorKind::Function, ExecutorKind::Conditional]
        );
        assert!(steps.iter().all(|s| s.state == ExecutorState::Done && s.duration_ms.is_some()));
        assert_eq!(harness.sink.events_of_type("executor.evicted").len(), 2);
    }
}
