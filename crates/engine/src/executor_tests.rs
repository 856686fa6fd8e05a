//! Scenario tests for the workflow execution engine.
//!
//! These run whole workflows through `WorkflowService` with the built-in
//! handlers.  Network and chat collaborators are `nodes::mock` doubles, and
//! individual handlers are swapped for `MockNode`s where a test needs to
//! count or script invocations.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;

use nodes::mock::{MockChat, MockNode, MockTransport};
use nodes::{default_registry, HandlerRegistry, StepHandler};

use crate::models::{StepKind, StepStatus, WorkflowDefinition, WorkflowStep};
use crate::{EngineError, ExecutionStatus, ExecutorConfig, WorkflowService, DEPENDENCIES_NOT_MET};

fn input(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

fn builtin_handlers() -> HandlerRegistry {
    default_registry(
        Arc::new(MockChat::replying("agent says hi")),
        Arc::new(MockTransport::responding(200, json!({ "ok": true }))),
    )
}

/// Service whose `http` steps are served by `node`.
fn service_with_http(node: Arc<dyn StepHandler>) -> WorkflowService {
    let mut handlers = builtin_handlers();
    handlers.insert(StepKind::Http, node);
    WorkflowService::with_handlers(
        handlers,
        Arc::new(MockTransport::responding(200, json!(null))),
        ExecutorConfig::default(),
    )
}

fn service() -> WorkflowService {
    WorkflowService::with_handlers(
        builtin_handlers(),
        Arc::new(MockTransport::responding(200, json!(null))),
        ExecutorConfig::default(),
    )
}

fn http(id: &str) -> WorkflowStep {
    WorkflowStep::new(id, StepKind::Http, json!({ "url": "https://x.test" }))
}

fn wait(id: &str) -> WorkflowStep {
    WorkflowStep::new(id, StepKind::Wait, json!({ "duration": 1 }))
}

// ============================================================
// Lookup errors
// ============================================================

#[tokio::test]
async fn unknown_workflow_is_an_error_and_records_nothing() {
    let svc = service();
    let err = svc.execute_workflow("missing", Map::new()).await.unwrap_err();

    assert_eq!(err, EngineError::WorkflowNotFound("missing".into()));
    assert!(svc.list_executions(None).is_empty());
}

// ============================================================
// Dependency handling
// ============================================================

#[tokio::test]
async fn cycle_fails_execution_before_any_step_runs() {
    let node = Arc::new(MockNode::returning("http", json!(1)));
    let svc = service_with_http(node.clone());
    svc.register_workflow(WorkflowDefinition::new(
        "cyclic",
        "cyclic",
        vec![http("a").depends_on(["b"]), http("b").depends_on(["a"])],
    ));

    let execution = svc.execute_workflow("cyclic", Map::new()).await.unwrap();

    assert_eq!(execution.status, ExecutionStatus::Failed);
    assert!(execution.error.as_deref().unwrap().contains("circular dependency"));
    assert!(execution.step_results.is_empty());
    assert!(execution.completed_at.is_some());
    assert_eq!(node.call_count(), 0);
}

#[tokio::test]
async fn failure_without_retry_stops_and_leaves_dependents_absent() {
    let node = Arc::new(MockNode::failing("a", "upstream exploded"));
    let svc = service_with_http(node.clone());
    svc.register_workflow(WorkflowDefinition::new(
        "stop",
        "stop",
        vec![http("a"), wait("b").depends_on(["a"]), wait("c")],
    ));

    let execution = svc.execute_workflow("stop", Map::new()).await.unwrap();

    assert_eq!(execution.status, ExecutionStatus::Failed);
    assert_eq!(execution.error.as_deref(), Some("upstream exploded"));
    assert_eq!(execution.step_results["a"].status, StepStatus::Failed);
    assert!(!execution.step_results.contains_key("b"));
    assert!(!execution.step_results.contains_key("c"));
}

#[tokio::test]
async fn skips_cascade_through_unsatisfied_dependencies() {
    let svc = service();
    svc.register_workflow(WorkflowDefinition::new(
        "cascade",
        "cascade",
        vec![
            wait("a").depends_on(["c"]),
            wait("b").depends_on(["a"]),
            wait("c").depends_on(["ghost"]),
            wait("free"),
        ],
    ));

    let execution = svc.execute_workflow("cascade", Map::new()).await.unwrap();

    for id in ["a", "b", "c"] {
        let result = &execution.step_results[id];
        assert_eq!(result.status, StepStatus::Skipped, "step {id}");
        assert_eq!(result.error.as_deref(), Some(DEPENDENCIES_NOT_MET));
        assert_eq!(result.attempts, 0);
    }
    assert_eq!(execution.step_results["free"].status, StepStatus::Completed);
    // a skip is not a failure
    assert_eq!(execution.status, ExecutionStatus::Completed);
}

// ============================================================
// Retry policy
// ============================================================

#[tokio::test(start_paused = true)]
async fn retried_step_is_invoked_max_retries_plus_one_times() {
    let node = Arc::new(MockNode::failing("flaky", "still down"));
    let svc = service_with_http(node.clone());
    svc.register_workflow(WorkflowDefinition::new(
        "retry",
        "retry",
        vec![http("a").with_retry(2, 10), wait("after-a").depends_on(["a"]), wait("independent")],
    ));

    let execution = svc.execute_workflow("retry", Map::new()).await.unwrap();

    assert_eq!(node.call_count(), 3);
    let a = &execution.step_results["a"];
    assert_eq!(a.status, StepStatus::Failed);
    assert_eq!(a.attempts, 3);

    // The walk continues past a step with a retry policy ...
    assert_eq!(execution.step_results["after-a"].status, StepStatus::Skipped);
    assert_eq!(execution.step_results["independent"].status, StepStatus::Completed);
    // ... but the execution still reports the exhausted step.
    assert_eq!(execution.status, ExecutionStatus::Failed);
    assert_eq!(execution.error.as_deref(), Some("still down"));
}

#[tokio::test(start_paused = true)]
async fn retry_recovers_transient_failure() {
    let node = Arc::new(MockNode::flaky("flaky", 1, json!({ "id": 1 })));
    let svc = service_with_http(node.clone());
    let mut step = http("fetch").with_retry(3, 10);
    step.config["outputVariable"] = json!("record");
    svc.register_workflow(WorkflowDefinition::new("recover", "recover", vec![step]));

    let execution = svc.execute_workflow("recover", Map::new()).await.unwrap();

    assert_eq!(execution.status, ExecutionStatus::Completed);
    assert_eq!(execution.step_results["fetch"].attempts, 2);
    assert_eq!(execution.variables["record"], json!({ "id": 1 }));
}

// ============================================================
// Variables
// ============================================================

#[tokio::test]
async fn variables_flow_from_transform_into_condition() {
    let svc = service();
    svc.register_workflow(WorkflowDefinition::new(
        "greet",
        "greet",
        vec![
            WorkflowStep::new(
                "greet",
                StepKind::Transform,
                json!({ "transformType": "template", "template": "Hello {{name}}", "outputVariable": "greeting" }),
            ),
            WorkflowStep::new(
                "check",
                StepKind::Condition,
                json!({ "variable": "greeting", "operator": "contains", "value": "Ann", "outputVariable": "isAnn" }),
            ),
        ],
    ));

    let execution = svc.execute_workflow("greet", input(json!({ "name": "Ann" }))).await.unwrap();

    assert_eq!(execution.status, ExecutionStatus::Completed);
    assert_eq!(execution.variables["greeting"], json!("Hello Ann"));
    assert_eq!(execution.step_results["check"].output, Some(json!(true)));
    assert_eq!(execution.variables["isAnn"], json!(true));
}

#[tokio::test]
async fn input_overrides_workflow_variables() {
    let svc = service();
    let mut workflow = WorkflowDefinition::new(
        "vars",
        "vars",
        vec![WorkflowStep::new(
            "t",
            StepKind::Transform,
            json!({ "transformType": "template", "template": "{{greeting}}, {{who}}", "outputVariable": "line" }),
        )],
    );
    workflow.variables = input(json!({ "greeting": "Hi", "who": "world" }));
    svc.register_workflow(workflow);

    let execution = svc.execute_workflow("vars", input(json!({ "who": "Ann" }))).await.unwrap();
    assert_eq!(execution.variables["line"], json!("Hi, Ann"));
}

#[tokio::test]
async fn agent_step_output_is_stored() {
    let svc = service();
    svc.register_workflow(WorkflowDefinition::new(
        "agent",
        "agent",
        vec![WorkflowStep::new(
            "ask",
            StepKind::Agent,
            json!({ "prompt": "Summarise {{topic}}", "outputVariable": "summary" }),
        )],
    ));

    let execution = svc.execute_workflow("agent", input(json!({ "topic": "rust" }))).await.unwrap();

    assert_eq!(execution.status, ExecutionStatus::Completed);
    assert_eq!(execution.variables["summary"], json!("agent says hi"));
}

#[tokio::test]
async fn end_to_end_wait_then_stringify() {
    let svc = service();
    let workflow: WorkflowDefinition = serde_json::from_value(json!({
        "id": "e2e",
        "name": "wait then stringify",
        "steps": [
            { "id": "a", "name": "pause", "type": "wait", "config": { "duration": 1 } },
            {
                "id": "b",
                "name": "stringify",
                "type": "transform",
                "dependsOn": ["a"],
                "config": { "transformType": "json-stringify", "input": "x", "outputVariable": "out" }
            }
        ]
    }))
    .unwrap();
    svc.register_workflow(workflow);

    let execution = svc.execute_workflow("e2e", input(json!({ "x": { "k": 1 } }))).await.unwrap();

    assert_eq!(execution.status, ExecutionStatus::Completed);
    assert_eq!(execution.variables["out"], json!("{\n  \"k\": 1\n}"));
    assert_eq!(execution.step_results["a"].status, StepStatus::Completed);
    assert_eq!(execution.step_results["a"].output, Some(json!({ "waited": true })));
    assert_eq!(execution.step_results["b"].status, StepStatus::Completed);
}

// ============================================================
// Execution store
// ============================================================

#[tokio::test]
async fn executions_are_stored_and_listed_per_workflow() {
    let svc = service();
    svc.register_workflow(WorkflowDefinition::new("one", "one", vec![wait("w")]));
    svc.register_workflow(WorkflowDefinition::new("two", "two", vec![wait("w")]));

    let first = svc.execute_workflow("one", Map::new()).await.unwrap();
    let second = svc.execute_workflow("one", Map::new()).await.unwrap();
    svc.execute_workflow("two", Map::new()).await.unwrap();

    assert_eq!(svc.get_execution(first.id), Some(first.clone()));

    let listed: Vec<_> = svc.list_executions(Some("one")).into_iter().map(|e| e.id).collect();
    assert_eq!(listed, vec![second.id, first.id]);
    assert_eq!(svc.list_executions(None).len(), 3);
}

#[tokio::test]
async fn concurrent_executions_keep_separate_variables() {
    let svc = Arc::new(service());
    svc.register_workflow(WorkflowDefinition::new(
        "echo",
        "echo",
        vec![
            WorkflowStep::new("pause", StepKind::Wait, json!({ "duration": 5 })),
            WorkflowStep::new(
                "t",
                StepKind::Transform,
                json!({ "transformType": "template", "template": "{{n}}", "outputVariable": "seen" }),
            )
            .depends_on(["pause"]),
        ],
    ));

    let tasks: Vec<_> = (0..8)
        .map(|n| {
            let svc = Arc::clone(&svc);
            tokio::spawn(async move { svc.execute_workflow("echo", input(json!({ "n": n }))).await })
        })
        .collect();

    for (n, task) in tasks.into_iter().enumerate() {
        let execution = task.await.unwrap().unwrap();
        assert_eq!(execution.variables["seen"], json!(n.to_string()));
    }
    assert_eq!(svc.list_executions(Some("echo")).len(), 8);
}

// ============================================================
// Cancellation
// ============================================================

#[tokio::test(start_paused = true)]
async fn cancellation_aborts_the_step_in_flight() {
    let svc = Arc::new(service());
    svc.register_workflow(WorkflowDefinition::new(
        "slow",
        "slow",
        vec![
            WorkflowStep::new("long", StepKind::Wait, json!({ "duration": 60_000 })),
            wait("next"),
        ],
    ));

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let execution = svc
        .execute_workflow_with_cancel("slow", Map::new(), &cancel)
        .await
        .unwrap();

    assert_eq!(execution.status, ExecutionStatus::Cancelled);
    assert_eq!(execution.error.as_deref(), Some(crate::EXECUTION_CANCELLED));
    assert_eq!(execution.step_results["long"].status, StepStatus::Failed);
    assert_eq!(execution.step_results["long"].error.as_deref(), Some("step cancelled"));
    assert!(!execution.step_results.contains_key("next"));
}

#[tokio::test]
async fn pre_cancelled_token_runs_nothing() {
    let node = Arc::new(MockNode::returning("http", json!(1)));
    let svc = service_with_http(node.clone());
    svc.register_workflow(WorkflowDefinition::new("never", "never", vec![http("a")]));

    let cancel = CancellationToken::new();
    cancel.cancel();
    let execution = svc.execute_workflow_with_cancel("never", Map::new(), &cancel).await.unwrap();

    assert_eq!(execution.status, ExecutionStatus::Cancelled);
    assert!(execution.step_results.is_empty());
    assert_eq!(node.call_count(), 0);
}

#[tokio::test]
async fn handlers_see_the_running_execution_ids() {
    let node = Arc::new(MockNode::returning("http", json!(1)));
    let svc = service_with_http(node.clone());
    svc.register_workflow(WorkflowDefinition::new("ids", "ids", vec![http("first"), http("second")]));

    let execution = svc.execute_workflow("ids", Map::new()).await.unwrap();

    let invocations = node.invocations.lock().unwrap().clone();
    assert_eq!(
        invocations,
        vec![
            ("ids".to_owned(), execution.id, "first".to_owned()),
            ("ids".to_owned(), execution.id, "second".to_owned()),
        ]
    );
}

#[tokio::test]
async fn steps_without_transform_type_or_operator_do_not_halt_the_run() {
    let svc = service();
    svc.register_workflow(WorkflowDefinition::new(
        "lenient",
        "lenient",
        vec![
            WorkflowStep::new("copy", StepKind::Transform, json!({ "input": "v", "outputVariable": "copied" })),
            WorkflowStep::new("check", StepKind::Condition, json!({ "variable": "copied", "outputVariable": "ok" }))
                .depends_on(["copy"]),
        ],
    ));

    let execution = svc.execute_workflow("lenient", input(json!({ "v": 7 }))).await.unwrap();

    assert_eq!(execution.status, ExecutionStatus::Completed);
    assert_eq!(execution.variables["copied"], json!(7));
    assert_eq!(execution.variables["ok"], json!(false));
}
