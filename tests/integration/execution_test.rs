//! Execution Integration Tests
//!
//! Plans driven end to end through the engine with scripted collaborators:
//! scheduling policies, halting, retries, output mappings, batches,
//! deadlocks, cancellation and events.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use task_cascade::services::decomposition::EXTRACTED_FIELD;
use task_cascade::{
    DependencyCondition, EngineSettings, EventKind, PageElement, PageSnapshot, ParamKind, ParameterSpec, Plan, PlanStatus,
    PlannedTask, Planner, SchedulingPolicy, TaskCatalogue, TaskDefinition, TaskDependency, TaskPriority,
    TaskStatus, TaskType,
};

use task_cascade::models::TaskErrorKind;
use task_cascade::{ExecutionEngine, TaskRunner};

use super::mocks::{engine_with, engine_with_catalogue, FixedSnapshot, RecordingPages, Reply, ScriptedText};

fn text_task(id: &str, text: &str) -> PlannedTask {
    PlannedTask::new(id, id, TaskType::Summarize)
        .with_param("text", text)
        .with_max_retries(0)
}

fn plan_of(tasks: Vec<PlannedTask>) -> Plan {
    let mut tasks = tasks;
    for (i, task) in tasks.iter_mut().enumerate() {
        task.execution_order = i;
    }
    Plan::new("test", "test", tasks)
}

fn pages() -> Arc<RecordingPages> {
    Arc::new(RecordingPages::new(json!("PAGE TEXT")))
}

/// Records `<kind>:<task id>` for every task event.
fn event_log(engine: &mut task_cascade::ExecutionEngine) -> Arc<Mutex<Vec<String>>> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    engine.events_mut().on_any(move |event| {
        let entry = match &event.task_id {
            Some(id) => format!("{}:{}", event.kind, id),
            None => event.kind.to_string(),
        };
        sink.lock().unwrap().push(entry);
        Ok(())
    });
    log
}

// ============================================================================
// End to end
// ============================================================================

#[tokio::test]
async fn test_summary_flows_into_translation() {
    let planner = Planner::with_builtins(EngineSettings::default());
    let snapshot = PageSnapshot {
        selected_text: "A very long article about borrow checking.".to_string(),
        ..Default::default()
    };
    let mut plan = planner
        .create_plan("summarize this text and translate it to Chinese", Some(&snapshot), None)
        .unwrap();

    let text = Arc::new(ScriptedText::new().reply("Summarize", Reply::Text("SHORT SUMMARY".to_string())));
    let engine = engine_with(text.clone(), pages());
    let report = engine
        .execute(&mut plan, SchedulingPolicy::DependencyAware, 4)
        .await
        .unwrap();

    assert_eq!(report.status, PlanStatus::Completed);
    assert_eq!(report.completed, 2);

    let prompts = text.prompts();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[0].contains("A very long article about borrow checking."));
    assert!(prompts[1].contains("Chinese"));
    assert!(prompts[1].contains("SHORT SUMMARY"));
    assert_eq!(report.output(&plan.tasks[0].id), Some(&json!("SHORT SUMMARY")));
}

#[tokio::test]
async fn test_click_uses_grounded_locator() {
    let planner = Planner::with_builtins(EngineSettings::default());
    let snapshot = PageSnapshot {
        buttons: vec![
            PageElement::new("#cancel", "Cancel"),
            PageElement::new("#submit-btn", "Submit"),
        ],
        ..Default::default()
    };
    let mut plan = planner
        .create_plan("click the Submit button", Some(&snapshot), None)
        .unwrap();

    let pages = pages();
    let engine = engine_with(Arc::new(ScriptedText::new()), pages.clone());
    let report = engine.run(&mut plan).await.unwrap();

    assert!(report.is_success());
    let performed = pages.performed();
    assert_eq!(performed.len(), 1);
    assert_eq!(performed[0].locator.as_deref(), Some("#submit-btn"));
}

#[tokio::test]
async fn test_extracted_page_text_feeds_summary() {
    let extract = PlannedTask::new("extract", "Extract", TaskType::Extract).with_parallelizable(false);
    let summarize = PlannedTask::new("summarize", "Summarize", TaskType::Summarize)
        .with_dependency(TaskDependency::on_success("extract").map("text", EXTRACTED_FIELD));
    let mut plan = plan_of(vec![extract, summarize]);

    let text = Arc::new(ScriptedText::new());
    let engine = engine_with(text.clone(), pages());
    let report = engine
        .execute(&mut plan, SchedulingPolicy::DependencyAware, 2)
        .await
        .unwrap();

    assert_eq!(report.completed, 2);
    assert!(text.prompts()[0].contains("PAGE TEXT"));
    assert_eq!(report.output("extract").unwrap()[EXTRACTED_FIELD], json!("PAGE TEXT"));
}

#[tokio::test]
async fn test_resnapshot_regrounds_against_live_page() {
    let click = PlannedTask::new("click", "Click", TaskType::Click)
        .with_param("target", "click Save")
        .with_param("locator", "#stale-save");
    let mut plan = plan_of(vec![click]);

    let live = PageSnapshot {
        buttons: vec![PageElement::new("#save", "Save")],
        ..Default::default()
    };
    let pages = pages();
    let runner = TaskRunner::new(Arc::new(TaskCatalogue::with_builtins()), Arc::new(ScriptedText::new()))
        .with_page_executor(pages.clone())
        .with_snapshot_provider(Arc::new(FixedSnapshot(live)))
        .resnapshot_before_actions(true);
    let engine = ExecutionEngine::new(runner, EngineSettings::default());

    let report = engine.execute(&mut plan, SchedulingPolicy::Sequential, 1).await.unwrap();

    assert!(report.is_success());
    assert_eq!(pages.performed()[0].locator.as_deref(), Some("#save"));
}

#[tokio::test(start_paused = true)]
async fn test_ungroundable_target_fails_as_grounding_error() {
    let click = PlannedTask::new("click", "Click", TaskType::Click)
        .with_param("target", "click the purple elephant")
        .with_max_retries(1);
    let mut plan = plan_of(vec![click]);
    let pages = pages();
    let engine = engine_with(Arc::new(ScriptedText::new()), pages.clone());

    let report = engine.execute(&mut plan, SchedulingPolicy::Sequential, 1).await.unwrap();

    assert_eq!(report.status, PlanStatus::Failed);
    assert_eq!(pages.failures.load(std::sync::atomic::Ordering::SeqCst), 2);
    let result = report.outcome("click").unwrap().result.clone().unwrap();
    assert_eq!(result.error_kind, Some(TaskErrorKind::Grounding));
    assert_eq!(result.data.unwrap()["actions"][0]["success"], json!(false));
}

// ============================================================================
// Policies & halting
// ============================================================================

#[tokio::test]
async fn test_sequential_continues_past_independent_failure() {
    let mut plan = plan_of(vec![
        text_task("one", "first"),
        text_task("two", "BROKEN"),
        text_task("three", "third"),
    ]);
    let text = Arc::new(ScriptedText::new().reply("BROKEN", Reply::Fail("model refused".to_string())));
    let engine = engine_with(text.clone(), pages());

    let report = engine.execute(&mut plan, SchedulingPolicy::Sequential, 1).await.unwrap();

    assert_eq!(report.status, PlanStatus::Completed);
    assert_eq!(report.completed, 2);
    assert_eq!(report.failed, 1);
    assert!(report.halted_by.is_none());
    assert_eq!(plan.status_of("three"), Some(TaskStatus::Completed));
    assert_eq!(plan.completed_task_ids, vec!["one".to_string(), "three".to_string()]);
    assert!(report.outcome("two").unwrap().result.as_ref().unwrap().error.as_deref().unwrap().contains("model refused"));
}

#[tokio::test]
async fn test_critical_failure_halts_priority_plan() {
    let mut plan = plan_of(vec![
        text_task("minor", "minor work").with_priority(TaskPriority::Low),
        text_task("gate", "BROKEN gate").with_priority(TaskPriority::Critical),
        text_task("other", "other work").with_priority(TaskPriority::Medium),
    ]);
    let text = Arc::new(ScriptedText::new().reply("BROKEN", Reply::Fail("down".to_string())));
    let engine = engine_with(text.clone(), pages());

    let report = engine
        .execute(&mut plan, SchedulingPolicy::PriorityBased, 1)
        .await
        .unwrap();

    assert_eq!(report.halted_by.as_deref(), Some("gate"));
    assert_eq!(report.status, PlanStatus::Failed);
    assert_eq!(report.pending, 2);
    assert_eq!(plan.status_of("minor"), Some(TaskStatus::Pending));
    assert_eq!(plan.status_of("other"), Some(TaskStatus::Pending));
    assert_eq!(text.prompts().len(), 1);
}

#[tokio::test]
async fn test_failure_with_pending_dependent_halts_sequential_plan() {
    let mut plan = plan_of(vec![
        text_task("source", "BROKEN source"),
        text_task("sink", "uses source").with_dependency(TaskDependency::on_success("source")),
        text_task("unrelated", "unrelated"),
    ]);
    let text = Arc::new(ScriptedText::new().reply("BROKEN", Reply::Fail("down".to_string())));
    let engine = engine_with(text, pages());

    let report = engine.execute(&mut plan, SchedulingPolicy::Sequential, 1).await.unwrap();

    assert_eq!(report.halted_by.as_deref(), Some("source"));
    assert_eq!(plan.status_of("sink"), Some(TaskStatus::Pending));
    assert_eq!(plan.status_of("unrelated"), Some(TaskStatus::Pending));
    assert_eq!(report.status, PlanStatus::Failed);
}

fn cleanup_after(main_text: &str) -> Plan {
    let cleanup = text_task("cleanup", "cleanup")
        .with_dependency(TaskDependency::on_success("main").with_condition(DependencyCondition::OnCompletion));
    plan_of(vec![text_task("main", main_text), cleanup])
}

#[tokio::test]
async fn test_on_completion_dependent_runs_after_failed_upstream() {
    for policy in [SchedulingPolicy::Sequential, SchedulingPolicy::DependencyAware] {
        let mut plan = cleanup_after("BROKEN main");
        let text = Arc::new(ScriptedText::new().reply("BROKEN", Reply::Fail("down".to_string())));
        let engine = engine_with(text.clone(), pages());

        let report = engine.execute(&mut plan, policy, 2).await.unwrap();

        assert_eq!(plan.status_of("main"), Some(TaskStatus::Failed), "{}", policy);
        assert_eq!(plan.status_of("cleanup"), Some(TaskStatus::Completed), "{}", policy);
        assert!(report.halted_by.is_none());
        assert!(!report.deadlocked);
        let prompts = text.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[0].contains("BROKEN main"));
        assert!(prompts[1].contains("cleanup"));
    }
}

#[tokio::test]
async fn test_on_completion_dependent_runs_after_successful_upstream() {
    let mut plan = cleanup_after("main work");
    let text = Arc::new(ScriptedText::new());
    let mut engine = engine_with(text.clone(), pages());
    let log = event_log(&mut engine);

    let report = engine
        .execute(&mut plan, SchedulingPolicy::DependencyAware, 2)
        .await
        .unwrap();

    assert_eq!(report.completed, 2);
    let completions: Vec<String> = log
        .lock()
        .unwrap()
        .iter()
        .filter(|e| e.starts_with("task_completed"))
        .cloned()
        .collect();
    assert_eq!(completions, vec!["task_completed:main", "task_completed:cleanup"]);
}

#[tokio::test]
async fn test_parallel_runs_serial_tasks_after_batches() {
    let mut plan = plan_of(vec![
        text_task("serial", "serial").with_parallelizable(false),
        text_task("p1", "p1"),
        text_task("p2", "p2"),
    ]);
    let text = Arc::new(ScriptedText::new());
    let mut engine = engine_with(text, pages());
    let log = event_log(&mut engine);

    engine.execute(&mut plan, SchedulingPolicy::Parallel, 4).await.unwrap();

    let completions: Vec<String> = log
        .lock()
        .unwrap()
        .iter()
        .filter(|e| e.starts_with("task_completed"))
        .cloned()
        .collect();
    assert_eq!(
        completions,
        vec!["task_completed:p1", "task_completed:p2", "task_completed:serial"]
    );
}

// ============================================================================
// Retries
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_retry_budget_and_linear_backoff() {
    let mut plan = plan_of(vec![text_task("flaky", "BROKEN").with_max_retries(2)]);
    let text = Arc::new(ScriptedText::new().reply("BROKEN", Reply::Fail("timeout".to_string())));
    let mut engine = engine_with(text.clone(), pages());

    let delays = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&delays);
    engine.on(EventKind::TaskRetry, move |event| {
        sink.lock().unwrap().push((event.attempt, event.delay_ms));
        Ok(())
    });

    let started = tokio::time::Instant::now();
    let report = engine.execute(&mut plan, SchedulingPolicy::Sequential, 1).await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(text.calls_containing("BROKEN"), 3);
    assert_eq!(report.outcome("flaky").unwrap().attempts, 3);
    assert_eq!(plan.status_of("flaky"), Some(TaskStatus::Failed));
    assert_eq!(
        *delays.lock().unwrap(),
        vec![(Some(1), Some(1000)), (Some(2), Some(2000))]
    );
    assert!(elapsed >= Duration::from_millis(3000));
    assert!(elapsed < Duration::from_millis(4000));
}

#[tokio::test(start_paused = true)]
async fn test_first_attempt_success_uses_no_retries() {
    let mut plan = plan_of(vec![text_task("steady", "fine").with_max_retries(3)]);
    let text = Arc::new(ScriptedText::new());
    let mut engine = engine_with(text.clone(), pages());
    let log = event_log(&mut engine);

    engine.execute(&mut plan, SchedulingPolicy::Sequential, 1).await.unwrap();

    assert_eq!(text.prompts().len(), 1);
    assert!(!log.lock().unwrap().iter().any(|e| e.starts_with("task_retry")));
}

#[tokio::test(start_paused = true)]
async fn test_retry_event_reports_task_as_pending() {
    let mut plan = plan_of(vec![
        text_task("flaky", "BROKEN").with_max_retries(1),
        text_task("later", "later"),
    ]);
    let text = Arc::new(ScriptedText::new().reply("BROKEN", Reply::Fail("timeout".to_string())));
    let mut engine = engine_with(text, pages());

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    engine.on(EventKind::TaskRetry, move |event| {
        sink.lock().unwrap().push((event.progress.running, event.progress.pending));
        Ok(())
    });

    engine.execute(&mut plan, SchedulingPolicy::Sequential, 1).await.unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![(0, 2)]);
}

// ============================================================================
// Output mappings
// ============================================================================

#[tokio::test]
async fn test_output_mapping_dot_path() {
    let report_type = TaskType::Custom("report".to_string());
    let mut catalogue = TaskCatalogue::with_builtins();
    catalogue.register(
        TaskDefinition::text(report_type.clone(), "Report", "value={{x}}")
            .spec(ParameterSpec::required("x", ParamKind::Number)),
    );

    let producer = text_task("a", "PRODUCE");
    let consumer = PlannedTask::new("b", "b", report_type)
        .with_dependency(TaskDependency::on_success("a").map("x", "data.value"));
    let mut plan = plan_of(vec![producer, consumer]);

    let text = Arc::new(
        ScriptedText::new().reply("PRODUCE", Reply::Json(json!({ "data": { "value": 42 } }))),
    );
    let engine = engine_with_catalogue(catalogue, text.clone(), pages());
    let report = engine
        .execute(&mut plan, SchedulingPolicy::DependencyAware, 2)
        .await
        .unwrap();

    assert_eq!(report.completed, 2);
    assert_eq!(text.prompts()[1], "value=42");
}

#[tokio::test]
async fn test_missing_mapping_path_falls_back_to_own_param() {
    let producer = text_task("a", "PRODUCE");
    let consumer = text_task("b", "own text")
        .with_dependency(TaskDependency::on_success("a").map("text", "data.missing"));
    let mut plan = plan_of(vec![producer, consumer]);

    let text = Arc::new(ScriptedText::new().reply("PRODUCE", Reply::Json(json!({ "data": {} }))));
    let engine = engine_with(text.clone(), pages());
    engine
        .execute(&mut plan, SchedulingPolicy::DependencyAware, 2)
        .await
        .unwrap();

    assert!(text.prompts()[1].contains("own text"));
}

// ============================================================================
// Batches
// ============================================================================

#[tokio::test]
async fn test_batch_members_start_before_any_settles() {
    let mut plan = plan_of(vec![text_task("a", "a"), text_task("b", "b"), text_task("c", "c")]);
    let text = Arc::new(ScriptedText::new());
    let mut engine = engine_with(text, pages());
    let log = event_log(&mut engine);

    let report = engine
        .execute(&mut plan, SchedulingPolicy::DependencyAware, 2)
        .await
        .unwrap();
    assert_eq!(report.completed, 3);

    let log = log.lock().unwrap().clone();
    assert_eq!(
        log,
        vec![
            "plan_started",
            "task_started:a",
            "task_started:b",
            "task_completed:a",
            "task_completed:b",
            "task_started:c",
            "task_completed:c",
            "plan_completed",
        ]
    );
}

// ============================================================================
// Deadlock & cancellation
// ============================================================================

#[tokio::test]
async fn test_unsatisfiable_dependency_is_reported_as_deadlock() {
    let fallback = text_task("fallback", "fallback")
        .with_dependency(TaskDependency::on_success("main").with_condition(DependencyCondition::OnFailure));
    let mut plan = plan_of(vec![text_task("main", "main"), fallback]);
    let engine = engine_with(Arc::new(ScriptedText::new()), pages());

    let report = engine
        .execute(&mut plan, SchedulingPolicy::DependencyAware, 2)
        .await
        .unwrap();

    assert!(report.deadlocked);
    assert_eq!(report.deadlocked_task_ids, vec!["fallback".to_string()]);
    assert_eq!(plan.status_of("fallback"), Some(TaskStatus::Pending));
    assert_eq!(report.status, PlanStatus::Completed);
}

#[tokio::test]
async fn test_cycle_leaves_tasks_pending() {
    let x = text_task("x", "x").with_dependency(TaskDependency::on_success("y"));
    let y = text_task("y", "y").with_dependency(TaskDependency::on_success("x"));
    let mut plan = plan_of(vec![x, y]);
    let text = Arc::new(ScriptedText::new());
    let engine = engine_with(text.clone(), pages());

    let report = engine
        .execute(&mut plan, SchedulingPolicy::DependencyAware, 2)
        .await
        .unwrap();

    assert!(report.deadlocked);
    assert_eq!(report.pending, 2);
    assert_eq!(report.status, PlanStatus::Failed);
    assert!(text.prompts().is_empty());
}

#[tokio::test]
async fn test_cancellation_stops_remaining_tasks() {
    let mut plan = plan_of(vec![text_task("a", "a"), text_task("b", "b"), text_task("c", "c")]);
    let mut engine = engine_with(Arc::new(ScriptedText::new()), pages());
    let token = engine.cancellation_token();
    engine.on(EventKind::TaskCompleted, move |_| {
        token.cancel();
        Ok(())
    });
    let log = event_log(&mut engine);

    let report = engine.execute(&mut plan, SchedulingPolicy::Sequential, 1).await.unwrap();

    assert_eq!(report.status, PlanStatus::Cancelled);
    assert_eq!(report.completed, 1);
    assert_eq!(report.cancelled, 2);
    assert_eq!(plan.status_of("b"), Some(TaskStatus::Cancelled));
    assert_eq!(log.lock().unwrap().last().map(String::as_str), Some("plan_cancelled"));
}

#[tokio::test]
async fn test_engine_runs_new_plans_after_cancellation() {
    let text = Arc::new(ScriptedText::new());
    let engine = engine_with(text.clone(), pages());

    engine.cancel();
    let mut first = plan_of(vec![text_task("a", "first plan")]);
    let report = engine.execute(&mut first, SchedulingPolicy::Sequential, 1).await.unwrap();
    assert_eq!(report.status, PlanStatus::Cancelled);
    assert!(text.prompts().is_empty());

    let mut second = plan_of(vec![text_task("a", "second plan"), text_task("b", "second plan too")]);
    let report = engine
        .execute(&mut second, SchedulingPolicy::DependencyAware, 2)
        .await
        .unwrap();
    assert_eq!(report.status, PlanStatus::Completed);
    assert_eq!(report.completed, 2);
    assert_eq!(report.cancelled, 0);
    assert!(!engine.cancellation_token().is_cancelled());
}

// ============================================================================
// Events & progress
// ============================================================================

#[tokio::test]
async fn test_progress_reaches_completion_monotonically() {
    let mut plan = plan_of(vec![text_task("a", "a"), text_task("b", "BROKEN"), text_task("c", "c")]);
    let text = Arc::new(ScriptedText::new().reply("BROKEN", Reply::Fail("no".to_string())));
    let mut engine = engine_with(text, pages());

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    engine.on_progress(move |progress| {
        sink.lock().unwrap().push(progress.percentage);
        Ok(())
    });

    engine
        .execute(&mut plan, SchedulingPolicy::DependencyAware, 3)
        .await
        .unwrap();

    let seen = seen.lock().unwrap().clone();
    assert!(seen.windows(2).all(|w| w[0] <= w[1]), "{:?}", seen);
    assert_eq!(seen.last(), Some(&100));
}

#[tokio::test]
async fn test_failing_handler_does_not_abort_execution() {
    let mut plan = plan_of(vec![text_task("a", "a")]);
    let mut engine = engine_with(Arc::new(ScriptedText::new()), pages());
    engine.on(EventKind::TaskStarted, |_| anyhow::bail!("listener crashed"));

    let report = engine.execute(&mut plan, SchedulingPolicy::Sequential, 1).await.unwrap();
    assert_eq!(report.status, PlanStatus::Completed);
}

#[tokio::test]
async fn test_executed_plan_cannot_run_again() {
    let mut plan = plan_of(vec![text_task("a", "a")]);
    let engine = engine_with(Arc::new(ScriptedText::new()), pages());
    engine.execute(&mut plan, SchedulingPolicy::Sequential, 1).await.unwrap();
    assert!(engine.execute(&mut plan, SchedulingPolicy::Sequential, 1).await.is_err());
}
