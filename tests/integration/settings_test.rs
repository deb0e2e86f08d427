//! Settings Integration Tests
//!
//! Loading engine configuration from TOML files and running with it.

use std::io::Write;
use std::sync::Arc;

use serde_json::json;
use task_cascade::{
    EngineSettings, ExecutionEngine, PageElement, PageSnapshot, Plan, PlannedTask, Planner, SchedulingPolicy,
    SettingsUpdate, TaskCatalogue, TaskRunner, TaskStatus, TaskType,
};

use super::mocks::{FixedSnapshot, RecordingPages, Reply, ScriptedText};

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_partial_file() {
    let file = write_config(
        r#"
default_policy = "sequential"
max_concurrency = 2
retry_base_delay_ms = 250
"#,
    );
    let settings = EngineSettings::load(file.path()).unwrap();

    assert_eq!(settings.default_policy, SchedulingPolicy::Sequential);
    assert_eq!(settings.max_concurrency, 2);
    assert_eq!(settings.retry_base_delay_ms, 250);
    assert_eq!(settings.text_max_retries, 3);
    assert_eq!(settings.max_tasks, 20);
}

#[test]
fn test_load_rejects_bad_values() {
    let zero = write_config("max_concurrency = 0\n");
    assert!(EngineSettings::load(zero.path()).is_err());

    let malformed = write_config("default_policy = \"round_robin\"\n");
    assert!(EngineSettings::load(malformed.path()).is_err());

    assert!(EngineSettings::load("/nonexistent/task-cascade.toml").is_err());
}

#[test]
fn test_update_flows_into_plan_config() {
    let mut settings = EngineSettings::default();
    settings.apply_update(SettingsUpdate {
        max_concurrency: Some(7),
        max_tasks: Some(5),
        ..Default::default()
    });

    let planner = Planner::with_builtins(settings);
    let plan = planner.create_plan("summarize this text", None, None).unwrap();
    assert_eq!(plan.config.max_concurrency, 7);
    assert_eq!(plan.config.max_tasks, 5);
}

#[tokio::test(start_paused = true)]
async fn test_configured_backoff_is_used() {
    let settings = EngineSettings::from_toml_str("retry_base_delay_ms = 50\n").unwrap();
    let text = Arc::new(ScriptedText::new().reply("BROKEN", Reply::Fail("busy".to_string())));
    let runner = TaskRunner::new(Arc::new(TaskCatalogue::with_builtins()), text.clone());
    let engine = ExecutionEngine::new(runner, settings);

    let task = PlannedTask::new("only", "only", TaskType::Summarize)
        .with_param("text", "BROKEN")
        .with_max_retries(2);
    let mut plan = task_cascade::Plan::new("t", "t", vec![task]);

    let started = tokio::time::Instant::now();
    engine.execute(&mut plan, SchedulingPolicy::Sequential, 1).await.unwrap();

    assert_eq!(text.calls_containing("BROKEN"), 3);
    let elapsed = started.elapsed();
    assert!(elapsed >= std::time::Duration::from_millis(150));
    assert!(elapsed < std::time::Duration::from_millis(1000));
}

async fn click_with(settings: EngineSettings) -> Option<String> {
    let click = PlannedTask::new("click", "Click", TaskType::Click)
        .with_param("target", "click Save")
        .with_param("locator", "#stale-save");
    let mut plan = Plan::new("t", "t", vec![click]);

    let live = PageSnapshot {
        buttons: vec![PageElement::new("#save", "Save")],
        ..Default::default()
    };
    let pages = Arc::new(RecordingPages::new(json!(null)));
    let runner = TaskRunner::new(Arc::new(TaskCatalogue::with_builtins()), Arc::new(ScriptedText::new()))
        .with_page_executor(pages.clone())
        .with_snapshot_provider(Arc::new(FixedSnapshot(live)));
    let engine = ExecutionEngine::new(runner, settings);

    engine.execute(&mut plan, SchedulingPolicy::Sequential, 1).await.unwrap();
    pages.performed().first().and_then(|a| a.locator.clone())
}

#[tokio::test]
async fn test_resnapshot_flag_from_file_regrounds_targets() {
    let file = write_config("resnapshot_before_actions = true\n");
    let settings = EngineSettings::load(file.path()).unwrap();
    assert!(settings.resnapshot_before_actions);

    assert_eq!(click_with(settings).await.as_deref(), Some("#save"));
    assert_eq!(click_with(EngineSettings::default()).await.as_deref(), Some("#stale-save"));
}

#[tokio::test(start_paused = true)]
async fn test_plan_retry_cap_limits_task_budget() {
    let settings = EngineSettings::from_toml_str(
        r#"
text_max_retries = 1
action_max_retries = 1
retry_base_delay_ms = 10
"#,
    )
    .unwrap();
    let text = Arc::new(ScriptedText::new().reply("BROKEN", Reply::Fail("busy".to_string())));
    let runner = TaskRunner::new(Arc::new(TaskCatalogue::with_builtins()), text.clone());

    let task = PlannedTask::new("only", "only", TaskType::Summarize)
        .with_param("text", "BROKEN")
        .with_max_retries(5);
    let mut plan = Plan::new("t", "t", vec![task]).with_config(settings.plan_config());
    assert_eq!(plan.config.max_retries, 1);

    let engine = ExecutionEngine::new(runner, settings);
    let report = engine.execute(&mut plan, SchedulingPolicy::Sequential, 1).await.unwrap();

    assert_eq!(text.calls_containing("BROKEN"), 2);
    assert_eq!(report.outcome("only").unwrap().attempts, 2);
    assert_eq!(plan.status_of("only"), Some(TaskStatus::Failed));
}

#[tokio::test]
async fn test_plan_over_task_limit_is_rejected() {
    let settings = EngineSettings::from_toml_str("max_tasks = 1\n").unwrap();
    let text = Arc::new(ScriptedText::new());
    let runner = TaskRunner::new(Arc::new(TaskCatalogue::with_builtins()), text.clone());

    let tasks = ["a", "b"]
        .iter()
        .map(|id| PlannedTask::new(*id, *id, TaskType::Summarize).with_param("text", *id))
        .collect();
    let mut plan = Plan::new("t", "t", tasks).with_config(settings.plan_config());
    let engine = ExecutionEngine::new(runner, settings);

    let err = engine
        .execute(&mut plan, SchedulingPolicy::Sequential, 1)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("more than its limit of 1"));
    assert!(text.prompts().is_empty());
    assert_eq!(plan.status_of("a"), Some(TaskStatus::Pending));
}
