//! Planning Integration Tests
//!
//! Instruction -> plan, through the public planner API: template matching,
//! parameter extraction, grounding and dependency inference.

use std::sync::Arc;

use task_cascade::models::TaskCategory;
use task_cascade::services::decomposition::{validate_plan, EXTRACTED_FIELD};
use task_cascade::services::templates::{ParamSource, ParameterRule};
use task_cascade::{
    DecompositionConstraints, EngineSettings, PageElement, PageSnapshot, ParamKind, ParamValue, ParameterSpec,
    PlanStatus, Planner, TaskCatalogue, TaskDefinition, TaskPriority, TaskTemplate, TaskType, TemplateRegistry,
};

fn planner() -> Planner {
    Planner::with_builtins(EngineSettings::default())
}

fn form_page() -> PageSnapshot {
    PageSnapshot {
        url: "https://example.com/signup".to_string(),
        title: "Sign up".to_string(),
        buttons: vec![
            PageElement::new("#cancel", "Cancel"),
            PageElement::new("#submit-btn", "Submit"),
        ],
        inputs: vec![PageElement::new("#email", "").with_attr("placeholder", "Email address")],
        ..Default::default()
    }
}

// ============================================================================
// Text pipelines
// ============================================================================

#[test]
fn test_summarize_then_translate() {
    let plan = planner()
        .create_plan("summarize this text and translate it to Chinese", None, None)
        .unwrap();

    assert_eq!(plan.status, PlanStatus::Ready);
    assert_eq!(plan.tasks.len(), 2);
    let (summarize, translate) = (&plan.tasks[0], &plan.tasks[1]);
    assert_eq!(summarize.task_type, TaskType::Summarize);
    assert_eq!(translate.task_type, TaskType::Translate);
    assert_eq!(translate.parameters["target_language"], ParamValue::from("Chinese"));

    assert_eq!(translate.dependencies.len(), 1);
    let dep = &translate.dependencies[0];
    assert_eq!(dep.task_id, summarize.id);
    assert_eq!(dep.output_mapping.get("text").map(String::as_str), Some(""));
    assert!(validate_plan(&plan).is_valid());
}

#[test]
fn test_selected_text_feeds_text_input() {
    let snapshot = PageSnapshot {
        selected_text: "Rust is a systems programming language.".to_string(),
        ..Default::default()
    };
    let plan = planner().create_plan("summarize this", Some(&snapshot), None).unwrap();
    assert_eq!(plan.tasks.len(), 1);
    assert_eq!(
        plan.tasks[0].parameters["text"],
        ParamValue::from("Rust is a systems programming language.")
    );
    assert_eq!(plan.snapshot.as_ref(), Some(&snapshot));
}

#[test]
fn test_selected_text_phrase_plans_no_select_action() {
    let snapshot = PageSnapshot {
        selected_text: "Ferris is the Rust mascot.".to_string(),
        ..Default::default()
    };
    let plan = planner()
        .create_plan("summarize the selected text", Some(&snapshot), None)
        .unwrap();

    let ids: Vec<&str> = plan.tasks.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec!["summarize-1"]);
    assert!(validate_plan(&plan).is_valid());
}

#[test]
fn test_unmatched_instruction_yields_empty_plan() {
    let plan = planner().create_plan("good morning", None, None).unwrap();
    assert!(plan.tasks.is_empty());
    assert_eq!(plan.goal, "good morning");
}

// ============================================================================
// Page actions
// ============================================================================

#[test]
fn test_click_submit_grounded_against_snapshot() {
    let snapshot = form_page();
    let plan = planner()
        .create_plan("click the Submit button", Some(&snapshot), None)
        .unwrap();

    assert_eq!(plan.tasks.len(), 1);
    let click = &plan.tasks[0];
    assert_eq!(click.task_type, TaskType::Click);
    assert_eq!(click.parameters["locator"], ParamValue::from("#submit-btn"));
    assert_eq!(click.max_retries, 2);
    assert!(!click.parallelizable);
}

#[test]
fn test_navigate_extract_chain_is_ordering_only_between_actions() {
    let plan = planner()
        .create_plan("go to example.com, extract all links and summarize them", None, None)
        .unwrap();

    let ids: Vec<&str> = plan.tasks.iter().map(|t| t.task_type.id()).collect();
    assert_eq!(ids, vec!["navigate", "extract", "summarize"]);
    let task_ids: Vec<&str> = plan.tasks.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(task_ids, vec!["navigate-1", "extract-2", "summarize-3"]);

    let extract = &plan.tasks[1];
    assert!(extract.depends_on(&plan.tasks[0].id));
    assert!(extract.dependencies[0].output_mapping.is_empty());

    let summarize = &plan.tasks[2];
    let dep = &summarize.dependencies[0];
    assert_eq!(dep.task_id, extract.id);
    assert_eq!(dep.output_mapping.get("text").map(String::as_str), Some(EXTRACTED_FIELD));
}

#[test]
fn test_login_is_critical() {
    let plan = planner().create_plan("log in to the dashboard", None, None).unwrap();
    assert_eq!(plan.tasks.len(), 1);
    assert_eq!(plan.tasks[0].task_type, TaskType::Login);
    assert_eq!(plan.tasks[0].priority, TaskPriority::Critical);
    assert_eq!(plan.tasks[0].max_retries, 1);
}

// ============================================================================
// Constraints & custom templates
// ============================================================================

#[test]
fn test_constraints_exclude_and_disable_parallel() {
    let constraints = DecompositionConstraints::default()
        .exclude(TaskType::Translate)
        .sequential_only();
    let plan = planner()
        .create_plan(
            "summarize this text and translate it to Chinese",
            None,
            Some(&constraints),
        )
        .unwrap();
    assert_eq!(plan.tasks.len(), 1);
    assert!(!plan.tasks[0].parallelizable);
}

#[test]
fn test_custom_template_and_definition() {
    let mut templates = TemplateRegistry::with_builtins();
    let tweet = TaskType::Custom("tweet".to_string());
    templates.register(
        TaskTemplate::new("tweet", "Tweet", tweet.clone(), &["tweet"]).param(
            ParameterRule::new("topic", ParamKind::String)
                .source(ParamSource::regex(&[r"(?i)tweet about (.+)"]))
                .required(),
        ),
    );
    let mut catalogue = TaskCatalogue::with_builtins();
    catalogue.register(
        TaskDefinition::text(tweet.clone(), "Tweet", "Write a tweet about {{topic}}")
            .spec(ParameterSpec::required("topic", ParamKind::String)),
    );
    assert_eq!(catalogue.category_of(&tweet), TaskCategory::Text);

    let planner = Planner::new(Arc::new(templates), Arc::new(catalogue), EngineSettings::default());
    let plan = planner.create_plan("tweet about ferris the crab", None, None).unwrap();
    assert_eq!(plan.tasks.len(), 1);
    assert_eq!(plan.tasks[0].id, "tweet-1");
    assert_eq!(plan.tasks[0].parameters["topic"], ParamValue::from("ferris the crab"));
}
