//! Action Synthesis
//!
//! Turns a page-action task and its validated parameters into the grounded
//! actions handed to the page executor. Compound tasks (search, login)
//! expand into several actions.

use serde_json::json;
use task_cascade_core::{ActionKind, GroundedAction, PageSnapshot, ParamValue, Params};

use crate::models::task::TaskType;
use crate::services::grounding::locator::{find_button, find_input, resolve_locator, target_terms};

const SUBMIT_LOCATOR: &str = "button[type=\"submit\"], input[type=\"submit\"]";
const SEARCH_INPUT_LOCATOR: &str = "input[type=\"search\"], input[name=\"q\"], #search";
const USERNAME_LOCATOR: &str = "input[name=\"username\"], input[type=\"email\"], #username";
const PASSWORD_LOCATOR: &str = "input[type=\"password\"]";

fn text<'a>(params: &'a Params, name: &str) -> Option<&'a str> {
    params
        .get(name)
        .and_then(ParamValue::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Locator for single-target tasks: the planning-time binding when it may be
/// trusted, otherwise a fresh resolution of the target description.
fn locate(params: &Params, snapshot: Option<&PageSnapshot>, trust_planned: bool) -> String {
    if trust_planned {
        if let Some(locator) = text(params, "locator") {
            return locator.to_string();
        }
    }
    resolve_locator(text(params, "target").unwrap_or_default(), snapshot).selector
}

fn input_locator(snapshot: Option<&PageSnapshot>, terms: &[&str], default: &str) -> String {
    let terms: Vec<String> = terms.iter().map(|t| t.to_string()).collect();
    snapshot
        .and_then(|s| find_input(s, &terms))
        .map(|e| e.locator.clone())
        .unwrap_or_else(|| default.to_string())
}

fn submit_locator(snapshot: Option<&PageSnapshot>, description: &str) -> String {
    let terms = target_terms(description);
    snapshot
        .and_then(|s| find_button(s, &terms))
        .map(|e| e.locator.clone())
        .unwrap_or_else(|| SUBMIT_LOCATOR.to_string())
}

/// Build the grounded actions of a page-action task.
///
/// `trust_planned` says whether a `locator` parameter bound at planning time
/// still applies; it does not once the page has been re-captured.
pub fn synthesize_actions(
    task_type: &TaskType,
    params: &Params,
    snapshot: Option<&PageSnapshot>,
    trust_planned: bool,
) -> Result<Vec<GroundedAction>, String> {
    let actions = match task_type {
        TaskType::Click => vec![GroundedAction::new(ActionKind::Click).at(locate(params, snapshot, trust_planned))],
        TaskType::Hover => vec![GroundedAction::new(ActionKind::Hover).at(locate(params, snapshot, trust_planned))],
        TaskType::Type => {
            let value = text(params, "value").ok_or("nothing to type")?;
            vec![GroundedAction::new(ActionKind::Type)
                .at(locate(params, snapshot, trust_planned))
                .with_value(value)]
        }
        TaskType::Select => {
            let option = text(params, "option").ok_or("no option to select")?;
            vec![GroundedAction::new(ActionKind::Select)
                .at(locate(params, snapshot, trust_planned))
                .with_value(option)]
        }
        TaskType::Navigate => {
            let url = text(params, "url").ok_or("no url to navigate to")?;
            vec![GroundedAction::new(ActionKind::Navigate).with_value(url)]
        }
        TaskType::Scroll => {
            let mut action = GroundedAction::new(ActionKind::Scroll)
                .with_value(text(params, "direction").unwrap_or("down"));
            if let Some(amount) = params.get("amount").and_then(ParamValue::as_f64) {
                action = action.with_options(json!({ "amount": amount.max(0.0) as u64 }));
            }
            vec![action]
        }
        TaskType::Wait => {
            let ms = params
                .get("duration_ms")
                .and_then(ParamValue::as_f64)
                .unwrap_or_default()
                .max(0.0) as u64;
            vec![GroundedAction::new(ActionKind::Wait).with_timeout(ms)]
        }
        TaskType::Extract => {
            let options = params
                .get("options")
                .map(ParamValue::to_json)
                .unwrap_or_else(|| json!({ "target": "text" }));
            let mut action = GroundedAction::new(ActionKind::Extract);
            if let Some(scope) = options.get("locator").and_then(|v| v.as_str()) {
                action = action.at(scope);
            }
            vec![action.with_options(options)]
        }
        TaskType::Screenshot => {
            let full_page = params
                .get("full_page")
                .and_then(ParamValue::as_bool)
                .unwrap_or(false);
            vec![GroundedAction::new(ActionKind::Screenshot).with_options(json!({ "fullPage": full_page }))]
        }
        TaskType::Search => {
            let query = text(params, "query").ok_or("no search query")?;
            vec![
                GroundedAction::new(ActionKind::Type)
                    .at(input_locator(snapshot, &["search"], SEARCH_INPUT_LOCATOR))
                    .with_value(query),
                GroundedAction::new(ActionKind::Click).at(submit_locator(snapshot, "search submit go")),
            ]
        }
        TaskType::Login => {
            let mut actions = Vec::new();
            if let Some(username) = text(params, "username") {
                actions.push(
                    GroundedAction::new(ActionKind::Type)
                        .at(input_locator(snapshot, &["username", "email", "user"], USERNAME_LOCATOR))
                        .with_value(username),
                );
            }
            if let Some(password) = text(params, "password") {
                actions.push(
                    GroundedAction::new(ActionKind::Type)
                        .at(input_locator(snapshot, &["password"], PASSWORD_LOCATOR))
                        .with_value(password),
                );
            }
            actions.push(GroundedAction::new(ActionKind::Click).at(submit_locator(snapshot, "log in sign submit")));
            actions
        }
        other => return Err(format!("no page actions known for task type '{}'", other)),
    };
    Ok(actions)
}
