//! Parameter Resolution
//!
//! Resolves a template's parameter rules against the instruction. Each
//! rule's sources are tried in order; a required parameter that no source
//! produced is back-filled.

use std::sync::OnceLock;

use regex::Regex;
use task_cascade_core::{PageSnapshot, ParamValue, Params};

use crate::services::templates::{
    ExtractionContext, ExtractionRules, PageField, ParamSource, ParameterRule, TaskTemplate,
};

fn clause_separator() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\s*(?:[,;，；。]|\band then\b|\bthen\b|\band\b|然后|并且)\s*").ok()
    })
    .as_ref()
}

/// Split an instruction into clauses on conjunctions and punctuation.
pub fn split_clauses(instruction: &str) -> Vec<&str> {
    match clause_separator() {
        Some(re) => re
            .split(instruction)
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .collect(),
        None => vec![instruction.trim()],
    }
}

/// The first clause mentioning one of the template's keywords, or the whole
/// instruction.
pub fn clause_for<'a>(instruction: &'a str, template: &TaskTemplate) -> &'a str {
    split_clauses(instruction)
        .into_iter()
        .find(|clause| {
            let lower = clause.to_lowercase();
            let haystack = template.mask_exclusions(&lower);
            template
                .keywords
                .iter()
                .any(|k| !k.is_empty() && haystack.contains(&k.to_lowercase()))
        })
        .unwrap_or(instruction)
}

fn regex_capture(patterns: &[String], text: &str) -> Option<String> {
    patterns.iter().find_map(|pattern| match Regex::new(pattern) {
        Ok(re) => re
            .captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|s| !s.is_empty()),
        Err(e) => {
            tracing::warn!("[Parameters] Invalid pattern '{}': {}", pattern, e);
            None
        }
    })
}

fn page_field(snapshot: Option<&PageSnapshot>, field: PageField) -> Option<String> {
    let snapshot = snapshot?;
    let value = match field {
        PageField::SelectedText => &snapshot.selected_text,
        PageField::Url => &snapshot.url,
        PageField::Title => &snapshot.title,
    };
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn resolve_source(source: &ParamSource, ctx: &ExtractionContext<'_>, rules: &ExtractionRules) -> Option<ParamValue> {
    match source {
        ParamSource::Regex { patterns } => regex_capture(patterns, ctx.instruction).map(ParamValue::from),
        ParamSource::Page { field } => page_field(ctx.snapshot, *field).map(ParamValue::from),
        ParamSource::Rule { id } => rules.apply(id, ctx),
        ParamSource::FullText => {
            let text = ctx.instruction.trim();
            (!text.is_empty()).then(|| ParamValue::from(text))
        }
        ParamSource::Constant { value } => Some(value.clone()),
    }
}

/// Resolve a single parameter. `None` means the parameter stays absent:
/// it is optional, has no fallback and no source produced a value.
pub fn resolve_parameter(rule: &ParameterRule, ctx: &ExtractionContext<'_>, rules: &ExtractionRules) -> Option<ParamValue> {
    let resolved = rule
        .sources
        .iter()
        .find_map(|source| resolve_source(source, ctx, rules))
        .map(|value| value.coerce_to(rule.kind));

    match resolved {
        Some(value) => Some(value),
        None if rule.required || rule.fallback.is_some() => {
            tracing::debug!("[Parameters] Back-filling parameter '{}'", rule.name);
            Some(rule.backfill())
        }
        None => None,
    }
}

/// Resolve every parameter of a template.
pub fn resolve_parameters(template: &TaskTemplate, ctx: &ExtractionContext<'_>, rules: &ExtractionRules) -> Params {
    template
        .parameters
        .iter()
        .filter_map(|rule| resolve_parameter(rule, ctx, rules).map(|v| (rule.name.clone(), v)))
        .collect()
}
