//! Extraction Rules
//!
//! Named, pluggable functions that pull one parameter value out of an
//! instruction. Templates refer to rules by id, so a rule can be swapped or
//! added without touching templates or the scheduler.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use regex::Regex;
use task_cascade_core::{PageSnapshot, ParamValue};

use crate::services::grounding::{self, LocatorStrategy};

/// Input handed to an extraction rule.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionContext<'a> {
    /// The whole instruction
    pub instruction: &'a str,
    /// The clause of the instruction that mentions the task
    pub clause: &'a str,
    pub snapshot: Option<&'a PageSnapshot>,
}

impl<'a> ExtractionContext<'a> {
    pub fn new(instruction: &'a str) -> Self {
        Self {
            instruction,
            clause: instruction,
            snapshot: None,
        }
    }

    pub fn with_clause(mut self, clause: &'a str) -> Self {
        self.clause = clause;
        self
    }

    pub fn with_snapshot(mut self, snapshot: Option<&'a PageSnapshot>) -> Self {
        self.snapshot = snapshot;
        self
    }
}

/// A named text-to-value function.
pub trait ExtractionRule: Send + Sync {
    fn id(&self) -> &str;

    fn extract(&self, ctx: &ExtractionContext<'_>) -> Option<ParamValue>;
}

type RuleFn = dyn Fn(&ExtractionContext<'_>) -> Option<ParamValue> + Send + Sync;

/// Closure-backed rule.
pub struct FnRule {
    id: String,
    func: Box<RuleFn>,
}

impl FnRule {
    pub fn new<F>(id: impl Into<String>, func: F) -> Self
    where
        F: Fn(&ExtractionContext<'_>) -> Option<ParamValue> + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            func: Box::new(func),
        }
    }
}

impl fmt::Debug for FnRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnRule").field("id", &self.id).finish()
    }
}

impl ExtractionRule for FnRule {
    fn id(&self) -> &str {
        &self.id
    }

    fn extract(&self, ctx: &ExtractionContext<'_>) -> Option<ParamValue> {
        (self.func)(ctx)
    }
}

/// Registry of extraction rules keyed by id.
#[derive(Clone, Default)]
pub struct ExtractionRules {
    rules: HashMap<String, Arc<dyn ExtractionRule>>,
}

impl fmt::Debug for ExtractionRules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionRules").field("ids", &self.ids()).finish()
    }
}

impl ExtractionRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in rule.
    pub fn with_builtins() -> Self {
        let mut rules = Self::new();
        register_builtins(&mut rules);
        rules
    }

    /// Register a rule, replacing any rule with the same id.
    pub fn register(&mut self, rule: Arc<dyn ExtractionRule>) {
        self.rules.insert(rule.id().to_string(), rule);
    }

    pub fn register_fn<F>(&mut self, id: impl Into<String>, func: F)
    where
        F: Fn(&ExtractionContext<'_>) -> Option<ParamValue> + Send + Sync + 'static,
    {
        self.register(Arc::new(FnRule::new(id, func)));
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn ExtractionRule>> {
        self.rules.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.rules.contains_key(id)
    }

    /// Run a rule. An unknown id yields `None`.
    pub fn apply(&self, id: &str, ctx: &ExtractionContext<'_>) -> Option<ParamValue> {
        match self.rules.get(id) {
            Some(rule) => rule.extract(ctx),
            None => {
                tracing::warn!("[ExtractionRules] Unknown rule '{}'", id);
                None
            }
        }
    }

    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.rules.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

// ============================================================================
// Built-in rules
// ============================================================================

/// Canonical language names and the way they are written in instructions.
const LANGUAGES: &[(&str, &[&str], &[&str])] = &[
    ("Chinese", &["chinese", "mandarin"], &["中文", "汉语", "简体"]),
    ("English", &["english"], &["英文", "英语"]),
    ("Japanese", &["japanese"], &["日文", "日语"]),
    ("Korean", &["korean"], &["韩文", "韩语"]),
    ("French", &["french"], &["法文", "法语"]),
    ("German", &["german"], &["德文", "德语"]),
    ("Spanish", &["spanish"], &["西班牙语"]),
    ("Italian", &["italian"], &["意大利语"]),
    ("Portuguese", &["portuguese"], &["葡萄牙语"]),
    ("Russian", &["russian"], &["俄文", "俄语"]),
    ("Arabic", &["arabic"], &["阿拉伯语"]),
    ("Vietnamese", &["vietnamese"], &["越南语"]),
];

/// Target language named in the text ("to French", "into Japanese", "译成中文").
pub fn detect_target_language(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    LANGUAGES
        .iter()
        .find(|(_, english, native)| {
            english.iter().any(|name| {
                ["to ", "into ", "in "]
                    .iter()
                    .any(|prep| lower.contains(&format!("{}{}", prep, name)))
            }) || native.iter().any(|name| text.contains(name))
        })
        .map(|(canonical, _, _)| *canonical)
}

fn capture(cell: &'static OnceLock<Option<Regex>>, pattern: &str, text: &str) -> Option<String> {
    cell.get_or_init(|| Regex::new(pattern).ok())
        .as_ref()?
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn first_quoted(ctx: &ExtractionContext<'_>) -> Option<String> {
    grounding::quoted_fragments(ctx.clause)
        .into_iter()
        .next()
        .or_else(|| grounding::quoted_fragments(ctx.instruction).into_iter().next())
}

fn register_builtins(rules: &mut ExtractionRules) {
    rules.register_fn("target_language", |ctx| {
        detect_target_language(ctx.clause)
            .or_else(|| detect_target_language(ctx.instruction))
            .map(ParamValue::from)
    });

    rules.register_fn("target", |ctx| {
        let clause = ctx.clause.trim();
        (!clause.is_empty()).then(|| ParamValue::from(clause))
    });

    // Planning-time grounding; a miss is left for dispatch-time grounding.
    rules.register_fn("locator", |ctx| {
        let locator = grounding::resolve_locator(ctx.clause, ctx.snapshot);
        match locator.strategy {
            LocatorStrategy::Fallback => None,
            _ => Some(ParamValue::from(locator.selector)),
        }
    });

    rules.register_fn("input_value", |ctx| {
        grounding::extract_input_value(ctx.clause).map(ParamValue::from)
    });

    rules.register_fn("scroll_direction", |ctx| {
        Some(ParamValue::from(
            grounding::extract_scroll_direction(ctx.clause).to_string(),
        ))
    });

    rules.register_fn("scroll_amount", |ctx| {
        grounding::extract_scroll_amount(ctx.clause).map(|px| ParamValue::from(px as i64))
    });

    rules.register_fn("wait_duration", |ctx| {
        Some(ParamValue::from(grounding::extract_wait_duration(ctx.clause) as i64))
    });

    rules.register_fn("navigation_url", |ctx| {
        grounding::extract_navigation_url(ctx.clause)
            .or_else(|| grounding::extract_navigation_url(ctx.instruction))
            .map(ParamValue::from)
    });

    rules.register_fn("extraction_options", |ctx| {
        let options = grounding::extract_extraction_options(ctx.clause);
        serde_json::to_value(options)
            .ok()
            .and_then(|v| ParamValue::from_json(&v))
    });

    rules.register_fn("quoted_text", |ctx| first_quoted(ctx).map(ParamValue::from));

    rules.register_fn("list_count", |ctx| {
        grounding::extract_list_count(ctx.clause)
            .or_else(|| grounding::extract_list_count(ctx.instruction))
            .map(|n| ParamValue::from(n as i64))
    });

    rules.register_fn("search_query", |ctx| {
        static RE: OnceLock<Option<Regex>> = OnceLock::new();
        first_quoted(ctx)
            .or_else(|| {
                capture(
                    &RE,
                    r"(?i)\b(?:search(?:\s+for)?|look\s+up|find|搜索)\s*([^,.;，。]+)",
                    ctx.clause,
                )
            })
            .map(ParamValue::from)
    });

    rules.register_fn("select_option", |ctx| {
        static RE: OnceLock<Option<Regex>> = OnceLock::new();
        first_quoted(ctx)
            .or_else(|| {
                capture(
                    &RE,
                    r"(?i)\b(?:select|choose|pick)\s+(?:the\s+)?(.+?)\s+(?:from|in)\b",
                    ctx.clause,
                )
            })
            .map(ParamValue::from)
    });

    rules.register_fn("username", |ctx| {
        static RE: OnceLock<Option<Regex>> = OnceLock::new();
        capture(
            &RE,
            r#"(?i)\b(?:as|username|user)\s+(?:is\s+)?["']?([^\s"',]+)"#,
            ctx.clause,
        )
        .map(ParamValue::from)
    });

    rules.register_fn("password", |ctx| {
        static RE: OnceLock<Option<Regex>> = OnceLock::new();
        capture(
            &RE,
            r#"(?i)\bpassword\s+(?:is\s+)?["']?([^\s"',]+)"#,
            ctx.clause,
        )
        .map(ParamValue::from)
    });
}
