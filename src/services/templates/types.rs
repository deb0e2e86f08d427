//! Template Types
//!
//! A `TaskTemplate` says *when* a task is planned (keywords, structural
//! signals) and *how* its parameters are pulled out of the instruction. A
//! `TaskDefinition` says how a task of a given type is *run* (prompt,
//! parameter specs, retry budget).

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use task_cascade_core::{ParamKind, ParamValue, ParameterSpec};

use crate::models::task::{TaskCategory, TaskPriority, TaskType};

/// Page-context fields a parameter can be read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageField {
    SelectedText,
    Url,
    Title,
}

/// One way of obtaining a parameter value. Sources are tried in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParamSource {
    /// First capture group of the first matching pattern
    Regex { patterns: Vec<String> },
    /// A field of the page snapshot, when non-empty
    Page { field: PageField },
    /// A named extraction rule
    Rule { id: String },
    /// The whole instruction
    FullText,
    Constant { value: ParamValue },
}

impl ParamSource {
    pub fn regex(patterns: &[&str]) -> Self {
        ParamSource::Regex {
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
        }
    }

    pub fn page(field: PageField) -> Self {
        ParamSource::Page { field }
    }

    pub fn rule(id: impl Into<String>) -> Self {
        ParamSource::Rule { id: id.into() }
    }

    pub fn constant(value: impl Into<ParamValue>) -> Self {
        ParamSource::Constant { value: value.into() }
    }
}

/// How a single parameter is resolved at planning time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterRule {
    pub name: String,
    pub kind: ParamKind,
    pub sources: Vec<ParamSource>,
    #[serde(default)]
    pub required: bool,
    /// Back-fill for a required parameter no source produced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<ParamValue>,
}

impl ParameterRule {
    pub fn new(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
            sources: Vec::new(),
            required: false,
            fallback: None,
        }
    }

    pub fn source(mut self, source: ParamSource) -> Self {
        self.sources.push(source);
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn fallback(mut self, value: impl Into<ParamValue>) -> Self {
        self.fallback = Some(value.into());
        self
    }

    /// Value used when nothing resolved: the fallback, else the kind's
    /// neutral value.
    pub fn backfill(&self) -> ParamValue {
        self.fallback.clone().unwrap_or_else(|| self.kind.empty_value())
    }
}

/// Structural signals in an instruction that boost a template's score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    TargetLanguage,
    Url,
    QuotedText,
    Question,
}

/// A score bonus applied when a signal is present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBonus {
    pub signal: Signal,
    pub points: usize,
}

/// Whether a template plans a text task or a page action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateKind {
    Text,
    Action,
}

/// Immutable planning recipe for one task type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskTemplate {
    pub id: String,
    pub name: String,
    pub kind: TemplateKind,
    pub task_type: TaskType,
    /// Matched as case-insensitive substrings
    pub keywords: Vec<String>,
    /// Phrases that contain a keyword without meaning it, e.g. "selected"
    #[serde(default)]
    pub exclusions: Vec<String>,
    #[serde(default)]
    pub bonuses: Vec<ScoreBonus>,
    #[serde(default)]
    pub parameters: Vec<ParameterRule>,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub estimated_duration_ms: u64,
    #[serde(default)]
    pub parallelizable: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl TaskTemplate {
    pub fn new(id: impl Into<String>, name: impl Into<String>, task_type: TaskType, keywords: &[&str]) -> Self {
        let kind = if task_type.is_page_action() {
            TemplateKind::Action
        } else {
            TemplateKind::Text
        };
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            task_type,
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            exclusions: Vec::new(),
            bonuses: Vec::new(),
            parameters: Vec::new(),
            priority: TaskPriority::Medium,
            estimated_duration_ms: 1000,
            // text calls are independent; page actions share one document
            parallelizable: kind == TemplateKind::Text,
            tags: Vec::new(),
        }
    }

    pub fn excluding(mut self, phrases: &[&str]) -> Self {
        self.exclusions = phrases.iter().map(|p| p.to_string()).collect();
        self
    }

    /// Blank out exclusion phrases in a lowercased instruction so keyword
    /// search skips them. Character offsets are preserved.
    pub fn mask_exclusions<'a>(&self, lower: &'a str) -> Cow<'a, str> {
        let mut masked = Cow::Borrowed(lower);
        for phrase in &self.exclusions {
            let phrase = phrase.to_lowercase();
            if phrase.is_empty() || !masked.contains(&phrase) {
                continue;
            }
            let blank = " ".repeat(phrase.chars().count());
            masked = Cow::Owned(masked.replace(&phrase, &blank));
        }
        masked
    }

    pub fn bonus(mut self, signal: Signal, points: usize) -> Self {
        self.bonuses.push(ScoreBonus { signal, points });
        self
    }

    pub fn param(mut self, rule: ParameterRule) -> Self {
        self.parameters.push(rule);
        self
    }

    pub fn priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn duration(mut self, ms: u64) -> Self {
        self.estimated_duration_ms = ms;
        self
    }

    pub fn tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn is_action(&self) -> bool {
        self.kind == TemplateKind::Action
    }
}

/// How tasks of one type are run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDefinition {
    pub task_type: TaskType,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: TaskCategory,
    /// Prompt with `{{param}}` placeholders; text tasks only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default)]
    pub parameters: Vec<ParameterSpec>,
    /// Parameter that receives an upstream task's payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_param: Option<String>,
    /// Overrides the category's retry budget
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
}

impl TaskDefinition {
    pub fn text(task_type: TaskType, name: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            category: task_type.category(),
            task_type,
            name: name.into(),
            description: String::new(),
            prompt: Some(prompt.into()),
            parameters: Vec::new(),
            input_param: None,
            max_retries: None,
        }
    }

    pub fn action(task_type: TaskType, name: impl Into<String>) -> Self {
        Self {
            category: task_type.category(),
            task_type,
            name: name.into(),
            description: String::new(),
            prompt: None,
            parameters: Vec::new(),
            input_param: None,
            max_retries: None,
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn spec(mut self, spec: ParameterSpec) -> Self {
        self.parameters.push(spec);
        self
    }

    pub fn input(mut self, param: impl Into<String>) -> Self {
        self.input_param = Some(param.into());
        self
    }

    pub fn retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn spec_for(&self, name: &str) -> Option<&ParameterSpec> {
        self.parameters.iter().find(|s| s.name == name)
    }
}
