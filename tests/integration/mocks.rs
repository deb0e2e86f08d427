//! Test collaborators
//!
//! Scripted stand-ins for the text capability, the page executor and the
//! snapshot provider.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use task_cascade::{
    ActionKind, ActionOutcome, CoreError, CoreResult, EngineSettings, ExecutionEngine, GroundedAction,
    PageActionExecutor, PageSnapshot, SnapshotProvider, TaskCatalogue, TaskRunner, TextCapability,
    TextResponse,
};

/// What the scripted capability answers to prompts containing a needle.
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Json(Value),
    Fail(String),
}

/// Text capability answering from a script; unmatched prompts are echoed
/// back as `ECHO: <prompt>`.
#[derive(Default)]
pub struct ScriptedText {
    script: Vec<(String, Reply)>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedText {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, needle: &str, reply: Reply) -> Self {
        self.script.push((needle.to_string(), reply));
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn calls_containing(&self, needle: &str) -> usize {
        self.prompts().iter().filter(|p| p.contains(needle)).count()
    }
}

#[async_trait]
impl TextCapability for ScriptedText {
    async fn invoke(&self, prompt: &str) -> CoreResult<TextResponse> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match self.script.iter().find(|(needle, _)| prompt.contains(needle.as_str())) {
            Some((_, Reply::Text(text))) => Ok(TextResponse::ok(text.clone())),
            Some((_, Reply::Json(value))) => Ok(TextResponse::ok(value.clone())),
            Some((_, Reply::Fail(error))) => Err(CoreError::capability(error.clone())),
            None => Ok(TextResponse::ok(format!("ECHO: {}", prompt))),
        }
    }
}

/// Page executor that records every action. Actions aimed at the document
/// root fail; extract actions return `extract_result`.
pub struct RecordingPages {
    performed: Mutex<Vec<GroundedAction>>,
    extract_result: Value,
    pub failures: AtomicUsize,
}

impl RecordingPages {
    pub fn new(extract_result: Value) -> Self {
        Self {
            performed: Mutex::new(Vec::new()),
            extract_result,
            failures: AtomicUsize::new(0),
        }
    }

    pub fn performed(&self) -> Vec<GroundedAction> {
        self.performed.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageActionExecutor for RecordingPages {
    async fn perform(&self, action: &GroundedAction) -> ActionOutcome {
        self.performed.lock().unwrap().push(action.clone());
        if action.locator.as_deref() == Some("body") {
            self.failures.fetch_add(1, Ordering::SeqCst);
            return ActionOutcome::failed("element not interactable");
        }
        match action.kind {
            ActionKind::Extract => ActionOutcome::ok(Some(self.extract_result.clone())),
            _ => ActionOutcome::ok(None),
        }
    }
}

pub struct FixedSnapshot(pub PageSnapshot);

#[async_trait]
impl SnapshotProvider for FixedSnapshot {
    async fn snapshot(&self) -> CoreResult<PageSnapshot> {
        Ok(self.0.clone())
    }
}

/// Engine over the built-in catalogue with a scripted text capability and
/// a recording page executor.
pub fn engine_with(text: Arc<ScriptedText>, pages: Arc<RecordingPages>) -> ExecutionEngine {
    engine_with_catalogue(TaskCatalogue::with_builtins(), text, pages)
}

pub fn engine_with_catalogue(
    catalogue: TaskCatalogue,
    text: Arc<ScriptedText>,
    pages: Arc<RecordingPages>,
) -> ExecutionEngine {
    let runner = TaskRunner::new(Arc::new(catalogue), text).with_page_executor(pages);
    ExecutionEngine::new(runner, EngineSettings::default())
}
