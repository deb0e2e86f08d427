//! Collaborator Traits
//!
//! The engine never talks to a language model, a browser or a UI directly.
//! Callers plug those in through the traits below.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreResult;
use crate::page::{ActionOutcome, GroundedAction, PageSnapshot};

/// Response of the text/LLM capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextResponse {
    pub success: bool,
    #[serde(default)]
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TextResponse {
    pub fn ok(payload: impl Into<Value>) -> Self {
        Self {
            success: true,
            payload: payload.into(),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            payload: Value::Null,
            error: Some(error.into()),
        }
    }
}

/// Opaque text/LLM capability.
///
/// Receives a fully rendered prompt. Implementations must not retry
/// internally; retry is owned by the execution engine.
#[async_trait]
pub trait TextCapability: Send + Sync {
    async fn invoke(&self, prompt: &str) -> CoreResult<TextResponse>;
}

/// Opaque side-effecting page action executor.
#[async_trait]
pub trait PageActionExecutor: Send + Sync {
    async fn perform(&self, action: &GroundedAction) -> ActionOutcome;
}

/// Captures the current page structure.
#[async_trait]
pub trait SnapshotProvider: Send + Sync {
    async fn snapshot(&self) -> CoreResult<PageSnapshot>;
}
