//! Settings Models
//!
//! Engine configuration. Every field has a serde default so a partial TOML
//! file (or none at all) yields a usable configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::plan::{PlanConfig, SchedulingPolicy};
use crate::utils::error::{AppError, AppResult};

/// Engine configuration, typically loaded from `task-cascade.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Policy used when the caller does not pick one
    #[serde(default)]
    pub default_policy: SchedulingPolicy,
    /// Maximum tasks in flight within one batch
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Base of the linear retry backoff (delay = base x attempt)
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    /// Retry budget of text tasks
    #[serde(default = "default_text_max_retries")]
    pub text_max_retries: u32,
    /// Retry budget of page-action tasks
    #[serde(default = "default_action_max_retries")]
    pub action_max_retries: u32,
    /// Upper bound on tasks per plan
    #[serde(default = "default_max_tasks")]
    pub max_tasks: usize,
    /// Capture a fresh snapshot right before grounding each page-action task
    #[serde(default)]
    pub resnapshot_before_actions: bool,
}

fn default_max_concurrency() -> usize {
    4
}

fn default_retry_base_delay_ms() -> u64 {
    1000
}

fn default_text_max_retries() -> u32 {
    3
}

fn default_action_max_retries() -> u32 {
    2
}

fn default_max_tasks() -> usize {
    20
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            default_policy: SchedulingPolicy::default(),
            max_concurrency: default_max_concurrency(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            text_max_retries: default_text_max_retries(),
            action_max_retries: default_action_max_retries(),
            max_tasks: default_max_tasks(),
            resnapshot_before_actions: false,
        }
    }
}

/// Partial settings update
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SettingsUpdate {
    pub default_policy: Option<SchedulingPolicy>,
    pub max_concurrency: Option<usize>,
    pub retry_base_delay_ms: Option<u64>,
    pub text_max_retries: Option<u32>,
    pub action_max_retries: Option<u32>,
    pub max_tasks: Option<usize>,
    pub resnapshot_before_actions: Option<bool>,
}

impl EngineSettings {
    /// Parse settings from TOML text.
    pub fn from_toml_str(content: &str) -> AppResult<Self> {
        let settings: EngineSettings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> AppResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Reject values the scheduler cannot work with.
    pub fn validate(&self) -> AppResult<()> {
        if self.max_concurrency == 0 {
            return Err(AppError::config("max_concurrency must be at least 1"));
        }
        if self.max_tasks == 0 {
            return Err(AppError::config("max_tasks must be at least 1"));
        }
        Ok(())
    }

    /// Apply a partial update to the configuration
    pub fn apply_update(&mut self, update: SettingsUpdate) {
        if let Some(policy) = update.default_policy {
            self.default_policy = policy;
        }
        if let Some(max) = update.max_concurrency {
            self.max_concurrency = max;
        }
        if let Some(delay) = update.retry_base_delay_ms {
            self.retry_base_delay_ms = delay;
        }
        if let Some(retries) = update.text_max_retries {
            self.text_max_retries = retries;
        }
        if let Some(retries) = update.action_max_retries {
            self.action_max_retries = retries;
        }
        if let Some(max) = update.max_tasks {
            self.max_tasks = max;
        }
        if let Some(resnapshot) = update.resnapshot_before_actions {
            self.resnapshot_before_actions = resnapshot;
        }
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    /// Scheduling configuration stamped onto newly created plans.
    pub fn plan_config(&self) -> PlanConfig {
        PlanConfig {
            max_concurrency: self.max_concurrency,
            max_retries: self.text_max_retries.max(self.action_max_retries),
            max_tasks: self.max_tasks,
        }
    }
}
