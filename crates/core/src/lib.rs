//! Task Cascade Core
//!
//! Foundational types, collaborator traits and error types for the Task
//! Cascade workspace. This crate has zero dependencies on the planning and
//! scheduling code in the application crate.
//!
//! ## Module Organization
//!
//! - `error` - Core error types (`CoreError`, `CoreResult`)
//! - `param` - Closed parameter variant and parameter specs (`ParamValue`, `ParameterSpec`)
//! - `path` - Dot-path lookup into JSON payloads
//! - `context` - Producer-keyed shared result store (`ResultStore`)
//! - `page` - Page snapshot and grounded action types
//! - `capability` - Collaborator traits (`TextCapability`, `PageActionExecutor`, `SnapshotProvider`)

pub mod capability;
pub mod context;
pub mod error;
pub mod page;
pub mod param;
pub mod path;

// ── Error Types ────────────────────────────────────────────────────────
pub use error::{CoreError, CoreResult};

// ── Parameters ─────────────────────────────────────────────────────────
pub use param::{validate_params, ParamKind, ParamValidation, ParamValue, ParameterSpec, Params};

// ── Shared Store ───────────────────────────────────────────────────────
pub use context::ResultStore;

// ── Page Types ─────────────────────────────────────────────────────────
pub use page::{ActionKind, ActionOutcome, GroundedAction, PageElement, PageSnapshot, Point};

// ── Collaborators ──────────────────────────────────────────────────────
pub use capability::{PageActionExecutor, SnapshotProvider, TextCapability, TextResponse};
