//! Page Snapshot & Grounded Action Types
//!
//! Read-only view of a live document (`PageSnapshot`) as produced by a
//! snapshot provider, and the concrete actions (`GroundedAction`) the
//! page-action executor performs against it.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Snapshot
// ============================================================================

/// One addressable element captured in a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageElement {
    /// Selector that addresses this element (e.g. `#login-btn`)
    pub locator: String,
    /// Visible text content
    #[serde(default)]
    pub text: String,
    /// Type-specific attributes (placeholder, name, href, aria-label, ...)
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl PageElement {
    pub fn new(locator: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            text: text.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Human-facing labels of this element, in lookup order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.text.as_str())
            .chain(["placeholder", "name", "aria-label", "title", "value", "alt"]
                .into_iter()
                .filter_map(|key| self.attr(key)))
            .filter(|label| !label.trim().is_empty())
    }
}

/// Structured capture of a page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSnapshot {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: String,
    /// Text the user had selected when the snapshot was taken
    #[serde(default)]
    pub selected_text: String,
    #[serde(default)]
    pub buttons: Vec<PageElement>,
    #[serde(default)]
    pub links: Vec<PageElement>,
    #[serde(default)]
    pub inputs: Vec<PageElement>,
    #[serde(default)]
    pub forms: Vec<PageElement>,
    #[serde(default)]
    pub headings: Vec<PageElement>,
    #[serde(default)]
    pub tables: Vec<PageElement>,
    #[serde(default)]
    pub images: Vec<PageElement>,
}

impl PageSnapshot {
    pub fn is_empty(&self) -> bool {
        self.buttons.is_empty()
            && self.links.is_empty()
            && self.inputs.is_empty()
            && self.forms.is_empty()
            && self.headings.is_empty()
            && self.tables.is_empty()
            && self.images.is_empty()
    }
}

// ============================================================================
// Grounded Actions
// ============================================================================

/// Kind of page action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Click,
    Type,
    Scroll,
    Navigate,
    Wait,
    Extract,
    Screenshot,
    Hover,
    Select,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionKind::Click => "click",
            ActionKind::Type => "type",
            ActionKind::Scroll => "scroll",
            ActionKind::Navigate => "navigate",
            ActionKind::Wait => "wait",
            ActionKind::Extract => "extract",
            ActionKind::Screenshot => "screenshot",
            ActionKind::Hover => "hover",
            ActionKind::Select => "select",
        };
        write!(f, "{}", name)
    }
}

/// Viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// A concrete action bound to a locator or literal value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundedAction {
    pub kind: ActionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locator: Option<String>,
    /// Literal value: text to type, URL, option to select, scroll direction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Point>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Kind-specific options (scroll amount, extraction target, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Value>,
}

impl GroundedAction {
    pub fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            locator: None,
            value: None,
            coordinates: None,
            timeout_ms: None,
            options: None,
        }
    }

    pub fn at(mut self, locator: impl Into<String>) -> Self {
        self.locator = Some(locator.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_options(mut self, options: Value) -> Self {
        self.options = Some(options);
        self
    }
}

/// Result of performing one grounded action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionOutcome {
    pub fn ok(result: Option<Value>) -> Self {
        Self {
            success: true,
            result,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.into()),
        }
    }
}
