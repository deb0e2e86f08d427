//! Locator Resolution
//!
//! Binds a natural-language target ("click the Submit button") to a concrete
//! selector. Resolution order:
//!
//! 1. explicit selector token in the text (`#id`, `.class`, `[attr=..]`,
//!    `css:` / `xpath:` prefixes, backtick-quoted selectors)
//! 2. snapshot scan: buttons, then links, then inputs; first element whose
//!    labels contain a term of the description wins
//! 3. keyword table for common controls (login, search, menu, ...)
//! 4. the document root
//!
//! A miss never raises; the root fallback surfaces as an action failure
//! later, at execution time.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use task_cascade_core::{PageElement, PageSnapshot};

/// Selector used when nothing better is found.
pub const ROOT_LOCATOR: &str = "body";

/// Which resolution step produced a locator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocatorStrategy {
    Explicit,
    Snapshot,
    Keyword,
    Fallback,
}

impl fmt::Display for LocatorStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocatorStrategy::Explicit => write!(f, "explicit"),
            LocatorStrategy::Snapshot => write!(f, "snapshot"),
            LocatorStrategy::Keyword => write!(f, "keyword"),
            LocatorStrategy::Fallback => write!(f, "fallback"),
        }
    }
}

/// A resolved target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Locator {
    pub selector: String,
    pub strategy: LocatorStrategy,
    /// Display text of the matched snapshot element, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_text: Option<String>,
}

impl Locator {
    fn new(selector: impl Into<String>, strategy: LocatorStrategy) -> Self {
        Self {
            selector: selector.into(),
            strategy,
            element_text: None,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.strategy == LocatorStrategy::Fallback
    }
}

/// Words that describe the action or the element kind rather than the target.
const STOPWORDS: &[&str] = &[
    "the", "and", "then", "click", "press", "tap", "hit", "button", "link", "input", "field",
    "box", "on", "into", "in", "to", "a", "an", "of", "for", "with", "that", "this", "please",
    "type", "enter", "fill", "hover", "over", "select", "choose", "pick", "from", "menu", "page",
    "open", "option", "dropdown", "element", "text", "it",
];

/// Well-known controls, tried when the snapshot offers no match.
const KEYWORD_LOCATORS: &[(&[&str], &str)] = &[
    (
        &["log in", "login", "sign in", "signin", "登录"],
        "button[type=\"submit\"], #login, .login-button",
    ),
    (
        &["search", "搜索"],
        "input[type=\"search\"], input[name=\"q\"], #search",
    ),
    (&["menu", "菜单", "navigation"], "nav, .menu, #menu"),
    (
        &["submit", "提交"],
        "button[type=\"submit\"], input[type=\"submit\"]",
    ),
    (&["close", "dismiss", "关闭"], ".close, [aria-label=\"Close\"]"),
    (&["next", "下一"], ".next, [rel=\"next\"]"),
];

fn explicit_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"(?i)\b(?:css|selector):\s*(\S+)",
            r"(?i)\bxpath:\s*(\S+)",
            r"`([^`]+)`",
            r"(?:^|\s)(#[A-Za-z][\w-]*)",
            r"(\[[\w-]+(?:[~|^$*]?=[^\]]+)?\])",
            r"(?:^|\s)(\.[A-Za-z][\w-]*)",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    })
}

fn quoted_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r#""([^"]+)"|'([^']+)'|“([^”]+)”|「([^」]+)」"#).ok())
        .as_ref()
}

/// Find an explicit selector written into the description.
pub fn explicit_locator(description: &str) -> Option<String> {
    for (index, re) in explicit_patterns().iter().enumerate() {
        if let Some(m) = re.captures(description).and_then(|c| c.get(1)) {
            let token = m.as_str().trim_end_matches([',', ';', ')']);
            if token.is_empty() {
                continue;
            }
            // index 1 is the xpath prefix
            return Some(if index == 1 {
                format!("xpath={}", token)
            } else {
                token.to_string()
            });
        }
    }
    None
}

/// Search terms of a description: quoted phrases first, then content words.
pub fn target_terms(description: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();

    if let Some(re) = quoted_pattern() {
        for caps in re.captures_iter(description) {
            if let Some(m) = caps.iter().skip(1).flatten().next() {
                let phrase = m.as_str().trim().to_lowercase();
                if !phrase.is_empty() && !terms.contains(&phrase) {
                    terms.push(phrase);
                }
            }
        }
    }

    for word in description
        .split(|c: char| !(c.is_alphanumeric() || c == '-' || c == '_'))
        .map(str::to_lowercase)
    {
        let long_enough = if word.is_ascii() {
            word.len() >= 3
        } else {
            word.chars().count() >= 2
        };
        if long_enough && !STOPWORDS.contains(&word.as_str()) && !terms.contains(&word) {
            terms.push(word);
        }
    }

    terms
}

fn element_matches(element: &PageElement, terms: &[String]) -> bool {
    element.labels().any(|label| {
        let label = label.to_lowercase();
        terms.iter().any(|term| label.contains(term.as_str()))
    })
}

/// Scan buttons, then links, then inputs for the first element matching a term.
pub fn find_in_snapshot<'a>(snapshot: &'a PageSnapshot, terms: &[String]) -> Option<&'a PageElement> {
    if terms.is_empty() {
        return None;
    }
    snapshot
        .buttons
        .iter()
        .chain(snapshot.links.iter())
        .chain(snapshot.inputs.iter())
        .find(|element| element_matches(element, terms))
}

/// Input-only scan, for targets that must accept text.
pub fn find_input<'a>(snapshot: &'a PageSnapshot, terms: &[String]) -> Option<&'a PageElement> {
    snapshot.inputs.iter().find(|element| {
        element_matches(element, terms)
            || element
                .attr("type")
                .map_or(false, |t| terms.iter().any(|term| term == t))
    })
}

/// Button-only scan, for submit-style targets.
pub fn find_button<'a>(snapshot: &'a PageSnapshot, terms: &[String]) -> Option<&'a PageElement> {
    snapshot
        .buttons
        .iter()
        .find(|element| element_matches(element, terms))
}

fn keyword_locator(description: &str) -> Option<&'static str> {
    let lower = description.to_lowercase();
    KEYWORD_LOCATORS
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(_, selector)| *selector)
}

/// Resolve a target description to a locator.
pub fn resolve_locator(description: &str, snapshot: Option<&PageSnapshot>) -> Locator {
    if let Some(selector) = explicit_locator(description) {
        return Locator::new(selector, LocatorStrategy::Explicit);
    }

    if let Some(snapshot) = snapshot {
        let terms = target_terms(description);
        if let Some(element) = find_in_snapshot(snapshot, &terms) {
            tracing::debug!(
                "[Grounding] '{}' matched element {} ('{}')",
                description,
                element.locator,
                element.text
            );
            return Locator {
                selector: element.locator.clone(),
                strategy: LocatorStrategy::Snapshot,
                element_text: Some(element.text.clone()).filter(|t| !t.is_empty()),
            };
        }
    }

    if let Some(selector) = keyword_locator(description) {
        return Locator::new(selector, LocatorStrategy::Keyword);
    }

    tracing::debug!(
        "[Grounding] No target found for '{}', falling back to {}",
        description,
        ROOT_LOCATOR
    );
    Locator::new(ROOT_LOCATOR, LocatorStrategy::Fallback)
}
