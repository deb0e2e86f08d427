//! Value Extractors
//!
//! Pull literal action arguments (text to type, scroll direction, wait
//! durations, navigation URLs, extraction targets) out of free text.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use super::locator::explicit_locator;

/// Wait used when the text names no duration.
pub const DEFAULT_WAIT_MS: u64 = 1000;
/// Longest wait accepted from free text.
pub const MAX_WAIT_MS: u64 = 300_000;

fn compile(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern).ok()).as_ref()
}

/// All quoted fragments, in order of appearance.
pub fn quoted_fragments(text: &str) -> Vec<String> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    let Some(re) = compile(&RE, r#""([^"]+)"|'([^']+)'|“([^”]+)”|「([^」]+)」|‘([^’]+)’"#) else {
        return Vec::new();
    };
    re.captures_iter(text)
        .filter_map(|caps| caps.iter().skip(1).flatten().next().map(|m| m.as_str().to_string()))
        .collect()
}

/// The text a type action should enter.
///
/// Quoted text wins; otherwise the words between the typing verb and an
/// `in`/`into` clause, or up to the end of the sentence.
pub fn extract_input_value(text: &str) -> Option<String> {
    if let Some(first) = quoted_fragments(text).into_iter().next() {
        return Some(first);
    }

    static INTO: OnceLock<Option<Regex>> = OnceLock::new();
    static TAIL: OnceLock<Option<Regex>> = OnceLock::new();
    let into = compile(
        &INTO,
        r"(?i)\b(?:type|enter|input|fill in|write)\s+(.+?)\s+(?:in|into|on)\s+(?:the\s+)?\S+",
    );
    let tail = compile(&TAIL, r"(?i)\b(?:type|enter|input|fill in|write)\s+([^,.;]+)");

    [into, tail]
        .into_iter()
        .flatten()
        .find_map(|re| re.captures(text).and_then(|c| c.get(1)))
        .map(|m| m.as_str().trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Scroll direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    Up,
    #[default]
    Down,
    Left,
    Right,
    Top,
    Bottom,
}

impl fmt::Display for ScrollDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScrollDirection::Up => write!(f, "up"),
            ScrollDirection::Down => write!(f, "down"),
            ScrollDirection::Left => write!(f, "left"),
            ScrollDirection::Right => write!(f, "right"),
            ScrollDirection::Top => write!(f, "top"),
            ScrollDirection::Bottom => write!(f, "bottom"),
        }
    }
}

/// Direction of a scroll instruction, `down` when unspecified.
pub fn extract_scroll_direction(text: &str) -> ScrollDirection {
    let lower = text.to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| lower.contains(w));

    if has(&["to the top", "to top", "顶部"]) {
        ScrollDirection::Top
    } else if has(&["bottom", "to the end", "底部"]) {
        ScrollDirection::Bottom
    } else if has(&[" up", "upward", "向上"]) || lower.starts_with("up") {
        ScrollDirection::Up
    } else if has(&["left", "向左"]) {
        ScrollDirection::Left
    } else if has(&["right", "向右"]) {
        ScrollDirection::Right
    } else {
        ScrollDirection::Down
    }
}

/// Scroll distance in pixels, when the text names one.
pub fn extract_scroll_amount(text: &str) -> Option<u32> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    compile(&RE, r"(?i)(\d+)\s*(?:px|pixels?)\b")?
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Wait duration in milliseconds, `DEFAULT_WAIT_MS` when unspecified.
pub fn extract_wait_duration(text: &str) -> u64 {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    let Some(re) = compile(
        &RE,
        r"(?i)(\d+(?:\.\d+)?)\s*(ms|milliseconds?|s|secs?|seconds?|秒|m|mins?|minutes?|分钟)\b",
    ) else {
        return DEFAULT_WAIT_MS;
    };

    let Some(caps) = re.captures(text) else {
        return DEFAULT_WAIT_MS;
    };
    let amount: f64 = caps
        .get(1)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0.0);
    let unit = caps.get(2).map(|m| m.as_str().to_lowercase()).unwrap_or_default();

    let factor = match unit.as_str() {
        "ms" | "millisecond" | "milliseconds" => 1.0,
        "m" | "min" | "mins" | "minute" | "minutes" | "分钟" => 60_000.0,
        _ => 1000.0,
    };
    ((amount * factor).round() as u64).min(MAX_WAIT_MS)
}

/// Navigation target, normalized to an absolute URL.
///
/// Full `http(s)` URLs are taken as written; bare domains such as
/// `example.com/docs` get an `https://` scheme.
pub fn extract_navigation_url(text: &str) -> Option<String> {
    static FULL: OnceLock<Option<Regex>> = OnceLock::new();
    static BARE: OnceLock<Option<Regex>> = OnceLock::new();

    let candidate = compile(&FULL, r#"(?i)\bhttps?://[^\s"'<>]+"#)
        .and_then(|re| re.find(text))
        .map(|m| m.as_str().to_string())
        .or_else(|| {
            compile(
                &BARE,
                r"(?i)\b((?:[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\.)+[a-z]{2,}(?:/[^\s]*)?)",
            )
            .and_then(|re| re.captures(text))
            .and_then(|c| c.get(1))
            .map(|m| format!("https://{}", m.as_str()))
        })?;

    let trimmed = candidate.trim_end_matches(['.', ',', ';', ')', '!', '?']);
    Url::parse(trimmed)
        .ok()
        .filter(|url| url.host_str().is_some())
        .map(|url| url.to_string())
}

/// What an extract action should collect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExtractTarget {
    #[default]
    Text,
    Links,
    Images,
    Tables,
    Headings,
    Forms,
}

/// Options of an extract action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionOptions {
    pub target: ExtractTarget,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

/// Extraction target, scoping locator and item limit of an instruction.
pub fn extract_extraction_options(text: &str) -> ExtractionOptions {
    let lower = text.to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| lower.contains(w));

    let target = if has(&["link", "url", "href", "链接"]) {
        ExtractTarget::Links
    } else if has(&["image", "picture", "photo", "img", "图片"]) {
        ExtractTarget::Images
    } else if has(&["table", "表格"]) {
        ExtractTarget::Tables
    } else if has(&["heading", "headline", "title", "标题"]) {
        ExtractTarget::Headings
    } else if has(&[" form", "forms", "表单"]) {
        ExtractTarget::Forms
    } else {
        ExtractTarget::Text
    };

    ExtractionOptions {
        target,
        locator: explicit_locator(text),
        limit: extract_list_count(text),
    }
}

/// Item count such as "top 5" or "first 3 items".
pub fn extract_list_count(text: &str) -> Option<usize> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    compile(
        &RE,
        r"(?i)\b(?:top|first|last)\s+(\d+)\b|\b(\d+)\s+(?:items?|points?|bullets?|links?|results?|entries)\b",
    )?
    .captures(text)
    .and_then(|c| c.get(1).or_else(|| c.get(2)))
    .and_then(|m| m.as_str().parse().ok())
    .filter(|n| *n > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_value() {
        assert_eq!(
            extract_input_value("type \"hello world\" into the search box").as_deref(),
            Some("hello world")
        );
        assert_eq!(
            extract_input_value("enter rust tutorials into the search box").as_deref(),
            Some("rust tutorials")
        );
        assert_eq!(extract_input_value("type hello").as_deref(), Some("hello"));
        assert_eq!(extract_input_value("click the button"), None);
    }

    #[test]
    fn test_scroll_direction() {
        assert_eq!(extract_scroll_direction("scroll down a bit"), ScrollDirection::Down);
        assert_eq!(extract_scroll_direction("scroll up"), ScrollDirection::Up);
        assert_eq!(extract_scroll_direction("scroll to the top"), ScrollDirection::Top);
        assert_eq!(extract_scroll_direction("scroll to the bottom"), ScrollDirection::Bottom);
        assert_eq!(extract_scroll_direction("scroll"), ScrollDirection::Down);
        assert_eq!(extract_scroll_amount("scroll down 400px"), Some(400));
        assert_eq!(extract_scroll_amount("scroll down"), None);
    }

    #[test]
    fn test_wait_duration() {
        assert_eq!(extract_wait_duration("wait 3 seconds"), 3000);
        assert_eq!(extract_wait_duration("wait 500ms"), 500);
        assert_eq!(extract_wait_duration("wait 1.5s"), 1500);
        assert_eq!(extract_wait_duration("wait 2 minutes"), 120_000);
        assert_eq!(extract_wait_duration("wait for it"), DEFAULT_WAIT_MS);
        assert_eq!(extract_wait_duration("wait 90 minutes"), MAX_WAIT_MS);
    }

    #[test]
    fn test_navigation_url() {
        assert_eq!(
            extract_navigation_url("go to https://example.com/docs.").as_deref(),
            Some("https://example.com/docs")
        );
        assert_eq!(
            extract_navigation_url("open example.com").as_deref(),
            Some("https://example.com/")
        );
        assert_eq!(extract_navigation_url("open the settings"), None);
    }

    #[test]
    fn test_extraction_options() {
        let options = extract_extraction_options("extract the top 5 links from #sidebar");
        assert_eq!(options.target, ExtractTarget::Links);
        assert_eq!(options.locator.as_deref(), Some("#sidebar"));
        assert_eq!(options.limit, Some(5));

        let options = extract_extraction_options("extract the content");
        assert_eq!(options, ExtractionOptions::default());
    }

    #[test]
    fn test_quoted_fragments() {
        assert_eq!(
            quoted_fragments("type 'a' then “b”"),
            vec!["a".to_string(), "b".to_string()]
        );
    }
}
