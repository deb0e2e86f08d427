//! Template Scoring
//!
//! Keyword-based relevance scoring of templates against an instruction.
//! A template's score is the summed length (in characters) of the keywords
//! it finds, plus bonuses for structural signals once a keyword matched.

use serde::{Deserialize, Serialize};

use crate::services::grounding;
use crate::services::templates::{detect_target_language, Signal, TaskTemplate, TemplateRegistry, TemplateKind};

/// A template must score strictly above this to be kept.
pub const MATCH_THRESHOLD: usize = 1;
/// At most this many text templates are kept.
pub const MAX_TEXT_TEMPLATES: usize = 5;
/// At most this many action templates are kept.
pub const MAX_ACTION_TEMPLATES: usize = 10;

/// Structural features of an instruction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signals {
    pub target_language: Option<String>,
    pub url: Option<String>,
    pub quoted_text: bool,
    pub question: bool,
}

impl Signals {
    pub fn detect(instruction: &str) -> Self {
        Self {
            target_language: detect_target_language(instruction).map(str::to_string),
            url: grounding::extract_navigation_url(instruction),
            quoted_text: !grounding::quoted_fragments(instruction).is_empty(),
            question: instruction.trim_end().ends_with(['?', '？']),
        }
    }

    pub fn has(&self, signal: Signal) -> bool {
        match signal {
            Signal::TargetLanguage => self.target_language.is_some(),
            Signal::Url => self.url.is_some(),
            Signal::QuotedText => self.quoted_text,
            Signal::Question => self.question,
        }
    }
}

/// A kept template with its score and first keyword position.
#[derive(Debug, Clone)]
pub struct TemplateMatch<'a> {
    pub template: &'a TaskTemplate,
    pub score: usize,
    /// Character offset of the earliest keyword hit
    pub position: usize,
}

/// Score one template. Returns `(score, first_position)`; the position is
/// `None` when no keyword matched.
pub fn score_template(template: &TaskTemplate, lower_instruction: &str, signals: &Signals) -> (usize, Option<usize>) {
    let mut score = 0;
    let mut first: Option<usize> = None;
    let haystack = template.mask_exclusions(lower_instruction);

    for keyword in &template.keywords {
        let keyword = keyword.to_lowercase();
        if keyword.is_empty() {
            continue;
        }
        if let Some(byte_pos) = haystack.find(&keyword) {
            score += keyword.chars().count();
            let pos = haystack[..byte_pos].chars().count();
            first = Some(first.map_or(pos, |p| p.min(pos)));
        }
    }

    if first.is_some() {
        score += template
            .bonuses
            .iter()
            .filter(|b| signals.has(b.signal))
            .map(|b| b.points)
            .sum::<usize>();
    }

    (score, first)
}

/// Select the templates relevant to an instruction.
///
/// Templates scoring above `MATCH_THRESHOLD` are ranked by score (ties keep
/// registration order) and capped per kind. The result is returned in order
/// of first mention in the instruction.
pub fn match_templates<'a>(instruction: &str, registry: &'a TemplateRegistry) -> Vec<TemplateMatch<'a>> {
    let lower = instruction.to_lowercase();
    let signals = Signals::detect(instruction);

    let mut text: Vec<TemplateMatch<'a>> = Vec::new();
    let mut actions: Vec<TemplateMatch<'a>> = Vec::new();

    for template in registry.list() {
        let (score, position) = score_template(template, &lower, &signals);
        let Some(position) = position else {
            continue;
        };
        if score <= MATCH_THRESHOLD {
            continue;
        }
        let matched = TemplateMatch {
            template,
            score,
            position,
        };
        match template.kind {
            TemplateKind::Text => text.push(matched),
            TemplateKind::Action => actions.push(matched),
        }
    }

    text.sort_by(|a, b| b.score.cmp(&a.score));
    text.truncate(MAX_TEXT_TEMPLATES);
    actions.sort_by(|a, b| b.score.cmp(&a.score));
    actions.truncate(MAX_ACTION_TEMPLATES);

    let mut kept: Vec<TemplateMatch<'a>> = text.into_iter().chain(actions).collect();
    kept.sort_by(|a, b| a.position.cmp(&b.position).then(b.score.cmp(&a.score)));

    tracing::debug!(
        "[Scoring] Kept {} templates: {:?}",
        kept.len(),
        kept.iter().map(|m| (m.template.id.as_str(), m.score)).collect::<Vec<_>>()
    );
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(matches: &[TemplateMatch<'_>]) -> Vec<String> {
        matches.iter().map(|m| m.template.id.clone()).collect()
    }

    #[test]
    fn test_summarize_then_translate() {
        let registry = TemplateRegistry::with_builtins();
        let matches = match_templates("summarize this text and translate it to Chinese", &registry);
        assert_eq!(ids(&matches), vec!["summarize", "translate"]);
        // "translate" (9) + target language bonus
        assert_eq!(matches[1].score, 19);
    }

    #[test]
    fn test_mention_order_wins_over_score() {
        let registry = TemplateRegistry::with_builtins();
        let matches = match_templates("translate this to French, then summarize it", &registry);
        assert_eq!(ids(&matches), vec!["translate", "summarize"]);
    }

    #[test]
    fn test_no_match() {
        let registry = TemplateRegistry::with_builtins();
        assert!(match_templates("hello there", &registry).is_empty());
        assert!(match_templates("", &registry).is_empty());
    }

    #[test]
    fn test_bonus_needs_keyword() {
        let registry = TemplateRegistry::with_builtins();
        let signals = Signals::detect("go to https://example.com");
        assert!(signals.url.is_some());
        let lower = "go to https://example.com";
        let navigate = registry.get("navigate").unwrap();
        assert_eq!(score_template(navigate, lower, &signals), (5 + 8, Some(0)));

        let translate = registry.get("translate").unwrap();
        let signals = Signals::detect("write it in French");
        assert_eq!(score_template(translate, "write it in french", &signals), (0, None));
    }

    #[test]
    fn test_text_templates_capped() {
        let registry = TemplateRegistry::with_builtins();
        let matches = match_templates(
            "summarize, translate to German, rewrite, explain, analyze and compose a reply as a list",
            &registry,
        );
        let text = matches.iter().filter(|m| !m.template.is_action()).count();
        assert_eq!(text, MAX_TEXT_TEMPLATES);
    }

    #[test]
    fn test_selected_text_is_not_a_select_action() {
        let registry = TemplateRegistry::with_builtins();
        let matches = match_templates("summarize the selected text", &registry);
        assert_eq!(ids(&matches), vec!["summarize"]);

        let matches = match_templates("select Blue from the color list", &registry);
        assert_eq!(ids(&matches), vec!["select"]);
    }

    #[test]
    fn test_exclusions_keep_positions() {
        let registry = TemplateRegistry::with_builtins();
        let select = registry.get("select").unwrap();
        let lower = "keep the selection, then select red";
        let (score, position) = score_template(select, lower, &Signals::default());
        assert_eq!(score, 6);
        assert_eq!(position, lower.rfind("select"));
    }

    #[test]
    fn test_action_instruction() {
        let registry = TemplateRegistry::with_builtins();
        let matches = match_templates("go to example.com and click the Submit button", &registry);
        assert_eq!(ids(&matches), vec!["navigate", "click"]);
    }
}
