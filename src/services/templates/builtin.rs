//! Built-in Templates & Task Definitions

use task_cascade_core::{ParamKind, ParamValidation, ParameterSpec};

use super::types::{PageField, ParamSource, ParameterRule, Signal, TaskDefinition, TaskTemplate};
use crate::models::task::{TaskPriority, TaskType};

// ============================================================================
// Shared parameter rules
// ============================================================================

/// `text` input of a text task: explicit `verb: payload` capture, then the
/// page selection, then the whole instruction.
fn text_input(patterns: &[&str]) -> ParameterRule {
    ParameterRule::new("text", ParamKind::String)
        .source(ParamSource::regex(patterns))
        .source(ParamSource::page(PageField::SelectedText))
        .source(ParamSource::FullText)
        .required()
}

fn target_description() -> ParameterRule {
    ParameterRule::new("target", ParamKind::String)
        .source(ParamSource::rule("target"))
        .required()
}

fn planned_locator() -> ParameterRule {
    ParameterRule::new("locator", ParamKind::String).source(ParamSource::rule("locator"))
}

// ============================================================================
// Text templates
// ============================================================================

pub fn text_templates() -> Vec<TaskTemplate> {
    vec![
        TaskTemplate::new(
            "summarize",
            "Summarize",
            TaskType::Summarize,
            &["summarize", "summarise", "summary", "sum up", "tl;dr", "总结", "摘要", "概括"],
        )
        .param(text_input(&[r"(?is)summari[sz]e\s*[:：]\s*(.+)", r"(?is)总结\s*[:：]\s*(.+)"]))
        .param(
            ParameterRule::new("length", ParamKind::String)
                .source(ParamSource::regex(&[r"(?i)\b(short|brief|medium|long|detailed)\b"]))
                .fallback("brief"),
        )
        .priority(TaskPriority::High)
        .duration(3000)
        .tags(&["text", "summary"]),
        TaskTemplate::new(
            "translate",
            "Translate",
            TaskType::Translate,
            &["translate", "translation", "翻译", "译成"],
        )
        .bonus(Signal::TargetLanguage, 10)
        .param(text_input(&[r"(?is)translate\s*[:：]\s*(.+)", r"(?is)翻译\s*[:：]\s*(.+)"]))
        .param(
            ParameterRule::new("target_language", ParamKind::String)
                .source(ParamSource::rule("target_language"))
                .required()
                .fallback("English"),
        )
        .priority(TaskPriority::Medium)
        .duration(3000)
        .tags(&["text", "translation"]),
        TaskTemplate::new(
            "rewrite",
            "Rewrite",
            TaskType::Rewrite,
            &["rewrite", "rephrase", "paraphrase", "polish", "改写", "润色"],
        )
        .param(text_input(&[r"(?is)(?:rewrite|rephrase)\s*[:：]\s*(.+)"]))
        .param(
            ParameterRule::new("style", ParamKind::String)
                .source(ParamSource::regex(&[
                    r"(?i)\b(formal|casual|concise|friendly|professional|academic)\b",
                ]))
                .fallback("clear"),
        )
        .duration(3000)
        .tags(&["text"]),
        TaskTemplate::new(
            "explain",
            "Explain",
            TaskType::Explain,
            &["explain", "clarify", "what does", "what is", "解释", "说明"],
        )
        .param(text_input(&[r"(?is)explain\s*[:：]\s*(.+)"]))
        .duration(3000)
        .tags(&["text"]),
        TaskTemplate::new(
            "extract_info",
            "Extract information",
            TaskType::ExtractInfo,
            &["key points", "extract info", "extract the info", "main points", "key facts", "提取信息", "要点"],
        )
        .param(text_input(&[r"(?is)key points\s*[:：]\s*(.+)"]))
        .param(
            ParameterRule::new("fields", ParamKind::String)
                .source(ParamSource::regex(&[r"(?i)\b(?:extract|find)\s+(?:the\s+)?([\w\s,]+?)\s+from\b"])),
        )
        .priority(TaskPriority::High)
        .duration(2500)
        .tags(&["text", "extraction"]),
        TaskTemplate::new(
            "analyze",
            "Analyze",
            TaskType::Analyze,
            &["analyze", "analyse", "analysis", "evaluate", "assess", "分析"],
        )
        .param(text_input(&[r"(?is)analy[sz]e\s*[:：]\s*(.+)"]))
        .duration(4000)
        .tags(&["text", "analysis"]),
        TaskTemplate::new(
            "compose",
            "Compose reply",
            TaskType::Compose,
            &["reply", "respond", "compose", "draft", "write an email", "回复", "撰写"],
        )
        .param(text_input(&[r"(?is)(?:reply|respond)\s+(?:to\s+)?(?:this|it)?\s*[:：]\s*(.+)"]))
        .param(
            ParameterRule::new("tone", ParamKind::String)
                .source(ParamSource::regex(&[r"(?i)\b(polite|formal|casual|friendly|firm)\b"]))
                .fallback("polite"),
        )
        .priority(TaskPriority::Low)
        .duration(4000)
        .tags(&["text", "writing"]),
        TaskTemplate::new(
            "answer",
            "Answer question",
            TaskType::Answer,
            &["answer", "question", "?", "？", "回答", "问题"],
        )
        .bonus(Signal::Question, 3)
        .param(
            ParameterRule::new("question", ParamKind::String)
                .source(ParamSource::regex(&[r"(?is)answer\s*[:：]\s*(.+)", r"([^.!?。]*[?？])"]))
                .source(ParamSource::FullText)
                .required(),
        )
        .param(
            ParameterRule::new("context", ParamKind::String)
                .source(ParamSource::page(PageField::SelectedText)),
        )
        .duration(3000)
        .tags(&["text", "qa"]),
        TaskTemplate::new(
            "format_list",
            "Format as list",
            TaskType::FormatList,
            &["bullet", "as a list", "into a list", "list of", "checklist", "列表", "清单"],
        )
        .param(text_input(&[r"(?is)(?:list|bullets?)\s*[:：]\s*(.+)"]))
        .param(
            ParameterRule::new("max_items", ParamKind::Number).source(ParamSource::rule("list_count")),
        )
        .priority(TaskPriority::Low)
        .duration(2000)
        .tags(&["text", "formatting"]),
    ]
}

// ============================================================================
// Action templates
// ============================================================================

pub fn action_templates() -> Vec<TaskTemplate> {
    vec![
        TaskTemplate::new(
            "navigate",
            "Navigate",
            TaskType::Navigate,
            &["navigate", "go to", "open", "visit", "打开", "访问"],
        )
        .bonus(Signal::Url, 8)
        .param(
            ParameterRule::new("url", ParamKind::String)
                .source(ParamSource::rule("navigation_url"))
                .required(),
        )
        .priority(TaskPriority::Critical)
        .duration(3000)
        .tags(&["page", "navigation"]),
        TaskTemplate::new(
            "click",
            "Click",
            TaskType::Click,
            &["click", "press", "tap", "点击", "单击"],
        )
        .param(target_description())
        .param(planned_locator())
        .priority(TaskPriority::High)
        .duration(500)
        .tags(&["page", "interaction"]),
        TaskTemplate::new(
            "type",
            "Type text",
            TaskType::Type,
            &["type", "enter", "fill in", "input", "输入", "填写"],
        )
        .bonus(Signal::QuotedText, 5)
        .param(target_description())
        .param(planned_locator())
        .param(
            ParameterRule::new("value", ParamKind::String)
                .source(ParamSource::rule("input_value"))
                .required(),
        )
        .priority(TaskPriority::High)
        .duration(800)
        .tags(&["page", "interaction"]),
        TaskTemplate::new(
            "scroll",
            "Scroll",
            TaskType::Scroll,
            &["scroll", "滚动", "翻页"],
        )
        .param(
            ParameterRule::new("direction", ParamKind::String)
                .source(ParamSource::rule("scroll_direction"))
                .required()
                .fallback("down"),
        )
        .param(ParameterRule::new("amount", ParamKind::Number).source(ParamSource::rule("scroll_amount")))
        .priority(TaskPriority::Low)
        .duration(500)
        .tags(&["page"]),
        TaskTemplate::new("wait", "Wait", TaskType::Wait, &["wait", "pause", "等待"])
            .param(
                ParameterRule::new("duration_ms", ParamKind::Number)
                    .source(ParamSource::rule("wait_duration"))
                    .required()
                    .fallback(1000i64),
            )
            .priority(TaskPriority::Low)
            .duration(1000)
            .tags(&["page"]),
        TaskTemplate::new(
            "extract",
            "Extract from page",
            TaskType::Extract,
            &["extract", "scrape", "collect", "grab", "提取", "抓取"],
        )
        .param(
            ParameterRule::new("options", ParamKind::Object)
                .source(ParamSource::rule("extraction_options"))
                .required(),
        )
        .priority(TaskPriority::High)
        .duration(1500)
        .tags(&["page", "extraction"]),
        TaskTemplate::new(
            "screenshot",
            "Screenshot",
            TaskType::Screenshot,
            &["screenshot", "screen shot", "capture the screen", "截图", "截屏"],
        )
        .param(
            ParameterRule::new("full_page", ParamKind::Boolean)
                .source(ParamSource::regex(&[r"(?i)\b(full)[\s-]?page\b"]))
                .fallback(false),
        )
        .priority(TaskPriority::Low)
        .duration(1000)
        .tags(&["page", "capture"]),
        TaskTemplate::new(
            "hover",
            "Hover",
            TaskType::Hover,
            &["hover", "mouse over", "悬停"],
        )
        .param(target_description())
        .param(planned_locator())
        .duration(500)
        .tags(&["page", "interaction"]),
        TaskTemplate::new(
            "select",
            "Select option",
            TaskType::Select,
            &["select", "choose", "pick", "选择"],
        )
        .excluding(&["selected", "selection"])
        .param(target_description())
        .param(planned_locator())
        .param(
            ParameterRule::new("option", ParamKind::String)
                .source(ParamSource::rule("select_option"))
                .required(),
        )
        .duration(800)
        .tags(&["page", "interaction"]),
        TaskTemplate::new(
            "search",
            "Search",
            TaskType::Search,
            &["search", "look up", "搜索", "查找"],
        )
        .bonus(Signal::QuotedText, 5)
        .param(
            ParameterRule::new("query", ParamKind::String)
                .source(ParamSource::rule("search_query"))
                .required(),
        )
        .priority(TaskPriority::High)
        .duration(2000)
        .tags(&["page", "search"]),
        TaskTemplate::new(
            "login",
            "Log in",
            TaskType::Login,
            &["log in", "login", "sign in", "登录"],
        )
        .param(ParameterRule::new("username", ParamKind::String).source(ParamSource::rule("username")))
        .param(ParameterRule::new("password", ParamKind::String).source(ParamSource::rule("password")))
        .priority(TaskPriority::Critical)
        .duration(3000)
        .tags(&["page", "auth"]),
    ]
}

// ============================================================================
// Task definitions
// ============================================================================

fn text_spec() -> ParameterSpec {
    ParameterSpec::required("text", ParamKind::String).with_validation(ParamValidation {
        min: Some(1.0),
        ..Default::default()
    })
}

pub fn definitions() -> Vec<TaskDefinition> {
    vec![
        TaskDefinition::text(
            TaskType::Summarize,
            "Summarize",
            "Summarize the following text. Keep it {{length}}.\n\n{{text}}",
        )
        .describe("Condense text into its essential points")
        .spec(text_spec())
        .spec(ParameterSpec::optional("length", ParamKind::String).with_default("brief"))
        .input("text"),
        TaskDefinition::text(
            TaskType::Translate,
            "Translate",
            "Translate the following text into {{target_language}}. Reply with the translation only.\n\n{{text}}",
        )
        .describe("Translate text into a target language")
        .spec(text_spec())
        .spec(ParameterSpec::required("target_language", ParamKind::String).with_default("English"))
        .input("text"),
        TaskDefinition::text(
            TaskType::Rewrite,
            "Rewrite",
            "Rewrite the following text in a {{style}} style.\n\n{{text}}",
        )
        .spec(text_spec())
        .spec(ParameterSpec::optional("style", ParamKind::String).with_default("clear"))
        .input("text"),
        TaskDefinition::text(
            TaskType::Explain,
            "Explain",
            "Explain the following in plain language.\n\n{{text}}",
        )
        .spec(text_spec())
        .input("text"),
        TaskDefinition::text(
            TaskType::ExtractInfo,
            "Extract information",
            "List the key facts of the following text as JSON.\n\n{{text}}",
        )
        .describe("Pull key facts out of text")
        .spec(text_spec())
        .spec(ParameterSpec::optional("fields", ParamKind::String))
        .input("text"),
        TaskDefinition::text(
            TaskType::Analyze,
            "Analyze",
            "Analyze the following content and report your findings.\n\n{{text}}",
        )
        .spec(text_spec())
        .input("text"),
        TaskDefinition::text(
            TaskType::Compose,
            "Compose reply",
            "Write a {{tone}} reply to the following message.\n\n{{text}}",
        )
        .spec(text_spec())
        .spec(ParameterSpec::optional("tone", ParamKind::String).with_default("polite"))
        .input("text"),
        TaskDefinition::text(
            TaskType::Answer,
            "Answer question",
            "Answer the question using the context if relevant.\n\nQuestion: {{question}}\n\nContext: {{context}}",
        )
        .spec(ParameterSpec::required("question", ParamKind::String))
        .spec(ParameterSpec::optional("context", ParamKind::String).with_default(""))
        .input("context"),
        TaskDefinition::text(
            TaskType::FormatList,
            "Format as list",
            "Rewrite the following as a bulleted list.\n\n{{text}}",
        )
        .spec(text_spec())
        .spec(ParameterSpec::optional("max_items", ParamKind::Number))
        .input("text"),
        TaskDefinition::action(TaskType::Navigate, "Navigate")
            .spec(ParameterSpec::required("url", ParamKind::String).with_validation(ParamValidation {
                pattern: Some(r"^https?://".to_string()),
                ..Default::default()
            })),
        TaskDefinition::action(TaskType::Click, "Click")
            .spec(ParameterSpec::required("target", ParamKind::String))
            .spec(ParameterSpec::optional("locator", ParamKind::String)),
        TaskDefinition::action(TaskType::Type, "Type text")
            .spec(ParameterSpec::required("target", ParamKind::String))
            .spec(ParameterSpec::optional("locator", ParamKind::String))
            .spec(ParameterSpec::required("value", ParamKind::String))
            .input("value"),
        TaskDefinition::action(TaskType::Scroll, "Scroll")
            .spec(
                ParameterSpec::required("direction", ParamKind::String)
                    .with_default("down")
                    .with_validation(ParamValidation {
                        allowed: Some(
                            ["up", "down", "left", "right", "top", "bottom"]
                                .iter()
                                .map(|s| s.to_string())
                                .collect(),
                        ),
                        ..Default::default()
                    }),
            )
            .spec(ParameterSpec::optional("amount", ParamKind::Number)),
        TaskDefinition::action(TaskType::Wait, "Wait").spec(
            ParameterSpec::required("duration_ms", ParamKind::Number)
                .with_default(1000i64)
                .with_validation(ParamValidation {
                    min: Some(0.0),
                    max: Some(300_000.0),
                    ..Default::default()
                }),
        ),
        TaskDefinition::action(TaskType::Extract, "Extract from page")
            .spec(ParameterSpec::optional("options", ParamKind::Object)),
        TaskDefinition::action(TaskType::Screenshot, "Screenshot")
            .spec(ParameterSpec::optional("full_page", ParamKind::Boolean).with_default(false)),
        TaskDefinition::action(TaskType::Hover, "Hover")
            .spec(ParameterSpec::required("target", ParamKind::String))
            .spec(ParameterSpec::optional("locator", ParamKind::String)),
        TaskDefinition::action(TaskType::Select, "Select option")
            .spec(ParameterSpec::required("target", ParamKind::String))
            .spec(ParameterSpec::optional("locator", ParamKind::String))
            .spec(ParameterSpec::required("option", ParamKind::String)),
        TaskDefinition::action(TaskType::Search, "Search")
            .spec(ParameterSpec::required("query", ParamKind::String))
            .input("query"),
        TaskDefinition::action(TaskType::Login, "Log in")
            .spec(ParameterSpec::optional("username", ParamKind::String))
            .spec(ParameterSpec::optional("password", ParamKind::String))
            .retries(1),
    ]
}
