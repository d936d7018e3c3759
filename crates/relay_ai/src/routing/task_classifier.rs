//! Task Classifier
//!
//! Maps free text (plus optional caller context) to a [`TaskCategory`] by
//! summing four independently weighted signal sources per category:
//! keywords, phrase patterns, a node-type hint and execution heuristics.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::types::TaskCategory;

// ---------------------------------------------------------------------------
// Signal weights
// ---------------------------------------------------------------------------

const KEYWORD_WEIGHT: f64 = 0.4;
const PATTERN_WEIGHT: f64 = 0.3;
const HINT_WEIGHT: f64 = 0.2;
const HEURISTIC_WEIGHT: f64 = 0.1;

/// Confidence reported when nothing matched.
const DEFAULT_CONFIDENCE: f64 = 0.3;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Optional execution context supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationHint {
    /// Type of the workflow node issuing the request, e.g. `"json-parser"`.
    pub node_type: Option<String>,
    /// Template variables bound into the prompt.
    pub variable_count: usize,
    /// Steps already executed before this one.
    pub previous_steps: usize,
    pub tools_available: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    pub category: TaskCategory,
    /// In [0, 1].
    pub confidence: f64,
    pub matched_signals: Vec<String>,
    pub reasoning: String,
}

// ---------------------------------------------------------------------------
// Compiled patterns (Lazy statics)
// ---------------------------------------------------------------------------

fn compile_patterns(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).unwrap_or_else(|e| panic!("Bad regex pattern `{p}`: {e}")))
        .collect()
}

fn compile_keywords(keywords: &[&'static str]) -> Vec<(&'static str, Regex)> {
    keywords
        .iter()
        .map(|kw| {
            let pattern = format!(r"(?i)\b{}\b", regex::escape(kw));
            let re = Regex::new(&pattern)
                .unwrap_or_else(|e| panic!("Bad keyword pattern `{pattern}`: {e}"));
            (*kw, re)
        })
        .collect()
}

fn keywords_for(category: TaskCategory) -> &'static [&'static str] {
    match category {
        TaskCategory::StructuredOutput => &[
            "json", "schema", "yaml", "csv", "xml", "structured", "extract", "parse", "fields",
        ],
        TaskCategory::CodeGeneration => &[
            "code", "function", "implement", "refactor", "debug", "class", "compile", "bug",
            "python", "rust", "typescript", "javascript",
        ],
        TaskCategory::CreativeWriting => &[
            "story", "poem", "creative", "fiction", "narrative", "character", "lyrics", "novel",
            "screenplay", "haiku",
        ],
        TaskCategory::ComplexReasoning => &[
            "analyze", "reason", "reasoning", "evaluate", "compare", "strategy", "implications",
            "tradeoff", "tradeoffs", "justify",
        ],
        TaskCategory::ToolExecution => &[
            "api", "endpoint", "webhook", "http", "request", "execute", "invoke", "fetch", "tool",
        ],
        TaskCategory::DataAnalysis => &[
            "data", "dataset", "statistics", "trend", "chart", "metrics", "correlation",
            "spreadsheet", "table",
        ],
        TaskCategory::MathReasoning => &[
            "calculate", "equation", "solve", "math", "integral", "derivative", "probability",
            "proof", "algebra",
        ],
        TaskCategory::Conversational => &["hello", "hi", "hey", "thanks", "thank", "chat", "talk"],
        TaskCategory::RealtimeInfo => &[
            "latest", "news", "today", "current", "recent", "weather", "stock", "price",
        ],
        TaskCategory::Multimodal => &[
            "image", "picture", "photo", "diagram", "screenshot", "video", "audio", "visual",
        ],
        TaskCategory::SafetyCritical => &[
            "medical", "legal", "diagnosis", "medication", "dosage", "lawsuit", "safety",
            "emergency", "compliance",
        ],
        TaskCategory::CostOptimized => &["summarize", "summary", "quick", "brief", "short", "simple"],
    }
}

fn patterns_for(category: TaskCategory) -> &'static [&'static str] {
    match category {
        TaskCategory::StructuredOutput => &[
            r"(?i)\b(return|respond|output|format)\b.*\b(json|yaml|xml|csv)\b",
            r"(?i)\bkey[- ]value\b",
        ],
        TaskCategory::CodeGeneration => &[
            r"(?i)\b(write|create|generate)\b.*\b(function|class|script|program|code)\b",
            r"```",
            r"\b(fn|def|function)\s+\w+\s*\(",
        ],
        TaskCategory::CreativeWriting => &[
            r"(?i)\b(write|compose)\b.*\b(story|poem|song|haiku|essay)\b",
            r"(?i)once upon a time",
        ],
        TaskCategory::ComplexReasoning => &[
            r"(?i)\bwhy (does|do|is|would|should)\b",
            r"(?i)\bstep[- ]by[- ]step\b",
            r"(?i)\b(pros and cons|trade-offs?)\b",
        ],
        TaskCategory::ToolExecution => &[
            r"\b(GET|POST|PUT|DELETE|PATCH)\s+/",
            r"https?://",
            r"(?i)\bcall (the|an?) (api|endpoint|tool|service)\b",
        ],
        TaskCategory::DataAnalysis => &[
            r"(?i)\b(analy[sz]e|summari[sz]e)\b.*\b(data|dataset|table|numbers)\b",
            r"\d+(\.\d+)?%",
        ],
        TaskCategory::MathReasoning => &[
            r"\d+\s*[-+*/^=]\s*\d+",
            r"(?i)\bsolve for\b",
            r"(?i)\bwhat is \d+",
        ],
        TaskCategory::Conversational => &[r"(?i)^\s*(hi|hello|hey)\b", r"(?i)\bhow are you\b"],
        TaskCategory::RealtimeInfo => &[
            r"(?i)\b(what'?s|what is) (happening|the latest)\b",
            r"(?i)\b(this week|right now|as of today)\b",
        ],
        TaskCategory::Multimodal => &[
            r"(?i)\.(png|jpe?g|gif|webp|mp4|mp3|wav)\b",
            r"(?i)\b(look at|describe) (this|the) (image|picture|photo)\b",
        ],
        TaskCategory::SafetyCritical => &[
            r"(?i)\b(is it safe|side effects|legal advice|medical advice)\b",
            r"(?i)\bshould i (take|stop taking|sue)\b",
        ],
        TaskCategory::CostOptimized => &[r"(?i)\b(tl;?dr|in one sentence|briefly)\b"],
    }
}

struct CategorySignals {
    category: TaskCategory,
    keywords: Vec<(&'static str, Regex)>,
    patterns: Vec<Regex>,
}

static SIGNALS: Lazy<Vec<CategorySignals>> = Lazy::new(|| {
    TaskCategory::ALL
        .into_iter()
        .map(|category| CategorySignals {
            category,
            keywords: compile_keywords(keywords_for(category)),
            patterns: compile_patterns(patterns_for(category)),
        })
        .collect()
});

/// Map a workflow node type to the category it implies.
fn hint_category(node_type: &str) -> Option<TaskCategory> {
    let normalized = node_type.trim().to_ascii_lowercase();
    let category = match normalized.as_str() {
        "json-parser" | "json" | "parser" | "extractor" | "schema" => TaskCategory::StructuredOutput,
        "code" | "code-generator" | "script" => TaskCategory::CodeGeneration,
        "writer" | "content-generator" | "copywriter" => TaskCategory::CreativeWriting,
        "reasoning" | "planner" | "decision" => TaskCategory::ComplexReasoning,
        "http-request" | "api-call" | "webhook" | "tool" => TaskCategory::ToolExecution,
        "data-transform" | "analytics" | "spreadsheet" => TaskCategory::DataAnalysis,
        "math" | "calculator" => TaskCategory::MathReasoning,
        "chat" | "conversation" | "assistant" => TaskCategory::Conversational,
        "search" | "web-search" | "news" => TaskCategory::RealtimeInfo,
        "image" | "vision" | "ocr" => TaskCategory::Multimodal,
        "moderation" | "compliance" | "guardrail" => TaskCategory::SafetyCritical,
        "summarizer" | "classifier" => TaskCategory::CostOptimized,
        other => return other.parse().ok(),
    };
    Some(category)
}

// ---------------------------------------------------------------------------
// TaskClassifier
// ---------------------------------------------------------------------------

/// Pure, deterministic text-to-category classifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskClassifier;

impl TaskClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, text: &str, hint: Option<&ClassificationHint>) -> ClassificationResult {
        let hinted = hint
            .and_then(|h| h.node_type.as_deref())
            .and_then(hint_category);

        let mut best: Option<(TaskCategory, f64, Vec<String>)> = None;

        for signals in SIGNALS.iter() {
            let category = signals.category;
            let mut score = 0.0;
            let mut matched = Vec::new();

            for (kw, re) in &signals.keywords {
                if re.is_match(text) {
                    score += KEYWORD_WEIGHT;
                    matched.push(format!("keyword:{kw}"));
                }
            }

            for re in &signals.patterns {
                if re.is_match(text) {
                    score += PATTERN_WEIGHT;
                    matched.push(format!("pattern:{}", re.as_str()));
                }
            }

            if hinted == Some(category) {
                score += HINT_WEIGHT;
                if let Some(node) = hint.and_then(|h| h.node_type.as_deref()) {
                    matched.push(format!("hint:{node}"));
                }
            }

            if let Some(h) = hint {
                for (applies, label) in [
                    (
                        h.variable_count >= 3 && category == TaskCategory::StructuredOutput,
                        "variable_count",
                    ),
                    (
                        h.previous_steps >= 3 && category == TaskCategory::ComplexReasoning,
                        "previous_steps",
                    ),
                    (
                        h.tools_available && category == TaskCategory::ToolExecution,
                        "tools_available",
                    ),
                ] {
                    if applies {
                        score += HEURISTIC_WEIGHT;
                        matched.push(format!("heuristic:{label}"));
                    }
                }
            }

            // `>=` so that on a tie the category summed last wins.
            if score > 0.0 && best.as_ref().is_none_or(|(_, s, _)| score >= *s) {
                best = Some((category, score, matched));
            }
        }

        match best {
            Some((category, score, matched_signals)) => ClassificationResult {
                category,
                confidence: score.min(1.0),
                reasoning: format!(
                    "Classified as {category} from {} signal(s) (score {score:.2})",
                    matched_signals.len()
                ),
                matched_signals,
            },
            None => ClassificationResult {
                category: TaskCategory::CostOptimized,
                confidence: DEFAULT_CONFIDENCE,
                matched_signals: Vec::new(),
                reasoning: "No task signals matched; defaulting to cost-optimized".into(),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
