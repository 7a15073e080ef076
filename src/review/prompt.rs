//! Review prompts.
//!
//! Both prompts force the same two-step workflow: transcribe every visible app or brand
//! first, then judge against the rules. The transcription is what feeds the keyword
//! safety net, so it is requested even when the model finds nothing wrong.

use std::fmt::Write as _;

use frame_grid::label::format_timestamp;

use crate::config::{CheckCategory, RuleOptions};
use crate::processing::GridBatch;

const FRAME_FORMAT: &str = r#"Reply with exactly this JSON and nothing else:
```json
{
    "visible_content": ["App name (position)", "App name (position)"],
    "has_issue": false,
    "description": "what is actually on screen",
    "issues": [
        {
            "category": "issue category",
            "description": "where you saw what, and which rule it breaks",
            "severity": "low/medium/high/critical",
            "suggestion": "how to fix it"
        }
    ]
}
```"#;

const GRID_FORMAT: &str = r#"Reply with exactly this JSON and nothing else:
```json
{
    "all_visible_apps": ["App1", "App2"],
    "has_issue": false,
    "issues": [
        {
            "timestamp": "the cell label, mm:ss.cc",
            "category": "issue category",
            "description": "which cell, what you saw, and which rule it breaks",
            "severity": "low/medium/high/critical",
            "suggestion": "how to fix it"
        }
    ]
}
```"#;

/// Renders per-unit prompts from the configured rules.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    rules: String,
}

impl PromptBuilder {
    pub fn new(rules: &RuleOptions) -> Self {
        Self {
            rules: render_rules(rules),
        }
    }

    /// Prompt for a single frame at `timestamp` seconds.
    pub fn frame(&self, timestamp: f64) -> String {
        let tenths = (timestamp.max(0.0) * 10.0).round() as u64;
        let (minutes, seconds) = (tenths / 600, (tenths % 600) as f64 / 10.0);
        format!(
            "This is the frame at {minutes}m{seconds:.1}s of the video.\n\n\
             You are a meticulous video compliance reviewer.\n\n\
             [Rules]\n{rules}\n\
             [Instructions]\n\
             1. Transcription: list every app name, brand or logo that is really visible \
             in the frame, with its rough position (top left, center, bottom right...). \
             Do not guess or invent anything.\n\
             2. Verdict: judge the transcription against the rules. Competitor brands are \
             critical. Set has_issue to true only when a rule is broken.\n\n\
             {FRAME_FORMAT}",
            rules = self.rules,
        )
    }

    /// Prompt for one composite grid.
    pub fn grid(&self, batch: &GridBatch) -> String {
        let first = batch.timestamps.first().copied().unwrap_or(0.0);
        format!(
            "This is a {cols}x{cols} grid of {n} {frames} from the video, covering {range}.\n\n\
             You are a meticulous video compliance reviewer.\n\n\
             Every cell carries its timestamp in the top-left corner. Check every cell, \
             including corners, search result lists and app store recommendations.\n\n\
             [Rules]\n{rules}\n\
             [Required workflow]\n\
             1. Transcription: for every cell, write down each app name, brand or icon you \
             can see, e.g. \"cell [{example}]: Widgetsmith icon, TikTok icon\".\n\
             2. Verdict: judge the transcription against the rules. Report the label of the \
             cell where each issue appears in its timestamp field.\n\n\
             {GRID_FORMAT}",
            cols = batch.cols,
            n = batch.timestamps.len(),
            frames = if batch.timestamps.len() == 1 { "frame" } else { "frames" },
            range = batch.time_range(),
            rules = self.rules,
            example = format_timestamp(first),
        )
    }
}

fn render_rules(rules: &RuleOptions) -> String {
    let mut out = String::new();
    let sections: [(&str, &CheckCategory); 3] = [
        ("Content compliance", &rules.content_compliance),
        ("Brand relevance", &rules.brand_relevance),
        ("Video quality", &rules.video_quality),
    ];
    for (title, category) in sections {
        if !category.enabled || category.check_items.is_empty() {
            continue;
        }
        let _ = writeln!(out, "{title}:");
        for item in &category.check_items {
            let _ = writeln!(out, "- {item}");
        }
    }
    if !rules.competitor_keywords.is_empty() {
        let _ = writeln!(
            out,
            "Blocklisted competitor brands (always critical): {}",
            rules.competitor_keywords.join(", ")
        );
    }
    let custom = rules.custom_rules.trim();
    if !custom.is_empty() {
        let _ = writeln!(out, "Additional rules:\n{custom}");
    }
    out
}
