//! # Review
//!
//! Everything between "we have review units" and "here is the verdict":
//!
//! - [`prompt`]: per-unit instructions sent with each image
//! - [`response`]: pulling a JSON object out of free-form model text
//! - [`keywords`]: the deterministic competitor-brand safety net
//! - [`review_loop`]: the bounded, early-stopping call loop
//! - [`aggregate`]: noise filtering, deduplication and scoring

pub mod aggregate;
pub mod keywords;
pub mod prompt;
pub mod response;
pub mod review_loop;

pub use aggregate::{finalize, is_noise, penalty};
pub use keywords::KeywordMatcher;
pub use prompt::PromptBuilder;
pub use response::{extract_json_block, parse_unit_response, UnitResponse};
pub use review_loop::{ReviewLoop, ReviewUnit};

use serde::{Deserialize, Serialize};

/// How bad an issue is. Ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Read a model-supplied severity. Accepts any casing, compound answers such as
    /// `"critical/medium"` (the most severe named tier wins) and the Chinese tier names.
    /// Anything unrecognised becomes `default`.
    pub fn parse_lenient(raw: &str, default: Severity) -> Severity {
        let s = raw.trim().to_lowercase();
        if s.contains("critical") || s.contains("严重") {
            Severity::Critical
        } else if s.contains("high") || s.contains("高") {
            Severity::High
        } else if s.contains("medium") || s.contains("中") {
            Severity::Medium
        } else if s.contains("low") || s.contains("低") {
            Severity::Low
        } else {
            default
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// A finalized, timestamped compliance issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub timestamp: f64,
    pub category: String,
    pub description: String,
    pub severity: Severity,
    #[serde(default)]
    pub suggestion: String,
}

/// Where in the plan a raw issue was reported.
#[derive(Debug, Clone, PartialEq)]
pub enum IssueLocation {
    /// Index into the per-frame sample list.
    Frame(usize),
    /// The cell label as the model wrote it, in grid mode.
    Cell(String),
}

/// An issue as produced by the review loop, before filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct RawIssue {
    pub location: IssueLocation,
    /// Real sample time the location resolves to.
    pub timestamp: f64,
    pub category: String,
    pub description: String,
    pub severity: Severity,
    pub suggestion: String,
}

impl RawIssue {
    pub fn to_issue(&self) -> Issue {
        Issue {
            timestamp: self.timestamp,
            category: self.category.clone(),
            description: self.description.clone(),
            severity: self.severity,
            suggestion: self.suggestion.clone(),
        }
    }
}

/// What the review loop saw, unfiltered.
#[derive(Debug, Clone, PartialEq)]
pub struct RawVerdict {
    pub is_compliant: bool,
    /// Score over the unfiltered issues.
    pub overall_score: u32,
    pub summary: String,
    pub issues: Vec<RawIssue>,
    /// Samples covered by the plan (frames, or cells across all grids).
    pub samples_analyzed: usize,
    /// Units that got a usable answer.
    pub units_reviewed: usize,
    pub units_total: usize,
    /// Provider calls issued, failed ones included.
    pub calls: usize,
    pub stopped_early: bool,
}

/// The terminal artifact for one video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewResult {
    pub is_compliant: bool,
    pub overall_score: u32,
    pub issues: Vec<Issue>,
    pub summary: String,
    pub total_samples_analyzed: usize,
    #[serde(default)]
    pub units_reviewed: usize,
    #[serde(default)]
    pub api_calls: usize,
    /// Issues dropped as non-actionable quality noise.
    #[serde(default)]
    pub filtered_issues: usize,
}

impl ReviewResult {
    pub fn issues_by_severity(&self, severity: Severity) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(move |i| i.severity == severity)
    }

    /// Distinct issue timestamps, in first-seen order.
    pub fn issue_timestamps(&self) -> Vec<f64> {
        let mut out: Vec<f64> = Vec::new();
        for issue in &self.issues {
            if !out.iter().any(|t| (t - issue.timestamp).abs() < 1e-9) {
                out.push(issue.timestamp);
            }
        }
        out
    }
}
