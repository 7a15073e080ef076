//! Aggregation and scoring.
//!
//! `finalize` turns the loop's raw issues into the published result:
//!
//! 1. drop quality noise (blur, jitter, low resolution...), which is not a compliance
//!    matter
//! 2. drop exact duplicates (same time, category and description)
//! 3. `score = max(0, 100 - Σ weight(severity))`
//! 4. compliant iff nothing survived

use tracing::debug;

use super::{Issue, RawVerdict, ReviewResult, Severity};
use crate::config::SeverityWeights;

/// Terms that mark an issue as image-quality noise when its severity is medium.
const NOISE_TERMS: &[&str] = &[
    "blur",
    "quality",
    "jitter",
    "shaky",
    "low resolution",
    "模糊",
    "糊",
    "低清晰度",
    "抖动",
    "画面质量",
];

/// Quality categories are always noise; other medium issues are noise when they talk
/// about blur or similar.
pub fn is_noise(category: &str, description: &str, severity: Severity) -> bool {
    let category = category.to_lowercase();
    let description = description.to_lowercase();
    if category.contains("quality") || category.contains("质量") {
        return true;
    }
    severity == Severity::Medium
        && NOISE_TERMS
            .iter()
            .any(|term| category.contains(term) || description.contains(term))
}

/// Total penalty for a set of severities.
pub fn penalty<I>(severities: I, weights: &SeverityWeights) -> u32
where
    I: IntoIterator<Item = Severity>,
{
    severities
        .into_iter()
        .map(|s| weights.weight(s))
        .fold(0u32, u32::saturating_add)
}

/// `max(0, 100 - penalty)`
pub fn score(penalty: u32) -> u32 {
    100u32.saturating_sub(penalty)
}

fn same_issue(a: &Issue, b: &Issue) -> bool {
    (a.timestamp - b.timestamp).abs() < 1e-6
        && a.severity == b.severity
        && a.category.trim().eq_ignore_ascii_case(b.category.trim())
        && a.description.trim().eq_ignore_ascii_case(b.description.trim())
}

/// Remove repeats, keeping the first occurrence.
pub fn dedupe(issues: Vec<Issue>) -> Vec<Issue> {
    let mut out: Vec<Issue> = Vec::with_capacity(issues.len());
    for issue in issues {
        if !out.iter().any(|kept| same_issue(kept, &issue)) {
            out.push(issue);
        }
    }
    out
}

fn summarize(samples: usize, units: usize, issues: usize) -> String {
    if issues == 0 {
        format!("Review passed: analyzed {samples} samples in {units} review units, no issues found.")
    } else {
        format!("Review found {issues} issue(s) across {samples} analyzed samples; changes required.")
    }
}

/// Filter, deduplicate and score a raw verdict.
pub fn finalize(raw: &RawVerdict, weights: &SeverityWeights) -> ReviewResult {
    let total = raw.issues.len();
    let kept: Vec<Issue> = raw
        .issues
        .iter()
        .filter(|i| !is_noise(&i.category, &i.description, i.severity))
        .map(|i| i.to_issue())
        .collect();
    let filtered_issues = total - kept.len();
    let issues = dedupe(kept);

    let overall_score = score(penalty(issues.iter().map(|i| i.severity), weights));
    let is_compliant = issues.is_empty();
    debug!(
        raw = total,
        filtered = filtered_issues,
        kept = issues.len(),
        overall_score,
        "verdict finalized"
    );

    ReviewResult {
        is_compliant,
        overall_score,
        summary: summarize(raw.samples_analyzed, raw.units_reviewed, issues.len()),
        issues,
        total_samples_analyzed: raw.samples_analyzed,
        units_reviewed: raw.units_reviewed,
        api_calls: raw.calls,
        filtered_issues,
    }
}
