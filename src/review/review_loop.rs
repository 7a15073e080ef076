//! The review loop: one provider call per unit, in visit order, until something is found
//! or the provider gives out.
//!
//! Per unit:
//!
//! 1. render the frame or grid prompt and call the provider
//! 2. pull a JSON object out of the reply; an unparsable reply counts as "nothing seen"
//! 3. take the model's issues if it reported any, otherwise run the keyword safety net
//!    over its transcription
//! 4. stop at the first unit that produced an issue
//!
//! Provider failures split in two. Rejections (bad credentials, bad request) end the
//! video at once. Transient failures (network, timeout, 5xx, 429) are counted, and
//! `max_consecutive_errors` of them in a row end the video. Any answered call resets
//! the count. Both endings are errors, never an empty verdict, so "could not determine"
//! stays distinguishable from "found nothing".

use tracing::{debug, error, info, warn};

use super::keywords::KeywordMatcher;
use super::prompt::PromptBuilder;
use super::response::{parse_unit_response, UnitResponse};
use super::{aggregate, IssueLocation, RawIssue, RawVerdict, Severity};
use crate::config::ReviewConfig;
use crate::error::{HasSeverity, ReviewError};
use crate::processing::GridBatch;
use crate::sampling::Sample;
use crate::vision::VisionClient;

/// Category used for keyword-injected issues.
pub const BRAND_EXPOSURE: &str = "brand exposure";

/// One provider call's worth of input.
#[derive(Debug, Clone, Copy)]
pub enum ReviewUnit<'a> {
    /// A single sample; `index` is its position in the sampling plan.
    Frame { index: usize, sample: &'a Sample },
    /// A composite grid; `index` is its position among the grids.
    Grid { index: usize, batch: &'a GridBatch },
}

impl<'a> ReviewUnit<'a> {
    pub fn image(&self) -> &'a [u8] {
        match self {
            Self::Frame { sample, .. } => &sample.image,
            Self::Grid { batch, .. } => &batch.image,
        }
    }

    /// Number of samples this unit covers.
    pub fn sample_count(&self) -> usize {
        match self {
            Self::Frame { .. } => 1,
            Self::Grid { batch, .. } => batch.timestamps.len(),
        }
    }

    /// Short name for logs, e.g. `frame 4 @ 12.00s` or `grid 2 (16.0s ~ 31.0s)`.
    pub fn describe(&self) -> String {
        match self {
            Self::Frame { index, sample } => format!("frame {index} @ {:.2}s", sample.timestamp),
            Self::Grid { index, batch } => format!("grid {index} ({})", batch.time_range()),
        }
    }

    /// Time used when an issue cannot be pinned more precisely.
    fn anchor_timestamp(&self) -> f64 {
        match self {
            Self::Frame { sample, .. } => sample.timestamp,
            Self::Grid { batch, .. } => batch.timestamps.first().copied().unwrap_or(0.0),
        }
    }

    fn default_location(&self) -> IssueLocation {
        match self {
            Self::Frame { index, .. } => IssueLocation::Frame(*index),
            Self::Grid { batch, .. } => IssueLocation::Cell(
                batch
                    .timestamps
                    .first()
                    .map(|t| frame_grid::label::format_timestamp(*t))
                    .unwrap_or_default(),
            ),
        }
    }
}

/// Per-frame units in the given visit order. Out-of-range indices are ignored.
pub fn frame_units<'a>(samples: &'a [Sample], order: &[usize]) -> Vec<ReviewUnit<'a>> {
    order
        .iter()
        .filter_map(|&index| samples.get(index).map(|sample| ReviewUnit::Frame { index, sample }))
        .collect()
}

/// Grid units in creation order.
pub fn grid_units(batches: &[GridBatch]) -> Vec<ReviewUnit<'_>> {
    batches
        .iter()
        .enumerate()
        .map(|(index, batch)| ReviewUnit::Grid { index, batch })
        .collect()
}

/// Accumulators for one run, local to [`ReviewLoop::run`].
#[derive(Debug, Default)]
struct LoopState {
    calls: usize,
    consecutive_errors: u32,
    reviewed: usize,
    issues: Vec<RawIssue>,
    stopped_early: bool,
}

/// Drives provider calls over review units.
pub struct ReviewLoop<'c> {
    client: &'c dyn VisionClient,
    prompts: PromptBuilder,
    keywords: KeywordMatcher,
    weights: crate::config::SeverityWeights,
    max_consecutive_errors: u32,
    stop_on_first_violation: bool,
}

impl<'c> ReviewLoop<'c> {
    pub fn new(client: &'c dyn VisionClient, config: &ReviewConfig) -> Self {
        Self {
            client,
            prompts: PromptBuilder::new(&config.rules),
            keywords: KeywordMatcher::new(&config.rules.competitor_keywords),
            weights: config.scoring,
            max_consecutive_errors: config.review.max_consecutive_errors.max(1),
            stop_on_first_violation: config.review.stop_on_first_violation,
        }
    }

    /// Review `units` in order.
    ///
    /// # Errors
    /// [`ReviewError::ProviderRejected`] when the provider refuses a request outright,
    /// [`ReviewError::ErrorBudgetExhausted`] after too many transient failures in a row.
    pub fn run(&self, units: &[ReviewUnit<'_>]) -> Result<RawVerdict, ReviewError> {
        let mut state = LoopState::default();
        info!(units = units.len(), model = self.client.model(), "review started");

        for (position, unit) in units.iter().enumerate() {
            let prompt = match unit {
                ReviewUnit::Frame { sample, .. } => self.prompts.frame(sample.timestamp),
                ReviewUnit::Grid { batch, .. } => self.prompts.grid(batch),
            };

            state.calls += 1;
            let reply = match self.client.complete(&prompt, unit.image()) {
                Ok(reply) => reply,
                Err(e) if !e.is_transient() => {
                    error!(unit = %unit.describe(), calls = state.calls, error = %e, "provider rejected request, aborting");
                    return Err(ReviewError::ProviderRejected {
                        status: e.status(),
                        reason: e.to_string(),
                    });
                }
                Err(e) => {
                    state.consecutive_errors += 1;
                    warn!(
                        unit = %unit.describe(),
                        consecutive_errors = state.consecutive_errors,
                        error = %e,
                        "provider call failed"
                    );
                    if state.consecutive_errors >= self.max_consecutive_errors {
                        error!(calls = state.calls, consecutive_errors = state.consecutive_errors, "error budget exhausted, aborting");
                        return Err(ReviewError::ErrorBudgetExhausted {
                            consecutive: state.consecutive_errors,
                            calls: state.calls,
                            last: e.to_string(),
                        });
                    }
                    continue;
                }
            };
            state.consecutive_errors = 0;
            state.reviewed += 1;

            let found = match parse_unit_response(&reply) {
                Ok(parsed) => self.unit_issues(unit, &parsed),
                Err(e) => {
                    let err = ReviewError::MalformedResponse {
                        unit: unit.describe(),
                        reason: e.to_string(),
                    };
                    warn!(error = %err, severity = ?err.severity(), "treating reply as no issue");
                    Vec::new()
                }
            };
            debug!(unit = %unit.describe(), issues = found.len(), "unit reviewed");

            if !found.is_empty() {
                state.issues.extend(found);
                if self.stop_on_first_violation {
                    state.stopped_early = position + 1 < units.len();
                    info!(unit = %unit.describe(), calls = state.calls, "violation found, stopping early");
                    break;
                }
            }
        }

        Ok(self.verdict(state, units))
    }

    /// Issues for one answered unit. The keyword net only runs when the model itself
    /// reported nothing usable.
    fn unit_issues(&self, unit: &ReviewUnit<'_>, parsed: &UnitResponse) -> Vec<RawIssue> {
        if parsed.reports_issue() {
            let default_severity = match unit {
                ReviewUnit::Frame { .. } => Severity::Low,
                ReviewUnit::Grid { .. } => Severity::Medium,
            };
            return parsed
                .issues
                .iter()
                .map(|issue| {
                    let (location, timestamp) = match unit {
                        ReviewUnit::Frame { index, sample } => (IssueLocation::Frame(*index), sample.timestamp),
                        ReviewUnit::Grid { batch, .. } => {
                            let label = issue.timestamp_label().unwrap_or_default();
                            let timestamp = batch.resolve_timestamp(&label);
                            (IssueLocation::Cell(label), timestamp)
                        }
                    };
                    RawIssue {
                        location,
                        timestamp,
                        category: issue
                            .category
                            .clone()
                            .filter(|c| !c.trim().is_empty())
                            .unwrap_or_else(|| "uncategorized".to_string()),
                        description: issue.description.clone().unwrap_or_default(),
                        severity: issue
                            .severity
                            .as_deref()
                            .map(|s| Severity::parse_lenient(s, default_severity))
                            .unwrap_or(default_severity),
                        suggestion: issue.suggestion.clone().unwrap_or_default(),
                    }
                })
                .collect();
        }

        let visible = parsed.visible_strings();
        match self.keywords.first_hit(&visible) {
            Some(hit) => {
                info!(unit = %unit.describe(), keyword = hit, "competitor keyword in transcription");
                vec![RawIssue {
                    location: unit.default_location(),
                    timestamp: unit.anchor_timestamp(),
                    category: BRAND_EXPOSURE.to_string(),
                    description: format!("competitor keyword detected: {hit}"),
                    severity: Severity::Critical,
                    suggestion: "Remove or cover the competitor brand before publishing.".to_string(),
                }]
            }
            None => Vec::new(),
        }
    }

    fn verdict(&self, state: LoopState, units: &[ReviewUnit<'_>]) -> RawVerdict {
        let samples_analyzed = units.iter().map(ReviewUnit::sample_count).sum();
        let overall_score = aggregate::score(aggregate::penalty(state.issues.iter().map(|i| i.severity), &self.weights));
        let summary = format!(
            "{} raw issue(s) from {} of {} units ({} calls)",
            state.issues.len(),
            state.reviewed,
            units.len(),
            state.calls
        );
        info!(
            reviewed = state.reviewed,
            calls = state.calls,
            issues = state.issues.len(),
            stopped_early = state.stopped_early,
            "review finished"
        );
        RawVerdict {
            is_compliant: state.issues.is_empty(),
            overall_score,
            summary,
            issues: state.issues,
            samples_analyzed,
            units_reviewed: state.reviewed,
            units_total: units.len(),
            calls: state.calls,
            stopped_early: state.stopped_early,
        }
    }
}
