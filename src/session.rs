//! # Review Session
//!
//! Runs the pipeline over a queue of videos, one after another, and writes the
//! artifacts a human reviewer needs: an annotated screenshot per issue timestamp and a
//! JSON report per video.
//!
//! Each video ends in exactly one [`VideoOutcome`]:
//!
//! - `Reviewed`: a verdict was reached (compliant or not)
//! - `Undetermined`: the review could not finish (provider refused, error budget spent,
//!   nothing to sample)
//! - `Skipped`: the file was never reviewed (unsupported type, unreadable)
//!
//! The provider client is built before the session exists, so a run with bad
//! credentials fails before any video is touched.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use frame_grid::label::{draw_label, format_timestamp, scale_for_width, tint_band};
use frame_grid::presets::Size;
use image::RgbImage;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::ReviewConfig;
use crate::error::{classify, HasRecoverySuggestion, ReviewError};
use crate::review::ReviewResult;
use crate::sampling::SamplingPlan;
use crate::video::{is_supported_video, FfmpegSource, VideoSource};
use crate::vision::VisionClient;

/// Opens a path as a video source.
pub type SourceOpener = Box<dyn Fn(&Path) -> Result<Box<dyn VideoSource>, ReviewError>>;

const BAND_COLOR: [u8; 3] = [220, 30, 30];
const BAND_ALPHA: f32 = 0.35;

/// How one video's review ended.
#[derive(Debug, Clone)]
pub enum VideoOutcome {
    Reviewed {
        result: ReviewResult,
        /// `(timestamp, screenshot path)` per distinct issue time.
        screenshots: Vec<(f64, PathBuf)>,
        report: Option<PathBuf>,
    },
    Undetermined {
        reason: String,
    },
    Skipped {
        reason: String,
    },
}

/// Outcome for one input path.
#[derive(Debug, Clone)]
pub struct VideoReport {
    pub path: PathBuf,
    pub outcome: VideoOutcome,
}

/// Sequential multi-video review.
pub struct ReviewSession {
    config: ReviewConfig,
    client: Box<dyn VisionClient>,
    opener: SourceOpener,
    write_artifacts: bool,
}

impl ReviewSession {
    pub fn builder() -> ReviewSessionBuilder {
        ReviewSessionBuilder::default()
    }

    pub fn config(&self) -> &ReviewConfig {
        &self.config
    }

    /// Review every video in `inputs`. Directories contribute their supported video
    /// files, sorted by name.
    pub fn run(&self, inputs: &[PathBuf]) -> Vec<VideoReport> {
        let queue = expand_inputs(inputs);
        info!(videos = queue.len(), "review session started");

        let reports: Vec<VideoReport> = queue
            .into_iter()
            .enumerate()
            .map(|(n, path)| {
                info!(video = %path.display(), position = n + 1, "reviewing");
                let outcome = self.review_one(&path);
                VideoReport { path, outcome }
            })
            .collect();

        let reviewed = reports
            .iter()
            .filter(|r| matches!(r.outcome, VideoOutcome::Reviewed { .. }))
            .count();
        info!(total = reports.len(), reviewed, "review session finished");
        reports
    }

    fn review_one(&self, path: &Path) -> VideoOutcome {
        if !is_supported_video(path) {
            warn!(video = %path.display(), "unsupported file type, skipping");
            return VideoOutcome::Skipped {
                reason: "unsupported file type".to_string(),
            };
        }
        let source = match (self.opener)(path) {
            Ok(source) => source,
            Err(e) => {
                warn!(video = %path.display(), error = %e, "could not open video, skipping");
                return VideoOutcome::Skipped { reason: e.to_string() };
            }
        };

        match crate::review_video(source.as_ref(), &self.config, self.client.as_ref()) {
            Ok(review) => {
                let (screenshots, report) = if self.write_artifacts {
                    let screenshots = self.save_screenshots(path, &review.result, &review.plan);
                    let report = self.save_report(path, &review.result, &screenshots);
                    (screenshots, report)
                } else {
                    (Vec::new(), None)
                };
                VideoOutcome::Reviewed {
                    result: review.result,
                    screenshots,
                    report,
                }
            }
            Err(e) if classify::is_undetermined(&e) => {
                error!(
                    video = %path.display(),
                    error = %e,
                    hint = e.recovery_suggestion().unwrap_or(""),
                    "compliance undetermined"
                );
                VideoOutcome::Undetermined { reason: e.to_string() }
            }
            Err(e) => {
                warn!(video = %path.display(), category = e.category(), error = %e, "review failed, skipping");
                VideoOutcome::Skipped { reason: e.to_string() }
            }
        }
    }

    fn save_screenshots(&self, video: &Path, result: &ReviewResult, plan: &SamplingPlan) -> Vec<(f64, PathBuf)> {
        let timestamps = result.issue_timestamps();
        if timestamps.is_empty() {
            return Vec::new();
        }
        let dir = PathBuf::from(&self.config.paths.screenshots);
        if let Err(e) = fs::create_dir_all(&dir) {
            warn!(dir = %dir.display(), error = %e, "cannot create screenshot directory");
            return Vec::new();
        }

        let stem = file_stem(video);
        let mut saved = Vec::new();
        for t in timestamps {
            let Some(sample) = plan.nearest(t) else { continue };
            let out = dir.join(format!("{stem}_{}.jpg", format_timestamp(t).replace([':', '.'], "-")));
            match annotate_screenshot(&sample.image, t).and_then(|img| {
                img.save(&out).map_err(ReviewError::from)
            }) {
                Ok(()) => saved.push((t, out)),
                Err(e) => warn!(timestamp = t, error = %e, "screenshot not saved"),
            }
        }
        saved
    }

    fn save_report(&self, video: &Path, result: &ReviewResult, screenshots: &[(f64, PathBuf)]) -> Option<PathBuf> {
        let dir = PathBuf::from(&self.config.paths.reports);
        let out = dir.join(format!("{}_review.json", file_stem(video)));
        let report = ReportFile {
            video: video.display().to_string(),
            model: self.client.model(),
            result,
            screenshots: screenshots
                .iter()
                .map(|(t, p)| (format!("{t:.2}"), p.display().to_string()))
                .collect(),
        };
        let written = fs::create_dir_all(&dir)
            .map_err(|e| ReviewError::io("creating report directory", e))
            .and_then(|()| serde_json::to_string_pretty(&report).map_err(ReviewError::from))
            .and_then(|json| fs::write(&out, json).map_err(|e| ReviewError::io("writing report", e)));
        match written {
            Ok(()) => Some(out),
            Err(e) => {
                warn!(report = %out.display(), error = %e, "report not saved");
                None
            }
        }
    }
}

#[derive(Serialize)]
struct ReportFile<'a> {
    video: String,
    model: &'a str,
    result: &'a ReviewResult,
    screenshots: BTreeMap<String, String>,
}

/// Builder for [`ReviewSession`].
#[derive(Default)]
pub struct ReviewSessionBuilder {
    config: Option<ReviewConfig>,
    client: Option<Box<dyn VisionClient>>,
    opener: Option<SourceOpener>,
    write_artifacts: Option<bool>,
}

impl ReviewSessionBuilder {
    pub fn config(mut self, config: ReviewConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn client(mut self, client: Box<dyn VisionClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// Replace the ffmpeg-backed opener.
    pub fn source_opener(mut self, opener: SourceOpener) -> Self {
        self.opener = Some(opener);
        self
    }

    /// Write screenshots and JSON reports (on by default).
    pub fn write_artifacts(mut self, enabled: bool) -> Self {
        self.write_artifacts = Some(enabled);
        self
    }

    pub fn build(self) -> Result<ReviewSession, ReviewError> {
        let config = self.config.unwrap_or_default();
        config.validate().map_err(|reason| ReviewError::config("session", reason))?;
        let client = self
            .client
            .ok_or_else(|| ReviewError::client_init(config.provider.kind.name(), "no vision client configured"))?;
        let opener: SourceOpener = match self.opener {
            Some(opener) => opener,
            None => Box::new(|path: &Path| FfmpegSource::open(path).map(|s| Box::new(s) as Box<dyn VideoSource>)),
        };
        Ok(ReviewSession {
            config,
            client,
            opener,
            write_artifacts: self.write_artifacts.unwrap_or(true),
        })
    }
}

/// Files first-level under directories, plus plain file arguments, in order.
pub fn expand_inputs(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut out = Vec::new();
    for input in inputs {
        if !input.is_dir() {
            out.push(input.clone());
            continue;
        }
        match fs::read_dir(input) {
            Ok(entries) => {
                let mut files: Vec<PathBuf> = entries
                    .filter_map(|e| e.ok().map(|e| e.path()))
                    .filter(|p| p.is_file() && is_supported_video(p))
                    .collect();
                files.sort();
                out.extend(files);
            }
            Err(e) => warn!(dir = %input.display(), error = %e, "cannot list directory"),
        }
    }
    out
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "video".to_string())
}

/// Decode a sample and mark it: translucent red band across the top, timestamp on it.
pub fn annotate_screenshot(jpeg: &[u8], timestamp: f64) -> Result<RgbImage, ReviewError> {
    let mut img = image::load_from_memory(jpeg)?.to_rgb8();
    let size = Size {
        w: img.width(),
        h: img.height(),
    };
    let band_h = ((size.h as f32 * 0.12) as u32).max(30).min(size.h);
    let scale = scale_for_width(size.w);
    let buf: &mut [u8] = &mut img;
    tint_band(buf, size, band_h, BAND_COLOR, BAND_ALPHA);
    draw_label(buf, size, 8, 8, &format_timestamp(timestamp), scale);
    Ok(img)
}
