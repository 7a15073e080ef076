//! # Clip Review Library
//!
//! Automated compliance review for short video clips. A clip is sampled, the samples
//! are sent to a vision model (one by one, or packed into labelled grids), and the
//! model's per-unit answers are folded into one auditable verdict with a 0-100 score
//! and timestamped issues.
//!
//! ## Architecture
//!
//! Data flows strictly left to right; only the review loop performs network I/O.
//!
//! ```text
//! video ─► sampling ─► processing ─► review loop ─► aggregate ─► ReviewResult
//!          (uniform/    (bisection     (provider      (noise filter,
//!           scene)       order, or      calls, early   dedupe, score)
//!                        grids)         stop, budget)
//! ```
//!
//! - `video`: decode-provider trait, histogram math, ffmpeg implementation
//! - `sampling`: uniform and scene-change samplers
//! - `processing`: adaptive visit order and grid batching
//! - `vision`: the vision-model seam and the OpenAI-compatible client
//! - `review`: prompts, reply parsing, keyword safety net, loop, scoring
//! - `session`: multi-video runs, screenshots, JSON reports
//! - `config`: TOML-backed options
//! - `error`: error taxonomy and classification traits
//!
//! ## Example
//!
//! ```rust,no_run
//! use clip_review::config::ReviewConfig;
//! use clip_review::video::FfmpegSource;
//! use clip_review::vision::ChatCompletionsClient;
//!
//! # fn example() -> Result<(), clip_review::ReviewError> {
//! let config = ReviewConfig::load_from_file("review.toml")?;
//! let client = ChatCompletionsClient::from_options(&config.provider)?;
//! let video = FfmpegSource::open("promo.mp4")?;
//!
//! let review = clip_review::review_video(&video, &config, &client)?;
//! println!("{} ({}/100)", review.result.summary, review.result.overall_score);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod processing;
pub mod review;
pub mod sampling;
pub mod session;
pub mod video;
pub mod vision;

pub use error::{ErrorClass, HasRecoverySuggestion, HasSeverity, ReviewError, Retryable, VisionError};
pub use review::{Issue, RawVerdict, ReviewResult, Severity};

use tracing::info;

use crate::config::ReviewConfig;
use crate::processing::{reorder, GridBatch, GridBatcher};
use crate::review::review_loop::{frame_units, grid_units, ReviewUnit};
use crate::review::{finalize, ReviewLoop};
use crate::sampling::{Sample, SamplingPlan};
use crate::video::VideoSource;
use crate::vision::VisionClient;

/// Everything produced while reviewing one video.
#[derive(Debug, Clone)]
pub struct VideoReview {
    pub result: ReviewResult,
    pub raw: RawVerdict,
    /// The samples the verdict was based on, kept for screenshots.
    pub plan: SamplingPlan,
}

/// Sample, batch or order, review, and score one video.
///
/// # Errors
/// Fails with [`ReviewError::NoSamples`] when nothing could be sampled, and with the
/// review loop's abort errors when the provider could not be used. Both mean the
/// video's compliance is undetermined.
pub fn review_video(
    source: &dyn VideoSource,
    config: &ReviewConfig,
    client: &dyn VisionClient,
) -> Result<VideoReview, ReviewError> {
    let plan = sampling::sample(source, &config.sampling)?;
    if plan.is_empty() {
        return Err(ReviewError::NoSamples { path: source.name() });
    }
    let review_loop = ReviewLoop::new(client, config);

    let raw = if config.grid.enabled {
        let batches = GridBatcher::new(&config.grid).batch(&plan.samples);
        if batches.is_empty() {
            return Err(ReviewError::NoSamples { path: source.name() });
        }
        info!(video = %source.name(), grids = batches.len(), "reviewing grids");
        review_loop.run(&grid_units(&batches))?
    } else {
        let order = reorder(plan.len());
        info!(video = %source.name(), frames = order.len(), "reviewing frames");
        review_loop.run(&frame_units(&plan.samples, &order))?
    };

    let result = finalize(&raw, &config.scoring);
    info!(
        video = %source.name(),
        compliant = result.is_compliant,
        score = result.overall_score,
        issues = result.issues.len(),
        "verdict"
    );
    Ok(VideoReview { result, raw, plan })
}

/// Review one still image. With `as_grid`, the image is treated as an already
/// composed grid and gets the grid prompt. Its layout is unknown, so it is described
/// as a single cell.
pub fn review_image(
    image: Vec<u8>,
    as_grid: bool,
    config: &ReviewConfig,
    client: &dyn VisionClient,
) -> Result<ReviewResult, ReviewError> {
    let decoded = image::load_from_memory(&image)?;
    let (width, height) = (decoded.width(), decoded.height());
    let review_loop = ReviewLoop::new(client, config);

    let raw = if as_grid {
        let batch = GridBatch {
            image,
            timestamps: vec![0.0],
            cols: 1,
            width,
            height,
        };
        review_loop.run(&[ReviewUnit::Grid { index: 0, batch: &batch }])?
    } else {
        let sample = Sample {
            timestamp: 0.0,
            frame_index: 0,
            image,
            width,
            height,
        };
        review_loop.run(&[ReviewUnit::Frame { index: 0, sample: &sample }])?
    };
    Ok(finalize(&raw, &config.scoring))
}
