//! # Frame Sampler
//!
//! Chooses which moments of a clip get reviewed. Two strategies, picked by
//! [`SamplingMode`]:
//!
//! - **uniform**: `0, Δ, 2Δ, ...` up to the cap, with the clip's tail always covered
//! - **scene**: one sample per histogram jump, rate-limited by a minimum interval
//!
//! Whatever the strategy, the resulting [`SamplingPlan`] holds samples with strictly
//! increasing timestamps in `[0, duration)`, never more than `max_frames` of them.

mod scene;
mod uniform;

pub use scene::sample_scene_changes;
pub use uniform::{sample_uniform, uniform_timestamps};

use tracing::info;

use crate::config::{SamplingMode, SamplingOptions};
use crate::error::ReviewError;
use crate::video::VideoSource;

/// Seconds before the end at which the tail sample is taken.
pub(crate) const TAIL_OFFSET: f64 = 0.5;
/// A plan whose last sample is further than this from the end gets a tail sample.
pub(crate) const TAIL_GAP: f64 = 1.0;

/// One timestamped still selected for review.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub timestamp: f64,
    pub frame_index: u64,
    /// Encoded (JPEG) image bytes.
    pub image: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Samples in creation order.
#[derive(Debug, Clone, Default)]
pub struct SamplingPlan {
    pub samples: Vec<Sample>,
    pub duration: f64,
}

impl SamplingPlan {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn timestamps(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.timestamp).collect()
    }

    /// The sample closest in time to `timestamp`.
    pub fn nearest(&self, timestamp: f64) -> Option<&Sample> {
        self.samples.iter().min_by(|a, b| {
            (a.timestamp - timestamp)
                .abs()
                .total_cmp(&(b.timestamp - timestamp).abs())
        })
    }
}

/// Run the configured sampling strategy over `source`.
pub fn sample(source: &dyn VideoSource, opts: &SamplingOptions) -> Result<SamplingPlan, ReviewError> {
    let plan = match opts.mode {
        SamplingMode::Uniform => sample_uniform(source, opts.interval(), opts.max_frames),
        SamplingMode::Scene => {
            sample_scene_changes(source, opts.scene_threshold, opts.min_interval, opts.max_frames)?
        }
    };
    info!(
        video = %source.name(),
        mode = ?opts.mode,
        samples = plan.len(),
        duration = plan.duration,
        "sampling complete"
    );
    Ok(plan)
}

/// Where the tail sample goes, if the plan needs one.
pub(crate) fn tail_timestamp(last: Option<f64>, duration: f64) -> Option<f64> {
    match last {
        Some(last) if last < duration - TAIL_GAP => Some((duration - TAIL_OFFSET).max(0.0)),
        _ => None,
    }
}
