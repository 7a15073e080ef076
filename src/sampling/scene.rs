use tracing::{debug, warn};

use super::{tail_timestamp, Sample, SamplingPlan};
use crate::error::ReviewError;
use crate::video::VideoSource;

/// Scan every frame and keep the ones where the picture changes.
///
/// A frame is kept when its histogram distance to the previous decoded frame exceeds
/// `threshold` (any frame, when `threshold <= 0`) and at least `min_interval` seconds
/// worth of frames have passed since the last kept one. The first frame is always kept.
/// Frames that fail to decode are skipped and do not become the comparison baseline.
pub fn sample_scene_changes(
    source: &dyn VideoSource,
    threshold: f64,
    min_interval: f64,
    max_frames: usize,
) -> Result<SamplingPlan, ReviewError> {
    let info = source.info().clone();
    let mut plan = SamplingPlan {
        samples: Vec::new(),
        duration: info.duration,
    };
    if max_frames == 0 {
        return Ok(plan);
    }

    let min_gap = (min_interval.max(0.0) * info.fps) as u64;
    let mut prev_hist: Option<Vec<f64>> = None;
    let mut last_kept: Option<u64> = None;
    let mut scanned = 0u64;

    for item in source.frames()? {
        let frame = match item {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "unreadable frame during scene scan, skipping");
                continue;
            }
        };
        if info.duration > 0.0 && frame.timestamp >= info.duration {
            break;
        }
        scanned += 1;

        let hist = source.histogram(&frame);
        let keep = match (&prev_hist, last_kept) {
            (None, _) | (_, None) => true,
            (Some(prev), Some(last)) => {
                let changed = threshold <= 0.0 || source.histogram_distance(prev, &hist) > threshold;
                changed && frame.index.saturating_sub(last) >= min_gap
            }
        };
        prev_hist = Some(hist);

        if !keep {
            continue;
        }
        let encoded = match frame.encode() {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!(timestamp = frame.timestamp, error = %e, "could not encode scene frame, skipping");
                continue;
            }
        };
        plan.samples.push(Sample {
            timestamp: frame.timestamp,
            frame_index: frame.index,
            image: encoded.image,
            width: encoded.width,
            height: encoded.height,
        });
        last_kept = Some(frame.index);

        if plan.samples.len() >= max_frames {
            break;
        }
    }
    debug!(scanned, kept = plan.len(), threshold, min_interval, "scene scan finished");

    if plan.samples.len() < max_frames {
        let last = plan.samples.last().map(|s| s.timestamp);
        if let Some(tail) = tail_timestamp(last, info.duration) {
            match source.read_at(tail) {
                Ok(Some(frame)) => plan.samples.push(Sample {
                    timestamp: tail,
                    frame_index: (tail * info.fps) as u64,
                    image: frame.image,
                    width: frame.width,
                    height: frame.height,
                }),
                Ok(None) => warn!(timestamp = tail, "tail frame missing"),
                Err(e) => warn!(timestamp = tail, error = %e, "tail frame unreadable"),
            }
        }
    }

    Ok(plan)
}
