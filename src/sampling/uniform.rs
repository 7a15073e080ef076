use tracing::{debug, warn};

use super::{tail_timestamp, Sample, SamplingPlan};
use crate::video::VideoSource;

/// Timestamps for fixed-cadence sampling.
///
/// Produces `0, Δ, 2Δ, ...` while below `duration` and `max_frames`. When the last one
/// lands more than a second before the end, a tail timestamp at `duration - 0.5` is
/// appended, or replaces the last entry if the cap is already reached.
pub fn uniform_timestamps(duration: f64, interval: f64, max_frames: usize) -> Vec<f64> {
    if !(duration > 0.0) || !(interval > 0.0) || max_frames == 0 {
        return Vec::new();
    }

    let mut out = Vec::new();
    let mut i = 0u64;
    loop {
        let t = i as f64 * interval;
        if t >= duration || out.len() >= max_frames {
            break;
        }
        out.push(t);
        i += 1;
    }

    if let Some(tail) = tail_timestamp(out.last().copied(), duration) {
        if out.len() < max_frames {
            out.push(tail);
        } else if let Some(last) = out.last_mut() {
            *last = tail;
        }
    }
    out
}

/// Seek-and-read each uniform timestamp. Frames that fail to decode are skipped.
pub fn sample_uniform(source: &dyn VideoSource, interval: f64, max_frames: usize) -> SamplingPlan {
    let info = source.info();
    let timestamps = uniform_timestamps(info.duration, interval, max_frames);
    debug!(planned = timestamps.len(), interval, "uniform sampling");

    let mut samples = Vec::with_capacity(timestamps.len());
    for t in timestamps {
        match source.read_at(t) {
            Ok(Some(frame)) => samples.push(Sample {
                timestamp: t,
                frame_index: (t * info.fps) as u64,
                image: frame.image,
                width: frame.width,
                height: frame.height,
            }),
            Ok(None) => warn!(timestamp = t, "no frame decoded, skipping"),
            Err(e) => warn!(timestamp = t, error = %e, "unreadable frame, skipping"),
        }
    }

    SamplingPlan {
        samples,
        duration: info.duration,
    }
}
