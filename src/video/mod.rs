//! # Video Decode Provider
//!
//! The review pipeline never decodes video itself. It talks to a [`VideoSource`], which
//! can describe the clip, seek to a timestamp and hand back one encoded still, and stream
//! every decoded frame for the scene-change scan.
//!
//! [`FfmpegSource`] is the production implementation; tests plug in synthetic sources.
//!
//! Histogram math lives here too, because both the scene sampler and any alternative
//! provider need the same definition of "how different are two frames":
//!
//! - [`gray_histogram`]: 256 bins of BT.601 luma, L2-normalised
//! - [`chi_square`]: `Σ (a - b)² / a` over bins where `a > 0`

mod ffmpeg;

pub use ffmpeg::{is_supported_video, FfmpegSource, SUPPORTED_EXTENSIONS};

use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;

use crate::error::ReviewError;

/// JPEG quality used for stills handed to the review loop.
pub const SAMPLE_JPEG_QUALITY: u8 = 85;

/// Static properties of an opened clip.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    /// Seconds.
    pub duration: f64,
    pub fps: f64,
    pub width: u32,
    pub height: u32,
    pub frame_count: u64,
    /// Bytes on disk; zero for in-memory sources.
    pub file_size: u64,
}

/// One still image, already compressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFrame {
    pub image: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// One raw RGB24 frame from a sequential decode.
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    pub index: u64,
    pub timestamp: f64,
    pub width: u32,
    pub height: u32,
    pub rgb: Vec<u8>,
}

impl DecodedFrame {
    /// Compress this frame for review.
    pub fn encode(&self) -> Result<EncodedFrame, ReviewError> {
        let image = encode_jpeg(&self.rgb, self.width, self.height, SAMPLE_JPEG_QUALITY)?;
        Ok(EncodedFrame {
            image,
            width: self.width,
            height: self.height,
        })
    }
}

/// Sequential frame stream; individual frames may fail without ending the stream.
pub type FrameStream<'a> = Box<dyn Iterator<Item = Result<DecodedFrame, ReviewError>> + 'a>;

/// A seekable, decodable video.
pub trait VideoSource {
    fn info(&self) -> &VideoInfo;

    /// Display name used in logs and reports.
    fn name(&self) -> String;

    /// One encoded still at `timestamp` seconds, or `None` when nothing decodes there.
    fn read_at(&self, timestamp: f64) -> Result<Option<EncodedFrame>, ReviewError>;

    /// Every frame in presentation order.
    fn frames(&self) -> Result<FrameStream<'_>, ReviewError>;

    fn histogram(&self, frame: &DecodedFrame) -> Vec<f64> {
        gray_histogram(&frame.rgb)
    }

    fn histogram_distance(&self, a: &[f64], b: &[f64]) -> f64 {
        chi_square(a, b)
    }
}

/// 256-bin luma histogram of packed RGB24 pixels, scaled to unit L2 norm.
pub fn gray_histogram(rgb: &[u8]) -> Vec<f64> {
    let mut bins = vec![0f64; 256];
    for px in rgb.chunks_exact(3) {
        let y = 0.299 * px[0] as f64 + 0.587 * px[1] as f64 + 0.114 * px[2] as f64;
        bins[(y.round() as usize).min(255)] += 1.0;
    }
    let norm = bins.iter().map(|v| v * v).sum::<f64>().sqrt();
    if norm > 0.0 {
        for v in &mut bins {
            *v /= norm;
        }
    }
    bins
}

/// Chi-square distance, asymmetric in the first argument.
pub fn chi_square(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .filter(|(x, _)| **x > 0.0)
        .map(|(x, y)| (x - y) * (x - y) / x)
        .sum()
}

/// Compress packed RGB24 pixels to JPEG.
pub fn encode_jpeg(rgb: &[u8], width: u32, height: u32, quality: u8) -> Result<Vec<u8>, ReviewError> {
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality).encode(rgb, width, height, ExtendedColorType::Rgb8)?;
    Ok(out)
}
