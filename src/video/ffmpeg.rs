//! ffprobe/ffmpeg-backed [`VideoSource`].
//!
//! Probing, seeking and sequential decode all shell out to the system binaries, which
//! keeps codec support identical to whatever ffmpeg build is installed.

use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

use serde::Deserialize;
use tracing::{debug, warn};

use super::{DecodedFrame, EncodedFrame, FrameStream, VideoInfo, VideoSource};
use crate::error::ReviewError;

/// File extensions the session runner will hand to ffmpeg.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv", "wmv", "flv", "webm", "m4v"];

pub fn is_supported_video(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SUPPORTED_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    /// e.g. "30/1" or "24000/1001"
    r_frame_rate: Option<String>,
    duration: Option<String>,
    nb_frames: Option<String>,
    /// Display matrix rotation, newer ffprobe builds.
    #[serde(default)]
    side_data_list: Vec<ProbeSideData>,
    /// `rotate` tag, older builds.
    tags: Option<ProbeTags>,
}

#[derive(Debug, Deserialize)]
struct ProbeSideData {
    rotation: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ProbeTags {
    rotate: Option<String>,
}

impl ProbeStream {
    /// Clockwise rotation in whole degrees, normalised to `0..360`.
    fn rotation(&self) -> i64 {
        let degrees = self
            .side_data_list
            .iter()
            .find_map(|d| d.rotation)
            .or_else(|| self.tags.as_ref()?.rotate.as_deref()?.trim().parse::<f64>().ok())
            .unwrap_or(0.0);
        (degrees.round() as i64).rem_euclid(360)
    }
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
    size: Option<String>,
}

/// A video file on disk, decoded through ffmpeg subprocesses.
#[derive(Debug, Clone)]
pub struct FfmpegSource {
    path: PathBuf,
    info: VideoInfo,
}

impl FfmpegSource {
    /// Probe `path` with ffprobe.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ReviewError> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(ReviewError::probe(path.display(), "file not found"));
        }

        let output = Command::new("ffprobe")
            .args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(&path)
            .output()
            .map_err(|e| ReviewError::probe(path.display(), format!("could not run ffprobe: {e}")))?;

        if !output.status.success() {
            return Err(ReviewError::probe(
                path.display(),
                format!(
                    "ffprobe exited with {:?}: {}",
                    output.status.code(),
                    String::from_utf8_lossy(&output.stderr)
                ),
            ));
        }

        let probe: ProbeOutput = serde_json::from_slice(&output.stdout)
            .map_err(|e| ReviewError::probe(path.display(), format!("unreadable ffprobe output: {e}")))?;
        let info = parse_probe(&probe).ok_or_else(|| ReviewError::probe(path.display(), "no video stream"))?;

        debug!(
            path = %path.display(),
            duration = info.duration,
            fps = info.fps,
            width = info.width,
            height = info.height,
            "probed video"
        );
        Ok(Self { path, info })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn parse_probe(probe: &ProbeOutput) -> Option<VideoInfo> {
    let stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))?;

    let format_duration = probe
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .and_then(|d| d.parse::<f64>().ok());
    let duration = format_duration
        .or_else(|| stream.duration.as_deref().and_then(|d| d.parse().ok()))
        .unwrap_or(0.0);

    let fps = stream
        .r_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .unwrap_or(30.0);

    let frame_count = stream
        .nb_frames
        .as_deref()
        .and_then(|n| n.parse::<u64>().ok())
        .unwrap_or((duration * fps).round() as u64);

    let file_size = probe
        .format
        .as_ref()
        .and_then(|f| f.size.as_deref())
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);

    // ffmpeg applies the rotation when decoding, so frames come out in display orientation
    let (coded_w, coded_h) = (stream.width.unwrap_or(0), stream.height.unwrap_or(0));
    let (width, height) = match stream.rotation() {
        90 | 270 => (coded_h, coded_w),
        _ => (coded_w, coded_h),
    };

    Some(VideoInfo {
        duration,
        fps,
        width,
        height,
        frame_count,
        file_size,
    })
}

/// Parse an ffprobe rational such as `30000/1001`.
fn parse_frame_rate(rate: &str) -> Option<f64> {
    let (num, den) = match rate.split_once('/') {
        Some((n, d)) => (n.trim().parse::<f64>().ok()?, d.trim().parse::<f64>().ok()?),
        None => (rate.trim().parse::<f64>().ok()?, 1.0),
    };
    (den > 0.0 && num > 0.0).then(|| num / den)
}

impl VideoSource for FfmpegSource {
    fn info(&self) -> &VideoInfo {
        &self.info
    }

    fn name(&self) -> String {
        self.path.display().to_string()
    }

    fn read_at(&self, timestamp: f64) -> Result<Option<EncodedFrame>, ReviewError> {
        let output = Command::new("ffmpeg")
            .args(["-v", "error", "-ss", &format!("{:.3}", timestamp.max(0.0)), "-i"])
            .arg(&self.path)
            .args(["-frames:v", "1", "-f", "image2pipe", "-vcodec", "mjpeg", "-"])
            .stdin(Stdio::null())
            .output()
            .map_err(|e| ReviewError::decode(timestamp, format!("could not run ffmpeg: {e}")))?;

        if !output.status.success() {
            return Err(ReviewError::decode(
                timestamp,
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        if output.stdout.is_empty() {
            return Ok(None);
        }

        let (width, height) = image::ImageReader::new(Cursor::new(&output.stdout))
            .with_guessed_format()
            .map_err(|e| ReviewError::decode(timestamp, e.to_string()))?
            .into_dimensions()?;

        Ok(Some(EncodedFrame {
            image: output.stdout,
            width,
            height,
        }))
    }

    fn frames(&self) -> Result<FrameStream<'_>, ReviewError> {
        let mut child = Command::new("ffmpeg")
            .args(["-v", "error", "-i"])
            .arg(&self.path)
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| ReviewError::probe(self.path.display(), format!("could not run ffmpeg: {e}")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ReviewError::probe(self.path.display(), "ffmpeg stdout not captured"))?;

        Ok(Box::new(RawFrames {
            child,
            stdout,
            width: self.info.width,
            height: self.info.height,
            fps: self.info.fps,
            next_index: 0,
            done: false,
        }))
    }
}

/// rgb24 frames read off an ffmpeg rawvideo pipe. The child is reaped on drop.
struct RawFrames {
    child: Child,
    stdout: ChildStdout,
    width: u32,
    height: u32,
    fps: f64,
    next_index: u64,
    done: bool,
}

impl Iterator for RawFrames {
    type Item = Result<DecodedFrame, ReviewError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.width == 0 || self.height == 0 {
            return None;
        }
        let mut rgb = vec![0u8; self.width as usize * self.height as usize * 3];
        if let Err(e) = self.stdout.read_exact(&mut rgb) {
            // a short read is the normal end of stream
            debug!(frames = self.next_index, error = %e, "raw frame stream ended");
            self.done = true;
            return None;
        }
        let index = self.next_index;
        self.next_index += 1;
        Some(Ok(DecodedFrame {
            index,
            timestamp: index as f64 / self.fps,
            width: self.width,
            height: self.height,
            rgb,
        }))
    }
}

impl Drop for RawFrames {
    fn drop(&mut self) {
        if let Err(e) = self.child.kill() {
            debug!(error = %e, "ffmpeg already exited");
        }
        if let Err(e) = self.child.wait() {
            warn!(error = %e, "failed to reap ffmpeg");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_rate_fractions() {
        assert_eq!(parse_frame_rate("30/1"), Some(30.0));
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert_eq!(parse_frame_rate("25"), Some(25.0));
        assert_eq!(parse_frame_rate("0/0"), None);
        assert_eq!(parse_frame_rate("abc"), None);
    }

    #[test]
    fn probe_json_prefers_format_duration() {
        let json = r#"{
            "streams": [
                {"codec_type": "audio"},
                {"codec_type": "video", "width": 1080, "height": 1920,
                 "r_frame_rate": "30/1", "duration": "9.9", "nb_frames": "297"}
            ],
            "format": {"duration": "10.0", "size": "123456"}
        }"#;
        let probe: ProbeOutput = serde_json::from_str(json).unwrap();
        let info = parse_probe(&probe).unwrap();
        assert_eq!(info.duration, 10.0);
        assert_eq!(info.fps, 30.0);
        assert_eq!((info.width, info.height), (1080, 1920));
        assert_eq!(info.frame_count, 297);
        assert_eq!(info.file_size, 123456);
    }

    #[test]
    fn probe_without_frame_count_estimates_it() {
        let json = r#"{"streams": [{"codec_type": "video", "width": 64, "height": 64,
            "r_frame_rate": "25/1", "duration": "4.0"}]}"#;
        let probe: ProbeOutput = serde_json::from_str(json).unwrap();
        let info = parse_probe(&probe).unwrap();
        assert_eq!(info.duration, 4.0);
        assert_eq!(info.frame_count, 100);
    }

    #[test]
    fn rotated_stream_reports_display_dimensions() {
        let json = r#"{"streams": [{"codec_type": "video", "width": 1920, "height": 1080,
            "r_frame_rate": "30/1", "duration": "2.0",
            "side_data_list": [{"side_data_type": "Display Matrix", "rotation": -90}]}]}"#;
        let probe: ProbeOutput = serde_json::from_str(json).unwrap();
        let info = parse_probe(&probe).unwrap();
        assert_eq!((info.width, info.height), (1080, 1920));

        let json = r#"{"streams": [{"codec_type": "video", "width": 1920, "height": 1080,
            "tags": {"rotate": "90", "language": "und"}}]}"#;
        let probe: ProbeOutput = serde_json::from_str(json).unwrap();
        let info = parse_probe(&probe).unwrap();
        assert_eq!((info.width, info.height), (1080, 1920));

        let json = r#"{"streams": [{"codec_type": "video", "width": 1920, "height": 1080,
            "side_data_list": [{"side_data_type": "Display Matrix", "rotation": 180}]}]}"#;
        let probe: ProbeOutput = serde_json::from_str(json).unwrap();
        let info = parse_probe(&probe).unwrap();
        assert_eq!((info.width, info.height), (1920, 1080));
    }

    #[test]
    fn probe_without_video_stream_is_rejected() {
        let probe: ProbeOutput = serde_json::from_str(r#"{"streams": [{"codec_type": "audio"}]}"#).unwrap();
        assert!(parse_probe(&probe).is_none());
    }

    #[test]
    fn supported_extensions_are_case_insensitive() {
        assert!(is_supported_video(Path::new("clip.MP4")));
        assert!(is_supported_video(Path::new("/tmp/a.webm")));
        assert!(!is_supported_video(Path::new("notes.txt")));
        assert!(!is_supported_video(Path::new("noext")));
    }

    #[test]
    fn missing_file_is_a_probe_error() {
        let err = FfmpegSource::open("/definitely/not/here.mp4").unwrap_err();
        assert!(matches!(err, ReviewError::Probe { .. }));
    }
}
