//! Shared fixtures for the clip-review integration tests
//!
//! Nothing here touches ffmpeg or the network: videos are synthesised in memory and
//! the vision model replays a script.

#![allow(dead_code)]

/// Scripted stand-in for a vision provider
pub mod scripted_client {
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;

    use clip_review::vision::VisionClient;
    use clip_review::VisionError;

    /// Replays queued replies in order, then falls back to `default_reply`.
    pub struct ScriptedClient {
        script: RefCell<VecDeque<Result<String, VisionError>>>,
        default_reply: String,
        calls: Cell<usize>,
        prompts: RefCell<Vec<String>>,
    }

    impl ScriptedClient {
        pub fn new(script: Vec<Result<String, VisionError>>) -> Self {
            Self {
                script: RefCell::new(script.into()),
                default_reply: clean(),
                calls: Cell::new(0),
                prompts: RefCell::new(Vec::new()),
            }
        }

        /// Every call answers "nothing found".
        pub fn always_clean() -> Self {
            Self::new(Vec::new())
        }

        /// Every call answers with `reply`.
        pub fn always(reply: impl Into<String>) -> Self {
            let mut client = Self::new(Vec::new());
            client.default_reply = reply.into();
            client
        }

        /// Every call fails with a transient error.
        pub fn always_failing(n: usize) -> Self {
            Self::new((0..n).map(|_| Err(timeout())).collect())
        }

        pub fn calls(&self) -> usize {
            self.calls.get()
        }

        pub fn prompts(&self) -> Vec<String> {
            self.prompts.borrow().clone()
        }
    }

    impl VisionClient for ScriptedClient {
        fn complete(&self, prompt: &str, image_jpeg: &[u8]) -> Result<String, VisionError> {
            assert!(!image_jpeg.is_empty(), "review units must carry an image");
            self.calls.set(self.calls.get() + 1);
            self.prompts.borrow_mut().push(prompt.to_string());
            self.script
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Ok(self.default_reply.clone()))
        }

        fn model(&self) -> &str {
            "scripted-vl"
        }
    }

    pub fn timeout() -> VisionError {
        VisionError::Transient("operation timed out".to_string())
    }

    pub fn unauthorized() -> VisionError {
        VisionError::Unauthorized {
            status: 401,
            message: "invalid api key".to_string(),
        }
    }

    /// A reply with no issue and nothing notable on screen.
    pub fn clean() -> String {
        r#"```json
{"visible_content": ["a kitchen", "a smiling host"], "has_issue": false, "description": "", "issues": []}
```"#
            .to_string()
    }

    /// A reply reporting the given `(category, description, severity)` issues.
    pub fn violation(issues: &[(&str, &str, &str)]) -> String {
        let issues: Vec<serde_json::Value> = issues
            .iter()
            .map(|(category, description, severity)| {
                serde_json::json!({
                    "category": category,
                    "description": description,
                    "severity": severity,
                    "suggestion": "fix it"
                })
            })
            .collect();
        let body = serde_json::json!({
            "visible_content": [],
            "has_issue": true,
            "description": "problem found",
            "issues": issues,
        });
        format!("Here is my analysis:\n```json\n{body}\n```")
    }

    /// A grid reply blaming the cell labelled `label`.
    pub fn grid_violation(label: &str, severity: &str) -> String {
        serde_json::json!({
            "all_visible_apps": [],
            "has_issue": true,
            "issues": [{
                "timestamp": label,
                "category": "content compliance",
                "description": "prohibited gesture",
                "severity": severity,
            }],
        })
        .to_string()
    }

    /// A "compliant" reply that transcribes the given on-screen strings.
    pub fn transcribes(visible: &[&str]) -> String {
        serde_json::json!({
            "visible_content": visible,
            "has_issue": false,
            "issues": [],
        })
        .to_string()
    }
}

/// In-memory video source
pub mod synthetic_video {
    use std::cell::Cell;

    use clip_review::error::ReviewError;
    use clip_review::sampling::Sample;
    use clip_review::video::{encode_jpeg, DecodedFrame, EncodedFrame, FrameStream, VideoInfo, VideoSource};

    pub const WIDTH: u32 = 32;
    pub const HEIGHT: u32 = 24;

    /// A clip whose every frame is one flat gray level.
    pub struct SyntheticSource {
        info: VideoInfo,
        levels: Vec<u8>,
        broken: Vec<u64>,
        reads: Cell<usize>,
    }

    impl SyntheticSource {
        /// `levels[i]` is the gray level of frame `i`; duration follows from `fps`.
        pub fn new(levels: Vec<u8>, fps: f64) -> Self {
            let frame_count = levels.len() as u64;
            Self {
                info: VideoInfo {
                    duration: frame_count as f64 / fps,
                    fps,
                    width: WIDTH,
                    height: HEIGHT,
                    frame_count,
                    file_size: 0,
                },
                levels,
                broken: Vec::new(),
                reads: Cell::new(0),
            }
        }

        /// A static clip of `seconds` at `fps`.
        pub fn flat(seconds: f64, fps: f64) -> Self {
            Self::new(vec![128; (seconds * fps).round() as usize], fps)
        }

        /// Consecutive runs of `(gray level, frame count)`.
        pub fn scenes(runs: &[(u8, usize)], fps: f64) -> Self {
            let levels = runs
                .iter()
                .flat_map(|&(level, count)| std::iter::repeat_n(level, count))
                .collect();
            Self::new(levels, fps)
        }

        /// Frames at these indices fail to decode.
        pub fn with_broken(mut self, frames: &[u64]) -> Self {
            self.broken = frames.to_vec();
            self
        }

        /// Number of `read_at` calls so far.
        pub fn reads(&self) -> usize {
            self.reads.get()
        }

        fn index_at(&self, timestamp: f64) -> u64 {
            (timestamp * self.info.fps).floor() as u64
        }

        fn rgb(&self, index: u64) -> Vec<u8> {
            let level = self.levels.get(index as usize).copied().unwrap_or(0);
            vec![level; (WIDTH * HEIGHT * 3) as usize]
        }
    }

    impl VideoSource for SyntheticSource {
        fn info(&self) -> &VideoInfo {
            &self.info
        }

        fn name(&self) -> String {
            "synthetic.mp4".to_string()
        }

        fn read_at(&self, timestamp: f64) -> Result<Option<EncodedFrame>, ReviewError> {
            self.reads.set(self.reads.get() + 1);
            let index = self.index_at(timestamp);
            if self.broken.contains(&index) {
                return Err(ReviewError::decode(timestamp, "corrupt packet"));
            }
            if index >= self.info.frame_count {
                return Ok(None);
            }
            Ok(Some(EncodedFrame {
                image: encode_jpeg(&self.rgb(index), WIDTH, HEIGHT, 85)?,
                width: WIDTH,
                height: HEIGHT,
            }))
        }

        fn frames(&self) -> Result<FrameStream<'_>, ReviewError> {
            let fps = self.info.fps;
            Ok(Box::new((0..self.info.frame_count).map(move |index| {
                let timestamp = index as f64 / fps;
                if self.broken.contains(&index) {
                    return Err(ReviewError::decode(timestamp, "corrupt packet"));
                }
                Ok(DecodedFrame {
                    index,
                    timestamp,
                    width: WIDTH,
                    height: HEIGHT,
                    rgb: self.rgb(index),
                })
            })))
        }
    }

    /// Flat-gray samples at the given timestamps.
    pub fn samples_at(timestamps: &[f64]) -> Vec<Sample> {
        timestamps
            .iter()
            .enumerate()
            .map(|(n, &timestamp)| Sample {
                timestamp,
                frame_index: n as u64,
                image: encode_jpeg(&vec![90u8; (WIDTH * HEIGHT * 3) as usize], WIDTH, HEIGHT, 85)
                    .expect("encode test sample"),
                width: WIDTH,
                height: HEIGHT,
            })
            .collect()
    }
}
