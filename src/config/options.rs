//! Per-section option structs for [`ReviewConfig`](super::ReviewConfig).
//!
//! Every struct is `#[serde(default)]` so a config file only has to name the values
//! it changes.

use serde::{Deserialize, Serialize};

use crate::review::Severity;

/// How candidate timestamps are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplingMode {
    /// Fixed cadence: `0, Δ, 2Δ, ...`
    #[default]
    Uniform,
    /// Histogram change detection over every decoded frame.
    Scene,
}

impl std::str::FromStr for SamplingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "uniform" | "interval" => Ok(Self::Uniform),
            "scene" | "scene-change" => Ok(Self::Scene),
            other => Err(format!("unknown sampling mode `{other}` (expected uniform or scene)")),
        }
    }
}

/// `[sampling]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingOptions {
    pub mode: SamplingMode,
    /// Target samples per second for uniform mode. Ignored when `interval_secs` is set.
    pub fps: f64,
    /// Fixed spacing in seconds for uniform mode.
    pub interval_secs: Option<f64>,
    /// Hard cap on the number of samples per video.
    pub max_frames: usize,
    /// Chi-square distance above which a frame counts as a scene change.
    pub scene_threshold: f64,
    /// Minimum seconds between two scene samples.
    pub min_interval: f64,
}

impl Default for SamplingOptions {
    fn default() -> Self {
        Self {
            mode: SamplingMode::Uniform,
            fps: 1.0,
            interval_secs: None,
            max_frames: 200,
            scene_threshold: 30.0,
            min_interval: 0.1,
        }
    }
}

impl SamplingOptions {
    /// Seconds between uniform samples.
    pub fn interval(&self) -> f64 {
        match self.interval_secs {
            Some(secs) => secs,
            None => 1.0 / self.fps,
        }
    }
}

/// `[grid]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridOptions {
    /// Review composite grids instead of single frames.
    pub enabled: bool,
    /// Columns (and rows) per grid.
    pub cols: u32,
    /// Width of each cell in pixels.
    pub cell_width: u32,
    /// Burn `mm:ss.cc` labels into each cell.
    pub show_labels: bool,
}

impl Default for GridOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            cols: 4,
            cell_width: 640,
            show_labels: true,
        }
    }
}

/// A named group of checklist lines folded into the review prompt.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckCategory {
    pub enabled: bool,
    pub check_items: Vec<String>,
}

impl CheckCategory {
    fn with_items(items: &[&str]) -> Self {
        Self {
            enabled: true,
            check_items: items.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// `[rules]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleOptions {
    /// Lower-cased substrings that force a critical brand-exposure issue.
    pub competitor_keywords: Vec<String>,
    /// Free-text house rules appended verbatim to every prompt.
    pub custom_rules: String,
    pub content_compliance: CheckCategory,
    pub brand_relevance: CheckCategory,
    pub video_quality: CheckCategory,
}

pub(crate) const DEFAULT_COMPETITOR_KEYWORDS: &[&str] = &[
    "iscreen",
    "widgetsmith",
    "color widgets",
    "color widget",
    "md clock",
    "top widgets",
    "topwidgets",
    "万能小组件",
    "locket",
    "widgetable",
    "temas",
    "screenkit",
    "themify",
    "photo widget",
    "photowidget",
];

impl Default for RuleOptions {
    fn default() -> Self {
        Self {
            competitor_keywords: DEFAULT_COMPETITOR_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            custom_rules: String::new(),
            content_compliance: CheckCategory::with_items(&[
                "No violent, sexual or otherwise inappropriate content",
                "No false or misleading claims",
            ]),
            brand_relevance: CheckCategory::with_items(&[
                "No competitor apps, logos or brand names on screen",
            ]),
            video_quality: CheckCategory::default(),
        }
    }
}

/// `[scoring]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeverityWeights {
    pub low: u32,
    pub medium: u32,
    pub high: u32,
    pub critical: u32,
}

impl Default for SeverityWeights {
    fn default() -> Self {
        Self {
            low: 5,
            medium: 10,
            high: 20,
            critical: 40,
        }
    }
}

impl SeverityWeights {
    pub fn weight(&self, severity: Severity) -> u32 {
        match severity {
            Severity::Low => self.low,
            Severity::Medium => self.medium,
            Severity::High => self.high,
            Severity::Critical => self.critical,
        }
    }
}

/// `[review]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopOptions {
    /// Consecutive transient provider failures tolerated before a video is abandoned.
    pub max_consecutive_errors: u32,
    /// End the scan at the first unit that yields an issue.
    pub stop_on_first_violation: bool,
}

impl Default for LoopOptions {
    fn default() -> Self {
        Self {
            max_consecutive_errors: 3,
            stop_on_first_violation: true,
        }
    }
}

/// Which OpenAI-compatible vendor to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Zhipu,
    Qwen,
    #[serde(rename = "openai")]
    OpenAi,
}

impl ProviderKind {
    pub fn default_base_url(self) -> &'static str {
        match self {
            Self::Zhipu => "https://open.bigmodel.cn/api/paas/v4",
            Self::Qwen => "https://dashscope.aliyuncs.com/compatible-mode/v1",
            Self::OpenAi => "https://api.openai.com/v1",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            Self::Zhipu => "glm-4v-flash",
            Self::Qwen => "qwen-vl-plus",
            Self::OpenAi => "gpt-4o-mini",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Zhipu => "zhipu",
            Self::Qwen => "qwen",
            Self::OpenAi => "openai",
        }
    }
}

/// `[provider]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderOptions {
    pub kind: ProviderKind,
    /// Inline key. Prefer `api_key_env`.
    pub api_key: Option<String>,
    /// Environment variable consulted when `api_key` is absent.
    pub api_key_env: String,
    /// Overrides the vendor's default endpoint.
    pub base_url: Option<String>,
    /// Overrides the vendor's default model.
    pub model: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ProviderOptions {
    fn default() -> Self {
        Self {
            kind: ProviderKind::Zhipu,
            api_key: None,
            api_key_env: "CLIP_REVIEW_API_KEY".to_string(),
            base_url: None,
            model: None,
            timeout_secs: 60,
        }
    }
}

impl ProviderOptions {
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.kind.default_base_url())
    }

    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or_else(|| self.kind.default_model())
    }

    /// Inline key first, then the configured environment variable.
    /// Blank and placeholder values (`your_..._api_key`) are treated as missing.
    pub fn resolve_api_key(&self) -> Option<String> {
        let from_env = || std::env::var(&self.api_key_env).ok();
        self.api_key
            .clone()
            .filter(|k| !is_placeholder_key(k))
            .or_else(from_env)
            .filter(|k| !is_placeholder_key(k))
    }
}

pub(crate) fn is_placeholder_key(key: &str) -> bool {
    let key = key.trim();
    key.is_empty() || (key.starts_with("your_") && key.ends_with("api_key"))
}

/// `[paths]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathOptions {
    pub screenshots: String,
    pub reports: String,
}

impl Default for PathOptions {
    fn default() -> Self {
        Self {
            screenshots: "output/screenshots".to_string(),
            reports: "output/reports".to_string(),
        }
    }
}
