//! # Configuration Module
//!
//! Review options loaded from a TOML file. Every section and field has a default, so an
//! empty file (or no file at all) yields a runnable configuration.
//!
//! | Section | Controls |
//! |---------|----------|
//! | `[sampling]` | uniform/scene mode, fps or fixed interval, cap, scene threshold |
//! | `[grid]` | composite review, columns, cell width |
//! | `[rules]` | competitor keywords, custom rule text, prompt checklists |
//! | `[scoring]` | severity weights |
//! | `[review]` | consecutive-error budget |
//! | `[provider]` | vendor, key, endpoint, model |
//! | `[paths]` | screenshot and report directories |
//!
//! ## Examples
//!
//! ```rust
//! use clip_review::config::{ReviewConfig, SamplingMode};
//!
//! let config = ReviewConfig::from_toml_str(r#"
//!     [sampling]
//!     mode = "scene"
//!     max_frames = 50
//!
//!     [grid]
//!     enabled = true
//!     cols = 3
//! "#).unwrap();
//!
//! assert_eq!(config.sampling.mode, SamplingMode::Scene);
//! assert_eq!(config.grid.cols, 3);
//! assert_eq!(config.scoring.critical, 40);
//! assert!(config.validate().is_ok());
//! ```

mod options;

pub use options::{
    CheckCategory, GridOptions, LoopOptions, PathOptions, ProviderKind, ProviderOptions,
    RuleOptions, SamplingMode, SamplingOptions, SeverityWeights,
};

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ReviewError;

/// Complete configuration for a review run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    pub sampling: SamplingOptions,
    pub grid: GridOptions,
    pub rules: RuleOptions,
    pub scoring: SeverityWeights,
    pub review: LoopOptions,
    pub provider: ProviderOptions,
    pub paths: PathOptions,
}

impl ReviewConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ReviewError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|e| ReviewError::io(format!("reading {}", path.display()), e))?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(toml_str: &str) -> Result<Self, ReviewError> {
        toml::from_str(toml_str).map_err(|err| ReviewError::config("file", err.to_string()))
    }

    /// Render the effective configuration back to TOML.
    pub fn to_toml_string(&self) -> Result<String, ReviewError> {
        toml::to_string_pretty(self).map_err(|err| ReviewError::config("file", err.to_string()))
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), String> {
        let s = &self.sampling;
        if s.interval_secs.is_none() && !(s.fps > 0.0 && s.fps.is_finite()) {
            return Err("sampling.fps must be greater than 0".to_string());
        }
        if let Some(interval) = s.interval_secs {
            if !(interval > 0.0 && interval.is_finite()) {
                return Err("sampling.interval_secs must be greater than 0".to_string());
            }
        }
        if s.max_frames == 0 {
            return Err("sampling.max_frames must be at least 1".to_string());
        }
        if s.scene_threshold < 0.0 {
            return Err("sampling.scene_threshold must not be negative".to_string());
        }
        if s.min_interval < 0.0 {
            return Err("sampling.min_interval must not be negative".to_string());
        }
        if self.grid.cols == 0 {
            return Err("grid.cols must be at least 1".to_string());
        }
        if self.grid.cell_width < 16 {
            return Err("grid.cell_width must be at least 16 pixels".to_string());
        }
        let w = &self.scoring;
        if w.low == 0 || w.medium == 0 || w.high == 0 || w.critical == 0 {
            return Err("scoring weights must all be at least 1".to_string());
        }
        if self.review.max_consecutive_errors == 0 {
            return Err("review.max_consecutive_errors must be at least 1".to_string());
        }
        if self.provider.timeout_secs == 0 {
            return Err("provider.timeout_secs must be greater than 0".to_string());
        }
        if self.provider.api_key_env.trim().is_empty() && self.provider.api_key.is_none() {
            return Err("provider.api_key_env must name an environment variable".to_string());
        }
        Ok(())
    }
}
