//! # Error Taxonomy for Video Review
//!
//! Every failure the review pipeline can meet falls into one of four classes, and the
//! class decides what the caller does next:
//!
//! | Class | Examples | Behaviour |
//! |-------|----------|-----------|
//! | Recoverable-and-continue | unreadable frame, malformed AI JSON | logged, unit skipped |
//! | Recoverable-with-retry | network error, timeout, 5xx, 429 | counted against the consecutive-error budget |
//! | Fatal-for-this-video | budget exhausted, 400/401/403 | review aborted, video reported as undetermined |
//! | Fatal-for-the-run | AI client could not be built | nothing is sampled at all |
//!
//! ## Error Classification
//!
//! Errors are classified using traits:
//!
//! - `Retryable`: errors that may succeed when the same call is issued again
//! - `HasSeverity`: maps each error onto an [`ErrorSeverity`]
//! - `HasRecoverySuggestion`: a short operator-facing hint
//!
//! ## Usage
//!
//! ```rust
//! use clip_review::error::{classify, ErrorClass, VisionError, ReviewError};
//!
//! let err = ReviewError::from(VisionError::Transient("connection reset".into()));
//! assert_eq!(classify::class(&err), ErrorClass::RecoverableWithRetry);
//! ```

use std::fmt;

/// Severity levels for errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Warnings that do not stop the current video
    Warning,
    /// Errors that affect operation but can be recovered from
    Error,
    /// The current video cannot be reviewed
    Critical,
    /// No video can be reviewed
    Fatal,
}

/// Failures reported by a vision-AI provider for a single call.
#[derive(Debug, thiserror::Error)]
pub enum VisionError {
    /// Network failure, timeout, server error or rate limit.
    #[error("transient provider error: {0}")]
    Transient(String),

    /// Credentials rejected (HTTP 401/403).
    #[error("provider rejected credentials (status {status}): {message}")]
    Unauthorized { status: u16, message: String },

    /// Request rejected as invalid (HTTP 400 and other 4xx).
    #[error("provider rejected request (status {status}): {message}")]
    InvalidRequest { status: u16, message: String },

    /// The HTTP exchange worked but the body was not a chat completion.
    #[error("malformed provider response: {0}")]
    MalformedResponse(String),
}

impl VisionError {
    /// Whether this error should count against the consecutive-error budget
    /// rather than abort the video immediately.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::MalformedResponse(_))
    }

    /// HTTP status attached to the error, when there is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized { status, .. } | Self::InvalidRequest { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Base error type for the review pipeline
#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    /// Configuration validation errors
    #[error("invalid configuration for `{field}`: {reason}")]
    Config { field: String, reason: String },

    /// The AI client could not be constructed
    #[error("failed to initialise {provider} client: {reason}")]
    ClientInit { provider: String, reason: String },

    /// The video could not be opened or probed
    #[error("failed to probe video {path}: {reason}")]
    Probe { path: String, reason: String },

    /// A single frame could not be decoded
    #[error("failed to decode frame at {timestamp:.2}s: {reason}")]
    Decode { timestamp: f64, reason: String },

    /// Grid composition failures
    #[error("failed to build grid: {reason}")]
    Grid { reason: String },

    /// Image encode/decode failures
    #[error("image codec error: {0}")]
    Image(#[from] image::ImageError),

    /// A single provider call failed
    #[error(transparent)]
    Vision(#[from] VisionError),

    /// The provider answered, but not with the expected JSON
    #[error("could not parse response for {unit}: {reason}")]
    MalformedResponse { unit: String, reason: String },

    /// The sampler produced nothing to review
    #[error("no samples could be extracted from {path}")]
    NoSamples { path: String },

    /// Too many consecutive transient failures
    #[error("aborted after {consecutive} consecutive provider errors ({calls} calls issued): {last}")]
    ErrorBudgetExhausted {
        consecutive: u32,
        calls: usize,
        last: String,
    },

    /// The provider refused the request outright
    #[error("provider rejected the review: {reason}")]
    ProviderRejected { status: Option<u16>, reason: String },

    /// I/O errors
    #[error("I/O error during {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    /// Result serialization failures
    #[error("failed to serialize review result: {0}")]
    Json(#[from] serde_json::Error),
}

impl ReviewError {
    /// Create a configuration error
    pub fn config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Config {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a client initialisation error
    pub fn client_init(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ClientInit {
            provider: provider.into(),
            reason: reason.into(),
        }
    }

    /// Create a probe error
    pub fn probe(path: impl fmt::Display, reason: impl Into<String>) -> Self {
        Self::Probe {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    /// Create a frame decode error
    pub fn decode(timestamp: f64, reason: impl Into<String>) -> Self {
        Self::Decode {
            timestamp,
            reason: reason.into(),
        }
    }

    /// Create a grid error
    pub fn grid(reason: impl fmt::Display) -> Self {
        Self::Grid {
            reason: reason.to_string(),
        }
    }

    /// Create an I/O error
    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    /// Error category name for structured logs
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::ClientInit { .. } => "client_init",
            Self::Probe { .. } => "probe",
            Self::Decode { .. } => "decode",
            Self::Grid { .. } => "grid",
            Self::Image(_) => "image",
            Self::Vision(_) => "vision",
            Self::MalformedResponse { .. } => "malformed_response",
            Self::NoSamples { .. } => "no_samples",
            Self::ErrorBudgetExhausted { .. } => "error_budget",
            Self::ProviderRejected { .. } => "provider_rejected",
            Self::Io { .. } => "io",
            Self::Json(_) => "json",
        }
    }
}

/// Trait for errors that can be retried
pub trait Retryable {
    /// Check if this error can be retried
    fn is_retryable(&self) -> bool;
}

impl Retryable for VisionError {
    fn is_retryable(&self) -> bool {
        self.is_transient()
    }
}

impl Retryable for ReviewError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Vision(e) => e.is_retryable(),
            _ => false,
        }
    }
}

/// Trait for errors with severity levels
pub trait HasSeverity {
    /// Get the severity level of this error
    fn severity(&self) -> ErrorSeverity;
}

impl HasSeverity for ReviewError {
    fn severity(&self) -> ErrorSeverity {
        match classify::class(self) {
            ErrorClass::RecoverableAndContinue => ErrorSeverity::Warning,
            ErrorClass::RecoverableWithRetry => ErrorSeverity::Error,
            ErrorClass::FatalForVideo => ErrorSeverity::Critical,
            ErrorClass::FatalForRun => ErrorSeverity::Fatal,
        }
    }
}

/// Trait for errors that provide recovery suggestions
pub trait HasRecoverySuggestion {
    /// Get recovery suggestion for this error
    fn recovery_suggestion(&self) -> Option<&str>;
}

impl HasRecoverySuggestion for ReviewError {
    fn recovery_suggestion(&self) -> Option<&str> {
        match self {
            Self::ClientInit { .. } => Some("Check the provider API key and model name in the config file"),
            Self::ProviderRejected { status: Some(401 | 403), .. } => {
                Some("The API key was rejected; rotate it or check account permissions")
            }
            Self::ErrorBudgetExhausted { .. } => {
                Some("The provider is unreachable or rate limiting; retry the video later")
            }
            Self::Probe { .. } => Some("Make sure ffprobe/ffmpeg are installed and the file is a video"),
            Self::NoSamples { .. } => Some("Lower the scene threshold or use uniform sampling"),
            _ => None,
        }
    }
}

/// What the caller should do with an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Skip the unit, keep going
    RecoverableAndContinue,
    /// Count it and keep going until the budget is spent
    RecoverableWithRetry,
    /// Give up on this video, move to the next one
    FatalForVideo,
    /// Stop before reviewing anything
    FatalForRun,
}

/// Error classification utilities
pub mod classify {
    use super::*;

    /// Map an error onto the pipeline's four handling classes.
    pub fn class(error: &ReviewError) -> ErrorClass {
        match error {
            ReviewError::Decode { .. }
            | ReviewError::MalformedResponse { .. }
            | ReviewError::Image(_)
            | ReviewError::Grid { .. } => ErrorClass::RecoverableAndContinue,
            ReviewError::Vision(e) if e.is_transient() => ErrorClass::RecoverableWithRetry,
            ReviewError::Config { .. } | ReviewError::ClientInit { .. } => ErrorClass::FatalForRun,
            _ => ErrorClass::FatalForVideo,
        }
    }

    /// Check if an error is transient (may resolve itself)
    pub fn is_transient(error: &ReviewError) -> bool {
        class(error) == ErrorClass::RecoverableWithRetry
    }

    /// Check if an error means "could not determine" for the current video
    pub fn is_undetermined(error: &ReviewError) -> bool {
        matches!(
            error,
            ReviewError::ErrorBudgetExhausted { .. }
                | ReviewError::ProviderRejected { .. }
                | ReviewError::NoSamples { .. }
        )
    }
}
