/*!
 * Error types for the neuralbabel pipeline.
 *
 * Stage clients report failures as `StageError` values tagged with the
 * service that produced them. The orchestrator wraps those into a
 * `PipelineError` whose `stage` field tells the caller which hop failed,
 * using the thiserror crate for ergonomic error definitions.
 */

use serde_json::{json, Value};
use std::fmt;
use thiserror::Error;

/// One of the three downstream services the pipeline talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    /// Speech recognition
    Asr,
    /// Text translation
    Translation,
    /// Speech synthesis
    Tts,
}

impl StageKind {
    /// All stages in pipeline order
    pub const ALL: [StageKind; 3] = [StageKind::Asr, StageKind::Translation, StageKind::Tts];

    /// Lowercase label used for logging, metrics and health snapshots
    pub fn label(&self) -> &'static str {
        match self {
            Self::Asr => "asr",
            Self::Translation => "translation",
            Self::Tts => "tts",
        }
    }

    /// Human readable name used in error messages
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Asr => "ASR",
            Self::Translation => "Translation",
            Self::Tts => "TTS",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// What went wrong during a single stage call
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StageErrorKind {
    /// Every attempt timed out
    #[error("request timed out after {attempts} attempts")]
    Timeout {
        /// Total attempts made, including the first
        attempts: u32,
    },

    /// The service answered with a status >= 400
    #[error("request failed with status code {status}: {body}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Raw response body
        body: String,
    },

    /// Connection reset, refused, DNS failure or anything else below HTTP
    #[error("request failed: {0}")]
    Transport(String),

    /// The response arrived but did not have the expected shape
    #[error("invalid response: {0}")]
    Parse(String),

    /// The caller abandoned the request
    #[error("request cancelled")]
    Cancelled,
}

/// Failure of one stage invocation
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{} service {operation} {kind}", .service.display_name())]
pub struct StageError {
    /// Service that failed
    pub service: StageKind,
    /// Request path that was being called
    pub operation: String,
    /// Number of HTTP attempts made before giving up
    pub attempts: u32,
    /// Failure classification
    pub kind: StageErrorKind,
}

impl StageError {
    pub fn new(service: StageKind, operation: impl Into<String>, attempts: u32, kind: StageErrorKind) -> Self {
        Self {
            service,
            operation: operation.into(),
            attempts,
            kind,
        }
    }

    /// HTTP status if the service rejected the request
    pub fn http_status(&self) -> Option<u16> {
        match &self.kind {
            StageErrorKind::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.kind, StageErrorKind::Timeout { .. })
    }

    /// Label used when counting this error in metrics
    pub fn error_type(&self) -> String {
        match &self.kind {
            StageErrorKind::Timeout { .. } => "timeout".to_string(),
            StageErrorKind::Http { status, .. } => format!("http_{}", status),
            StageErrorKind::Transport(_) => "transport".to_string(),
            StageErrorKind::Parse(_) => "parse".to_string(),
            StageErrorKind::Cancelled => "cancelled".to_string(),
        }
    }

    /// Structured detail payload surfaced to pipeline callers
    pub fn details(&self) -> Value {
        let mut details = json!({
            "service": self.service.label(),
            "operation": self.operation,
            "attempts": self.attempts,
        });
        match &self.kind {
            StageErrorKind::Http { status, body } => {
                details["status_code"] = json!(status);
                details["response"] = json!(body);
            }
            StageErrorKind::Timeout { .. } => {
                details["error"] = json!("timeout");
            }
            StageErrorKind::Transport(message) | StageErrorKind::Parse(message) => {
                details["error"] = json!(message);
            }
            StageErrorKind::Cancelled => {
                details["error"] = json!("cancelled");
            }
        }
        details
    }
}

/// Pipeline step a `PipelineError` is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    Asr,
    Translation,
    Tts,
    /// Request rejected before any stage ran
    Request,
    /// Orchestration-level failure, not caused by a downstream service
    Pipeline,
}

impl PipelineStage {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Asr => "asr",
            Self::Translation => "translation",
            Self::Tts => "tts",
            Self::Request => "request",
            Self::Pipeline => "pipeline",
        }
    }
}

impl From<StageKind> for PipelineStage {
    fn from(kind: StageKind) -> Self {
        match kind {
            StageKind::Asr => Self::Asr,
            StageKind::Translation => Self::Translation,
            StageKind::Tts => Self::Tts,
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Error surfaced to callers of the pipeline
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct PipelineError {
    /// Stage the failure is attributed to
    pub stage: PipelineStage,
    /// Human readable description
    pub message: String,
    /// Structured details (status, response body, attempts...)
    pub details: Value,
    /// Underlying stage failure, absent for orchestration-level errors
    pub source: Option<StageError>,
}

impl PipelineError {
    /// Wrap a stage failure, attributing it to the stage that was running
    pub fn from_stage(stage: StageKind, error: StageError) -> Self {
        Self {
            stage: stage.into(),
            message: format!("{} failed: {}", stage.display_name(), error),
            details: error.details(),
            source: Some(error),
        }
    }

    /// Reject a request before any stage runs
    pub fn invalid_request(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            stage: PipelineStage::Request,
            details: json!({ "error": message }),
            message,
            source: None,
        }
    }

    /// Wrap an orchestration-level failure
    pub fn unexpected(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            stage: PipelineStage::Pipeline,
            details: json!({ "error": message }),
            message: format!("Unexpected error in translation pipeline: {}", message),
            source: None,
        }
    }

    /// True when the caller sent a request the pipeline cannot serve
    pub fn is_invalid_request(&self) -> bool {
        self.stage == PipelineStage::Request
    }

    /// HTTP status reported by the failing service, if any
    pub fn http_status(&self) -> Option<u16> {
        self.source.as_ref().and_then(StageError::http_status)
    }
}

impl From<StageError> for PipelineError {
    fn from(error: StageError) -> Self {
        Self::from_stage(error.service, error)
    }
}

/// Errors raised while loading or validating configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A value is out of range or malformed
    #[error("Invalid configuration value for {field}: {message}")]
    InvalidValue {
        /// Dotted path of the offending field
        field: String,
        /// What is wrong with it
        message: String,
    },
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from configuration handling
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Error from the translation pipeline
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
