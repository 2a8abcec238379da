//! Error handling module for ReelCut

use thiserror::Error;

/// Main error type for ReelCut operations
#[derive(Error, Debug)]
pub enum ReelCutError {
    /// Malformed rundown, selection out of range, unknown transition key
    #[error("Validation failed: {message}")]
    Validation { message: String },

    /// Network-level failure while fetching an asset
    #[error("Network error fetching {url}: {message}")]
    Network { url: String, message: String },

    /// Upstream media host answered with an error status
    #[error("Upstream rejected {url} with HTTP {status}")]
    UpstreamRejected { url: String, status: u16 },

    /// Every configured transcription provider failed
    #[error("Transcription unavailable for {url}")]
    TranscriptionUnavailable { url: String },

    /// Media tool could not read the input at all
    #[error("Unreadable media file {path}: {message}")]
    MediaCorrupt { path: String, message: String },

    /// Media tool ran but exited non-zero
    #[error("Media tool failed during {stage} (exit {exit_code:?}): {stderr_tail}")]
    MediaFailure {
        stage: String,
        exit_code: Option<i32>,
        stderr_tail: String,
    },

    /// External call exceeded its deadline
    #[error("{stage} timed out after {seconds}s")]
    Timeout { stage: String, seconds: u64 },

    /// Run was cancelled by the caller
    #[error("Run cancelled")]
    Cancelled,

    /// Internal bookkeeping went wrong, e.g. a segment index pointing past the
    /// segment list
    #[error("Invariant violation: {message}")]
    InvariantViolation { message: String },

    /// Configuration file or value could not be used
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReelCutError {
    /// Whether a failure in the per-clip stage may be absorbed by dropping the
    /// clip from the run. Assembly-stage and validation failures never are.
    pub fn is_clip_recoverable(&self) -> bool {
        matches!(
            self,
            ReelCutError::Network { .. }
                | ReelCutError::UpstreamRejected { .. }
                | ReelCutError::TranscriptionUnavailable { .. }
                | ReelCutError::MediaCorrupt { .. }
                | ReelCutError::MediaFailure { .. }
                | ReelCutError::Timeout { .. }
        )
    }

    /// Short taxonomy label for per-item status reporting
    pub fn kind(&self) -> &'static str {
        match self {
            ReelCutError::Validation { .. } => "validation",
            ReelCutError::Network { .. } => "network",
            ReelCutError::UpstreamRejected { .. } => "upstream_rejected",
            ReelCutError::TranscriptionUnavailable { .. } => "transcription_unavailable",
            ReelCutError::MediaCorrupt { .. } => "media_corrupt",
            ReelCutError::MediaFailure { .. } => "media_failure",
            ReelCutError::Timeout { .. } => "timeout",
            ReelCutError::Cancelled => "cancelled",
            ReelCutError::InvariantViolation { .. } => "invariant_violation",
            ReelCutError::Config { .. } => "config",
            ReelCutError::Io(_) => "io",
        }
    }
}

/// Result type alias for ReelCut operations
pub type ReelCutResult<T> = std::result::Result<T, ReelCutError>;
