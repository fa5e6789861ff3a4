use thiserror::Error;

use crate::content::ContentType;
use crate::state_machine::JobState;

#[derive(Debug, Error)]
pub enum ForgeError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid request: {0}")]
    Validation(#[from] ValidationError),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Caller input rejected at job creation. The job never enters the queue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("topic must not be empty")]
    EmptyTopic,

    #[error("topic is {len} characters, maximum is {max}")]
    TopicTooLong { len: usize, max: usize },

    #[error("at least one content type must be requested")]
    NoContentTypes,

    #[error("unknown content type: {0}")]
    UnknownContentType(String),

    #[error("unknown audience: {0}")]
    UnknownAudience(String),
}

/// Failure of a single generation call site.
///
/// `Retryable` covers transient provider trouble and malformed responses;
/// `Throttled` is a retryable rejection that names its own wait; `Fatal`
/// covers anything a retry cannot fix (rejected prompt, bad credentials,
/// missing prompt variables).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("retryable generation failure: {0}")]
    Retryable(String),

    #[error("provider throttled the request, retry after {retry_after_ms}ms")]
    Throttled { retry_after_ms: u64 },

    #[error("fatal generation failure: {0}")]
    Fatal(String),
}

impl GenerationError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, GenerationError::Fatal(_))
    }

    /// Minimum wait the provider asked for before the next call.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            GenerationError::Throttled { retry_after_ms } => Some(*retry_after_ms),
            _ => None,
        }
    }

    /// The failure without its classification prefix.
    pub fn detail(&self) -> String {
        match self {
            GenerationError::Retryable(msg) | GenerationError::Fatal(msg) => msg.clone(),
            GenerationError::Throttled { retry_after_ms } => {
                format!("throttled, retry after {retry_after_ms}ms")
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("job not found: {0}")]
    NotFound(String),

    #[error("job already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid transition {from} -> {to}")]
    InvalidTransition { from: JobState, to: JobState },

    #[error("job {id} is terminal ({state}), update rejected")]
    JobTerminal { id: String, state: JobState },

    #[error("job {id} cannot finalize, still pending: {pending:?}")]
    Unsettled {
        id: String,
        pending: Vec<ContentType>,
    },

    #[error("artifact for {content_type} rejected: {reason}")]
    ArtifactRejected {
        content_type: ContentType,
        reason: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue closed")]
    Closed,

    #[error("unknown delivery: {0}")]
    UnknownDelivery(u64),
}

/// Why a single content type ended in `errors` instead of `results`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum UnitFailure {
    /// Every attempt scored below the content type's threshold.
    QualityThresholdNotMet,
    /// The generation client gave up (retries exhausted or fatal error).
    GenerationFailed(String),
}

impl std::fmt::Display for UnitFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnitFailure::QualityThresholdNotMet => write!(f, "quality_threshold_not_met"),
            UnitFailure::GenerationFailed(msg) => write!(f, "generation_failed: {msg}"),
        }
    }
}
