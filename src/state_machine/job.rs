use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::state::JobState;
use crate::content::{Audience, ContentType, GeneratedArtifact};
use crate::error::ValidationError;

/// Longest accepted topic, in characters.
pub const MAX_TOPIC_CHARS: usize = 500;

/// Raw caller input, as received over HTTP or the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequest {
    pub topic: String,
    pub audience: String,
    pub content_types: Vec<String>,
}

impl JobRequest {
    /// Check the request and convert it into its typed form.
    pub fn validate(&self) -> Result<GenerationRequest, ValidationError> {
        let topic = self.topic.trim();
        if topic.is_empty() {
            return Err(ValidationError::EmptyTopic);
        }
        let len = topic.chars().count();
        if len > MAX_TOPIC_CHARS {
            return Err(ValidationError::TopicTooLong {
                len,
                max: MAX_TOPIC_CHARS,
            });
        }

        let audience = self.audience.parse::<Audience>()?;

        if self.content_types.is_empty() {
            return Err(ValidationError::NoContentTypes);
        }
        let content_types = self
            .content_types
            .iter()
            .map(|raw| raw.parse::<ContentType>())
            .collect::<Result<BTreeSet<_>, _>>()?;

        Ok(GenerationRequest {
            topic: topic.to_string(),
            audience,
            content_types,
        })
    }
}

/// A validated, immutable generation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub topic: String,
    pub audience: Audience,
    pub content_types: BTreeSet<ContentType>,
}

impl GenerationRequest {
    /// Requested derivative types, in a stable order.
    pub fn derivatives(&self) -> impl Iterator<Item = ContentType> + '_ {
        self.content_types.iter().copied().filter(|ct| ct.is_derivative())
    }
}

/// A content type that could not be produced, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobError {
    pub content_type: ContentType,
    pub reason: String,
}

/// Exclusive processing claim on a job, held by one worker at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    pub owner: String,
    pub expires_at: DateTime<Utc>,
}

/// One generation job and everything produced for it so far.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub state: JobState,
    pub request: GenerationRequest,
    pub outline: Option<GeneratedArtifact>,
    pub results: BTreeMap<ContentType, GeneratedArtifact>,
    pub errors: Vec<JobError>,
    /// Why the job failed as a whole (outline failure, fatal error, deadline).
    pub failure: Option<String>,
    pub state_history: Vec<JobState>,
    #[serde(default)]
    pub lease: Option<Lease>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(request: GenerationRequest) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            state: JobState::Pending,
            request,
            outline: None,
            results: BTreeMap::new(),
            errors: Vec::new(),
            failure: None,
            state_history: Vec::new(),
            lease: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// True once `content_type` has landed in `results` or `errors`.
    pub fn is_settled(&self, content_type: ContentType) -> bool {
        self.results.contains_key(&content_type)
            || self.errors.iter().any(|e| e.content_type == content_type)
    }

    /// Requested derivatives that have neither a result nor an error yet.
    pub fn pending_derivatives(&self) -> Vec<ContentType> {
        self.request
            .derivatives()
            .filter(|ct| !self.is_settled(*ct))
            .collect()
    }

    /// Number of requested content types that produced a result.
    pub fn succeeded(&self) -> usize {
        self.request
            .content_types
            .iter()
            .filter(|ct| self.results.contains_key(ct))
            .count()
    }

    pub fn view(&self) -> JobView {
        JobView {
            id: self.id.clone(),
            state: self.state,
            topic: self.request.topic.clone(),
            audience: self.request.audience,
            content_types: self.request.content_types.iter().copied().collect(),
            outline: self.outline.clone(),
            results: self.results.clone(),
            errors: self.errors.clone(),
            failure: self.failure.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Caller-facing snapshot of a job, without internal bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobView {
    pub id: String,
    pub state: JobState,
    pub topic: String,
    pub audience: Audience,
    pub content_types: Vec<ContentType>,
    pub outline: Option<GeneratedArtifact>,
    pub results: BTreeMap<ContentType, GeneratedArtifact>,
    pub errors: Vec<JobError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
