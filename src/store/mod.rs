//! Job record persistence.
//!
//! Stores expose field-level updates ([`JobUpdate`]) instead of whole-document
//! writes, so concurrent generation units of one job never clobber each
//! other's entries. Each update is validated and applied inside the store's
//! critical section.

mod file;
mod memory;

pub use file::JsonFileJobStore;
pub use memory::MemoryJobStore;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::content::{ContentType, GeneratedArtifact};
use crate::error::StoreError;
use crate::state_machine::{Job, JobError, JobState, Lease, StateMachine, Transition};

/// A single field-level mutation of a job record.
#[derive(Debug, Clone)]
pub enum JobUpdate {
    /// Move the job to another state.
    Transition(JobState),
    /// Record the master outline (first write wins).
    Outline(GeneratedArtifact),
    /// Upsert one entry in `results`.
    Result(GeneratedArtifact),
    /// Append one entry to `errors`.
    Error(JobError),
    /// Fail the whole job with a reason.
    Fail(String),
    /// Settle the job as COMPLETED, or FAILED when nothing succeeded.
    Finalize,
}

/// Whether an update changed the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Applied,
    Duplicate,
}

impl JobUpdate {
    /// Apply this update to `job`, enforcing the state machine and the
    /// terminal-state rule.
    pub fn apply_to(self, job: &mut Job) -> Result<UpdateOutcome, StoreError> {
        match self {
            JobUpdate::Transition(target) => transition(job, target),
            JobUpdate::Fail(reason) => {
                let outcome = transition(job, JobState::Failed)?;
                if outcome == UpdateOutcome::Applied {
                    job.failure = Some(reason);
                }
                Ok(outcome)
            }
            JobUpdate::Finalize => {
                if job.state.is_terminal() {
                    return Ok(UpdateOutcome::Duplicate);
                }
                let mut pending = job.pending_derivatives();
                if job.request.content_types.contains(&ContentType::Outline)
                    && !job.is_settled(ContentType::Outline)
                {
                    pending.insert(0, ContentType::Outline);
                }
                if !pending.is_empty() || job.outline.is_none() {
                    return Err(StoreError::Unsettled {
                        id: job.id.clone(),
                        pending,
                    });
                }
                if job.succeeded() == 0 {
                    let outcome = transition(job, JobState::Failed)?;
                    job.failure = Some("no requested content type met its quality threshold".into());
                    Ok(outcome)
                } else {
                    transition(job, JobState::Completed)
                }
            }
            JobUpdate::Outline(artifact) => {
                ensure_mutable(job)?;
                if job.outline.is_some() {
                    return Ok(UpdateOutcome::Duplicate);
                }
                job.outline = Some(artifact);
                job.touch();
                Ok(UpdateOutcome::Applied)
            }
            JobUpdate::Result(artifact) => {
                ensure_mutable(job)?;
                job.errors.retain(|e| e.content_type != artifact.content_type);
                job.results.insert(artifact.content_type, artifact);
                job.touch();
                Ok(UpdateOutcome::Applied)
            }
            JobUpdate::Error(error) => {
                ensure_mutable(job)?;
                if job.is_settled(error.content_type) {
                    return Ok(UpdateOutcome::Duplicate);
                }
                job.errors.push(error);
                job.touch();
                Ok(UpdateOutcome::Applied)
            }
        }
    }
}

fn transition(job: &mut Job, target: JobState) -> Result<UpdateOutcome, StoreError> {
    match StateMachine::transition(job, target) {
        Transition::Applied { .. } => Ok(UpdateOutcome::Applied),
        Transition::Duplicate(_) => Ok(UpdateOutcome::Duplicate),
        Transition::Rejected { from, to } => Err(StoreError::InvalidTransition { from, to }),
    }
}

fn ensure_mutable(job: &Job) -> Result<(), StoreError> {
    if job.state.is_terminal() {
        return Err(StoreError::JobTerminal {
            id: job.id.clone(),
            state: job.state,
        });
    }
    Ok(())
}

/// Claim the job for `owner` unless another owner holds an unexpired lease.
pub(crate) fn try_lease(job: &mut Job, owner: &str, ttl: Duration, now: DateTime<Utc>) -> bool {
    if let Some(lease) = &job.lease
        && lease.owner != owner
        && lease.expires_at > now
    {
        return false;
    }
    job.lease = Some(Lease {
        owner: owner.to_string(),
        expires_at: now + ttl,
    });
    true
}

pub(crate) fn drop_lease(job: &mut Job, owner: &str) {
    if job.lease.as_ref().is_some_and(|l| l.owner == owner) {
        job.lease = None;
    }
}

/// Narrow persistence interface for job records.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create(&self, job: &Job) -> Result<(), StoreError>;

    async fn get(&self, id: &str) -> Result<Option<Job>, StoreError>;

    /// Apply one field-level update atomically.
    async fn apply(&self, id: &str, update: JobUpdate) -> Result<UpdateOutcome, StoreError>;

    /// Take the processing lease for `owner`. Returns `false` when another
    /// owner holds a live lease.
    async fn acquire_lease(&self, id: &str, owner: &str, ttl: Duration) -> Result<bool, StoreError>;

    async fn release_lease(&self, id: &str, owner: &str) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{
        ArtifactBody, Audience, DimensionScores, QualityScores,
    };
    use crate::state_machine::GenerationRequest;

    fn artifact(content_type: ContentType) -> GeneratedArtifact {
        let d = DimensionScores {
            educational_effectiveness: 0.9,
            factual_accuracy: 0.9,
            readability: 0.9,
            structural_quality: 0.9,
            engagement: 0.9,
        };
        GeneratedArtifact::new(
            content_type,
            ArtifactBody {
                title: None,
                sections: Vec::new(),
                cards: Vec::new(),
                text: format!("# {content_type}"),
            },
            QualityScores {
                composite: 0.9,
                dimensions: d,
            },
            1,
        )
    }

    fn running_job(types: &[ContentType]) -> Job {
        let mut job = Job::new(GenerationRequest {
            topic: "Photosynthesis".into(),
            audience: Audience::MiddleSchool,
            content_types: types.iter().copied().collect(),
        });
        JobUpdate::Transition(JobState::Running).apply_to(&mut job).unwrap();
        job
    }

    fn error(content_type: ContentType) -> JobError {
        JobError {
            content_type,
            reason: "quality_threshold_not_met".into(),
        }
    }

    #[test]
    fn finalize_completes_with_partial_failure() {
        let mut job = running_job(&[ContentType::StudyGuide, ContentType::Flashcards]);
        JobUpdate::Outline(artifact(ContentType::Outline)).apply_to(&mut job).unwrap();
        JobUpdate::Result(artifact(ContentType::StudyGuide)).apply_to(&mut job).unwrap();
        JobUpdate::Error(error(ContentType::Flashcards)).apply_to(&mut job).unwrap();

        assert_eq!(JobUpdate::Finalize.apply_to(&mut job).unwrap(), UpdateOutcome::Applied);
        assert_eq!(job.state, JobState::Completed);
        assert!(job.failure.is_none());
    }

    #[test]
    fn finalize_fails_when_nothing_succeeded() {
        let mut job = running_job(&[ContentType::Quiz]);
        JobUpdate::Outline(artifact(ContentType::Outline)).apply_to(&mut job).unwrap();
        JobUpdate::Error(error(ContentType::Quiz)).apply_to(&mut job).unwrap();

        JobUpdate::Finalize.apply_to(&mut job).unwrap();
        assert_eq!(job.state, JobState::Failed);
        assert!(job.failure.is_some());
    }

    #[test]
    fn finalize_refuses_unsettled_jobs() {
        let mut job = running_job(&[ContentType::Quiz, ContentType::Summary]);
        JobUpdate::Outline(artifact(ContentType::Outline)).apply_to(&mut job).unwrap();
        JobUpdate::Result(artifact(ContentType::Quiz)).apply_to(&mut job).unwrap();

        let err = JobUpdate::Finalize.apply_to(&mut job).unwrap_err();
        assert!(matches!(err, StoreError::Unsettled { pending, .. } if pending == vec![ContentType::Summary]));
        assert_eq!(job.state, JobState::Running);
    }

    #[test]
    fn terminal_jobs_reject_results() {
        let mut job = running_job(&[ContentType::Quiz]);
        JobUpdate::Fail("job_deadline_exceeded".into()).apply_to(&mut job).unwrap();
        assert_eq!(job.failure.as_deref(), Some("job_deadline_exceeded"));

        let err = JobUpdate::Result(artifact(ContentType::Quiz)).apply_to(&mut job).unwrap_err();
        assert!(matches!(err, StoreError::JobTerminal { .. }));
        assert!(job.results.is_empty());
    }

    #[test]
    fn second_error_for_same_type_is_duplicate() {
        let mut job = running_job(&[ContentType::Quiz]);
        JobUpdate::Error(error(ContentType::Quiz)).apply_to(&mut job).unwrap();
        let outcome = JobUpdate::Error(error(ContentType::Quiz)).apply_to(&mut job).unwrap();
        assert_eq!(outcome, UpdateOutcome::Duplicate);
        assert_eq!(job.errors.len(), 1);
    }

    #[test]
    fn first_outline_wins() {
        let mut job = running_job(&[ContentType::Quiz]);
        let first = artifact(ContentType::Outline);
        JobUpdate::Outline(first.clone()).apply_to(&mut job).unwrap();
        let outcome = JobUpdate::Outline(artifact(ContentType::Outline)).apply_to(&mut job).unwrap();
        assert_eq!(outcome, UpdateOutcome::Duplicate);
        assert_eq!(job.outline, Some(first));
    }

    #[test]
    fn lease_excludes_other_owners_until_expiry() {
        let mut job = running_job(&[ContentType::Quiz]);
        let now = Utc::now();
        assert!(try_lease(&mut job, "worker-a", Duration::seconds(30), now));
        assert!(!try_lease(&mut job, "worker-b", Duration::seconds(30), now));
        assert!(try_lease(&mut job, "worker-a", Duration::seconds(30), now));
        assert!(try_lease(
            &mut job,
            "worker-b",
            Duration::seconds(30),
            now + Duration::seconds(31)
        ));

        drop_lease(&mut job, "worker-a");
        assert_eq!(job.lease.as_ref().map(|l| l.owner.as_str()), Some("worker-b"));
        drop_lease(&mut job, "worker-b");
        assert!(job.lease.is_none());
    }
}
