//! Job lifecycle entry point shared by the HTTP surface, the CLI and the
//! orchestrator. Every mutation goes through the store's field-level updates.

use std::fmt::Display;
use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, info, warn};

use crate::content::{ContentType, GeneratedArtifact};
use crate::error::{ForgeError, StoreError};
use crate::quality::QualityGate;
use crate::queue::{WorkItem, WorkQueue};
use crate::state_machine::{Job, JobError, JobRequest, JobState};
use crate::store::{JobStore, JobUpdate, UpdateOutcome};

#[derive(Clone)]
pub struct JobManager {
    store: Arc<dyn JobStore>,
    queue: Arc<dyn WorkQueue>,
    gate: QualityGate,
}

impl JobManager {
    pub fn new(store: Arc<dyn JobStore>, queue: Arc<dyn WorkQueue>, gate: QualityGate) -> Self {
        Self { store, queue, gate }
    }

    pub fn gate(&self) -> &QualityGate {
        &self.gate
    }

    /// Validate, persist as PENDING and enqueue. Returns the new job id
    /// without waiting for any generation work.
    pub async fn create_job(&self, request: &JobRequest) -> Result<String, ForgeError> {
        let validated = request.validate()?;
        let job = Job::new(validated);
        let job_id = job.id.clone();
        self.store.create(&job).await?;

        if let Err(err) = self
            .queue
            .enqueue(WorkItem {
                job_id: job_id.clone(),
            })
            .await
        {
            warn!(job_id = %job_id, error = %err, "enqueue failed, failing job");
            // PENDING cannot fail directly; walk the normal path.
            for update in [
                JobUpdate::Transition(JobState::Running),
                JobUpdate::Fail(format!("enqueue failed: {err}")),
            ] {
                if let Err(store_err) = self.store.apply(&job_id, update).await {
                    warn!(job_id = %job_id, error = %store_err, "could not fail unqueued job");
                }
            }
            return Err(err.into());
        }

        info!(
            job_id = %job_id,
            topic = %job.request.topic,
            audience = %job.request.audience,
            content_types = job.request.content_types.len(),
            "job created"
        );
        Ok(job_id)
    }

    pub async fn get_job(&self, job_id: &str) -> Result<Job, ForgeError> {
        self.store
            .get(job_id)
            .await?
            .ok_or_else(|| ForgeError::JobNotFound(job_id.to_string()))
    }

    pub async fn mark_running(&self, job_id: &str) -> Result<UpdateOutcome, ForgeError> {
        let outcome = self
            .store
            .apply(job_id, JobUpdate::Transition(JobState::Running))
            .await?;
        debug!(job_id, ?outcome, "job running");
        Ok(outcome)
    }

    pub async fn record_outline(
        &self,
        job_id: &str,
        artifact: GeneratedArtifact,
    ) -> Result<UpdateOutcome, ForgeError> {
        Ok(self.store.apply(job_id, JobUpdate::Outline(artifact)).await?)
    }

    /// Store one accepted artifact. Artifacts below their type's quality gate
    /// never reach `results`.
    pub async fn record_result(
        &self,
        job_id: &str,
        artifact: GeneratedArtifact,
    ) -> Result<UpdateOutcome, ForgeError> {
        let content_type = artifact.content_type;
        if !self.gate.passes(&artifact.quality, content_type) {
            return Err(StoreError::ArtifactRejected {
                content_type,
                reason: format!(
                    "composite {:.2} below threshold {:.2} or factual accuracy {:.2} below floor {:.2}",
                    artifact.quality.composite,
                    self.gate.threshold(content_type),
                    artifact.quality.dimensions.factual_accuracy,
                    self.gate.factual_floor,
                ),
            }
            .into());
        }
        let composite = artifact.quality.composite;
        let attempts = artifact.attempt_count;
        let outcome = self.store.apply(job_id, JobUpdate::Result(artifact)).await?;
        info!(job_id, content_type = %content_type, composite, attempts, "result recorded");
        Ok(outcome)
    }

    pub async fn record_error(
        &self,
        job_id: &str,
        content_type: ContentType,
        reason: impl Display,
    ) -> Result<UpdateOutcome, ForgeError> {
        let reason = reason.to_string();
        warn!(job_id, content_type = %content_type, reason = %reason, "content type failed");
        Ok(self
            .store
            .apply(
                job_id,
                JobUpdate::Error(JobError {
                    content_type,
                    reason,
                }),
            )
            .await?)
    }

    pub async fn fail(&self, job_id: &str, reason: impl Display) -> Result<UpdateOutcome, ForgeError> {
        let reason = reason.to_string();
        let outcome = self.store.apply(job_id, JobUpdate::Fail(reason.clone())).await?;
        if outcome == UpdateOutcome::Applied {
            warn!(job_id, reason = %reason, "job failed");
        }
        Ok(outcome)
    }

    /// Settle a job whose content types have all landed. Returns the final state.
    pub async fn finalize(&self, job_id: &str) -> Result<JobState, ForgeError> {
        self.store.apply(job_id, JobUpdate::Finalize).await?;
        let job = self.get_job(job_id).await?;
        info!(
            job_id,
            state = %job.state,
            results = job.results.len(),
            errors = job.errors.len(),
            "job finalized"
        );
        Ok(job.state)
    }

    pub async fn acquire_lease(
        &self,
        job_id: &str,
        owner: &str,
        ttl: Duration,
    ) -> Result<bool, ForgeError> {
        Ok(self.store.acquire_lease(job_id, owner, ttl).await?)
    }

    pub async fn release_lease(&self, job_id: &str, owner: &str) -> Result<(), ForgeError> {
        Ok(self.store.release_lease(job_id, owner).await?)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration as StdDuration;

    use super::*;
    use crate::error::QueueError;
    use crate::queue::MemoryWorkQueue;
    use crate::store::MemoryJobStore;
    use crate::testing::artifact;

    fn manager() -> (JobManager, Arc<MemoryWorkQueue>) {
        let queue = Arc::new(MemoryWorkQueue::new(StdDuration::from_secs(60)));
        let manager = JobManager::new(
            Arc::new(MemoryJobStore::new()),
            queue.clone(),
            QualityGate::default(),
        );
        (manager, queue)
    }

    fn request(types: &[&str]) -> JobRequest {
        JobRequest {
            topic: "Photosynthesis".into(),
            audience: "middle_school".into(),
            content_types: types.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn create_persists_pending_and_enqueues() {
        let (manager, queue) = manager();
        let id = manager.create_job(&request(&["quiz"])).await.unwrap();

        let job = manager.get_job(&id).await.unwrap();
        assert_eq!(job.state, JobState::Pending);
        assert!(job.outline.is_none());
        assert_eq!(queue.len().await, 1);

        let delivery = queue.dequeue().await.unwrap();
        assert_eq!(delivery.item.job_id, id);
    }

    #[tokio::test]
    async fn invalid_request_is_not_persisted() {
        let (manager, queue) = manager();
        let err = manager.create_job(&request(&["essay"])).await.unwrap_err();
        assert!(matches!(err, ForgeError::Validation(_)));
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn closed_queue_fails_the_job() {
        let (manager, queue) = manager();
        queue.close().await;
        let err = manager.create_job(&request(&["quiz"])).await.unwrap_err();
        assert!(matches!(err, ForgeError::Queue(QueueError::Closed)));
    }

    #[tokio::test]
    async fn unknown_job_is_not_found() {
        let (manager, _) = manager();
        assert!(matches!(
            manager.get_job("missing").await,
            Err(ForgeError::JobNotFound(id)) if id == "missing"
        ));
    }

    #[tokio::test]
    async fn results_below_threshold_are_rejected() {
        let (manager, _) = manager();
        let id = manager.create_job(&request(&["quiz"])).await.unwrap();
        manager.mark_running(&id).await.unwrap();

        let err = manager
            .record_result(&id, artifact(ContentType::Quiz, 0.55))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ForgeError::Persistence(StoreError::ArtifactRejected { content_type: ContentType::Quiz, .. })
        ));
        assert!(manager.get_job(&id).await.unwrap().results.is_empty());
    }

    #[tokio::test]
    async fn finalize_completes_when_something_succeeded() {
        let (manager, _) = manager();
        let id = manager.create_job(&request(&["quiz", "summary"])).await.unwrap();
        manager.mark_running(&id).await.unwrap();
        manager
            .record_outline(&id, artifact(ContentType::Outline, 0.9))
            .await
            .unwrap();
        manager
            .record_result(&id, artifact(ContentType::Quiz, 0.9))
            .await
            .unwrap();
        manager
            .record_error(&id, ContentType::Summary, "quality_threshold_not_met")
            .await
            .unwrap();

        assert_eq!(manager.finalize(&id).await.unwrap(), JobState::Completed);
        let job = manager.get_job(&id).await.unwrap();
        assert_eq!(job.errors[0].reason, "quality_threshold_not_met");
    }

    #[tokio::test]
    async fn fail_is_idempotent() {
        let (manager, _) = manager();
        let id = manager.create_job(&request(&["quiz"])).await.unwrap();
        manager.mark_running(&id).await.unwrap();
        assert_eq!(manager.fail(&id, "boom").await.unwrap(), UpdateOutcome::Applied);
        assert_eq!(manager.fail(&id, "again").await.unwrap(), UpdateOutcome::Duplicate);
        assert_eq!(manager.get_job(&id).await.unwrap().failure.as_deref(), Some("boom"));
    }
}
