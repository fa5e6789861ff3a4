//! Drives one job from PENDING to a terminal state.
//!
//! The outline is generated first; every requested derivative is then
//! generated concurrently from it. Each unit runs cache lookup, generation
//! with transport retries, parsing, and up to `max_quality_attempts` rounds
//! of quality assessment, regenerating with corrective guidance between
//! rounds.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::cache::{CacheKey, ContentCache};
use crate::content::{self, ContentType, GeneratedArtifact};
use crate::error::{ForgeError, GenerationError, UnitFailure};
use crate::generation::{RetryPolicy, TextGenerator, with_retry};
use crate::manager::JobManager;
use crate::prompt::{PromptResolver, PromptVariables};
use crate::quality::Assessor;
use crate::state_machine::{GenerationRequest, Job, JobState};

/// Failure reason recorded when a job overruns its deadline.
pub const DEADLINE_EXCEEDED: &str = "job_deadline_exceeded";

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Generate-and-assess rounds per content type.
    pub max_quality_attempts: u32,
    /// Concurrent derivative units per job.
    pub max_concurrency: usize,
    pub cache_ttl: Duration,
    pub job_deadline: Duration,
    /// How long a worker's claim on a job survives without being released.
    pub lease_ttl: Duration,
    pub retry: RetryPolicy,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_quality_attempts: 3,
            max_concurrency: 8,
            cache_ttl: Duration::from_secs(24 * 60 * 60),
            job_deadline: Duration::from_secs(15 * 60),
            lease_ttl: Duration::from_secs(16 * 60),
            retry: RetryPolicy::default(),
        }
    }
}

/// What a delivery of a job amounted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The job reached this terminal state during this delivery.
    Settled(JobState),
    /// Another worker owns the job, or it was already terminal.
    Duplicate,
}

#[derive(Clone)]
pub struct GenerationOrchestrator {
    generator: Arc<dyn TextGenerator>,
    prompts: Arc<dyn PromptResolver>,
    assessor: Arc<dyn Assessor>,
    cache: Arc<dyn ContentCache>,
    manager: JobManager,
    settings: PipelineSettings,
}

impl GenerationOrchestrator {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        prompts: Arc<dyn PromptResolver>,
        assessor: Arc<dyn Assessor>,
        cache: Arc<dyn ContentCache>,
        manager: JobManager,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            generator,
            prompts,
            assessor,
            cache,
            manager,
            settings,
        }
    }

    pub fn manager(&self) -> &JobManager {
        &self.manager
    }

    /// Process one delivery of `job_id` on behalf of `worker_id`.
    ///
    /// Safe under at-least-once delivery: a job leased by another live worker
    /// or already terminal is left untouched, and a RUNNING job whose previous
    /// owner vanished is resumed, regenerating only unsettled content types.
    pub async fn process(&self, job_id: &str, worker_id: &str) -> Result<ProcessOutcome, ForgeError> {
        let lease_ttl = chrono::Duration::from_std(self.settings.lease_ttl)
            .unwrap_or_else(|_| chrono::Duration::minutes(16));
        if !self.manager.acquire_lease(job_id, worker_id, lease_ttl).await? {
            info!(job_id, worker_id, "job leased by another worker, skipping duplicate delivery");
            return Ok(ProcessOutcome::Duplicate);
        }

        let result = self.process_leased(job_id, worker_id).await;

        if let Err(err) = self.manager.release_lease(job_id, worker_id).await {
            warn!(job_id, worker_id, error = %err, "could not release lease");
        }
        result
    }

    async fn process_leased(&self, job_id: &str, worker_id: &str) -> Result<ProcessOutcome, ForgeError> {
        let job = self.manager.get_job(job_id).await?;
        if job.state.is_terminal() {
            info!(job_id, state = %job.state, "job already settled, skipping duplicate delivery");
            return Ok(ProcessOutcome::Duplicate);
        }

        match timeout(self.settings.job_deadline, self.run(job, worker_id)).await {
            Ok(result) => result.map(ProcessOutcome::Settled),
            Err(_) => {
                warn!(job_id, deadline = ?self.settings.job_deadline, "job deadline exceeded");
                self.manager.fail(job_id, DEADLINE_EXCEEDED).await?;
                Ok(ProcessOutcome::Settled(JobState::Failed))
            }
        }
    }

    async fn run(&self, job: Job, worker_id: &str) -> Result<JobState, ForgeError> {
        let job_id = job.id.as_str();
        let resumed = job.state == JobState::Running;
        self.manager.mark_running(job_id).await?;
        if resumed {
            info!(
                job_id,
                worker_id,
                settled = job.results.len() + job.errors.len(),
                "resuming interrupted job"
            );
        } else {
            info!(job_id, worker_id, "job started");
        }

        let outline = match job.outline.clone() {
            Some(outline) => outline,
            None => match self.generate_unit(&job.request, ContentType::Outline, None).await {
                Ok(outline) => {
                    self.manager.record_outline(job_id, outline.clone()).await?;
                    outline
                }
                Err(failure) => {
                    self.manager
                        .fail(job_id, format!("outline generation failed: {failure}"))
                        .await?;
                    return Ok(JobState::Failed);
                }
            },
        };

        if job.request.content_types.contains(&ContentType::Outline)
            && !job.is_settled(ContentType::Outline)
        {
            self.manager.record_result(job_id, outline.clone()).await?;
        }

        let pending = job.pending_derivatives();
        if !pending.is_empty() {
            self.fan_out(&job, &outline, pending).await?;
        }

        self.manager.finalize(job_id).await
    }

    /// Generate every pending derivative concurrently, bounded by
    /// `max_concurrency`. Each unit records its own outcome.
    async fn fan_out(
        &self,
        job: &Job,
        outline: &GeneratedArtifact,
        pending: Vec<ContentType>,
    ) -> Result<(), ForgeError> {
        let permits = Arc::new(Semaphore::new(
            pending.len().min(self.settings.max_concurrency.max(1)),
        ));
        let outline_text: Arc<str> = Arc::from(outline.text());
        let mut units = JoinSet::new();

        for content_type in pending {
            let this = self.clone();
            let permits = permits.clone();
            let outline_text = outline_text.clone();
            let request = job.request.clone();
            let job_id = job.id.clone();
            units.spawn(async move {
                // The semaphore is never closed.
                let _permit = permits.acquire_owned().await.ok();
                let outcome = this
                    .generate_unit(&request, content_type, Some(&*outline_text))
                    .await;
                match outcome {
                    Ok(artifact) => this.manager.record_result(&job_id, artifact).await,
                    Err(failure) => {
                        this.manager
                            .record_error(&job_id, content_type, failure)
                            .await
                    }
                }
            });
        }

        let mut first_error = None;
        while let Some(joined) = units.join_next().await {
            match joined {
                Ok(Ok(_)) => {}
                Ok(Err(err)) => {
                    error!(job_id = %job.id, error = %err, "could not record unit outcome");
                    first_error.get_or_insert(err);
                }
                Err(join_err) => {
                    error!(job_id = %job.id, error = %join_err, "generation unit panicked");
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// One content type, end to end. Returns the accepted artifact or the
    /// reason the type could not be produced.
    async fn generate_unit(
        &self,
        request: &GenerationRequest,
        content_type: ContentType,
        outline: Option<&str>,
    ) -> Result<GeneratedArtifact, UnitFailure> {
        let gate = self.manager.gate();
        let key = CacheKey::fingerprint(&request.topic, request.audience, content_type, outline);

        match self.cache.get(&key).await {
            Ok(Some(hit)) if gate.passes(&hit.quality, content_type) => {
                debug!(content_type = %content_type, key = %key, "cache hit");
                return Ok(hit);
            }
            Ok(_) => {}
            Err(err) => warn!(content_type = %content_type, error = %err, "cache read failed"),
        }

        let mut vars = PromptVariables::new(request.topic.clone(), request.audience);
        if let Some(outline) = outline {
            vars = vars.with_outline(outline);
        }

        let mut calls = 0u32;
        for round in 1..=self.settings.max_quality_attempts.max(1) {
            let prompt = self
                .prompts
                .compile(content_type, &vars)
                .map_err(|e| UnitFailure::GenerationFailed(e.to_string()))?;

            let (text, body) = with_retry(&self.settings.retry, content_type.as_str(), |_| {
                calls += 1;
                let generator = self.generator.clone();
                let prompt = prompt.clone();
                async move {
                    let text = generator
                        .generate(&prompt, content_type, content_type.max_tokens())
                        .await?;
                    let body = content::parse(content_type, &text)?;
                    Ok::<_, GenerationError>((text, body))
                }
            })
            .await
            .map_err(|e| UnitFailure::GenerationFailed(e.to_string()))?;

            let report = self.assessor.assess(&text, content_type, request.audience);
            if gate.passes(&report.scores, content_type) {
                let artifact = GeneratedArtifact::new(content_type, body, report.scores, calls);
                if let Err(err) = self.cache.put(&key, &artifact, self.settings.cache_ttl).await {
                    warn!(content_type = %content_type, error = %err, "cache write failed");
                }
                return Ok(artifact);
            }

            info!(
                content_type = %content_type,
                attempt = round,
                composite = report.scores.composite,
                threshold = gate.threshold(content_type),
                "draft below quality threshold"
            );
            vars = vars.with_guidance(Some(report.guidance()));
        }

        Err(UnitFailure::QualityThresholdNotMet)
    }
}
