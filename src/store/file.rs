use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use super::{JobStore, JobUpdate, UpdateOutcome, drop_lease, try_lease};
use crate::error::StoreError;
use crate::state_machine::Job;

/// Durable job store: one JSON document per job id inside a directory.
///
/// Read-modify-write cycles are serialized by a store-wide lock and each
/// document is replaced atomically (temp file + rename), so a crash never
/// leaves a half-written record behind.
#[derive(Debug)]
pub struct JsonFileJobStore {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileJobStore {
    /// Open (and create if needed) a store rooted at `dir`.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            lock: Mutex::new(()),
        })
    }

    fn path_for(&self, id: &str) -> Option<PathBuf> {
        let valid = !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
        valid.then(|| self.dir.join(format!("{id}.json")))
    }

    async fn read(&self, id: &str) -> Result<Option<Job>, StoreError> {
        let Some(path) = self.path_for(id) else {
            return Ok(None);
        };
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, job: &Job) -> Result<(), StoreError> {
        let path = self
            .path_for(&job.id)
            .ok_or_else(|| StoreError::NotFound(job.id.clone()))?;
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(job)?;
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(job_id = %job.id, path = %path.display(), "job record written");
        Ok(())
    }

    /// Ids of every job not yet COMPLETED or FAILED, oldest first. Used to
    /// requeue work after a restart.
    pub async fn unsettled(&self) -> Result<Vec<String>, StoreError> {
        let _guard = self.lock.lock().await;
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut jobs = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if let Some(job) = self.read(id).await?
                && !job.state.is_terminal()
            {
                jobs.push((job.created_at, job.id));
            }
        }
        jobs.sort();
        Ok(jobs.into_iter().map(|(_, id)| id).collect())
    }

    async fn load(&self, id: &str) -> Result<Job, StoreError> {
        self.read(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }
}

#[async_trait]
impl JobStore for JsonFileJobStore {
    async fn create(&self, job: &Job) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        if self.read(&job.id).await?.is_some() {
            return Err(StoreError::AlreadyExists(job.id.clone()));
        }
        self.write(job).await
    }

    async fn get(&self, id: &str) -> Result<Option<Job>, StoreError> {
        let _guard = self.lock.lock().await;
        self.read(id).await
    }

    async fn apply(&self, id: &str, update: JobUpdate) -> Result<UpdateOutcome, StoreError> {
        let _guard = self.lock.lock().await;
        let mut job = self.load(id).await?;
        let outcome = update.apply_to(&mut job)?;
        if outcome == UpdateOutcome::Applied {
            self.write(&job).await?;
        }
        Ok(outcome)
    }

    async fn acquire_lease(&self, id: &str, owner: &str, ttl: Duration) -> Result<bool, StoreError> {
        let _guard = self.lock.lock().await;
        let mut job = self.load(id).await?;
        if !try_lease(&mut job, owner, ttl, Utc::now()) {
            return Ok(false);
        }
        self.write(&job).await?;
        Ok(true)
    }

    async fn release_lease(&self, id: &str, owner: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        if let Some(mut job) = self.read(id).await? {
            drop_lease(&mut job, owner);
            self.write(&job).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{Audience, ContentType};
    use crate::state_machine::{GenerationRequest, JobError, JobState};

    fn job() -> Job {
        Job::new(GenerationRequest {
            topic: "Plate tectonics".into(),
            audience: Audience::Undergraduate,
            content_types: [ContentType::Summary, ContentType::Quiz].into(),
        })
    }

    #[tokio::test]
    async fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let job = job();
        {
            let store = JsonFileJobStore::open(dir.path()).await.unwrap();
            store.create(&job).await.unwrap();
            store
                .apply(&job.id, JobUpdate::Transition(JobState::Running))
                .await
                .unwrap();
            store
                .apply(
                    &job.id,
                    JobUpdate::Error(JobError {
                        content_type: ContentType::Quiz,
                        reason: "quality_threshold_not_met".into(),
                    }),
                )
                .await
                .unwrap();
        }

        let reopened = JsonFileJobStore::open(dir.path()).await.unwrap();
        let loaded = reopened.get(&job.id).await.unwrap().unwrap();
        assert_eq!(loaded.state, JobState::Running);
        assert_eq!(loaded.errors.len(), 1);
        assert_eq!(loaded.pending_derivatives(), vec![ContentType::Summary]);
    }

    #[tokio::test]
    async fn path_traversal_ids_are_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileJobStore::open(dir.path()).await.unwrap();
        assert!(store.get("../etc/passwd").await.unwrap().is_none());
        assert!(matches!(
            store
                .apply("../x", JobUpdate::Transition(JobState::Running))
                .await
                .unwrap_err(),
            StoreError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn lease_persists_between_handles() {
        let dir = tempfile::tempdir().unwrap();
        let job = job();
        let a = JsonFileJobStore::open(dir.path()).await.unwrap();
        a.create(&job).await.unwrap();
        assert!(a.acquire_lease(&job.id, "w1", Duration::seconds(60)).await.unwrap());

        let b = JsonFileJobStore::open(dir.path()).await.unwrap();
        assert!(!b.acquire_lease(&job.id, "w2", Duration::seconds(60)).await.unwrap());
    }

    #[tokio::test]
    async fn unsettled_lists_only_open_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileJobStore::open(dir.path()).await.unwrap();
        let open = job();
        let running = job();
        let failed = job();
        for j in [&open, &running, &failed] {
            store.create(j).await.unwrap();
        }
        store
            .apply(&running.id, JobUpdate::Transition(JobState::Running))
            .await
            .unwrap();
        store
            .apply(&failed.id, JobUpdate::Transition(JobState::Running))
            .await
            .unwrap();
        store
            .apply(&failed.id, JobUpdate::Fail("boom".into()))
            .await
            .unwrap();

        let mut ids = store.unsettled().await.unwrap();
        ids.sort();
        let mut expected = vec![open.id.clone(), running.id.clone()];
        expected.sort();
        assert_eq!(ids, expected);
    }
}
