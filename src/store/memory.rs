use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::Mutex;

use super::{JobStore, JobUpdate, UpdateOutcome, drop_lease, try_lease};
use crate::error::StoreError;
use crate::state_machine::Job;

/// In-process job store. Every operation runs under one lock.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    jobs: Mutex<HashMap<String, Job>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, job: &Job) -> Result<(), StoreError> {
        let mut jobs = self.jobs.lock().await;
        if jobs.contains_key(&job.id) {
            return Err(StoreError::AlreadyExists(job.id.clone()));
        }
        jobs.insert(job.id.clone(), job.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Job>, StoreError> {
        Ok(self.jobs.lock().await.get(id).cloned())
    }

    async fn apply(&self, id: &str, update: JobUpdate) -> Result<UpdateOutcome, StoreError> {
        let mut jobs = self.jobs.lock().await;
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        update.apply_to(job)
    }

    async fn acquire_lease(&self, id: &str, owner: &str, ttl: Duration) -> Result<bool, StoreError> {
        let mut jobs = self.jobs.lock().await;
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        Ok(try_lease(job, owner, ttl, Utc::now()))
    }

    async fn release_lease(&self, id: &str, owner: &str) -> Result<(), StoreError> {
        let mut jobs = self.jobs.lock().await;
        if let Some(job) = jobs.get_mut(id) {
            drop_lease(job, owner);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::content::{Audience, ContentType};
    use crate::state_machine::{GenerationRequest, JobError, JobState};

    fn job(types: &[ContentType]) -> Job {
        Job::new(GenerationRequest {
            topic: "Volcanoes".into(),
            audience: Audience::HighSchool,
            content_types: types.iter().copied().collect(),
        })
    }

    #[tokio::test]
    async fn create_then_get() {
        let store = MemoryJobStore::new();
        let job = job(&[ContentType::Quiz]);
        store.create(&job).await.unwrap();

        let loaded = store.get(&job.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, job.id);
        assert!(store.get("missing").await.unwrap().is_none());
        assert!(matches!(
            store.create(&job).await.unwrap_err(),
            StoreError::AlreadyExists(_)
        ));
    }

    #[tokio::test]
    async fn apply_on_unknown_job_is_not_found() {
        let store = MemoryJobStore::new();
        let err = store
            .apply("nope", JobUpdate::Transition(JobState::Running))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn concurrent_writers_do_not_lose_entries() {
        let types = [
            ContentType::StudyGuide,
            ContentType::Flashcards,
            ContentType::Quiz,
            ContentType::LessonPlan,
            ContentType::SlideDeck,
            ContentType::Worksheet,
            ContentType::PodcastScript,
            ContentType::Summary,
        ];
        let store = Arc::new(MemoryJobStore::new());
        let job = job(&types);
        store.create(&job).await.unwrap();
        store
            .apply(&job.id, JobUpdate::Transition(JobState::Running))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for ct in types {
            let store = Arc::clone(&store);
            let id = job.id.clone();
            handles.push(tokio::spawn(async move {
                store
                    .apply(
                        &id,
                        JobUpdate::Error(JobError {
                            content_type: ct,
                            reason: "quality_threshold_not_met".into(),
                        }),
                    )
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let loaded = store.get(&job.id).await.unwrap().unwrap();
        assert_eq!(loaded.errors.len(), types.len());
        assert!(loaded.pending_derivatives().is_empty());
    }

    #[tokio::test]
    async fn lease_is_exclusive() {
        let store = MemoryJobStore::new();
        let job = job(&[ContentType::Quiz]);
        store.create(&job).await.unwrap();

        let ttl = Duration::seconds(60);
        assert!(store.acquire_lease(&job.id, "w1", ttl).await.unwrap());
        assert!(!store.acquire_lease(&job.id, "w2", ttl).await.unwrap());
        store.release_lease(&job.id, "w1").await.unwrap();
        assert!(store.acquire_lease(&job.id, "w2", ttl).await.unwrap());
    }
}
