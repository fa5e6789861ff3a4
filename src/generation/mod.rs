//! The text-generation seam and the wrappers the pipeline puts around it.

mod retry;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tracing::trace;

use crate::content::ContentType;
use crate::error::GenerationError;

pub use retry::{RetryPolicy, with_retry};

/// Produces raw model text for a compiled prompt.
///
/// Implementations classify failures: [`GenerationError::Retryable`] for
/// throttling, timeouts and malformed output; [`GenerationError::Fatal`] for
/// anything a retry cannot fix.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        content_type: ContentType,
        max_tokens: u32,
    ) -> Result<String, GenerationError>;
}

/// Caps the number of in-flight provider calls across every job in the
/// process. Callers over the limit wait for a permit.
#[derive(Clone)]
pub struct RateLimitedGenerator {
    inner: Arc<dyn TextGenerator>,
    permits: Arc<Semaphore>,
}

impl RateLimitedGenerator {
    pub fn new(inner: Arc<dyn TextGenerator>, max_in_flight: usize) -> Self {
        Self {
            inner,
            permits: Arc::new(Semaphore::new(max_in_flight.max(1))),
        }
    }

    /// Permits currently free.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

#[async_trait]
impl TextGenerator for RateLimitedGenerator {
    async fn generate(
        &self,
        prompt: &str,
        content_type: ContentType,
        max_tokens: u32,
    ) -> Result<String, GenerationError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| GenerationError::Fatal("generation limiter closed".into()))?;
        trace!(content_type = %content_type, "acquired generation permit");
        self.inner.generate(prompt, content_type, max_tokens).await
    }
}
