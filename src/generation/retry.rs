use std::future::Future;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::warn;

use crate::error::GenerationError;

/// Retry behaviour for one generation call site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first call.
    pub max_attempts: u32,
    /// Base delay in milliseconds for exponential backoff.
    pub base_delay_ms: u64,
    /// Multiplier applied per attempt.
    pub factor: u32,
    /// Upper bound for a single delay.
    pub max_delay_ms: u64,
    /// Spread delays by +/-25% so concurrent retries do not line up.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            factor: 2,
            max_delay_ms: 8000,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Delay after the given failed attempt, without jitter.
    /// delay = min(base_delay_ms * factor^(attempt - 1), max_delay_ms)
    pub fn delay_for_attempt(&self, attempt: u32) -> u64 {
        let exp = attempt.saturating_sub(1).min(32);
        let scaled = self
            .base_delay_ms
            .saturating_mul(u64::from(self.factor).saturating_pow(exp));
        scaled.min(self.max_delay_ms)
    }

    /// Delay after the given failed attempt, with jitter applied when enabled.
    pub fn jittered_delay_ms(&self, attempt: u32, rng: &mut impl Rng) -> u64 {
        let capped = self.delay_for_attempt(attempt);
        if capped == 0 || !self.jitter {
            return capped;
        }
        let upper_cap = self.max_delay_ms.max(1) as f64;
        let spread = (capped as f64 * 0.25).max(1.0);
        let lower = (capped as f64 - spread).max(1.0);
        let upper = (capped as f64 + spread).min(upper_cap).max(lower);
        rng.gen_range(lower..=upper).round() as u64
    }
}

/// Run `op` until it succeeds, fails fatally, or runs out of attempts.
///
/// `op` receives the 1-based attempt number. Retryable failures are logged
/// and followed by a backoff sleep, stretched to the provider's retry-after
/// hint when it asks for longer; fatal failures return immediately.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    call_site: &str,
    mut op: F,
) -> Result<T, GenerationError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, GenerationError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(GenerationError::Fatal(msg)) => return Err(GenerationError::Fatal(msg)),
            Err(err) if attempt >= max_attempts => {
                return Err(GenerationError::Retryable(format!(
                    "gave up after {attempt} attempts: {}",
                    err.detail()
                )));
            }
            Err(err) => {
                let backoff_ms = policy.jittered_delay_ms(attempt, &mut rand::thread_rng());
                let delay_ms = backoff_ms.max(err.retry_after_ms().unwrap_or(0));
                warn!(
                    call_site,
                    attempt,
                    max_attempts,
                    delay_ms,
                    reason = %err.detail(),
                    "retrying generation call"
                );
                sleep(Duration::from_millis(delay_ms)).await;
                attempt += 1;
            }
        }
    }
}
