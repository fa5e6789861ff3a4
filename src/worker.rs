//! Queue consumers.
//!
//! Each worker dequeues a delivery, runs the orchestrator on it and settles
//! the delivery: `ack` once the job reached a terminal state (or the
//! delivery was a duplicate), `nack` when the job record could not be
//! written so the item is redelivered.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{ForgeError, QueueError};
use crate::orchestrator::{GenerationOrchestrator, ProcessOutcome};
use crate::queue::{Delivery, WorkQueue};

pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    shutdown: watch::Sender<bool>,
}

impl WorkerPool {
    /// Start `count` workers (at least one).
    pub fn spawn(
        count: usize,
        queue: Arc<dyn WorkQueue>,
        orchestrator: GenerationOrchestrator,
    ) -> Self {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let handles = (1..=count.max(1))
            .map(|n| {
                let worker = Worker {
                    id: format!("worker-{n}"),
                    queue: queue.clone(),
                    orchestrator: orchestrator.clone(),
                };
                tokio::spawn(worker.run(shutdown_rx.clone()))
            })
            .collect();
        Self { handles, shutdown }
    }

    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Stop taking new deliveries and wait for in-progress jobs to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for handle in self.handles {
            if let Err(err) = handle.await {
                error!(error = %err, "worker task ended abnormally");
            }
        }
        info!("worker pool stopped");
    }
}

struct Worker {
    id: String,
    queue: Arc<dyn WorkQueue>,
    orchestrator: GenerationOrchestrator,
}

impl Worker {
    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(worker_id = %self.id, "worker started");
        loop {
            let delivery = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
                next = self.queue.dequeue() => match next {
                    Ok(delivery) => delivery,
                    Err(QueueError::Closed) => break,
                    Err(err) => {
                        warn!(worker_id = %self.id, error = %err, "dequeue failed");
                        continue;
                    }
                },
            };
            self.handle(delivery).await;
        }
        info!(worker_id = %self.id, "worker stopped");
    }

    async fn handle(&self, delivery: Delivery) {
        let job_id = delivery.item.job_id.as_str();
        debug!(worker_id = %self.id, job_id, attempt = delivery.attempt, "delivery received");

        let settle = match self.orchestrator.process(job_id, &self.id).await {
            Ok(ProcessOutcome::Settled(state)) => {
                debug!(worker_id = %self.id, job_id, state = %state, "delivery processed");
                self.queue.ack(&delivery).await
            }
            Ok(ProcessOutcome::Duplicate) => self.queue.ack(&delivery).await,
            Err(err @ (ForgeError::Persistence(_) | ForgeError::Io(_) | ForgeError::Json(_))) => {
                warn!(worker_id = %self.id, job_id, error = %err, "persistence failed, requeueing");
                self.queue.nack(&delivery).await
            }
            Err(err) => {
                error!(worker_id = %self.id, job_id, error = %err, "dropping undeliverable job");
                self.queue.ack(&delivery).await
            }
        };

        if let Err(err) = settle {
            warn!(worker_id = %self.id, job_id, error = %err, "could not settle delivery");
        }
    }
}
