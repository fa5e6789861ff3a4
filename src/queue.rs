//! Work queue with at-least-once delivery.
//!
//! A delivery that is neither acked nor nacked within the visibility timeout
//! (for example because its worker crashed) becomes deliverable again.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::QueueError;

/// One unit of work: process the job with this id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub job_id: String,
}

/// A work item handed to a worker, tagged so it can be acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub id: u64,
    pub item: WorkItem,
    /// 1 on first delivery, incremented on every redelivery.
    pub attempt: u32,
}

#[async_trait]
pub trait WorkQueue: Send + Sync {
    async fn enqueue(&self, item: WorkItem) -> Result<(), QueueError>;

    /// Wait for the next deliverable item.
    async fn dequeue(&self) -> Result<Delivery, QueueError>;

    /// Processing finished; drop the item.
    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError>;

    /// Processing failed; make the item deliverable again right away.
    async fn nack(&self, delivery: &Delivery) -> Result<(), QueueError>;
}

#[derive(Debug)]
struct Pending {
    item: WorkItem,
    attempt: u32,
}

#[derive(Debug)]
struct InFlight {
    item: WorkItem,
    attempt: u32,
    deadline: Instant,
}

#[derive(Debug, Default)]
struct QueueState {
    ready: VecDeque<Pending>,
    in_flight: HashMap<u64, InFlight>,
    next_id: u64,
    closed: bool,
}

impl QueueState {
    /// Move expired in-flight deliveries back to the ready queue.
    fn reap(&mut self, now: Instant) {
        let expired: Vec<u64> = self
            .in_flight
            .iter()
            .filter(|(_, f)| f.deadline <= now)
            .map(|(id, _)| *id)
            .collect();
        for id in expired {
            if let Some(f) = self.in_flight.remove(&id) {
                warn!(job_id = %f.item.job_id, delivery = id, "visibility timeout expired, redelivering");
                self.ready.push_back(Pending {
                    item: f.item,
                    attempt: f.attempt + 1,
                });
            }
        }
    }
}

/// In-process queue backed by a deque plus an in-flight table.
#[derive(Debug)]
pub struct MemoryWorkQueue {
    state: Mutex<QueueState>,
    notify: Notify,
    visibility_timeout: Duration,
}

impl MemoryWorkQueue {
    pub fn new(visibility_timeout: Duration) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
            visibility_timeout,
        }
    }

    /// Stop handing out work; blocked `dequeue` calls return `Closed`.
    pub async fn close(&self) {
        self.state.lock().await.closed = true;
        self.notify.notify_waiters();
    }

    /// Items waiting plus items in flight.
    pub async fn len(&self) -> usize {
        let state = self.state.lock().await;
        state.ready.len() + state.in_flight.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Time until the earliest in-flight delivery expires.
    fn next_wakeup(&self, state: &QueueState, now: Instant) -> Duration {
        state
            .in_flight
            .values()
            .map(|f| f.deadline.saturating_duration_since(now))
            .min()
            .unwrap_or(self.visibility_timeout)
    }
}

#[async_trait]
impl WorkQueue for MemoryWorkQueue {
    async fn enqueue(&self, item: WorkItem) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(QueueError::Closed);
        }
        debug!(job_id = %item.job_id, "work item enqueued");
        state.ready.push_back(Pending { item, attempt: 1 });
        drop(state);
        self.notify.notify_one();
        Ok(())
    }

    async fn dequeue(&self) -> Result<Delivery, QueueError> {
        loop {
            let notified = self.notify.notified();
            let wait = {
                let mut state = self.state.lock().await;
                if state.closed {
                    return Err(QueueError::Closed);
                }
                let now = Instant::now();
                state.reap(now);
                if let Some(pending) = state.ready.pop_front() {
                    state.next_id += 1;
                    let id = state.next_id;
                    state.in_flight.insert(
                        id,
                        InFlight {
                            item: pending.item.clone(),
                            attempt: pending.attempt,
                            deadline: now + self.visibility_timeout,
                        },
                    );
                    return Ok(Delivery {
                        id,
                        item: pending.item,
                        attempt: pending.attempt,
                    });
                }
                self.next_wakeup(&state, now)
            };
            let _ = tokio::time::timeout(wait, notified).await;
        }
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        state
            .in_flight
            .remove(&delivery.id)
            .map(|_| ())
            .ok_or(QueueError::UnknownDelivery(delivery.id))
    }

    async fn nack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        let f = state
            .in_flight
            .remove(&delivery.id)
            .ok_or(QueueError::UnknownDelivery(delivery.id))?;
        state.ready.push_back(Pending {
            item: f.item,
            attempt: f.attempt + 1,
        });
        drop(state);
        self.notify.notify_one();
        Ok(())
    }
}
