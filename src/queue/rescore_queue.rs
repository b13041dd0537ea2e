use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::detection::signals::ScoreFeatures;

#[derive(Debug, Clone)]
pub struct RescoreJob {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub user_id: Uuid,
    pub features: ScoreFeatures,
    pub attempts: u32,
    pub enqueued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueStatus {
    pub queued: usize,
    pub active: usize,
    pub concurrency: u32,
    pub max_attempts: u32,
}

struct Inner {
    jobs: VecDeque<RescoreJob>,
    active: usize,
}

#[derive(Clone)]
pub struct RescoreQueue {
    inner: Arc<Mutex<Inner>>,
    pub concurrency: u32,
    pub max_attempts: u32,
}

impl RescoreQueue {
    pub fn new(concurrency: u32, max_attempts: u32) -> Self {
        RescoreQueue {
            inner: Arc::new(Mutex::new(Inner {
                jobs: VecDeque::new(),
                active: 0,
            })),
            concurrency,
            max_attempts,
        }
    }

    pub async fn enqueue(
        &self,
        transaction_id: Uuid,
        user_id: Uuid,
        features: ScoreFeatures,
    ) -> Uuid {
        let job = RescoreJob {
            id: Uuid::new_v4(),
            transaction_id,
            user_id,
            features,
            attempts: 0,
            enqueued_at: Utc::now(),
        };
        let id = job.id;
        self.inner.lock().await.jobs.push_back(job);
        id
    }

    // Failed jobs go back to the head so their retry is not starved by
    // a deep backlog.
    pub async fn requeue_front(&self, job: RescoreJob) {
        self.inner.lock().await.jobs.push_front(job);
    }

    pub async fn claim(&self) -> Option<RescoreJob> {
        let mut inner = self.inner.lock().await;
        if inner.active >= self.concurrency as usize {
            return None;
        }
        let job = inner.jobs.pop_front()?;
        inner.active += 1;
        Some(job)
    }

    pub async fn release(&self) {
        let mut inner = self.inner.lock().await;
        inner.active = inner.active.saturating_sub(1);
    }

    pub async fn status(&self) -> QueueStatus {
        let inner = self.inner.lock().await;
        QueueStatus {
            queued: inner.jobs.len(),
            active: inner.active,
            concurrency: self.concurrency,
            max_attempts: self.max_attempts,
        }
    }
}

pub fn retry_delay(attempts: u32, base_ms: u64) -> Duration {
    Duration::from_millis(base_ms * attempts as u64)
}
