// SPDX-FileCopyrightText: 2026 Volley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recording job queue for tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use volley_core::{Job, JobQueue, VolleyError};

/// A job the mock queue accepted, with the delay it was scheduled under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledJob {
    pub delay: Duration,
    pub job: Job,
}

/// `JobQueue` implementation that records instead of executing.
#[derive(Default)]
pub struct MockJobQueue {
    scheduled: Arc<Mutex<Vec<ScheduledJob>>>,
}

impl MockJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything scheduled so far, in order.
    pub async fn scheduled(&self) -> Vec<ScheduledJob> {
        self.scheduled.lock().await.clone()
    }

    /// Jobs scheduled with a non-zero delay.
    pub async fn delayed(&self) -> Vec<ScheduledJob> {
        self.scheduled
            .lock()
            .await
            .iter()
            .filter(|entry| entry.delay > Duration::ZERO)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.scheduled.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.scheduled.lock().await.is_empty()
    }
}

#[async_trait]
impl JobQueue for MockJobQueue {
    async fn enqueue(&self, job: &Job) -> Result<(), VolleyError> {
        self.scheduled.lock().await.push(ScheduledJob {
            delay: Duration::ZERO,
            job: job.clone(),
        });
        Ok(())
    }

    async fn schedule_after(&self, delay: Duration, job: &Job) -> Result<(), VolleyError> {
        self.scheduled.lock().await.push(ScheduledJob {
            delay,
            job: job.clone(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_enqueues_and_delays() {
        let queue = MockJobQueue::new();
        queue
            .enqueue(&Job::SendMessage {
                message_id: "m-1".into(),
            })
            .await
            .unwrap();
        queue
            .retry(
                &Job::SendMessage {
                    message_id: "m-1".into(),
                },
                Duration::from_secs(120),
            )
            .await
            .unwrap();

        assert_eq!(queue.len().await, 2);
        let delayed = queue.delayed().await;
        assert_eq!(delayed.len(), 1);
        assert_eq!(delayed[0].delay, Duration::from_secs(120));
    }
}
