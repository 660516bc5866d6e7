//! Fire-and-forget side effects with retry.
//!
//! Fanout and notification writes are submitted here after the primary write
//! commits. A task is re-run on retryable errors following the configured
//! [`RetryPolicy`]; tasks must therefore be idempotent. Failures are logged
//! and never reach the caller that triggered them.

use std::{
    future::Future,
    mem,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
};

use tokio::task::JoinHandle;

use crate::{config::RetryPolicy, errors::FeedError};

#[derive(Debug, Default)]
struct QueueCounters {
    completed: AtomicU64,
    abandoned: AtomicU64,
    retries: AtomicU64,
}

/// Snapshot of queue outcomes since creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueStats {
    pub completed: u64,
    pub abandoned: u64,
    pub retries: u64,
}

pub struct TaskQueue {
    policy: RetryPolicy,
    handles: Mutex<Vec<JoinHandle<()>>>,
    counters: Arc<QueueCounters>,
}

impl TaskQueue {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            handles: Mutex::new(Vec::new()),
            counters: Arc::new(QueueCounters::default()),
        }
    }

    /// Spawns `task`, retrying it on retryable errors.
    ///
    /// `task` builds a fresh future per attempt.
    pub fn submit<F, Fut>(&self, name: &'static str, task: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), FeedError>> + Send + 'static,
    {
        let policy = self.policy.clone();
        let counters = Arc::clone(&self.counters);
        let handle = tokio::spawn(run_with_retry(name, policy, counters, task));

        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        handles.retain(|handle| !handle.is_finished());
        handles.push(handle);
    }

    /// Waits until every submitted task (including ones submitted meanwhile) has finished.
    pub async fn flush(&self) {
        loop {
            let batch = {
                let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
                mem::take(&mut *handles)
            };
            if batch.is_empty() {
                return;
            }
            for handle in batch {
                if let Err(err) = handle.await {
                    log::warn!("side effect task did not complete: {err}");
                }
            }
        }
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            completed: self.counters.completed.load(Ordering::Relaxed),
            abandoned: self.counters.abandoned.load(Ordering::Relaxed),
            retries: self.counters.retries.load(Ordering::Relaxed),
        }
    }
}

async fn run_with_retry<F, Fut>(name: &'static str, policy: RetryPolicy, counters: Arc<QueueCounters>, task: F)
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<(), FeedError>>,
{
    let mut attempt = 1;
    loop {
        match task().await {
            Ok(()) => {
                counters.completed.fetch_add(1, Ordering::Relaxed);
                if attempt > 1 {
                    log::debug!("{name} succeeded on attempt {attempt}");
                }
                return;
            }
            Err(err) if err.is_retryable() && attempt < policy.max_attempts => {
                let delay = policy.backoff(attempt);
                log::warn!("{name} attempt {attempt} failed: {err}; retrying in {delay:?}");
                counters.retries.fetch_add(1, Ordering::Relaxed);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                counters.abandoned.fetch_add(1, Ordering::Relaxed);
                log::warn!("{name} abandoned after {attempt} attempt(s): {err}");
                return;
            }
        }
    }
}
