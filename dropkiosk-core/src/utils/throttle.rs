// File: dropkiosk-core/src/utils/throttle.rs
//
// Bounded task executor: runs a list of async operations with a concurrency
// cap, each wrapped in retry-with-backoff. Every batch job in this crate
// funnels its work through one of these instead of rebuilding ad-hoc retry
// loops per call site.

use std::time::Duration;
use futures_util::future::BoxFuture;
use futures_util::stream::{self, StreamExt};
use rand::Rng;
use tokio::time::sleep;
use tracing::{debug, warn};

use dropkiosk_common::error::Error;

/// A restartable async operation; called once per attempt.
pub type AsyncTask<T> = Box<dyn Fn() -> BoxFuture<'static, Result<T, Error>> + Send + Sync>;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the first attempt; an operation runs `retry_times + 1`
    /// times before its failure surfaces.
    pub retry_times: u32,
    pub cooldown: Duration,
    /// Add a small random fraction to the cooldown so parallel retries do
    /// not cluster in time.
    pub cooldown_entropy: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_times: 5,
            cooldown: Duration::from_secs(10),
            cooldown_entropy: true,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no backoff.
    pub fn none() -> Self {
        Self {
            retry_times: 0,
            cooldown: Duration::ZERO,
            cooldown_entropy: false,
        }
    }
}

#[derive(Clone)]
pub struct Throttle {
    max_in_progress: usize,
    policy: RetryPolicy,
    label: String,
}

impl Throttle {
    pub fn new(max_in_progress: usize, policy: RetryPolicy, label: impl Into<String>) -> Self {
        Self {
            max_in_progress: max_in_progress.max(1),
            policy,
            label: label.into(),
        }
    }

    /// Run all tasks with at most `max_in_progress` in flight. Results come
    /// back in input order; a task that exhausts its retries yields its own
    /// `Err` without aborting the remaining items.
    pub async fn run_all<T: Send + 'static>(&self, tasks: Vec<AsyncTask<T>>) -> Vec<Result<T, Error>> {
        let max_in_progress = self.max_in_progress;
        let futures: Vec<BoxFuture<'static, Result<T, Error>>> = tasks
            .into_iter()
            .map(|task| {
                let this = self.clone();
                Box::pin(async move { this.run_retryable(task).await })
                    as BoxFuture<'static, Result<T, Error>>
            })
            .collect();
        stream::iter(futures)
            .buffered(max_in_progress)
            .collect()
            .await
    }

    async fn run_retryable<T>(self, task: AsyncTask<T>) -> Result<T, Error> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match task().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt > self.policy.retry_times => {
                    warn!(
                        "{} failed after {} attempt(s): {:?}",
                        self.label, attempt, e
                    );
                    return Err(e);
                }
                Err(e) => {
                    let entropy = if self.policy.cooldown_entropy {
                        0.1 + rand::rng().random::<f64>()
                    } else {
                        0.0
                    };
                    // Progressive backoff: (cooldown + jitter) x attempt number.
                    let cooldown = Duration::from_secs_f64(
                        (self.policy.cooldown.as_secs_f64() + entropy) * attempt as f64,
                    );
                    debug!(
                        "{} attempt {} failed ({:?}), retrying in {:.1}s",
                        self.label,
                        attempt,
                        e,
                        cooldown.as_secs_f64()
                    );
                    sleep(cooldown).await;
                }
            }
        }
    }
}
