//! Bounded-concurrency worker pool with politeness delays.
//!
//! A fixed number of cooperative workers pull indexes from a shared
//! cursor over the item slice; each worker runs one item end-to-end
//! before taking the next, so at most `workers` jobs are in flight at
//! any moment. The only cross-worker state is the cursor and an
//! append-only result accumulator.
//!
//! Politeness toward source servers is fixed-delay, never adaptive: a
//! short pause after each completed item and a longer one between
//! processing batches. A failed item returns `None` and is simply not
//! accumulated; it never cancels sibling workers.

use crate::config::SourceConfig;
use futures::future::join_all;
use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// Worker count and politeness delays for one pool run.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub workers: usize,
    pub url_delay: Duration,
    pub batch_delay: Duration,
}

impl PoolConfig {
    pub fn from_source(config: &SourceConfig) -> Self {
        Self {
            workers: config.workers,
            url_delay: Duration::from_millis(config.url_delay_ms),
            batch_delay: Duration::from_millis(config.batch_delay_ms),
        }
    }

    /// Items per batch; batches are separated by the batch delay.
    fn batch_size(&self) -> usize {
        self.workers.max(1) * 4
    }
}

/// Drive every item through `job` with bounded concurrency, returning
/// the non-`None` results in completion order.
pub async fn run<T, R, F, Fut>(items: Vec<T>, config: &PoolConfig, job: F) -> Vec<R>
where
    T: Clone,
    F: Fn(T) -> Fut,
    Fut: Future<Output = Option<R>>,
{
    let workers = config.workers.max(1);
    let results = Mutex::new(Vec::new());
    let mut first_batch = true;

    for batch in items.chunks(config.batch_size()) {
        if !first_batch {
            sleep(config.batch_delay).await;
        }
        first_batch = false;

        let cursor = AtomicUsize::new(0);
        let worker_futures = (0..workers).map(|worker| {
            let cursor = &cursor;
            let results = &results;
            let job = &job;
            async move {
                let mut completed = 0usize;
                loop {
                    let index = cursor.fetch_add(1, Ordering::SeqCst);
                    let Some(item) = batch.get(index) else { break };
                    if let Some(result) = job(item.clone()).await {
                        results.lock().unwrap().push(result);
                    }
                    completed += 1;
                    if !config.url_delay.is_zero() {
                        sleep(config.url_delay).await;
                    }
                }
                debug!(worker, completed, "worker drained batch");
            }
        });
        join_all(worker_futures).await;
    }

    results.into_inner().unwrap()
}
