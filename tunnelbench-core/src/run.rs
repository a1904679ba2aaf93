use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::client::RequestOutcome;
use crate::gate::{StopCondition, WorkGate};
use crate::stats::{RunStats, RunSummary};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("`concurrency` must be a positive integer")]
    InvalidConcurrency,

    #[error("one of `duration` or `requests` is required")]
    MissingStopCondition,

    #[error("`duration` and `requests` are mutually exclusive")]
    ConflictingStopCondition,
}

/// Shape of one load run.
#[derive(Debug, Clone, Copy)]
pub struct RunConfig {
    pub concurrency: u64,
    pub duration: Option<Duration>,
    pub requests: Option<u64>,
    /// How many error kinds `RunSummary::top_errors` keeps; 0 disables the list.
    pub top_errors: usize,
}

/// Run `work` from a fixed pool of `concurrency` workers until the stop
/// condition is reached, merging every outcome into shared stats.
///
/// Workers block independently on their own I/O; merging an outcome is the
/// only serialized step. A worker never cancels an in-flight unit: once
/// started it runs to success, failure, or its own timeout before the gate
/// is consulted again. Termination is a plain join of all workers.
pub async fn run_load<F, Fut>(cfg: RunConfig, work: F) -> Result<RunSummary>
where
    F: Fn() -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = RequestOutcome> + Send + 'static,
{
    if cfg.concurrency == 0 {
        return Err(Error::InvalidConcurrency);
    }
    let condition = match (cfg.duration, cfg.requests) {
        (Some(_), Some(_)) => return Err(Error::ConflictingStopCondition),
        (None, None) => return Err(Error::MissingStopCondition),
        (Some(duration), None) => StopCondition::Duration(duration),
        (None, Some(requests)) => StopCondition::Requests(requests),
    };

    let gate = Arc::new(WorkGate::new(condition));
    let stats = Arc::new(RunStats::default());

    let started = Instant::now();
    gate.start_at(started);

    let worker_count = usize::try_from(cfg.concurrency).unwrap_or(usize::MAX);
    let mut handles = Vec::with_capacity(worker_count);
    for _ in 0..cfg.concurrency {
        let gate = gate.clone();
        let stats = stats.clone();
        let work = work.clone();
        handles.push(tokio::spawn(async move {
            while gate.next() {
                let outcome = work().await;
                stats.record(outcome);
            }
        }));
    }

    for handle in handles {
        handle.await?;
    }

    Ok(stats.summarize(started.elapsed(), cfg.top_errors))
}
