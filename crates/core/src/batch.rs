use crate::error::{IngestError, Result};
use futures::stream::{self, StreamExt};
use std::future::Future;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{error, info};

/// Something a batch can report on by path.
pub trait BatchItem {
    fn label(&self) -> PathBuf;
}

impl BatchItem for PathBuf {
    fn label(&self) -> PathBuf {
        self.clone()
    }
}

#[derive(Debug, Default)]
pub struct BatchReport {
    /// Outputs written by successful items, in completion order.
    pub succeeded: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
    pub elapsed: Duration,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}

/// Runs `task` over every item with at most `workers` in flight. A failing
/// item is logged and recorded; it never stops the others.
pub async fn run_batch<T, F, Fut>(items: Vec<T>, workers: usize, task: F) -> Result<BatchReport>
where
    T: BatchItem,
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<PathBuf>>,
{
    if workers == 0 {
        return Err(IngestError::InvalidArgument(
            "worker count must be at least 1".to_string(),
        ));
    }

    let started = Instant::now();
    let total = items.len();

    let outcomes = stream::iter(items.into_iter().map(|item| {
        let label = item.label();
        let pending = task(item);
        async move { (label, pending.await) }
    }))
    .buffer_unordered(workers)
    .collect::<Vec<_>>()
    .await;

    let mut report = BatchReport::default();
    for (label, outcome) in outcomes {
        match outcome {
            Ok(output) => {
                info!(item = %label.display(), output = %output.display(), "converted");
                report.succeeded.push(output);
            }
            Err(failure) => {
                error!(item = %label.display(), reason = %failure, "conversion failed");
                report.failed.push((label, failure.to_string()));
            }
        }
    }
    report.elapsed = started.elapsed();

    info!(
        total,
        succeeded = report.succeeded.len(),
        failed = report.failed.len(),
        elapsed_ms = report.elapsed.as_millis() as u64,
        "batch finished"
    );
    Ok(report)
}
