use std::{sync::Arc, time::Duration};

use camino::Utf8PathBuf;
use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_stream::{wrappers::IntervalStream, StreamExt};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSample {
    pub percent: u8,
    pub downloaded: u64,
    pub total: u64,
}

impl ProgressSample {
    pub fn new(downloaded: u64, total: u64) -> Self {
        Self {
            percent: percent(downloaded, total),
            downloaded,
            total,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.percent >= 100
    }
}

/// Integer completion, clamped to 100. An empty file is complete from the start.
pub fn percent(downloaded: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    (u128::from(downloaded.min(total)) * 100 / u128::from(total)) as u8
}

pub trait ProgressObserver: Send + Sync {
    fn update_progress(&self, sample: ProgressSample);
}

impl<F> ProgressObserver for F
where
    F: Fn(ProgressSample) + Send + Sync,
{
    fn update_progress(&self, sample: ProgressSample) {
        self(sample)
    }
}

/// Polls the destination's size while a copy is in flight.
pub struct ProgressMonitor {
    path: Utf8PathBuf,
    total: u64,
    interval: Duration,
    observer: Arc<dyn ProgressObserver>,
    last: Option<ProgressSample>,
}

impl ProgressMonitor {
    pub fn new(
        path: Utf8PathBuf,
        total: u64,
        interval: Duration,
        observer: Arc<dyn ProgressObserver>,
    ) -> Self {
        Self {
            path,
            total,
            interval,
            observer,
            last: None,
        }
    }

    /// Runs until the file is complete or `stop` fires. Firing `stop` takes
    /// one last sample, so a finished copy is still reported as 100%.
    pub fn spawn(self, stop: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(stop))
    }

    async fn run(mut self, stop: CancellationToken) {
        let sizes = file_sizes(self.path.clone(), self.interval);
        tokio::pin!(sizes);
        loop {
            tokio::select! {
                _ = stop.cancelled() => {
                    if let Ok(meta) = tokio::fs::metadata(&self.path).await {
                        self.report(meta.len());
                    }
                    break;
                }
                size = sizes.next() => {
                    let Some(size) = size else { break };
                    if self.report(size).is_complete() {
                        tracing::info!("Progress complete");
                        break;
                    }
                }
            }
        }
    }

    /// Sizes never go backwards in a report, even if the file system briefly
    /// shows a smaller one.
    fn report(&mut self, size: u64) -> ProgressSample {
        let downloaded = self.last.map_or(size, |last| last.downloaded.max(size));
        let sample = ProgressSample::new(downloaded, self.total);
        tracing::debug!(percent = sample.percent, "Updating progress");
        self.observer.update_progress(sample);
        self.last = Some(sample);
        sample
    }
}

/// Current file size on every tick. Failed reads are skipped.
fn file_sizes(path: Utf8PathBuf, every: Duration) -> impl Stream<Item = u64> {
    async_stream::stream! {
        let mut ticks = IntervalStream::new(tokio::time::interval(every));
        while ticks.next().await.is_some() {
            match tokio::fs::metadata(&path).await {
                Ok(meta) => yield meta.len(),
                Err(err) => tracing::debug!(path = %path, error = %err, "progress sample failed"),
            }
        }
    }
}
