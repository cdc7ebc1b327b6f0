//! Terminal stage: drains a pipeline and reports timings.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, warn};

use crate::event::Timed;
use crate::pipe::Pipe;

/// What a drained pipeline did.
///
/// Only running totals are kept, so a watch that drains for the life of the
/// process holds constant memory. Per-item detail goes to the log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Number of events that reached the sink.
    pub completed: usize,
    /// Longest time any single event took from its start stamp to the sink.
    pub slowest: Duration,
    /// Time since the run started, measured when the pipeline closed.
    pub elapsed: Duration,
}

impl DrainReport {
    fn record(&mut self, item_elapsed: Duration) {
        self.completed += 1;
        self.slowest = self.slowest.max(item_elapsed);
    }
}

/// Consumes `pipeline` until it closes, logging each finished item and the
/// run total measured from `run_started`.
pub async fn drain<T: Timed>(mut pipeline: Pipe<T>, run_started: Instant) -> DrainReport {
    let mut report = DrainReport::default();
    while let Some(event) = pipeline.recv().await {
        let path = event.local_file_name();
        let elapsed = match event.start_time() {
            Some(started) => Instant::now().saturating_duration_since(started),
            None => {
                warn!(path = %path.display(), "Event reached the sink without a start time");
                Duration::ZERO
            }
        };
        info!(path = %path.display(), ?elapsed, "Finished {} ({:?})", path.display(), elapsed);
        report.record(elapsed);
    }
    report.elapsed = Instant::now().saturating_duration_since(run_started);
    info!(
        completed = report.completed,
        slowest = ?report.slowest,
        elapsed = ?report.elapsed,
        "Pipeline drained"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{DownloadEvent, RemoteItem, UploadEvent};
    use crate::pipe::{from_iter, handoff};
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn elapsed_is_measured_from_the_start_stamp() {
        let run_started = Instant::now();
        tokio::time::advance(Duration::from_secs(2)).await;
        let evt = UploadEvent::new("/bag/a.txt", "a.txt").stamp_start(Instant::now());

        let (tx, rx) = handoff();
        let sink = tokio::spawn(drain(rx, run_started));
        tokio::time::advance(Duration::from_secs(3)).await;
        tx.send(evt).await.unwrap();
        drop(tx);

        let report = sink.await.unwrap();
        assert_eq!(report.completed, 1);
        assert_eq!(report.slowest, Duration::from_secs(3));
        assert_eq!(report.elapsed, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn unstamped_event_counts_with_zero_elapsed() {
        let evt = DownloadEvent::new(
            RemoteItem {
                key: "k".into(),
                size: 0,
                etag: String::new(),
            },
            "/bag/k",
        );
        let report = drain(from_iter(vec![evt]), Instant::now()).await;
        assert_eq!(report.completed, 1);
        assert_eq!(report.slowest, Duration::ZERO);
    }

    #[tokio::test]
    async fn empty_pipeline_drains_immediately() {
        let report = drain(from_iter(Vec::<UploadEvent>::new()), Instant::now()).await;
        assert_eq!(report.completed, 0);
    }

    /// Holds a handle so the test can tell when the sink lets go of it.
    struct Tracked {
        path: PathBuf,
        start_time: Option<Instant>,
        _handle: Arc<()>,
    }

    impl Timed for Tracked {
        fn local_file_name(&self) -> &Path {
            &self.path
        }

        fn start_time(&self) -> Option<Instant> {
            self.start_time
        }
    }

    #[tokio::test(start_paused = true)]
    async fn long_drain_keeps_only_totals() {
        let handle = Arc::new(());
        let (tx, rx) = handoff();
        let sink = tokio::spawn(drain(rx, Instant::now()));

        for i in 0..20_000u64 {
            let started = Instant::now();
            if i == 7 {
                tokio::time::advance(Duration::from_secs(9)).await;
            }
            tx.send(Tracked {
                path: PathBuf::from(format!("/bag/{i}")),
                start_time: Some(started),
                _handle: handle.clone(),
            })
            .await
            .unwrap();
        }
        drop(tx);

        let report = sink.await.unwrap();
        assert_eq!(report.completed, 20_000);
        assert_eq!(report.slowest, Duration::from_secs(9));
        assert_eq!(Arc::strong_count(&handle), 1);
    }
}
