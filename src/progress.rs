//! Periodic progress logging for a batch of files.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Default delay between two progress lines.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug)]
struct ProgressState {
    label: String,
    targets: Vec<String>,
    processed: AtomicUsize,
    ticks: AtomicUsize,
}

impl ProgressState {
    fn report(&self) {
        let processed = self.processed.load(Ordering::Acquire);
        let total = self.targets.len();
        match self.targets.get(processed) {
            Some(current) => log::info!(
                "{}: {}/{} files analyzed, current file: {}",
                self.label,
                processed,
                total,
                current
            ),
            None => log::info!("{}: {}/{} files analyzed", self.label, processed, total),
        }
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }
}

/// Background ticker reporting how many targets have been processed.
///
/// The ticker runs as a tokio task until [`stop`](Self::stop) or
/// [`cancel`](Self::cancel) is called; dropping the reporter cancels it.
#[derive(Debug)]
pub struct ProgressReporter {
    state: Arc<ProgressState>,
    runtime: Handle,
    stop_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl ProgressReporter {
    /// Start ticking every `interval` over `targets`.
    pub fn start(runtime: &Handle, label: &str, targets: Vec<String>, interval: Duration) -> Self {
        let state = Arc::new(ProgressState {
            label: label.to_string(),
            targets,
            processed: AtomicUsize::new(0),
            ticks: AtomicUsize::new(0),
        });
        log::info!("{}: {} source files to be analyzed", label, state.targets.len());

        let (stop_tx, stop_rx) = oneshot::channel();
        let task = runtime.spawn(tick(Arc::clone(&state), interval, stop_rx));

        Self {
            state,
            runtime: runtime.clone(),
            stop_tx: Some(stop_tx),
            task: Some(task),
        }
    }

    /// Record one more processed target.
    pub fn next_file(&self) {
        self.state.processed.fetch_add(1, Ordering::AcqRel);
    }

    pub fn processed(&self) -> usize {
        self.state.processed.load(Ordering::Acquire)
    }

    pub fn total(&self) -> usize {
        self.state.targets.len()
    }

    /// Number of periodic reports emitted so far.
    pub fn ticks(&self) -> usize {
        self.state.ticks.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    /// Stop after a successful run.
    pub fn stop(&mut self) {
        if self.shutdown() {
            log::info!(
                "{}: {}/{} source files have been analyzed",
                self.state.label,
                self.processed(),
                self.total()
            );
        }
    }

    /// Stop after a failed or cancelled run.
    pub fn cancel(&mut self) {
        if self.shutdown() {
            log::warn!(
                "{}: analysis stopped after {}/{} source files",
                self.state.label,
                self.processed(),
                self.total()
            );
        }
    }

    /// Signal the task and wait for it. Returns false when already stopped.
    fn shutdown(&mut self) -> bool {
        let Some(task) = self.task.take() else {
            return false;
        };
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Err(e) = self.runtime.block_on(task) {
            log::debug!("Progress task ended abnormally: {}", e);
        }
        true
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn tick(state: Arc<ProgressState>, interval: Duration, mut stop_rx: oneshot::Receiver<()>) {
    let start = tokio::time::Instant::now() + interval;
    let mut ticker = tokio::time::interval_at(start, interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => state.report(),
            _ = &mut stop_rx => break,
        }
    }
}
