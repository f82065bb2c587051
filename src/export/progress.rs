//! Progress reporting for export operations
//!
//! The sink emits [`ExportProgress`] events; the total document count is
//! unknown up front, so events carry a running count rather than a
//! percentage. [`ProgressTracker`] renders them as a terminal spinner.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};

/// Progress event emitted by the export sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportProgress {
    /// Another interval of documents has been processed; carries the running count
    Documents(u64),
    /// The export finished successfully; carries the final count
    Completed(u64),
}

impl ExportProgress {
    pub fn count(&self) -> u64 {
        match self {
            ExportProgress::Documents(n) | ExportProgress::Completed(n) => *n,
        }
    }
}

/// Progress tracker for export operations
///
/// Shows a spinner with the running document count and throughput.
pub struct ProgressTracker {
    /// Number of documents processed so far
    processed: AtomicU64,
    /// Start time of the operation
    start_time: Instant,
    /// Spinner (optional, can be disabled)
    bar: Option<ProgressBar>,
}

impl ProgressTracker {
    /// Create a new progress tracker
    ///
    /// # Arguments
    /// * `enable_bar` - Whether to display a spinner
    pub fn new(enable_bar: bool) -> Self {
        let bar = enable_bar.then(|| {
            let bar = ProgressBar::new_spinner();
            if let Ok(style) =
                ProgressStyle::default_spinner().template("{spinner:.green} {pos} documents {msg}")
            {
                bar.set_style(style);
            }
            bar
        });

        Self {
            processed: AtomicU64::new(0),
            start_time: Instant::now(),
            bar,
        }
    }

    /// Apply one progress event
    pub fn observe(&self, event: ExportProgress) {
        let count = event.count();
        self.processed.store(count, Ordering::Relaxed);

        if let Some(ref bar) = self.bar {
            bar.set_position(count);

            let elapsed = self.start_time.elapsed().as_secs_f64();
            if elapsed > 0.0 {
                let speed = count as f64 / elapsed;
                bar.set_message(format!("({:.0} docs/sec)", speed));
            }

            if matches!(event, ExportProgress::Completed(_)) {
                bar.finish_and_clear();
            }
        }
    }

    /// Last reported count
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Clear the spinner (used on cancellation and errors)
    pub fn finish(&self) {
        if let Some(ref bar) = self.bar {
            bar.finish_and_clear();
        }
    }
}
