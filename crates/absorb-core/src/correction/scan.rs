//! Parallel scan over all spectra of an input set.
//!
//! Each spectrum is one independent task that writes only its own output
//! row. Tasks run to completion; cancellation is checked before a task
//! starts, so the granularity is one whole spectrum.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use absorb_compute::{default_backend, ComputeBackend};
use log::{debug, info, warn};
use ndarray::Array2;

use super::CorrectionError;
use crate::workspace::{Detector, SpectrumSet};

/// Receives one notification per finished spectrum.
///
/// Called concurrently from worker threads, in no particular order.
pub trait ProgressReporter: Send + Sync {
    fn spectrum_done(&self, spectrum: usize, completed: usize, total: usize);
}

/// Discards progress.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn spectrum_done(&self, _spectrum: usize, _completed: usize, _total: usize) {}
}

/// Logs progress at `info` level roughly every tenth of the run.
pub struct LogProgress {
    pub steps: usize,
}

impl Default for LogProgress {
    fn default() -> Self {
        Self { steps: 10 }
    }
}

impl ProgressReporter for LogProgress {
    fn spectrum_done(&self, _spectrum: usize, completed: usize, total: usize) {
        let every = (total / self.steps.max(1)).max(1);
        if completed % every == 0 || completed == total {
            info!(
                "Corrected {completed}/{total} spectra ({:.0}%)",
                100.0 * completed as f64 / total as f64
            );
        }
    }
}

/// Cooperative cancellation flag shared between a run and its caller.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Result of a scan: one row per spectrum plus bookkeeping.
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub values: Array2<f64>,
    /// Spectra without a detector, left at zero.
    pub skipped: usize,
    /// Spectra where at least one scattered path fell back to zero length.
    pub degraded: usize,
}

/// Runs one task per spectrum on a compute backend.
pub struct SpectrumScanScheduler {
    backend: Arc<dyn ComputeBackend>,
    progress: Arc<dyn ProgressReporter>,
    cancel: CancellationToken,
}

impl Default for SpectrumScanScheduler {
    fn default() -> Self {
        Self::new(default_backend())
    }
}

impl SpectrumScanScheduler {
    pub fn new(backend: Arc<dyn ComputeBackend>) -> Self {
        Self {
            backend,
            progress: Arc::new(NoProgress),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn backend(&self) -> &dyn ComputeBackend {
        self.backend.as_ref()
    }

    /// Fill a `num_spectra × width` matrix by running `kernel` for every
    /// spectrum that has a detector.
    ///
    /// `kernel(index, detector, points, row)` writes the row and returns how
    /// many of its elements fell back to a zero-length scattered path.
    /// Spectra without a detector are skipped and stay zero. The first
    /// error returned by any kernel aborts the run; tasks not yet started
    /// are skipped and no output is returned.
    pub fn scan<K>(
        &self,
        input: &SpectrumSet,
        width: usize,
        kernel: K,
    ) -> Result<ScanReport, CorrectionError>
    where
        K: Fn(usize, &Detector, &[f64], &mut [f64]) -> Result<usize, CorrectionError> + Send + Sync,
    {
        let total = input.num_spectra();
        if total == 0 {
            return Err(CorrectionError::NoSpectra);
        }

        let completed = AtomicUsize::new(0);
        let skipped = AtomicUsize::new(0);
        let degraded = AtomicUsize::new(0);
        let aborted = AtomicBool::new(false);
        let failure: Mutex<Option<CorrectionError>> = Mutex::new(None);

        let task = |index: usize, row: &mut [f64]| {
            if aborted.load(Ordering::Relaxed) || self.cancel.is_cancelled() {
                return;
            }
            match input.detector(index) {
                Err(missing) => {
                    debug!("{missing}; leaving its factors at zero");
                    skipped.fetch_add(1, Ordering::Relaxed);
                }
                Ok(detector) => {
                    let points = input.points(index);
                    match kernel(index, detector, &points, row) {
                        Ok(0) => {}
                        Ok(fallbacks) => {
                            warn!(
                                "Spectrum {index}: {fallbacks} scattered path(s) found no exit \
                                 from the sample; using zero length"
                            );
                            degraded.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(err) => {
                            aborted.store(true, Ordering::Relaxed);
                            if let Ok(mut slot) = failure.lock() {
                                slot.get_or_insert(err);
                            }
                            return;
                        }
                    }
                }
            }
            let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
            self.progress.spectrum_done(index, done, total);
        };

        let values = self.backend.parallel_row_fill(total, width, &task)?;

        if let Some(err) = failure.into_inner().ok().flatten() {
            return Err(err);
        }
        if self.cancel.is_cancelled() {
            return Err(CorrectionError::Cancelled);
        }

        Ok(ScanReport {
            values,
            skipped: skipped.into_inner(),
            degraded: degraded.into_inner(),
        })
    }
}
