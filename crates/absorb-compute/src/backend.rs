//! Compute backend trait and device abstraction.
//!
//! The [`ComputeBackend`] trait abstracts over execution environments so
//! that the correction code in `absorb-core` stays agnostic of how the
//! per-spectrum work is scheduled.

use ndarray::Array2;
use thiserror::Error;

/// Errors originating from compute backends.
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Backend not available: {0}")]
    Unavailable(String),

    #[error("Thread pool error: {0}")]
    ThreadPool(String),

    #[error("Output shape error: {0}")]
    Shape(String),
}

/// Describes the capabilities of a compute backend.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub name: String,
    pub backend_type: BackendType,
    pub compute_units: Option<usize>,
}

/// The type of compute backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    Cpu,
    Serial,
}

/// Signature of a per-row fill callback: `(row_index, row_values)`.
pub type RowFill<'a> = dyn Fn(usize, &mut [f64]) + Send + Sync + 'a;

/// Abstraction over compute backends.
pub trait ComputeBackend: Send + Sync {
    /// Return information about the device.
    fn device_info(&self) -> DeviceInfo;

    /// Build a `rows × cols` matrix by calling `fill_fn` once per row.
    ///
    /// Rows may be filled concurrently and in any order. Each call receives
    /// exclusive access to its own zero-initialised row, so no two calls
    /// ever write to the same memory.
    fn parallel_row_fill(
        &self,
        rows: usize,
        cols: usize,
        fill_fn: &RowFill<'_>,
    ) -> Result<Array2<f64>, ComputeError>;
}

/// Runs every row on the calling thread, in index order.
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialBackend;

impl ComputeBackend for SerialBackend {
    fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            name: "Serial (1 thread)".into(),
            backend_type: BackendType::Serial,
            compute_units: Some(1),
        }
    }

    fn parallel_row_fill(
        &self,
        rows: usize,
        cols: usize,
        fill_fn: &RowFill<'_>,
    ) -> Result<Array2<f64>, ComputeError> {
        let mut out = Array2::<f64>::zeros((rows, cols));
        if cols == 0 {
            return Ok(out);
        }
        for (i, mut row) in out.rows_mut().into_iter().enumerate() {
            let slice = row
                .as_slice_mut()
                .ok_or_else(|| ComputeError::Shape("row is not contiguous".into()))?;
            fill_fn(i, slice);
        }
        Ok(out)
    }
}
