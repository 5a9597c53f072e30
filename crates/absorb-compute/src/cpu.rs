//! CPU compute backend using Rayon for shared-memory parallelism.

use ndarray::Array2;
use rayon::prelude::*;

use crate::backend::{BackendType, ComputeBackend, ComputeError, DeviceInfo, RowFill};

/// CPU backend that spreads rows across a fixed-size Rayon pool.
pub struct CpuBackend {
    num_threads: usize,
    /// Dedicated pool; `None` uses Rayon's global pool.
    pool: Option<rayon::ThreadPool>,
}

impl CpuBackend {
    /// Create a new CPU backend on Rayon's global pool.
    pub fn new() -> Self {
        Self {
            num_threads: rayon::current_num_threads(),
            pool: None,
        }
    }

    /// Create a CPU backend with its own pool of `num_threads` workers.
    /// Zero means "as many as Rayon would choose".
    pub fn with_threads(num_threads: usize) -> Result<Self, ComputeError> {
        if num_threads == 0 {
            return Ok(Self::new());
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|i| format!("absorb-worker-{i}"))
            .build()
            .map_err(|e| ComputeError::ThreadPool(e.to_string()))?;
        Ok(Self {
            num_threads,
            pool: Some(pool),
        })
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ComputeBackend for CpuBackend {
    fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            name: format!("CPU ({} threads)", self.num_threads),
            backend_type: BackendType::Cpu,
            compute_units: Some(self.num_threads),
        }
    }

    fn parallel_row_fill(
        &self,
        rows: usize,
        cols: usize,
        fill_fn: &RowFill<'_>,
    ) -> Result<Array2<f64>, ComputeError> {
        let mut data = vec![0.0; rows * cols];
        if cols > 0 {
            let mut run = || {
                data.par_chunks_mut(cols)
                    .enumerate()
                    .for_each(|(i, row)| fill_fn(i, row));
            };
            match &self.pool {
                Some(pool) => pool.install(run),
                None => run(),
            }
        }

        Array2::from_shape_vec((rows, cols), data).map_err(|e| ComputeError::Shape(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_every_row_filled_once() {
        let backend = CpuBackend::with_threads(4).unwrap();
        let calls = AtomicUsize::new(0);
        let out = backend
            .parallel_row_fill(100, 3, &|i, row| {
                calls.fetch_add(1, Ordering::Relaxed);
                row.iter_mut().for_each(|v| *v = i as f64);
            })
            .unwrap();
        assert_eq!(calls.load(Ordering::Relaxed), 100);
        for i in 0..100 {
            assert_eq!(out[[i, 2]], i as f64);
        }
        assert_eq!(backend.device_info().compute_units, Some(4));
    }

    #[test]
    fn test_empty_rows() {
        let out = CpuBackend::new().parallel_row_fill(5, 0, &|_, _| {}).unwrap();
        assert_eq!(out.dim(), (5, 0));
    }
}
