//! # Absorb Compute
//!
//! Compute backend abstraction for the Absorb framework. This crate
//! provides a [`ComputeBackend`](backend::ComputeBackend) trait that isolates
//! the correction code from how per-spectrum work is scheduled.
//!
//! ## Available backends
//!
//! | Backend | Feature flag |
//! |---------|-------------|
//! | CPU (Rayon) | `cpu` (default) |
//! | Serial | always |

use std::sync::Arc;

pub mod backend;

#[cfg(feature = "cpu")]
pub mod cpu;

pub use backend::{BackendType, ComputeBackend, ComputeError, DeviceInfo, RowFill, SerialBackend};

#[cfg(feature = "cpu")]
pub use cpu::CpuBackend;

/// The preferred backend for this build: Rayon when available, serial otherwise.
pub fn default_backend() -> Arc<dyn ComputeBackend> {
    #[cfg(feature = "cpu")]
    {
        Arc::new(CpuBackend::new())
    }
    #[cfg(not(feature = "cpu"))]
    {
        Arc::new(SerialBackend)
    }
}
