//! Spectrum container consumed and produced by a correction run.
//!
//! A [`SpectrumSet`] holds one row of X/Y/E values per spectrum, all with
//! the same number of bins, plus an optional detector per spectrum. X is
//! wavelength in ångström, ascending along each row; histogram data carries
//! one more X boundary than Y values.

use absorb_geometry::transform::Transform;
use nalgebra::Vector3;
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Y unit label of corrected output.
pub const ATTENUATION_LABEL: &str = "Attenuation factor";

/// Errors raised when building or deriving a spectrum set.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("X has {x_len} columns but Y has {y_len}; expected {y_len} (points) or {} (histogram)", .y_len + 1)]
    BinMismatch { x_len: usize, y_len: usize },

    #[error("{name} has {rows} rows but there are {expected} spectra")]
    RowMismatch {
        name: &'static str,
        rows: usize,
        expected: usize,
    },

    #[error("X values of spectrum {spectrum} are not ascending at index {index}")]
    NotAscending { spectrum: usize, index: usize },
}

/// The spectrum has no associated detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("No detector found for spectrum {spectrum}")]
pub struct DetectorNotFound {
    pub spectrum: usize,
}

/// A detector pixel as seen from the sample position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detector {
    /// Position relative to the sample (m).
    pub position: Vector3<f64>,
    /// Detector-specific fixed energy (meV) for indirect geometry.
    #[serde(default)]
    pub efixed: Option<f64>,
}

impl Detector {
    pub fn at(position: Vector3<f64>) -> Self {
        Self {
            position,
            efixed: None,
        }
    }

    /// Detector at scattering angle `two_theta` and azimuth `phi` (degrees),
    /// distance `l2` (m) from a sample at the origin. Angles are measured
    /// from +z; use [`Detector::from_angles_about`] for any other beam.
    pub fn from_angles(two_theta: f64, phi: f64, l2: f64) -> Self {
        let (sin_tt, cos_tt) = two_theta.to_radians().sin_cos();
        let (sin_phi, cos_phi) = phi.to_radians().sin_cos();
        Self::at(Vector3::new(
            l2 * sin_tt * cos_phi,
            l2 * sin_tt * sin_phi,
            l2 * cos_tt,
        ))
    }

    /// As [`Detector::from_angles`], with `two_theta` measured from `beam`.
    /// The +z frame is rotated onto the beam. `None` for a zero or
    /// non-finite beam.
    pub fn from_angles_about(beam: &Vector3<f64>, two_theta: f64, phi: f64, l2: f64) -> Option<Self> {
        let norm = beam.norm();
        if !norm.is_finite() || norm < f64::EPSILON {
            return None;
        }
        let frame = Transform::aligning(&Vector3::z(), &(beam / norm));
        Some(Self::at(frame.apply(&Self::from_angles(two_theta, phi, l2).position)))
    }

    pub fn with_efixed(mut self, efixed: f64) -> Self {
        self.efixed = Some(efixed);
        self
    }
}

/// Per-spectrum X/Y/E data and detector association.
#[derive(Debug, Clone)]
pub struct SpectrumSet {
    x: Array2<f64>,
    y: Array2<f64>,
    e: Array2<f64>,
    detectors: Vec<Option<Detector>>,
    y_unit_label: String,
    distribution: bool,
}

impl SpectrumSet {
    pub fn new(
        x: Array2<f64>,
        y: Array2<f64>,
        e: Array2<f64>,
        detectors: Vec<Option<Detector>>,
    ) -> Result<Self, WorkspaceError> {
        let spectra = detectors.len();
        for (name, rows) in [("X", x.nrows()), ("Y", y.nrows()), ("E", e.nrows())] {
            if rows != spectra {
                return Err(WorkspaceError::RowMismatch {
                    name,
                    rows,
                    expected: spectra,
                });
            }
        }
        let (x_len, y_len) = (x.ncols(), y.ncols());
        if x_len != y_len && x_len != y_len + 1 {
            return Err(WorkspaceError::BinMismatch { x_len, y_len });
        }
        if e.ncols() != y_len {
            return Err(WorkspaceError::BinMismatch {
                x_len: e.ncols(),
                y_len,
            });
        }
        for (spectrum, row) in x.rows().into_iter().enumerate() {
            if let Some(index) = (1..row.len()).find(|&k| row[k] <= row[k - 1]) {
                return Err(WorkspaceError::NotAscending { spectrum, index });
            }
        }

        Ok(Self {
            x,
            y,
            e,
            detectors,
            y_unit_label: String::new(),
            distribution: false,
        })
    }

    /// Empty spectra sharing one X axis; `blocksize` is the number of Y
    /// values per spectrum.
    pub fn with_shared_x(
        x: &[f64],
        blocksize: usize,
        detectors: Vec<Option<Detector>>,
    ) -> Result<Self, WorkspaceError> {
        let rows = detectors.len();
        let xs = Array2::from_shape_fn((rows, x.len()), |(_, k)| x[k]);
        Self::new(
            xs,
            Array2::zeros((rows, blocksize)),
            Array2::zeros((rows, blocksize)),
            detectors,
        )
    }

    pub fn num_spectra(&self) -> usize {
        self.detectors.len()
    }

    /// Number of Y values per spectrum.
    pub fn blocksize(&self) -> usize {
        self.y.ncols()
    }

    pub fn is_histogram(&self) -> bool {
        self.x.ncols() == self.y.ncols() + 1
    }

    pub fn x(&self, spectrum: usize) -> ArrayView1<'_, f64> {
        self.x.row(spectrum)
    }

    /// The X value each Y value belongs to: bin centres for histograms,
    /// the X values themselves for point data.
    pub fn points(&self, spectrum: usize) -> Vec<f64> {
        let x = self.x.row(spectrum).to_vec();
        if self.is_histogram() {
            x.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect()
        } else {
            x
        }
    }

    /// Largest X value over all spectra.
    pub fn max_x(&self) -> Option<f64> {
        self.x.iter().copied().reduce(f64::max)
    }

    pub fn y(&self) -> &Array2<f64> {
        &self.y
    }

    pub fn e(&self) -> &Array2<f64> {
        &self.e
    }

    pub fn detector(&self, spectrum: usize) -> Result<&Detector, DetectorNotFound> {
        self.detectors
            .get(spectrum)
            .and_then(Option::as_ref)
            .ok_or(DetectorNotFound { spectrum })
    }

    pub fn y_unit_label(&self) -> &str {
        &self.y_unit_label
    }

    /// Whether Y is a non-additive distribution.
    pub fn is_distribution(&self) -> bool {
        self.distribution
    }

    /// Same binning and detectors as `self`, with `factors` as Y, zero E,
    /// and the attenuation-factor metadata.
    pub fn attenuation_output(&self, factors: Array2<f64>) -> Result<Self, WorkspaceError> {
        if factors.dim() != self.y.dim() {
            return Err(WorkspaceError::BinMismatch {
                x_len: factors.ncols(),
                y_len: self.y.ncols(),
            });
        }
        Ok(Self {
            x: self.x.clone(),
            e: Array2::zeros(factors.dim()),
            y: factors,
            detectors: self.detectors.clone(),
            y_unit_label: ATTENUATION_LABEL.to_string(),
            distribution: true,
        })
    }
}
