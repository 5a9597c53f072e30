//! TOML configuration deserialisation for correction jobs.

use std::path::Path;

use absorb_core::{EnergyMode, ExpMethod};
use absorb_geometry::primitives::Primitive;
use anyhow::Context;
use serde::Deserialize;

/// Top-level job configuration.
#[derive(Debug, Deserialize)]
pub struct JobConfig {
    pub sample: SolidConfig,
    /// Enables the Paalman–Pings correction when present.
    pub container: Option<SolidConfig>,
    #[serde(default)]
    pub correction: CorrectionConfig,
    pub wavelengths: WavelengthSpec,
    #[serde(default, rename = "spectrum")]
    pub spectra: Vec<SpectrumConfig>,
    #[serde(default)]
    pub output: OutputConfig,
}

/// A sample or container: its shape and what it is made of.
#[derive(Debug, Deserialize)]
pub struct SolidConfig {
    pub shape: ShapeConfig,
    pub material: MaterialConfig,
}

/// Shape specification: either a primitive or a mesh file.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ShapeConfig {
    Primitive(Primitive),
    File {
        geometry_file: String,
        /// Multiplier taking file units to metres.
        #[serde(default = "default_scale")]
        scale: f64,
    },
}

fn default_scale() -> f64 {
    1.0
}

/// Material specification.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum MaterialConfig {
    /// Explicit cross-sections (barn) and number density (atoms/Å³).
    Custom {
        name: String,
        absorption_xs: f64,
        scattering_xs: f64,
        number_density: f64,
    },
    /// Built-in element, optionally at reduced number density.
    Library {
        element: String,
        number_density: Option<f64>,
    },
    /// Linear coefficients (m⁻¹) given directly.
    Linear {
        absorption_at_reference: f64,
        scattering: f64,
    },
}

/// Which correction to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodKind {
    /// Raster discretisation of any shape.
    #[default]
    Numerical,
    Cylinder,
    Sphere,
    FlatPlate,
    PaalmanPings,
}

/// Correction parameters from TOML.
#[derive(Debug, Deserialize)]
pub struct CorrectionConfig {
    #[serde(default)]
    pub method: MethodKind,
    /// Raster and flat-plate cell size in mm.
    #[serde(default = "default_element_size")]
    pub element_size: f64,
    #[serde(default = "default_slices")]
    pub num_slices: usize,
    #[serde(default = "default_annuli")]
    pub num_annuli: usize,
    #[serde(default = "default_shells")]
    pub num_shells: usize,
    pub number_of_wavelength_points: Option<usize>,
    #[serde(default)]
    pub exp_method: ExpMethod,
    #[serde(default)]
    pub emode: EnergyMode,
    /// Fixed energy in meV for direct or indirect geometry.
    pub efixed: Option<f64>,
    /// Incident beam direction; detector angles are measured from it.
    #[serde(default = "default_beam")]
    pub beam_direction: [f64; 3],
    /// Worker threads; 0 uses the rayon default.
    #[serde(default)]
    pub threads: usize,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            method: MethodKind::default(),
            element_size: default_element_size(),
            num_slices: default_slices(),
            num_annuli: default_annuli(),
            num_shells: default_shells(),
            number_of_wavelength_points: None,
            exp_method: ExpMethod::default(),
            emode: EnergyMode::default(),
            efixed: None,
            beam_direction: default_beam(),
            threads: 0,
        }
    }
}

fn default_element_size() -> f64 {
    1.0
}
fn default_slices() -> usize {
    8
}
fn default_annuli() -> usize {
    6
}
fn default_shells() -> usize {
    10
}
fn default_beam() -> [f64; 3] {
    [0.0, 0.0, 1.0]
}

/// Wavelength axis (Å): either a range or an explicit list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum WavelengthSpec {
    Range {
        range: [f64; 2],
        bins: usize,
        /// Treat the axis as `bins + 1` bin edges instead of `bins` points.
        #[serde(default)]
        histogram: bool,
    },
    List {
        values: Vec<f64>,
        #[serde(default)]
        histogram: bool,
    },
}

/// One spectrum. A spectrum without a detector is skipped.
#[derive(Debug, Deserialize)]
pub struct SpectrumConfig {
    pub detector: Option<DetectorConfig>,
}

#[derive(Debug, Deserialize)]
pub struct DetectorConfig {
    /// Scattering angle in degrees.
    pub two_theta: f64,
    /// Azimuth in degrees.
    #[serde(default)]
    pub phi: f64,
    /// Sample-to-detector distance (m).
    pub l2: f64,
    /// Per-detector fixed energy (meV), used in indirect mode.
    pub efixed: Option<f64>,
}

/// Output configuration.
#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    /// Output directory (default: "./output").
    #[serde(default = "default_output_dir")]
    pub directory: String,
    /// Whether to save factors as CSV (default: true).
    #[serde(default = "default_true")]
    pub save_csv: bool,
    /// Whether to also save factors and the run summary as JSON (default: false).
    #[serde(default)]
    pub save_json: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_dir(),
            save_csv: true,
            save_json: false,
        }
    }
}

fn default_output_dir() -> String {
    "./output".into()
}
fn default_true() -> bool {
    true
}

/// Load and parse a TOML job configuration file.
pub fn load_config(path: &Path) -> anyhow::Result<JobConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read {}", path.display()))?;
    parse_config(&content).with_context(|| format!("Invalid job file {}", path.display()))
}

pub fn parse_config(content: &str) -> anyhow::Result<JobConfig> {
    let config: JobConfig = toml::from_str(content)?;
    if config.spectra.is_empty() {
        anyhow::bail!("Job defines no [[spectrum]] entries");
    }
    if config.correction.method == MethodKind::PaalmanPings && config.container.is_none() {
        anyhow::bail!("method = \"paalman_pings\" needs a [container] section");
    }
    Ok(config)
}
