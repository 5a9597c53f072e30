//! State of one single-solid correction run.

use absorb_geometry::discretise::LatticeElement;
use absorb_geometry::ShapeQuery;
use log::info;

use super::integrator::{ExactExp, ExpKernel, FastExp, Integrator};
use super::paths::{build_element_set, resolve_scattered};
use super::sampler::WavelengthSampler;
use super::scan::{ScanReport, SpectrumScanScheduler};
use super::{CorrectionError, CorrectionOutput, CorrectionParams, FactorSet, RunSummary};
use crate::types::{AttenuationModel, ElementSet, ExpMethod};
use crate::workspace::{Detector, SpectrumSet};

/// Discretised sample, cached incident paths and attenuation model for a
/// single call. Created at the start of a correction and dropped at its
/// end; nothing survives between runs.
pub struct RunContext<'a> {
    shape: &'a dyn ShapeQuery,
    elements: ElementSet,
    model: AttenuationModel,
    wavelength_points: Option<usize>,
    exp_method: ExpMethod,
}

impl<'a> RunContext<'a> {
    pub fn new(
        shape: &'a dyn ShapeQuery,
        lattice: Vec<LatticeElement>,
        model: AttenuationModel,
        params: &CorrectionParams,
    ) -> Result<Self, CorrectionError> {
        ensure_valid(shape, "sample")?;
        let elements = build_element_set(shape, lattice, &params.beam_direction)?;
        info!(
            "Sample discretised into {} elements, volume {:.4e} m^3",
            elements.len(),
            elements.total_volume()
        );
        Ok(Self {
            shape,
            elements,
            model,
            wavelength_points: params.number_of_wavelength_points,
            exp_method: params.exp_method,
        })
    }

    pub fn elements(&self) -> &ElementSet {
        &self.elements
    }

    pub fn model(&self) -> &AttenuationModel {
        &self.model
    }

    /// Compute one spectrum's factors into `row`; returns the number of
    /// zero-length scattered-path fallbacks.
    pub fn correct_spectrum<E: ExpKernel>(
        &self,
        index: usize,
        detector: &Detector,
        points: &[f64],
        row: &mut [f64],
    ) -> Result<usize, CorrectionError> {
        let pairing = self.model.pairing(index, detector.efixed)?;
        let mut scattered = vec![0.0; self.elements.len()];
        let fallbacks =
            resolve_scattered(self.shape, &self.elements, &detector.position, &mut scattered);
        let integrator = Integrator::<E>::new(&self.elements, &self.model);
        WavelengthSampler::new(points.len(), self.wavelength_points).fill(points, row, |k| {
            integrator.evaluate(&pairing, points[k], &scattered)
        });
        Ok(fallbacks)
    }

    /// Scan all spectra of `input`.
    pub fn run(
        &self,
        input: &SpectrumSet,
        scheduler: &SpectrumScanScheduler,
    ) -> Result<ScanReport, CorrectionError> {
        let width = input.blocksize();
        log_stride(width, self.wavelength_points);
        match self.exp_method {
            ExpMethod::Exact => scheduler.scan(input, width, |i, d, p, row| {
                self.correct_spectrum::<ExactExp>(i, d, p, row)
            }),
            ExpMethod::FastApproximate => scheduler.scan(input, width, |i, d, p, row| {
                self.correct_spectrum::<FastExp>(i, d, p, row)
            }),
        }
    }

    /// Run and package the result as a single "attenuation" factor set.
    pub fn into_output(
        self,
        method: &str,
        input: &SpectrumSet,
        scheduler: &SpectrumScanScheduler,
    ) -> Result<CorrectionOutput, CorrectionError> {
        let report = self.run(input, scheduler)?;
        let summary = RunSummary {
            method: method.to_string(),
            element_count: self.elements.len(),
            discretised_volume: self.elements.total_volume(),
            container_element_count: None,
            container_volume: None,
            wavelength_step: WavelengthSampler::new(input.blocksize(), self.wavelength_points)
                .step(),
            skipped_spectra: report.skipped,
            degraded_spectra: report.degraded,
        };
        Ok(CorrectionOutput {
            factors: vec![FactorSet {
                name: "attenuation",
                spectra: input.attenuation_output(report.values)?,
            }],
            summary,
        })
    }
}

pub(crate) fn ensure_valid(shape: &dyn ShapeQuery, role: &str) -> Result<(), CorrectionError> {
    if shape.has_valid_shape() {
        Ok(())
    } else {
        Err(CorrectionError::InvalidShape(format!(
            "{role} shape has non-positive dimensions or non-finite coordinates"
        )))
    }
}

pub(crate) fn log_stride(bins: usize, requested: Option<usize>) {
    let step = WavelengthSampler::new(bins, requested).step();
    info!("Evaluating every {step} of {bins} wavelength points exactly");
}
