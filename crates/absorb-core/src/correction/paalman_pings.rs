//! Paalman–Pings correction for a sample inside a container.
//!
//! Both the sample and the container are rasterised (the container raster
//! excludes cells that fall inside the sample). For each element the
//! lengths of its incident and scattered paths through *each* medium are
//! traced, and four volume-weighted factors are integrated:
//!
//! | Factor | Scattering in | Attenuated by |
//! |--------|---------------|---------------|
//! | `ass`  | sample        | sample |
//! | `assc` | sample        | sample and container |
//! | `acc`  | container     | container |
//! | `acsc` | container     | sample and container |

use std::sync::Arc;

use absorb_geometry::discretise::{discretise_raster, discretise_raster_excluding, LatticeElement};
use absorb_geometry::{length_inside, Ray, ShapeQuery};
use log::info;
use nalgebra::Vector3;
use ndarray::s;

use super::context::{ensure_valid, log_stride};
use super::integrator::{attenuation_mean, ExactExp, ExpKernel, FastExp};
use super::sampler::{interpolate, WavelengthSampler};
use super::scan::{ScanReport, SpectrumScanScheduler};
use super::{
    AbsorptionMethod, CorrectionError, CorrectionOutput, CorrectionParams, FactorSet, RunSummary,
};
use crate::types::{AttenuationModel, ElementSet, ExpMethod, LinearCoefficients, VolumeElement};
use crate::workspace::{Detector, SpectrumSet};

/// Output factor names, in row-block order.
pub const FACTOR_NAMES: [&str; 4] = ["ass", "assc", "acc", "acsc"];

/// Path length through the sample and through the container (m).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MediumLengths {
    pub sample: f64,
    pub container: f64,
}

/// Which medium an element belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Medium {
    Sample,
    Container,
}

/// Elements of one medium with their incident lengths through both media.
struct Region {
    medium: Medium,
    elements: ElementSet,
    incident: Vec<MediumLengths>,
}

/// Sample and container correction, both discretised on a cubic raster of
/// side `element_size` (m).
pub struct PaalmanPingsAbsorption {
    pub sample: Arc<dyn ShapeQuery>,
    pub sample_coefficients: LinearCoefficients,
    pub container: Arc<dyn ShapeQuery>,
    pub container_coefficients: LinearCoefficients,
    pub element_size: f64,
}

/// The two solids of a run.
#[derive(Clone, Copy)]
struct Media<'a> {
    sample: &'a dyn ShapeQuery,
    container: &'a dyn ShapeQuery,
}

impl Media<'_> {
    /// Lengths through both media along `ray` for an element of `medium`.
    /// `None` when the ray never crosses the boundary of its own medium.
    fn lengths(&self, medium: Medium, ray: &Ray) -> Option<MediumLengths> {
        let (own, other) = match medium {
            Medium::Sample => (self.sample, self.container),
            Medium::Container => (self.container, self.sample),
        };
        let hits = own.intercept(ray);
        if hits.is_empty() {
            return None;
        }
        let own_length = length_inside(&hits, true);
        let other_length = other.distance_inside(ray);
        Some(match medium {
            Medium::Sample => MediumLengths {
                sample: own_length,
                container: other_length,
            },
            Medium::Container => MediumLengths {
                sample: other_length,
                container: own_length,
            },
        })
    }

    fn build_region(
        &self,
        medium: Medium,
        lattice: Vec<LatticeElement>,
        beam_direction: &Vector3<f64>,
    ) -> Result<Region, CorrectionError> {
        if lattice.is_empty() {
            return Err(CorrectionError::NoElements);
        }
        let backwards = -*beam_direction;
        let mut elements = Vec::with_capacity(lattice.len());
        let mut incident = Vec::with_capacity(lattice.len());
        for (index, cell) in lattice.into_iter().enumerate() {
            let lengths = Ray::new(cell.position, backwards)
                .and_then(|ray| self.lengths(medium, &ray))
                .ok_or(CorrectionError::IncidentPathFailure {
                    element: index,
                    position: cell.position,
                })?;
            let own = match medium {
                Medium::Sample => lengths.sample,
                Medium::Container => lengths.container,
            };
            elements.push(VolumeElement {
                position: cell.position,
                volume: cell.volume,
                incident_path: own,
            });
            incident.push(lengths);
        }
        Ok(Region {
            medium,
            elements: ElementSet::new(elements),
            incident,
        })
    }

    /// Scattered lengths from every element of `region` to `detector`.
    /// Returns the number of zero-length fallbacks.
    fn scattered(
        &self,
        region: &Region,
        detector: &Vector3<f64>,
        out: &mut Vec<MediumLengths>,
    ) -> usize {
        out.clear();
        let mut fallbacks = 0;
        for element in region.elements.elements() {
            let lengths = Ray::towards(element.position, *detector)
                .and_then(|ray| self.lengths(region.medium, &ray));
            out.push(lengths.unwrap_or_else(|| {
                fallbacks += 1;
                MediumLengths::default()
            }));
        }
        fallbacks
    }
}

struct PaalmanPingsContext<'a> {
    media: Media<'a>,
    sample_model: AttenuationModel,
    container_model: AttenuationModel,
    sample_region: Region,
    container_region: Region,
    wavelength_points: Option<usize>,
}

impl PaalmanPingsContext<'_> {
    /// `[ass, assc, acc, acsc]` at one wavelength pair.
    fn factors<E: ExpKernel>(
        &self,
        lambda_i: f64,
        lambda_f: f64,
        sample_out: &[MediumLengths],
        container_out: &[MediumLengths],
    ) -> [f64; 4] {
        let (ms_i, ms_f) = (self.sample_model.total(lambda_i), self.sample_model.total(lambda_f));
        let (mc_i, mc_f) = (
            self.container_model.total(lambda_i),
            self.container_model.total(lambda_f),
        );
        let through_sample =
            |l1: &MediumLengths, l2: &MediumLengths| -(ms_i * l1.sample + ms_f * l2.sample);
        let through_container =
            |l1: &MediumLengths, l2: &MediumLengths| -(mc_i * l1.container + mc_f * l2.container);

        let s = &self.sample_region;
        let c = &self.container_region;
        let ass = attenuation_mean::<E, _>(s.elements.elements(), s.elements.total_volume(), |i| {
            through_sample(&s.incident[i], &sample_out[i])
        });
        let assc = attenuation_mean::<E, _>(s.elements.elements(), s.elements.total_volume(), |i| {
            through_sample(&s.incident[i], &sample_out[i])
                + through_container(&s.incident[i], &sample_out[i])
        });
        let acc = attenuation_mean::<E, _>(c.elements.elements(), c.elements.total_volume(), |i| {
            through_container(&c.incident[i], &container_out[i])
        });
        let acsc = attenuation_mean::<E, _>(c.elements.elements(), c.elements.total_volume(), |i| {
            through_container(&c.incident[i], &container_out[i])
                + through_sample(&c.incident[i], &container_out[i])
        });
        [ass, assc, acc, acsc]
    }

    fn correct_spectrum<E: ExpKernel>(
        &self,
        index: usize,
        detector: &Detector,
        points: &[f64],
        row: &mut [f64],
    ) -> Result<usize, CorrectionError> {
        let pairing = self.sample_model.pairing(index, detector.efixed)?;
        let mut sample_out = Vec::with_capacity(self.sample_region.elements.len());
        let mut container_out = Vec::with_capacity(self.container_region.elements.len());
        let fallbacks = self
            .media
            .scattered(&self.sample_region, &detector.position, &mut sample_out)
            + self
                .media
                .scattered(&self.container_region, &detector.position, &mut container_out);

        let bins = points.len();
        let indices = WavelengthSampler::new(bins, self.wavelength_points).indices();
        for &k in &indices {
            let (lambda_i, lambda_f) = pairing.pair(points[k]);
            let values = self.factors::<E>(lambda_i, lambda_f, &sample_out, &container_out);
            for (block, value) in values.into_iter().enumerate() {
                row[block * bins + k] = value;
            }
        }
        for block in row.chunks_mut(bins.max(1)) {
            interpolate(points, block, &indices);
        }
        Ok(fallbacks)
    }

    fn run(
        &self,
        input: &SpectrumSet,
        scheduler: &SpectrumScanScheduler,
        exp_method: ExpMethod,
    ) -> Result<ScanReport, CorrectionError> {
        let width = FACTOR_NAMES.len() * input.blocksize();
        match exp_method {
            ExpMethod::Exact => scheduler.scan(input, width, |i, d, p, row| {
                self.correct_spectrum::<ExactExp>(i, d, p, row)
            }),
            ExpMethod::FastApproximate => scheduler.scan(input, width, |i, d, p, row| {
                self.correct_spectrum::<FastExp>(i, d, p, row)
            }),
        }
    }
}

impl AbsorptionMethod for PaalmanPingsAbsorption {
    fn correct(
        &self,
        input: &SpectrumSet,
        params: &CorrectionParams,
        scheduler: &SpectrumScanScheduler,
    ) -> Result<CorrectionOutput, CorrectionError> {
        params.validate()?;
        let sample_model = AttenuationModel::new(self.sample_coefficients, params.emode, params.efixed)?;
        let container_model =
            AttenuationModel::new(self.container_coefficients, params.emode, params.efixed)?;
        ensure_valid(self.sample.as_ref(), "sample")?;
        ensure_valid(self.container.as_ref(), "container")?;

        let sample_lattice = discretise_raster(self.sample.as_ref(), self.element_size)?;
        let container_lattice = discretise_raster_excluding(
            self.container.as_ref(),
            self.sample.as_ref(),
            self.element_size,
        )?;

        let media = Media {
            sample: self.sample.as_ref(),
            container: self.container.as_ref(),
        };
        let ctx = PaalmanPingsContext {
            media,
            sample_model,
            container_model,
            sample_region: media.build_region(Medium::Sample, sample_lattice, &params.beam_direction)?,
            container_region: media.build_region(
                Medium::Container,
                container_lattice,
                &params.beam_direction,
            )?,
            wavelength_points: params.number_of_wavelength_points,
        };
        info!(
            "Sample discretised into {} elements ({:.4e} m^3), container into {} ({:.4e} m^3)",
            ctx.sample_region.elements.len(),
            ctx.sample_region.elements.total_volume(),
            ctx.container_region.elements.len(),
            ctx.container_region.elements.total_volume()
        );
        log_stride(input.blocksize(), params.number_of_wavelength_points);

        let report = ctx.run(input, scheduler, params.exp_method)?;
        let bins = input.blocksize();
        let mut factors = Vec::with_capacity(FACTOR_NAMES.len());
        for (block, name) in FACTOR_NAMES.into_iter().enumerate() {
            let values = report
                .values
                .slice(s![.., block * bins..(block + 1) * bins])
                .to_owned();
            factors.push(FactorSet {
                name,
                spectra: input.attenuation_output(values)?,
            });
        }

        Ok(CorrectionOutput {
            factors,
            summary: RunSummary {
                method: self.method_name().to_string(),
                element_count: ctx.sample_region.elements.len(),
                discretised_volume: ctx.sample_region.elements.total_volume(),
                container_element_count: Some(ctx.container_region.elements.len()),
                container_volume: Some(ctx.container_region.elements.total_volume()),
                wavelength_step: WavelengthSampler::new(bins, params.number_of_wavelength_points)
                    .step(),
                skipped_spectra: report.skipped,
                degraded_spectra: report.degraded,
            },
        })
    }

    fn method_name(&self) -> &str {
        "PaalmanPings"
    }
}
