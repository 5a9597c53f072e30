//! Single-solid correction methods.
//!
//! All four methods run the same numerical integration; they differ only in
//! how the sample is cut into elements:
//!
//! | Method | Shape | Discretisation |
//! |--------|-------|----------------|
//! | [`NumericalAbsorption`] | any [`ShapeQuery`] | cubic raster |
//! | [`CylinderAbsorption`] | [`Cylinder`] | slices × annuli |
//! | [`SphereAbsorption`] | [`Sphere`] | concentric shells |
//! | [`FlatPlateAbsorption`] | [`Cuboid`] | regular grid |

use std::sync::Arc;

use absorb_geometry::discretise::{
    discretise_cuboid, discretise_cylinder, discretise_raster, discretise_sphere,
};
use absorb_geometry::primitives::{Cuboid, Cylinder, Primitive, Sphere};
use absorb_geometry::ShapeQuery;

use super::context::{ensure_valid, RunContext};
use super::scan::SpectrumScanScheduler;
use super::{AbsorptionMethod, CorrectionError, CorrectionOutput, CorrectionParams};
use crate::types::{AttenuationModel, LinearCoefficients};
use crate::workspace::SpectrumSet;

/// Lower bound of the muR range accepted by [`SphereAbsorption`].
pub const SPHERE_MU_R_MIN: f64 = 0.0;
/// Upper bound of the muR range accepted by [`SphereAbsorption`].
pub const SPHERE_MU_R_MAX: f64 = 8.0;

fn model_for(
    coefficients: LinearCoefficients,
    params: &CorrectionParams,
) -> Result<AttenuationModel, CorrectionError> {
    params.validate()?;
    AttenuationModel::new(coefficients, params.emode, params.efixed)
}

/// Any shape, rasterised into cubes of side `element_size` (m).
pub struct NumericalAbsorption {
    pub shape: Arc<dyn ShapeQuery>,
    pub coefficients: LinearCoefficients,
    pub element_size: f64,
}

impl AbsorptionMethod for NumericalAbsorption {
    fn correct(
        &self,
        input: &SpectrumSet,
        params: &CorrectionParams,
        scheduler: &SpectrumScanScheduler,
    ) -> Result<CorrectionOutput, CorrectionError> {
        let model = model_for(self.coefficients, params)?;
        ensure_valid(self.shape.as_ref(), "sample")?;
        let lattice = discretise_raster(self.shape.as_ref(), self.element_size)?;
        RunContext::new(self.shape.as_ref(), lattice, model, params)?.into_output(
            self.method_name(),
            input,
            scheduler,
        )
    }

    fn method_name(&self) -> &str {
        "Numerical"
    }
}

/// Solid cylinder cut into height slices and concentric annuli.
pub struct CylinderAbsorption {
    pub cylinder: Cylinder,
    pub coefficients: LinearCoefficients,
    pub num_slices: usize,
    pub num_annuli: usize,
}

impl AbsorptionMethod for CylinderAbsorption {
    fn correct(
        &self,
        input: &SpectrumSet,
        params: &CorrectionParams,
        scheduler: &SpectrumScanScheduler,
    ) -> Result<CorrectionOutput, CorrectionError> {
        let model = model_for(self.coefficients, params)?;
        let shape = Primitive::Cylinder(self.cylinder.clone());
        ensure_valid(&shape, "sample")?;
        let lattice = discretise_cylinder(&self.cylinder, self.num_slices, self.num_annuli)?;
        RunContext::new(&shape, lattice, model, params)?.into_output(
            self.method_name(),
            input,
            scheduler,
        )
    }

    fn method_name(&self) -> &str {
        "Cylinder"
    }
}

/// Sphere cut into concentric shells.
///
/// Refuses samples whose muR at the longest input wavelength lies outside
/// [`SPHERE_MU_R_MIN`]..=[`SPHERE_MU_R_MAX`].
pub struct SphereAbsorption {
    pub sphere: Sphere,
    pub coefficients: LinearCoefficients,
    pub num_shells: usize,
}

impl SphereAbsorption {
    /// Largest muR the run will see, using total attenuation at the longest
    /// incident or final wavelength.
    pub fn max_mu_r(&self, model: &AttenuationModel, input: &SpectrumSet) -> f64 {
        let longest = input
            .max_x()
            .into_iter()
            .chain(model.fixed_wavelength())
            .fold(0.0, f64::max);
        model.total(longest) * self.sphere.radius
    }
}

impl AbsorptionMethod for SphereAbsorption {
    fn correct(
        &self,
        input: &SpectrumSet,
        params: &CorrectionParams,
        scheduler: &SpectrumScanScheduler,
    ) -> Result<CorrectionOutput, CorrectionError> {
        let model = model_for(self.coefficients, params)?;
        let shape = Primitive::Sphere(self.sphere.clone());
        ensure_valid(&shape, "sample")?;

        let mu_r = self.max_mu_r(&model, input);
        if !(SPHERE_MU_R_MIN..=SPHERE_MU_R_MAX).contains(&mu_r) {
            return Err(CorrectionError::MuROutOfRange {
                mu_r,
                min: SPHERE_MU_R_MIN,
                max: SPHERE_MU_R_MAX,
            });
        }

        let lattice = discretise_sphere(&self.sphere, self.num_shells)?;
        RunContext::new(&shape, lattice, model, params)?.into_output(
            self.method_name(),
            input,
            scheduler,
        )
    }

    fn method_name(&self) -> &str {
        "Sphere"
    }
}

/// Flat plate cut into a regular grid of cells no larger than
/// `element_size` (m).
pub struct FlatPlateAbsorption {
    pub plate: Cuboid,
    pub coefficients: LinearCoefficients,
    pub element_size: f64,
}

impl AbsorptionMethod for FlatPlateAbsorption {
    fn correct(
        &self,
        input: &SpectrumSet,
        params: &CorrectionParams,
        scheduler: &SpectrumScanScheduler,
    ) -> Result<CorrectionOutput, CorrectionError> {
        let model = model_for(self.coefficients, params)?;
        let shape = Primitive::Cuboid(self.plate.clone());
        ensure_valid(&shape, "sample")?;
        let lattice = discretise_cuboid(&self.plate, self.element_size)?;
        RunContext::new(&shape, lattice, model, params)?.into_output(
            self.method_name(),
            input,
            scheduler,
        )
    }

    fn method_name(&self) -> &str {
        "FlatPlate"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::Detector;
    use absorb_geometry::discretise::DiscretiseError;
    use absorb_geometry::primitives::HollowCylinder;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    fn spectra(x: &[f64], detectors: Vec<Option<Detector>>) -> SpectrumSet {
        SpectrumSet::with_shared_x(x, x.len(), detectors).unwrap()
    }

    #[test]
    fn test_flat_plate_transmission_matches_slab_formula() {
        // Beam along +z through a 2 mm plate, detector far downstream:
        // every element sees close to the plate thickness.
        let plate = Cuboid {
            centre: Vector3::zeros(),
            half_extents: Vector3::new(0.01, 0.01, 0.001),
        };
        let method = FlatPlateAbsorption {
            plate,
            coefficients: LinearCoefficients::new(100.0, 0.0),
            element_size: 0.0005,
        };
        let input = spectra(&[1.8], vec![Some(Detector::from_angles(0.0, 0.0, 5.0))]);
        let out = method
            .correct(&input, &CorrectionParams::default(), &SpectrumScanScheduler::default())
            .unwrap();
        let factor = out.get("attenuation").unwrap().y()[[0, 0]];
        assert_relative_eq!(factor, (-100.0f64 * 0.002).exp(), max_relative = 1e-5);
        assert_eq!(out.summary.element_count, 40 * 40 * 4);
    }

    #[test]
    fn test_sphere_mu_r_out_of_range_is_fatal() {
        let method = SphereAbsorption {
            sphere: Sphere {
                centre: Vector3::zeros(),
                radius: 0.01,
            },
            coefficients: LinearCoefficients::new(500.0, 50.0),
            num_shells: 4,
        };
        let input = spectra(&[1.0, 2.0, 3.6], vec![Some(Detector::from_angles(90.0, 0.0, 1.0))]);
        let err = method
            .correct(&input, &CorrectionParams::default(), &SpectrumScanScheduler::default())
            .unwrap_err();
        match &err {
            CorrectionError::MuROutOfRange { mu_r, max, .. } => {
                // (500 · 2 + 50) · 0.01
                assert_relative_eq!(*mu_r, 10.5, max_relative = 1e-12);
                assert_eq!(*max, SPHERE_MU_R_MAX);
                assert!(err.to_string().contains("[0, 8]"));
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_invalid_shape_is_fatal() {
        let method = CylinderAbsorption {
            cylinder: Cylinder::centred(-0.001, 0.004),
            coefficients: LinearCoefficients::new(1.0, 1.0),
            num_slices: 2,
            num_annuli: 2,
        };
        let input = spectra(&[1.8], vec![Some(Detector::from_angles(90.0, 0.0, 1.0))]);
        assert!(matches!(
            method.correct(&input, &CorrectionParams::default(), &SpectrumScanScheduler::default()),
            Err(CorrectionError::InvalidShape(_))
        ));
    }

    #[test]
    fn test_zero_beam_direction_is_fatal() {
        let method = CylinderAbsorption {
            cylinder: Cylinder::centred(0.002, 0.004),
            coefficients: LinearCoefficients::new(1.0, 1.0),
            num_slices: 2,
            num_annuli: 2,
        };
        let input = spectra(&[1.8], vec![Some(Detector::from_angles(90.0, 0.0, 1.0))]);
        let params = CorrectionParams {
            beam_direction: Vector3::zeros(),
            ..Default::default()
        };
        let err = method
            .correct(&input, &params, &SpectrumScanScheduler::default())
            .unwrap_err();
        assert!(matches!(err, CorrectionError::InvalidBeamDirection(_)));
        assert!(err.to_string().contains("non-zero"));
    }

    #[test]
    fn test_tiny_plate_cells_refused() {
        let method = FlatPlateAbsorption {
            plate: Cuboid {
                centre: Vector3::zeros(),
                half_extents: Vector3::new(0.01, 0.01, 0.001),
            },
            coefficients: LinearCoefficients::new(1.0, 1.0),
            element_size: 1e-9,
        };
        let input = spectra(&[1.8], vec![Some(Detector::from_angles(90.0, 0.0, 1.0))]);
        assert!(matches!(
            method.correct(&input, &CorrectionParams::default(), &SpectrumScanScheduler::default()),
            Err(CorrectionError::Discretise(DiscretiseError::TooManyCells { .. }))
        ));
    }

    #[test]
    fn test_coarse_raster_keeps_centre_cell() {
        let method = NumericalAbsorption {
            shape: Arc::new(Primitive::Sphere(Sphere {
                centre: Vector3::new(0.3, 0.3, 0.3),
                radius: 1e-4,
            })),
            coefficients: LinearCoefficients::new(1.0, 1.0),
            element_size: 1.0,
        };
        let input = spectra(&[1.8], vec![Some(Detector::from_angles(90.0, 0.0, 1.0))]);
        let out = method
            .correct(&input, &CorrectionParams::default(), &SpectrumScanScheduler::default())
            .unwrap();
        assert_eq!(out.summary.element_count, 1);
    }

    #[test]
    fn test_raster_missing_the_solid_is_fatal() {
        // A single cell centred in the hollow core of a can.
        let method = NumericalAbsorption {
            shape: Arc::new(Primitive::HollowCylinder(HollowCylinder::centred(0.004, 0.005, 0.01))),
            coefficients: LinearCoefficients::new(1.0, 1.0),
            element_size: 1.0,
        };
        let input = spectra(&[1.8], vec![Some(Detector::from_angles(90.0, 0.0, 1.0))]);
        assert!(matches!(
            method.correct(&input, &CorrectionParams::default(), &SpectrumScanScheduler::default()),
            Err(CorrectionError::NoElements)
        ));
    }
}
