//! Properties of full correction runs over batches of spectra.
//!
//! - Zero attenuation gives exactly 1 for every method
//! - Factors fall with wavelength and with either coefficient
//! - Repeated runs and different backends agree bit for bit
//! - A badly placed detector only affects its own spectrum
//! - Evaluating every point equals direct evaluation; subsampling interpolates
//! - Inelastic modes pick the right incident/final wavelengths

use std::sync::Arc;

use absorb_compute::{CpuBackend, SerialBackend};
use absorb_core::correction::{
    CylinderAbsorption, FlatPlateAbsorption, NumericalAbsorption, SphereAbsorption,
};
use absorb_core::{
    AbsorptionMethod, CorrectionError, CorrectionParams, Detector, EnergyMode, ExpMethod,
    LinearCoefficients, SpectrumScanScheduler, SpectrumSet,
};
use absorb_geometry::discretise::discretise_sphere;
use absorb_geometry::primitives::{Cuboid, Cylinder, Ellipsoid, Primitive, Sphere};
use approx::assert_relative_eq;
use nalgebra::Vector3;
use ndarray::Array2;

// ─────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────

fn wavelengths(n: usize) -> Vec<f64> {
    (0..n).map(|i| 0.5 + 4.5 * i as f64 / (n - 1) as f64).collect()
}

fn point_spectra(x: &[f64], detectors: Vec<Option<Detector>>) -> SpectrumSet {
    SpectrumSet::with_shared_x(x, x.len(), detectors).unwrap()
}

fn ring_of_detectors(n: usize) -> Vec<Option<Detector>> {
    (0..n)
        .map(|i| Some(Detector::from_angles(20.0 + 150.0 * i as f64 / n as f64, 10.0 * i as f64, 1.5)))
        .collect()
}

fn cylinder(coefficients: LinearCoefficients) -> CylinderAbsorption {
    CylinderAbsorption {
        cylinder: Cylinder::centred(0.002, 0.004),
        coefficients,
        num_slices: 4,
        num_annuli: 6,
    }
}

fn run(method: &dyn AbsorptionMethod, input: &SpectrumSet, params: &CorrectionParams) -> Array2<f64> {
    method
        .correct(input, params, &SpectrumScanScheduler::default())
        .unwrap()
        .get("attenuation")
        .unwrap()
        .y()
        .clone()
}

// ─────────────────────────────────────────────────────────────
// Normalisation
// ─────────────────────────────────────────────────────────────

#[test]
fn test_zero_attenuation_is_exactly_one_for_every_method() {
    let zero = LinearCoefficients::new(0.0, 0.0);
    let methods: Vec<Box<dyn AbsorptionMethod>> = vec![
        Box::new(cylinder(zero)),
        Box::new(SphereAbsorption {
            sphere: Sphere {
                centre: Vector3::zeros(),
                radius: 0.003,
            },
            coefficients: zero,
            num_shells: 5,
        }),
        Box::new(FlatPlateAbsorption {
            plate: Cuboid {
                centre: Vector3::zeros(),
                half_extents: Vector3::new(0.01, 0.01, 0.001),
            },
            coefficients: zero,
            element_size: 0.001,
        }),
        Box::new(NumericalAbsorption {
            shape: Arc::new(Primitive::Ellipsoid(Ellipsoid {
                centre: Vector3::zeros(),
                semi_axes: Vector3::new(0.003, 0.002, 0.0025),
            })),
            coefficients: zero,
            element_size: 0.0002,
        }),
    ];
    let x = wavelengths(12);
    let input = point_spectra(&x, ring_of_detectors(5));
    let direct = CorrectionParams {
        emode: EnergyMode::Direct,
        efixed: Some(25.0),
        ..Default::default()
    };

    for method in &methods {
        for params in [CorrectionParams::default(), direct.clone()] {
            let y = run(method.as_ref(), &input, &params);
            assert!(
                y.iter().all(|&v| v == 1.0),
                "{} ({:?}) produced a factor other than 1",
                method.method_name(),
                params.emode
            );
        }
    }
}

// ─────────────────────────────────────────────────────────────
// Monotonicity
// ─────────────────────────────────────────────────────────────

#[test]
fn test_factor_decreases_with_wavelength() {
    let x = wavelengths(30);
    let input = point_spectra(&x, ring_of_detectors(4));
    let y = run(&cylinder(LinearCoefficients::new(50.0, 10.0)), &input, &Default::default());
    for row in y.rows() {
        for k in 1..row.len() {
            assert!(row[k] < row[k - 1], "not decreasing at bin {k}: {row}");
        }
        assert!(row[0] < 1.0 && row[row.len() - 1] > 0.0);
    }
}

#[test]
fn test_factor_decreases_with_each_coefficient() {
    let input = point_spectra(&[1.8], ring_of_detectors(3));
    let base = run(&cylinder(LinearCoefficients::new(50.0, 10.0)), &input, &Default::default());
    let more_abs = run(&cylinder(LinearCoefficients::new(80.0, 10.0)), &input, &Default::default());
    let more_scat = run(&cylinder(LinearCoefficients::new(50.0, 30.0)), &input, &Default::default());
    for i in 0..3 {
        assert!(more_abs[[i, 0]] < base[[i, 0]]);
        assert!(more_scat[[i, 0]] < base[[i, 0]]);
    }
}

// ─────────────────────────────────────────────────────────────
// Determinism
// ─────────────────────────────────────────────────────────────

#[test]
fn test_repeated_runs_and_backends_agree_exactly() {
    let x = wavelengths(20);
    let input = point_spectra(&x, ring_of_detectors(16));
    let method = cylinder(LinearCoefficients::new(50.0, 10.0));
    let params = CorrectionParams {
        number_of_wavelength_points: Some(6),
        ..Default::default()
    };

    let threaded = SpectrumScanScheduler::new(Arc::new(CpuBackend::with_threads(4).unwrap()));
    let serial = SpectrumScanScheduler::new(Arc::new(SerialBackend));
    let first = method.correct(&input, &params, &threaded).unwrap();
    let second = method.correct(&input, &params, &threaded).unwrap();
    let third = method.correct(&input, &params, &serial).unwrap();

    let y1 = first.get("attenuation").unwrap().y();
    assert_eq!(y1, second.get("attenuation").unwrap().y());
    assert_eq!(y1, third.get("attenuation").unwrap().y());
}

// ─────────────────────────────────────────────────────────────
// Fallback isolation
// ─────────────────────────────────────────────────────────────

#[test]
fn test_degenerate_detector_does_not_affect_other_spectra() {
    let sphere = Sphere {
        centre: Vector3::zeros(),
        radius: 0.003,
    };
    // A detector sitting exactly on an element centroid has no defined
    // scattered direction for that element.
    let on_element = discretise_sphere(&sphere, 4).unwrap()[7].position;
    let method = SphereAbsorption {
        sphere,
        coefficients: LinearCoefficients::new(50.0, 10.0),
        num_shells: 4,
    };
    let good_a = Detector::from_angles(45.0, 0.0, 1.0);
    let good_b = Detector::from_angles(120.0, 30.0, 1.0);
    let x = wavelengths(8);

    let clean = point_spectra(&x, vec![Some(good_a.clone()), Some(good_b.clone())]);
    let mixed = point_spectra(
        &x,
        vec![
            Some(good_a),
            Some(Detector::at(on_element)),
            None,
            Some(good_b),
        ],
    );

    let scheduler = SpectrumScanScheduler::default();
    let clean_out = method.correct(&clean, &Default::default(), &scheduler).unwrap();
    let mixed_out = method.correct(&mixed, &Default::default(), &scheduler).unwrap();
    let yc = clean_out.get("attenuation").unwrap().y();
    let ym = mixed_out.get("attenuation").unwrap().y();

    assert_eq!(yc.row(0), ym.row(0));
    assert_eq!(yc.row(1), ym.row(3));
    assert!(ym.row(1).iter().all(|v| v.is_finite() && *v > 0.0));
    assert!(ym.row(2).iter().all(|&v| v == 0.0));
    assert_eq!(mixed_out.summary.degraded_spectra, 1);
    assert_eq!(mixed_out.summary.skipped_spectra, 1);
}

// ─────────────────────────────────────────────────────────────
// Wavelength sampling
// ─────────────────────────────────────────────────────────────

#[test]
fn test_step_one_matches_direct_evaluation_bitwise() {
    let x = wavelengths(25);
    let input = point_spectra(&x, ring_of_detectors(3));
    let method = cylinder(LinearCoefficients::new(50.0, 10.0));
    let all = run(&method, &input, &Default::default());
    for requested in [25, 100] {
        let params = CorrectionParams {
            number_of_wavelength_points: Some(requested),
            ..Default::default()
        };
        assert_eq!(all, run(&method, &input, &params));
    }
}

#[test]
fn test_subsampled_points_exact_and_gaps_interpolated() {
    let x = wavelengths(41);
    let input = point_spectra(&x, ring_of_detectors(2));
    let method = cylinder(LinearCoefficients::new(50.0, 10.0));
    let exact = run(&method, &input, &Default::default());
    let params = CorrectionParams {
        number_of_wavelength_points: Some(5),
        ..Default::default()
    };
    let sampled = run(&method, &input, &params);

    // 41 bins / 5 points → every 8th bin, plus the last (40).
    for k in [0, 8, 16, 24, 32, 40] {
        assert_eq!(exact[[0, k]], sampled[[0, k]]);
    }
    for (e, s) in exact.iter().zip(sampled.iter()) {
        assert!((e - s).abs() < 2e-3, "interpolated {s} vs exact {e}");
    }
}

#[test]
fn test_histogram_input_uses_bin_centres() {
    let edges = [1.0, 2.0, 3.0, 4.0];
    let centres = [1.5, 2.5, 3.5];
    let detectors = ring_of_detectors(2);
    let hist = SpectrumSet::with_shared_x(&edges, 3, detectors.clone()).unwrap();
    let points = point_spectra(&centres, detectors);
    let method = cylinder(LinearCoefficients::new(50.0, 10.0));
    let out = method
        .correct(&hist, &Default::default(), &SpectrumScanScheduler::default())
        .unwrap();
    let spectra = out.get("attenuation").unwrap();
    assert_eq!(spectra.y(), &run(&method, &points, &Default::default()));
    assert_eq!(spectra.x(0).len(), 4);
    assert!(spectra.is_distribution());
    assert_eq!(spectra.y_unit_label(), "Attenuation factor");
}

// ─────────────────────────────────────────────────────────────
// Exponential policy and energy modes
// ─────────────────────────────────────────────────────────────

#[test]
fn test_fast_exp_close_to_exact() {
    let x = wavelengths(10);
    let input = point_spectra(&x, ring_of_detectors(3));
    let method = cylinder(LinearCoefficients::new(50.0, 10.0));
    let exact = run(&method, &input, &Default::default());
    let fast = run(
        &method,
        &input,
        &CorrectionParams {
            exp_method: ExpMethod::FastApproximate,
            ..Default::default()
        },
    );
    for (e, f) in exact.iter().zip(fast.iter()) {
        assert!(((f - e) / e).abs() < 0.05, "fast {f} vs exact {e}");
    }
}

#[test]
fn test_direct_mode_matches_elastic_at_fixed_wavelength() {
    // EFixed chosen so that λ_fixed is exactly 2 Å.
    let efixed = 81.8042 / 4.0;
    let input = point_spectra(&[1.0, 2.0, 3.0], ring_of_detectors(2));
    let method = cylinder(LinearCoefficients::new(50.0, 10.0));
    let elastic = run(&method, &input, &Default::default());
    let direct = run(
        &method,
        &input,
        &CorrectionParams {
            emode: EnergyMode::Direct,
            efixed: Some(efixed),
            ..Default::default()
        },
    );
    for i in 0..2 {
        assert_relative_eq!(direct[[i, 1]], elastic[[i, 1]], max_relative = 1e-12);
        // Shorter final wavelength attenuates less than elastic 2 Å...
        assert!(direct[[i, 0]] > elastic[[i, 1]]);
        // ...and longer attenuates more.
        assert!(direct[[i, 2]] < elastic[[i, 1]]);
    }
}

#[test]
fn test_indirect_mode_uses_detector_efixed() {
    let method = cylinder(LinearCoefficients::new(50.0, 10.0));
    let x = [2.0];
    let params = CorrectionParams {
        emode: EnergyMode::Indirect,
        ..Default::default()
    };

    let low = Detector::from_angles(90.0, 0.0, 1.0).with_efixed(81.8042 / 4.0);
    let high = Detector::from_angles(90.0, 0.0, 1.0).with_efixed(81.8042);
    let y = run(&method, &point_spectra(&x, vec![Some(low), Some(high)]), &params);
    // Final wavelength 2 Å versus 1 Å for the same incident wavelength.
    assert!(y[[0, 0]] < y[[1, 0]]);

    let missing = point_spectra(&x, vec![Some(Detector::from_angles(90.0, 0.0, 1.0))]);
    let err = method
        .correct(&missing, &params, &SpectrumScanScheduler::default())
        .unwrap_err();
    assert!(matches!(err, CorrectionError::MissingEFixed { spectrum: Some(0) }));
}
