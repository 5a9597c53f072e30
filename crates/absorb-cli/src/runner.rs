//! Correction runner: ties together geometry, materials, and the engine.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use nalgebra::Vector3;

use absorb_compute::{ComputeBackend, CpuBackend};
use absorb_core::correction::{
    CylinderAbsorption, FlatPlateAbsorption, LogProgress, NumericalAbsorption,
    PaalmanPingsAbsorption, SphereAbsorption,
};
use absorb_core::units::millimetres;
use absorb_core::{
    AbsorptionMethod, CorrectionOutput, CorrectionParams, Detector, LinearCoefficients,
    SpectrumScanScheduler, SpectrumSet,
};
use absorb_geometry::parsers::load_shape;
use absorb_geometry::primitives::Primitive;
use absorb_geometry::ShapeQuery;
use absorb_materials::library;
use absorb_materials::Material;

use crate::config::{JobConfig, MaterialConfig, MethodKind, ShapeConfig, SolidConfig, WavelengthSpec};

/// Everything needed to run one job.
pub struct PreparedJob {
    pub method: Box<dyn AbsorptionMethod>,
    pub input: SpectrumSet,
    pub params: CorrectionParams,
}

/// Resolve shapes and materials and build the input spectra.
pub fn prepare(job: &JobConfig, base_dir: &Path) -> Result<PreparedJob> {
    let sample_coefficients = resolve_coefficients(&job.sample.material).context("[sample] material")?;
    let c = &job.correction;
    let element_size = millimetres(c.element_size);

    let method: Box<dyn AbsorptionMethod> = match c.method {
        MethodKind::Numerical => Box::new(NumericalAbsorption {
            shape: build_shape(&job.sample, base_dir).context("[sample] shape")?,
            coefficients: sample_coefficients,
            element_size,
        }),
        MethodKind::Cylinder => match &job.sample.shape {
            ShapeConfig::Primitive(Primitive::Cylinder(cylinder)) => Box::new(CylinderAbsorption {
                cylinder: cylinder.clone(),
                coefficients: sample_coefficients,
                num_slices: c.num_slices,
                num_annuli: c.num_annuli,
            }),
            other => anyhow::bail!(
                "method = \"cylinder\" needs a cylinder sample shape, got {}",
                shape_kind(other)
            ),
        },
        MethodKind::Sphere => match &job.sample.shape {
            ShapeConfig::Primitive(Primitive::Sphere(sphere)) => Box::new(SphereAbsorption {
                sphere: sphere.clone(),
                coefficients: sample_coefficients,
                num_shells: c.num_shells,
            }),
            other => anyhow::bail!(
                "method = \"sphere\" needs a sphere sample shape, got {}",
                shape_kind(other)
            ),
        },
        MethodKind::FlatPlate => match &job.sample.shape {
            ShapeConfig::Primitive(Primitive::Cuboid(plate)) => Box::new(FlatPlateAbsorption {
                plate: plate.clone(),
                coefficients: sample_coefficients,
                element_size,
            }),
            other => anyhow::bail!(
                "method = \"flat_plate\" needs a cuboid sample shape, got {}",
                shape_kind(other)
            ),
        },
        MethodKind::PaalmanPings => {
            let container = job
                .container
                .as_ref()
                .context("method = \"paalman_pings\" needs a [container] section")?;
            Box::new(PaalmanPingsAbsorption {
                sample: build_shape(&job.sample, base_dir).context("[sample] shape")?,
                sample_coefficients,
                container: build_shape(container, base_dir).context("[container] shape")?,
                container_coefficients: resolve_coefficients(&container.material)
                    .context("[container] material")?,
                element_size,
            })
        }
    };
    if job.container.is_some() && c.method != MethodKind::PaalmanPings {
        log::warn!("[container] is ignored by method {}", method.method_name());
    }

    let [bx, by, bz] = c.beam_direction;
    let params = CorrectionParams {
        number_of_wavelength_points: c.number_of_wavelength_points,
        exp_method: c.exp_method,
        emode: c.emode,
        efixed: c.efixed,
        beam_direction: Vector3::new(bx, by, bz),
    };

    Ok(PreparedJob {
        method,
        input: build_input(job)?,
        params,
    })
}

/// Run a full correction from a parsed job configuration.
pub fn run_correction(job: &JobConfig, base_dir: &Path) -> Result<CorrectionOutput> {
    let prepared = prepare(job, base_dir)?;
    println!(
        "  Method: {}, {} spectra",
        prepared.method.method_name(),
        prepared.input.num_spectra()
    );

    let backend = CpuBackend::with_threads(job.correction.threads)
        .context("Could not start the worker pool")?;
    println!("Backend: {}", backend.device_info().name);
    let scheduler = SpectrumScanScheduler::new(Arc::new(backend))
        .with_progress(Arc::new(LogProgress::default()));

    let output = prepared
        .method
        .correct(&prepared.input, &prepared.params, &scheduler)?;

    let s = &output.summary;
    println!(
        "  Sample: {} elements, {:.4e} m^3",
        s.element_count, s.discretised_volume
    );
    if let (Some(count), Some(volume)) = (s.container_element_count, s.container_volume) {
        println!("  Container: {count} elements, {volume:.4e} m^3");
    }
    println!("  Wavelength step: {}", s.wavelength_step);
    if s.skipped_spectra > 0 {
        println!("  Skipped {} spectra without a detector", s.skipped_spectra);
    }
    if s.degraded_spectra > 0 {
        println!(
            "  Warning: {} spectra used zero-length scattered paths",
            s.degraded_spectra
        );
    }
    Ok(output)
}

fn shape_kind(shape: &ShapeConfig) -> &'static str {
    match shape {
        ShapeConfig::Primitive(primitive) => primitive.kind(),
        ShapeConfig::File { .. } => "mesh file",
    }
}

fn build_shape(solid: &SolidConfig, base_dir: &Path) -> Result<Arc<dyn ShapeQuery>> {
    match &solid.shape {
        ShapeConfig::Primitive(primitive) => {
            println!("  Shape: {}", primitive.kind());
            Ok(Arc::new(primitive.clone()))
        }
        ShapeConfig::File {
            geometry_file,
            scale,
        } => {
            let path = base_dir.join(geometry_file);
            let mesh = load_shape(&path, *scale)
                .with_context(|| format!("Loading {}", path.display()))?;
            println!(
                "  Mesh '{}': {} triangles, {:.4e} m^3",
                geometry_file,
                mesh.num_triangles(),
                mesh.enclosed_volume()
            );
            Ok(Arc::new(mesh))
        }
    }
}

/// Resolve a material specification into linear coefficients (m⁻¹).
pub fn resolve_coefficients(material: &MaterialConfig) -> Result<LinearCoefficients> {
    let provider = match material {
        MaterialConfig::Linear {
            absorption_at_reference,
            scattering,
        } => return Ok(LinearCoefficients::new(*absorption_at_reference, *scattering)),
        MaterialConfig::Custom {
            name,
            absorption_xs,
            scattering_xs,
            number_density,
        } => Material::new(name.as_str(), *absorption_xs, *scattering_xs, *number_density)?,
        MaterialConfig::Library {
            element,
            number_density,
        } => {
            let base = library::lookup(element)?;
            match number_density {
                Some(n) => base.with_number_density(*n)?,
                None => base,
            }
        }
    };
    Ok(LinearCoefficients::from_material(&provider))
}

/// Build the (empty) input spectra from the wavelength axis and detector list.
pub fn build_input(job: &JobConfig) -> Result<SpectrumSet> {
    let (x, histogram) = match &job.wavelengths {
        WavelengthSpec::Range {
            range,
            bins,
            histogram,
        } => {
            let n = if *histogram { bins + 1 } else { *bins };
            let [start, end] = *range;
            let x = (0..n)
                .map(|i| start + (end - start) * i as f64 / (n - 1).max(1) as f64)
                .collect::<Vec<_>>();
            (x, *histogram)
        }
        WavelengthSpec::List { values, histogram } => (values.clone(), *histogram),
    };
    let blocksize = if histogram { x.len().saturating_sub(1) } else { x.len() };
    if blocksize == 0 {
        anyhow::bail!("Wavelength axis has no bins");
    }

    let beam = Vector3::from(job.correction.beam_direction);
    let detectors = job
        .spectra
        .iter()
        .map(|spectrum| {
            let Some(d) = spectrum.detector.as_ref() else {
                return Ok(None);
            };
            let detector = Detector::from_angles_about(&beam, d.two_theta, d.phi, d.l2)
                .context("beam_direction must be finite and non-zero")?;
            Ok(Some(match d.efixed {
                Some(e) => detector.with_efixed(e),
                None => detector,
            }))
        })
        .collect::<Result<Vec<_>>>()?;

    SpectrumSet::with_shared_x(&x, blocksize, detectors).context("Invalid wavelength axis")
}

/// Write one factor set to a CSV file with a metadata header.
pub fn write_factors_csv(
    name: &str,
    spectra: &SpectrumSet,
    output: &CorrectionOutput,
    path: &Path,
) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = std::io::BufWriter::new(
        std::fs::File::create(path).with_context(|| format!("Creating {}", path.display()))?,
    );

    writeln!(file, "# Absorb correction factors: {name}")?;
    writeln!(file, "# Version: {}", env!("CARGO_PKG_VERSION"))?;
    writeln!(file, "# method: {}", output.summary.method)?;
    writeln!(file, "# elements: {}", output.summary.element_count)?;
    writeln!(file, "# wavelength_step: {}", output.summary.wavelength_step)?;
    writeln!(file, "#")?;
    writeln!(file, "spectrum,wavelength_angstrom,factor")?;

    for i in 0..spectra.num_spectra() {
        for (lambda, factor) in spectra.points(i).iter().zip(spectra.y().row(i)) {
            writeln!(file, "{i},{lambda:.6},{factor:.8e}")?;
        }
    }
    file.flush()?;

    println!("Factors written to: {}", path.display());
    Ok(())
}

/// Write the run summary and all factor sets to a JSON file.
pub fn write_output_json(output: &CorrectionOutput, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let factors: serde_json::Map<String, serde_json::Value> = output
        .factors
        .iter()
        .map(|f| {
            let rows: Vec<Vec<f64>> = f.spectra.y().rows().into_iter().map(|r| r.to_vec()).collect();
            (f.name.to_string(), serde_json::json!(rows))
        })
        .collect();
    let document = serde_json::json!({
        "summary": output.summary,
        "factors": factors,
    });

    let json = serde_json::to_string_pretty(&document)
        .map_err(|e| anyhow::anyhow!("JSON serialisation error: {}", e))?;
    std::fs::write(path, json)?;

    println!("Summary (JSON) written to: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use approx::assert_relative_eq;

    const JOB: &str = r#"
[sample]
shape = { type = "cylinder", base_centre = [0.0, -0.002, 0.0], height = 0.004, radius = 0.002 }
material = { absorption_at_reference = 50.0, scattering = 10.0 }

[correction]
method = "cylinder"
num_slices = 2
num_annuli = 4

[wavelengths]
range = [1.0, 3.0]
bins = 4
histogram = true

[[spectrum]]
detector = { two_theta = 90.0, l2 = 1.0 }

[[spectrum]]
"#;

    #[test]
    fn test_histogram_axis_has_bins_plus_one_edges() {
        let job = parse_config(JOB).unwrap();
        let input = build_input(&job).unwrap();
        assert!(input.is_histogram());
        assert_eq!(input.blocksize(), 4);
        assert_eq!(input.x(0).to_vec(), vec![1.0, 1.5, 2.0, 2.5, 3.0]);
        assert!(input.detector(1).is_err());
    }

    #[test]
    fn test_detectors_placed_about_beam() {
        let mut job = parse_config(JOB).unwrap();
        job.correction.beam_direction = [1.0, 0.0, 0.0];
        job.spectra[0].detector.as_mut().unwrap().two_theta = 0.0;
        let input = build_input(&job).unwrap();
        let position = input.detector(0).unwrap().position;
        assert_relative_eq!(position.x, 1.0, max_relative = 1e-12);
        assert!(position.y.abs() < 1e-12 && position.z.abs() < 1e-12);

        job.correction.beam_direction = [0.0, 0.0, 0.0];
        let err = build_input(&job).unwrap_err();
        assert!(err.to_string().contains("non-zero"));
    }

    #[test]
    fn test_library_material_coefficients() {
        let material = MaterialConfig::Library {
            element: "v".into(),
            number_density: Some(0.05),
        };
        let coefficients = resolve_coefficients(&material).unwrap();
        // 5.08 barn × 0.05 Å⁻³ × 100
        assert_relative_eq!(coefficients.absorption_at_reference, 25.4, max_relative = 1e-12);
        assert_relative_eq!(coefficients.scattering, 25.5, max_relative = 1e-12);
        assert!(resolve_coefficients(&MaterialConfig::Library {
            element: "Xx".into(),
            number_density: None,
        })
        .is_err());
    }

    #[test]
    fn test_cylinder_method_rejects_other_shapes() {
        let job = parse_config(&JOB.replace(
            r#"{ type = "cylinder", base_centre = [0.0, -0.002, 0.0], height = 0.004, radius = 0.002 }"#,
            r#"{ type = "sphere", radius = 0.002 }"#,
        ))
        .unwrap();
        let err = prepare(&job, Path::new(".")).err().unwrap();
        assert!(err.to_string().contains("cylinder sample shape, got sphere"));
    }

    #[test]
    fn test_end_to_end_run_writes_csv() {
        let job = parse_config(JOB).unwrap();
        let output = run_correction(&job, Path::new(".")).unwrap();
        let spectra = output.get("attenuation").unwrap();
        assert_eq!(output.summary.skipped_spectra, 1);
        assert!(spectra.y().row(0).iter().all(|&v| v > 0.0 && v < 1.0));

        let dir = std::env::temp_dir().join(format!("absorb-cli-test-{}", std::process::id()));
        let path = dir.join("corrections.csv");
        write_factors_csv("attenuation", spectra, &output, &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let data: Vec<_> = text.lines().filter(|l| !l.starts_with('#')).collect();
        assert_eq!(data[0], "spectrum,wavelength_angstrom,factor");
        assert_eq!(data.len(), 1 + 2 * 4);
        assert!(data[1].starts_with("0,1.250000,"));
        std::fs::remove_dir_all(&dir).ok();
    }
}
