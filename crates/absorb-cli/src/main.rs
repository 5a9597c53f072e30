//! Absorb command-line interface.
//!
//! Run corrections from TOML configuration files:
//! ```sh
//! absorb-cli run job.toml
//! absorb-cli validate job.toml
//! absorb-cli materials
//! ```

mod config;
mod runner;

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use absorb_materials::library::ELEMENTS;

#[derive(Parser)]
#[command(name = "absorb-cli")]
#[command(about = "Absorb: numerical neutron absorption corrections")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a correction from a TOML configuration file.
    Run {
        /// Path to the job configuration file.
        config: PathBuf,
        /// Output directory (overrides config file setting).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a configuration file without running the correction.
    Validate {
        /// Path to the job configuration file.
        config: PathBuf,
    },
    /// List the built-in element table.
    Materials,
}

/// Mesh paths in a job file are relative to the job file itself.
fn job_dir(config: &Path) -> &Path {
    config.parent().unwrap_or_else(|| Path::new("."))
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, output } => {
            println!("Absorb Correction");
            println!("=================");
            let job = config::load_config(&config)?;
            println!("Configuration: {}", config.display());

            let result = runner::run_correction(&job, job_dir(&config))?;

            let out_dir = output.unwrap_or_else(|| PathBuf::from(&job.output.directory));

            if job.output.save_csv {
                for factor in &result.factors {
                    let file = if result.factors.len() == 1 {
                        "corrections.csv".to_string()
                    } else {
                        format!("{}.csv", factor.name)
                    };
                    runner::write_factors_csv(factor.name, &factor.spectra, &result, &out_dir.join(file))?;
                }
            }

            if job.output.save_json {
                runner::write_output_json(&result, &out_dir.join("corrections.json"))?;
            }

            println!("Correction complete.");
            Ok(())
        }
        Commands::Validate { config } => {
            let job = config::load_config(&config)?;
            let prepared = runner::prepare(&job, job_dir(&config))?;
            println!(
                "Configuration is valid: {} ({}, {} spectra)",
                config.display(),
                prepared.method.method_name(),
                prepared.input.num_spectra()
            );
            Ok(())
        }
        Commands::Materials => {
            println!("Built-in elements (Sears 1992 cross-sections):");
            println!();
            println!("  {:<4} {:<10} {:>10} {:>10} {:>12}", "id", "name", "σ_s (b)", "σ_a (b)", "ρ (Å⁻³)");
            for e in ELEMENTS {
                println!(
                    "  {:<4} {:<10} {:>10.3} {:>10.3} {:>12.5}",
                    e.symbol,
                    e.name,
                    e.scattering_xs,
                    e.absorption_xs,
                    e.number_density()
                );
            }
            Ok(())
        }
    }
}
