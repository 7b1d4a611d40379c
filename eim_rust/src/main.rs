//! Effective index method command-line interface.
//!
//! ```sh
//! eim run job.toml
//! eim run job.toml --field-output fields.csv --plot plots/
//! eim validate job.toml
//! eim slab --thickness 0.5 -o slab.csv
//! ```

mod config;
mod output;
mod plot;

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::info;

use eim_rust::field::{sample_profile, Grid};
use eim_rust::mode_solver::{Slab, SlabProfile, SlabSolver};
use eim_rust::parallel::Execution;
use eim_rust::sweep::Sweep;
use eim_rust::types::Polarization;

use crate::output::{
    create_file, default_field_path, write_profile, CsvSink, Recording, PROFILE_HEADER,
};

#[derive(Parser)]
#[command(name = "eim")]
#[command(about = "Effective index method solver for strip, rib and slot waveguides")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve every point of a sweep and print the effective indices as CSV.
    Run {
        /// Path to the job configuration file.
        config: PathBuf,
        /// Write effective indices here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Field map CSV (default: mode2D_strip.csv or mode2D_slot.csv).
        /// Only used when the job has a [field] section.
        #[arg(long)]
        field_output: Option<PathBuf>,
        /// Directory for PNG heatmaps of every field map.
        #[arg(long)]
        plot: Option<PathBuf>,
        /// Worker threads (overrides [solver] threads).
        #[arg(short, long)]
        threads: Option<usize>,
    },
    /// Check a configuration file without solving anything.
    Validate {
        /// Path to the job configuration file.
        config: PathBuf,
    },
    /// Solve one three-layer slab and write the TE and TM field components.
    Slab {
        #[arg(long, default_value_t = 1.44)]
        n_lower: f64,
        #[arg(long, default_value_t = 3.47)]
        n_core: f64,
        #[arg(long, default_value_t = 1.44)]
        n_upper: f64,
        /// Guiding layer thickness, in the wavelength unit.
        #[arg(long, default_value_t = 0.5)]
        thickness: f64,
        #[arg(long, default_value_t = 1.55)]
        wavelength: f64,
        #[arg(long, default_value_t = 0)]
        order: u32,
        /// Samples over [-extent, extent].
        #[arg(long, default_value_t = 200)]
        points: usize,
        #[arg(long, default_value_t = 1.0)]
        extent: f64,
        /// Write the profile here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            output,
            field_output,
            plot,
            threads,
        } => {
            let job = config::load_config(&config)?;
            let plan = job.plan()?;
            let execution = job.execution(threads);
            let solver = job.solver(execution);
            let kind = plan.geometry.kind;
            info!("configuration: {}", config.display());

            let scalars: Box<dyn Write> = match &output {
                Some(path) => Box::new(create_file(path)?),
                None => Box::new(BufWriter::new(io::stdout().lock())),
            };
            let fields: Option<BufWriter<File>> = match &plan.field {
                Some(_) => {
                    let path = field_output.unwrap_or_else(|| default_field_path(kind));
                    info!("field maps: {}", path.display());
                    Some(create_file(&path)?)
                }
                None => None,
            };

            let sweep = Sweep::new(plan, solver, execution);
            let mut sink = Recording::new(CsvSink::new(kind, scalars, fields)?, plot.is_some());
            let summary = sweep.run(&mut sink)?;

            if let Some(dir) = &plot {
                for (point, map) in &sink.maps {
                    let path = plot::draw_field_map(point, map, dir)?;
                    info!("saved plot: {}", path.display());
                }
            }

            if summary.fallbacks > 0 {
                eprintln!(
                    "{} of {} points had no guided solution; their neff is the cutoff index (guided = false)",
                    summary.fallbacks, summary.rows
                );
            }
            Ok(())
        }
        Commands::Validate { config } => {
            let job = config::load_config(&config)?;
            let plan = job.plan()?;
            println!(
                "Configuration is valid: {} ({} {} sweep, {} points)",
                config.display(),
                plan.geometry.kind,
                plan.geometry.polarization,
                plan.len()
            );
            Ok(())
        }
        Commands::Slab {
            n_lower,
            n_core,
            n_upper,
            thickness,
            wavelength,
            order,
            points,
            extent,
            output,
        } => {
            let slab = Slab::new(n_lower, n_core, n_upper, thickness);
            let positions = Grid::new(points, extent).positions()?;
            let modes = SlabSolver::default().solve(&slab, wavelength, order);

            let mut out: Box<dyn Write> = match &output {
                Some(path) => Box::new(create_file(path)?),
                None => Box::new(BufWriter::new(io::stdout().lock())),
            };
            writeln!(out, "{PROFILE_HEADER}")?;
            for polarization in [Polarization::TE, Polarization::TM] {
                let index = modes.get(polarization);
                info!(
                    "{polarization}{order}: neff = {:.6} ({})",
                    index.value, index.status.convergence
                );
                let profile = SlabProfile::new(slab, polarization, wavelength, index.value);
                let samples = sample_profile(&profile, &positions, &Execution::Serial)?;
                write_profile(&mut out, polarization, index.value, &positions, &samples)?;
            }
            out.flush()?;
            Ok(())
        }
    }
}
