//! TOML job files.
//!
//! ```toml
//! [waveguide]
//! kind = "strip"
//! polarization = "TE"
//! t_core = 0.22
//!
//! [indices]
//! box = 1.44
//! core = 3.47
//! clad = 1.44
//!
//! [sweep]
//! wavelengths = [1.55]
//! widths = { range = [0.3, 1.0], points = 8 }
//! mode_orders = [0, 1]
//! ```

use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use eim_rust::bisection::Bisection;
use eim_rust::field::{linspace, Grid};
use eim_rust::mode_solver::SlabSolver;
use eim_rust::parallel::{available_workers, Execution};
use eim_rust::sweep::{Geometry, SweepPlan};
use eim_rust::types::{Polarization, WaveguideKind};

#[derive(Debug, Deserialize)]
pub struct JobConfig {
    pub waveguide: WaveguideConfig,
    pub indices: IndexConfig,
    pub sweep: SweepConfig,
    pub field: Option<FieldConfig>,
    #[serde(default)]
    pub solver: SolverConfig,
}

#[derive(Debug, Deserialize)]
pub struct WaveguideConfig {
    /// "strip" (or "rib") or "slot".
    pub kind: WaveguideKind,
    #[serde(default = "default_polarization")]
    pub polarization: Polarization,
    /// Rib height (strip) or rail height (slot), in the wavelength unit.
    pub t_core: f64,
    #[serde(default)]
    pub t_slab: f64,
}

fn default_polarization() -> Polarization {
    Polarization::TE
}

#[derive(Debug, Deserialize)]
pub struct IndexConfig {
    #[serde(rename = "box")]
    pub n_box: f64,
    #[serde(rename = "core")]
    pub n_core: f64,
    #[serde(rename = "clad")]
    pub n_clad: f64,
    #[serde(rename = "slot")]
    pub n_slot: Option<f64>,
}

/// Either an explicit list or `{ range = [start, end], points = n }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AxisSpec {
    List(Vec<f64>),
    Range { range: [f64; 2], points: usize },
}

impl Default for AxisSpec {
    fn default() -> Self {
        AxisSpec::List(Vec::new())
    }
}

impl AxisSpec {
    pub fn values(&self) -> anyhow::Result<Vec<f64>> {
        match self {
            AxisSpec::List(values) => Ok(values.clone()),
            AxisSpec::Range { range, points: 1 } => Ok(vec![range[0]]),
            AxisSpec::Range { range, points } => Ok(linspace(range[0], range[1], *points)?),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SweepConfig {
    pub wavelengths: AxisSpec,
    pub widths: AxisSpec,
    #[serde(default)]
    pub gaps: AxisSpec,
    #[serde(default = "default_mode_orders")]
    pub mode_orders: Vec<u32>,
}

fn default_mode_orders() -> Vec<u32> {
    vec![0]
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct FieldConfig {
    pub points: usize,
    pub extent: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SolverConfig {
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// Worker threads for branch solves and field maps. Default: all
    /// hardware threads.
    pub threads: Option<usize>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tolerance: default_tolerance(),
            max_iterations: default_max_iterations(),
            threads: None,
        }
    }
}

fn default_tolerance() -> f64 {
    1e-4
}
fn default_max_iterations() -> u32 {
    100
}

impl JobConfig {
    pub fn plan(&self) -> anyhow::Result<SweepPlan> {
        let plan = SweepPlan {
            geometry: Geometry {
                kind: self.waveguide.kind,
                polarization: self.waveguide.polarization,
                t_core: self.waveguide.t_core,
                t_slab: self.waveguide.t_slab,
                n_box: self.indices.n_box,
                n_core: self.indices.n_core,
                n_clad: self.indices.n_clad,
                n_slot: self.indices.n_slot,
            },
            wavelengths: self.sweep.wavelengths.values().context("sweep.wavelengths")?,
            widths: self.sweep.widths.values().context("sweep.widths")?,
            gaps: self.sweep.gaps.values().context("sweep.gaps")?,
            mode_orders: self.sweep.mode_orders.clone(),
            field: self.field.map(|f| Grid::new(f.points, f.extent)),
        };
        plan.validate()?;
        Ok(plan)
    }

    /// Worker count, with `threads` taking precedence over the job file.
    pub fn execution(&self, threads: Option<usize>) -> Execution {
        match threads.or(self.solver.threads) {
            Some(0) | None => Execution::Threads(available_workers()),
            Some(1) => Execution::Serial,
            Some(n) => Execution::Threads(n),
        }
    }

    pub fn solver(&self, execution: Execution) -> SlabSolver {
        SlabSolver::new(
            Bisection::new(self.solver.tolerance, self.solver.max_iterations),
            execution,
        )
    }
}

pub fn load_config(path: &Path) -> anyhow::Result<JobConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let config: JobConfig =
        toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SLOT_JOB: &str = r#"
        [waveguide]
        kind = "slot"
        polarization = "TM"
        t_core = 0.22

        [indices]
        box = 1.44
        core = 3.47
        clad = 1.44
        slot = 1.0

        [sweep]
        wavelengths = [1.55]
        widths = { range = [0.2, 0.3], points = 3 }
        gaps = [0.05, 0.1]

        [field]
        points = 51
        extent = 1.0

        [solver]
        threads = 1
    "#;

    #[test]
    fn test_slot_job() {
        let job: JobConfig = toml::from_str(SLOT_JOB).unwrap();
        let plan = job.plan().unwrap();
        assert_eq!(plan.geometry.kind, WaveguideKind::Slot);
        assert_eq!(plan.geometry.polarization, Polarization::TM);
        assert_eq!(plan.geometry.n_slot, Some(1.0));
        assert_eq!(plan.widths.len(), 3);
        assert!((plan.widths[1] - 0.25).abs() < 1e-12);
        assert_eq!(plan.mode_orders, vec![0]);
        assert_eq!(plan.field, Some(Grid::new(51, 1.0)));
        assert_eq!(job.execution(None), Execution::Serial);
        assert_eq!(job.execution(Some(3)), Execution::Threads(3));
        assert_eq!(job.solver(Execution::Serial).bisection, Bisection::default());
    }

    #[test]
    fn test_slot_job_without_gaps_is_rejected() {
        let job: JobConfig = toml::from_str(&SLOT_JOB.replace("gaps = [0.05, 0.1]", "")).unwrap();
        assert!(job.plan().is_err());
    }

    #[test]
    fn test_unknown_kind_is_rejected_when_parsing() {
        let err = toml::from_str::<JobConfig>(&SLOT_JOB.replace("\"slot\"", "\"ridge\""))
            .unwrap_err();
        assert!(err.to_string().contains("ridge"), "{err}");

        let err = toml::from_str::<JobConfig>(&SLOT_JOB.replace("\"TM\"", "\"TEM\""))
            .unwrap_err();
        assert!(err.to_string().contains("TEM"), "{err}");
    }

    #[test]
    fn test_kind_aliases_and_default_polarization() {
        let job: JobConfig = toml::from_str(
            &SLOT_JOB
                .replace("\"slot\"", "\"rib\"")
                .replace("polarization = \"TM\"", ""),
        )
        .unwrap();
        assert_eq!(job.waveguide.kind, WaveguideKind::Strip);
        assert_eq!(job.waveguide.polarization, Polarization::TE);
    }
}
