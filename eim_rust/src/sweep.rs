//! Parameter sweeps over wavelength, slot gap, width and mode order.
//!
//! Each combination builds a fresh waveguide and solves it independently.
//! Results are pushed to a [`RowSink`] in iteration order: wavelength
//! outermost, then gap (slot only), then width, then mode order.

use std::time::{Duration, Instant};

use log::{info, warn};

use crate::error::EimError;
use crate::field::{FieldMap, Grid};
use crate::mode_solver::SlabSolver;
use crate::parallel::Execution;
use crate::types::{ModeLabel, Polarization, WaveguideKind};
use crate::waveguide::{Slot, Strip, Waveguide};

/// Fixed cross-section parameters shared by every sweep point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geometry {
    pub kind: WaveguideKind,
    pub polarization: Polarization,
    /// Rib height for strips, rail height for slots.
    pub t_core: f64,
    /// Height of the slab under a rib. Ignored for slots.
    pub t_slab: f64,
    pub n_box: f64,
    pub n_core: f64,
    pub n_clad: f64,
    /// Slot filling. Required for slots.
    pub n_slot: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SweepPlan {
    pub geometry: Geometry,
    pub wavelengths: Vec<f64>,
    /// Rib widths for strips, rail widths for slots.
    pub widths: Vec<f64>,
    /// Slot gaps. Ignored for strips.
    pub gaps: Vec<f64>,
    pub mode_orders: Vec<u32>,
    /// Reconstruct the 2D field of every point on this grid.
    pub field: Option<Grid>,
}

fn invalid(message: impl Into<String>) -> EimError {
    EimError::InvalidParameter(message.into())
}

impl SweepPlan {
    pub fn validate(&self) -> Result<(), EimError> {
        let g = &self.geometry;
        if self.wavelengths.is_empty() {
            return Err(invalid("at least one wavelength is required"));
        }
        if self.widths.is_empty() {
            return Err(invalid("at least one width is required"));
        }
        if self.mode_orders.is_empty() {
            return Err(invalid("at least one mode order is required"));
        }
        if let Some(w) = self.wavelengths.iter().find(|w| !(**w > 0.0)) {
            return Err(invalid(format!("wavelengths must be positive, got {w}")));
        }
        if let Some(w) = self.widths.iter().find(|w| !(**w >= 0.0)) {
            return Err(invalid(format!("widths must not be negative, got {w}")));
        }
        if !(g.t_core > 0.0) {
            return Err(invalid(format!("core thickness must be positive, got {}", g.t_core)));
        }
        if !(g.t_slab >= 0.0) {
            return Err(invalid(format!("slab thickness must not be negative, got {}", g.t_slab)));
        }
        for (name, n) in [("box", g.n_box), ("core", g.n_core), ("clad", g.n_clad)] {
            if !(n > 0.0) {
                return Err(invalid(format!("{name} index must be positive, got {n}")));
            }
        }
        if g.kind == WaveguideKind::Slot {
            match g.n_slot {
                Some(n) if n > 0.0 => {}
                Some(n) => return Err(invalid(format!("slot index must be positive, got {n}"))),
                None => return Err(invalid("slot waveguides need a slot index")),
            }
            if self.gaps.is_empty() {
                return Err(invalid("slot waveguides need at least one gap"));
            }
            if let Some(gap) = self.gaps.iter().find(|g| !(**g >= 0.0)) {
                return Err(invalid(format!("gaps must not be negative, got {gap}")));
            }
        }
        if let Some(grid) = &self.field {
            grid.validate()?;
        }
        Ok(())
    }

    fn gap_axis(&self) -> Vec<Option<f64>> {
        match self.geometry.kind {
            WaveguideKind::Strip => vec![None],
            WaveguideKind::Slot => self.gaps.iter().copied().map(Some).collect(),
        }
    }

    /// Number of sweep points.
    pub fn len(&self) -> usize {
        self.wavelengths.len() * self.gap_axis().len() * self.widths.len() * self.mode_orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn waveguide(&self, wavelength: f64, gap: Option<f64>, width: f64, order: u32) -> Box<dyn Waveguide> {
        let g = &self.geometry;
        match gap {
            None => Box::new(Strip {
                wavelength,
                t_rib: g.t_core,
                t_slab: g.t_slab,
                w_rib: width,
                n_box: g.n_box,
                n_core: g.n_core,
                n_clad: g.n_clad,
                mode_order: order,
                polarization: g.polarization,
            }),
            Some(w_slot) => Box::new(Slot {
                wavelength,
                t_core: g.t_core,
                w_core: width,
                w_slot,
                n_box: g.n_box,
                n_clad: g.n_clad,
                n_core: g.n_core,
                n_slot: g.n_slot.unwrap_or(g.n_clad),
                mode_order: order,
                polarization: g.polarization,
            }),
        }
    }
}

/// One solved sweep point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScalarRow {
    pub kind: WaveguideKind,
    pub t_core: f64,
    pub t_slab: f64,
    pub width: f64,
    /// Slot gap, `None` for strips.
    pub gap: Option<f64>,
    pub wavelength: f64,
    pub mode: ModeLabel,
    pub neff: f64,
    /// `false` when `neff` is a cutoff substitute rather than a root.
    pub guided: bool,
}

/// One sample of a 2D field map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldRow {
    pub row: usize,
    pub column: usize,
    pub transverse: f64,
    pub lateral: f64,
    pub amplitude: f64,
}

pub fn field_rows(map: &FieldMap) -> impl Iterator<Item = FieldRow> + '_ {
    map.samples()
        .map(|(row, column, transverse, lateral, amplitude)| FieldRow {
            row,
            column,
            transverse,
            lateral,
            amplitude,
        })
}

/// Destination for sweep results.
pub trait RowSink {
    fn scalar(&mut self, row: &ScalarRow) -> Result<(), EimError>;

    fn field(&mut self, _point: &ScalarRow, _row: &FieldRow) -> Result<(), EimError> {
        Ok(())
    }

    /// Receives a whole map; the default forwards every sample to
    /// [`RowSink::field`].
    fn field_map(&mut self, point: &ScalarRow, map: &FieldMap) -> Result<(), EimError> {
        for row in field_rows(map) {
            self.field(point, &row)?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), EimError> {
        Ok(())
    }
}

/// Keeps everything in memory.
#[derive(Debug, Default)]
pub struct Collector {
    pub rows: Vec<ScalarRow>,
    pub maps: Vec<(ScalarRow, FieldMap)>,
}

impl RowSink for Collector {
    fn scalar(&mut self, row: &ScalarRow) -> Result<(), EimError> {
        self.rows.push(*row);
        Ok(())
    }

    fn field_map(&mut self, point: &ScalarRow, map: &FieldMap) -> Result<(), EimError> {
        self.maps.push((*point, map.clone()));
        Ok(())
    }
}

/// What to do when a field reconstruction fails for one point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    #[default]
    Abort,
    /// Log the failure and continue with the next point.
    Skip,
}

#[derive(Debug, Clone, Default)]
pub struct SweepSummary {
    pub rows: usize,
    /// Rows whose index is a cutoff substitute.
    pub fallbacks: usize,
    pub field_maps: usize,
    pub skipped: usize,
    pub elapsed: Duration,
}

pub struct Sweep {
    pub plan: SweepPlan,
    pub solver: SlabSolver,
    /// Scheduling of field sampling and outer products.
    pub execution: Execution,
    pub policy: FailurePolicy,
}

impl Sweep {
    pub fn new(plan: SweepPlan, solver: SlabSolver, execution: Execution) -> Self {
        Self {
            plan,
            solver,
            execution,
            policy: FailurePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn run(&self, sink: &mut dyn RowSink) -> Result<SweepSummary, EimError> {
        self.plan.validate()?;
        let start = Instant::now();
        let plan = &self.plan;
        let g = &plan.geometry;
        let gaps = plan.gap_axis();
        let mut summary = SweepSummary::default();

        info!(
            "{} {} sweep: {} points{}",
            g.kind,
            g.polarization,
            plan.len(),
            if plan.field.is_some() { " with field maps" } else { "" }
        );

        for (step, &wavelength) in plan.wavelengths.iter().enumerate() {
            info!(
                "wavelength {wavelength} ({}/{})",
                step + 1,
                plan.wavelengths.len()
            );
            for &gap in &gaps {
                for &width in &plan.widths {
                    for &order in &plan.mode_orders {
                        let waveguide = plan.waveguide(wavelength, gap, width, order);
                        let (index, field) = match &plan.field {
                            Some(grid) => {
                                let (index, map) =
                                    waveguide.index_and_field(&self.solver, grid, &self.execution);
                                (index, Some(map))
                            }
                            None => (waveguide.effective_index(&self.solver), None),
                        };
                        let row = ScalarRow {
                            kind: g.kind,
                            t_core: g.t_core,
                            t_slab: g.t_slab,
                            width,
                            gap,
                            wavelength,
                            mode: waveguide.label(),
                            neff: index.value,
                            guided: index.is_guided(),
                        };
                        if !row.guided {
                            summary.fallbacks += 1;
                            warn!(
                                "{} at width {width}, gap {gap:?}, wavelength {wavelength}: {}, reporting fallback {}",
                                row.mode, index.status.convergence, row.neff
                            );
                        }
                        sink.scalar(&row)?;
                        summary.rows += 1;

                        match (field, self.policy) {
                            (None, _) => {}
                            (Some(Ok(map)), _) => {
                                sink.field_map(&row, &map)?;
                                summary.field_maps += 1;
                            }
                            (Some(Err(err)), FailurePolicy::Skip) => {
                                warn!("skipping {} field at width {width}: {err}", row.mode);
                                summary.skipped += 1;
                            }
                            (Some(Err(err)), FailurePolicy::Abort) => return Err(err),
                        }
                    }
                }
            }
        }

        sink.finish()?;
        summary.elapsed = start.elapsed();
        info!(
            "sweep finished: {} rows, {} fallbacks, {} field maps in {:.2?}",
            summary.rows, summary.fallbacks, summary.field_maps, summary.elapsed
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strip_plan() -> SweepPlan {
        SweepPlan {
            geometry: Geometry {
                kind: WaveguideKind::Strip,
                polarization: Polarization::TE,
                t_core: 0.22,
                t_slab: 0.0,
                n_box: 1.44,
                n_core: 3.47,
                n_clad: 1.44,
                n_slot: None,
            },
            wavelengths: vec![1.5, 1.55],
            widths: vec![0.4, 0.5, 0.6],
            gaps: Vec::new(),
            mode_orders: vec![0, 1],
            field: None,
        }
    }

    #[test]
    fn test_iteration_order() {
        let plan = strip_plan();
        assert_eq!(plan.len(), 12);
        let mut sink = Collector::default();
        let summary = Sweep::new(plan, SlabSolver::default(), Execution::Serial)
            .run(&mut sink)
            .unwrap();

        assert_eq!(summary.rows, 12);
        let keys: Vec<(f64, f64, u32)> = sink
            .rows
            .iter()
            .map(|r| (r.wavelength, r.width, r.mode.order))
            .collect();
        assert_eq!(keys[0], (1.5, 0.4, 0));
        assert_eq!(keys[1], (1.5, 0.4, 1));
        assert_eq!(keys[2], (1.5, 0.5, 0));
        assert_eq!(keys[6], (1.55, 0.4, 0));
        assert!(sink.rows.iter().all(|r| r.gap.is_none()));
    }

    #[test]
    fn test_fallbacks_are_flagged() {
        let plan = SweepPlan {
            widths: vec![0.5],
            wavelengths: vec![1.55],
            mode_orders: vec![0, 3],
            ..strip_plan()
        };
        let mut sink = Collector::default();
        let summary = Sweep::new(plan, SlabSolver::default(), Execution::Serial)
            .run(&mut sink)
            .unwrap();
        assert!(sink.rows[0].guided);
        assert!(!sink.rows[1].guided);
        assert_eq!(summary.fallbacks, 1);
    }

    #[test]
    fn test_slot_plan_requires_gaps() {
        let mut plan = strip_plan();
        plan.geometry.kind = WaveguideKind::Slot;
        plan.geometry.n_slot = Some(1.44);
        assert!(plan.validate().is_err());

        plan.gaps = vec![0.08, 0.1];
        plan.validate().unwrap();
        assert_eq!(plan.len(), 24);

        plan.geometry.n_slot = None;
        assert!(plan.validate().is_err());
    }

    #[test]
    fn test_validation() {
        let mut plan = strip_plan();
        plan.wavelengths.clear();
        assert!(plan.validate().is_err());

        let mut plan = strip_plan();
        plan.geometry.t_core = 0.0;
        assert!(plan.validate().is_err());

        let mut plan = strip_plan();
        plan.field = Some(Grid::new(1, 1.0));
        assert!(matches!(plan.validate(), Err(EimError::GridTooSmall(1))));
    }

    #[test]
    fn test_field_maps_reach_sink() {
        let plan = SweepPlan {
            wavelengths: vec![1.55],
            widths: vec![0.5],
            mode_orders: vec![0],
            field: Some(Grid::new(11, 1.0)),
            ..strip_plan()
        };
        let mut sink = Collector::default();
        let summary = Sweep::new(plan, SlabSolver::default(), Execution::Threads(2))
            .with_policy(FailurePolicy::Skip)
            .run(&mut sink)
            .unwrap();
        assert_eq!(summary.field_maps, 1);
        assert_eq!(sink.maps.len(), 1);
        assert_eq!(sink.maps[0].0, sink.rows[0]);
        assert_eq!(sink.maps[0].1.amplitude.shape(), (11, 11));
        assert_eq!(field_rows(&sink.maps[0].1).count(), 121);
    }
}
