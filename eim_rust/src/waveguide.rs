//! Strip/rib and slot waveguides reduced to nested 1D solves.
//!
//! Every model first solves the vertical (thickness) direction of each
//! lateral region at order 0, then builds a horizontal stack from the
//! resulting indices and solves it at the requested mode order. A quasi-TE
//! mode is TE in the vertical slab and TM across the width; quasi-TM is the
//! mirror image.

use crate::error::EimError;
use crate::field::{reconstruct, FieldMap, Grid};
use crate::mode_solver::{EffectiveIndex, Slab, SlabProfile, SlabSolver};
use crate::parallel::Execution;
use crate::slot::{SlotModes, SlotProfile, SlotSlab, Symmetry};
use crate::types::{ModeLabel, Polarization, WaveguideKind};

/// A waveguide cross-section whose guided mode can be solved and sampled.
///
/// Implementations hold parameters only; each call solves from scratch.
pub trait Waveguide {
    fn kind(&self) -> WaveguideKind;

    fn label(&self) -> ModeLabel;

    fn effective_index(&self, solver: &SlabSolver) -> EffectiveIndex;

    /// Dominant transverse electric field on `grid`.
    fn mode_field(
        &self,
        solver: &SlabSolver,
        grid: &Grid,
        execution: &Execution,
    ) -> Result<FieldMap, EimError>;

    /// Index and field from a single solve.
    fn index_and_field(
        &self,
        solver: &SlabSolver,
        grid: &Grid,
        execution: &Execution,
    ) -> (EffectiveIndex, Result<FieldMap, EimError>);
}

/// Rib of width `w_rib` and height `t_rib` standing on a slab of height
/// `t_slab`, over a buried oxide and under a cladding. `t_slab = 0` is a
/// strip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Strip {
    pub wavelength: f64,
    pub t_rib: f64,
    pub t_slab: f64,
    pub w_rib: f64,
    pub n_box: f64,
    pub n_core: f64,
    pub n_clad: f64,
    pub mode_order: u32,
    pub polarization: Polarization,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StripSolution {
    /// Vertical index of the rib region.
    pub rib: EffectiveIndex,
    /// Vertical index of the outer slab regions.
    pub slab: EffectiveIndex,
    pub lateral: Slab,
    pub effective_index: EffectiveIndex,
}

impl Strip {
    pub fn rib_stack(&self) -> Slab {
        Slab::new(self.n_box, self.n_core, self.n_clad, self.t_rib + self.t_slab)
    }

    pub fn slab_stack(&self) -> Slab {
        Slab::new(self.n_box, self.n_core, self.n_clad, self.t_slab)
    }

    pub fn solve(&self, solver: &SlabSolver) -> StripSolution {
        let [rib, slab] = solver.solve_branches([self.rib_stack(), self.slab_stack()], |stack| {
            solver.solve_polarization(self.polarization, &stack, self.wavelength, 0)
        });
        let lateral = Slab::symmetric(slab.value, rib.value, self.w_rib);
        let effective_index = solver.solve_polarization(
            self.polarization.crossed(),
            &lateral,
            self.wavelength,
            self.mode_order,
        );
        StripSolution {
            rib,
            slab,
            lateral,
            effective_index,
        }
    }

    /// Reconstruct the field of an already solved strip.
    pub fn field_from(
        &self,
        solution: &StripSolution,
        grid: &Grid,
        execution: &Execution,
    ) -> Result<FieldMap, EimError> {
        let vertical = SlabProfile::new(
            self.rib_stack(),
            self.polarization,
            self.wavelength,
            solution.rib.value,
        );
        let lateral = SlabProfile::new(
            solution.lateral,
            self.polarization.crossed(),
            self.wavelength,
            solution.effective_index.value,
        );
        reconstruct(&vertical, &lateral, grid, execution)
    }
}

impl Waveguide for Strip {
    fn kind(&self) -> WaveguideKind {
        WaveguideKind::Strip
    }

    fn label(&self) -> ModeLabel {
        ModeLabel::new(self.polarization, self.mode_order)
    }

    fn effective_index(&self, solver: &SlabSolver) -> EffectiveIndex {
        self.solve(solver).effective_index
    }

    fn mode_field(
        &self,
        solver: &SlabSolver,
        grid: &Grid,
        execution: &Execution,
    ) -> Result<FieldMap, EimError> {
        self.field_from(&self.solve(solver), grid, execution)
    }

    fn index_and_field(
        &self,
        solver: &SlabSolver,
        grid: &Grid,
        execution: &Execution,
    ) -> (EffectiveIndex, Result<FieldMap, EimError>) {
        let solution = self.solve(solver);
        (solution.effective_index, self.field_from(&solution, grid, execution))
    }
}

/// Two core rails of width `w_core` separated by a slot of width `w_slot`,
/// all of height `t_core`, over a buried oxide and under a cladding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Slot {
    pub wavelength: f64,
    pub t_core: f64,
    pub w_core: f64,
    pub w_slot: f64,
    pub n_box: f64,
    pub n_clad: f64,
    pub n_core: f64,
    pub n_slot: f64,
    pub mode_order: u32,
    pub polarization: Polarization,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlotSolution {
    pub core: EffectiveIndex,
    pub slot: EffectiveIndex,
    pub cladding: EffectiveIndex,
    pub lateral: SlotSlab,
    pub modes: SlotModes,
}

impl SlotSolution {
    /// The reported index is the even supermode.
    pub fn effective_index(&self) -> EffectiveIndex {
        self.modes.even
    }
}

impl Slot {
    fn vertical_stack(&self, n_guide: f64) -> Slab {
        Slab::new(self.n_box, n_guide, self.n_clad, self.t_core)
    }

    pub fn core_stack(&self) -> Slab {
        self.vertical_stack(self.n_core)
    }

    pub fn solve(&self, solver: &SlabSolver) -> SlotSolution {
        let [core, slot, cladding] = [self.n_core, self.n_slot, self.n_clad].map(|n| {
            solver.solve_polarization(self.polarization, &self.vertical_stack(n), self.wavelength, 0)
        });
        let lateral = SlotSlab::new(cladding.value, core.value, slot.value, self.w_slot, self.w_core);
        let modes = solver.solve_slot(
            self.polarization.crossed(),
            &lateral,
            self.wavelength,
            self.mode_order,
        );
        SlotSolution {
            core,
            slot,
            cladding,
            lateral,
            modes,
        }
    }

    /// Field of the even or odd supermode.
    pub fn supermode_field(
        &self,
        solver: &SlabSolver,
        symmetry: Symmetry,
        grid: &Grid,
        execution: &Execution,
    ) -> Result<FieldMap, EimError> {
        self.supermode_field_from(&self.solve(solver), symmetry, grid, execution)
    }

    pub fn supermode_field_from(
        &self,
        solution: &SlotSolution,
        symmetry: Symmetry,
        grid: &Grid,
        execution: &Execution,
    ) -> Result<FieldMap, EimError> {
        let vertical = SlabProfile::new(
            self.core_stack(),
            self.polarization,
            self.wavelength,
            solution.core.value,
        );
        let lateral = SlotProfile::new(
            solution.lateral,
            self.polarization.crossed(),
            symmetry,
            self.wavelength,
            solution.modes.get(symmetry).value,
        );
        reconstruct(&vertical, &lateral, grid, execution)
    }
}

impl Waveguide for Slot {
    fn kind(&self) -> WaveguideKind {
        WaveguideKind::Slot
    }

    fn label(&self) -> ModeLabel {
        ModeLabel::new(self.polarization, self.mode_order)
    }

    fn effective_index(&self, solver: &SlabSolver) -> EffectiveIndex {
        self.solve(solver).effective_index()
    }

    fn mode_field(
        &self,
        solver: &SlabSolver,
        grid: &Grid,
        execution: &Execution,
    ) -> Result<FieldMap, EimError> {
        self.supermode_field(solver, Symmetry::Even, grid, execution)
    }

    fn index_and_field(
        &self,
        solver: &SlabSolver,
        grid: &Grid,
        execution: &Execution,
    ) -> (EffectiveIndex, Result<FieldMap, EimError>) {
        let solution = self.solve(solver);
        let field = self.supermode_field_from(&solution, Symmetry::Even, grid, execution);
        (solution.effective_index(), field)
    }
}
