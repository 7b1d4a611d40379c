//! Five-layer slot slab: cladding | core | slot | core | cladding.
//!
//! The slot of width `w_slot` is centred at zero and flanked by two
//! identical core layers of width `w_core`. Guided supermodes are either
//! even (cosh-like inside the slot) or odd (sinh-like). Both reduce to a
//! single interface condition on one half of the stack, where the slot
//! enters through its admittance `psi' / psi` at the slot edge.

use std::fmt;

use log::debug;

use crate::bisection::Status;
use crate::constants::wavenumber;
use crate::field::{FieldSample, TransverseProfile};
use crate::mode_solver::{EffectiveIndex, SlabSolver};
use crate::types::Polarization;

/// Below this, `gamma * a` is treated as zero in the odd admittance.
const SMALL_DECAY: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Symmetry {
    Even,
    Odd,
}

impl fmt::Display for Symmetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symmetry::Even => f.write_str("even"),
            Symmetry::Odd => f.write_str("odd"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlotSlab {
    pub n_clad: f64,
    pub n_core: f64,
    pub n_slot: f64,
    pub w_slot: f64,
    pub w_core: f64,
}

impl SlotSlab {
    pub fn new(n_clad: f64, n_core: f64, n_slot: f64, w_slot: f64, w_core: f64) -> Self {
        Self {
            n_clad,
            n_core,
            n_slot,
            w_slot,
            w_core,
        }
    }

    pub fn cutoff(&self) -> f64 {
        self.n_clad.max(self.n_slot)
    }

    pub fn has_guided_band(&self) -> bool {
        self.n_core > self.cutoff()
    }

    fn half_slot(&self) -> f64 {
        0.5 * self.w_slot
    }
}

/// `psi' / psi` of the slot field at the slot edge `a`.
fn slot_admittance(symmetry: Symmetry, gamma: f64, a: f64) -> f64 {
    match symmetry {
        Symmetry::Even => gamma * (gamma * a).tanh(),
        Symmetry::Odd if gamma * a < SMALL_DECAY => {
            if a > 0.0 {
                1.0 / a
            } else {
                f64::INFINITY
            }
        }
        Symmetry::Odd => gamma / (gamma * a).tanh(),
    }
}

/// Residual of the slot supermode condition at trial index `neff`.
///
/// `kappa * w_core` is matched against the phase at the cladding interface
/// plus the phase at the slot interface plus `order * pi`. NaN outside
/// `[slot.cutoff(), slot.n_core]`.
pub fn slot_equation(
    polarization: Polarization,
    symmetry: Symmetry,
    slot: &SlotSlab,
    wavelength: f64,
    order: u32,
    neff: f64,
) -> f64 {
    let k0 = wavenumber(wavelength);
    let n2 = neff * neff;
    let gamma_slot = k0 * (n2 - slot.n_slot * slot.n_slot).sqrt();
    let kappa = k0 * (slot.n_core * slot.n_core - n2).sqrt();
    let gamma_clad = k0 * (n2 - slot.n_clad * slot.n_clad).sqrt();

    let w_core = polarization.weight(slot.n_core);
    let w_clad = polarization.weight(slot.n_clad);
    let w_slot = polarization.weight(slot.n_slot);
    let admittance = slot_admittance(symmetry, gamma_slot, slot.half_slot());

    let clad_phase = (w_core * gamma_clad).atan2(w_clad * kappa);
    let slot_phase = (w_core * admittance).atan2(w_slot * kappa);
    kappa * slot.w_core - (clad_phase + slot_phase + f64::from(order) * std::f64::consts::PI)
}

/// Even and odd supermode indices of one slot slab.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlotModes {
    pub even: EffectiveIndex,
    pub odd: EffectiveIndex,
}

impl SlotModes {
    pub fn get(&self, symmetry: Symmetry) -> EffectiveIndex {
        match symmetry {
            Symmetry::Even => self.even,
            Symmetry::Odd => self.odd,
        }
    }
}

impl SlabSolver {
    pub fn solve_slot_symmetry(
        &self,
        polarization: Polarization,
        symmetry: Symmetry,
        slot: &SlotSlab,
        wavelength: f64,
        order: u32,
    ) -> EffectiveIndex {
        let cutoff = slot.cutoff();
        if !slot.has_guided_band() {
            debug!(
                "{symmetry} {polarization}{order} slot: core index {} does not exceed cutoff {cutoff}",
                slot.n_core
            );
            return EffectiveIndex::unguided(cutoff);
        }

        let root = self.bisection.solve(
            |neff| slot_equation(polarization, symmetry, slot, wavelength, order, neff),
            cutoff,
            slot.n_core,
        );
        let index = EffectiveIndex::resolve(root, cutoff);
        if index.is_fallback() {
            let Status {
                convergence,
                iterations,
                residual,
            } = index.status;
            debug!(
                "{symmetry} {polarization}{order} slot: {convergence} after {iterations} iterations (residual {residual:.3e}), using cutoff {cutoff}"
            );
        }
        index
    }

    /// Solve the even and odd branches of `slot`.
    pub fn solve_slot(
        &self,
        polarization: Polarization,
        slot: &SlotSlab,
        wavelength: f64,
        order: u32,
    ) -> SlotModes {
        let [even, odd] = self.solve_branches([Symmetry::Even, Symmetry::Odd], |symmetry| {
            self.solve_slot_symmetry(polarization, symmetry, slot, wavelength, order)
        });
        SlotModes { even, odd }
    }
}

/// Closed-form 1D supermode of a slot slab, slot centred at zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlotProfile {
    slot: SlotSlab,
    polarization: Polarization,
    symmetry: Symmetry,
    neff: f64,
    k0: f64,
    gamma_slot: f64,
    kappa: f64,
    gamma_clad: f64,
    phase: f64,
    amplitude: f64,
    edge_value: f64,
}

impl SlotProfile {
    pub fn new(
        slot: SlotSlab,
        polarization: Polarization,
        symmetry: Symmetry,
        wavelength: f64,
        neff: f64,
    ) -> Self {
        let k0 = wavenumber(wavelength);
        let n2 = neff * neff;
        let gamma_slot = k0 * (n2 - slot.n_slot * slot.n_slot).max(0.0).sqrt();
        let kappa = k0 * (slot.n_core * slot.n_core - n2).max(0.0).sqrt();
        let gamma_clad = k0 * (n2 - slot.n_clad * slot.n_clad).max(0.0).sqrt();

        let w_core = polarization.weight(slot.n_core);
        let w_slot = polarization.weight(slot.n_slot);

        let (psi_a, dpsi_a) = slot_potential(symmetry, gamma_slot, slot.half_slot());
        let phase = -(w_core * dpsi_a).atan2(w_slot * kappa * psi_a);
        // Match at the slot edge through whichever of cos/sin is better
        // conditioned.
        let amplitude = if phase.cos().abs() >= phase.sin().abs() {
            psi_a / phase.cos()
        } else {
            let den = w_slot * kappa * phase.sin();
            if den == 0.0 {
                psi_a
            } else {
                -w_core * dpsi_a / den
            }
        };
        let edge_value = amplitude * (kappa * slot.w_core + phase).cos();

        Self {
            slot,
            polarization,
            symmetry,
            neff,
            k0,
            gamma_slot,
            kappa,
            gamma_clad,
            phase,
            amplitude,
            edge_value,
        }
    }

    pub fn symmetry(&self) -> Symmetry {
        self.symmetry
    }

    /// Outer edge of the core layers.
    pub fn half_width(&self) -> f64 {
        self.slot.half_slot() + self.slot.w_core
    }

    fn potential(&self, position: f64) -> (f64, f64, f64) {
        let a = self.slot.half_slot();
        let b = self.half_width();
        let r = position.abs();

        let (mut psi, mut dpsi, n) = if r < a {
            let (psi, dpsi) = slot_potential(self.symmetry, self.gamma_slot, r);
            (psi, dpsi, self.slot.n_slot)
        } else if r <= b {
            let arg = self.kappa * (r - a) + self.phase;
            (
                self.amplitude * arg.cos(),
                -self.amplitude * self.kappa * arg.sin(),
                self.slot.n_core,
            )
        } else {
            let psi = self.edge_value * (-self.gamma_clad * (r - b)).exp();
            (psi, -self.gamma_clad * psi, self.slot.n_clad)
        };

        if position < 0.0 {
            match self.symmetry {
                Symmetry::Even => dpsi = -dpsi,
                Symmetry::Odd => psi = -psi,
            }
        }
        (psi, dpsi, n)
    }
}

/// Slot-region potential and derivative at distance `r` from the centre.
fn slot_potential(symmetry: Symmetry, gamma: f64, r: f64) -> (f64, f64) {
    match symmetry {
        Symmetry::Even => ((gamma * r).cosh(), gamma * (gamma * r).sinh()),
        Symmetry::Odd if gamma < SMALL_DECAY => (r, 1.0),
        Symmetry::Odd => ((gamma * r).sinh() / gamma, (gamma * r).cosh()),
    }
}

impl TransverseProfile for SlotProfile {
    fn sample(&self, position: f64) -> FieldSample {
        let (psi, dpsi, n) = self.potential(position);
        FieldSample::from_potential(
            self.polarization,
            psi,
            dpsi,
            n,
            self.slot.n_core,
            self.neff,
            self.k0,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const WAVELENGTH: f64 = 1.55;

    fn slot() -> SlotSlab {
        SlotSlab::new(1.44, 2.8, 1.44, 0.1, 0.25)
    }

    #[test]
    fn test_tm_supermodes() {
        let modes = SlabSolver::default().solve_slot(Polarization::TM, &slot(), WAVELENGTH, 0);
        assert!(modes.even.is_guided() && modes.odd.is_guided());
        assert_abs_diff_eq!(modes.even.value, 2.0505, epsilon = 2e-3);
        assert_abs_diff_eq!(modes.odd.value, 1.6103, epsilon = 2e-3);
        assert!(modes.get(Symmetry::Even).value > modes.get(Symmetry::Odd).value);
    }

    #[test]
    fn test_te_supermodes() {
        let modes = SlabSolver::default().solve_slot(Polarization::TE, &slot(), WAVELENGTH, 0);
        assert_abs_diff_eq!(modes.even.value, 2.4215, epsilon = 2e-3);
        assert_abs_diff_eq!(modes.odd.value, 2.0833, epsilon = 2e-3);
    }

    #[test]
    fn test_closed_gap_stays_finite() {
        let closed = SlotSlab { w_slot: 0.0, ..slot() };
        let modes = SlabSolver::default().solve_slot(Polarization::TM, &closed, WAVELENGTH, 0);
        assert!(modes.even.value.is_finite() && modes.odd.value.is_finite());
        assert_abs_diff_eq!(modes.even.value, 2.4416, epsilon = 2e-3);
        assert_abs_diff_eq!(modes.odd.value, 1.5642, epsilon = 2e-3);
    }

    #[test]
    fn test_no_band_falls_back() {
        let inverted = SlotSlab::new(1.44, 1.3, 1.0, 0.1, 0.25);
        let modes = SlabSolver::default().solve_slot(Polarization::TE, &inverted, WAVELENGTH, 0);
        assert!(modes.even.is_fallback() && modes.odd.is_fallback());
        assert_eq!(modes.even.value, 1.44);
    }

    #[test]
    fn test_equation_brackets_even_root() {
        let s = slot();
        let lo = slot_equation(Polarization::TM, Symmetry::Even, &s, WAVELENGTH, 0, s.cutoff());
        let hi = slot_equation(Polarization::TM, Symmetry::Even, &s, WAVELENGTH, 0, s.n_core);
        assert!(lo > 0.0 && hi < 0.0);
    }

    fn solved_profile(polarization: Polarization, symmetry: Symmetry) -> SlotProfile {
        let neff = SlabSolver::default()
            .solve_slot_symmetry(polarization, symmetry, &slot(), WAVELENGTH, 0)
            .value;
        SlotProfile::new(slot(), polarization, symmetry, WAVELENGTH, neff)
    }

    #[test]
    fn test_profile_continuity() {
        for (pol, sym) in [
            (Polarization::TM, Symmetry::Even),
            (Polarization::TE, Symmetry::Odd),
            (Polarization::TM, Symmetry::Odd),
        ] {
            let profile = solved_profile(pol, sym);
            for edge in [0.05, profile.half_width()] {
                let inside = profile.potential(edge - 1e-9);
                let outside = profile.potential(edge + 1e-9);
                assert_abs_diff_eq!(inside.0, outside.0, epsilon = 1e-6);
                assert_abs_diff_eq!(
                    inside.1 / pol.weight(inside.2),
                    outside.1 / pol.weight(outside.2),
                    epsilon = 5e-3
                );
            }
        }
    }

    #[test]
    fn test_profile_parity() {
        let even = solved_profile(Polarization::TM, Symmetry::Even);
        let odd = solved_profile(Polarization::TM, Symmetry::Odd);
        for y in [0.02, 0.1, 0.2, 0.5] {
            assert_abs_diff_eq!(even.sample(-y).electric.re, even.sample(y).electric.re);
            assert_abs_diff_eq!(odd.sample(-y).electric.re, -odd.sample(y).electric.re);
        }
        assert_abs_diff_eq!(odd.sample(0.0).electric.norm(), 0.0);
    }

    #[test]
    fn test_tm_field_concentrates_in_slot() {
        let profile = solved_profile(Polarization::TM, Symmetry::Even);
        let in_slot = profile.sample(0.04).electric.norm();
        let in_core = profile.sample(0.08).electric.norm();
        assert!(in_slot > 2.0 * in_core);
        assert!(profile.sample(1.0).electric.norm() < 0.05 * in_slot);
    }
}
