//! Three-layer slab: characteristic equation, solver and closed-form mode.

use std::convert::Infallible;
use std::f64::consts::PI;

use log::{debug, warn};

use crate::bisection::{Bisection, Convergence, Root, Status};
use crate::constants::wavenumber;
use crate::field::{FieldSample, TransverseProfile};
use crate::parallel::{Execution, ParallelFor};
use crate::types::Polarization;

/// Lower cladding / guiding layer / upper cladding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Slab {
    pub n_lower: f64,
    pub n_core: f64,
    pub n_upper: f64,
    pub thickness: f64,
}

impl Slab {
    pub fn new(n_lower: f64, n_core: f64, n_upper: f64, thickness: f64) -> Self {
        Self {
            n_lower,
            n_core,
            n_upper,
            thickness,
        }
    }

    pub fn symmetric(n_clad: f64, n_core: f64, thickness: f64) -> Self {
        Self::new(n_clad, n_core, n_clad, thickness)
    }

    /// Lower edge of the guided band, `max(n_lower, n_upper)`. Bisection
    /// starts here.
    pub fn cutoff(&self) -> f64 {
        self.n_lower.max(self.n_upper)
    }

    /// Index reported when no root is found, `min(n_lower, n_upper)`.
    pub fn fallback(&self) -> f64 {
        self.n_lower.min(self.n_upper)
    }

    pub fn has_guided_band(&self) -> bool {
        self.n_core > self.cutoff()
    }
}

/// Decay and transverse wavenumbers `(g_lower, g_core, g_upper)`.
fn wavenumbers(slab: &Slab, k0: f64, neff: f64) -> (f64, f64, f64) {
    let n2 = neff * neff;
    (
        k0 * (n2 - slab.n_lower * slab.n_lower).sqrt(),
        k0 * (slab.n_core * slab.n_core - n2).sqrt(),
        k0 * (n2 - slab.n_upper * slab.n_upper).sqrt(),
    )
}

/// Residual of the guided-mode condition of `slab` at trial index `neff`.
///
/// The phase picked up across the guiding layer, `g_core * thickness`, is
/// matched against the two interface reflection phases plus
/// `(order + 1) * pi`. The result is NaN outside
/// `[slab.cutoff(), slab.n_core]`.
pub fn slab_equation(
    polarization: Polarization,
    slab: &Slab,
    wavelength: f64,
    order: u32,
    neff: f64,
) -> f64 {
    let (g1, g2, g3) = wavenumbers(slab, wavenumber(wavelength), neff);
    let w1 = polarization.weight(slab.n_lower);
    let w2 = polarization.weight(slab.n_core);
    let w3 = polarization.weight(slab.n_upper);

    let rhs = -(w1 * g2).atan2(w2 * g1) - (w3 * g2).atan2(w2 * g3)
        + (f64::from(order) + 1.0) * PI;
    rhs - g2 * slab.thickness
}

/// A solved effective index.
///
/// When the bisection did not converge `value` holds the fallback index of
/// the stack instead of a root; [`EffectiveIndex::is_fallback`] tells the
/// two apart.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectiveIndex {
    pub value: f64,
    pub status: Status,
}

impl EffectiveIndex {
    pub fn resolve(root: Root, fallback: f64) -> Self {
        let value = if root.is_converged() { root.value } else { fallback };
        Self {
            value,
            status: root.status,
        }
    }

    /// A stack with no guided band.
    pub fn unguided(fallback: f64) -> Self {
        Self {
            value: fallback,
            status: Status {
                convergence: Convergence::InvalidRange,
                iterations: 0,
                residual: f64::NAN,
            },
        }
    }

    pub fn is_guided(&self) -> bool {
        self.status.convergence == Convergence::Converged
    }

    pub fn is_fallback(&self) -> bool {
        !self.is_guided()
    }
}

/// Both polarization branches of one slab.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlabModes {
    pub te: EffectiveIndex,
    pub tm: EffectiveIndex,
}

impl SlabModes {
    pub fn get(&self, polarization: Polarization) -> EffectiveIndex {
        match polarization {
            Polarization::TE => self.te,
            Polarization::TM => self.tm,
        }
    }
}

/// Solver for 1D layer stacks. Holds settings only; every solve is a pure
/// function of its arguments.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SlabSolver {
    pub bisection: Bisection,
    /// Whether independent branch solves run on separate threads.
    pub execution: Execution,
}

impl SlabSolver {
    pub fn new(bisection: Bisection, execution: Execution) -> Self {
        Self {
            bisection,
            execution,
        }
    }

    pub fn solve_polarization(
        &self,
        polarization: Polarization,
        slab: &Slab,
        wavelength: f64,
        order: u32,
    ) -> EffectiveIndex {
        let cutoff = slab.cutoff();
        let fallback = slab.fallback();
        if !slab.has_guided_band() {
            debug!(
                "{polarization}{order}: core index {} does not exceed cutoff {cutoff}, using {fallback}",
                slab.n_core
            );
            return EffectiveIndex::unguided(fallback);
        }

        let root = self.bisection.solve(
            |neff| slab_equation(polarization, slab, wavelength, order, neff),
            cutoff,
            slab.n_core,
        );
        let index = EffectiveIndex::resolve(root, fallback);
        if index.is_fallback() {
            debug!(
                "{polarization}{order}: {} after {} iterations (residual {:.3e}), using {fallback}",
                index.status.convergence, index.status.iterations, index.status.residual
            );
        }
        index
    }

    /// Solve the TE and TM branches of `slab`.
    pub fn solve(&self, slab: &Slab, wavelength: f64, order: u32) -> SlabModes {
        let [te, tm] = self.solve_branches([Polarization::TE, Polarization::TM], |pol| {
            self.solve_polarization(pol, slab, wavelength, order)
        });
        SlabModes { te, tm }
    }

    /// Evaluate two independent branch solves, concurrently when the
    /// execution policy allows it.
    pub(crate) fn solve_branches<K, F>(&self, keys: [K; 2], f: F) -> [EffectiveIndex; 2]
    where
        K: Copy + Sync,
        F: Fn(K) -> EffectiveIndex + Sync,
    {
        if !self.execution.is_parallel() {
            return keys.map(&f);
        }

        let mut slots: [Option<EffectiveIndex>; 2] = [None, None];
        let outcome = ParallelFor::new(2).for_each_mut(&mut slots, |i, slot| -> Result<(), Infallible> {
            *slot = Some(f(keys[i]));
            Ok(())
        });
        if let Err(err) = outcome {
            warn!("concurrent branch solve failed ({err}), retrying serially");
        }
        match slots {
            [Some(a), Some(b)] => [a, b],
            _ => keys.map(&f),
        }
    }
}

/// Closed-form 1D mode of a three-layer slab, centred so that the guiding
/// layer spans `[-thickness / 2, thickness / 2]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlabProfile {
    slab: Slab,
    polarization: Polarization,
    neff: f64,
    k0: f64,
    g_lower: f64,
    g_core: f64,
    g_upper: f64,
    phase: f64,
}

impl SlabProfile {
    pub fn new(slab: Slab, polarization: Polarization, wavelength: f64, neff: f64) -> Self {
        let k0 = wavenumber(wavelength);
        let n2 = neff * neff;
        let decay = |n: f64| k0 * (n2 - n * n).max(0.0).sqrt();
        let g_lower = decay(slab.n_lower);
        let g_upper = decay(slab.n_upper);
        let g_core = k0 * (slab.n_core * slab.n_core - n2).max(0.0).sqrt();

        let phase = -(g_lower * polarization.weight(slab.n_core))
            .atan2(g_core * polarization.weight(slab.n_lower));

        Self {
            slab,
            polarization,
            neff,
            k0,
            g_lower,
            g_core,
            g_upper,
            phase,
        }
    }

    pub fn slab(&self) -> &Slab {
        &self.slab
    }

    pub fn neff(&self) -> f64 {
        self.neff
    }

    /// Potential, its derivative and the local index at `position`.
    fn potential(&self, position: f64) -> (f64, f64, f64) {
        let width = self.slab.thickness;
        let s = position + 0.5 * width;
        if s < 0.0 {
            let psi = self.phase.cos() * (self.g_lower * s).exp();
            (psi, self.g_lower * psi, self.slab.n_lower)
        } else if s > width {
            let psi = (self.g_core * width + self.phase).cos() * (-self.g_upper * (s - width)).exp();
            (psi, -self.g_upper * psi, self.slab.n_upper)
        } else {
            let arg = self.g_core * s + self.phase;
            (arg.cos(), -self.g_core * arg.sin(), self.slab.n_core)
        }
    }
}

impl TransverseProfile for SlabProfile {
    fn sample(&self, position: f64) -> FieldSample {
        let (psi, dpsi, n) = self.potential(position);
        FieldSample::from_potential(
            self.polarization,
            psi,
            dpsi,
            n,
            self.slab.n_core,
            self.neff,
            self.k0,
        )
    }
}
