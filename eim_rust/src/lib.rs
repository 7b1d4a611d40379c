//! Effective index method for integrated waveguides.
//!
//! A 2D cross-section (strip, rib or slot) is reduced to nested 1D slab
//! problems. Each slab is solved by bisection on its characteristic
//! equation; the vertical solutions become the layer indices of a
//! horizontal slab whose root is the effective index of the waveguide
//! mode. The 2D field is approximated by the outer product of the two
//! closed-form 1D modes.
//!
//! ```
//! use eim_rust::mode_solver::SlabSolver;
//! use eim_rust::types::Polarization;
//! use eim_rust::waveguide::{Strip, Waveguide};
//!
//! let strip = Strip {
//!     wavelength: 1.55,
//!     t_rib: 0.22,
//!     t_slab: 0.0,
//!     w_rib: 0.5,
//!     n_box: 1.44,
//!     n_core: 3.47,
//!     n_clad: 1.44,
//!     mode_order: 0,
//!     polarization: Polarization::TE,
//! };
//! let neff = strip.effective_index(&SlabSolver::default());
//! assert!(neff.is_guided());
//! assert!(neff.value > 2.4 && neff.value < 2.6);
//! ```

pub mod bisection;
pub mod constants;
pub mod error;
pub mod field;
pub mod mode_solver;
pub mod parallel;
pub mod slot;
pub mod sweep;
pub mod types;
pub mod waveguide;

pub use bisection::{bisection, Bisection, Convergence, Root, Status};
pub use error::EimError;
pub use field::{FieldMap, FieldSample, Grid};
pub use mode_solver::{EffectiveIndex, Slab, SlabSolver};
pub use parallel::{Execution, ParallelError, ParallelFor};
pub use slot::{SlotSlab, Symmetry};
pub use sweep::{RowSink, Sweep, SweepPlan};
pub use types::{ModeLabel, Polarization, WaveguideKind};
pub use waveguide::{Slot, Strip, Waveguide};
