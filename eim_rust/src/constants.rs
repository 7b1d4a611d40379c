//! Free-space constants (SI).

use std::f64::consts::PI;

/// Vacuum permittivity, F/m.
pub const EPS0: f64 = 8.854188e-12;

/// Vacuum permeability, H/m.
pub const MU0: f64 = 4.0 * PI * 1e-7;

/// Speed of light, `1/sqrt(EPS0*MU0)` for the values above.
pub const C0: f64 = 299_792_454.912;

/// Free-space impedance, `sqrt(MU0/EPS0)` for the values above.
pub const ETA0: f64 = 376.730_309_58;

/// Free-space wavenumber for a wavelength in any length unit.
///
/// Results are in the inverse of that unit, so geometry and wavelength
/// only need to agree with each other.
pub fn wavenumber(wavelength: f64) -> f64 {
    2.0 * PI / wavelength
}
