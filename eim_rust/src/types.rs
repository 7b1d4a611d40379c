//! Mode and waveguide tags shared by the solvers and the sweep driver.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::EimError;

/// Polarization of a mode.
///
/// For a 1D slab, TE keeps the electric field parallel to the layer
/// interfaces and TM keeps the magnetic field parallel to them. The TM
/// boundary conditions weight the field derivative by the inverse index
/// squared, which is what separates the two branches of the characteristic
/// equations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum Polarization {
    TE,
    TM,
}

impl Polarization {
    /// The polarization seen by a slab rotated by 90 degrees.
    pub fn crossed(self) -> Self {
        match self {
            Polarization::TE => Polarization::TM,
            Polarization::TM => Polarization::TE,
        }
    }

    /// Boundary weight of a layer with index `n`: `1` for TE, `n^2` for TM.
    pub fn weight(self, n: f64) -> f64 {
        match self {
            Polarization::TE => 1.0,
            Polarization::TM => n * n,
        }
    }
}

impl fmt::Display for Polarization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Polarization::TE => f.write_str("TE"),
            Polarization::TM => f.write_str("TM"),
        }
    }
}

impl FromStr for Polarization {
    type Err = EimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "TE" | "te" => Ok(Polarization::TE),
            "TM" | "tm" => Ok(Polarization::TM),
            other => Err(EimError::InvalidParameter(format!(
                "mode must be 'TE' or 'TM', got '{other}'"
            ))),
        }
    }
}

impl TryFrom<String> for Polarization {
    type Error = EimError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Cross-section family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum WaveguideKind {
    Strip,
    Slot,
}

impl fmt::Display for WaveguideKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaveguideKind::Strip => f.write_str("strip"),
            WaveguideKind::Slot => f.write_str("slot"),
        }
    }
}

impl FromStr for WaveguideKind {
    type Err = EimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strip" | "rib" => Ok(WaveguideKind::Strip),
            "slot" => Ok(WaveguideKind::Slot),
            other => Err(EimError::InvalidParameter(format!(
                "waveguide type must be 'strip' or 'slot', got '{other}'"
            ))),
        }
    }
}

impl TryFrom<String> for WaveguideKind {
    type Error = EimError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Polarization plus mode order, printed as `TE0`, `TM1`, ...
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModeLabel {
    pub polarization: Polarization,
    pub order: u32,
}

impl ModeLabel {
    pub fn new(polarization: Polarization, order: u32) -> Self {
        Self { polarization, order }
    }
}

impl fmt::Display for ModeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.polarization, self.order)
    }
}
