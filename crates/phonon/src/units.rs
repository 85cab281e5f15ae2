//! physical constants (CODATA 2018) and unit conversions. force constants are
//! in eV/Å², masses in amu, and frequencies in THz

use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// J per eV
pub const EV: f64 = 1.602176634e-19;

/// kg per atomic mass unit
pub const AMU: f64 = 1.66053906660e-27;

pub const ANGSTROM: f64 = 1.0e-10;

/// Planck's constant in J·s
pub const PLANCK: f64 = 6.62607015e-34;

pub const AVOGADRO: f64 = 6.02214076e23;

/// Boltzmann's constant in eV/K
pub const KB: f64 = 8.617333262e-5;

/// √(eV/Å²/amu) / 2π in THz, the factor that turns the square root of a
/// dynamical matrix eigenvalue into a frequency
pub const VASP_TO_THZ: f64 = 15.633302300230191;

/// energy in eV of a photon with a frequency of one THz
pub const THZ_TO_EV: f64 = PLANCK * 1.0e12 / EV;

/// eV per particle to kJ/mol
pub const EV_TO_KJMOL: f64 = EV * AVOGADRO / 1000.0;

/// eV/Å³ to GPa
pub const EV_A3_TO_GPA: f64 = EV / (ANGSTROM * ANGSTROM * ANGSTROM) * 1.0e-9;

/// Hartree·Bohr in eV·Å, the default conversion factor for Born charges from
/// VASP
pub const NAC_FACTOR: f64 = 27.211386245988 * 0.529177210903;

/// a phonon frequency in THz. imaginary modes are stored as negative values
#[derive(
    Clone, Copy, Debug, Default, PartialEq, PartialOrd, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Thz(pub f64);

impl Thz {
    /// the frequency of a dynamical matrix eigenvalue `lambda` in eV/Å²/amu
    pub fn from_eigenvalue(lambda: f64) -> Self {
        Self(lambda.signum() * lambda.abs().sqrt() * VASP_TO_THZ)
    }

    /// angular frequency in the internal unit √(eV/Å²/amu)
    pub fn to_internal(self) -> f64 {
        self.0 / VASP_TO_THZ
    }

    /// the signed eigenvalue sign(ω)·ω² this frequency corresponds to
    pub fn to_eigenvalue(self) -> f64 {
        let w = self.to_internal();
        w.signum() * w * w
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl Display for Thz {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}
