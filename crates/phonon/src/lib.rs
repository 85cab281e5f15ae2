//! harmonic lattice dynamics for periodic crystals: force data and its file
//! formats, dynamical matrices, reconstruction of force constants from
//! renormalized phonons, and the properties derived from a phonon mesh

use std::{
    error::Error,
    fmt::{Display, Formatter},
};

use crystal::CrystalError;
use nalgebra as na;

pub use bands::BandStructure;
pub use calc::*;
pub use cells::PhononCells;
pub use dynmat::{DynamicalMatrix, Modes};
pub use force::*;
pub use mesh::{Dos, DosOptions, Mesh};
pub use nac::BornCharges;
pub use renorm::*;
pub use structure::Structure;
pub use thermal::ThermalProperty;
pub use units::Thz;

pub mod bands;
mod calc;
pub mod cells;
pub mod dynmat;
pub mod files;
mod force;
pub mod mesh;
pub mod nac;
mod renorm;
pub mod sets;
pub mod structure;
pub mod symmetrize;
pub mod thermal;
pub mod units;

#[cfg(test)]
mod tests;

pub type Vec3 = na::Vector3<f64>;
pub type Mat3 = na::Matrix3<f64>;
pub type Complex = na::Complex<f64>;
/// complex matrix used for dynamical matrices and eigenvector bundles
pub type Cmat = na::DMatrix<Complex>;
type Dmat = na::DMatrix<f64>;

#[derive(Debug)]
pub enum PhononError {
    Crystal(CrystalError),
    Io(String, std::io::Error),
    /// a file could not be parsed. holds the file name and the problem
    Parse(String, String),
    /// neither force sets nor force constants are available
    NoForceData,
    /// non-analytical correction was requested without Born charges
    NoBornCharges,
    /// the supercell P⁻¹S is not integral in the primitive basis
    NotCommensurate,
    /// force data was built for a different number of supercell atoms
    SupercellMismatch { expected: usize, got: usize },
    /// frequencies or eigenvectors have the wrong number or shape
    ShapeMismatch(String),
    AtomOutOfRange { atom: usize, natoms: usize },
    /// the displacements in a force set cannot determine every force
    /// constant
    Underdetermined(String),
}

impl Display for PhononError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PhononError::Crystal(e) => write!(f, "{e}"),
            PhononError::Io(path, e) => write!(f, "{path}: {e}"),
            PhononError::Parse(path, msg) => {
                write!(f, "failed to parse {path}: {msg}")
            }
            PhononError::NoForceData => {
                write!(f, "no force sets or force constants available")
            }
            PhononError::NoBornCharges => write!(
                f,
                "non-analytical correction requires Born effective charges"
            ),
            PhononError::NotCommensurate => write!(
                f,
                "supercell is not commensurate with the primitive cell"
            ),
            PhononError::SupercellMismatch { expected, got } => write!(
                f,
                "force data covers {got} atoms but the supercell has {expected}"
            ),
            PhononError::ShapeMismatch(msg) => write!(f, "{msg}"),
            PhononError::AtomOutOfRange { atom, natoms } => write!(
                f,
                "no atom type {atom}: the primitive cell has {natoms} atoms"
            ),
            PhononError::Underdetermined(msg) => write!(f, "{msg}"),
        }
    }
}

impl Error for PhononError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PhononError::Crystal(e) => Some(e),
            PhononError::Io(_, e) => Some(e),
            _ => None,
        }
    }
}

impl From<CrystalError> for PhononError {
    fn from(value: CrystalError) -> Self {
        Self::Crystal(value)
    }
}
