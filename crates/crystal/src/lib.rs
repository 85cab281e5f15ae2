//! periodic crystal structures: cells, element data, primitive cells and
//! supercells, space groups, and the VASP structure formats

use std::{
    error::Error,
    fmt::{Display, Formatter},
};

use nalgebra as na;

pub use cell::*;
pub use supercell::*;
pub use symmetry::*;

pub mod cell;
pub mod element;
pub mod outcar;
pub mod poscar;
pub mod supercell;
pub mod symmetry;


pub type Vec3 = na::Vector3<f64>;
pub type Mat3 = na::Matrix3<f64>;
pub type IVec3 = na::Vector3<i32>;
pub type IMat3 = na::Matrix3<i32>;

/// default tolerance in Å used to decide whether two atoms sit on the same
/// site
pub const SYMPREC: f64 = 1e-5;

#[derive(Debug)]
pub enum CrystalError {
    Io(String, std::io::Error),
    /// a structure file could not be parsed. holds the file name (or
    /// "<string>") and a description of the problem
    Parse(String, String),
    UnknownElement(String),
    SingularMatrix,
    /// the number of atoms, symbols, or masses disagree
    AtomCount { expected: usize, got: usize },
    /// the unit cell does not reduce to the requested primitive cell
    Primitive { expected: usize, got: usize },
    /// a supercell lattice point or symmetry image could not be located
    Unmapped(String),
}

impl Display for CrystalError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CrystalError::Io(path, e) => write!(f, "failed to read {path}: {e}"),
            CrystalError::Parse(path, msg) => {
                write!(f, "failed to parse {path}: {msg}")
            }
            CrystalError::UnknownElement(s) => {
                write!(f, "unrecognized element symbol `{s}`")
            }
            CrystalError::SingularMatrix => {
                write!(f, "transformation matrix is singular")
            }
            CrystalError::AtomCount { expected, got } => {
                write!(f, "expected {expected} atoms, got {got}")
            }
            CrystalError::Primitive { expected, got } => write!(
                f,
                "primitive cell should hold {expected} atoms but {got} \
                 distinct sites were found"
            ),
            CrystalError::Unmapped(msg) => write!(f, "{msg}"),
        }
    }
}

impl Error for CrystalError {}

/// fold `x` into [0, 1), sending values within rounding error of 1 to 0
pub fn wrap(x: f64) -> f64 {
    let w = x.rem_euclid(1.0);
    if w > 1.0 - 1e-10 { 0.0 } else { w }
}

/// fold each component of `v` into [0, 1)
pub fn wrap_vec(v: &Vec3) -> Vec3 {
    v.map(wrap)
}

/// integer determinant of a 3x3 integer matrix
pub fn int_det(m: &IMat3) -> i32 {
    m[(0, 0)] * (m[(1, 1)] * m[(2, 2)] - m[(1, 2)] * m[(2, 1)])
        - m[(0, 1)] * (m[(1, 0)] * m[(2, 2)] - m[(1, 2)] * m[(2, 0)])
        + m[(0, 2)] * (m[(1, 0)] * m[(2, 1)] - m[(1, 1)] * m[(2, 0)])
}

/// round `m` to the nearest integer matrix if every element is within `tol`
/// of an integer
pub fn to_integer(m: &Mat3, tol: f64) -> Option<IMat3> {
    if m.iter().all(|x| (x - x.round()).abs() < tol) {
        Some(m.map(|x| x.round() as i32))
    } else {
        None
    }
}
