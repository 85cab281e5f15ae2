//! quasi-harmonic volume interpolation: equation of state fits of the
//! free-energy surface, the equilibrium volume as a function of temperature,
//! and interpolation of force constants between volumes

use std::{
    error::Error,
    fmt::{Display, Formatter},
};

use phonon::PhononError;

pub use eos::Vinet;
pub use fc::ForceConstantInterpolator;
pub use interp::QuadraticSpline;
pub use qha::{DEFAULT_BP, Qha};

pub mod eos;
pub mod ev;
mod fc;
pub mod interp;
mod qha;
pub mod thermal;


type Dmat = nalgebra::DMatrix<f64>;
type Dvec = nalgebra::DVector<f64>;

#[derive(Debug)]
pub enum QhaError {
    Io(String, std::io::Error),
    Yaml(String, serde_yaml::Error),
    /// a text table could not be parsed. holds the file name and the problem
    Parse(String, String),
    Phonon(PhononError),
    TooFewPoints { need: usize, got: usize },
    /// interpolation abscissae are not strictly increasing
    NotIncreasing,
    OutOfRange { value: f64, min: f64, max: f64 },
    /// inputs that should line up with each other do not
    Mismatch(String),
    /// the equation of state fit failed to converge
    Fit(String),
}

impl Display for QhaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            QhaError::Io(path, e) => write!(f, "{path}: {e}"),
            QhaError::Yaml(path, e) => {
                write!(f, "failed to parse {path}: {e}")
            }
            QhaError::Parse(path, msg) => {
                write!(f, "failed to parse {path}: {msg}")
            }
            QhaError::Phonon(e) => write!(f, "{e}"),
            QhaError::TooFewPoints { need, got } => {
                write!(f, "interpolation needs at least {need} points, got {got}")
            }
            QhaError::NotIncreasing => {
                write!(f, "interpolation points must be strictly increasing")
            }
            QhaError::OutOfRange { value, min, max } => {
                write!(f, "{value} is outside the sampled range [{min}, {max}]")
            }
            QhaError::Mismatch(msg) => write!(f, "{msg}"),
            QhaError::Fit(msg) => write!(f, "equation of state fit failed: {msg}"),
        }
    }
}

impl Error for QhaError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            QhaError::Io(_, e) => Some(e),
            QhaError::Yaml(_, e) => Some(e),
            QhaError::Phonon(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PhononError> for QhaError {
    fn from(value: PhononError) -> Self {
        Self::Phonon(value)
    }
}

/// solve the normal equations `(AᵀA + damping)·x = b`, first by Cholesky
/// decomposition and then by LU if that fails
pub(crate) fn solve_normal(a: Dmat, b: &Dvec) -> Option<Dvec> {
    if let Some(chol) = nalgebra::Cholesky::new(a.clone()) {
        return Some(chol.solve(b));
    }
    log::debug!("Cholesky decomposition failed, trying LU");
    nalgebra::LU::new(a).solve(b)
}
