//! non-analytical term correction with Born effective charges

use std::{f64::consts::PI, fs::read_to_string, path::Path};

use crystal::{Cell, SYMPREC, SpaceGroup};

use crate::{Mat3, PhononError, Vec3, units::NAC_FACTOR};

/// the contents of a phonopy BORN file
#[derive(Clone, Debug, PartialEq)]
pub struct BornCharges {
    /// unit conversion applied to the correction
    pub factor: f64,
    pub dielectric: Mat3,
    /// Born charge tensors, either for every primitive atom or only for the
    /// symmetry-independent ones
    pub charges: Vec<Mat3>,
}

fn mat3(vals: &[f64]) -> Mat3 {
    Mat3::from_row_slice(vals)
}

impl BornCharges {
    /// parse a BORN file. the first line holds the conversion factor; if it
    /// is not a number the VASP default is used
    pub fn parse(s: &str, name: &str) -> Result<Self, PhononError> {
        let err = |msg: String| PhononError::Parse(name.to_owned(), msg);
        let mut lines = s
            .lines()
            .filter(|l| !l.trim().is_empty() && !l.trim_start().starts_with('#'));
        let first = lines.next().ok_or_else(|| err("empty".into()))?;
        let factor = first
            .split_whitespace()
            .next()
            .and_then(|w| w.parse::<f64>().ok())
            .unwrap_or(NAC_FACTOR);
        let mut tensors = Vec::new();
        for line in lines {
            let vals = line
                .split_whitespace()
                .map(|w| w.parse::<f64>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| err(format!("`{line}`: {e}")))?;
            if vals.len() != 9 {
                return Err(err(format!("expected 9 values in `{line}`")));
            }
            tensors.push(mat3(&vals));
        }
        if tensors.len() < 2 {
            return Err(err("missing dielectric tensor or Born charges".into()));
        }
        let dielectric = tensors.remove(0);
        Ok(Self {
            factor,
            dielectric,
            charges: tensors,
        })
    }

    pub fn read(path: impl AsRef<Path>) -> Result<Self, PhononError> {
        let path = path.as_ref();
        let s = read_to_string(path)
            .map_err(|e| PhononError::Io(path.display().to_string(), e))?;
        Self::parse(&s, &path.display().to_string())
    }

    /// Born charges for every atom of `prim`, generated from the independent
    /// atoms with `Z_b = R·Z_a·Rᵀ` when only those are given
    pub fn expand(&self, prim: &Cell) -> Result<Vec<Mat3>, PhononError> {
        if self.charges.len() == prim.len() {
            return Ok(self.charges.clone());
        }
        let group = SpaceGroup::find(prim, SYMPREC);
        let independent = group.independent_atoms(prim.len());
        if independent.len() != self.charges.len() {
            return Err(PhononError::ShapeMismatch(format!(
                "{} Born charges for {} atoms ({} independent)",
                self.charges.len(),
                prim.len(),
                independent.len()
            )));
        }
        let rotations = group.cartesian_rotations(prim);
        let mut ret = vec![Mat3::zeros(); prim.len()];
        for b in 0..prim.len() {
            let found = group.permutations.iter().enumerate().find_map(|(k, p)| {
                independent
                    .iter()
                    .position(|&a| p[a] == b)
                    .map(|i| (k, i))
            });
            let Some((k, i)) = found else {
                return Err(PhononError::ShapeMismatch(format!(
                    "atom {b} is not generated by the independent atoms"
                )));
            };
            let r = rotations[k];
            ret[b] = r * self.charges[i] * r.transpose();
        }
        Ok(ret)
    }
}

/// everything needed to evaluate the Wang correction for one primitive cell
#[derive(Clone, Debug)]
pub struct Nac {
    factor: f64,
    dielectric: Mat3,
    charges: Vec<Mat3>,
    volume: f64,
    ncells: usize,
    reciprocal: Mat3,
}

impl Nac {
    pub fn new(
        born: &BornCharges,
        prim: &Cell,
        ncells: usize,
    ) -> Result<Self, PhononError> {
        Ok(Self {
            factor: born.factor,
            dielectric: born.dielectric,
            charges: born.expand(prim)?,
            volume: prim.volume(),
            ncells,
            reciprocal: prim.reciprocal(),
        })
    }

    /// the constant added to every supercell force constant block between
    /// primitive atoms `p` and `pp` for fractional wave vector `q`, or `None`
    /// at Γ where the direction is undefined
    pub fn blocks(&self, q: &Vec3) -> Option<Vec<Vec<Mat3>>> {
        let qc = self.reciprocal.transpose() * q;
        if qc.norm() < 1e-8 {
            return None;
        }
        let denom = qc.dot(&(self.dielectric * qc));
        let fac =
            self.factor * 4.0 * PI / self.volume / denom / self.ncells as f64;
        let qz: Vec<Vec3> =
            self.charges.iter().map(|z| z.transpose() * qc).collect();
        Some(
            qz.iter()
                .map(|a| qz.iter().map(|b| a * b.transpose() * fac).collect())
                .collect(),
        )
    }
}
