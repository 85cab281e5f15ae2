use std::fmt::Display;

use crate::{CrystalError, IMat3, Mat3, Vec3, element::atomic_mass};

/// a periodic cell. the lattice vectors are stored as the rows of `lattice`,
/// so the Cartesian position of fractional coordinate `f` is `latticeᵀ·f`
#[derive(Clone, Debug, PartialEq)]
pub struct Cell {
    lattice: Mat3,
    /// (latticeᵀ)⁻¹, whose rows are the reciprocal lattice vectors
    inv_lattice_t: Mat3,
    positions: Vec<Vec3>,
    symbols: Vec<String>,
    masses: Vec<f64>,
}

impl Cell {
    /// build a cell from lattice rows in Å, fractional `positions`, and element
    /// `symbols`. masses are taken from the element table
    pub fn new(
        lattice: Mat3,
        positions: Vec<Vec3>,
        symbols: Vec<String>,
    ) -> Result<Self, CrystalError> {
        let masses = symbols
            .iter()
            .map(|s| {
                atomic_mass(s)
                    .ok_or_else(|| CrystalError::UnknownElement(s.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::with_masses(lattice, positions, symbols, masses)
    }

    pub fn with_masses(
        lattice: Mat3,
        positions: Vec<Vec3>,
        symbols: Vec<String>,
        masses: Vec<f64>,
    ) -> Result<Self, CrystalError> {
        let inv_lattice_t = lattice
            .transpose()
            .try_inverse()
            .ok_or(CrystalError::SingularMatrix)?;
        for len in [symbols.len(), masses.len()] {
            if len != positions.len() {
                return Err(CrystalError::AtomCount {
                    expected: positions.len(),
                    got: len,
                });
            }
        }
        Ok(Self {
            lattice,
            inv_lattice_t,
            positions,
            symbols,
            masses,
        })
    }

    /// replace the atomic masses, for example with isotope masses from an
    /// input file
    pub fn set_masses(&mut self, masses: Vec<f64>) -> Result<(), CrystalError> {
        if masses.len() != self.len() {
            return Err(CrystalError::AtomCount {
                expected: self.len(),
                got: masses.len(),
            });
        }
        self.masses = masses;
        Ok(())
    }

    pub fn lattice(&self) -> &Mat3 {
        &self.lattice
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn masses(&self) -> &[f64] {
        &self.masses
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// cell volume in Å³
    pub fn volume(&self) -> f64 {
        self.lattice.determinant().abs()
    }

    /// reciprocal lattice vectors as rows, without the factor of 2π
    pub fn reciprocal(&self) -> Mat3 {
        self.inv_lattice_t
    }

    pub fn to_cart(&self, frac: &Vec3) -> Vec3 {
        self.lattice.transpose() * frac
    }

    pub fn to_frac(&self, cart: &Vec3) -> Vec3 {
        self.inv_lattice_t * cart
    }

    pub fn cart_positions(&self) -> Vec<Vec3> {
        self.positions.iter().map(|f| self.to_cart(f)).collect()
    }

    /// Cartesian length of the fractional difference `d` after removing the
    /// nearest lattice vector
    pub fn frac_distance(&self, d: &Vec3) -> f64 {
        let d = d - d.map(f64::round);
        self.to_cart(&d).norm()
    }

    /// index of the atom of element `symbol` sitting at fractional position
    /// `frac` (modulo lattice translations), if any
    pub fn find_atom(
        &self,
        frac: &Vec3,
        symbol: &str,
        symprec: f64,
    ) -> Option<usize> {
        self.positions.iter().zip(&self.symbols).position(|(p, s)| {
            s == symbol && self.frac_distance(&(frac - p)) < symprec
        })
    }

    /// the Cartesian form `Lᵀ·r·(Lᵀ)⁻¹` of the fractional rotation `r`
    pub fn cartesian_rotation(&self, r: &IMat3) -> Mat3 {
        self.lattice.transpose() * r.cast::<f64>() * self.inv_lattice_t
    }
}

impl Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "lattice (Å):")?;
        for row in self.lattice.row_iter() {
            writeln!(f, "{:12.6}{:12.6}{:12.6}", row[0], row[1], row[2])?;
        }
        writeln!(f, "atoms (fractional):")?;
        for (p, s) in self.positions.iter().zip(&self.symbols) {
            writeln!(f, "{s:<3}{:12.6}{:12.6}{:12.6}", p[0], p[1], p[2])?;
        }
        Ok(())
    }
}
