//! primitive cells and supercells built from a unit cell

use std::fmt::Display;

use rustc_hash::FxHashMap;

use crate::{
    Cell, CrystalError, IMat3, IVec3, Mat3, Vec3, int_det, wrap_vec,
};

/// integer supercell transformation. column `j` holds supercell vector `j`
/// expressed in the unit-cell basis, so the supercell lattice rows are
/// `Sᵀ·L`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SupercellMatrix(IMat3);

impl SupercellMatrix {
    pub fn new(m: IMat3) -> Result<Self, CrystalError> {
        if int_det(&m) == 0 {
            return Err(CrystalError::SingularMatrix);
        }
        Ok(Self(m))
    }

    pub fn identity() -> Self {
        Self(IMat3::identity())
    }

    pub fn diagonal(a: i32, b: i32, c: i32) -> Result<Self, CrystalError> {
        Self::new(IMat3::from_diagonal(&IVec3::new(a, b, c)))
    }

    pub fn matrix(&self) -> &IMat3 {
        &self.0
    }

    pub fn as_f64(&self) -> Mat3 {
        self.0.cast()
    }

    /// number of unit cells in the supercell
    pub fn ncells(&self) -> usize {
        int_det(&self.0).unsigned_abs() as usize
    }

    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.0 == IMat3::identity()
    }
}

impl Default for SupercellMatrix {
    fn default() -> Self {
        Self::identity()
    }
}

impl Display for SupercellMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, row) in self.0.row_iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{} {} {}", row[0], row[1], row[2])?;
        }
        Ok(())
    }
}

/// the integer points `n` with `S⁻¹n` in [0, 1)³, starting at the origin and
/// then ordered with x varying fastest. these are one representative of each unit cell in the supercell
pub fn lattice_points(
    smat: &SupercellMatrix,
) -> Result<Vec<IVec3>, CrystalError> {
    let s = smat.as_f64();
    let inv = s.try_inverse().ok_or(CrystalError::SingularMatrix)?;
    let mut lo = IVec3::zeros();
    let mut hi = IVec3::zeros();
    for c in 0..8 {
        let corner = s * Vec3::new(
            (c & 1) as f64,
            ((c >> 1) & 1) as f64,
            ((c >> 2) & 1) as f64,
        );
        for k in 0..3 {
            lo[k] = lo[k].min(corner[k].floor() as i32);
            hi[k] = hi[k].max(corner[k].ceil() as i32);
        }
    }
    let mut points = Vec::with_capacity(smat.ncells());
    for z in lo[2]..=hi[2] {
        for y in lo[1]..=hi[1] {
            for x in lo[0]..=hi[0] {
                let f = inv * Vec3::new(x as f64, y as f64, z as f64);
                if f.iter().all(|&v| (-1e-8..1.0 - 1e-8).contains(&v)) {
                    points.push(IVec3::new(x, y, z));
                }
            }
        }
    }
    if let Some(origin) = points.iter().position(|n| *n == IVec3::zeros()) {
        points[..=origin].rotate_right(1);
    }
    if points.len() != smat.ncells() {
        return Err(CrystalError::Unmapped(format!(
            "found {} lattice points in a supercell of {} cells",
            points.len(),
            smat.ncells()
        )));
    }
    Ok(points)
}

/// a supercell together with the bookkeeping that ties each of its atoms back
/// to the unit cell it was built from. atoms are ordered unit-atom-major:
/// atom `u * ncells + l` is unit atom `u` shifted by lattice point `l`
#[derive(Clone, Debug)]
pub struct Supercell {
    pub cell: Cell,
    pub matrix: SupercellMatrix,
    /// unit-cell atom that each supercell atom is an image of
    pub s2u: Vec<usize>,
    /// lattice point index of each supercell atom
    pub s2l: Vec<usize>,
    pub lattice_points: Vec<IVec3>,
    inv_matrix: Mat3,
    point_index: FxHashMap<[i32; 3], usize>,
}

impl Supercell {
    pub fn len(&self) -> usize {
        self.cell.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cell.is_empty()
    }

    pub fn ncells(&self) -> usize {
        self.lattice_points.len()
    }

    /// index of the supercell atom that images unit atom `u` in cell `l`
    pub fn atom_index(&self, u: usize, l: usize) -> usize {
        u * self.ncells() + l
    }

    /// reduce the integer unit-cell translation `n` into the supercell,
    /// returning the index of its representative lattice point
    pub fn lattice_point_index(&self, n: &IVec3) -> Option<usize> {
        let f = self.inv_matrix * n.cast::<f64>();
        let shift = f.map(|x| (x + 1e-8).floor());
        let r = n - (self.matrix.as_f64() * shift).map(|x| x.round() as i32);
        self.point_index.get(&[r[0], r[1], r[2]]).copied()
    }

    /// position of supercell atom `s` in the fractional basis of the unit
    /// cell, not folded back into [0, 1)
    pub fn unit_frac(&self, s: usize) -> Vec3 {
        self.matrix.as_f64() * self.cell.positions()[s]
    }
}

/// a primitive cell and the map between its atoms and those of the unit cell
#[derive(Clone, Debug)]
pub struct Primitive {
    pub cell: Cell,
    /// real transformation with primitive lattice rows `Pᵀ·L`
    pub matrix: Mat3,
    /// primitive atom corresponding to each unit-cell atom
    pub u2p: Vec<usize>,
    /// first unit-cell atom corresponding to each primitive atom
    pub p2u: Vec<usize>,
}

impl Cell {
    /// build the supercell described by `smat`
    pub fn supercell(
        &self,
        smat: &SupercellMatrix,
    ) -> Result<Supercell, CrystalError> {
        let lattice_points = lattice_points(smat)?;
        let s = smat.as_f64();
        let inv = s.try_inverse().ok_or(CrystalError::SingularMatrix)?;
        let lattice = s.transpose() * self.lattice();
        let ncells = lattice_points.len();
        let natoms = self.len() * ncells;
        let mut positions = Vec::with_capacity(natoms);
        let mut symbols = Vec::with_capacity(natoms);
        let mut masses = Vec::with_capacity(natoms);
        let mut s2u = Vec::with_capacity(natoms);
        let mut s2l = Vec::with_capacity(natoms);
        for (u, pos) in self.positions().iter().enumerate() {
            for (l, n) in lattice_points.iter().enumerate() {
                positions.push(inv * (pos + n.cast::<f64>()));
                symbols.push(self.symbols()[u].clone());
                masses.push(self.masses()[u]);
                s2u.push(u);
                s2l.push(l);
            }
        }
        let point_index = lattice_points
            .iter()
            .enumerate()
            .map(|(i, n)| ([n[0], n[1], n[2]], i))
            .collect();
        Ok(Supercell {
            cell: Cell::with_masses(lattice, positions, symbols, masses)?,
            matrix: *smat,
            s2u,
            s2l,
            lattice_points,
            inv_matrix: inv,
            point_index,
        })
    }

    /// reduce `self` to the primitive cell with lattice rows `Pᵀ·L`. atoms
    /// closer than `symprec` after folding are merged, and the result must
    /// hold exactly `len·|det P|` atoms
    pub fn primitive(
        &self,
        pmat: &Mat3,
        symprec: f64,
    ) -> Result<Primitive, CrystalError> {
        let det = pmat.determinant();
        let inv = pmat.try_inverse().ok_or(CrystalError::SingularMatrix)?;
        let target = self.len() as f64 * det.abs();
        let expected = target.round() as usize;
        let lattice = pmat.transpose() * self.lattice();
        let lattice_t = lattice.transpose();

        let mut positions: Vec<Vec3> = Vec::new();
        let mut symbols = Vec::new();
        let mut masses = Vec::new();
        let mut u2p = Vec::with_capacity(self.len());
        let mut p2u = Vec::new();
        for (u, pos) in self.positions().iter().enumerate() {
            let f = wrap_vec(&(inv * pos));
            let sym = &self.symbols()[u];
            let found = positions.iter().zip(&symbols).position(|(p, s)| {
                let d = f - p;
                let d = d - d.map(f64::round);
                s == sym && (lattice_t * d).norm() < symprec
            });
            match found {
                Some(p) => u2p.push(p),
                None => {
                    u2p.push(positions.len());
                    p2u.push(u);
                    positions.push(f);
                    symbols.push(sym.clone());
                    masses.push(self.masses()[u]);
                }
            }
        }
        if (target - expected as f64).abs() > 1e-6 || positions.len() != expected
        {
            return Err(CrystalError::Primitive {
                expected,
                got: positions.len(),
            });
        }
        log::debug!(
            "reduced {} unit-cell atoms to {} primitive atoms",
            self.len(),
            positions.len()
        );
        Ok(Primitive {
            cell: Cell::with_masses(lattice, positions, symbols, masses)?,
            matrix: *pmat,
            u2p,
            p2u,
        })
    }
}
