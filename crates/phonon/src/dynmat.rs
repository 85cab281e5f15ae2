//! dynamical matrices built from supercell force constants and their
//! eigendecomposition

use std::f64::consts::PI;

use nalgebra::SymmetricEigen;

use crate::{
    Cmat, Complex, ForceConstants, PhononCells, PhononError, Thz, Vec3,
    nac::Nac,
};

/// tolerance in Å for treating two periodic images as equally short
const SHORTEST_TOL: f64 = 1e-5;

/// the force constants of a supercell arranged for Fourier interpolation at
/// arbitrary wave vectors
#[derive(Clone, Debug)]
pub struct DynamicalMatrix {
    cells: PhononCells,
    fc: ForceConstants,
    /// for each primitive atom `p` and supercell atom `s`, every shortest
    /// vector from `p` to an image of `s` in the primitive fractional basis
    svecs: Vec<Vec<Vec<Vec3>>>,
    nac: Option<Nac>,
}

/// the shortest vectors between `from` and every periodic image of `to`
fn shortest_vectors(cells: &PhononCells, from: usize, to: usize) -> Vec<Vec3> {
    let sc = &cells.supercell.cell;
    let pos = sc.positions();
    let d = pos[to] - pos[from];
    let d = d - d.map(f64::round);
    let m = cells.prim_supercell.cast::<f64>();
    let mut images = Vec::with_capacity(27);
    for i in -1..=1 {
        for j in -1..=1 {
            for k in -1..=1 {
                let v = d + Vec3::new(i as f64, j as f64, k as f64);
                images.push((sc.to_cart(&v).norm(), v));
            }
        }
    }
    let min = images.iter().map(|(l, _)| *l).fold(f64::INFINITY, f64::min);
    images
        .into_iter()
        .filter(|(l, _)| *l - min < SHORTEST_TOL)
        .map(|(_, v)| m * v)
        .collect()
}

impl DynamicalMatrix {
    pub fn new(
        cells: PhononCells,
        fc: ForceConstants,
    ) -> Result<Self, PhononError> {
        if fc.natoms() != cells.natoms() {
            return Err(PhononError::SupercellMismatch {
                expected: cells.natoms(),
                got: fc.natoms(),
            });
        }
        let svecs = cells
            .p2s
            .iter()
            .map(|&i| {
                (0..cells.natoms())
                    .map(|s| shortest_vectors(&cells, i, s))
                    .collect()
            })
            .collect();
        Ok(Self {
            cells,
            fc,
            svecs,
            nac: None,
        })
    }

    pub fn set_nac(&mut self, nac: Option<Nac>) {
        if nac.is_some() {
            log::warn!("using non-analytical term correction");
        }
        self.nac = nac;
    }

    pub fn cells(&self) -> &PhononCells {
        &self.cells
    }

    pub fn force_constants(&self) -> &ForceConstants {
        &self.fc
    }

    /// dimension of the matrix, 3 × the primitive atom count
    pub fn dim(&self) -> usize {
        3 * self.cells.nprim()
    }

    /// the mass-weighted dynamical matrix at the fractional wave vector `q`
    pub fn at(&self, q: &Vec3) -> Cmat {
        let n = self.cells.nprim();
        let masses = self.cells.primitive.cell.masses();
        let nac = self.nac.as_ref().and_then(|nac| nac.blocks(q));
        let mut dm = Cmat::zeros(3 * n, 3 * n);
        for (p, &i) in self.cells.p2s.iter().enumerate() {
            for s in 0..self.cells.natoms() {
                let pp = self.cells.s2p[s];
                let svecs = &self.svecs[p][s];
                let phase: Complex = svecs
                    .iter()
                    .map(|v| Complex::from_polar(1.0, 2.0 * PI * q.dot(v)))
                    .sum::<Complex>()
                    / svecs.len() as f64;
                let mut block = *self.fc.block(i, s);
                if let Some(nac) = &nac {
                    block += nac[p][pp];
                }
                let w = phase / (masses[p] * masses[pp]).sqrt();
                for a in 0..3 {
                    for b in 0..3 {
                        dm[(3 * p + a, 3 * pp + b)] += w * block[(a, b)];
                    }
                }
            }
        }
        dm
    }

    /// frequencies and eigenvectors at `q`
    pub fn modes(&self, q: &Vec3) -> Modes {
        Modes::diagonalize(&self.at(q))
    }
}

/// phonon modes at one wave vector. column `k` of `eigenvectors` belongs to
/// `frequencies[k]`, sorted in ascending order
#[derive(Clone, Debug)]
pub struct Modes {
    pub frequencies: Vec<Thz>,
    pub eigenvectors: Cmat,
}

impl Modes {
    pub fn diagonalize(dm: &Cmat) -> Self {
        let herm = (dm + dm.adjoint()).map(|z| z * 0.5);
        let eig = SymmetricEigen::new(herm);
        let mut order: Vec<usize> = (0..eig.eigenvalues.len()).collect();
        order.sort_by(|&a, &b| eig.eigenvalues[a].total_cmp(&eig.eigenvalues[b]));
        let frequencies = order
            .iter()
            .map(|&k| Thz::from_eigenvalue(eig.eigenvalues[k]))
            .collect();
        let eigenvectors = Cmat::from_fn(dm.nrows(), order.len(), |r, c| {
            eig.eigenvectors[(r, order[c])]
        });
        Self {
            frequencies,
            eigenvectors,
        }
    }

    /// the eigenvectors in (mode, component) layout, one row per mode
    pub fn arranged(&self) -> Cmat {
        self.eigenvectors.transpose()
    }

    /// the largest deviation of `EᴴE` from the identity
    pub fn orthonormality_error(&self) -> f64 {
        let e = &self.eigenvectors;
        let prod = e.adjoint() * e;
        let n = prod.nrows();
        let mut max = 0.0f64;
        for i in 0..n {
            for j in 0..n {
                let target = if i == j { 1.0 } else { 0.0 };
                max = max.max((prod[(i, j)] - Complex::new(target, 0.0)).norm());
            }
        }
        max
    }
}

/// scale every row of `m` to unit length
pub fn normalize_rows(m: &mut Cmat) {
    for mut row in m.row_iter_mut() {
        let norm = row.iter().map(|z| z.norm_sqr()).sum::<f64>().sqrt();
        if norm > 0.0 {
            row.iter_mut().for_each(|z| *z /= norm);
        }
    }
}
