//! YAML files holding frequencies and eigenvectors at the commensurate
//! points of a supercell. these are written by `phonon-tool modes`, edited
//! or replaced by renormalized values, and read back by `phonon-tool
//! renormalize`

use std::{fs::read_to_string, path::Path};

use anyhow::{Context, bail};
use crystal::{IMat3, SupercellMatrix};
use phonon::{Cmat, Complex, Thz, Vec3};
use serde::{Deserialize, Serialize};

const QPOINT_TOL: f64 = 1e-6;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QPointModes {
    pub q: [f64; 3],
    /// THz
    pub frequencies: Vec<f64>,
    /// one row per mode, each component stored as `[re, im]`
    pub eigenvectors: Vec<Vec<[f64; 2]>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModesFile {
    /// rows of the supercell matrix
    pub supercell: [[i32; 3]; 3],
    pub qpoints: Vec<QPointModes>,
}

impl QPointModes {
    pub fn new(q: &Vec3, frequencies: &[Thz], eigenvectors: &Cmat) -> Self {
        Self {
            q: [q[0], q[1], q[2]],
            frequencies: frequencies.iter().map(|f| f.value()).collect(),
            eigenvectors: eigenvectors
                .row_iter()
                .map(|row| row.iter().map(|z| [z.re, z.im]).collect())
                .collect(),
        }
    }

    /// the eigenvectors as a (mode, component) matrix
    pub fn eigenvectors(&self) -> anyhow::Result<Cmat> {
        let n = self.eigenvectors.len();
        if n != self.frequencies.len()
            || self.eigenvectors.iter().any(|r| r.len() != n)
        {
            bail!(
                "q-point {:?}: expected {} square eigenvector rows",
                self.q,
                self.frequencies.len()
            );
        }
        Ok(Cmat::from_fn(n, n, |i, j| {
            let [re, im] = self.eigenvectors[i][j];
            Complex::new(re, im)
        }))
    }
}

impl ModesFile {
    pub fn new(supercell: &SupercellMatrix, qpoints: Vec<QPointModes>) -> Self {
        let m = supercell.matrix();
        Self {
            supercell: std::array::from_fn(|i| std::array::from_fn(|j| m[(i, j)])),
            qpoints,
        }
    }

    pub fn supercell(&self) -> anyhow::Result<SupercellMatrix> {
        let s = self.supercell;
        Ok(SupercellMatrix::new(IMat3::from_fn(|i, j| s[i][j]))?)
    }

    /// split into per-point frequencies and (mode, component) eigenvectors,
    /// in the order of `points`. every entry must match exactly one of
    /// `points` up to a reciprocal lattice vector
    pub fn bundles(
        &self,
        points: &[Vec3],
    ) -> anyhow::Result<(Vec<Vec<Thz>>, Vec<Cmat>)> {
        if self.qpoints.len() != points.len() {
            bail!(
                "modes given at {} q-points, expected {}",
                self.qpoints.len(),
                points.len()
            );
        }
        let mut used = vec![false; self.qpoints.len()];
        let mut freqs = Vec::with_capacity(points.len());
        let mut vecs = Vec::with_capacity(points.len());
        for q in points {
            let Some(i) = (0..self.qpoints.len())
                .find(|&i| !used[i] && equivalent(&self.qpoints[i].q, q))
            else {
                bail!(
                    "no modes given at commensurate point [{:.6}, {:.6}, {:.6}]",
                    q[0],
                    q[1],
                    q[2]
                );
            };
            used[i] = true;
            let p = &self.qpoints[i];
            freqs.push(p.frequencies.iter().map(|&f| Thz(f)).collect());
            vecs.push(p.eigenvectors()?);
        }
        Ok((freqs, vecs))
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let s = read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_yaml::from_str(&s)
            .with_context(|| format!("failed to parse {}", path.display()))
    }

    pub fn dump(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        let s = serde_yaml::to_string(self)?;
        std::fs::write(path, s)
            .with_context(|| format!("failed to write {}", path.display()))
    }
}

fn equivalent(a: &[f64; 3], b: &Vec3) -> bool {
    let d = Vec3::from(*a) - b;
    (d - d.map(f64::round)).amax() < QPOINT_TOL
}
