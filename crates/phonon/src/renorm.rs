use std::f64::consts::PI;

use crystal::SupercellMatrix;

use crate::{
    Cmat, Complex, ForceConstants, Mat3, PhononCells, PhononError, Structure,
    Thz, Vec3, force::SupercellSource, symmetrize::symmetrize_force_constants,
};

/// the inverse of [crate::DynamicalMatrix]: dynamical matrices at every
/// commensurate point of a supercell are Fourier transformed back into
/// supercell force constants
pub struct DynmatToForceConstants<'a> {
    cells: &'a PhononCells,
    points: Vec<Vec3>,
    dynmats: Vec<Cmat>,
}

impl<'a> DynmatToForceConstants<'a> {
    pub fn new(cells: &'a PhononCells) -> Result<Self, PhononError> {
        Ok(Self {
            cells,
            points: cells.commensurate_points()?,
            dynmats: Vec::new(),
        })
    }

    pub fn commensurate_points(&self) -> &[Vec3] {
        &self.points
    }

    /// build `D(q) = E·diag(sign(ω)ω²)·Eᴴ` at each commensurate point from
    /// frequencies and column eigenvectors
    pub fn set_dynamical_matrices(
        &mut self,
        frequencies: &[Vec<Thz>],
        eigenvectors: &[Cmat],
    ) -> Result<(), PhononError> {
        let npts = self.points.len();
        let dim = 3 * self.cells.nprim();
        if frequencies.len() != npts || eigenvectors.len() != npts {
            return Err(PhononError::ShapeMismatch(format!(
                "{} frequency sets and {} eigenvector sets for {npts} \
                 commensurate points",
                frequencies.len(),
                eigenvectors.len()
            )));
        }
        let mut dynmats = Vec::with_capacity(npts);
        for (k, (freqs, vecs)) in frequencies.iter().zip(eigenvectors).enumerate()
        {
            if freqs.len() != dim || vecs.shape() != (dim, dim) {
                return Err(PhononError::ShapeMismatch(format!(
                    "q-point {k}: {} frequencies and a {}x{} eigenvector \
                     matrix for {dim} degrees of freedom",
                    freqs.len(),
                    vecs.nrows(),
                    vecs.ncols()
                )));
            }
            let mut scaled = vecs.clone();
            for (mut col, f) in scaled.column_iter_mut().zip(freqs) {
                col *= Complex::new(f.to_eigenvalue(), 0.0);
            }
            dynmats.push(scaled * vecs.adjoint());
        }
        self.dynmats = dynmats;
        Ok(())
    }

    /// the supercell force constants, unsymmetrized
    pub fn run(&self) -> Result<ForceConstants, PhononError> {
        let npts = self.points.len();
        if self.dynmats.len() != npts {
            return Err(PhononError::ShapeMismatch(
                "dynamical matrices have not been set".into(),
            ));
        }
        let cells = self.cells;
        let natoms = cells.natoms();
        let masses = cells.primitive.cell.masses();
        // phase factor of every atom at every q-point
        let phases: Vec<Vec<Complex>> = self
            .points
            .iter()
            .map(|q| {
                cells
                    .prim_frac
                    .iter()
                    .map(|x| Complex::from_polar(1.0, 2.0 * PI * q.dot(x)))
                    .collect()
            })
            .collect();
        let mut blocks = Vec::with_capacity(natoms * natoms);
        for i in 0..natoms {
            let p = cells.s2p[i];
            for j in 0..natoms {
                let pp = cells.s2p[j];
                let fac = (masses[p] * masses[pp]).sqrt() / npts as f64;
                let mut block = Mat3::zeros();
                for (dm, ph) in self.dynmats.iter().zip(&phases) {
                    let c = ph[i] * ph[j].conj();
                    for a in 0..3 {
                        for b in 0..3 {
                            block[(a, b)] +=
                                (dm[(3 * p + a, 3 * pp + b)] * c).re;
                        }
                    }
                }
                blocks.push(block * fac);
            }
        }
        Ok(ForceConstants::from_parts(
            natoms,
            blocks,
            SupercellSource::Given(cells.supercell.matrix),
        ))
    }
}

/// the commensurate points of `fc_supercell` for the primitive cell of
/// `structure`, in the primitive reciprocal basis with Γ first
pub fn commensurate_points(
    structure: &Structure,
    fc_supercell: &SupercellMatrix,
) -> Result<Vec<Vec3>, PhononError> {
    let cells = PhononCells::new(
        structure.cell(),
        structure.primitive_matrix(),
        fc_supercell,
    )?;
    cells.commensurate_points()
}

/// reconstruct the force constants of `fc_supercell` from (renormalized)
/// frequencies and eigenvectors at each of its commensurate points.
/// `eigenvectors` are in (mode, component) layout, one row per mode
pub fn renormalized_force_constants(
    frequencies: &[Vec<Thz>],
    eigenvectors: &[Cmat],
    structure: &Structure,
    fc_supercell: &SupercellMatrix,
    symmetrize: bool,
) -> Result<ForceConstants, PhononError> {
    let cells = PhononCells::new(
        structure.cell(),
        structure.primitive_matrix(),
        fc_supercell,
    )?;
    let mut d2f = DynmatToForceConstants::new(&cells)?;
    let columns: Vec<Cmat> = eigenvectors.iter().map(|e| e.transpose()).collect();
    d2f.set_dynamical_matrices(frequencies, &columns)?;
    let fc = d2f.run()?;
    if symmetrize {
        log::info!("symmetrizing force constants");
        let (group, rotations) = cells.supercell_group()?;
        return Ok(symmetrize_force_constants(&fc, &group, &rotations));
    }
    Ok(fc)
}
