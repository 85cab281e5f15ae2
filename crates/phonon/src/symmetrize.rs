//! crystal-symmetry averaging of supercell force constants

use crystal::SpaceGroup;
use rayon::prelude::*;

use crate::{ForceConstants, Mat3};

/// average `fc` over `group`, a space group of its supercell:
/// `Φ'(i,j) = 1/|G| Σ_g R_gᵀ Φ(g(i), g(j)) R_g`. `rotations` holds the
/// Cartesian rotation of each operation
pub fn symmetrize_force_constants(
    fc: &ForceConstants,
    group: &SpaceGroup,
    rotations: &[Mat3],
) -> ForceConstants {
    let n = fc.natoms();
    let nops = group.len() as f64;
    let rows: Vec<Vec<Mat3>> = (0..n)
        .into_par_iter()
        .map(|i| {
            (0..n)
                .map(|j| {
                    let mut sum = Mat3::zeros();
                    for (perm, r) in group.permutations.iter().zip(rotations) {
                        sum += r.transpose() * fc.block(perm[i], perm[j]) * r;
                    }
                    sum / nops
                })
                .collect()
        })
        .collect();
    ForceConstants::from_parts(
        n,
        rows.into_iter().flatten().collect(),
        fc.supercell_source(),
    )
}
