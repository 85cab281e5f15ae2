//! solving force sets for force constants

use crystal::SpaceGroup;

use crate::{
    Dmat, ForceConstants, ForceSets, Mat3, PhononCells, PhononError,
    force::SupercellSource,
};

/// singular values below this fraction of the largest are treated as zero
const RANK_TOL: f64 = 1e-8;

/// displacements of one atom expanded by its site symmetry: the rows of `u`
/// are displacements and `forces[j]` holds the matching forces on atom `j`
fn expand_site(
    sets: &ForceSets,
    atom: usize,
    group: &SpaceGroup,
    rotations: &[Mat3],
) -> (Dmat, Vec<Dmat>) {
    let site = group.site_symmetry(atom);
    let disps: Vec<_> = sets
        .displacements()
        .iter()
        .filter(|d| d.atom == atom)
        .collect();
    let nrows = disps.len() * site.len();
    let natoms = sets.natoms();
    let mut u = Dmat::zeros(nrows, 3);
    let mut forces = vec![Dmat::zeros(nrows, 3); natoms];
    let mut row = 0;
    for d in &disps {
        for &k in &site {
            let r = &rotations[k];
            let perm = &group.permutations[k];
            let ud = r * d.displacement;
            for a in 0..3 {
                u[(row, a)] = ud[a];
            }
            // op k carries the force on atom i to atom perm[i]
            for (i, f) in d.forces.iter().enumerate() {
                let rf = r * f;
                for a in 0..3 {
                    forces[perm[i]][(row, a)] = rf[a];
                }
            }
            row += 1;
        }
    }
    (u, forces)
}

/// force constants from the displacements and forces in `sets` using the
/// symmetry of the supercell in `cells`. each displaced atom's rows are
/// found from `Φ(a, j) = -U⁺F` and copied to the rest of its orbit
pub fn produce_force_constants(
    sets: &ForceSets,
    cells: &PhononCells,
) -> Result<ForceConstants, PhononError> {
    let natoms = cells.natoms();
    if sets.natoms() != natoms {
        return Err(PhononError::SupercellMismatch {
            expected: natoms,
            got: sets.natoms(),
        });
    }
    let (group, rotations) = cells.supercell_group()?;
    let mut displaced: Vec<usize> = Vec::new();
    for d in sets.displacements() {
        if !displaced.contains(&d.atom) {
            displaced.push(d.atom);
        }
    }
    let mut rows: Vec<Option<Vec<Mat3>>> = vec![None; natoms];
    for &atom in &displaced {
        let (u, forces) = expand_site(sets, atom, &group, &rotations);
        if u.rank(RANK_TOL) < 3 {
            return Err(PhononError::Underdetermined(format!(
                "displacements of atom {} do not span three dimensions",
                atom + 1
            )));
        }
        let uinv = u
            .pseudo_inverse(RANK_TOL)
            .map_err(|e| PhononError::Underdetermined(e.to_owned()))?;
        let row = forces
            .iter()
            .map(|f| {
                let phi = -(&uinv * f);
                Mat3::from_fn(|a, b| phi[(a, b)])
            })
            .collect();
        log::debug!("solved force constants of atom {}", atom + 1);
        rows[atom] = Some(row);
    }
    for i in 0..natoms {
        if rows[i].is_some() {
            continue;
        }
        let source = group.permutations.iter().enumerate().find_map(|(k, p)| {
            displaced.iter().find(|&&a| p[a] == i).map(|&a| (k, a))
        });
        let Some((k, a)) = source else {
            return Err(PhononError::Underdetermined(format!(
                "atom {} is not equivalent to any displaced atom",
                i + 1
            )));
        };
        let r = &rotations[k];
        let perm = &group.permutations[k];
        let mut row = vec![Mat3::zeros(); natoms];
        if let Some(src) = &rows[a] {
            for (j, phi) in src.iter().enumerate() {
                row[perm[j]] = r * phi * r.transpose();
            }
        }
        rows[i] = Some(row);
    }
    let blocks = rows.into_iter().flatten().flatten().collect();
    Ok(ForceConstants::from_parts(
        natoms,
        blocks,
        SupercellSource::Given(cells.supercell.matrix),
    ))
}
