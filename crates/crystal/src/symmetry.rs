//! brute-force space group search for small cells and its extension to
//! supercells

use crate::{
    Cell, CrystalError, IMat3, IVec3, Mat3, Supercell, Vec3, int_det, to_integer,
    wrap_vec,
};

#[derive(Clone, Debug, PartialEq)]
pub struct SymmetryOperation {
    /// rotation acting on fractional coordinates
    pub rotation: IMat3,
    /// fractional translation in [0, 1)
    pub translation: Vec3,
}

impl SymmetryOperation {
    pub fn apply(&self, frac: &Vec3) -> Vec3 {
        self.rotation.cast::<f64>() * frac + self.translation
    }
}

/// the operations of a space group along with the atom permutation each one
/// induces on the cell it was found for
#[derive(Clone, Debug)]
pub struct SpaceGroup {
    pub operations: Vec<SymmetryOperation>,
    /// `permutations[k][i]` is the atom that operation `k` sends atom `i` to
    pub permutations: Vec<Vec<usize>>,
    /// lattice vector `m` with `r·xᵢ + t = x_{perm(i)} + m`
    shifts: Vec<Vec<IVec3>>,
}

/// the integer matrices with elements in {-1, 0, 1} that preserve the metric of
/// `cell`'s lattice. the identity comes first
pub fn lattice_rotations(cell: &Cell, symprec: f64) -> Vec<IMat3> {
    let lat = cell.lattice();
    let metric = lat * lat.transpose();
    let lens = Vec3::from_fn(|i, _| metric[(i, i)].sqrt());
    let mut ret = vec![IMat3::identity()];
    for code in 0..3_i32.pow(9) {
        let mut elts = [0; 9];
        let mut c = code;
        for e in &mut elts {
            *e = c % 3 - 1;
            c /= 3;
        }
        let r = IMat3::from_row_slice(&elts);
        if r == IMat3::identity() || int_det(&r).abs() != 1 {
            continue;
        }
        let rf = r.cast::<f64>();
        let diff = rf.transpose() * metric * rf - metric;
        let ok = (0..3).all(|i| {
            (0..3).all(|j| diff[(i, j)].abs() < symprec * (lens[i] + lens[j]))
        });
        if ok {
            ret.push(r);
        }
    }
    ret
}

/// try to map every atom of `cell` under `(r, t)`, returning the permutation
/// and lattice shifts if each atom lands on an atom of the same element
fn map_atoms(
    cell: &Cell,
    r: &Mat3,
    t: &Vec3,
    symprec: f64,
) -> Option<(Vec<usize>, Vec<IVec3>)> {
    let mut perm = Vec::with_capacity(cell.len());
    let mut shifts = Vec::with_capacity(cell.len());
    let mut seen = vec![false; cell.len()];
    for (pos, sym) in cell.positions().iter().zip(cell.symbols()) {
        let image = r * pos + t;
        let j = cell.find_atom(&image, sym, symprec)?;
        if seen[j] {
            return None;
        }
        seen[j] = true;
        perm.push(j);
        shifts.push((image - cell.positions()[j]).map(|x| x.round() as i32));
    }
    Some((perm, shifts))
}

impl SpaceGroup {
    /// find the space group of `cell`. candidate translations come from
    /// sending one atom of the least common element onto each atom of the
    /// same element
    pub fn find(cell: &Cell, symprec: f64) -> Self {
        let mut operations = Vec::new();
        let mut permutations = Vec::new();
        let mut shifts = Vec::new();
        if cell.is_empty() {
            return Self {
                operations,
                permutations,
                shifts,
            };
        }
        let symbols = cell.symbols();
        let count = |s: &String| symbols.iter().filter(|&t| t == s).count();
        let anchor = (0..cell.len())
            .min_by_key(|&i| count(&symbols[i]))
            .unwrap_or(0);
        let apos = cell.positions()[anchor];
        for r in lattice_rotations(cell, symprec) {
            let rf = r.cast::<f64>();
            let origin = rf * apos;
            for (k, pos) in cell.positions().iter().enumerate() {
                if symbols[k] != symbols[anchor] {
                    continue;
                }
                let t = wrap_vec(&(pos - origin));
                if let Some((perm, shift)) = map_atoms(cell, &rf, &t, symprec) {
                    operations.push(SymmetryOperation {
                        rotation: r,
                        translation: t,
                    });
                    permutations.push(perm);
                    shifts.push(shift);
                }
            }
        }
        log::debug!("found {} symmetry operations", operations.len());
        Self {
            operations,
            permutations,
            shifts,
        }
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// lift a group found for the unit cell of `sc` to `sc` itself. the
    /// result contains every unit-cell operation whose rotation stays integral
    /// in the supercell basis, combined with each internal lattice
    /// translation
    pub fn for_supercell(&self, sc: &Supercell) -> Result<Self, CrystalError> {
        let s = sc.matrix.as_f64();
        let s_inv = s.try_inverse().ok_or(CrystalError::SingularMatrix)?;
        let nops = self.len() * sc.ncells();
        let mut operations = Vec::with_capacity(nops);
        let mut permutations = Vec::with_capacity(nops);
        let mut shifts = Vec::with_capacity(nops);
        for (k, op) in self.operations.iter().enumerate() {
            let r = op.rotation;
            let Some(r_sc) = to_integer(&(s_inv * r.cast::<f64>() * s), 1e-8)
            else {
                log::debug!("dropping rotation incompatible with supercell");
                continue;
            };
            for n in &sc.lattice_points {
                let t_sc =
                    wrap_vec(&(s_inv * (op.translation + n.cast::<f64>())));
                let mut perm = Vec::with_capacity(sc.len());
                let mut shift = Vec::with_capacity(sc.len());
                for a in 0..sc.len() {
                    let u = sc.s2u[a];
                    let m = self.shifts[k][u]
                        + r * sc.lattice_points[sc.s2l[a]]
                        + n;
                    let l = sc.lattice_point_index(&m).ok_or_else(|| {
                        CrystalError::Unmapped(format!(
                            "lattice point {m:?} is outside the supercell"
                        ))
                    })?;
                    let b = sc.atom_index(self.permutations[k][u], l);
                    let image =
                        r_sc.cast::<f64>() * sc.cell.positions()[a] + t_sc;
                    let d = image - sc.cell.positions()[b];
                    perm.push(b);
                    shift.push(d.map(|x| x.round() as i32));
                }
                operations.push(SymmetryOperation {
                    rotation: r_sc,
                    translation: t_sc,
                });
                permutations.push(perm);
                shifts.push(shift);
            }
        }
        Ok(Self {
            operations,
            permutations,
            shifts,
        })
    }

    /// indices of the operations that leave `atom` in place
    pub fn site_symmetry(&self, atom: usize) -> Vec<usize> {
        self.permutations
            .iter()
            .enumerate()
            .filter(|(_, p)| p[atom] == atom)
            .map(|(k, _)| k)
            .collect()
    }

    /// the lowest-index atom of each orbit, in increasing order
    pub fn independent_atoms(&self, natoms: usize) -> Vec<usize> {
        let mut covered = vec![false; natoms];
        let mut ret = Vec::new();
        for i in 0..natoms {
            if covered[i] {
                continue;
            }
            ret.push(i);
            covered[i] = true;
            for perm in &self.permutations {
                covered[perm[i]] = true;
            }
        }
        ret
    }

    /// the distinct rotations, in order of first appearance
    pub fn rotations(&self) -> Vec<IMat3> {
        let mut ret: Vec<IMat3> = Vec::new();
        for op in &self.operations {
            if !ret.contains(&op.rotation) {
                ret.push(op.rotation);
            }
        }
        ret
    }

    /// Cartesian rotation matrix of every operation for `cell`
    pub fn cartesian_rotations(&self, cell: &Cell) -> Vec<Mat3> {
        self.operations
            .iter()
            .map(|op| cell.cartesian_rotation(&op.rotation))
            .collect()
    }
}
