//! the primitive cell and supercell of a phonon calculation and the maps
//! between them

use crystal::{
    Cell, IMat3, Primitive, SYMPREC, SpaceGroup, Supercell, SupercellMatrix,
    lattice_points, to_integer, wrap_vec,
};

use crate::{Mat3, PhononError, Vec3};

#[derive(Clone, Debug)]
pub struct PhononCells {
    pub unit: Cell,
    pub primitive: Primitive,
    pub supercell: Supercell,
    /// the supercell in the primitive basis, P⁻¹·S
    pub prim_supercell: IMat3,
    /// primitive atom of each supercell atom
    pub s2p: Vec<usize>,
    /// supercell atom standing in for each primitive atom
    pub p2s: Vec<usize>,
    /// supercell positions in the primitive fractional basis
    pub prim_frac: Vec<Vec3>,
}

impl PhononCells {
    pub fn new(
        unit: &Cell,
        pmat: &Mat3,
        smat: &SupercellMatrix,
    ) -> Result<Self, PhononError> {
        let pinv = pmat
            .try_inverse()
            .ok_or(crystal::CrystalError::SingularMatrix)?;
        let prim_supercell = to_integer(&(pinv * smat.as_f64()), 1e-6)
            .ok_or(PhononError::NotCommensurate)?;
        let primitive = unit.primitive(pmat, SYMPREC)?;
        let supercell = unit.supercell(smat)?;
        let s2p = supercell
            .s2u
            .iter()
            .map(|&u| primitive.u2p[u])
            .collect();
        let p2s = primitive
            .p2u
            .iter()
            .map(|&u| supercell.atom_index(u, 0))
            .collect();
        let prim_frac = (0..supercell.len())
            .map(|s| pinv * supercell.unit_frac(s))
            .collect();
        Ok(Self {
            unit: unit.clone(),
            primitive,
            supercell,
            prim_supercell,
            s2p,
            p2s,
            prim_frac,
        })
    }

    pub fn nprim(&self) -> usize {
        self.primitive.cell.len()
    }

    /// number of supercell atoms
    pub fn natoms(&self) -> usize {
        self.supercell.len()
    }

    /// number of primitive cells in the supercell
    pub fn ncells(&self) -> usize {
        self.natoms() / self.nprim()
    }

    /// the fractional wave vectors in the primitive reciprocal basis that are
    /// periodic in the supercell, folded into [0, 1) with Γ first
    pub fn commensurate_points(&self) -> Result<Vec<Vec3>, PhononError> {
        let mt = SupercellMatrix::new(self.prim_supercell.transpose())?;
        let inv = mt
            .as_f64()
            .try_inverse()
            .ok_or(crystal::CrystalError::SingularMatrix)?;
        Ok(lattice_points(&mt)?
            .iter()
            .map(|n| wrap_vec(&(inv * n.cast::<f64>())))
            .collect())
    }

    pub fn unit_group(&self) -> SpaceGroup {
        SpaceGroup::find(&self.unit, SYMPREC)
    }

    /// the space group of the supercell and the Cartesian rotation of each
    /// of its operations
    pub fn supercell_group(
        &self,
    ) -> Result<(SpaceGroup, Vec<Mat3>), PhononError> {
        let group = self.unit_group().for_supercell(&self.supercell)?;
        let rotations = group.cartesian_rotations(&self.supercell.cell);
        Ok((group, rotations))
    }
}

/// the images of the fractional wave vector `q` under the rotations of
/// `unit`'s space group, keeping those with no negative component.
/// `pmat` converts the rotations to the primitive basis of `q`
pub fn equivalent_q_points(q: &Vec3, unit: &Cell, pmat: &Mat3) -> Vec<Vec3> {
    let Some(pinv) = pmat.try_inverse() else {
        return Vec::new();
    };
    let group = SpaceGroup::find(unit, SYMPREC);
    let mut ret: Vec<Vec3> = Vec::new();
    for r in group.rotations() {
        let op = pinv * r.cast::<f64>() * pmat;
        let image = op.transpose() * q;
        if image.iter().all(|&x| x >= -1e-10)
            && !ret.iter().any(|p| (p - image).amax() < 1e-8)
        {
            ret.push(image);
        }
    }
    ret
}
