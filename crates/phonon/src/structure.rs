use crystal::{Cell, Primitive, SYMPREC, SupercellMatrix};

use crate::{BornCharges, ForceConstants, ForceSets, Mat3, PhononError};

/// a crystal together with everything needed to compute its phonons: the
/// primitive transformation, the phonon supercell, and whatever force data
/// has been attached or computed
#[derive(Clone, Debug)]
pub struct Structure {
    cell: Cell,
    primitive_matrix: Mat3,
    supercell_phonon: Option<SupercellMatrix>,
    force_constants: Option<ForceConstants>,
    force_sets: Option<ForceSets>,
    born: Option<BornCharges>,
}

impl Structure {
    pub fn new(cell: Cell) -> Self {
        Self {
            cell,
            primitive_matrix: Mat3::identity(),
            supercell_phonon: None,
            force_constants: None,
            force_sets: None,
            born: None,
        }
    }

    pub fn cell(&self) -> &Cell {
        &self.cell
    }

    pub fn cell_mut(&mut self) -> &mut Cell {
        &mut self.cell
    }

    pub fn primitive_matrix(&self) -> &Mat3 {
        &self.primitive_matrix
    }

    pub fn set_primitive_matrix(&mut self, pmat: Mat3) {
        self.primitive_matrix = pmat;
    }

    pub fn supercell_phonon(&self) -> Option<SupercellMatrix> {
        self.supercell_phonon
    }

    pub fn set_supercell_phonon(&mut self, supercell: SupercellMatrix) {
        self.supercell_phonon = Some(supercell);
    }

    pub fn force_constants(&self) -> Option<&ForceConstants> {
        self.force_constants.as_ref()
    }

    pub fn set_force_constants(&mut self, fc: ForceConstants) {
        self.force_constants = Some(fc);
    }

    pub fn force_sets(&self) -> Option<&ForceSets> {
        self.force_sets.as_ref()
    }

    pub fn set_force_sets(&mut self, sets: ForceSets) {
        self.force_sets = Some(sets);
    }

    pub fn born(&self) -> Option<&BornCharges> {
        self.born.as_ref()
    }

    pub fn set_born(&mut self, born: BornCharges) {
        self.born = Some(born);
    }

    pub fn primitive(&self) -> Result<Primitive, PhononError> {
        Ok(self.cell.primitive(&self.primitive_matrix, SYMPREC)?)
    }

    pub fn number_of_atoms(&self) -> usize {
        self.cell.len()
    }

    pub fn number_of_primitive_atoms(&self) -> Result<usize, PhononError> {
        Ok(self.primitive()?.cell.len())
    }

    /// ratio of unit-cell to primitive-cell atoms, used to report per-cell
    /// quantities for the unit cell
    pub fn unit_cell_relation(&self) -> Result<f64, PhononError> {
        Ok(self.number_of_atoms() as f64
            / self.number_of_primitive_atoms()? as f64)
    }

    /// the supercell a phonon calculation should use: `custom` if given, then
    /// the phonon supercell, then the supercell of the attached force data,
    /// and finally the identity
    pub fn resolve_supercell(
        &self,
        custom: Option<SupercellMatrix>,
    ) -> SupercellMatrix {
        custom
            .or(self.supercell_phonon)
            .or_else(|| self.force_constants.as_ref().map(|f| f.supercell()))
            .or_else(|| self.force_sets.as_ref().map(|f| f.supercell()))
            .unwrap_or_else(|| {
                log::warn!("no phonon supercell defined, set to identity");
                SupercellMatrix::identity()
            })
    }
}
