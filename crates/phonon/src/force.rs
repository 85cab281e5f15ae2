use crystal::SupercellMatrix;

use crate::{Mat3, PhononError, Vec3};

/// where the supercell attached to a set of force data came from. force data
/// read without a supercell falls back to the identity, and that fallback is
/// recorded here instead of being indistinguishable from a real 1x1x1 cell
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SupercellSource {
    Given(SupercellMatrix),
    DefaultIdentity,
}

impl SupercellSource {
    /// wrap an optional supercell, warning when it has to be defaulted
    pub fn from_option(supercell: Option<SupercellMatrix>) -> Self {
        match supercell {
            Some(s) => Self::Given(s),
            None => {
                log::warn!("no force data supercell defined, set to identity");
                Self::DefaultIdentity
            }
        }
    }

    pub fn matrix(&self) -> SupercellMatrix {
        match self {
            SupercellSource::Given(s) => *s,
            SupercellSource::DefaultIdentity => SupercellMatrix::identity(),
        }
    }

    /// whether the identity was filled in for a missing supercell
    pub fn is_default(&self) -> bool {
        matches!(self, Self::DefaultIdentity)
    }
}

/// second derivatives of the energy with respect to Cartesian atomic
/// displacements over a full supercell, in eV/Å². element `(i, j, a, b)` is
/// stored in the 3x3 block `i * natoms + j`
#[derive(Clone, Debug, PartialEq)]
pub struct ForceConstants {
    natoms: usize,
    blocks: Vec<Mat3>,
    supercell: SupercellSource,
}

impl ForceConstants {
    pub fn new(
        natoms: usize,
        blocks: Vec<Mat3>,
        supercell: Option<SupercellMatrix>,
    ) -> Result<Self, PhononError> {
        if blocks.len() != natoms * natoms {
            return Err(PhononError::ShapeMismatch(format!(
                "{} force constant blocks for {natoms} atoms",
                blocks.len()
            )));
        }
        Ok(Self {
            natoms,
            blocks,
            supercell: SupercellSource::from_option(supercell),
        })
    }

    pub(crate) fn from_parts(
        natoms: usize,
        blocks: Vec<Mat3>,
        supercell: SupercellSource,
    ) -> Self {
        debug_assert_eq!(blocks.len(), natoms * natoms);
        Self {
            natoms,
            blocks,
            supercell,
        }
    }

    pub fn zeros(natoms: usize, supercell: SupercellMatrix) -> Self {
        Self::from_parts(
            natoms,
            vec![Mat3::zeros(); natoms * natoms],
            SupercellSource::Given(supercell),
        )
    }

    /// build force constants block by block from `f(i, j)`
    pub fn from_fn(
        natoms: usize,
        supercell: SupercellMatrix,
        mut f: impl FnMut(usize, usize) -> Mat3,
    ) -> Self {
        let mut blocks = Vec::with_capacity(natoms * natoms);
        for i in 0..natoms {
            for j in 0..natoms {
                blocks.push(f(i, j));
            }
        }
        Self::from_parts(natoms, blocks, SupercellSource::Given(supercell))
    }

    pub fn natoms(&self) -> usize {
        self.natoms
    }

    /// the tensor shape `(natoms, natoms, 3, 3)`
    pub fn shape(&self) -> (usize, usize, usize, usize) {
        (self.natoms, self.natoms, 3, 3)
    }

    pub fn block(&self, i: usize, j: usize) -> &Mat3 {
        &self.blocks[i * self.natoms + j]
    }

    pub fn get(&self, i: usize, j: usize, a: usize, b: usize) -> f64 {
        self.block(i, j)[(a, b)]
    }

    pub fn blocks(&self) -> &[Mat3] {
        &self.blocks
    }

    pub fn supercell(&self) -> SupercellMatrix {
        self.supercell.matrix()
    }

    pub fn supercell_source(&self) -> SupercellSource {
        self.supercell
    }

    #[must_use]
    pub fn is_supercell_defaulted(&self) -> bool {
        self.supercell.is_default()
    }

    /// attach a supercell after the fact
    pub fn with_supercell(mut self, supercell: SupercellMatrix) -> Self {
        self.supercell = SupercellSource::Given(supercell);
        self
    }

    /// largest absolute elementwise difference from `other`
    pub fn max_abs_diff(&self, other: &Self) -> f64 {
        self.blocks
            .iter()
            .zip(&other.blocks)
            .map(|(a, b)| (a - b).amax())
            .fold(0.0, f64::max)
    }

    /// largest absolute element
    pub fn max_abs(&self) -> f64 {
        self.blocks.iter().map(|b| b.amax()).fold(0.0, f64::max)
    }
}

/// one displaced configuration: the displaced atom, its Cartesian
/// displacement in Å, and the resulting force on every atom in eV/Å
#[derive(Clone, Debug, PartialEq)]
pub struct Displacement {
    pub atom: usize,
    pub displacement: Vec3,
    pub forces: Vec<Vec3>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ForceSets {
    natoms: usize,
    displacements: Vec<Displacement>,
    supercell: SupercellSource,
}

impl ForceSets {
    pub fn new(
        natoms: usize,
        displacements: Vec<Displacement>,
        supercell: Option<SupercellMatrix>,
    ) -> Result<Self, PhononError> {
        for (i, d) in displacements.iter().enumerate() {
            if d.forces.len() != natoms || d.atom >= natoms {
                return Err(PhononError::ShapeMismatch(format!(
                    "displacement {} of atom {} has {} forces for {natoms} \
                     atoms",
                    i + 1,
                    d.atom + 1,
                    d.forces.len()
                )));
            }
        }
        Ok(Self {
            natoms,
            displacements,
            supercell: SupercellSource::from_option(supercell),
        })
    }

    pub fn natoms(&self) -> usize {
        self.natoms
    }

    pub fn displacements(&self) -> &[Displacement] {
        &self.displacements
    }

    pub fn supercell(&self) -> SupercellMatrix {
        self.supercell.matrix()
    }

    pub fn supercell_source(&self) -> SupercellSource {
        self.supercell
    }

    #[must_use]
    pub fn is_supercell_defaulted(&self) -> bool {
        self.supercell.is_default()
    }

    pub fn with_supercell(mut self, supercell: SupercellMatrix) -> Self {
        self.supercell = SupercellSource::Given(supercell);
        self
    }
}
