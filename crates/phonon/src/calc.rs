use crystal::SupercellMatrix;

use crate::{
    BandStructure, Cmat, Dos, DosOptions, DynamicalMatrix, ForceConstants,
    Mesh, Modes, PhononCells, PhononError, Structure, ThermalProperty, Thz,
    Vec3, dynmat::normalize_rows, nac::Nac, sets::produce_force_constants,
};

/// default Γ-centred sampling mesh
pub const DEFAULT_MESH: [usize; 3] = [40, 40, 40];

/// a phonon calculation for one structure and supercell, with or without
/// force constants attached
#[derive(Clone, Debug)]
pub struct Phonon {
    cells: PhononCells,
    dm: Option<DynamicalMatrix>,
    /// unit-cell atoms per primitive atom
    scale: f64,
}

impl Phonon {
    pub fn new(cells: PhononCells) -> Self {
        let scale = cells.unit.len() as f64 / cells.nprim() as f64;
        Self {
            cells,
            dm: None,
            scale,
        }
    }

    pub fn cells(&self) -> &PhononCells {
        &self.cells
    }

    /// attach force constants, which must cover the whole supercell
    pub fn set_force_constants(
        &mut self,
        fc: ForceConstants,
    ) -> Result<(), PhononError> {
        self.dm = Some(DynamicalMatrix::new(self.cells.clone(), fc)?);
        Ok(())
    }

    pub fn set_nac(&mut self, nac: Nac) -> Result<(), PhononError> {
        self.dm.as_mut().ok_or(PhononError::NoForceData)?.set_nac(Some(nac));
        Ok(())
    }

    pub fn dynamical_matrix(&self) -> Result<&DynamicalMatrix, PhononError> {
        self.dm.as_ref().ok_or(PhononError::NoForceData)
    }

    pub fn force_constants(&self) -> Result<&ForceConstants, PhononError> {
        Ok(self.dynamical_matrix()?.force_constants())
    }

    pub fn commensurate_points(&self) -> Result<Vec<Vec3>, PhononError> {
        self.cells.commensurate_points()
    }

    pub fn modes(&self, q: &Vec3) -> Result<Modes, PhononError> {
        Ok(self.dynamical_matrix()?.modes(q))
    }

    pub fn mesh(&self, size: [usize; 3]) -> Result<Mesh, PhononError> {
        Ok(Mesh::new(self.dynamical_matrix()?, size))
    }

    /// density of states per unit cell
    pub fn dos(
        &self,
        size: [usize; 3],
        options: &DosOptions,
    ) -> Result<Dos, PhononError> {
        self.mesh(size)?.dos(options, self.scale)
    }

    /// thermal properties per unit cell at temperature `t`
    pub fn thermal_properties(
        &self,
        size: [usize; 3],
        t: f64,
    ) -> Result<ThermalProperty, PhononError> {
        Ok(self.mesh(size)?.thermal_properties(t, self.scale))
    }

    pub fn thermal_range(
        &self,
        size: [usize; 3],
        (t_min, t_max, t_step): (f64, f64, f64),
    ) -> Result<Vec<ThermalProperty>, PhononError> {
        Ok(self
            .mesh(size)?
            .thermal_range(t_min, t_max, t_step, self.scale))
    }

    pub fn band_structure(
        &self,
        segments: &[(Vec3, Vec3)],
        resolution: usize,
    ) -> Result<BandStructure, PhononError> {
        Ok(BandStructure::new(
            self.dynamical_matrix()?,
            segments,
            resolution,
        ))
    }
}

/// set up a phonon calculation for `structure`. with `setup_forces`, the
/// force constants attached to `structure` are used, or computed from its
/// force sets and cached back onto it. `nac` applies the Born charges of
/// `structure`
pub fn get_phonon(
    structure: &mut Structure,
    nac: bool,
    setup_forces: bool,
    custom_supercell: Option<SupercellMatrix>,
) -> Result<Phonon, PhononError> {
    let supercell = structure.resolve_supercell(custom_supercell);
    let cells = PhononCells::new(
        structure.cell(),
        structure.primitive_matrix(),
        &supercell,
    )?;
    let mut phonon = Phonon::new(cells);
    if !setup_forces {
        return Ok(phonon);
    }
    let fc = if let Some(fc) = structure.force_constants() {
        fc.clone()
    } else {
        let sets = structure.force_sets().ok_or(PhononError::NoForceData)?;
        log::info!("computing force constants from force sets");
        let fc = produce_force_constants(sets, phonon.cells())?;
        structure.set_force_constants(fc.clone());
        fc
    };
    phonon.set_force_constants(fc)?;
    if nac {
        let born = structure.born().ok_or(PhononError::NoBornCharges)?;
        let cells = phonon.cells();
        let nac = Nac::new(born, &cells.primitive.cell, cells.ncells())?;
        phonon.set_nac(nac)?;
    }
    Ok(phonon)
}

/// options for [harmonic_modes]
#[derive(Clone, Copy, Debug, Default)]
pub struct HarmonicOptions {
    pub nac: bool,
    /// scale each eigenvector row to unit length
    pub normalize: bool,
    /// log the deviation of the eigenvectors from orthonormality
    pub test_orthonormal: bool,
    /// log the harmonic frequencies
    pub print_data: bool,
}

/// harmonic frequencies at `q` and the eigenvectors in (mode, component)
/// layout
pub fn harmonic_modes(
    structure: &mut Structure,
    q: &Vec3,
    options: HarmonicOptions,
) -> Result<(Vec<Thz>, Cmat), PhononError> {
    let phonon = get_phonon(structure, options.nac, true, None)?;
    let modes = phonon.modes(q)?;
    if options.test_orthonormal {
        let err = modes.orthonormality_error();
        if err < 1e-6 {
            log::info!("eigenvectors are orthonormal");
        } else {
            log::warn!("eigenvectors deviate from orthonormality by {err:.3e}");
        }
    }
    if options.print_data {
        log::info!("harmonic frequencies at {} {} {} (THz):", q[0], q[1], q[2]);
        for (i, f) in modes.frequencies.iter().enumerate() {
            log::info!("{:5}{:12.6}", i + 1, f.value());
        }
    }
    let mut arranged = modes.arranged();
    if options.normalize {
        normalize_rows(&mut arranged);
    }
    Ok((modes.frequencies, arranged))
}

/// a phonon calculation with `fc` in place of the force data attached to
/// `structure`, set up in the supercell `fc` was built in. without `fc`
/// this is [get_phonon] with forces
pub fn phonon_with_force_constants(
    structure: &mut Structure,
    fc: Option<&ForceConstants>,
    nac: bool,
) -> Result<Phonon, PhononError> {
    let Some(fc) = fc else {
        return get_phonon(structure, nac, true, None);
    };
    let mut phonon = get_phonon(structure, false, false, Some(fc.supercell()))?;
    phonon.set_force_constants(fc.clone())?;
    if nac {
        let born = structure.born().ok_or(PhononError::NoBornCharges)?;
        let cells = phonon.cells();
        let nac = Nac::new(born, &cells.primitive.cell, cells.ncells())?;
        phonon.set_nac(nac)?;
    }
    Ok(phonon)
}
