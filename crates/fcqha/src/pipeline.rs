//! the QHA extraction: force constants and thermal properties at several
//! volumes plus an energy–volume table give the force constants at the
//! equilibrium volume for a target temperature

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use phonon::{
    ForceConstants, PhononError,
    files::read_force_constants,
};
use qha::{
    ForceConstantInterpolator, Qha, QhaError, QuadraticSpline,
    ev::read_energy_volume,
    thermal::{ThermalTable, read_thermal_properties},
};
use serde::{Deserialize, Serialize};

use crate::InputParameters;

/// expand each glob pattern, sorting the matches of each pattern but keeping
/// the patterns in the order given
pub fn expand_patterns(patterns: &[String]) -> anyhow::Result<Vec<PathBuf>> {
    let mut ret = Vec::new();
    for pattern in patterns {
        let mut paths = glob::glob(pattern)
            .with_context(|| format!("bad file pattern `{pattern}`"))?
            .collect::<Result<Vec<_>, _>>()?;
        if paths.is_empty() {
            log::warn!("no files match `{pattern}`");
        }
        paths.sort();
        ret.extend(paths);
    }
    Ok(ret)
}

/// the equilibrium volume at temperature `t`, interpolated along the V(T)
/// curve of `qha`
pub fn target_volume(qha: &Qha, t: f64) -> Result<f64, QhaError> {
    let temps = qha.temperatures();
    let (Some(&min), Some(&max)) = (temps.first(), temps.last()) else {
        return Err(QhaError::TooFewPoints { need: 3, got: 0 });
    };
    if t < min || t > max {
        return Err(QhaError::OutOfRange { value: t, min, max });
    }
    let spline = QuadraticSpline::new(temps)?;
    spline.eval(&qha.volume_temperature(), t)
}

#[derive(Clone, Debug)]
pub struct QhaExtraction {
    /// one force constants file per volume
    pub fc_files: Vec<PathBuf>,
    /// one thermal_properties.yaml per volume
    pub tp_files: Vec<PathBuf>,
    pub ev_file: PathBuf,
    /// target temperature in K
    pub temperature: f64,
}

#[derive(Clone, Debug)]
pub struct QhaOutcome {
    pub qha: Qha,
    pub target_volume: f64,
    pub force_constants: ForceConstants,
}

/// the QHA curves written to qha.json
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QhaSummary {
    pub target_temperature: f64,
    pub target_volume: f64,
    pub volumes: Vec<f64>,
    pub electronic_energies: Vec<f64>,
    pub temperatures: Vec<f64>,
    pub volume_temperature: Vec<f64>,
    pub gibbs_temperature: Vec<f64>,
    pub bulk_modulus_temperature: Vec<f64>,
    pub thermal_expansion: Vec<f64>,
}

impl QhaOutcome {
    pub fn summary(&self, target_temperature: f64) -> QhaSummary {
        let qha = &self.qha;
        QhaSummary {
            target_temperature,
            target_volume: self.target_volume,
            volumes: qha.volumes().to_vec(),
            electronic_energies: qha.electronic_energies().to_vec(),
            temperatures: qha.temperatures().to_vec(),
            volume_temperature: qha.volume_temperature(),
            gibbs_temperature: qha.gibbs_temperature(),
            bulk_modulus_temperature: qha.bulk_modulus_temperature(),
            thermal_expansion: qha.thermal_expansion(),
        }
    }
}

fn permute<T: Clone>(v: &[T], order: &[usize]) -> Vec<T> {
    order.iter().map(|&i| v[i].clone()).collect()
}

impl QhaExtraction {
    pub fn run(&self, params: &InputParameters) -> anyhow::Result<QhaOutcome> {
        let ev = read_energy_volume(&self.ev_file)?;
        let nv = ev.volumes.len();
        if self.tp_files.len() != nv {
            bail!(
                "{} thermal properties files for {nv} volumes in {}",
                self.tp_files.len(),
                self.ev_file.display()
            );
        }
        if self.fc_files.len() != nv {
            bail!(
                "{} force constants files for {nv} volumes in {}",
                self.fc_files.len(),
                self.ev_file.display()
            );
        }
        let thermal = self
            .tp_files
            .iter()
            .map(read_thermal_properties)
            .collect::<Result<Vec<_>, _>>()?;

        // the files are given in the order of the energy–volume rows
        let mut order: Vec<usize> = (0..nv).collect();
        order.sort_by(|&a, &b| ev.volumes[a].total_cmp(&ev.volumes[b]));
        let volumes = permute(&ev.volumes, &order);
        let energies = permute(&ev.energies, &order);
        let table = ThermalTable::stack(&permute(&thermal, &order))?;
        let fc_files: Vec<&Path> =
            order.iter().map(|&i| self.fc_files[i].as_path()).collect();

        let qha = Qha::new(
            volumes.clone(),
            energies,
            table.temperatures,
            table.free_energy,
            table.entropy,
            table.heat_capacity,
            None,
        )?;
        let target_volume = target_volume(&qha, self.temperature)?;
        log::info!(
            "equilibrium volume at {} K: {target_volume:.6} Å³",
            self.temperature
        );

        let structure = params.structure()?;
        let supercell = params.supercell_phonon;
        let expected = structure.number_of_atoms()
            * supercell.map_or(1, |s| s.ncells());
        let mut fcs = Vec::with_capacity(nv);
        for path in fc_files {
            let fc = read_force_constants(path, supercell)?;
            if fc.natoms() != expected {
                return Err(PhononError::SupercellMismatch {
                    expected,
                    got: fc.natoms(),
                })
                .with_context(|| format!("in {}", path.display()));
            }
            fcs.push(fc);
        }
        let interp = ForceConstantInterpolator::new(&volumes, fcs)?;
        let force_constants = interp.at(target_volume)?;
        Ok(QhaOutcome {
            qha,
            target_volume,
            force_constants,
        })
    }
}
