use phonon::units::{EV_A3_TO_GPA, EV_TO_KJMOL};
use serde::{Deserialize, Serialize};

use crate::{QhaError, Vinet, eos::fit_vinet};

/// the pressure derivative of the bulk modulus used when there are too few
/// volumes to fit it
pub const DEFAULT_BP: f64 = 4.0;

/// the quasi-harmonic free-energy surface: electronic energies plus phonon
/// free energies on a common temperature grid, fitted at each temperature
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Qha {
    volumes: Vec<f64>,
    electronic_energies: Vec<f64>,
    temperatures: Vec<f64>,
    /// phonon free energy in kJ/mol, one row per temperature
    free_energy: Vec<Vec<f64>>,
    /// J/K/mol, one row per temperature
    entropy: Vec<Vec<f64>>,
    /// J/K/mol, one row per temperature
    heat_capacity: Vec<Vec<f64>>,
    fits: Vec<Vinet>,
    max_t_index: usize,
}

fn check_rows(
    name: &str,
    rows: &[Vec<f64>],
    nt: usize,
    nv: usize,
) -> Result<(), QhaError> {
    if rows.len() != nt || rows.iter().any(|r| r.len() != nv) {
        return Err(QhaError::Mismatch(format!(
            "{name} must have {nt} temperatures × {nv} volumes"
        )));
    }
    Ok(())
}

impl Qha {
    /// fit the free-energy surface. the `(temperature × volume)` tables must
    /// share the temperature grid, and `volumes` must be sorted. only
    /// temperatures up to `t_max` (by default the last one) are fitted
    pub fn new(
        volumes: Vec<f64>,
        electronic_energies: Vec<f64>,
        temperatures: Vec<f64>,
        free_energy: Vec<Vec<f64>>,
        entropy: Vec<Vec<f64>>,
        heat_capacity: Vec<Vec<f64>>,
        t_max: Option<f64>,
    ) -> Result<Self, QhaError> {
        let nv = volumes.len();
        let nt = temperatures.len();
        if electronic_energies.len() != nv {
            return Err(QhaError::Mismatch(format!(
                "{} electronic energies for {nv} volumes",
                electronic_energies.len()
            )));
        }
        if nv < 3 {
            return Err(QhaError::TooFewPoints { need: 3, got: nv });
        }
        if nt < 3 {
            return Err(QhaError::TooFewPoints { need: 3, got: nt });
        }
        check_rows("free energies", &free_energy, nt, nv)?;
        check_rows("entropies", &entropy, nt, nv)?;
        check_rows("heat capacities", &heat_capacity, nt, nv)?;

        let t_max = t_max.unwrap_or(temperatures[nt - 1]);
        let count = temperatures.iter().filter(|&&t| t <= t_max + 1e-5).count();
        let mut max_t_index = count.min(nt - 2);
        let fixed_bp = if nv == 3 {
            log::info!("only three volumes, fixing B0' at {DEFAULT_BP}");
            Some(DEFAULT_BP)
        } else {
            None
        };
        let mut fits = Vec::with_capacity(max_t_index + 1);
        for (i, row) in free_energy.iter().enumerate().take(max_t_index + 1) {
            let energies: Vec<f64> = electronic_energies
                .iter()
                .zip(row)
                .map(|(e, f)| e + f / EV_TO_KJMOL)
                .collect();
            match fit_vinet(&volumes, &energies, fixed_bp) {
                Ok(fit) => fits.push(fit),
                Err(e) => {
                    log::warn!(
                        "fitting failed at {} K, truncating temperatures: {e}",
                        temperatures[i]
                    );
                    max_t_index = max_t_index.min(i);
                    break;
                }
            }
        }
        if max_t_index == 0 {
            return Err(QhaError::Fit(
                "no temperature could be fitted".to_owned(),
            ));
        }
        Ok(Self {
            volumes,
            electronic_energies,
            temperatures,
            free_energy,
            entropy,
            heat_capacity,
            fits,
            max_t_index,
        })
    }

    /// the number of temperatures with usable results
    pub fn max_t_index(&self) -> usize {
        self.max_t_index
    }

    pub fn volumes(&self) -> &[f64] {
        &self.volumes
    }

    pub fn electronic_energies(&self) -> &[f64] {
        &self.electronic_energies
    }

    pub fn temperatures(&self) -> &[f64] {
        &self.temperatures[..self.max_t_index]
    }

    /// the fitted equation of state at each temperature
    pub fn fits(&self) -> &[Vinet] {
        &self.fits[..self.max_t_index]
    }

    /// equilibrium volume in Å³ at each temperature
    pub fn volume_temperature(&self) -> Vec<f64> {
        self.fits().iter().map(|f| f.v0).collect()
    }

    /// Gibbs free energy at zero pressure in eV
    pub fn gibbs_temperature(&self) -> Vec<f64> {
        self.fits().iter().map(|f| f.e0).collect()
    }

    /// isothermal bulk modulus in GPa
    pub fn bulk_modulus_temperature(&self) -> Vec<f64> {
        self.fits().iter().map(|f| f.b0 * EV_A3_TO_GPA).collect()
    }

    /// volumetric thermal expansion coefficient in 1/K from central
    /// differences of the equilibrium volume
    pub fn thermal_expansion(&self) -> Vec<f64> {
        let n = self.max_t_index;
        let v: Vec<f64> = self.fits.iter().map(|f| f.v0).collect();
        let t = &self.temperatures;
        (0..n)
            .map(|i| {
                let lo = i.saturating_sub(1);
                let hi = (i + 1).min(v.len() - 1);
                (v[hi] - v[lo]) / (t[hi] - t[lo]) / v[i]
            })
            .collect()
    }

    /// the free energy in eV at each volume for temperature index `i`
    pub fn helmholtz_volume(&self, i: usize) -> Vec<f64> {
        self.electronic_energies
            .iter()
            .zip(&self.free_energy[i])
            .map(|(e, f)| e + f / EV_TO_KJMOL)
            .collect()
    }

    /// phonon entropy in J/K/mol at each volume for temperature index `i`
    pub fn entropy(&self, i: usize) -> &[f64] {
        &self.entropy[i]
    }

    /// phonon heat capacity in J/K/mol at each volume for temperature index
    /// `i`
    pub fn heat_capacity(&self, i: usize) -> &[f64] {
        &self.heat_capacity[i]
    }
}
