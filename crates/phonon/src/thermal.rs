//! harmonic thermodynamic functions from mesh frequencies

use serde::{Deserialize, Serialize};

use crate::{
    Mesh,
    units::{EV_TO_KJMOL, KB, THZ_TO_EV},
};

/// modes at or below this frequency in THz do not contribute
pub const CUTOFF_FREQUENCY: f64 = 1e-4;

/// thermodynamic functions at one temperature. the free energy is in kJ/mol,
/// the entropy and heat capacity in J/K/mol
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ThermalProperty {
    pub temperature: f64,
    pub free_energy: f64,
    pub entropy: f64,
    pub heat_capacity: f64,
}

impl Mesh {
    /// thermal properties at temperature `t` in K, per primitive cell times
    /// `scale`
    pub fn thermal_properties(&self, t: f64, scale: f64) -> ThermalProperty {
        let kt = KB * t;
        let (mut free, mut entropy, mut cv) = (0.0, 0.0, 0.0);
        for f in self.frequencies().filter(|&f| f > CUTOFF_FREQUENCY) {
            let e = f * THZ_TO_EV;
            free += e / 2.0;
            if t <= 0.0 {
                continue;
            }
            let x = e / kt;
            let ex = (-x).exp();
            free += kt * (1.0 - ex).ln();
            entropy += -KB * (1.0 - ex).ln() + e / t * ex / (1.0 - ex);
            cv += KB * x * x * ex / ((1.0 - ex) * (1.0 - ex));
        }
        let norm = scale * EV_TO_KJMOL / self.len() as f64;
        ThermalProperty {
            temperature: t,
            free_energy: free * norm,
            entropy: entropy * norm * 1000.0,
            heat_capacity: cv * norm * 1000.0,
        }
    }

    /// thermal properties from `t_min` to `t_max` inclusive in steps of
    /// `t_step`
    pub fn thermal_range(
        &self,
        t_min: f64,
        t_max: f64,
        t_step: f64,
        scale: f64,
    ) -> Vec<ThermalProperty> {
        let step = if t_step > 0.0 { t_step } else { 1.0 };
        let n = ((t_max - t_min) / step + 1e-8).floor().max(0.0) as usize;
        (0..=n)
            .map(|i| self.thermal_properties(t_min + i as f64 * step, scale))
            .collect()
    }
}
