//! two-column energy–volume tables

use std::{fs::read_to_string, path::Path};

use crate::QhaError;

/// volumes in Å³ and electronic energies in eV
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EnergyVolume {
    pub volumes: Vec<f64>,
    pub energies: Vec<f64>,
}

/// parse whitespace-separated `volume energy` rows. blank lines and lines
/// starting with `#` are skipped, as are any columns after the second
pub fn parse_energy_volume(s: &str, name: &str) -> Result<EnergyVolume, QhaError> {
    let mut ret = EnergyVolume::default();
    for (i, line) in s.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let vals = line
            .split_whitespace()
            .take(2)
            .map(|w| w.parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| {
                QhaError::Parse(name.to_owned(), format!("line {}: {e}", i + 1))
            })?;
        let [v, e] = vals[..] else {
            return Err(QhaError::Parse(
                name.to_owned(),
                format!("line {}: expected two columns", i + 1),
            ));
        };
        ret.volumes.push(v);
        ret.energies.push(e);
    }
    Ok(ret)
}

pub fn read_energy_volume(
    path: impl AsRef<Path>,
) -> Result<EnergyVolume, QhaError> {
    let path = path.as_ref();
    let name = path.display().to_string();
    let s = read_to_string(path).map_err(|e| QhaError::Io(name.clone(), e))?;
    parse_energy_volume(&s, &name)
}
