//! phonopy's thermal_properties.yaml and stacking of per-volume tables

use std::{
    fs::{File, read_to_string},
    io::{BufWriter, Write},
    path::Path,
};

use phonon::ThermalProperty;
use serde::{Deserialize, Serialize};

use crate::QhaError;

/// the parts of a thermal_properties.yaml file that are used. other keys
/// are ignored
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ThermalPropertiesFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub natom: Option<usize>,
    pub thermal_properties: Vec<ThermalProperty>,
}

pub fn parse_thermal_properties(
    s: &str,
    name: &str,
) -> Result<Vec<ThermalProperty>, QhaError> {
    let file: ThermalPropertiesFile = serde_yaml::from_str(s)
        .map_err(|e| QhaError::Yaml(name.to_owned(), e))?;
    Ok(file.thermal_properties)
}

pub fn read_thermal_properties(
    path: impl AsRef<Path>,
) -> Result<Vec<ThermalProperty>, QhaError> {
    let path = path.as_ref();
    let name = path.display().to_string();
    let s = read_to_string(path).map_err(|e| QhaError::Io(name.clone(), e))?;
    parse_thermal_properties(&s, &name)
}

pub fn write_thermal_properties(
    path: impl AsRef<Path>,
    natom: usize,
    props: &[ThermalProperty],
) -> Result<(), QhaError> {
    let path = path.as_ref();
    let name = path.display().to_string();
    let file = ThermalPropertiesFile {
        natom: Some(natom),
        thermal_properties: props.to_vec(),
    };
    let s = serde_yaml::to_string(&file)
        .map_err(|e| QhaError::Yaml(name.clone(), e))?;
    let mut w = File::create(path)
        .map(BufWriter::new)
        .map_err(|e| QhaError::Io(name.clone(), e))?;
    w.write_all(s.as_bytes())
        .and_then(|_| w.flush())
        .map_err(|e| QhaError::Io(name, e))
}

/// thermal properties of several volumes on a shared temperature grid,
/// arranged as `(temperature × volume)` tables
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ThermalTable {
    pub temperatures: Vec<f64>,
    pub free_energy: Vec<Vec<f64>>,
    pub entropy: Vec<Vec<f64>>,
    pub heat_capacity: Vec<Vec<f64>>,
}

impl ThermalTable {
    /// stack one set of records per volume. every set must cover the same
    /// temperatures
    pub fn stack(per_volume: &[Vec<ThermalProperty>]) -> Result<Self, QhaError> {
        let Some(first) = per_volume.first() else {
            return Ok(Self::default());
        };
        let temperatures: Vec<f64> =
            first.iter().map(|p| p.temperature).collect();
        for (i, set) in per_volume.iter().enumerate() {
            let same = set.len() == temperatures.len()
                && set
                    .iter()
                    .zip(&temperatures)
                    .all(|(p, t)| (p.temperature - t).abs() < 1e-8);
            if !same {
                return Err(QhaError::Mismatch(format!(
                    "thermal properties {i} do not share the temperatures of \
                     the first set"
                )));
            }
        }
        let column = |f: fn(&ThermalProperty) -> f64| -> Vec<Vec<f64>> {
            (0..temperatures.len())
                .map(|t| per_volume.iter().map(|set| f(&set[t])).collect())
                .collect()
        };
        Ok(Self {
            free_energy: column(|p| p.free_energy),
            entropy: column(|p| p.entropy),
            heat_capacity: column(|p| p.heat_capacity),
            temperatures,
        })
    }
}
