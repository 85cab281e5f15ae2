//! extract the final structure from a VASP OUTCAR

use std::{fs::read_to_string, path::Path, sync::OnceLock};

use regex::Regex;

use crate::{Cell, CrystalError, Mat3, Vec3, element::clean_symbol};

static OUTCAR_RE: OnceLock<[Regex; 4]> = OnceLock::new();

fn parse_err(msg: impl Into<String>) -> CrystalError {
    CrystalError::Parse("OUTCAR".to_owned(), msg.into())
}

fn row(line: &str) -> Result<Vec3, CrystalError> {
    let v = line
        .split_whitespace()
        .take(3)
        .map(|s| s.parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| parse_err(format!("{e} in `{line}`")))?;
    if v.len() < 3 {
        return Err(parse_err(format!("short line `{line}`")));
    }
    Ok(Vec3::new(v[0], v[1], v[2]))
}

pub fn read_outcar(path: impl AsRef<Path>) -> Result<Cell, CrystalError> {
    let path = path.as_ref();
    let contents = read_to_string(path)
        .map_err(|e| CrystalError::Io(path.display().to_string(), e))?;
    parse_outcar(&contents)
}

/// build a [Cell] from the last lattice and POSITION blocks of an OUTCAR
pub fn parse_outcar(s: &str) -> Result<Cell, CrystalError> {
    let [ions, titel, lattice_re, position] = OUTCAR_RE.get_or_init(|| {
        [
            Regex::new(r"(?m)ions per type =(.*)$").unwrap(),
            Regex::new(r"(?m)^\s*TITEL\s*=\s*\S+\s+(\S+)").unwrap(),
            Regex::new(r"direct lattice vectors").unwrap(),
            Regex::new(r"(?m)^ POSITION").unwrap(),
        ]
    });

    let counts = ions
        .captures(s)
        .ok_or_else(|| parse_err("missing `ions per type`"))?[1]
        .split_whitespace()
        .map(|w| w.parse::<usize>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| parse_err(e.to_string()))?;
    let names: Vec<&str> = titel
        .captures_iter(s)
        .filter_map(|c| c.get(1))
        .map(|m| clean_symbol(m.as_str()))
        .collect();
    if names.len() != counts.len() {
        return Err(parse_err(format!(
            "{} TITEL lines for {} ion types",
            names.len(),
            counts.len()
        )));
    }

    let start = lattice_re
        .find_iter(s)
        .last()
        .ok_or_else(|| parse_err("missing `direct lattice vectors`"))?
        .start();
    let mut rows = s[start..].lines().skip(1).take(3).map(row);
    let mut next_row =
        || rows.next().unwrap_or_else(|| Err(parse_err("truncated lattice")));
    let lattice = Mat3::from_rows(&[
        next_row()?.transpose(),
        next_row()?.transpose(),
        next_row()?.transpose(),
    ]);

    let natoms: usize = counts.iter().sum();
    let start = position
        .find_iter(s)
        .last()
        .ok_or_else(|| parse_err("missing POSITION block"))?
        .start();
    let cart = s[start..]
        .lines()
        .skip(2)
        .take_while(|l| !l.trim_start().starts_with("----"))
        .map(row)
        .collect::<Result<Vec<_>, _>>()?;
    if cart.len() != natoms {
        return Err(CrystalError::AtomCount {
            expected: natoms,
            got: cart.len(),
        });
    }
    let inv = lattice
        .transpose()
        .try_inverse()
        .ok_or(CrystalError::SingularMatrix)?;
    let positions = cart.iter().map(|x| inv * x).collect();
    let symbols = names
        .iter()
        .zip(&counts)
        .flat_map(|(name, &n)| std::iter::repeat_n(name.to_string(), n))
        .collect();
    Cell::new(lattice, positions, symbols)
}
