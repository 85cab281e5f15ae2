//! VASP POSCAR reader and writer

use std::{fs::read_to_string, io::Write, path::Path};

use crate::{Cell, CrystalError, Mat3, Vec3, element::clean_symbol};

fn parse_err(msg: impl Into<String>) -> CrystalError {
    CrystalError::Parse("POSCAR".to_owned(), msg.into())
}

fn floats(line: &str, n: usize) -> Result<Vec<f64>, CrystalError> {
    let v = line
        .split_whitespace()
        .take(n)
        .map(|s| s.parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| parse_err(format!("{e} in `{line}`")))?;
    if v.len() != n {
        return Err(parse_err(format!("expected {n} numbers in `{line}`")));
    }
    Ok(v)
}

pub fn read_poscar(path: impl AsRef<Path>) -> Result<Cell, CrystalError> {
    let path = path.as_ref();
    let contents = read_to_string(path)
        .map_err(|e| CrystalError::Io(path.display().to_string(), e))?;
    parse_poscar(&contents).map_err(|e| match e {
        CrystalError::Parse(_, msg) => {
            CrystalError::Parse(path.display().to_string(), msg)
        }
        e => e,
    })
}

/// parse VASP 4 or 5 POSCAR contents. VASP 4 files take their element symbols
/// from the comment line
pub fn parse_poscar(s: &str) -> Result<Cell, CrystalError> {
    let mut lines = s.lines();
    let mut next = || lines.next().ok_or_else(|| parse_err("unexpected EOF"));
    let comment = next()?;
    let scale = floats(next()?, 1)?[0];
    let mut rows = [Vec3::zeros(); 3];
    for row in &mut rows {
        let v = floats(next()?, 3)?;
        *row = Vec3::new(v[0], v[1], v[2]);
    }
    let mut lattice = Mat3::from_rows(&[
        rows[0].transpose(),
        rows[1].transpose(),
        rows[2].transpose(),
    ]);
    // a negative scale is the target volume
    let factor = if scale < 0.0 {
        (-scale / lattice.determinant().abs()).cbrt()
    } else {
        scale
    };
    lattice *= factor;

    let mut line = next()?;
    let names: Vec<String> = if line
        .split_whitespace()
        .next()
        .is_some_and(|w| w.parse::<usize>().is_err())
    {
        let names = line.split_whitespace().map(String::from).collect();
        line = next()?;
        names
    } else {
        comment.split_whitespace().map(String::from).collect()
    };
    let counts = line
        .split_whitespace()
        .map(|w| w.parse::<usize>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| parse_err(format!("bad atom counts `{line}`: {e}")))?;
    if names.len() < counts.len() {
        return Err(parse_err(format!(
            "{} element symbols for {} atom types",
            names.len(),
            counts.len()
        )));
    }

    let mut mode = next()?.trim();
    if mode.starts_with(['S', 's']) {
        mode = next()?.trim();
    }
    let cartesian = mode.starts_with(['C', 'c', 'K', 'k']);

    let natoms: usize = counts.iter().sum();
    let mut positions = Vec::with_capacity(natoms);
    for _ in 0..natoms {
        let v = floats(next()?, 3)?;
        positions.push(Vec3::new(v[0], v[1], v[2]));
    }
    let symbols: Vec<String> = names
        .iter()
        .zip(&counts)
        .flat_map(|(name, &n)| {
            std::iter::repeat_n(clean_symbol(name).to_owned(), n)
        })
        .collect();

    if cartesian {
        let inv = lattice
            .transpose()
            .try_inverse()
            .ok_or(CrystalError::SingularMatrix)?;
        for p in &mut positions {
            *p = inv * (*p * factor);
        }
    }
    Cell::new(lattice, positions, symbols)
}

/// write `cell` as a VASP 5 POSCAR in direct coordinates
pub fn write_poscar<W: Write>(
    w: &mut W,
    cell: &Cell,
    comment: &str,
) -> std::io::Result<()> {
    writeln!(w, "{comment}")?;
    writeln!(w, "   1.0")?;
    for row in cell.lattice().row_iter() {
        writeln!(w, "{:22.15}{:22.15}{:22.15}", row[0], row[1], row[2])?;
    }
    let mut groups: Vec<(&str, usize)> = Vec::new();
    for s in cell.symbols() {
        match groups.last_mut() {
            Some((last, n)) if *last == s.as_str() => *n += 1,
            _ => groups.push((s.as_str(), 1)),
        }
    }
    for (s, _) in &groups {
        write!(w, " {s:>4}")?;
    }
    writeln!(w)?;
    for (_, n) in &groups {
        write!(w, " {n:>4}")?;
    }
    writeln!(w)?;
    writeln!(w, "Direct")?;
    for p in cell.positions() {
        writeln!(w, "{:22.15}{:22.15}{:22.15}", p[0], p[1], p[2])?;
    }
    Ok(())
}
