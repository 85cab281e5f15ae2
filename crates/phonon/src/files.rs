//! the phonopy FORCE_CONSTANTS and FORCE_SETS text formats

use std::{
    fmt::Display,
    fs::{File, read_to_string},
    io::{BufWriter, Write},
    path::Path,
};

use crystal::SupercellMatrix;

use crate::{
    Displacement, ForceConstants, ForceSets, Mat3, PhononError, Vec3,
};

fn read(path: &Path) -> Result<String, PhononError> {
    read_to_string(path)
        .map_err(|e| PhononError::Io(path.display().to_string(), e))
}

fn create(path: &Path) -> Result<BufWriter<File>, PhononError> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|e| PhononError::Io(path.display().to_string(), e))
}

/// whitespace-separated tokens with a running count for error messages
struct Tokens<'a> {
    iter: std::str::SplitWhitespace<'a>,
    name: &'a str,
    count: usize,
}

impl<'a> Tokens<'a> {
    fn new(s: &'a str, name: &'a str) -> Self {
        Self {
            iter: s.split_whitespace(),
            name,
            count: 0,
        }
    }

    fn err(&self, msg: impl Display) -> PhononError {
        PhononError::Parse(
            self.name.to_owned(),
            format!("{msg} at token {}", self.count),
        )
    }

    fn next<T: std::str::FromStr>(&mut self) -> Result<T, PhononError>
    where
        T::Err: Display,
    {
        self.count += 1;
        let tok = self.iter.next().ok_or_else(|| self.err("unexpected EOF"))?;
        tok.parse::<T>().map_err(|e| self.err(format!("`{tok}`: {e}")))
    }

    fn vec3(&mut self) -> Result<Vec3, PhononError> {
        Ok(Vec3::new(self.next()?, self.next()?, self.next()?))
    }
}

/// parse the contents of a full FORCE_CONSTANTS file. the header holds the
/// atom count once or twice, then each block is introduced by its 1-based
/// atom pair
pub fn parse_force_constants(
    s: &str,
    name: &str,
    supercell: Option<SupercellMatrix>,
) -> Result<ForceConstants, PhononError> {
    let mut lines = s.lines().filter(|l| !l.trim().is_empty());
    let header = lines
        .next()
        .ok_or_else(|| PhononError::Parse(name.to_owned(), "empty".into()))?;
    let dims = header
        .split_whitespace()
        .map(|w| w.parse::<usize>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| PhononError::Parse(name.to_owned(), e.to_string()))?;
    let natoms = match dims.as_slice() {
        [n] => *n,
        [n, m] if n == m => *n,
        [n, m] => {
            return Err(PhononError::Parse(
                name.to_owned(),
                format!(
                    "compact force constants ({n} x {m}) are not supported"
                ),
            ));
        }
        _ => {
            return Err(PhononError::Parse(
                name.to_owned(),
                format!("bad header `{header}`"),
            ));
        }
    };
    let rest: Vec<&str> = lines.collect();
    let body = rest.join("\n");
    let mut toks = Tokens::new(&body, name);
    let mut blocks = vec![Mat3::zeros(); natoms * natoms];
    for _ in 0..natoms * natoms {
        let i: usize = toks.next()?;
        let j: usize = toks.next()?;
        if i == 0 || j == 0 || i > natoms || j > natoms {
            return Err(toks.err(format!("atom pair {i} {j} out of range")));
        }
        let mut block = Mat3::zeros();
        for a in 0..3 {
            for b in 0..3 {
                block[(a, b)] = toks.next()?;
            }
        }
        blocks[(i - 1) * natoms + (j - 1)] = block;
    }
    ForceConstants::new(natoms, blocks, supercell)
}

/// read a FORCE_CONSTANTS file. a missing `supercell` is defaulted to the
/// identity with a warning
pub fn read_force_constants(
    path: impl AsRef<Path>,
    supercell: Option<SupercellMatrix>,
) -> Result<ForceConstants, PhononError> {
    let path = path.as_ref();
    let contents = read(path)?;
    parse_force_constants(&contents, &path.display().to_string(), supercell)
}

impl Display for ForceConstants {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let n = self.natoms();
        writeln!(f, "{n:4} {n:4}")?;
        for i in 0..n {
            for j in 0..n {
                writeln!(f, "{} {}", i + 1, j + 1)?;
                let block = self.block(i, j);
                for a in 0..3 {
                    writeln!(
                        f,
                        "{:22.15}{:22.15}{:22.15}",
                        block[(a, 0)],
                        block[(a, 1)],
                        block[(a, 2)]
                    )?;
                }
            }
        }
        Ok(())
    }
}

pub fn write_force_constants(
    path: impl AsRef<Path>,
    fc: &ForceConstants,
) -> Result<(), PhononError> {
    let path = path.as_ref();
    let mut w = create(path)?;
    write!(w, "{fc}")
        .and_then(|_| w.flush())
        .map_err(|e| PhononError::Io(path.display().to_string(), e))
}

/// parse a type-1 FORCE_SETS file: the atom count, the number of
/// displacements, and then for each displacement the 1-based displaced atom,
/// its displacement, and the force on every atom
pub fn parse_force_sets(
    s: &str,
    name: &str,
    supercell: Option<SupercellMatrix>,
) -> Result<ForceSets, PhononError> {
    let first = s.lines().find(|l| !l.trim().is_empty()).unwrap_or_default();
    if first.split_whitespace().count() != 1 {
        return Err(PhononError::Parse(
            name.to_owned(),
            "only type-1 FORCE_SETS files are supported".into(),
        ));
    }
    let mut toks = Tokens::new(s, name);
    let natoms: usize = toks.next()?;
    let ndisp: usize = toks.next()?;
    let mut displacements = Vec::with_capacity(ndisp);
    for _ in 0..ndisp {
        let atom: usize = toks.next()?;
        if atom == 0 || atom > natoms {
            return Err(toks.err(format!("displaced atom {atom} out of range")));
        }
        let displacement = toks.vec3()?;
        let forces = (0..natoms)
            .map(|_| toks.vec3())
            .collect::<Result<Vec<_>, _>>()?;
        displacements.push(Displacement {
            atom: atom - 1,
            displacement,
            forces,
        });
    }
    ForceSets::new(natoms, displacements, supercell)
}

pub fn read_force_sets(
    path: impl AsRef<Path>,
    supercell: Option<SupercellMatrix>,
) -> Result<ForceSets, PhononError> {
    let path = path.as_ref();
    let contents = read(path)?;
    parse_force_sets(&contents, &path.display().to_string(), supercell)
}

impl Display for ForceSets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.natoms())?;
        writeln!(f, "{}", self.displacements().len())?;
        writeln!(f)?;
        for d in self.displacements() {
            writeln!(f, "{}", d.atom + 1)?;
            let u = d.displacement;
            writeln!(f, "{:20.16} {:20.16} {:20.16}", u[0], u[1], u[2])?;
            for force in &d.forces {
                writeln!(
                    f,
                    "{:15.10} {:15.10} {:15.10}",
                    force[0], force[1], force[2]
                )?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

pub fn write_force_sets(
    path: impl AsRef<Path>,
    sets: &ForceSets,
) -> Result<(), PhononError> {
    let path = path.as_ref();
    let mut w = create(path)?;
    write!(w, "{sets}")
        .and_then(|_| w.flush())
        .map_err(|e| PhononError::Io(path.display().to_string(), e))
}
