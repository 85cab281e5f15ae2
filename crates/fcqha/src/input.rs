//! the keyword input file shared by the command-line tools. each block is a
//! heading line followed by its values, and blocks are separated by blank
//! lines:
//!
//! ```text
//! STRUCTURE FILE POSCAR
//! POSCAR
//!
//! FORCE CONSTANTS
//! FORCE_CONSTANTS
//!
//! SUPERCELL MATRIX PHONOPY
//! 2 0 0
//! 0 2 0
//! 0 0 2
//! ```

use std::{
    fs::read_to_string,
    path::{Path, PathBuf},
};

use anyhow::{Context, bail};
use crystal::{
    Cell, IMat3, Mat3, SupercellMatrix, Vec3, outcar::read_outcar,
    poscar::read_poscar,
};
use phonon::{
    BornCharges, Structure,
    files::{read_force_constants, read_force_sets},
};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct InputParameters {
    pub structure_poscar: Option<PathBuf>,
    pub structure_outcar: Option<PathBuf>,
    pub force_sets: Option<PathBuf>,
    pub force_constants: Option<PathBuf>,
    pub born_charges: Option<PathBuf>,
    pub primitive_matrix: Option<Mat3>,
    /// the supercell the force data was computed in
    pub supercell_phonon: Option<SupercellMatrix>,
    pub mesh: Option<[usize; 3]>,
    /// band path segments in the primitive reciprocal basis
    pub bands: Vec<(Vec3, Vec3)>,
    pub masses: Option<Vec<f64>>,
}

fn numbers<T: std::str::FromStr>(line: &str) -> anyhow::Result<Vec<T>>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    line.split_whitespace()
        .map(|w| w.parse::<T>().with_context(|| format!("bad number `{w}`")))
        .collect()
}

fn exactly<T: Copy, const N: usize>(
    vals: Vec<T>,
    what: &str,
) -> anyhow::Result<[T; N]> {
    let got = vals.len();
    vals.try_into()
        .map_err(|_| anyhow::anyhow!("{what} needs {N} values, got {got}"))
}

fn path(values: &[&str], dir: &Path, heading: &str) -> anyhow::Result<PathBuf> {
    let Some(name) = values.first() else {
        bail!("{heading} needs a file name");
    };
    Ok(dir.join(name.trim()))
}

fn rows<T>(values: &[&str], heading: &str) -> anyhow::Result<[[T; 3]; 3]>
where
    T: Copy + std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    if values.len() < 3 {
        bail!("{heading} needs 3 rows, got {}", values.len());
    }
    let mut ret = Vec::with_capacity(3);
    for line in &values[..3] {
        ret.push(exactly::<T, 3>(numbers(line)?, heading)?);
    }
    exactly(ret, heading)
}

impl InputParameters {
    /// parse an input file. relative paths are taken relative to `dir`
    pub fn parse(s: &str, dir: &Path) -> anyhow::Result<Self> {
        let mut ret = Self::default();
        let mut blocks: Vec<Vec<&str>> = Vec::new();
        let mut cur: Vec<&str> = Vec::new();
        for line in s.lines() {
            let line = line.trim();
            if line.starts_with('#') {
                continue;
            }
            if line.is_empty() {
                if !cur.is_empty() {
                    blocks.push(std::mem::take(&mut cur));
                }
                continue;
            }
            cur.push(line);
        }
        if !cur.is_empty() {
            blocks.push(cur);
        }

        for block in blocks {
            let (heading, values) = (block[0].to_uppercase(), &block[1..]);
            ret.set(&heading, values, dir)
                .with_context(|| format!("in block `{heading}`"))?;
        }
        Ok(ret)
    }

    fn set(
        &mut self,
        heading: &str,
        values: &[&str],
        dir: &Path,
    ) -> anyhow::Result<()> {
        match heading {
            "STRUCTURE FILE POSCAR" => {
                self.structure_poscar = Some(path(values, dir, heading)?)
            }
            "STRUCTURE FILE OUTCAR" => {
                self.structure_outcar = Some(path(values, dir, heading)?)
            }
            "FORCE SETS" => self.force_sets = Some(path(values, dir, heading)?),
            "FORCE CONSTANTS" => {
                self.force_constants = Some(path(values, dir, heading)?)
            }
            "BORN CHARGES" => {
                self.born_charges = Some(path(values, dir, heading)?)
            }
            "PRIMITIVE MATRIX" => {
                let r: [[f64; 3]; 3] = rows(values, heading)?;
                self.primitive_matrix =
                    Some(Mat3::from_fn(|i, j| r[i][j]));
            }
            "SUPERCELL MATRIX PHONOPY" => {
                let r: [[i32; 3]; 3] = rows(values, heading)?;
                self.supercell_phonon =
                    Some(SupercellMatrix::new(IMat3::from_fn(|i, j| r[i][j]))?);
            }
            "MESH PHONOPY" => {
                let Some(line) = values.first() else {
                    bail!("{heading} needs a line of 3 integers");
                };
                self.mesh = Some(exactly(numbers(line)?, heading)?);
            }
            "BANDS" => {
                for line in values {
                    let Some((a, b)) = line.split_once(',') else {
                        bail!("band segment `{line}` should be `q, q`");
                    };
                    let a: [f64; 3] = exactly(numbers(a)?, heading)?;
                    let b: [f64; 3] = exactly(numbers(b)?, heading)?;
                    self.bands.push((Vec3::from(a), Vec3::from(b)));
                }
            }
            "MASSES" => {
                let Some(line) = values.first() else {
                    bail!("{heading} needs a line of masses");
                };
                self.masses = Some(numbers(line)?);
            }
            _ => log::debug!("ignoring unknown input block `{heading}`"),
        }
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let s = read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::parse(&s, dir)
            .with_context(|| format!("failed to parse {}", path.display()))
    }

    /// read the crystal structure, with OUTCAR taking precedence over POSCAR
    pub fn cell(&self) -> anyhow::Result<Cell> {
        let mut cell = if let Some(outcar) = &self.structure_outcar {
            read_outcar(outcar)
                .with_context(|| format!("reading {}", outcar.display()))?
        } else if let Some(poscar) = &self.structure_poscar {
            read_poscar(poscar)
                .with_context(|| format!("reading {}", poscar.display()))?
        } else {
            bail!("no structure file given");
        };
        if let Some(masses) = &self.masses {
            cell.set_masses(masses.clone())?;
        }
        Ok(cell)
    }

    /// build the structure along with any Born charges and force data named
    /// in the input. force data is read in the phonon supercell
    pub fn structure(&self) -> anyhow::Result<Structure> {
        let mut structure = Structure::new(self.cell()?);
        if let Some(pmat) = self.primitive_matrix {
            structure.set_primitive_matrix(pmat);
        }
        if let Some(smat) = self.supercell_phonon {
            structure.set_supercell_phonon(smat);
        }
        if let Some(born) = &self.born_charges {
            structure.set_born(BornCharges::read(born)?);
        }
        if let Some(fc) = &self.force_constants {
            structure
                .set_force_constants(read_force_constants(fc, self.supercell_phonon)?);
        }
        if let Some(sets) = &self.force_sets {
            structure.set_force_sets(read_force_sets(sets, self.supercell_phonon)?);
        }
        Ok(structure)
    }
}
