use std::path::{Path, PathBuf};

use approx::assert_abs_diff_eq;
use crystal::{IMat3, SupercellMatrix};
use phonon::{Cmat, Complex, Thz, Vec3};
use tempfile::tempdir;

use crate::{
    InputParameters,
    modes::{ModesFile, QPointModes},
    pipeline::expand_patterns,
};

const INPUT: &str = "
STRUCTURE FILE OUTCAR
run/OUTCAR

structure file poscar
/abs/POSCAR

# comment lines are skipped
FORCE CONSTANTS
FORCE_CONSTANTS

PRIMITIVE MATRIX
0.0 0.5 0.5
0.5 0.0 0.5
0.5 0.5 0.0

SUPERCELL MATRIX PHONOPY
2 0 0
0 2 0
0 0 3

MESH PHONOPY
20 20 20

BANDS
0.0 0.0 0.0, 0.5 0.0 0.5
0.5 0.0 0.5, 0.5 0.25 0.75

MASSES
26.98 28.09

TEMPERATURE
300
";

#[test]
fn parse_input() {
    let got = InputParameters::parse(INPUT, Path::new("/data")).unwrap();
    assert_eq!(got.structure_outcar, Some(PathBuf::from("/data/run/OUTCAR")));
    assert_eq!(got.structure_poscar, Some(PathBuf::from("/abs/POSCAR")));
    assert_eq!(
        got.force_constants,
        Some(PathBuf::from("/data/FORCE_CONSTANTS"))
    );
    assert!(got.force_sets.is_none());
    assert!(got.born_charges.is_none());
    let p = got.primitive_matrix.unwrap();
    assert_abs_diff_eq!(p[(0, 1)], 0.5);
    assert_abs_diff_eq!(p[(0, 0)], 0.0);
    assert_eq!(
        got.supercell_phonon,
        Some(SupercellMatrix::diagonal(2, 2, 3).unwrap())
    );
    assert_eq!(got.mesh, Some([20, 20, 20]));
    assert_eq!(got.bands.len(), 2);
    assert_eq!(got.bands[1].1, Vec3::new(0.5, 0.25, 0.75));
    assert_eq!(got.masses, Some(vec![26.98, 28.09]));
}

#[test]
fn parse_input_errors() {
    let short = "SUPERCELL MATRIX PHONOPY\n2 0 0\n0 2 0\n";
    let err = InputParameters::parse(short, Path::new(".")).unwrap_err();
    assert!(format!("{err:#}").contains("needs 3 rows"));

    let singular = "SUPERCELL MATRIX PHONOPY\n2 0 0\n0 2 0\n0 0 0\n";
    assert!(InputParameters::parse(singular, Path::new(".")).is_err());

    let band = "BANDS\n0 0 0 0.5 0.5 0.5\n";
    let err = InputParameters::parse(band, Path::new(".")).unwrap_err();
    assert!(format!("{err:#}").contains("should be `q, q`"));

    let mesh = "MESH PHONOPY\n4 4\n";
    assert!(InputParameters::parse(mesh, Path::new(".")).is_err());
}

#[test]
fn structure_requires_file() {
    let params = InputParameters::default();
    let err = params.structure().unwrap_err();
    assert_eq!(err.to_string(), "no structure file given");
}

#[test]
fn structure_from_input() {
    let dir = tempdir().unwrap();
    std::fs::write(
        dir.path().join("POSCAR"),
        "cscl\n4.0\n1 0 0\n0 1 0\n0 0 1\nCs Cl\n1 1\nDirect\n\
         0 0 0\n0.5 0.5 0.5\n",
    )
    .unwrap();
    let input = "STRUCTURE FILE POSCAR\nPOSCAR\n\n\
                 SUPERCELL MATRIX PHONOPY\n2 0 0\n0 2 0\n0 0 2\n\n\
                 MASSES\n100.0 30.0\n";
    std::fs::write(dir.path().join("input"), input).unwrap();
    let params = InputParameters::load(dir.path().join("input")).unwrap();
    let structure = params.structure().unwrap();
    assert_eq!(structure.number_of_atoms(), 2);
    assert_eq!(structure.cell().masses(), &[100.0, 30.0]);
    assert_eq!(structure.supercell_phonon().unwrap().ncells(), 8);
    assert!(structure.force_constants().is_none());
}

#[test]
fn modes_file() {
    let vecs = Cmat::from_fn(3, 3, |i, j| {
        Complex::new((i * 3 + j) as f64, -(j as f64))
    });
    let freqs = vec![Thz(1.0), Thz(2.0), Thz(3.5)];
    let point = QPointModes::new(&Vec3::new(0.5, 0.0, 0.0), &freqs, &vecs);
    assert_eq!(point.eigenvectors[1][2], [5.0, -2.0]);
    let smat = SupercellMatrix::new(IMat3::new(0, 2, 2, 2, 0, 2, 2, 2, 0))
        .unwrap();
    let file = ModesFile::new(&smat, vec![point]);
    assert_eq!(file.supercell, [[0, 2, 2], [2, 0, 2], [2, 2, 0]]);

    let dir = tempdir().unwrap();
    let path = dir.path().join("modes.yaml");
    file.dump(&path).unwrap();
    let got = ModesFile::load(&path).unwrap();
    assert_eq!(got.supercell().unwrap(), smat);
    let (f, v) = got.bundles(&[Vec3::new(0.5, 0.0, 0.0)]).unwrap();
    assert_eq!(f, vec![freqs]);
    assert_eq!(v, vec![vecs]);
}

#[test]
fn modes_file_points() {
    let at = |q: [f64; 3], f: f64| {
        QPointModes::new(&Vec3::from(q), &[Thz(f); 3], &Cmat::identity(3, 3))
    };
    let smat = SupercellMatrix::diagonal(2, 1, 1).unwrap();
    let file = ModesFile::new(
        &smat,
        vec![at([0.5, 0.0, 0.0], 2.0), at([0.0, 0.0, 0.0], 1.0)],
    );

    // entries are matched by q, allowing for a reciprocal lattice vector
    let points = [Vec3::zeros(), Vec3::new(-0.5, 1.0, 0.0)];
    let (f, _) = file.bundles(&points).unwrap();
    assert_eq!(f, vec![vec![Thz(1.0); 3], vec![Thz(2.0); 3]]);

    let foreign = [Vec3::zeros(), Vec3::new(0.25, 0.0, 0.0)];
    let err = file.bundles(&foreign).unwrap_err();
    assert!(err.to_string().contains("no modes given"));

    assert!(file.bundles(&[Vec3::zeros()]).is_err());

    let twice =
        ModesFile::new(&smat, vec![at([0.0; 3], 1.0), at([1.0, 0.0, 0.0], 1.0)]);
    assert!(twice.bundles(&points).is_err());
}

#[test]
fn modes_file_shape() {
    let mut point = QPointModes::new(
        &Vec3::zeros(),
        &[Thz(1.0), Thz(2.0), Thz(3.0)],
        &Cmat::identity(3, 3),
    );
    point.eigenvectors[2].pop();
    assert!(point.eigenvectors().is_err());
}

#[test]
fn patterns_sorted_per_pattern() {
    let dir = tempdir().unwrap();
    for name in ["b2", "b1", "a3", "a1"] {
        std::fs::write(dir.path().join(name), "").unwrap();
    }
    let pat = |p: &str| dir.path().join(p).display().to_string();
    let got = expand_patterns(&[pat("b*"), pat("a*")]).unwrap();
    let names: Vec<_> = got
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, ["b1", "b2", "a1", "a3"]);

    assert!(expand_patterns(&[pat("c*")]).unwrap().is_empty());
    assert!(expand_patterns(&["[".to_owned()]).is_err());
}
