use approx::{assert_abs_diff_eq, assert_relative_eq};
use crystal::{Cell, SupercellMatrix};
use test_case::test_case;

use crate::{
    cells::equivalent_q_points, nac::Nac, sets::produce_force_constants,
    symmetrize::symmetrize_force_constants, *,
};


fn structure(lattice: Mat3, positions: &[[f64; 3]], symbols: &[&str]) -> Structure {
    Structure::new(
        Cell::new(
            lattice,
            positions.iter().map(|&p| Vec3::from(p)).collect(),
            symbols.iter().map(|s| s.to_string()).collect(),
        )
        .unwrap(),
    )
}

fn simple_cubic() -> Structure {
    structure(Mat3::identity() * 3.0, &[[0.0; 3]], &["Al"])
}

fn cscl() -> Structure {
    structure(
        Mat3::identity() * 4.0,
        &[[0.0, 0.0, 0.0], [0.5, 0.5, 0.5]],
        &["Cs", "Cl"],
    )
}

/// conventional fcc copper reduced to its one-atom primitive cell
fn fcc() -> Structure {
    let mut s = structure(
        Mat3::identity() * 3.6,
        &[
            [0.0, 0.0, 0.0],
            [0.0, 0.5, 0.5],
            [0.5, 0.0, 0.5],
            [0.5, 0.5, 0.0],
        ],
        &["Cu"; 4],
    );
    s.set_primitive_matrix(Mat3::new(0.0, 0.5, 0.5, 0.5, 0.0, 0.5, 0.5, 0.5, 0.0));
    s
}

fn diag(n: i32) -> SupercellMatrix {
    SupercellMatrix::diagonal(n, n, n).unwrap()
}

fn cells(s: &Structure, smat: &SupercellMatrix) -> PhononCells {
    PhononCells::new(s.cell(), s.primitive_matrix(), smat).unwrap()
}

/// force constants of central springs with stiffness `k` in eV/Å² between
/// every pair of atoms closer than `cutoff`, periodic in the supercell
fn springs(cells: &PhononCells, k: f64, cutoff: f64) -> ForceConstants {
    let sc = &cells.supercell.cell;
    let pos = sc.positions();
    let n = sc.len();
    let mut pair = vec![Mat3::zeros(); n * n];
    for i in 0..n {
        for j in 0..n {
            if i == j {
                continue;
            }
            let d = pos[j] - pos[i];
            let d = d - d.map(f64::round);
            for x in -1..=1 {
                for y in -1..=1 {
                    for z in -1..=1 {
                        let v = d + Vec3::new(x as f64, y as f64, z as f64);
                        let r = sc.to_cart(&v);
                        let len = r.norm();
                        if len < cutoff {
                            let u = r / len;
                            pair[i * n + j] += u * u.transpose() * k;
                        }
                    }
                }
            }
        }
    }
    ForceConstants::from_fn(n, cells.supercell.matrix, |i, j| {
        if i == j {
            (0..n).map(|l| pair[i * n + l]).sum()
        } else {
            -pair[i * n + j]
        }
    })
}

/// the same force constants with a small deterministic perturbation that
/// breaks the crystal symmetry
fn perturbed(fc: &ForceConstants) -> ForceConstants {
    let n = fc.natoms();
    ForceConstants::from_fn(n, fc.supercell(), |i, j| {
        fc.block(i, j)
            + Mat3::from_fn(|a, b| {
                0.01 * ((7 * i + 3 * j + 5 * a + b) as f64).sin()
            })
    })
}

fn displaced(fc: &ForceConstants, atom: usize, u: Vec3) -> Displacement {
    Displacement {
        atom,
        displacement: u,
        forces: (0..fc.natoms())
            .map(|j| -fc.block(atom, j).transpose() * u)
            .collect(),
    }
}

#[test_case(simple_cubic(), 2, 3.1 ; "simple cubic")]
#[test_case(cscl(), 2, 4.1 ; "cscl")]
#[test_case(fcc(), 2, 2.6 ; "fcc primitive")]
fn round_trip(mut structure: Structure, n: i32, cutoff: f64) {
    let smat = diag(n);
    let want = springs(&cells(&structure, &smat), 1.0, cutoff);
    structure.set_force_constants(want.clone());
    let phonon = get_phonon(&mut structure, false, true, Some(smat)).unwrap();
    let points = commensurate_points(&structure, &smat).unwrap();
    let (freqs, vecs): (Vec<_>, Vec<_>) = points
        .iter()
        .map(|q| {
            let modes = phonon.modes(q).unwrap();
            let arranged = modes.arranged();
            (modes.frequencies, arranged)
        })
        .unzip();
    let got =
        renormalized_force_constants(&freqs, &vecs, &structure, &smat, false)
            .unwrap();
    let natoms = structure.number_of_atoms() * smat.ncells();
    assert_eq!(got.shape(), (natoms, natoms, 3, 3));
    assert_eq!(got.supercell(), smat);
    assert!(got.max_abs_diff(&want) / want.max_abs() < 1e-6);
}

#[test]
fn reconstruct_shape_mismatch() {
    let structure = simple_cubic();
    let smat = diag(2);
    let freqs = vec![vec![Thz(1.0); 3]; 7];
    let vecs = vec![Cmat::identity(3, 3); 7];
    assert!(matches!(
        renormalized_force_constants(&freqs, &vecs, &structure, &smat, false),
        Err(PhononError::ShapeMismatch(_))
    ));
    let freqs = vec![vec![Thz(1.0); 2]; 8];
    let vecs = vec![Cmat::identity(3, 3); 8];
    assert!(matches!(
        renormalized_force_constants(&freqs, &vecs, &structure, &smat, false),
        Err(PhononError::ShapeMismatch(_))
    ));
}

#[test]
fn reconstruct_symmetrized() {
    let mut structure = cscl();
    let smat = diag(2);
    let want = springs(&cells(&structure, &smat), 0.5, 4.1);
    structure.set_force_constants(want.clone());
    let phonon = get_phonon(&mut structure, false, true, None).unwrap();
    let (freqs, vecs): (Vec<_>, Vec<_>) = phonon
        .commensurate_points()
        .unwrap()
        .iter()
        .map(|q| {
            let m = phonon.modes(q).unwrap();
            let arranged = m.arranged();
            (m.frequencies, arranged)
        })
        .unzip();
    let got =
        renormalized_force_constants(&freqs, &vecs, &structure, &smat, true)
            .unwrap();
    assert!(got.max_abs_diff(&want) < 1e-8);
}

#[test]
fn commensurate_count() {
    let structure = fcc();
    let points = commensurate_points(&structure, &diag(2)).unwrap();
    assert_eq!(points.len(), 32);
    assert_eq!(points[0], Vec3::zeros());
    for q in &points {
        assert!(q.iter().all(|&x| (0.0..1.0).contains(&x)));
    }
    let mut doubled = simple_cubic();
    doubled.set_primitive_matrix(Mat3::from_diagonal(&Vec3::new(1.0, 1.0, 2.0)));
    assert!(matches!(
        commensurate_points(&doubled, &SupercellMatrix::identity()),
        Err(PhononError::NotCommensurate)
    ));
}

#[test]
fn commensurate_simple_cubic() {
    let points = commensurate_points(&simple_cubic(), &diag(2)).unwrap();
    let got: Vec<String> = points
        .iter()
        .map(|q| format!("{:.2} {:.2} {:.2}", q[0], q[1], q[2]))
        .collect();
    insta::assert_snapshot!(got.join("\n"), @r"
    0.00 0.00 0.00
    0.50 0.00 0.00
    0.00 0.50 0.00
    0.50 0.50 0.00
    0.00 0.00 0.50
    0.50 0.00 0.50
    0.00 0.50 0.50
    0.50 0.50 0.50
    ");
}

#[test]
fn symmetrize_symmetric_is_noop() {
    let structure = simple_cubic();
    let cells = cells(&structure, &diag(2));
    let fc = springs(&cells, 1.0, 3.1);
    let (group, rotations) = cells.supercell_group().unwrap();
    assert_eq!(group.len(), 384);
    let got = symmetrize_force_constants(&fc, &group, &rotations);
    assert!(got.max_abs_diff(&fc) < 1e-10);
}

#[test]
fn symmetrize_idempotent() {
    let structure = cscl();
    let cells = cells(&structure, &diag(2));
    let fc = perturbed(&springs(&cells, 1.0, 4.1));
    let (group, rotations) = cells.supercell_group().unwrap();
    let once = symmetrize_force_constants(&fc, &group, &rotations);
    let twice = symmetrize_force_constants(&once, &group, &rotations);
    assert!(once.max_abs_diff(&fc) > 1e-4);
    assert!(twice.max_abs_diff(&once) < 1e-10);
}

#[test]
fn force_sets_solve_back() {
    let structure = cscl();
    let smat = diag(2);
    let cells = cells(&structure, &smat);
    let want = springs(&cells, 1.0, 4.1);
    let u = Vec3::new(0.01, 0.0, 0.0);
    let sets = ForceSets::new(
        16,
        vec![displaced(&want, 0, u), displaced(&want, 8, u)],
        Some(smat),
    )
    .unwrap();
    let got = produce_force_constants(&sets, &cells).unwrap();
    assert!(got.max_abs_diff(&want) < 1e-8);

    // computing through a structure caches the result on it
    let mut structure = structure;
    structure.set_force_sets(sets);
    assert!(structure.force_constants().is_none());
    get_phonon(&mut structure, false, true, None).unwrap();
    let cached = structure.force_constants().unwrap();
    assert!(cached.max_abs_diff(&want) < 1e-8);
}

#[test]
fn force_sets_unreachable_atom() {
    let structure = cscl();
    let smat = diag(2);
    let cells = cells(&structure, &smat);
    let fc = springs(&cells, 1.0, 4.1);
    let sets = ForceSets::new(
        16,
        vec![displaced(&fc, 0, Vec3::new(0.01, 0.0, 0.0))],
        Some(smat),
    )
    .unwrap();
    assert!(matches!(
        produce_force_constants(&sets, &cells),
        Err(PhononError::Underdetermined(_))
    ));
}

#[test]
fn missing_force_data() {
    let mut structure = simple_cubic();
    assert!(matches!(
        get_phonon(&mut structure, false, true, Some(diag(2))),
        Err(PhononError::NoForceData)
    ));
    // without forces only the cells are set up
    let phonon = get_phonon(&mut structure, false, false, Some(diag(2))).unwrap();
    assert_eq!(phonon.commensurate_points().unwrap().len(), 8);
    assert!(phonon.modes(&Vec3::zeros()).is_err());
}

#[test]
fn supercell_mismatch() {
    let mut structure = simple_cubic();
    let fc = springs(&cells(&structure, &diag(2)), 1.0, 3.1);
    structure.set_force_constants(fc);
    structure.set_supercell_phonon(diag(3));
    assert!(matches!(
        get_phonon(&mut structure, false, true, None),
        Err(PhononError::SupercellMismatch {
            expected: 27,
            got: 8
        })
    ));
}

#[test]
fn force_constants_override() {
    let mut structure = simple_cubic();
    let small = springs(&cells(&structure, &diag(2)), 1.0, 3.1);
    structure.set_force_constants(small);
    structure.set_supercell_phonon(diag(2));
    let big = springs(&cells(&structure, &diag(3)), 1.0, 3.1);
    let phonon =
        phonon_with_force_constants(&mut structure, Some(&big), false).unwrap();
    assert_eq!(phonon.cells().natoms(), 27);
    assert_eq!(phonon.force_constants().unwrap(), &big);

    let phonon = phonon_with_force_constants(&mut structure, None, false).unwrap();
    assert_eq!(phonon.cells().natoms(), 8);
    assert!(matches!(
        phonon_with_force_constants(&mut structure, Some(&big), true),
        Err(PhononError::NoBornCharges)
    ));
}

#[test]
fn supercell_defaults_to_identity() {
    let fc = ForceConstants::new(1, vec![Mat3::identity()], None).unwrap();
    assert!(fc.is_supercell_defaulted());
    assert!(fc.supercell().is_identity());
    let given = fc.with_supercell(SupercellMatrix::identity());
    assert!(!given.is_supercell_defaulted());

    let structure = simple_cubic();
    assert!(structure.resolve_supercell(None).is_identity());
}

#[test]
fn harmonic_eigenvectors() {
    let mut structure = cscl();
    let smat = diag(2);
    structure.set_force_constants(springs(&cells(&structure, &smat), 1.0, 4.1));
    let options = HarmonicOptions {
        normalize: true,
        test_orthonormal: true,
        ..Default::default()
    };
    let q = Vec3::new(0.5, 0.0, 0.0);
    let (freqs, vecs) = harmonic_modes(&mut structure, &q, options).unwrap();
    assert_eq!(freqs.len(), 6);
    assert_eq!(vecs.shape(), (6, 6));
    assert!(freqs.windows(2).all(|w| w[0] <= w[1]));
    let prod = &vecs * vecs.adjoint();
    for i in 0..6 {
        for j in 0..6 {
            let want = if i == j { 1.0 } else { 0.0 };
            assert_abs_diff_eq!(prod[(i, j)].re, want, epsilon = 1e-10);
            assert_abs_diff_eq!(prod[(i, j)].im, 0.0, epsilon = 1e-10);
        }
    }
    // acoustic modes vanish at Γ
    let (freqs, _) =
        harmonic_modes(&mut structure, &Vec3::zeros(), options).unwrap();
    for f in &freqs[..3] {
        assert_abs_diff_eq!(f.value(), 0.0, epsilon = 1e-5);
    }
}

#[test]
fn frequency_units() {
    let f = Thz::from_eigenvalue(4.0);
    assert_abs_diff_eq!(f.value(), 2.0 * units::VASP_TO_THZ);
    assert_abs_diff_eq!(f.to_eigenvalue(), 4.0, epsilon = 1e-12);
    let neg = Thz::from_eigenvalue(-1.0);
    assert!(neg.value() < 0.0);
    assert_abs_diff_eq!(neg.to_eigenvalue(), -1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(units::EV_TO_KJMOL, 96.485332, epsilon = 1e-5);
}

/// simple cubic aluminium on springs reaching `cutoff`. nearest neighbours
/// alone leave the transverse modes along each axis without a restoring force
fn simple_cubic_phonon(cutoff: f64) -> Phonon {
    let mut structure = simple_cubic();
    let smat = diag(2);
    structure
        .set_force_constants(springs(&cells(&structure, &smat), 1.0, cutoff));
    get_phonon(&mut structure, false, true, None).unwrap()
}

#[test]
fn thermal_limits() {
    // second neighbours at 3√2 Å so only Γ has zero modes on the mesh
    let phonon = simple_cubic_phonon(4.3);
    let mesh = phonon.mesh([8, 8, 8]).unwrap();
    let zero = mesh.thermal_properties(0.0, 1.0);
    assert!(zero.free_energy > 0.0);
    assert_abs_diff_eq!(zero.entropy, 0.0);
    assert_abs_diff_eq!(zero.heat_capacity, 0.0);

    // Dulong-Petit
    let hot = mesh.thermal_properties(4000.0, 1.0);
    let r = units::KB * units::EV_TO_KJMOL * 1000.0;
    assert_relative_eq!(hot.heat_capacity, 3.0 * r, max_relative = 1e-2);
    assert!(hot.free_energy < zero.free_energy);

    let range = phonon.thermal_range([4, 4, 4], (0.0, 100.0, 10.0)).unwrap();
    assert_eq!(range.len(), 11);
    assert_abs_diff_eq!(range[10].temperature, 100.0);
}

#[test]
fn dos_normalization() {
    let phonon = simple_cubic_phonon(3.1);
    let dos = phonon.dos([6, 6, 6], &DosOptions::default()).unwrap();
    assert_eq!(dos.frequencies.len(), mesh::DOS_POINTS);
    let step = dos.frequencies[1] - dos.frequencies[0];
    let total: f64 = dos.dos.iter().sum::<f64>() * step;
    assert_relative_eq!(total, 3.0, max_relative = 1e-2);

    let partial = phonon
        .dos(
            [6, 6, 6],
            &DosOptions {
                atom: Some(0),
                ..Default::default()
            },
        )
        .unwrap();
    for (a, b) in partial.dos.iter().zip(&dos.dos) {
        assert_abs_diff_eq!(a, b, epsilon = 1e-10);
    }
    assert!(matches!(
        phonon.dos(
            [2, 2, 2],
            &DosOptions {
                atom: Some(1),
                ..Default::default()
            }
        ),
        Err(PhononError::AtomOutOfRange { atom: 1, natoms: 1 })
    ));
}

#[test]
fn mesh_is_gamma_centred() {
    let points = mesh::mesh_points([4, 1, 1]);
    let xs: Vec<f64> = points.iter().map(|q| q[0]).collect();
    assert_eq!(xs, vec![0.0, 0.25, 0.5, -0.25]);
}

#[test]
fn band_path() {
    let phonon = simple_cubic_phonon(3.1);
    let g = Vec3::zeros();
    let x = Vec3::new(0.5, 0.0, 0.0);
    let m = Vec3::new(0.5, 0.5, 0.0);
    let bands = phonon.band_structure(&[(g, x), (x, m)], 10).unwrap();
    assert_eq!(bands.qpoints.len(), 22);
    assert_abs_diff_eq!(bands.distances[10], 0.5 / 3.0, epsilon = 1e-12);
    assert_abs_diff_eq!(bands.distances[11], bands.distances[10]);
    assert_abs_diff_eq!(bands.distances[21], 1.0 / 3.0, epsilon = 1e-12);
    assert!(bands.frequencies[0].iter().all(|f| f.abs() < 1e-5));
}

#[test]
fn equivalent_points() {
    let s = simple_cubic();
    let got =
        equivalent_q_points(&Vec3::new(0.5, 0.0, 0.0), s.cell(), s.primitive_matrix());
    assert_eq!(got.len(), 3);
    let got = equivalent_q_points(
        &Vec3::new(0.25, 0.25, 0.25),
        s.cell(),
        s.primitive_matrix(),
    );
    assert_eq!(got.len(), 1);
}

#[test]
fn born_expansion() {
    let born = BornCharges::parse(
        "# tetragonal
14.4
 5.0 0.0 0.0  0.0 5.0 0.0  0.0 0.0 6.0
 1.0 0.0 0.0  0.0 1.0 0.0  0.0 0.0 2.0
",
        "BORN",
    )
    .unwrap();
    assert_abs_diff_eq!(born.factor, 14.4);
    assert_abs_diff_eq!(born.dielectric[(2, 2)], 6.0);
    let bct = structure(
        Mat3::from_diagonal(&Vec3::new(3.0, 3.0, 4.0)),
        &[[0.0, 0.0, 0.0], [0.5, 0.5, 0.5]],
        &["Si", "Si"],
    );
    let charges = born.expand(bct.cell()).unwrap();
    assert_eq!(charges.len(), 2);
    for z in &charges {
        assert_abs_diff_eq!(*z, born.charges[0], epsilon = 1e-12);
    }

    let default = BornCharges::parse(
        "default
1 0 0 0 1 0 0 0 1
1 0 0 0 1 0 0 0 1
-1 0 0 0 -1 0 0 0 -1
",
        "BORN",
    )
    .unwrap();
    assert_abs_diff_eq!(default.factor, units::NAC_FACTOR);
    assert!(BornCharges::parse("14.4\n1 2 3\n", "BORN").is_err());
}

#[test]
fn nac_splits_optical_modes() {
    let mut structure = cscl();
    let smat = diag(2);
    let cells = cells(&structure, &smat);
    structure.set_force_constants(springs(&cells, 1.0, 4.1));
    structure.set_born(BornCharges {
        factor: units::NAC_FACTOR,
        dielectric: Mat3::identity() * 4.0,
        charges: vec![Mat3::identity() * 1.2, Mat3::identity() * -1.2],
    });
    let plain = get_phonon(&mut structure, false, true, None).unwrap();
    let nac = get_phonon(&mut structure, true, true, None).unwrap();
    let gamma = Vec3::zeros();
    let a = plain.dynamical_matrix().unwrap().at(&gamma);
    let b = nac.dynamical_matrix().unwrap().at(&gamma);
    assert!((a - b).camax() < 1e-12);

    let q = Vec3::new(0.1, 0.0, 0.0);
    let trace = |p: &Phonon| -> f64 {
        p.modes(&q)
            .unwrap()
            .frequencies
            .iter()
            .map(|f| f.to_eigenvalue())
            .sum()
    };
    // the correction only ever stiffens the longitudinal optical mode
    assert!(trace(&nac) > trace(&plain) + 1e-6);

    let born = structure.born().unwrap();
    let nac = Nac::new(born, &cells.primitive.cell, cells.ncells()).unwrap();
    assert!(nac.blocks(&gamma).is_none());

    let mut bare = cscl();
    bare.set_force_constants(springs(&cells, 1.0, 4.1));
    assert!(matches!(
        get_phonon(&mut bare, true, true, None),
        Err(PhononError::NoBornCharges)
    ));
}
