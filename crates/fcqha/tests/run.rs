use std::{fs::read_to_string, path::Path};

use approx::assert_abs_diff_eq;
use assert_cmd::Command;
use crystal::{SupercellMatrix, poscar::parse_poscar};
use fcqha::{modes::ModesFile, pipeline::QhaSummary};
use phonon::{
    ForceConstants, Mat3, PhononCells, ThermalProperty, Vec3,
    files::{read_force_constants, write_force_constants},
    units::EV_TO_KJMOL,
};
use qha::{
    Vinet,
    thermal::{read_thermal_properties, write_thermal_properties},
};
use tempfile::tempdir;

const POSCAR: &str = "simple cubic aluminium
3.0
1.0 0.0 0.0
0.0 1.0 0.0
0.0 0.0 1.0
Al
1
Direct
0.0 0.0 0.0
";

const INPUT: &str = "STRUCTURE FILE POSCAR
POSCAR

SUPERCELL MATRIX PHONOPY
2 0 0
0 2 0
0 0 2

MESH PHONOPY
4 4 4
";

fn smat() -> SupercellMatrix {
    SupercellMatrix::diagonal(2, 2, 2).unwrap()
}

/// nearest-neighbour springs of stiffness `k` in the 2×2×2 supercell
fn springs(k: f64) -> ForceConstants {
    let cell = parse_poscar(POSCAR).unwrap();
    let cells = PhononCells::new(&cell, &Mat3::identity(), &smat()).unwrap();
    let sc = &cells.supercell.cell;
    let n = sc.len();
    let mut pair = vec![Mat3::zeros(); n * n];
    for i in 0..n {
        for j in 0..n {
            if i == j {
                continue;
            }
            let d = sc.positions()[j] - sc.positions()[i];
            let d = d - d.map(f64::round);
            for x in -1..=1 {
                for y in -1..=1 {
                    for z in -1..=1 {
                        let v = d + Vec3::new(x as f64, y as f64, z as f64);
                        let r = sc.to_cart(&v);
                        if r.norm() < 3.1 {
                            let u = r / r.norm();
                            pair[i * n + j] += u * u.transpose() * k;
                        }
                    }
                }
            }
        }
    }
    ForceConstants::from_fn(n, smat(), |i, j| {
        if i == j {
            (0..n).map(|l| pair[i * n + l]).sum()
        } else {
            -pair[i * n + j]
        }
    })
}

fn setup(dir: &Path, extra: &str) -> std::io::Result<()> {
    std::fs::write(dir.join("POSCAR"), POSCAR)?;
    std::fs::write(dir.join("input"), format!("{INPUT}\n{extra}"))
}

const VOLUMES: [f64; 3] = [19.0, 20.0, 21.0];
const STIFFNESS: [f64; 3] = [1.0, 0.9, 0.8];
/// eV/K/Å³
const EXPANSION: f64 = 2e-5;

/// force constants, thermal properties, and an energy–volume table for three
/// volumes. the files and table rows are written in `order`, as indices into
/// [`VOLUMES`]
fn qha_files(dir: &Path, order: [usize; 3]) {
    let eos = Vinet {
        e0: -10.0,
        b0: 0.5,
        bp: 4.0,
        v0: 20.0,
    };
    let mut ev = String::from("# volume energy\n");
    for (i, &o) in order.iter().enumerate() {
        let (v, k) = (VOLUMES[o], STIFFNESS[o]);
        ev.push_str(&format!("{v:.4} {:.10}\n", eos.energy(v)));
        write_force_constants(dir.join(format!("fc_{i}")), &springs(k))
            .unwrap();
        let props: Vec<ThermalProperty> = (0..6)
            .map(|t| {
                let t = 100.0 * t as f64;
                ThermalProperty {
                    temperature: t,
                    free_energy: -EXPANSION * t * v * EV_TO_KJMOL,
                    entropy: EXPANSION * v * EV_TO_KJMOL * 1000.0,
                    heat_capacity: 10.0,
                }
            })
            .collect();
        write_thermal_properties(dir.join(format!("tp_{i}.yaml")), 1, &props)
            .unwrap();
    }
    std::fs::write(dir.join("ev.dat"), ev).unwrap();
}

/// run the extraction at 150 K in `dir` and return the summary and the
/// force constants
fn extract(dir: &Path) -> std::io::Result<(QhaSummary, ForceConstants)> {
    let mut cmd = Command::cargo_bin("fcqha").unwrap();
    let assert = cmd
        .args(["input", "-fc", "fc_*", "-tp", "tp_*.yaml", "-ev", "ev.dat"])
        .args(["-t", "150", "-p"])
        .current_dir(dir)
        .assert();
    let output = assert.get_output();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let summary =
        serde_json::from_str(&read_to_string(dir.join("qha.json"))?).unwrap();
    let fc =
        read_force_constants(dir.join("FORCE_CONSTANTS_QHA"), Some(smat()))
            .unwrap();
    Ok((summary, fc))
}

#[test]
fn qha_extraction() -> std::io::Result<()> {
    let dir = tempdir()?;
    setup(dir.path(), "")?;
    qha_files(dir.path(), [0, 1, 2]);
    let (summary, fc) = extract(dir.path())?;
    assert_eq!(summary.temperatures, vec![0.0, 100.0, 200.0, 300.0]);
    let v = summary.target_volume;
    assert!(v > 20.0 && v < 21.0, "target volume {v}");

    assert_eq!(fc.shape(), (8, 8, 3, 3));
    // the stiffness is linear in the volume, so the interpolation is exact
    let k = 1.0 - 0.1 * (v - 19.0);
    assert_abs_diff_eq!(fc.get(0, 0, 0, 0), 2.0 * k, epsilon = 1e-6);
    Ok(())
}

#[test]
fn qha_extraction_unsorted_volumes() -> std::io::Result<()> {
    let sorted = tempdir()?;
    setup(sorted.path(), "")?;
    qha_files(sorted.path(), [0, 1, 2]);
    let (want, want_fc) = extract(sorted.path())?;

    let shuffled = tempdir()?;
    setup(shuffled.path(), "")?;
    qha_files(shuffled.path(), [2, 0, 1]);
    let (got, got_fc) = extract(shuffled.path())?;

    assert_eq!(got.volumes, want.volumes);
    assert_abs_diff_eq!(got.target_volume, want.target_volume, epsilon = 1e-8);
    assert!(got_fc.max_abs_diff(&want_fc) < 1e-8);
    let k = 1.0 - 0.1 * (got.target_volume - 19.0);
    assert_abs_diff_eq!(got_fc.get(0, 0, 0, 0), 2.0 * k, epsilon = 1e-6);
    Ok(())
}

#[test]
fn qha_target_outside_temperatures() -> std::io::Result<()> {
    let dir = tempdir()?;
    setup(dir.path(), "")?;
    qha_files(dir.path(), [0, 1, 2]);
    Command::cargo_bin("fcqha")
        .unwrap()
        .args(["input", "-fc", "fc_*", "-tp", "tp_*.yaml", "-ev", "ev.dat"])
        .args(["-t", "450"])
        .current_dir(&dir)
        .assert()
        .failure()
        .code(1);
    assert!(!dir.path().join("FORCE_CONSTANTS_QHA").exists());
    Ok(())
}

#[test]
fn qha_file_count_mismatch() -> std::io::Result<()> {
    let dir = tempdir()?;
    setup(dir.path(), "")?;
    qha_files(dir.path(), [0, 1, 2]);
    let assert = Command::cargo_bin("fcqha")
        .unwrap()
        .args(["input", "-fc", "fc_0", "fc_1", "-tp", "tp_*.yaml"])
        .args(["-ev", "ev.dat"])
        .current_dir(&dir)
        .assert()
        .failure()
        .code(1);
    let stderr = String::from_utf8_lossy(&assert.get_output().stderr);
    assert!(stderr.contains("2 force constants files for 3 volumes"));
    Ok(())
}

#[test]
fn modes_renormalize() -> std::io::Result<()> {
    let dir = tempdir()?;
    setup(dir.path(), "FORCE CONSTANTS\nFORCE_CONSTANTS\n")?;
    let want = springs(1.0);
    write_force_constants(dir.path().join("FORCE_CONSTANTS"), &want).unwrap();

    let assert = Command::cargo_bin("phonon-tool")
        .unwrap()
        .args(["modes", "input", "-o", "modes.yaml", "--check", "--print"])
        .current_dir(&dir)
        .assert()
        .success();
    let stderr = String::from_utf8_lossy(&assert.get_output().stderr);
    assert_eq!(stderr.matches("harmonic frequencies at").count(), 8);
    let modes = ModesFile::load(dir.path().join("modes.yaml")).unwrap();
    assert_eq!(modes.qpoints.len(), 8);
    assert_eq!(modes.qpoints[0].q, [0.0; 3]);

    // entries may come in any order
    let mut reversed = modes.clone();
    reversed.qpoints.reverse();
    reversed.dump(dir.path().join("reversed.yaml")).unwrap();
    Command::cargo_bin("phonon-tool")
        .unwrap()
        .args(["renormalize", "input", "reversed.yaml", "-o", "FC_REV"])
        .current_dir(&dir)
        .assert()
        .success();
    let got =
        read_force_constants(dir.path().join("FC_REV"), Some(smat())).unwrap();
    assert!(got.max_abs_diff(&want) < 1e-6);

    let mut foreign = modes.clone();
    foreign.qpoints[3].q = [0.25, 0.5, 0.0];
    foreign.dump(dir.path().join("foreign.yaml")).unwrap();
    let assert = Command::cargo_bin("phonon-tool")
        .unwrap()
        .args(["renormalize", "input", "foreign.yaml", "-o", "FC_BAD"])
        .current_dir(&dir)
        .assert()
        .failure()
        .code(1);
    let stderr = String::from_utf8_lossy(&assert.get_output().stderr);
    assert!(stderr.contains("no modes given at commensurate point"));
    assert!(!dir.path().join("FC_BAD").exists());

    Command::cargo_bin("phonon-tool")
        .unwrap()
        .args(["renormalize", "input", "modes.yaml", "-o", "FC_OUT"])
        .current_dir(&dir)
        .assert()
        .success();
    let got =
        read_force_constants(dir.path().join("FC_OUT"), Some(smat())).unwrap();
    assert!(got.max_abs_diff(&want) < 1e-6);
    Ok(())
}

#[test]
fn commensurate() -> std::io::Result<()> {
    let dir = tempdir()?;
    setup(dir.path(), "")?;
    let assert = Command::cargo_bin("phonon-tool")
        .unwrap()
        .args(["commensurate", "input"])
        .current_dir(&dir)
        .assert()
        .success();
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout);
    insta::assert_snapshot!(stdout, @r"
      0.00000000  0.00000000  0.00000000
      0.50000000  0.00000000  0.00000000
      0.00000000  0.50000000  0.00000000
      0.50000000  0.50000000  0.00000000
      0.00000000  0.00000000  0.50000000
      0.50000000  0.00000000  0.50000000
      0.00000000  0.50000000  0.50000000
      0.50000000  0.50000000  0.50000000
    ");
    Ok(())
}

#[test]
fn thermal_from_force_constants() -> std::io::Result<()> {
    let dir = tempdir()?;
    setup(dir.path(), "")?;
    write_force_constants(dir.path().join("FC"), &springs(1.0)).unwrap();
    Command::cargo_bin("phonon-tool")
        .unwrap()
        .args(["thermal", "input", "--fc", "FC", "--t-max", "100"])
        .args(["--t-step", "50", "-o", "tp.yaml"])
        .current_dir(&dir)
        .assert()
        .success();
    let props = read_thermal_properties(dir.path().join("tp.yaml")).unwrap();
    let temps: Vec<f64> = props.iter().map(|p| p.temperature).collect();
    assert_eq!(temps, vec![0.0, 50.0, 100.0]);
    assert!(props[2].heat_capacity > props[1].heat_capacity);
    Ok(())
}

#[test]
fn missing_force_data() -> std::io::Result<()> {
    let dir = tempdir()?;
    setup(dir.path(), "")?;
    let assert = Command::cargo_bin("phonon-tool")
        .unwrap()
        .args(["fc", "input"])
        .current_dir(&dir)
        .assert()
        .failure()
        .code(1);
    let stderr = String::from_utf8_lossy(&assert.get_output().stderr);
    assert!(stderr.contains("no force sets or force constants available"));
    Ok(())
}

#[test]
fn missing_structure() -> std::io::Result<()> {
    let dir = tempdir()?;
    std::fs::write(dir.path().join("input"), INPUT)?;
    Command::cargo_bin("phonon-tool")
        .unwrap()
        .args(["commensurate", "input"])
        .current_dir(&dir)
        .assert()
        .failure()
        .code(1);
    Ok(())
}
