use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use fcqha::{
    InputParameters, init_logger, max_threads,
    modes::{ModesFile, QPointModes},
};
use phonon::{
    DEFAULT_MESH, DosOptions, ForceConstants, HarmonicOptions, Phonon,
    bands::BAND_RESOLUTION,
    commensurate_points,
    files::{read_force_constants, write_force_constants},
    get_phonon, harmonic_modes, phonon_with_force_constants,
    renormalized_force_constants,
};
use qha::thermal::write_thermal_properties;

/// phonon calculations on the structure and force data named in an input
/// file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Set the maximum number of threads to use. Defaults to 0, which means
    /// to use as many threads as there are CPUS.
    #[arg(short, long, default_value_t = 0, global = true)]
    threads: usize,

    #[command(subcommand)]
    command: Command,
}

/// options shared by the commands that need a full phonon calculation
#[derive(Args, Debug)]
struct Source {
    /// input file
    input: PathBuf,

    /// use these force constants instead of the force data in the input
    #[arg(long)]
    fc: Option<PathBuf>,

    /// apply the non-analytical correction from the Born charges
    #[arg(long, default_value_t = false)]
    nac: bool,
}

impl Source {
    fn phonon(&self) -> anyhow::Result<(InputParameters, Phonon)> {
        let params = InputParameters::load(&self.input)?;
        let mut structure = params.structure()?;
        let fc = self
            .fc
            .as_ref()
            .map(|path| read_force_constants(path, params.supercell_phonon))
            .transpose()?;
        let phonon =
            phonon_with_force_constants(&mut structure, fc.as_ref(), self.nac)?;
        Ok((params, phonon))
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// list the commensurate points of the phonon supercell
    Commensurate {
        input: PathBuf,
    },

    /// write the harmonic frequencies and eigenvectors at the commensurate
    /// points
    Modes {
        input: PathBuf,

        #[arg(short, long, default_value = "modes.yaml")]
        output: PathBuf,

        #[arg(long, default_value_t = false)]
        nac: bool,

        /// scale each eigenvector to unit length
        #[arg(long, default_value_t = false)]
        normalize: bool,

        /// report how far the eigenvectors are from orthonormal
        #[arg(long, default_value_t = false)]
        check: bool,

        /// log the harmonic frequencies at each point
        #[arg(short, long, default_value_t = false)]
        print: bool,
    },

    /// rebuild force constants from the frequencies and eigenvectors in a
    /// modes file
    Renormalize {
        input: PathBuf,

        modes: PathBuf,

        #[arg(short, long, default_value = "FORCE_CONSTANTS")]
        output: PathBuf,

        /// symmetrize the result with the space group of the crystal
        #[arg(short, long, default_value_t = false)]
        symmetrize: bool,
    },

    /// compute force constants from the force sets in the input
    Fc {
        input: PathBuf,

        #[arg(short, long, default_value = "FORCE_CONSTANTS")]
        output: PathBuf,
    },

    /// gaussian-smeared density of states on the input mesh
    Dos {
        #[command(flatten)]
        source: Source,

        /// project onto this primitive atom
        #[arg(long)]
        atom: Option<usize>,

        /// smearing width in THz
        #[arg(long)]
        sigma: Option<f64>,

        #[arg(long)]
        points: Option<usize>,

        #[arg(short, long, default_value = "total_dos.dat")]
        output: PathBuf,
    },

    /// thermal properties over a range of temperatures
    Thermal {
        #[command(flatten)]
        source: Source,

        #[arg(long, default_value_t = 0.0)]
        t_min: f64,

        #[arg(long, default_value_t = 1000.0)]
        t_max: f64,

        #[arg(long, default_value_t = 10.0)]
        t_step: f64,

        #[arg(short, long, default_value = "thermal_properties.yaml")]
        output: PathBuf,
    },

    /// frequencies along the band path in the input
    Bands {
        #[command(flatten)]
        source: Source,

        /// number of intervals per segment
        #[arg(short, long, default_value_t = BAND_RESOLUTION)]
        resolution: usize,

        #[arg(short, long, default_value = "band.dat")]
        output: PathBuf,
    },
}

fn create(path: &Path) -> anyhow::Result<BufWriter<File>> {
    File::create(path)
        .map(BufWriter::new)
        .with_context(|| format!("failed to create {}", path.display()))
}

fn mesh(params: &InputParameters) -> [usize; 3] {
    params.mesh.unwrap_or_else(|| {
        log::info!("no mesh given, using {DEFAULT_MESH:?}");
        DEFAULT_MESH
    })
}

fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Commensurate { input } => {
            let params = InputParameters::load(&input)?;
            let structure = params.structure()?;
            let smat = structure.resolve_supercell(None);
            for q in commensurate_points(&structure, &smat)? {
                println!("{:12.8}{:12.8}{:12.8}", q[0], q[1], q[2]);
            }
        }
        Command::Modes {
            input,
            output,
            nac,
            normalize,
            check,
            print,
        } => {
            let params = InputParameters::load(&input)?;
            let mut structure = params.structure()?;
            let smat = structure.resolve_supercell(None);
            let options = HarmonicOptions {
                nac,
                normalize,
                test_orthonormal: check,
                print_data: print,
            };
            let mut qpoints = Vec::new();
            for q in commensurate_points(&structure, &smat)? {
                let (freqs, vecs) = harmonic_modes(&mut structure, &q, options)?;
                qpoints.push(QPointModes::new(&q, &freqs, &vecs));
            }
            ModesFile::new(&smat, qpoints).dump(&output)?;
            log::info!("modes written to {}", output.display());
        }
        Command::Renormalize {
            input,
            modes,
            output,
            symmetrize,
        } => {
            let params = InputParameters::load(&input)?;
            let structure = params.structure()?;
            let modes = ModesFile::load(&modes)?;
            let smat = modes.supercell()?;
            let points = commensurate_points(&structure, &smat)?;
            let (freqs, vecs) = modes.bundles(&points)?;
            let fc = renormalized_force_constants(
                &freqs,
                &vecs,
                &structure,
                &smat,
                symmetrize,
            )?;
            write_force_constants(&output, &fc)?;
            log::info!("force constants written to {}", output.display());
        }
        Command::Fc { input, output } => {
            let params = InputParameters::load(&input)?;
            let mut structure = params.structure()?;
            let phonon = get_phonon(&mut structure, false, true, None)?;
            let fc: &ForceConstants = phonon.force_constants()?;
            write_force_constants(&output, fc)?;
            log::info!("force constants written to {}", output.display());
        }
        Command::Dos {
            source,
            atom,
            sigma,
            points,
            output,
        } => {
            let (params, phonon) = source.phonon()?;
            let options = DosOptions {
                sigma,
                points,
                atom,
                ..Default::default()
            };
            let dos = phonon.dos(mesh(&params), &options)?;
            let mut w = create(&output)?;
            writeln!(w, "# frequency (THz)  dos")?;
            for (f, d) in dos.frequencies.iter().zip(&dos.dos) {
                writeln!(w, "{f:20.10}{d:20.10}")?;
            }
            w.flush()?;
        }
        Command::Thermal {
            source,
            t_min,
            t_max,
            t_step,
            output,
        } => {
            let (params, phonon) = source.phonon()?;
            let props =
                phonon.thermal_range(mesh(&params), (t_min, t_max, t_step))?;
            let natom = phonon.cells().unit.len();
            write_thermal_properties(&output, natom, &props)?;
            log::info!("thermal properties written to {}", output.display());
        }
        Command::Bands {
            source,
            resolution,
            output,
        } => {
            let (params, phonon) = source.phonon()?;
            if params.bands.is_empty() {
                anyhow::bail!("no BANDS block in {}", source.input.display());
            }
            let bands = phonon.band_structure(&params.bands, resolution)?;
            let mut w = create(&output)?;
            for (d, freqs) in bands.distances.iter().zip(&bands.frequencies) {
                write!(w, "{d:12.6}")?;
                for f in freqs {
                    write!(w, "{f:12.6}")?;
                }
                writeln!(w)?;
            }
            w.flush()?;
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    init_logger();
    let cli = Cli::parse();
    max_threads(cli.threads);
    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
