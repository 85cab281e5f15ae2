use std::{fs::File, io::Write, path::PathBuf, process::ExitCode};

use anyhow::Context;
use clap::Parser;
use fcqha::{
    InputParameters, QhaExtraction, init_logger,
    pipeline::{QhaOutcome, expand_patterns},
};
use phonon::files::write_force_constants;

/// interpolate force constants to the quasi-harmonic equilibrium volume at a
/// given temperature
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// input file containing the structure and supercell
    input_file: PathBuf,

    /// force constants files, one per volume. glob patterns are expanded
    /// and sorted
    #[arg(long = "fc", num_args = 1.., required = true)]
    fc: Vec<String>,

    /// thermal_properties.yaml files, one per volume, in the same order as
    /// the force constants
    #[arg(long = "tp", num_args = 1.., required = true)]
    tp: Vec<String>,

    /// energy–volume file with one `volume energy` row per volume
    #[arg(long = "ev")]
    ev: PathBuf,

    /// target temperature in K
    #[arg(short, default_value_t = 300.0)]
    t: f64,

    /// write the QHA curves to qha.json and print them
    #[arg(short, default_value_t = false)]
    p: bool,

    /// where to write the interpolated force constants
    #[arg(short, long, default_value = "FORCE_CONSTANTS_QHA")]
    output: PathBuf,
}

/// `-fc`, `-tp`, and `-ev` are accepted as spellings of the long flags
fn long_flags(args: impl Iterator<Item = String>) -> Vec<String> {
    args.map(|a| match a.as_str() {
        "-fc" | "-tp" | "-ev" => format!("-{a}"),
        _ => a,
    })
    .collect()
}

fn print_table(outcome: &QhaOutcome, t: f64) {
    let summary = outcome.summary(t);
    log::info!(
        "{:>10}{:>14}{:>14}{:>12}{:>14}",
        "T (K)",
        "V (Å³)",
        "G (eV)",
        "B (GPa)",
        "α (1/K)"
    );
    for i in 0..summary.temperatures.len() {
        log::info!(
            "{:10.2}{:14.6}{:14.6}{:12.4}{:14.4e}",
            summary.temperatures[i],
            summary.volume_temperature[i],
            summary.gibbs_temperature[i],
            summary.bulk_modulus_temperature[i],
            summary.thermal_expansion[i],
        );
    }
}

fn run(args: &Args) -> anyhow::Result<()> {
    let params = InputParameters::load(&args.input_file)?;
    let extraction = QhaExtraction {
        fc_files: expand_patterns(&args.fc)?,
        tp_files: expand_patterns(&args.tp)?,
        ev_file: args.ev.clone(),
        temperature: args.t,
    };
    let outcome = extraction.run(&params)?;

    if args.p {
        print_table(&outcome, args.t);
        let mut f = File::create("qha.json")
            .context("failed to create qha.json")?;
        writeln!(
            f,
            "{}",
            serde_json::to_string_pretty(&outcome.summary(args.t))?
        )?;
    }

    write_force_constants(&args.output, &outcome.force_constants)?;
    log::info!(
        "QHA renormalized force constants written to {}",
        args.output.display()
    );
    Ok(())
}

fn main() -> ExitCode {
    init_logger();
    let args = Args::parse_from(long_flags(std::env::args()));
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
