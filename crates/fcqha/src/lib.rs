//! quasi-harmonic interpolation of force constants and the command-line
//! front ends for the phonon and QHA libraries

pub mod input;
pub mod modes;
pub mod pipeline;

#[cfg(test)]
mod tests;

pub use input::InputParameters;
pub use pipeline::QhaExtraction;

/// initialize logging to stderr at the `info` level unless `RUST_LOG` says
/// otherwise
pub fn init_logger() {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    )
    .init();
}

/// set the maximum number of threads used by rayon. 0 means one per CPU
pub fn max_threads(n: usize) {
    let _ = rayon::ThreadPoolBuilder::new()
        .num_threads(n)
        .build_global();
}
