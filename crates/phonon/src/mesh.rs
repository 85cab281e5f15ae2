//! Γ-centred sampling meshes and densities of states

use std::f64::consts::PI;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{DynamicalMatrix, Modes, PhononError, Vec3};

/// number of points in a density of states when not otherwise specified
pub const DOS_POINTS: usize = 201;

/// frequencies and eigenvectors on a Γ-centred grid of wave vectors
#[derive(Clone, Debug)]
pub struct Mesh {
    pub size: [usize; 3],
    pub qpoints: Vec<Vec3>,
    pub modes: Vec<Modes>,
}

/// the points of a Γ-centred `size` grid, shifted into (-1/2, 1/2] with the
/// first index varying fastest
pub fn mesh_points(size: [usize; 3]) -> Vec<Vec3> {
    let fold = |k: usize, n: usize| {
        let x = k as f64 / n as f64;
        if x > 0.5 + 1e-12 { x - 1.0 } else { x }
    };
    let [nx, ny, nz] = size;
    let mut ret = Vec::with_capacity(nx * ny * nz);
    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                ret.push(Vec3::new(fold(i, nx), fold(j, ny), fold(k, nz)));
            }
        }
    }
    ret
}

impl Mesh {
    pub fn new(dm: &DynamicalMatrix, size: [usize; 3]) -> Self {
        let qpoints = mesh_points(size);
        let modes = qpoints.par_iter().map(|q| dm.modes(q)).collect();
        Self {
            size,
            qpoints,
            modes,
        }
    }

    pub fn len(&self) -> usize {
        self.qpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.qpoints.is_empty()
    }

    /// every frequency on the mesh in THz
    pub fn frequencies(&self) -> impl Iterator<Item = f64> + '_ {
        self.modes
            .iter()
            .flat_map(|m| m.frequencies.iter().map(|f| f.value()))
    }
}

/// options for [Mesh::dos]. unset fields are chosen from the spectrum
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DosOptions {
    pub freq_min: Option<f64>,
    pub freq_max: Option<f64>,
    /// gaussian width in THz
    pub sigma: Option<f64>,
    pub points: Option<usize>,
    /// project onto this primitive atom instead of summing every atom
    pub atom: Option<usize>,
}

/// a density of states sampled on an evenly spaced frequency grid
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dos {
    pub frequencies: Vec<f64>,
    pub dos: Vec<f64>,
}

fn gaussian(x: f64, sigma: f64) -> f64 {
    (-x * x / (2.0 * sigma * sigma)).exp() / (sigma * (2.0 * PI).sqrt())
}

impl Mesh {
    /// the gaussian-smeared density of states per primitive cell, scaled by
    /// `scale` to report it per unit cell
    pub fn dos(
        &self,
        options: &DosOptions,
        scale: f64,
    ) -> Result<Dos, PhononError> {
        let nmodes = self.modes.first().map_or(0, |m| m.frequencies.len());
        let natoms = nmodes / 3;
        if let Some(atom) = options.atom
            && atom >= natoms
        {
            return Err(PhononError::AtomOutOfRange { atom, natoms });
        }
        let (lo, hi) = self
            .frequencies()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), f| {
                (lo.min(f), hi.max(f))
            });
        let span = if hi > lo { hi - lo } else { 1.0 };
        let sigma = options.sigma.unwrap_or(span / 100.0);
        let fmin = options.freq_min.unwrap_or(lo - 10.0 * sigma);
        let fmax = options.freq_max.unwrap_or(hi + 10.0 * sigma);
        let npts = options.points.unwrap_or(DOS_POINTS).max(2);
        let step = (fmax - fmin) / (npts - 1) as f64;
        let frequencies: Vec<f64> =
            (0..npts).map(|i| fmin + i as f64 * step).collect();
        let norm = scale / self.len() as f64;
        let mut dos = vec![0.0; npts];
        for modes in &self.modes {
            for (k, f) in modes.frequencies.iter().enumerate() {
                let weight = match options.atom {
                    Some(p) => (3 * p..3 * p + 3)
                        .map(|c| modes.eigenvectors[(c, k)].norm_sqr())
                        .sum(),
                    None => 1.0,
                };
                for (d, x) in dos.iter_mut().zip(&frequencies) {
                    *d += weight * gaussian(x - f.value(), sigma) * norm;
                }
            }
        }
        Ok(Dos { frequencies, dos })
    }
}
