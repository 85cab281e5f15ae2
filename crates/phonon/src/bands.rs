use serde::{Deserialize, Serialize};

use crate::{DynamicalMatrix, Vec3};

/// default number of intervals per band segment
pub const BAND_RESOLUTION: usize = 30;

/// frequencies along a path of straight segments through the Brillouin zone
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BandStructure {
    pub qpoints: Vec<[f64; 3]>,
    /// cumulative reciprocal-space distance of each point in 1/Å
    pub distances: Vec<f64>,
    /// frequencies in THz, one row per point
    pub frequencies: Vec<Vec<f64>>,
}

impl BandStructure {
    /// sample each `(start, end)` segment at `resolution + 1` evenly spaced
    /// points. the distance keeps accumulating across segments
    pub fn new(
        dm: &DynamicalMatrix,
        segments: &[(Vec3, Vec3)],
        resolution: usize,
    ) -> Self {
        let recip = dm.cells().primitive.cell.reciprocal().transpose();
        let res = resolution.max(1);
        let mut ret = Self {
            qpoints: Vec::new(),
            distances: Vec::new(),
            frequencies: Vec::new(),
        };
        let mut dist = 0.0;
        for (start, end) in segments {
            let step = (end - start) / res as f64;
            let dstep = (recip * step).norm();
            for i in 0..=res {
                let q = start + step * i as f64;
                if i > 0 {
                    dist += dstep;
                }
                let modes = dm.modes(&q);
                ret.qpoints.push([q[0], q[1], q[2]]);
                ret.distances.push(dist);
                ret.frequencies
                    .push(modes.frequencies.iter().map(|f| f.value()).collect());
            }
        }
        ret
    }
}
