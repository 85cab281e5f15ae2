use phonon::{ForceConstants, Mat3};

use crate::{QhaError, QuadraticSpline};

/// force constants sampled at several volumes, interpolated elementwise
/// with a quadratic spline
#[derive(Clone, Debug)]
pub struct ForceConstantInterpolator {
    spline: QuadraticSpline,
    fcs: Vec<ForceConstants>,
}

impl ForceConstantInterpolator {
    /// `volumes` must be strictly increasing, with one set of force
    /// constants per volume, all of the same shape and supercell
    pub fn new(
        volumes: &[f64],
        fcs: Vec<ForceConstants>,
    ) -> Result<Self, QhaError> {
        if volumes.len() != fcs.len() {
            return Err(QhaError::Mismatch(format!(
                "{} volumes for {} force constant sets",
                volumes.len(),
                fcs.len()
            )));
        }
        let spline = QuadraticSpline::new(volumes)?;
        let first = &fcs[0];
        for (i, fc) in fcs.iter().enumerate().skip(1) {
            if fc.shape() != first.shape() || fc.supercell() != first.supercell()
            {
                return Err(QhaError::Mismatch(format!(
                    "force constants {i} have shape {:?} in supercell\n{}\n\
                     but the first have shape {:?} in supercell\n{}",
                    fc.shape(),
                    fc.supercell(),
                    first.shape(),
                    first.supercell()
                )));
            }
        }
        Ok(Self { spline, fcs })
    }

    pub fn volumes(&self) -> &[f64] {
        self.spline.x()
    }

    /// the force constants at volume `v`
    pub fn at(&self, v: f64) -> Result<ForceConstants, QhaError> {
        if self.spline.extrapolates(v) {
            let x = self.spline.x();
            log::warn!(
                "extrapolating force constants to {v:.4} Å³ outside [{:.4}, {:.4}]",
                x[0],
                x[x.len() - 1]
            );
        }
        let weights = self.spline.weights(v)?;
        let first = &self.fcs[0];
        Ok(ForceConstants::from_fn(
            first.natoms(),
            first.supercell(),
            |i, j| {
                weights
                    .iter()
                    .zip(&self.fcs)
                    .fold(Mat3::zeros(), |acc, (w, fc)| acc + fc.block(i, j) * *w)
            },
        ))
    }
}
