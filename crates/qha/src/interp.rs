//! one-dimensional quadratic spline interpolation. the spline matches
//! scipy's `interp1d(kind="quadratic")`: a degree-2 B-spline through every
//! sample with knots at the interior midpoints

use crate::{Dmat, Dvec, QhaError};

const DEGREE: usize = 2;

/// a quadratic interpolating spline over fixed abscissae. because the
/// interpolant is linear in the data, it is stored as the collocation matrix
/// and evaluated as a weighted sum of the sample values
#[derive(Clone, Debug)]
pub struct QuadraticSpline {
    x: Vec<f64>,
    knots: Vec<f64>,
    /// transpose of the collocation matrix `A[i][k] = B_k(x_i)`, factorized
    collocation: nalgebra::LU<f64, nalgebra::Dyn, nalgebra::Dyn>,
}

impl QuadraticSpline {
    pub fn new(x: &[f64]) -> Result<Self, QhaError> {
        let n = x.len();
        if n < DEGREE + 1 {
            return Err(QhaError::TooFewPoints {
                need: DEGREE + 1,
                got: n,
            });
        }
        if x.windows(2).any(|w| w[1] <= w[0]) {
            return Err(QhaError::NotIncreasing);
        }
        let mut knots = vec![x[0]; DEGREE + 1];
        knots.extend(x.windows(2).map(|w| (w[0] + w[1]) / 2.0).skip(1).take(n - 3));
        knots.extend([x[n - 1]; DEGREE + 1]);
        let mut a = Dmat::zeros(n, n);
        for (i, &xi) in x.iter().enumerate() {
            let (span, basis) = basis(&knots, n, xi);
            for (r, b) in basis.iter().enumerate() {
                a[(r + span - DEGREE, i)] = *b;
            }
        }
        Ok(Self {
            x: x.to_vec(),
            knots,
            collocation: a.lu(),
        })
    }

    pub fn x(&self) -> &[f64] {
        &self.x
    }

    /// whether `v` lies outside the sampled range
    pub fn extrapolates(&self, v: f64) -> bool {
        v < self.x[0] || v > self.x[self.x.len() - 1]
    }

    /// the weight of each sample in the interpolant at `v`
    pub fn weights(&self, v: f64) -> Result<Vec<f64>, QhaError> {
        let n = self.x.len();
        let (span, basis) = basis(&self.knots, n, v);
        let mut b = Dvec::zeros(n);
        for (r, val) in basis.iter().enumerate() {
            b[r + span - DEGREE] = *val;
        }
        let w = self.collocation.solve(&b).ok_or_else(|| {
            QhaError::Fit("singular spline collocation matrix".into())
        })?;
        Ok(w.iter().copied().collect())
    }

    /// interpolate `y`, sampled at the abscissae of `self`, at `v`
    pub fn eval(&self, y: &[f64], v: f64) -> Result<f64, QhaError> {
        if y.len() != self.x.len() {
            return Err(QhaError::Mismatch(format!(
                "{} values for {} interpolation points",
                y.len(),
                self.x.len()
            )));
        }
        Ok(self.weights(v)?.iter().zip(y).map(|(w, y)| w * y).sum())
    }
}

/// the knot span containing `u` and the values of the DEGREE + 1 basis
/// functions that are nonzero there. outside the knots the polynomial piece
/// of the nearest span is extended
fn basis(knots: &[f64], n: usize, u: f64) -> (usize, [f64; DEGREE + 1]) {
    let mut span = DEGREE;
    while span < n - 1 && u >= knots[span + 1] {
        span += 1;
    }
    let mut vals = [0.0; DEGREE + 1];
    let mut left = [0.0; DEGREE + 1];
    let mut right = [0.0; DEGREE + 1];
    vals[0] = 1.0;
    for j in 1..=DEGREE {
        left[j] = u - knots[span + 1 - j];
        right[j] = knots[span + j] - u;
        let mut saved = 0.0;
        for r in 0..j {
            let tmp = vals[r] / (right[r + 1] + left[j - r]);
            vals[r] = saved + right[r + 1] * tmp;
            saved = left[j - r] * tmp;
        }
        vals[j] = saved;
    }
    (span, vals)
}
