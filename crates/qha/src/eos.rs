//! the Vinet equation of state and its least-squares fit

use serde::{Deserialize, Serialize};

use crate::{Dmat, Dvec, QhaError, solve_normal};

const MAX_ITER: usize = 500;
const TOL: f64 = 1e-12;

/// Vinet equation of state parameters. energies are in eV, volumes in Å³,
/// and the bulk modulus in eV/Å³
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Vinet {
    pub e0: f64,
    pub b0: f64,
    pub bp: f64,
    pub v0: f64,
}

impl Vinet {
    fn xi(&self) -> f64 {
        1.5 * (self.bp - 1.0)
    }

    pub fn energy(&self, v: f64) -> f64 {
        let xi = self.xi();
        let y = 1.0 - (v / self.v0).cbrt();
        let g = 1.0 + (xi * y - 1.0) * (xi * y).exp();
        self.e0 + 9.0 * self.b0 * self.v0 / (xi * xi) * g
    }

    /// `P = -dE/dV` in eV/Å³
    pub fn pressure(&self, v: f64) -> f64 {
        let x = (v / self.v0).cbrt();
        3.0 * self.b0 * (1.0 - x) / (x * x) * (self.xi() * (1.0 - x)).exp()
    }

    /// derivatives of the energy at `v` with respect to e0, b0, bp, and v0
    fn gradient(&self, v: f64) -> [f64; 4] {
        let xi = self.xi();
        let x = (v / self.v0).cbrt();
        let y = 1.0 - x;
        let e = (xi * y).exp();
        let g = 1.0 + (xi * y - 1.0) * e;
        let c = 9.0 * self.b0 * self.v0;
        [
            1.0,
            9.0 * self.v0 * g / (xi * xi),
            1.5 * c * (y * y * e / xi - 2.0 * g / (xi * xi * xi)),
            9.0 * self.b0 * g / (xi * xi) + 3.0 * self.b0 * x * y * e,
        ]
    }

    fn from_params(p: &[f64], bp: Option<f64>) -> Self {
        match bp {
            Some(bp) => Self {
                e0: p[0],
                b0: p[1],
                bp,
                v0: p[2],
            },
            None => Self {
                e0: p[0],
                b0: p[1],
                bp: p[2],
                v0: p[3],
            },
        }
    }

    fn params(&self, fixed: bool) -> Vec<f64> {
        if fixed {
            vec![self.e0, self.b0, self.v0]
        } else {
            vec![self.e0, self.b0, self.bp, self.v0]
        }
    }

    fn is_valid(&self) -> bool {
        [self.e0, self.b0, self.bp, self.v0].iter().all(|x| x.is_finite())
            && self.v0 > 0.0
            && self.b0 > 0.0
            && (self.bp - 1.0).abs() > 1e-8
    }
}

/// least-squares parabola through `(x, y)` as `[c0, c1, c2]`
fn quadratic_fit(x: &[f64], y: &[f64]) -> Option<[f64; 3]> {
    let n = x.len();
    let a = Dmat::from_fn(n, 3, |i, j| x[i].powi(j as i32));
    let at = a.transpose();
    let b = solve_normal(&at * &a, &(&at * Dvec::from_column_slice(y)))?;
    Some([b[0], b[1], b[2]])
}

/// the starting point for the Vinet fit from a parabola through the data
fn initial_guess(volumes: &[f64], energies: &[f64]) -> Result<Vinet, QhaError> {
    let [c0, c1, c2] = quadratic_fit(volumes, energies)
        .ok_or_else(|| QhaError::Fit("singular quadratic fit".into()))?;
    if c2 <= 0.0 {
        return Err(QhaError::Fit("energies are not convex in volume".into()));
    }
    let v0 = -c1 / (2.0 * c2);
    Ok(Vinet {
        e0: c0 + c1 * v0 + c2 * v0 * v0,
        b0: 2.0 * c2 * v0,
        bp: 4.0,
        v0,
    })
}

fn cost(eos: &Vinet, volumes: &[f64], energies: &[f64]) -> f64 {
    volumes
        .iter()
        .zip(energies)
        .map(|(v, e)| (eos.energy(*v) - e).powi(2))
        .sum()
}

/// fit the Vinet equation of state to `(volumes, energies)` by
/// Levenberg-Marquardt. `fixed_bp` holds the pressure derivative of the bulk
/// modulus constant, which is needed when there are only three points
pub fn fit_vinet(
    volumes: &[f64],
    energies: &[f64],
    fixed_bp: Option<f64>,
) -> Result<Vinet, QhaError> {
    let nparams = if fixed_bp.is_some() { 3 } else { 4 };
    if volumes.len() != energies.len() {
        return Err(QhaError::Mismatch(format!(
            "{} volumes and {} energies",
            volumes.len(),
            energies.len()
        )));
    }
    if volumes.len() < nparams {
        return Err(QhaError::TooFewPoints {
            need: nparams,
            got: volumes.len(),
        });
    }
    let mut eos = initial_guess(volumes, energies)?;
    if let Some(bp) = fixed_bp {
        eos.bp = bp;
    }
    let mut lambda = 1e-3;
    let mut current = cost(&eos, volumes, energies);
    for iter in 0..MAX_ITER {
        let p = eos.params(fixed_bp.is_some());
        let m = volumes.len();
        let mut jac = Dmat::zeros(m, nparams);
        let mut resid = Dvec::zeros(m);
        for (i, (v, e)) in volumes.iter().zip(energies).enumerate() {
            let g = eos.gradient(*v);
            let g: Vec<f64> = if fixed_bp.is_some() {
                vec![g[0], g[1], g[3]]
            } else {
                g.to_vec()
            };
            for (j, gj) in g.iter().enumerate() {
                jac[(i, j)] = *gj;
            }
            resid[i] = eos.energy(*v) - e;
        }
        let jt = jac.transpose();
        let jtj = &jt * &jac;
        let grad = &jt * &resid;
        let mut step_taken = false;
        while lambda < 1e16 {
            let mut a = jtj.clone();
            for k in 0..nparams {
                a[(k, k)] += lambda * jtj[(k, k)].max(1e-30);
            }
            let Some(delta) = solve_normal(a, &(-&grad)) else {
                lambda *= 10.0;
                continue;
            };
            let trial: Vec<f64> =
                p.iter().zip(delta.iter()).map(|(a, b)| a + b).collect();
            let cand = Vinet::from_params(&trial, fixed_bp);
            let c = if cand.is_valid() {
                cost(&cand, volumes, energies)
            } else {
                f64::INFINITY
            };
            if c <= current {
                let rel = delta
                    .iter()
                    .zip(&p)
                    .map(|(d, p)| (d / p.abs().max(1e-12)).abs())
                    .fold(0.0, f64::max);
                let improvement = current - c;
                eos = cand;
                current = c;
                lambda = (lambda / 10.0).max(1e-15);
                step_taken = true;
                if rel < TOL || improvement <= TOL * TOL * current.max(1e-300) {
                    log::trace!("vinet fit converged after {iter} iterations");
                    return Ok(eos);
                }
                break;
            }
            lambda *= 10.0;
        }
        if !step_taken {
            // no downhill step exists, so this is the minimum
            log::trace!("vinet fit stalled after {iter} iterations");
            break;
        }
    }
    if !eos.is_valid() {
        return Err(QhaError::Fit(format!("invalid parameters {eos:?}")));
    }
    Ok(eos)
}
