//! Conjugate gradient on the seven-point Laplacian stencil.
//!
//! The system is `A x = b` with `A = 6I - (active face neighbours)`, the
//! negated discrete Laplacian scaled by `h^2`. It is symmetric positive
//! definite as long as some cell touches a fixed value.
//!
//! ```text
//! 1. r_0 = b - A * x_0
//! 2. p_0 = r_0
//! 3. For k = 0, 1, 2, ...:
//!    α_k = (r_k · r_k) / (p_k · A * p_k)
//!    x_{k+1} = x_k + α_k * p_k
//!    r_{k+1} = r_k - α_k * A * p_k
//!    β_k = (r_{k+1} · r_{k+1}) / (r_k · r_k)
//!    p_{k+1} = r_{k+1} + β_k * p_k
//! ```

use nalgebra::DVector;
use rayon::prelude::*;

/// Marker for a neighbour that is not an unknown of the system.
pub(crate) const FIXED: u32 = u32::MAX;

/// Stencil system over the active cells of one level.
#[derive(Debug, Clone)]
pub(crate) struct StencilSystem {
    /// Indices of the six face neighbours, or [`FIXED`].
    pub neighbors: Vec<[u32; 6]>,
    /// Right-hand side with fixed neighbour values folded in.
    pub rhs: DVector<f64>,
}

/// Outcome of a CG run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct CgReport {
    pub iterations: usize,
    /// Final `||r|| / ||b||`.
    pub relative_residual: f64,
    pub converged: bool,
}

impl StencilSystem {
    fn apply(&self, x: &DVector<f64>, out: &mut DVector<f64>) {
        let xs = x.as_slice();
        out.as_mut_slice()
            .par_iter_mut()
            .zip(self.neighbors.par_iter())
            .enumerate()
            .for_each(|(i, (o, nbrs))| {
                let mut sum = 6.0 * xs[i];
                for &n in nbrs {
                    if n != FIXED {
                        sum -= xs[n as usize];
                    }
                }
                *o = sum;
            });
    }

    /// Solves in place from the initial guess in `x`.
    pub fn solve(&self, x: &mut DVector<f64>, max_iterations: usize, tolerance: f64) -> CgReport {
        let n = self.rhs.len();
        let mut ap = DVector::zeros(n);

        self.apply(x, &mut ap);
        let mut r = &self.rhs - &ap;

        let b_norm = self.rhs.norm().max(1e-15);
        let mut r_dot_r = r.dot(&r);
        if r_dot_r.sqrt() / b_norm < tolerance {
            return CgReport {
                iterations: 0,
                relative_residual: r_dot_r.sqrt() / b_norm,
                converged: true,
            };
        }

        let mut p = r.clone();
        let mut iterations = 0;
        let mut converged = false;

        for k in 0..max_iterations {
            iterations = k + 1;

            self.apply(&p, &mut ap);
            let p_dot_ap = p.dot(&ap);
            if p_dot_ap.abs() < 1e-30 {
                break;
            }
            let alpha = r_dot_r / p_dot_ap;

            x.axpy(alpha, &p, 1.0);
            r.axpy(-alpha, &ap, 1.0);

            let r_dot_r_new = r.dot(&r);
            if r_dot_r_new.sqrt() / b_norm < tolerance {
                r_dot_r = r_dot_r_new;
                converged = true;
                break;
            }

            let beta = r_dot_r_new / r_dot_r.max(1e-30);
            r_dot_r = r_dot_r_new;
            p.axpy(1.0, &r, beta);
        }

        CgReport {
            iterations,
            relative_residual: r_dot_r.sqrt() / b_norm,
            converged,
        }
    }
}
