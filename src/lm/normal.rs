//! Normal equations of the Levenberg-Marquardt step.
//!
//! The step δ solves `(JᵀJ + λ·diag(JᵀJ)) δ = Jᵀr`, restricted to the free
//! parameter columns. The system is solved with a Cholesky factorization; a
//! failed factorization is reported as `None` so the caller can raise λ.

use ndarray::{Array1, Array2};

/// Smallest diagonal scale used for the Marquardt damping term.
///
/// Keeps a column with a vanishing derivative from turning the damped system
/// singular.
const MIN_DIAGONAL: f64 = 1e-10;

/// `JᵀJ` and `Jᵀr` over the free parameter columns.
#[derive(Debug, Clone)]
pub struct NormalEquations {
    /// The approximate Hessian `JᵀJ`
    pub jtj: Array2<f64>,

    /// The gradient term `Jᵀr`
    pub jtr: Array1<f64>,
}

impl NormalEquations {
    /// Zeroed equations for `free` parameters.
    pub fn zeros(free: usize) -> Self {
        Self {
            jtj: Array2::zeros((free, free)),
            jtr: Array1::zeros(free),
        }
    }

    /// Number of free parameters.
    pub fn dim(&self) -> usize {
        self.jtr.len()
    }

    /// Resets every entry to zero.
    pub fn clear(&mut self) {
        self.jtj.fill(0.0);
        self.jtr.fill(0.0);
    }

    /// Builds the equations from a dense Jacobian (`samples × free`) and the
    /// residual vector.
    pub fn assign_from(&mut self, jacobian: &Array2<f64>, residuals: &Array1<f64>) {
        self.jtj.assign(&jacobian.t().dot(jacobian));
        self.jtr.assign(&jacobian.t().dot(residuals));
    }

    /// Copies the upper triangle of `JᵀJ` into the lower one.
    pub fn symmetrize(&mut self) {
        let n = self.dim();
        for i in 0..n {
            for j in 0..i {
                self.jtj[[i, j]] = self.jtj[[j, i]];
            }
        }
    }

    /// Solves the damped system for the step over the free parameters.
    ///
    /// Returns `None` if the damped matrix is not positive definite or the
    /// step is not finite.
    pub fn solve(&self, lambda: f64) -> Option<Array1<f64>> {
        let mut a = self.jtj.clone();
        for i in 0..a.nrows() {
            a[[i, i]] += lambda * a[[i, i]].max(MIN_DIAGONAL);
        }

        let step = cholesky_solve(a, &self.jtr)?;
        step.iter().all(|v| v.is_finite()).then_some(step)
    }
}

/// Solves `A x = b` for a symmetric positive definite `A`.
///
/// Factorizes `A = L Lᵀ` in place (lower triangle), then runs forward and
/// backward substitution.
fn cholesky_solve(mut a: Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();

    for k in 0..n {
        // Diagonal element
        for j in 0..k {
            a[[k, k]] -= a[[k, j]] * a[[k, j]];
        }

        if !(a[[k, k]] > 0.0) {
            return None;
        }

        let akk_sqrt = a[[k, k]].sqrt();
        a[[k, k]] = akk_sqrt;

        // Update column elements
        for i in k + 1..n {
            for j in 0..k {
                a[[i, k]] -= a[[i, j]] * a[[k, j]];
            }
            a[[i, k]] /= akk_sqrt;
        }
    }

    // Forward substitution (L * y = b)
    let mut y = b.clone();
    for i in 0..n {
        for j in 0..i {
            y[i] -= a[[i, j]] * y[j];
        }
        y[i] /= a[[i, i]];
    }

    // Backward substitution (L^T * x = y)
    let mut x = Array1::zeros(n);
    for i in (0..n).rev() {
        x[i] = y[i];
        for j in (i + 1)..n {
            x[i] -= a[[j, i]] * x[j];
        }
        x[i] /= a[[i, i]];
    }

    Some(x)
}
