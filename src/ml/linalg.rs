//! Regularized least squares
//!
//! Solves `(XᵗX + λI) β = Xᵗy` through a Cholesky factorization instead of
//! forming an explicit inverse.

use nalgebra::{DMatrix, DVector};
use tracing::debug;

use crate::error::{CoreError, CoreResult};

/// Above this the normal matrix is treated as numerically singular
pub const MAX_CONDITION_NUMBER: f64 = 1e12;

/// Solve the ridge normal equations for `x` (rows = samples) and `y`.
///
/// `lambda` is added to every diagonal entry, the intercept column included.
/// Returns [`CoreError::Collinear`] when the regularized matrix is singular or
/// its condition number exceeds [`MAX_CONDITION_NUMBER`].
pub fn solve_regularized_normal_equations(
    x: &DMatrix<f64>,
    y: &DVector<f64>,
    lambda: f64,
) -> CoreResult<DVector<f64>> {
    if x.nrows() != y.len() {
        return Err(CoreError::InvalidConfig(format!(
            "design matrix has {} rows but target has {}",
            x.nrows(),
            y.len()
        )));
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) || !lambda.is_finite() {
        return Err(CoreError::NonFiniteInput);
    }

    let xt = x.transpose();
    let k = x.ncols();
    let normal = &xt * x + DMatrix::<f64>::identity(k, k) * lambda;
    let rhs = &xt * y;

    let eigenvalues = normal.clone().symmetric_eigenvalues();
    let max_eig = eigenvalues.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let min_eig = eigenvalues.iter().cloned().fold(f64::INFINITY, f64::min);
    let condition = if min_eig > 0.0 {
        max_eig / min_eig
    } else {
        f64::INFINITY
    };
    debug!(condition, lambda, columns = k, "normal equations conditioning");

    if !(condition <= MAX_CONDITION_NUMBER) {
        return Err(CoreError::Collinear { condition });
    }

    let cholesky = normal
        .cholesky()
        .ok_or(CoreError::Collinear { condition })?;
    Ok(cholesky.solve(&rhs))
}
