//! Least-squares cubic B-splines on `[0, 1]` with clamped knot vectors.

use nalgebra::{DMatrix, DVector};

pub const CUBIC: usize = 3;

#[derive(Debug, Clone)]
pub struct Spline {
    degree: usize,
    knots: Vec<f64>,
    coefs: Vec<f64>,
}

impl Spline {
    /// Fit a spline of the given degree through `(x, y)` in the least-squares
    /// sense. Interior knots must lie strictly inside `(0, 1)` in increasing
    /// order.
    ///
    /// Returns `None` when the inputs are inconsistent, there are fewer
    /// samples than basis functions, or the solve does not give finite
    /// coefficients.
    pub fn fit(x: &[f64], y: &[f64], interior: &[f64], degree: usize) -> Option<Self> {
        if x.len() != y.len() {
            return None;
        }
        if interior.windows(2).any(|w| w[0] >= w[1])
            || interior.iter().any(|&t| !(t > 0.0 && t < 1.0))
        {
            return None;
        }

        let knots = clamped_knots(interior, degree);
        let n_basis = knots.len() - degree - 1;
        if x.len() < n_basis {
            return None;
        }

        let mut design = DMatrix::zeros(x.len(), n_basis);
        for (i_row, &xi) in x.iter().enumerate() {
            let span = find_span(&knots, n_basis, degree, xi);
            let vals = basis_funs(&knots, span, degree, xi);
            for (r, val) in vals.into_iter().enumerate() {
                design[(i_row, span - degree + r)] = val;
            }
        }
        let rhs = DVector::from_column_slice(y);

        let coefs = solve_least_squares(&design, &rhs)?;
        Some(Self {
            degree,
            knots,
            coefs: coefs.iter().copied().collect(),
        })
    }

    pub fn eval(&self, x: f64) -> f64 {
        let n_basis = self.coefs.len();
        let span = find_span(&self.knots, n_basis, self.degree, x);
        basis_funs(&self.knots, span, self.degree, x)
            .into_iter()
            .enumerate()
            .map(|(r, val)| val * self.coefs[span - self.degree + r])
            .sum()
    }

    pub fn n_coefs(&self) -> usize {
        self.coefs.len()
    }
}

fn clamped_knots(interior: &[f64], degree: usize) -> Vec<f64> {
    let mut knots = Vec::with_capacity(interior.len() + 2 * (degree + 1));
    knots.extend(std::iter::repeat_n(0.0, degree + 1));
    knots.extend_from_slice(interior);
    knots.extend(std::iter::repeat_n(1.0, degree + 1));
    knots
}

/// Index `i` of the knot interval `[t_i, t_{i+1})` containing `x`, clamped to
/// the valid range so that the right boundary belongs to the last interval.
fn find_span(knots: &[f64], n_basis: usize, degree: usize, x: f64) -> usize {
    if x >= knots[n_basis] {
        return n_basis - 1;
    }
    if x <= knots[degree] {
        return degree;
    }
    let mut span = degree;
    while span + 1 < n_basis && knots[span + 1] <= x {
        span += 1;
    }
    span
}

/// Values of the `degree + 1` basis functions that are non-zero on `span`
/// (Cox-de Boor recursion).
fn basis_funs(knots: &[f64], span: usize, degree: usize, x: f64) -> Vec<f64> {
    let mut vals = vec![0.0; degree + 1];
    let mut left = vec![0.0; degree + 1];
    let mut right = vec![0.0; degree + 1];
    vals[0] = 1.0;
    for j in 1..=degree {
        left[j] = x - knots[span + 1 - j];
        right[j] = knots[span + j] - x;
        let mut saved = 0.0;
        for r in 0..j {
            let denom = right[r + 1] + left[j - r];
            let temp = if denom != 0.0 { vals[r] / denom } else { 0.0 };
            vals[r] = saved + right[r + 1] * temp;
            saved = left[j - r] * temp;
        }
        vals[j] = saved;
    }
    vals
}

/// Solve a least squares problem using SVD, loosening the singular value
/// tolerance until a finite solution appears.
fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);
    for &tol in &[1e-12, 1e-10, 1e-8] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }
    None
}
