use nalgebra::DMatrix;

/// Upper bound on the spectral radius of `a`, via power iteration on `|a|`.
///
/// Every eigenvalue of `a` is bounded in magnitude by the Perron root of the
/// entrywise absolute matrix, and power iteration on a non-negative matrix
/// converges towards that root. Stops once the Rayleigh quotient moves by less
/// than `tol` relative to its size.
pub fn spectral_radius_bound(a: &DMatrix<f64>, max_iter: usize, tol: f64) -> f64 {
    let n = a.nrows();
    if n == 0 || a.ncols() != n {
        return 0.0;
    }
    let abs = a.abs();

    let mut x = nalgebra::DVector::from_element(n, 1.0 / n as f64);
    let mut lambda_old = 0.0;
    for _ in 0..max_iter {
        let y = &abs * &x;
        // Rayleigh quotient
        let den = x.norm_squared();
        let lambda = if den > 0.0 { y.dot(&x) / den } else { 0.0 };

        let norm = y.norm();
        if norm == 0.0 || !norm.is_finite() {
            return if norm == 0.0 { 0.0 } else { f64::INFINITY };
        }
        x = y / norm;

        if (lambda - lambda_old).abs() <= tol * lambda.max(1.0) {
            return lambda;
        }
        lambda_old = lambda;
    }
    lambda_old
}
