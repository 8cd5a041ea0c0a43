//! Small dense least-squares solver for the regression-based estimators.

/// Pivots smaller than this (relative to the largest diagonal entry) mark the
/// system as singular.
const SINGULAR_TOLERANCE: f64 = 1e-10;

/// Solve `min ||X b - y||²` through the normal equations.
///
/// Returns `None` when `X'X` is singular or the solution is not finite.
pub fn least_squares(rows: &[Vec<f64>], y: &[f64]) -> Option<Vec<f64>> {
    let k = rows.first()?.len();
    if k == 0 || rows.len() != y.len() || rows.len() < k {
        return None;
    }

    let mut xtx = vec![vec![0.0; k]; k];
    let mut xty = vec![0.0; k];
    for (row, &target) in rows.iter().zip(y) {
        for i in 0..k {
            xty[i] += row[i] * target;
            for j in i..k {
                xtx[i][j] += row[i] * row[j];
            }
        }
    }
    for i in 0..k {
        for j in 0..i {
            xtx[i][j] = xtx[j][i];
        }
    }

    solve(xtx, xty)
}

/// Gaussian elimination with partial pivoting.
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    let scale = (0..n).map(|i| a[i][i].abs()).fold(0.0, f64::max).max(1.0);

    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < SINGULAR_TOLERANCE * scale {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in (col + 1)..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = ((row + 1)..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }

    x.iter().all(|v| v.is_finite()).then_some(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovers_exact_linear_relation() {
        // y = 2 + 3x
        let rows: Vec<Vec<f64>> = (0..6).map(|x| vec![1.0, x as f64]).collect();
        let y: Vec<f64> = (0..6).map(|x| 2.0 + 3.0 * x as f64).collect();
        let b = least_squares(&rows, &y).unwrap();
        assert!((b[0] - 2.0).abs() < 1e-9);
        assert!((b[1] - 3.0).abs() < 1e-9);
    }

    #[test]
    fn collinear_columns_are_singular() {
        let rows: Vec<Vec<f64>> = (0..5).map(|x| vec![x as f64, 2.0 * x as f64]).collect();
        let y = vec![1.0; 5];
        assert!(least_squares(&rows, &y).is_none());
    }

    #[test]
    fn underdetermined_is_rejected() {
        let rows = vec![vec![1.0, 2.0, 3.0]];
        assert!(least_squares(&rows, &[1.0]).is_none());
    }
}
