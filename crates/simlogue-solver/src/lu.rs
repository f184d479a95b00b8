//! Sparse LU factorisation and triangular solves.
//!
//! Left-looking (Gilbert–Peierls) LU over CSC storage. Pivoting is already
//! embedded in the row/column permutations handed to [`factor`], so the
//! elimination itself runs without swaps: for each column, a depth-first
//! search over the L structure finds the fill pattern in topological
//! order, then one sparse triangular solve produces the column of L and U.
//!
//! The factors keep L (unit lower, diagonal implicit) and U (upper,
//! diagonal split out) column-wise, ready for the per-step
//! forward/backward substitution.

use nalgebra::DVector;

use simlogue_core::mna::CscMatrix;

use crate::error::{Error, Result};

/// Relative zero threshold for pivots: a diagonal below this fraction of
/// its column's magnitude makes the matrix numerically singular.
const PIVOT_EPS: f64 = 1e-12;

/// LU factors of a permuted MNA matrix.
#[derive(Debug, Clone)]
pub struct LuFactors {
    size: usize,
    row_perm: Vec<usize>,
    col_perm: Vec<usize>,
    /// L: strictly-below-diagonal entries per column; unit diagonal implied.
    l_col_ptr: Vec<usize>,
    l_row_idx: Vec<usize>,
    l_values: Vec<f64>,
    /// U: strictly-above-diagonal entries per column.
    u_col_ptr: Vec<usize>,
    u_row_idx: Vec<usize>,
    u_values: Vec<f64>,
    u_diag: Vec<f64>,
}

/// Factorise `matrix` under the given permutations:
/// `L · U = A'` where `A'(k, l) = A(row_perm[k], col_perm[l])`.
pub fn factor(matrix: &CscMatrix, row_perm: &[usize], col_perm: &[usize]) -> Result<LuFactors> {
    let n = matrix.size();
    if row_perm.len() != n || col_perm.len() != n {
        return Err(Error::DimensionMismatch {
            expected: n,
            actual: row_perm.len().min(col_perm.len()),
        });
    }

    let a = matrix.permuted(row_perm, col_perm);

    let mut lu = LuFactors {
        size: n,
        row_perm: row_perm.to_vec(),
        col_perm: col_perm.to_vec(),
        l_col_ptr: vec![0],
        l_row_idx: Vec::new(),
        l_values: Vec::new(),
        u_col_ptr: vec![0],
        u_row_idx: Vec::new(),
        u_values: Vec::new(),
        u_diag: Vec::with_capacity(n),
    };

    // Workspaces reused across columns.
    let mut work = vec![0.0; n];
    let mut visited = vec![false; n];
    let mut postorder: Vec<usize> = Vec::new();
    let mut stack: Vec<(usize, usize)> = Vec::new();

    for j in 0..n {
        let (a_rows, a_vals) = a.col(j);

        // Symbolic phase: the fill pattern of column j is everything
        // reachable from A'(:, j) through the graph of L. Depth-first
        // search, recording a postorder so the numeric phase can run in
        // topological order.
        postorder.clear();
        for &root in a_rows {
            if visited[root] {
                continue;
            }
            stack.push((root, 0));
            visited[root] = true;
            while let Some(&(v, edge)) = stack.last() {
                // Vertices left of the current column expand into their L
                // column; the rest are leaves.
                let children: &[usize] = if v < j {
                    let lo = lu.l_col_ptr[v];
                    let hi = lu.l_col_ptr[v + 1];
                    &lu.l_row_idx[lo..hi]
                } else {
                    &[]
                };
                if edge < children.len() {
                    let child = children[edge];
                    stack.last_mut().expect("non-empty stack").1 = edge + 1;
                    if !visited[child] {
                        visited[child] = true;
                        stack.push((child, 0));
                    }
                } else {
                    postorder.push(v);
                    stack.pop();
                }
            }
        }

        // Numeric phase: scatter the column, then apply each reachable
        // column of L in topological (reverse postorder) order.
        for (&i, &v) in a_rows.iter().zip(a_vals) {
            work[i] = v;
        }
        for &k in postorder.iter().rev() {
            if k >= j {
                continue;
            }
            let ukj = work[k];
            if ukj == 0.0 {
                continue;
            }
            let lo = lu.l_col_ptr[k];
            let hi = lu.l_col_ptr[k + 1];
            for (idx, &i) in lu.l_row_idx[lo..hi].iter().enumerate() {
                work[i] -= lu.l_values[lo + idx] * ukj;
            }
        }

        let diag = if visited[j] { work[j] } else { 0.0 };
        let scale = postorder
            .iter()
            .map(|&v| work[v].abs())
            .fold(0.0, f64::max);
        if !diag.is_finite() || diag.abs() <= PIVOT_EPS * scale || diag == 0.0 {
            return Err(Error::SingularMatrix);
        }

        // Gather U (above diagonal), then L (below, scaled by the pivot).
        // Sorting keeps the factors in canonical CSC order.
        postorder.sort_unstable();
        for &v in &postorder {
            let value = work[v];
            if v < j {
                if value != 0.0 {
                    lu.u_row_idx.push(v);
                    lu.u_values.push(value);
                }
            } else if v > j && value != 0.0 {
                lu.l_row_idx.push(v);
                lu.l_values.push(value / diag);
            }
            work[v] = 0.0;
            visited[v] = false;
        }
        lu.u_diag.push(diag);
        lu.u_col_ptr.push(lu.u_row_idx.len());
        lu.l_col_ptr.push(lu.l_row_idx.len());
    }

    Ok(lu)
}

impl LuFactors {
    pub fn size(&self) -> usize {
        self.size
    }

    /// Stored entries across both factors, diagonal included.
    pub fn nnz(&self) -> usize {
        self.l_values.len() + self.u_values.len() + self.u_diag.len()
    }

    /// Solve `A x = b` using the embedded permutations: permute `b`,
    /// forward-substitute through L, back-substitute through U, and
    /// un-permute the result.
    pub fn solve(&self, b: &DVector<f64>) -> Result<DVector<f64>> {
        let n = self.size;
        if b.len() != n {
            return Err(Error::DimensionMismatch {
                expected: n,
                actual: b.len(),
            });
        }

        let mut y = DVector::zeros(n);
        for k in 0..n {
            y[k] = b[self.row_perm[k]];
        }

        // L y' = b' (unit diagonal, column-oriented updates).
        for j in 0..n {
            let yj = y[j];
            if yj == 0.0 {
                continue;
            }
            let lo = self.l_col_ptr[j];
            let hi = self.l_col_ptr[j + 1];
            for (idx, &i) in self.l_row_idx[lo..hi].iter().enumerate() {
                y[i] -= self.l_values[lo + idx] * yj;
            }
        }

        // U z = y'.
        for j in (0..n).rev() {
            let zj = y[j] / self.u_diag[j];
            y[j] = zj;
            if zj == 0.0 {
                continue;
            }
            let lo = self.u_col_ptr[j];
            let hi = self.u_col_ptr[j + 1];
            for (idx, &i) in self.u_row_idx[lo..hi].iter().enumerate() {
                y[i] -= self.u_values[lo + idx] * zj;
            }
        }

        let mut x = DVector::zeros(n);
        for k in 0..n {
            x[self.col_perm[k]] = y[k];
        }
        Ok(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pivot::fill_reducing;
    use nalgebra::dvector;

    fn identity_perm(n: usize) -> Vec<usize> {
        (0..n).collect()
    }

    fn solve_with_pivoting(m: &CscMatrix, b: &DVector<f64>) -> Result<DVector<f64>> {
        let (rp, cp) = fill_reducing(m);
        factor(m, &rp, &cp)?.solve(b)
    }

    #[test]
    fn test_diagonal_solve() {
        let m = CscMatrix::from_triplets(3, &[(0, 0, 2.0), (1, 1, 4.0), (2, 2, 8.0)]);
        let p = identity_perm(3);
        let lu = factor(&m, &p, &p).unwrap();
        let x = lu.solve(&dvector![2.0, 8.0, 32.0]).unwrap();
        assert_eq!(x, dvector![1.0, 2.0, 4.0]);
    }

    #[test]
    fn test_dense_2x2() {
        // 2x + y = 5, x + 3y = 6 -> x = 1.8, y = 1.4
        let m = CscMatrix::from_triplets(2, &[(0, 0, 2.0), (0, 1, 1.0), (1, 0, 1.0), (1, 1, 3.0)]);
        let x = solve_with_pivoting(&m, &dvector![5.0, 6.0]).unwrap();
        assert!((x[0] - 1.8).abs() < 1e-12);
        assert!((x[1] - 1.4).abs() < 1e-12);
    }

    #[test]
    fn test_needs_permutation() {
        // Zero diagonal: un-permuted elimination would divide by zero.
        let m = CscMatrix::from_triplets(2, &[(0, 1, 2.0), (1, 0, 3.0)]);
        let p = identity_perm(2);
        assert!(matches!(factor(&m, &p, &p), Err(Error::SingularMatrix)));

        let x = solve_with_pivoting(&m, &dvector![4.0, 6.0]).unwrap();
        assert!((x[0] - 2.0).abs() < 1e-12);
        assert!((x[1] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_fill_in_is_carried() {
        // Tridiagonal times tridiagonal style system where elimination
        // produces fill outside the original pattern.
        let m = CscMatrix::from_triplets(
            4,
            &[
                (0, 0, 4.0),
                (0, 3, 1.0),
                (1, 0, 1.0),
                (1, 1, 4.0),
                (2, 1, 1.0),
                (2, 2, 4.0),
                (3, 0, 1.0),
                (3, 2, 1.0),
                (3, 3, 4.0),
            ],
        );
        let b = dvector![1.0, 2.0, 3.0, 4.0];
        let x = solve_with_pivoting(&m, &b).unwrap();
        let residual = (m.mul_vec(&x) - &b).norm() / b.norm();
        assert!(residual <= 1e-10, "residual {residual}");
    }

    #[test]
    fn test_singular_rank_deficient() {
        let m = CscMatrix::from_triplets(2, &[(0, 0, 1.0), (0, 1, 2.0), (1, 0, 2.0), (1, 1, 4.0)]);
        let (rp, cp) = fill_reducing(&m);
        assert!(matches!(factor(&m, &rp, &cp), Err(Error::SingularMatrix)));
    }

    #[test]
    fn test_singular_empty_column() {
        let m = CscMatrix::from_triplets(2, &[(0, 0, 1.0)]);
        let (rp, cp) = fill_reducing(&m);
        assert!(matches!(factor(&m, &rp, &cp), Err(Error::SingularMatrix)));
    }

    #[test]
    fn test_solve_dimension_mismatch() {
        let m = CscMatrix::from_triplets(2, &[(0, 0, 1.0), (1, 1, 1.0)]);
        let p = identity_perm(2);
        let lu = factor(&m, &p, &p).unwrap();
        let err = lu.solve(&dvector![1.0, 2.0, 3.0]).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { .. }));
    }

    #[test]
    fn test_ladder_residual() {
        // A resistor-ladder-shaped system: diagonally dominant
        // tridiagonal, n = 50.
        let n = 50;
        let mut triplets = Vec::new();
        for i in 0..n {
            triplets.push((i, i, 3.0));
            if i > 0 {
                triplets.push((i, i - 1, -1.0));
            }
            if i + 1 < n {
                triplets.push((i, i + 1, -1.0));
            }
        }
        let m = CscMatrix::from_triplets(n, &triplets);
        let b = DVector::from_fn(n, |i, _| (i % 7) as f64 - 3.0);

        let x = solve_with_pivoting(&m, &b).unwrap();
        let residual = (m.mul_vec(&x) - &b).norm() / b.norm();
        assert!(residual <= 1e-10, "residual {residual}");
    }

    #[test]
    fn test_permute_unpermute_roundtrip() {
        // Solving with any valid permutation must give the same x.
        let m = CscMatrix::from_triplets(
            3,
            &[
                (0, 0, 5.0),
                (0, 1, 1.0),
                (1, 0, 1.0),
                (1, 1, 5.0),
                (1, 2, 1.0),
                (2, 1, 1.0),
                (2, 2, 5.0),
            ],
        );
        let b = dvector![1.0, -2.0, 3.0];
        let plain = factor(&m, &identity_perm(3), &identity_perm(3))
            .unwrap()
            .solve(&b)
            .unwrap();
        let permuted = factor(&m, &[2, 0, 1], &[1, 2, 0]).unwrap().solve(&b).unwrap();
        assert!((plain - permuted).norm() < 1e-12);
    }
}
