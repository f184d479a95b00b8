//! Sparse MNA matrix storage.
//!
//! The MNA coefficient matrix is stored in compressed sparse column (CSC)
//! form. Its nonzero *pattern* is fixed once, when the circuit is
//! assembled, from the union of every device's structural entries; the
//! *values* are rewritten in place whenever devices re-stamp. Keeping the
//! two phases apart makes per-step stamping O(log nnz) per entry with no
//! hashing and no allocation.

use std::collections::BTreeSet;

use nalgebra::DVector;

/// A square sparse matrix in compressed sparse column form.
///
/// `col_ptr[j]..col_ptr[j + 1]` delimits column `j` in `row_idx`/`values`;
/// row indices are strictly increasing within a column.
#[derive(Debug, Clone)]
pub struct CscMatrix {
    size: usize,
    col_ptr: Vec<usize>,
    row_idx: Vec<usize>,
    values: Vec<f64>,
}

impl CscMatrix {
    /// Build the matrix pattern from structural (row, col) entries.
    ///
    /// Duplicate positions are coalesced. All values start at zero; use
    /// [`CscMatrix::add`] to stamp numbers in.
    pub fn from_pattern(size: usize, entries: &[(usize, usize)]) -> Self {
        let mut positions: BTreeSet<(usize, usize)> = BTreeSet::new();
        for &(row, col) in entries {
            debug_assert!(row < size && col < size);
            positions.insert((col, row));
        }

        let mut col_ptr = vec![0; size + 1];
        let mut row_idx = Vec::with_capacity(positions.len());

        let mut current_col = 0;
        for &(col, row) in &positions {
            while current_col <= col {
                col_ptr[current_col] = row_idx.len();
                current_col += 1;
            }
            row_idx.push(row);
        }
        while current_col <= size {
            col_ptr[current_col] = row_idx.len();
            current_col += 1;
        }

        let values = vec![0.0; row_idx.len()];
        Self {
            size,
            col_ptr,
            row_idx,
            values,
        }
    }

    /// Build a matrix from (row, col, value) triplets, summing duplicates.
    pub fn from_triplets(size: usize, triplets: &[(usize, usize, f64)]) -> Self {
        let pattern: Vec<(usize, usize)> = triplets.iter().map(|&(r, c, _)| (r, c)).collect();
        let mut matrix = Self::from_pattern(size, &pattern);
        for &(row, col, value) in triplets {
            matrix.add(row, col, value);
        }
        matrix
    }

    /// Matrix dimension (the matrix is square).
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.row_idx.len()
    }

    /// Zero every stored value without touching the pattern.
    pub fn reset_values(&mut self) {
        self.values.fill(0.0);
    }

    /// Position of (row, col) in the value array, if it is in the pattern.
    fn position(&self, row: usize, col: usize) -> Option<usize> {
        let lo = self.col_ptr[col];
        let hi = self.col_ptr[col + 1];
        self.row_idx[lo..hi]
            .binary_search(&row)
            .ok()
            .map(|offset| lo + offset)
    }

    /// Add `value` to the entry at (row, col).
    ///
    /// The position must be part of the pattern fixed at construction;
    /// stamping outside it is a programming error and panics.
    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        match self.position(row, col) {
            Some(pos) => self.values[pos] += value,
            None => panic!("stamp at ({row}, {col}) outside the matrix pattern"),
        }
    }

    /// Value at (row, col); zero for positions outside the pattern.
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.position(row, col)
            .map(|pos| self.values[pos])
            .unwrap_or(0.0)
    }

    /// Row indices and values of column `j`.
    pub fn col(&self, j: usize) -> (&[usize], &[f64]) {
        let lo = self.col_ptr[j];
        let hi = self.col_ptr[j + 1];
        (&self.row_idx[lo..hi], &self.values[lo..hi])
    }

    /// The matrix with rows and columns reordered.
    ///
    /// `row_perm[k]` / `col_perm[k]` name the original row/column placed at
    /// position `k`, so `out(k, l) == self(row_perm[k], col_perm[l])`.
    pub fn permuted(&self, row_perm: &[usize], col_perm: &[usize]) -> CscMatrix {
        assert_eq!(row_perm.len(), self.size);
        assert_eq!(col_perm.len(), self.size);

        let mut inv_row = vec![0; self.size];
        for (new, &old) in row_perm.iter().enumerate() {
            inv_row[old] = new;
        }

        let mut col_ptr = Vec::with_capacity(self.size + 1);
        let mut row_idx = Vec::with_capacity(self.nnz());
        let mut values = Vec::with_capacity(self.nnz());
        let mut scratch: Vec<(usize, f64)> = Vec::new();

        col_ptr.push(0);
        for &old_col in col_perm {
            let (rows, vals) = self.col(old_col);
            scratch.clear();
            scratch.extend(rows.iter().zip(vals).map(|(&r, &v)| (inv_row[r], v)));
            scratch.sort_unstable_by_key(|&(r, _)| r);
            for &(r, v) in &scratch {
                row_idx.push(r);
                values.push(v);
            }
            col_ptr.push(row_idx.len());
        }

        CscMatrix {
            size: self.size,
            col_ptr,
            row_idx,
            values,
        }
    }

    /// Compute `A * x`.
    pub fn mul_vec(&self, x: &DVector<f64>) -> DVector<f64> {
        assert_eq!(x.len(), self.size);
        let mut y = DVector::zeros(self.size);
        for j in 0..self.size {
            let (rows, vals) = self.col(j);
            let xj = x[j];
            for (&i, &v) in rows.iter().zip(vals) {
                y[i] += v * xj;
            }
        }
        y
    }
}
