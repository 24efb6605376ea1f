//! System matrices consumed by the solver.
//!
//! The solver only needs indexed element reads and one matrix-vector
//! product per iteration, so it is generic over [`SystemMatrix`].
//! [`CsrMatrix`] is what the implicit integrator assembles each step;
//! [`DenseMatrix`] is convenient for small hand-built systems.

use crate::error::{check_len, SimError, SimResult};

/// Square matrix operations required by the constrained solver.
pub trait SystemMatrix {
    /// Number of rows (== number of columns).
    fn dim(&self) -> usize;

    /// Element at `(row, col)`; structural zeros read as `0.0`.
    fn get(&self, row: usize, col: usize) -> f64;

    /// Diagonal element. Implementations should make this O(1).
    fn diagonal(&self, i: usize) -> f64 {
        self.get(i, i)
    }

    /// `out = self * x`. Both slices must be `dim()` long.
    fn mul_vec(&self, x: &[f64], out: &mut [f64]);
}

/// Compressed Sparse Row matrix.
///
/// Read-only once built, so the cached diagonal always matches the entries.
#[derive(Debug, Clone, PartialEq)]
pub struct CsrMatrix {
    dim: usize,
    /// `row_ptr[i]..row_ptr[i+1]` indexes row `i` in `col_idx`/`values`.
    row_ptr: Vec<usize>,
    /// Column indices, sorted and unique within each row.
    col_idx: Vec<usize>,
    values: Vec<f64>,
    /// Cached diagonal, one entry per row.
    diag: Vec<f64>,
}

impl CsrMatrix {
    /// Builds a `dim × dim` matrix from `(row, col, value)` triplets.
    ///
    /// Duplicate entries are summed. Fails if any index is out of range.
    pub fn from_triplets(dim: usize, triplets: &[(usize, usize, f64)]) -> SimResult<Self> {
        for &(r, c, _) in triplets {
            if r >= dim || c >= dim {
                return Err(SimError::DimensionMismatch {
                    what: "triplet index bound",
                    expected: dim,
                    actual: r.max(c) + 1,
                });
            }
        }
        Ok(Self::assemble(dim, triplets))
    }

    fn assemble(dim: usize, triplets: &[(usize, usize, f64)]) -> Self {
        let mut row_counts = vec![0usize; dim];
        for &(r, _, _) in triplets {
            row_counts[r] += 1;
        }

        let mut row_start = vec![0usize; dim + 1];
        for i in 0..dim {
            row_start[i + 1] = row_start[i] + row_counts[i];
        }

        let mut cols = vec![0usize; triplets.len()];
        let mut vals = vec![0.0f64; triplets.len()];
        let mut cursor = row_start[..dim].to_vec();
        for &(r, c, v) in triplets {
            cols[cursor[r]] = c;
            vals[cursor[r]] = v;
            cursor[r] += 1;
        }

        // Sort each row by column, then merge duplicates.
        let mut row_ptr = Vec::with_capacity(dim + 1);
        let mut col_idx = Vec::with_capacity(triplets.len());
        let mut values = Vec::with_capacity(triplets.len());
        let mut diag = vec![0.0; dim];
        row_ptr.push(0);
        let mut entries: Vec<(usize, f64)> = Vec::new();
        for i in 0..dim {
            entries.clear();
            entries.extend(
                cols[row_start[i]..row_start[i + 1]]
                    .iter()
                    .copied()
                    .zip(vals[row_start[i]..row_start[i + 1]].iter().copied()),
            );
            entries.sort_by_key(|&(c, _)| c);

            for &(c, v) in &entries {
                match col_idx.last() {
                    Some(&last) if last == c && col_idx.len() > row_ptr[i] => {
                        if let Some(acc) = values.last_mut() {
                            *acc += v;
                        }
                    }
                    _ => {
                        col_idx.push(c);
                        values.push(v);
                    }
                }
            }
            row_ptr.push(col_idx.len());

            for k in row_ptr[i]..row_ptr[i + 1] {
                if col_idx[k] == i {
                    diag[i] = values[k];
                }
            }
        }

        Self {
            dim,
            row_ptr,
            col_idx,
            values,
            diag,
        }
    }

    /// Returns the number of stored entries.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Row offsets, `dim + 1` long.
    pub fn row_ptr(&self) -> &[usize] {
        &self.row_ptr
    }

    pub fn col_idx(&self) -> &[usize] {
        &self.col_idx
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

impl SystemMatrix for CsrMatrix {
    fn dim(&self) -> usize {
        self.dim
    }

    fn get(&self, row: usize, col: usize) -> f64 {
        if row >= self.dim {
            return 0.0;
        }
        let start = self.row_ptr[row];
        let end = self.row_ptr[row + 1];
        match self.col_idx[start..end].binary_search(&col) {
            Ok(k) => self.values[start + k],
            Err(_) => 0.0,
        }
    }

    fn diagonal(&self, i: usize) -> f64 {
        self.diag[i]
    }

    fn mul_vec(&self, x: &[f64], out: &mut [f64]) {
        for (row, o) in out.iter_mut().enumerate().take(self.dim) {
            let mut acc = 0.0;
            for k in self.row_ptr[row]..self.row_ptr[row + 1] {
                acc += self.values[k] * x[self.col_idx[k]];
            }
            *o = acc;
        }
    }
}

/// Row-major dense square matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseMatrix {
    dim: usize,
    data: Vec<f64>,
}

impl DenseMatrix {
    pub fn zeros(dim: usize) -> Self {
        Self {
            dim,
            data: vec![0.0; dim * dim],
        }
    }

    pub fn identity(dim: usize) -> Self {
        let mut m = Self::zeros(dim);
        for i in 0..dim {
            m.data[i * dim + i] = 1.0;
        }
        m
    }

    /// Builds a matrix from rows; every row must be `rows.len()` long.
    pub fn from_rows(rows: &[&[f64]]) -> SimResult<Self> {
        let dim = rows.len();
        let mut data = Vec::with_capacity(dim * dim);
        for row in rows {
            check_len("dense matrix row", dim, row.len())?;
            data.extend_from_slice(row);
        }
        Ok(Self { dim, data })
    }

    pub fn scaled(mut self, factor: f64) -> Self {
        for v in &mut self.data {
            *v *= factor;
        }
        self
    }
}

impl SystemMatrix for DenseMatrix {
    fn dim(&self) -> usize {
        self.dim
    }

    fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.dim + col]
    }

    fn mul_vec(&self, x: &[f64], out: &mut [f64]) {
        for (row, o) in out.iter_mut().enumerate().take(self.dim) {
            let r = &self.data[row * self.dim..(row + 1) * self.dim];
            *o = r.iter().zip(x).map(|(a, b)| a * b).sum();
        }
    }
}
