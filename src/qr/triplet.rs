//! Sparse triplet accumulator (C1): collects (row, col, value) triples and
//! materializes a compressed sparse column matrix.

use nalgebra_sparse::{CooMatrix, CscMatrix};

/// An append-only sequence of `(row, col, value)` triples that can be
/// finalized into a [`CscMatrix`].
///
/// Drops exact zeros only; the ε-based near-zero filter used elsewhere lives
/// in the Q-apply path instead, see [`crate::qr::MatrixQ`].
#[derive(Debug, Clone)]
pub struct TripletAccumulator {
    nrows: usize,
    ncols: usize,
    triples: Vec<(usize, usize, f64)>,
}

impl TripletAccumulator {
    pub fn new(nrows: usize, ncols: usize) -> Self {
        Self {
            nrows,
            ncols,
            triples: Vec::new(),
        }
    }

    pub fn with_capacity(nrows: usize, ncols: usize, capacity: usize) -> Self {
        Self {
            nrows,
            ncols,
            triples: Vec::with_capacity(capacity),
        }
    }

    /// Insert `value` at `(row, col)` iff it is not exactly zero.
    #[inline]
    pub fn add_if_nonzero(&mut self, row: usize, col: usize, value: f64) {
        debug_assert!(row < self.nrows, "row {row} out of bounds ({})", self.nrows);
        debug_assert!(col < self.ncols, "col {col} out of bounds ({})", self.ncols);
        if value != 0.0 {
            self.triples.push((row, col, value));
        }
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    /// Finalize into a compressed sparse column matrix, summing duplicate
    /// entries at the same (row, col).
    pub fn into_csc(self) -> CscMatrix<f64> {
        let mut coo = CooMatrix::new(self.nrows, self.ncols);
        for (row, col, value) in self.triples {
            coo.push(row, col, value);
        }
        CscMatrix::from(&coo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_exact_zeros() {
        let mut acc = TripletAccumulator::new(3, 3);
        acc.add_if_nonzero(0, 0, 0.0);
        acc.add_if_nonzero(1, 1, 4.0);
        assert_eq!(acc.len(), 1);
    }

    #[test]
    fn sums_duplicates_on_finalize() {
        let mut acc = TripletAccumulator::new(2, 2);
        acc.add_if_nonzero(0, 0, 1.0);
        acc.add_if_nonzero(0, 0, 2.0);
        let csc = acc.into_csc();
        let col = csc.col(0);
        assert_eq!(col.row_indices(), &[0]);
        assert!((col.values()[0] - 3.0).abs() < 1e-12);
    }
}
