//! Least-squares solve facade (C6): `Qᵀb` followed by an upper-triangular
//! back-substitution restricted to `R`'s leading `rank` rows.

use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CscMatrix;

use crate::error::{QrError, QrResult};
use crate::qr::apply::dense_from_csc;
use crate::qr::factorize::BandedBlockedQr;

impl BandedBlockedQr {
    /// Solves `A x = b` (in the least-squares sense) for a single
    /// right-hand side, using the finished factorization of `A`.
    pub fn solve_vec(&self, b: &DVector<f64>) -> QrResult<DVector<f64>> {
        let rhs = DMatrix::from_column_slice(b.len(), 1, b.as_slice());
        let x = self.solve(&rhs)?;
        Ok(x.column(0).clone_owned())
    }

    /// Solves `A X = B` for every column of `B` independently.
    pub fn solve(&self, b: &DMatrix<f64>) -> QrResult<DMatrix<f64>> {
        if !self.is_initialized() {
            return Err(QrError::NotInitialized);
        }
        if b.nrows() != self.rows() {
            return Err(QrError::InvalidInput(format!(
                "right-hand side has {} rows, expected {}",
                b.nrows(),
                self.rows()
            )));
        }

        let rank = self.rank()?;
        let qtb = self.matrix_q().apply_transpose_mat(b)?;

        let target_rows = self.cols().max(qtb.nrows());
        let mut y = DMatrix::<f64>::zeros(target_rows, qtb.ncols());
        for c in 0..qtb.ncols() {
            for r in 0..qtb.nrows().min(target_rows) {
                y[(r, c)] = qtb[(r, c)];
            }
        }

        let r_top = dense_upper_left(self.matrix_r()?, rank);
        let eps = self.roundoff_epsilon().max(f64::EPSILON);
        for c in 0..y.ncols() {
            let rhs: Vec<f64> = (0..rank).map(|r| y[(r, c)]).collect();
            let sol = back_substitute_upper(&r_top, &rhs, eps)?;
            for r in 0..rank {
                y[(r, c)] = sol[r];
            }
            for r in rank..target_rows {
                y[(r, c)] = 0.0;
            }
        }

        Ok(y.rows(0, self.cols()).clone_owned())
    }

    /// Solves `A X = B` for a sparse right-hand side, returning a dense
    /// solution (the solve itself is inherently dense once `R` is
    /// triangular).
    pub fn solve_sparse(&self, b: &CscMatrix<f64>) -> QrResult<DMatrix<f64>> {
        self.solve(&dense_from_csc(b))
    }
}

/// Extracts `r[0..rank, 0..rank]` as a dense matrix.
fn dense_upper_left(r: &CscMatrix<f64>, rank: usize) -> DMatrix<f64> {
    let mut out = DMatrix::<f64>::zeros(rank, rank);
    for c in 0..rank {
        let col = r.col(c);
        for (&row, &value) in col.row_indices().iter().zip(col.values()) {
            if row < rank {
                out[(row, c)] = value;
            }
        }
    }
    out
}

/// Back-substitution against an upper-triangular `n x n` matrix.
fn back_substitute_upper(r: &DMatrix<f64>, b: &[f64], eps: f64) -> QrResult<Vec<f64>> {
    let n = r.nrows();
    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let diag = r[(i, i)];
        if diag.abs() < eps {
            return Err(QrError::NumericalError(format!(
                "zero (or near-zero) pivot on R's diagonal at row {i}"
            )));
        }
        let mut sum = b[i];
        for j in (i + 1)..n {
            sum -= r[(i, j)] * x[j];
        }
        x[i] = sum / diag;
    }
    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qr::block_params::BlockParams;
    use crate::qr::triplet::TripletAccumulator;
    use approx::assert_relative_eq;

    fn identity_banded(n: usize) -> CscMatrix<f64> {
        let mut acc = TripletAccumulator::new(n, n);
        for i in 0..n {
            acc.add_if_nonzero(i, i, 2.0);
        }
        acc.into_csc()
    }

    #[test]
    fn solve_before_factorize_errors() {
        let qr = BandedBlockedQr::new(BlockParams::new(4, 2), 1e-16);
        let b = DVector::zeros(4);
        assert!(matches!(qr.solve_vec(&b), Err(QrError::NotInitialized)));
        assert!(!qr.last_error_message().is_empty());
    }

    #[test]
    fn solves_diagonal_system_exactly() {
        let a = identity_banded(6);
        let mut qr = BandedBlockedQr::new(BlockParams::new(4, 2), 1e-16);
        qr.factorize(&a).unwrap();

        let b = DVector::from_iterator(6, (1..=6).map(|v| v as f64 * 2.0));
        let x = qr.solve_vec(&b).unwrap();
        for i in 0..6 {
            assert_relative_eq!(x[i], (i + 1) as f64, epsilon = 1e-9);
        }
    }

    #[test]
    fn solve_rejects_wrong_rhs_rows() {
        let a = identity_banded(6);
        let mut qr = BandedBlockedQr::new(BlockParams::new(4, 2), 1e-16);
        qr.factorize(&a).unwrap();
        let bad = DVector::zeros(3);
        assert!(matches!(qr.solve_vec(&bad), Err(QrError::InvalidInput(_))));
    }
}
