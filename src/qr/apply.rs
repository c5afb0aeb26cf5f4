//! Lazy Q / Qᵀ applier (C5): `MatrixQ` never materializes the orthogonal
//! factor, it only holds a borrow of the finished factorization and expands
//! the WY product when multiplied against an operand.

use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CscMatrix;

use crate::error::{QrError, QrResult};
use crate::qr::factorize::BandedBlockedQr;
use crate::qr::triplet::TripletAccumulator;

/// A lazy view of `Q` over a finished factorization, with `apply_transpose`
/// variants standing in for `Qᵀ`. Borrows the factorization's `W`/`Y`
/// matrices; apply methods expand `I - W*Yᵀ` only against the operand
/// they're given.
pub struct MatrixQ<'a> {
    qr: &'a BandedBlockedQr,
}

impl<'a> MatrixQ<'a> {
    pub(crate) fn new(qr: &'a BandedBlockedQr) -> Self {
        Self { qr }
    }

    pub fn rows(&self) -> usize {
        self.qr.rows()
    }

    pub fn cols(&self) -> usize {
        self.qr.rows()
    }

    pub fn apply(&self, x: &DVector<f64>) -> QrResult<DVector<f64>> {
        let (w, y) = self.wy()?;
        check_len(x.len(), w.nrows())?;
        Ok(apply_core(w, y, self.qr.roundoff_epsilon(), self.block_width(), x, false))
    }

    pub fn apply_transpose(&self, x: &DVector<f64>) -> QrResult<DVector<f64>> {
        let (w, y) = self.wy()?;
        check_len(x.len(), w.nrows())?;
        Ok(apply_core(w, y, self.qr.roundoff_epsilon(), self.block_width(), x, true))
    }

    pub fn apply_mat(&self, x: &DMatrix<f64>) -> QrResult<DMatrix<f64>> {
        self.apply_columns(x, false)
    }

    pub fn apply_transpose_mat(&self, x: &DMatrix<f64>) -> QrResult<DMatrix<f64>> {
        self.apply_columns(x, true)
    }

    pub fn apply_sparse(&self, x: &CscMatrix<f64>) -> QrResult<CscMatrix<f64>> {
        let dense = dense_from_csc(x);
        let result = self.apply_columns(&dense, false)?;
        Ok(dense_to_csc(&result))
    }

    pub fn apply_transpose_sparse(&self, x: &CscMatrix<f64>) -> QrResult<CscMatrix<f64>> {
        let dense = dense_from_csc(x);
        let result = self.apply_columns(&dense, true)?;
        Ok(dense_to_csc(&result))
    }

    /// Materializes `Q` as a full sparse matrix by applying it to the
    /// identity. Only ever necessary for inspection or interop; the solve
    /// path never calls this.
    pub fn to_sparse(&self) -> QrResult<CscMatrix<f64>> {
        let n = self.qr.rows();
        let identity = dense_to_csc(&DMatrix::identity(n, n));
        self.apply_sparse(&identity)
    }

    fn wy(&self) -> QrResult<(&'a CscMatrix<f64>, &'a CscMatrix<f64>)> {
        Ok((self.qr.matrix_w()?, self.qr.matrix_y()?))
    }

    /// Column tiling width for the blocked Q/Qᵀ apply loop: each panel's
    /// compact-WY block spans `2 * block_cols` columns of `W`/`Y`, and
    /// `I - W*Yᵀ` is only reproduced when a whole such block is applied in
    /// one chunk (`W`'s columns carry cross-terms from earlier reflectors in
    /// the same panel). Splitting a panel's block across chunks would apply
    /// the wrong operator, so this is tied to `BlockParams::block_cols`
    /// rather than a fixed constant.
    fn block_width(&self) -> usize {
        2 * self.qr.block_params().block_cols
    }

    fn apply_columns(&self, x: &DMatrix<f64>, transpose: bool) -> QrResult<DMatrix<f64>> {
        let (w, y) = self.wy()?;
        check_len(x.nrows(), w.nrows())?;
        let eps = self.qr.roundoff_epsilon();
        let block_width = self.block_width();

        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            let columns: Vec<DVector<f64>> = (0..x.ncols())
                .into_par_iter()
                .map(|j| apply_core(w, y, eps, block_width, &x.column(j).clone_owned(), transpose))
                .collect();
            let mut out = DMatrix::zeros(x.nrows(), x.ncols());
            for (j, col) in columns.into_iter().enumerate() {
                out.set_column(j, &col);
            }
            Ok(out)
        }
        #[cfg(not(feature = "parallel"))]
        {
            let mut out = DMatrix::zeros(x.nrows(), x.ncols());
            for j in 0..x.ncols() {
                let col = apply_core(w, y, eps, block_width, &x.column(j).clone_owned(), transpose);
                out.set_column(j, &col);
            }
            Ok(out)
        }
    }
}

impl BandedBlockedQr {
    /// An expression for `Q`. Apply it to a vector/matrix, or call
    /// [`MatrixQ::to_sparse`] to materialize it.
    pub fn matrix_q(&self) -> MatrixQ<'_> {
        MatrixQ::new(self)
    }
}

fn check_len(got: usize, expected: usize) -> QrResult<()> {
    if got != expected {
        return Err(QrError::InvalidInput(format!(
            "Q operand has {got} rows, expected {expected}"
        )));
    }
    Ok(())
}

/// Dots sparse column `col` of `mat` against dense `x`.
fn sparse_col_dot(mat: &CscMatrix<f64>, col: usize, x: &DVector<f64>) -> f64 {
    let c = mat.col(col);
    c.row_indices()
        .iter()
        .zip(c.values())
        .map(|(&row, &val)| val * x[row])
        .sum()
}

/// `res -= mat.col(col) * scale`, restricted to the column's nonzeros.
fn sparse_col_axpy(mat: &CscMatrix<f64>, col: usize, scale: f64, res: &mut DVector<f64>) {
    if scale == 0.0 {
        return;
    }
    let c = mat.col(col);
    for (&row, &val) in c.row_indices().iter().zip(c.values()) {
        res[row] -= val * scale;
    }
}

/// Applies `Q` (or `Qᵀ`, when `transpose`) to dense `x` using the blocked WY
/// sweep: forward over columns of `W` for `Qᵀ`, reverse over columns of `Y`
/// for `Q`, one whole panel block (`block_width` columns) per chunk. A
/// chunk whose partial dot products sum to (near) zero is skipped entirely.
fn apply_core(
    w: &CscMatrix<f64>,
    y: &CscMatrix<f64>,
    eps: f64,
    block_width: usize,
    x: &DVector<f64>,
    transpose: bool,
) -> DVector<f64> {
    let diag_size = w.ncols();
    let mut res = x.clone();

    if transpose {
        let mut k = 0;
        while k < diag_size {
            let width = block_width.min(diag_size - k);
            let taus: Vec<f64> = (0..width).map(|ii| sparse_col_dot(w, k + ii, &res)).collect();
            let sum: f64 = taus.iter().sum();
            if sum.abs() >= eps {
                for ii in 0..width {
                    sparse_col_axpy(y, k + ii, taus[ii], &mut res);
                }
            }
            k += width;
        }
    } else {
        let mut k = diag_size;
        while k > 0 {
            let width = block_width.min(k);
            let start = k - width;
            let taus: Vec<f64> = (0..width).map(|ii| sparse_col_dot(y, start + ii, &res)).collect();
            let sum: f64 = taus.iter().sum();
            if sum.abs() >= eps {
                for ii in 0..width {
                    sparse_col_axpy(w, start + ii, taus[ii], &mut res);
                }
            }
            k = start;
        }
    }

    res
}

pub(crate) fn dense_from_csc(mat: &CscMatrix<f64>) -> DMatrix<f64> {
    let mut out = DMatrix::<f64>::zeros(mat.nrows(), mat.ncols());
    for c in 0..mat.ncols() {
        let col = mat.col(c);
        for (&row, &value) in col.row_indices().iter().zip(col.values()) {
            out[(row, c)] = value;
        }
    }
    out
}

pub(crate) fn dense_to_csc(mat: &DMatrix<f64>) -> CscMatrix<f64> {
    let mut acc = TripletAccumulator::new(mat.nrows(), mat.ncols());
    for c in 0..mat.ncols() {
        for r in 0..mat.nrows() {
            acc.add_if_nonzero(r, c, mat[(r, c)]);
        }
    }
    acc.into_csc()
}
