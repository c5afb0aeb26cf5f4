//! Banded blocked QR factorization driver (C4): walks the active window over
//! block-column panels, factoring each dense strip with Householder QR and
//! scattering the resulting WY data and trailing R coefficients into the
//! sparse outputs.

use nalgebra::DMatrix;
use nalgebra_sparse::{CooMatrix, CscMatrix};

use crate::error::{QrError, QrInfo, QrResult};
use crate::qr::block_params::BlockParams;
use crate::qr::panel_qr::panel_householder_qr;
use crate::qr::triplet::TripletAccumulator;
use crate::qr::wy::wy_accumulate;

/// Sparse banded blocked QR factorization of an `m x n` matrix (`m >= n`).
///
/// Not rank-revealing: columns are never pivoted, so [`BandedBlockedQr::rank`]
/// always reports `cols()` once [`BandedBlockedQr::factorize`] has succeeded.
/// Every other accessor returns [`QrError::NotInitialized`] until then.
#[derive(Debug, Clone)]
pub struct BandedBlockedQr {
    block_params: BlockParams,
    eps: f64,
    pivot_threshold: Option<f64>,

    rows: usize,
    cols: usize,
    r: CscMatrix<f64>,
    w: CscMatrix<f64>,
    y: CscMatrix<f64>,
    rank: usize,
    cols_permutation: Vec<usize>,
    rows_permutation: Vec<usize>,
    info: QrInfo,
    last_error_message: String,
    initialized: bool,
}

impl Default for BandedBlockedQr {
    fn default() -> Self {
        Self::new(BlockParams::default(), 1e-16)
    }
}

impl BandedBlockedQr {
    pub fn new(block_params: BlockParams, eps: f64) -> Self {
        Self {
            block_params,
            eps,
            pivot_threshold: None,
            rows: 0,
            cols: 0,
            r: empty_csc(0, 0),
            w: empty_csc(0, 0),
            y: empty_csc(0, 0),
            rank: 0,
            cols_permutation: Vec::new(),
            rows_permutation: Vec::new(),
            info: QrInfo::NotInitialized,
            last_error_message: QrError::NotInitialized.to_string(),
            initialized: false,
        }
    }

    pub fn set_roundoff_epsilon(&mut self, eps: f64) {
        self.eps = eps;
    }

    /// Sets the threshold used to treat a column norm as zero. Since this
    /// factorization is not rank-revealing, it has no effect on
    /// [`Self::factorize`] itself; kept so callers migrating from a
    /// rank-revealing QR don't lose the setter.
    pub fn set_pivot_threshold(&mut self, threshold: f64) {
        self.pivot_threshold = Some(threshold);
    }

    pub fn set_block_params(&mut self, block_params: BlockParams) {
        self.block_params = block_params;
    }

    pub fn block_params(&self) -> BlockParams {
        self.block_params
    }

    pub fn roundoff_epsilon(&self) -> f64 {
        self.eps
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rank(&self) -> QrResult<usize> {
        self.require_initialized()?;
        Ok(self.rank)
    }

    pub fn matrix_r(&self) -> QrResult<&CscMatrix<f64>> {
        self.require_initialized()?;
        Ok(&self.r)
    }

    pub(crate) fn matrix_w(&self) -> QrResult<&CscMatrix<f64>> {
        self.require_initialized()?;
        Ok(&self.w)
    }

    pub(crate) fn matrix_y(&self) -> QrResult<&CscMatrix<f64>> {
        self.require_initialized()?;
        Ok(&self.y)
    }

    /// The column permutation `P` such that `A*P = Q*R`. Always the identity:
    /// this factorization performs no fill-reducing or numerical pivoting.
    pub fn cols_permutation(&self) -> QrResult<&[usize]> {
        self.require_initialized()?;
        Ok(&self.cols_permutation)
    }

    /// The row permutation applied to `A`. Always the identity; kept for API
    /// symmetry with QR variants that do permute rows.
    pub fn rows_permutation(&self) -> QrResult<&[usize]> {
        self.require_initialized()?;
        Ok(&self.rows_permutation)
    }

    pub fn info(&self) -> QrInfo {
        self.info
    }

    pub fn last_error_message(&self) -> &str {
        &self.last_error_message
    }

    pub(crate) fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn require_initialized(&self) -> QrResult<()> {
        if !self.initialized {
            return Err(QrError::NotInitialized);
        }
        Ok(())
    }

    fn fail(&mut self, err: QrError) -> QrError {
        self.initialized = false;
        self.info = QrInfo::from(&err);
        self.last_error_message = err.to_string();
        err
    }

    /// Runs the factorization on `mat`, an `m x n` matrix in CSC form with
    /// `m >= n`, `n` a multiple of `block_cols`, and `block_rows >
    /// block_cols`.
    pub fn factorize(&mut self, mat: &CscMatrix<f64>) -> QrResult<()> {
        self.initialized = false;

        let m = mat.nrows();
        let n = mat.ncols();
        let block_cols = self.block_params.block_cols;
        let block_rows_initial = self.block_params.block_rows;

        if m < n || n == 0 {
            return Err(self.fail(QrError::InvalidInput(format!(
                "expected m >= n with n > 0, got {m}x{n}"
            ))));
        }
        if block_cols == 0 || n % block_cols != 0 {
            return Err(self.fail(QrError::InvalidInput(format!(
                "column count {n} is not a multiple of block_cols {block_cols}"
            ))));
        }
        if block_rows_initial <= block_cols {
            return Err(self.fail(QrError::InvalidInput(format!(
                "block_rows ({block_rows_initial}) must exceed block_cols ({block_cols})"
            ))));
        }

        let num_blocks = n / block_cols;
        let row_increment = block_rows_initial - block_cols;
        // Computed once from the initial block_rows; never revisited even as
        // the active window's local block_rows grows.
        let nnz_rows = block_rows_initial * 2;

        let mut block_rows = block_rows_initial;
        let mut active_rows = block_rows;
        let mut num_zeros: usize = 0;

        let mut y_acc = TripletAccumulator::new(m, 2 * n);
        let mut w_acc = TripletAccumulator::new(m, 2 * n);
        let mut r_acc = TripletAccumulator::new(m, n);

        let initial_width = if num_blocks >= 2 { block_cols * 2 } else { block_cols };
        let mut ji = extract_dense_block(mat, 0, 0, block_rows, initial_width)
            .map_err(|e| self.fail(e))?;

        for i in 0..num_blocks {
            let bs = i * block_cols;
            let bsh = i * block_cols * 2;
            let curr_block_cols = if i == num_blocks - 1 { block_cols } else { block_cols * 2 };

            let refl = panel_householder_qr(&ji).map_err(|e| self.fail(e))?;
            let (w_mat, y_mat) = wy_accumulate(active_rows, &refl);

            for bc in 0..curr_block_cols {
                y_acc.add_if_nonzero(bs + bc, bsh + bc, y_mat[(bc, bc)]);
                for r in 0..=bc {
                    w_acc.add_if_nonzero(bs + r, bsh + bc, w_mat[(r, bc)]);
                }

                let mut start = active_rows as isize - block_rows_initial as isize;
                if start <= bc as isize {
                    start = bc as isize + 1;
                }
                let start = start.max(0) as usize;
                for r in start..active_rows {
                    y_acc.add_if_nonzero(bs + r + num_zeros, bsh + bc, y_mat[(r, bc)]);
                    w_acc.add_if_nonzero(bs + r + num_zeros, bsh + bc, w_mat[(r, bc)]);
                }
            }

            // V = Q^T * Ji in WY form: Q^T = I - Y*W^T, applied column by column.
            let mut v = ji.clone();
            for j in 0..v.ncols() {
                let vj = v.column(j).clone_owned();
                let wtv = w_mat.transpose() * &vj;
                let update = &y_mat * wtv;
                v.set_column(j, &(vj - update));
            }
            let tmp = v;

            for br in 0..block_cols {
                for bc in 0..curr_block_cols {
                    r_acc.add_if_nonzero(bs + br, bs + bc, tmp[(br, bc)]);
                }
            }

            if i < num_blocks - 1 {
                block_rows += row_increment;

                if block_rows > nnz_rows {
                    if num_zeros == 0 {
                        log::warn!(
                            "panel {i} truncated the active window to {nnz_rows} rows; \
                             the banded assumption is being relied on for rows beyond it"
                        );
                    }
                    num_zeros = block_rows - nnz_rows;
                    active_rows = nnz_rows;
                } else {
                    num_zeros = 0;
                    active_rows = block_rows;
                }

                let width = if i + 2 < num_blocks {
                    block_cols * 2
                } else {
                    block_cols
                };
                let mut next_ji =
                    extract_dense_block(mat, bs + block_cols + num_zeros, bs + block_cols, active_rows, width)
                        .map_err(|e| self.fail(e))?;

                let h = active_rows
                    .checked_sub(row_increment)
                    .and_then(|v| v.checked_sub(block_cols))
                    .ok_or_else(|| {
                        self.fail(QrError::NumericalError(
                            "active window shrank below the panel overlay size".to_string(),
                        ))
                    })?;
                if tmp.nrows() < block_cols + h || tmp.ncols() < block_cols + block_cols {
                    return Err(self.fail(QrError::NumericalError(
                        "trailing block too small to overlay into the next panel".to_string(),
                    )));
                }
                for rr in 0..h {
                    for cc in 0..block_cols {
                        next_ji[(rr, cc)] = tmp[(block_cols + rr, block_cols + cc)];
                    }
                }
                ji = next_ji;
            }
        }

        self.r = r_acc.into_csc();
        self.w = w_acc.into_csc();
        self.y = y_acc.into_csc();
        self.rows = m;
        self.cols = n;
        self.rank = n;
        self.cols_permutation = (0..n).collect();
        self.rows_permutation = (0..m).collect();
        self.initialized = true;
        self.info = QrInfo::Success;
        self.last_error_message.clear();

        log::debug!("factorized {m}x{n} matrix into {num_blocks} panels (block_cols={block_cols}, block_rows={block_rows_initial})");

        Ok(())
    }
}

fn empty_csc(rows: usize, cols: usize) -> CscMatrix<f64> {
    CscMatrix::from(&CooMatrix::<f64>::new(rows, cols))
}

/// Materializes `mat[row_start..row_start+nrows, col_start..col_start+ncols]`
/// as a dense matrix.
fn extract_dense_block(
    mat: &CscMatrix<f64>,
    row_start: usize,
    col_start: usize,
    nrows: usize,
    ncols: usize,
) -> QrResult<DMatrix<f64>> {
    if row_start + nrows > mat.nrows() || col_start + ncols > mat.ncols() {
        return Err(QrError::NumericalError(format!(
            "panel window rows {row_start}..{} cols {col_start}..{} exceeds matrix bounds {}x{}",
            row_start + nrows,
            col_start + ncols,
            mat.nrows(),
            mat.ncols()
        )));
    }

    let mut block = DMatrix::<f64>::zeros(nrows, ncols);
    for c in 0..ncols {
        let col = mat.col(col_start + c);
        for (&row, &value) in col.row_indices().iter().zip(col.values()) {
            if row >= row_start && row < row_start + nrows {
                block[(row - row_start, c)] = value;
            }
        }
    }
    Ok(block)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qr::TripletAccumulator;
    use approx::assert_relative_eq;

    fn block_diagonal_12x6() -> CscMatrix<f64> {
        // Six 2x2 blocks stacked down the diagonal, each well-conditioned.
        let mut acc = TripletAccumulator::new(12, 6);
        for b in 0..3 {
            let r = b * 4;
            let c = b * 2;
            acc.add_if_nonzero(r, c, 4.0);
            acc.add_if_nonzero(r, c + 1, 1.0);
            acc.add_if_nonzero(r + 1, c, 1.0);
            acc.add_if_nonzero(r + 1, c + 1, 3.0);
            acc.add_if_nonzero(r + 2, c, 2.0);
            acc.add_if_nonzero(r + 3, c + 1, 2.0);
        }
        acc.into_csc()
    }

    #[test]
    fn factorize_rejects_wide_matrix() {
        let mut qr = BandedBlockedQr::new(BlockParams::new(4, 2), 1e-16);
        let a = empty_csc(2, 4);
        assert!(matches!(qr.factorize(&a), Err(QrError::InvalidInput(_))));
    }

    #[test]
    fn factorize_rejects_non_divisible_columns() {
        let mut qr = BandedBlockedQr::new(BlockParams::new(4, 2), 1e-16);
        let a = empty_csc(10, 5);
        assert!(matches!(qr.factorize(&a), Err(QrError::InvalidInput(_))));
    }

    #[test]
    fn accessors_require_initialization() {
        let qr = BandedBlockedQr::new(BlockParams::default(), 1e-16);
        assert!(matches!(qr.rank(), Err(QrError::NotInitialized)));
        assert!(matches!(qr.matrix_r(), Err(QrError::NotInitialized)));
    }

    #[test]
    fn factorize_succeeds_on_block_diagonal_matrix() {
        let a = block_diagonal_12x6();
        let mut qr = BandedBlockedQr::new(BlockParams::new(4, 2), 1e-16);
        qr.factorize(&a).unwrap();

        assert_eq!(qr.rows(), 12);
        assert_eq!(qr.cols(), 6);
        assert_eq!(qr.rank().unwrap(), 6);
        assert_eq!(qr.info(), QrInfo::Success);

        let r = qr.matrix_r().unwrap();
        // R has no entries below its own diagonal block structure's upper part.
        for (row, col, _) in r.triplet_iter() {
            assert!(row <= col, "unexpected entry below R's upper region at ({row},{col})");
        }
    }

    #[test]
    fn repeated_factorize_overwrites_previous_state() {
        let a = block_diagonal_12x6();
        let mut qr = BandedBlockedQr::new(BlockParams::new(4, 2), 1e-16);
        qr.factorize(&a).unwrap();
        let first_rank = qr.rank().unwrap();
        qr.factorize(&a).unwrap();
        assert_eq!(qr.rank().unwrap(), first_rank);
        assert_relative_eq!(qr.roundoff_epsilon(), 1e-16);
    }
}
