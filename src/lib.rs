//! Sparse banded blocked QR factorization.
//!
//! This library factors a sparse, column-major, banded `m x n` matrix `A`
//! (`m >= n`) into `A = Q*R` using a blocked Householder algorithm: each
//! panel of `block_cols` columns is factored densely, its reflectors are
//! folded into a compact WY representation, and the active row window slides
//! down the band as columns are consumed. `Q` is never formed explicitly;
//! it is applied lazily through [`BandedBlockedQr::matrix_q`].
//!
//! ## Example
//! ```rust
//! use banded_qr::prelude::*;
//! use nalgebra::DVector;
//!
//! let mut builder = TripletAccumulator::new(6, 4);
//! builder.add_if_nonzero(0, 0, 4.0);
//! builder.add_if_nonzero(1, 0, 1.0);
//! builder.add_if_nonzero(1, 1, 3.0);
//! builder.add_if_nonzero(2, 1, 2.0);
//! builder.add_if_nonzero(2, 2, 5.0);
//! builder.add_if_nonzero(3, 2, 1.0);
//! builder.add_if_nonzero(3, 3, 2.0);
//! builder.add_if_nonzero(4, 3, 1.0);
//! builder.add_if_nonzero(5, 3, 3.0);
//! let a = builder.into_csc();
//!
//! let mut qr = BandedBlockedQr::new(BlockParams::new(4, 2), 1e-16);
//! qr.factorize(&a).unwrap();
//! assert_eq!(qr.rank().unwrap(), 4);
//!
//! let b = DVector::from_element(6, 1.0);
//! let x = qr.solve_vec(&b).unwrap();
//! assert_eq!(x.len(), 4);
//! ```

pub mod error;
pub mod qr;

pub mod prelude {
    pub use crate::error::{QrError, QrInfo, QrResult};
    pub use crate::qr::{BandedBlockedQr, BlockParams, MatrixQ, TripletAccumulator};
}
