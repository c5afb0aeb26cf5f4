//! Sparse banded blocked QR factorization.
//!
//! See the crate-level docs for an overview. The modules here mirror the
//! components of the factorization pipeline: a triplet accumulator builds
//! the compressed sparse outputs (R, W, Y), a dense panel QR and WY
//! accumulator handle one block column strip at a time, the factorize
//! driver walks the banded active window, and `apply`/`solve` expose Q and
//! the least-squares solve on top of the finished factorization.

mod apply;
mod block_params;
mod factorize;
mod panel_qr;
mod solve;
mod triplet;
mod wy;

pub use apply::MatrixQ;
pub use block_params::BlockParams;
pub use factorize::BandedBlockedQr;
pub use triplet::TripletAccumulator;

pub(crate) use panel_qr::panel_householder_qr;
pub(crate) use wy::wy_accumulate;
