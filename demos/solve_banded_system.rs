//! Banded QR Demo - Solving a Narrow-Bandwidth Least-Squares System

use banded_qr::prelude::*;
use nalgebra::DVector;

fn main() {
    println!("=== Banded QR Demo: Tridiagonal System ===\n");

    // Build a 10x8 tridiagonal-ish banded matrix (bandwidth 1), overdetermined
    // so the solve is a genuine least-squares fit rather than an exact solve.
    let (rows, cols) = (10, 8);
    let mut builder = TripletAccumulator::new(rows, cols);
    for c in 0..cols {
        builder.add_if_nonzero(c, c, 4.0);
        if c > 0 {
            builder.add_if_nonzero(c, c - 1, -1.0);
        }
        builder.add_if_nonzero(c + 1, c, -1.0);
        if c + 2 < rows {
            builder.add_if_nonzero(c + 2, c, 0.25);
        }
    }
    let a = builder.into_csc();

    let mut qr = BandedBlockedQr::new(BlockParams::new(4, 2), 1e-14);
    qr.factorize(&a).expect("factorization failed");

    println!("rows = {}, cols = {}", qr.rows(), qr.cols());
    println!("rank = {}", qr.rank().expect("rank unavailable"));

    let b = DVector::from_iterator(rows, (0..rows).map(|i| (i as f64 + 1.0) * 0.5));
    let x = qr.solve_vec(&b).expect("solve failed");

    println!("\nsolution x:");
    for (i, v) in x.iter().enumerate() {
        println!("  x[{i}] = {v:.6}");
    }

    let q = qr.matrix_q();
    let qtb = q.apply_transpose(&b).expect("apply failed");
    println!("\n||Q^T b|| = {:.6}", qtb.norm());
}
