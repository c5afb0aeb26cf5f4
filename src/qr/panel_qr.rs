//! Dense panel QR (C2): Householder QR of one dense panel, exposing the
//! per-column essential reflector vectors and τ coefficients the WY
//! accumulator (C3) needs.

use nalgebra::DVector;

use crate::error::{QrError, QrResult};

/// Per-column reflector data produced by a dense Householder QR of a single
/// panel. Column `c` has essential vector of length `p - c - 1`.
#[derive(Debug, Clone)]
pub struct PanelReflectors {
    pub p: usize,
    pub q: usize,
    pub taus: Vec<f64>,
    pub essentials: Vec<DVector<f64>>,
}

/// Computes the Householder QR of a dense `p x q` panel (`p >= q`) without
/// pivoting, following Golub & Van Loan's `house` construction (Algorithm
/// 5.1.1): for each column, the Householder vector's leading entry is
/// normalized to 1 so only the essential tail needs to be stored.
pub fn panel_householder_qr(j: &nalgebra::DMatrix<f64>) -> QrResult<PanelReflectors> {
    let (p, q) = j.shape();
    if p < q {
        return Err(QrError::NumericalError(format!(
            "panel has more columns ({q}) than rows ({p})"
        )));
    }

    let mut a = j.clone();
    let mut taus = Vec::with_capacity(q);
    let mut essentials = Vec::with_capacity(q);

    for c in 0..q {
        let len = p - c;
        let mut x = vec![0.0; len];
        for i in 0..len {
            x[i] = a[(c + i, c)];
        }

        let (v, tau) = householder_vector(&x);
        if !tau.is_finite() {
            return Err(QrError::NumericalError(format!(
                "non-finite Householder coefficient at panel column {c}"
            )));
        }
        taus.push(tau);
        essentials.push(DVector::from_vec(v[1..].to_vec()));

        if tau != 0.0 {
            for jc in c..q {
                let mut dot = 0.0;
                for i in 0..len {
                    dot += v[i] * a[(c + i, jc)];
                }
                let scale = tau * dot;
                for i in 0..len {
                    a[(c + i, jc)] -= scale * v[i];
                }
            }
        }
    }

    Ok(PanelReflectors {
        p,
        q,
        taus,
        essentials,
    })
}

/// Builds the Householder vector `v` (leading entry normalized to 1) and
/// coefficient `tau` such that `(I - tau*v*v^T) * x = [±‖x‖, 0, ..., 0]^T`.
fn householder_vector(x: &[f64]) -> (Vec<f64>, f64) {
    let len = x.len();
    let mut v = vec![0.0; len];
    v[0] = 1.0;
    if len == 1 {
        return (v, 0.0);
    }

    let sigma: f64 = x[1..].iter().map(|&xi| xi * xi).sum();
    if sigma == 0.0 {
        // x is already a multiple of e1 (up to sign); no reflection needed
        // in either case; leave R's diagonal as x[0] is, negative or not.
        return (v, 0.0);
    }

    let mu = (x[0] * x[0] + sigma).sqrt();
    let v0 = if x[0] <= 0.0 {
        x[0] - mu
    } else {
        -sigma / (x[0] + mu)
    };
    let tau = 2.0 * v0 * v0 / (sigma + v0 * v0);
    for i in 1..len {
        v[i] = x[i] / v0;
    }

    (v, tau)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::DMatrix;

    #[test]
    fn rejects_more_columns_than_rows() {
        let j = DMatrix::<f64>::zeros(2, 3);
        assert!(panel_householder_qr(&j).is_err());
    }

    #[test]
    fn zero_column_yields_zero_tau() {
        let j = DMatrix::<f64>::zeros(4, 2);
        let refl = panel_householder_qr(&j).unwrap();
        assert_relative_eq!(refl.taus[0], 0.0);
        assert_relative_eq!(refl.taus[1], 0.0);
    }

    #[test]
    fn negative_pivot_with_zero_tail_yields_zero_tau() {
        // x = [-5, 0, 0]: sigma == 0 and x[0] < 0. H must stay I (tau == 0),
        // not the non-orthogonal tau == -2 that a naive sign branch gives.
        let j = DMatrix::from_column_slice(3, 1, &[-5.0, 0.0, 0.0]);
        let refl = panel_householder_qr(&j).unwrap();
        assert_relative_eq!(refl.taus[0], 0.0);
    }

    #[test]
    fn reflects_single_column_norm() {
        let j = DMatrix::from_column_slice(3, 1, &[3.0, 4.0, 0.0]);
        let refl = panel_householder_qr(&j).unwrap();
        assert_eq!(refl.essentials[0].len(), 2);
        // tau and essential vector should reproduce ‖x‖ in the (0,0) entry
        // once the reflector is applied; check indirectly via the defining
        // identity (I - tau v v^T) x = alpha e1.
        let tau = refl.taus[0];
        let mut v = vec![1.0];
        v.extend(refl.essentials[0].iter().copied());
        let x = [3.0, 4.0, 0.0];
        let dot: f64 = v.iter().zip(x.iter()).map(|(a, b)| a * b).sum();
        let mut hx = [0.0; 3];
        for i in 0..3 {
            hx[i] = x[i] - tau * dot * v[i];
        }
        assert_relative_eq!(hx[1], 0.0, epsilon = 1e-10);
        assert_relative_eq!(hx[2], 0.0, epsilon = 1e-10);
        assert_relative_eq!(hx[0].abs(), 5.0, epsilon = 1e-10);
    }
}
