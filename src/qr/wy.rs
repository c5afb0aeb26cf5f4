//! WY representation accumulator (C3): folds the per-column Householder
//! reflectors of a panel into the compact product form
//! `I - W * Yᵀ`.

use nalgebra::{DMatrix, DVector};

use crate::qr::panel_qr::PanelReflectors;

/// Expands column `c`'s essential vector into the full length-`p` reflector
/// vector `v_c` (zero above the diagonal entry, `1` on it, essential tail
/// below).
fn full_reflector_vector(p: usize, c: usize, essential: &DVector<f64>) -> DVector<f64> {
    let mut v = DVector::zeros(p);
    v[c] = 1.0;
    for (i, &e) in essential.iter().enumerate() {
        v[c + 1 + i] = e;
    }
    v
}

/// Builds the `p x q` `W` and `Y` factors of the WY representation from a
/// panel's Householder reflectors, via the standard recurrence:
///
/// ```text
/// Y[:,0] = v_0                       W[:,0] = tau_0 * v_0
/// z      = tau_c * (v_c - W*(Yᵀ*v_c))
/// Y[:,c] = v_c                       W[:,c] = z
/// ```
pub fn wy_accumulate(p: usize, reflectors: &PanelReflectors) -> (DMatrix<f64>, DMatrix<f64>) {
    let q = reflectors.q;
    let mut w = DMatrix::zeros(p, q);
    let mut y = DMatrix::zeros(p, q);

    for c in 0..q {
        let v = full_reflector_vector(p, c, &reflectors.essentials[c]);
        let tau = reflectors.taus[c];

        if c == 0 {
            w.set_column(0, &(&v * tau));
            y.set_column(0, &v);
        } else {
            let y_prev = y.columns(0, c);
            let w_prev = w.columns(0, c);
            let yt_v = y_prev.transpose() * &v;
            let w_yt_v = &w_prev * yt_v;
            let z = (&v - w_yt_v) * tau;
            w.set_column(c, &z);
            y.set_column(c, &v);
        }
    }

    (w, y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qr::panel_householder_qr;
    use approx::assert_relative_eq;
    use nalgebra::DMatrix;

    #[test]
    fn wy_product_matches_explicit_reflector_chain() {
        let j = DMatrix::from_row_slice(
            4,
            2,
            &[4.0, 1.0, 1.0, 3.0, 2.0, 0.0, 0.0, 2.0],
        );
        let refl = panel_householder_qr(&j).unwrap();
        let (w, y) = wy_accumulate(4, &refl);

        // (I - W*Y^T) applied to J's columns should match applying each
        // Householder reflector in turn.
        let q_implicit = DMatrix::<f64>::identity(4, 4) - &w * y.transpose();

        let mut explicit = DMatrix::<f64>::identity(4, 4);
        for c in 0..refl.q {
            let mut v = DVector::zeros(4);
            v[c] = 1.0;
            for (i, &e) in refl.essentials[c].iter().enumerate() {
                v[c + 1 + i] = e;
            }
            let h = DMatrix::<f64>::identity(4, 4) - &v * v.transpose() * refl.taus[c];
            explicit = &h * explicit;
        }
        // explicit accumulates H_{q-1} * ... * H_0, i.e. Q^T; q_implicit is Q.
        let explicit_qt = explicit;
        let product = &q_implicit * &explicit_qt;
        for i in 0..4 {
            for k in 0..4 {
                let expected = if i == k { 1.0 } else { 0.0 };
                assert_relative_eq!(product[(i, k)], expected, epsilon = 1e-9);
            }
        }
    }
}
