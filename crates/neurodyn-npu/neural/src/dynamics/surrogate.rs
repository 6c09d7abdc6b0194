// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Surrogate spike functions.
//!
//! The hard threshold `s = [v > thr]` has no useful derivative. The secant
//! estimator replaces it with the slope of the line from the origin to the
//! point `(j, ρ(j))` on a saturating rate curve `ρ(j) = c1·j / (1 + c2·j)`:
//!
//! ```text
//! ∂s/∂j ≈ ρ(j) / j = c1 / (1 + c2·j)    for j > 0
//!                  = 0                  otherwise
//! ```

use crate::types::Tensor;
use ndarray::Zip;

/// Default secant coefficients
pub const SECANT_C1: f32 = 0.82;
pub const SECANT_C2: f32 = 0.08;

/// Heaviside spike emission `[v > thr]`, `thr` broadcast against `v`
pub fn spike_fx(v: &Tensor, thr: &Tensor) -> Tensor {
    let mut s = Tensor::zeros(v.dim());
    Zip::from(&mut s)
        .and(v)
        .and_broadcast(thr)
        .for_each(|s, &v, &thr| *s = if v > thr { 1.0 } else { 0.0 });
    s
}

/// Secant surrogate derivative of the spike function w.r.t. current `j`
pub fn secant_lif_derivative(j: &Tensor, c1: f32, c2: f32) -> Tensor {
    j.mapv(|j| if j > 0.0 { c1 / (1.0 + c2 * j) } else { 0.0 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_spike_fx_strict_threshold() {
        let v = array![[0.5, 1.0, 1.5]];
        let thr = array![[1.0, 1.0, 1.0]];
        assert_eq!(spike_fx(&v, &thr), array![[0.0, 0.0, 1.0]]);
    }

    #[test]
    fn test_spike_fx_broadcasts_row_threshold() {
        let v = array![[2.0, 0.0], [0.0, 2.0]];
        let thr = array![[1.0, 1.0]];
        assert_eq!(spike_fx(&v, &thr), array![[1.0, 0.0], [0.0, 1.0]]);
    }

    #[test]
    fn test_secant_derivative_shape() {
        let j = array![[-1.0, 0.0, 1.0, 10.0]];
        let d = secant_lif_derivative(&j, SECANT_C1, SECANT_C2);
        assert_eq!(d[[0, 0]], 0.0);
        assert_eq!(d[[0, 1]], 0.0);
        assert!((d[[0, 2]] - 0.82 / 1.08).abs() < 1e-6);
        // saturating: larger currents get smaller slopes
        assert!(d[[0, 3]] < d[[0, 2]]);
    }
}
