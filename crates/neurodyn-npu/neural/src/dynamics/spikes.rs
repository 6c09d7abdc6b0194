// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Spike bookkeeping shared by cells and encoders.

use crate::types::{PrngKey, Tensor};
use ndarray::{Axis, Zip};
use rand::distributions::{Distribution, WeightedIndex};

/// Time-of-last-spike update: `tols' = (1 - s)·tols + s·t`
pub fn update_times(t: f32, s: &Tensor, tols: &Tensor) -> Tensor {
    let mut out = tols.clone();
    Zip::from(&mut out).and(s).for_each(|tols, &s| *tols = (1.0 - s) * *tols + s * t);
    out
}

/// Keep exactly one spike per batch row.
///
/// Rows with no spikes pass through untouched. Otherwise one unit is drawn
/// with probability proportional to its spike value and every other unit in
/// the row is cleared. `skey` must be a freshly split key.
pub fn single_spike(s: &Tensor, skey: PrngKey) -> Tensor {
    let mut rng = skey.rng();
    let mut out = s.clone();
    for mut row in out.axis_iter_mut(Axis(0)) {
        let total: f32 = row.sum();
        if total <= 0.0 {
            continue;
        }
        let chosen = match WeightedIndex::new(row.iter().map(|&w| w.max(0.0))) {
            Ok(dist) => dist.sample(&mut rng),
            Err(_) => continue,
        };
        row.fill(0.0);
        row[chosen] = 1.0;
    }
    out
}

/// Number of spikes in the whole array
pub fn spike_count(s: &Tensor) -> usize {
    s.iter().filter(|&&v| v > 0.0).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_update_times() {
        let tols = array![[1.0, 2.0, 3.0]];
        let s = array![[1.0, 0.0, 1.0]];
        assert_eq!(update_times(7.0, &s, &tols), array![[7.0, 2.0, 7.0]]);
    }

    #[test]
    fn test_single_spike_keeps_one_of_the_originals() {
        let s = array![[1.0, 0.0, 1.0, 1.0, 0.0], [0.0, 1.0, 0.0, 0.0, 1.0]];
        for seed in 0..20 {
            let out = single_spike(&s, PrngKey::new(seed));
            for (row_in, row_out) in s.outer_iter().zip(out.outer_iter()) {
                assert_eq!(row_out.sum(), 1.0);
                let idx = row_out.iter().position(|&v| v == 1.0).unwrap();
                assert_eq!(row_in[idx], 1.0);
            }
        }
    }

    #[test]
    fn test_single_spike_empty_row_is_noop() {
        let s = array![[0.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        let out = single_spike(&s, PrngKey::new(3));
        assert_eq!(out, s);
    }
}
