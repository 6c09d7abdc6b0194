// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Plain stochastic gradient descent: `θ' = θ - η·Δ`

use super::{check_pairs, Optimizer};
use crate::error::Result;
use neurodyn_npu_neural::Tensor;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sgd {
    pub eta: f32,
}

impl Sgd {
    pub fn new(eta: f32) -> Self {
        Self { eta }
    }
}

impl Optimizer for Sgd {
    fn name(&self) -> &'static str {
        "sgd"
    }

    fn step(&mut self, theta: &[Tensor], updates: &[Tensor]) -> Result<Vec<Tensor>> {
        check_pairs(theta, updates)?;
        Ok(theta
            .iter()
            .zip(updates)
            .map(|(p, u)| p - &(u * self.eta))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_sgd_descends() {
        let mut opt = Sgd::new(0.5);
        let out = opt.step(&[array![[1.0, 2.0]]], &[array![[2.0, -2.0]]]).unwrap();
        assert_eq!(out[0], array![[0.0, 3.0]]);
    }
}
