// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Adam with bias-corrected moment estimates.
//!
//! ```text
//! m' = β1·m + (1 - β1)·g        v' = β2·v + (1 - β2)·g²
//! θ' = θ - η · (m'/(1 - β1^t)) / (sqrt(v'/(1 - β2^t)) + ε)
//! ```

use super::{check_pairs, Optimizer};
use crate::error::{PlasticityError, Result};
use ndarray::Zip;
use neurodyn_npu_neural::Tensor;

#[derive(Debug, Clone)]
pub struct Adam {
    pub eta: f32,
    pub beta1: f32,
    pub beta2: f32,
    pub epsilon: f32,
    time: i32,
    m: Vec<Tensor>,
    v: Vec<Tensor>,
}

impl Adam {
    pub fn new(eta: f32) -> Self {
        Self {
            eta,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            time: 0,
            m: Vec::new(),
            v: Vec::new(),
        }
    }

    /// Number of steps taken so far
    pub fn time(&self) -> i32 {
        self.time
    }

    fn ensure_moments(&mut self, theta: &[Tensor]) -> Result<()> {
        if self.m.is_empty() {
            self.m = theta.iter().map(|p| Tensor::zeros(p.dim())).collect();
            self.v = self.m.clone();
            return Ok(());
        }
        if self.m.len() != theta.len() {
            return Err(PlasticityError::OptimizerState(format!(
                "adam tracks {} parameters, got {}",
                self.m.len(),
                theta.len()
            )));
        }
        for (m, p) in self.m.iter().zip(theta) {
            if m.dim() != p.dim() {
                return Err(PlasticityError::OptimizerState(format!(
                    "adam moment shape {:?} does not match parameter {:?}",
                    m.dim(),
                    p.dim()
                )));
            }
        }
        Ok(())
    }
}

impl Optimizer for Adam {
    fn name(&self) -> &'static str {
        "adam"
    }

    fn step(&mut self, theta: &[Tensor], updates: &[Tensor]) -> Result<Vec<Tensor>> {
        check_pairs(theta, updates)?;
        self.ensure_moments(theta)?;
        self.time += 1;
        let (b1, b2, eps, eta) = (self.beta1, self.beta2, self.epsilon, self.eta);
        let c1 = 1.0 - b1.powi(self.time);
        let c2 = 1.0 - b2.powi(self.time);

        let mut out = Vec::with_capacity(theta.len());
        for ((p, g), (m, v)) in theta.iter().zip(updates).zip(self.m.iter_mut().zip(self.v.iter_mut())) {
            let mut next = p.clone();
            Zip::from(&mut next)
                .and(g)
                .and(m)
                .and(v)
                .for_each(|p, &g, m, v| {
                    *m = b1 * *m + (1.0 - b1) * g;
                    *v = b2 * *v + (1.0 - b2) * g * g;
                    let m_hat = *m / c1;
                    let v_hat = *v / c2;
                    *p -= eta * m_hat / (v_hat.sqrt() + eps);
                });
            out.push(next);
        }
        Ok(out)
    }
}
