// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Optimizers
//!
//! An optimizer turns a parameter set and a matching set of updates into a
//! new parameter set. Updates follow the descent convention (`θ' = θ - η·Δ`);
//! synapses flip their Hebbian ascent direction with `sign_val` before
//! handing updates over.

pub mod adam;
pub mod sgd;

pub use adam::Adam;
pub use sgd::Sgd;

use crate::error::{PlasticityError, Result};
use core::fmt;
use core::str::FromStr;
use neurodyn_npu_neural::{NeuralError, Tensor};

/// Stateful parameter update rule
pub trait Optimizer: fmt::Debug + Send {
    fn name(&self) -> &'static str;

    /// Return `theta` moved along `updates`
    fn step(&mut self, theta: &[Tensor], updates: &[Tensor]) -> Result<Vec<Tensor>>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OptimizerKind {
    #[default]
    Sgd,
    Adam,
}

impl OptimizerKind {
    pub fn build(self, eta: f32) -> Box<dyn Optimizer> {
        match self {
            OptimizerKind::Sgd => Box::new(Sgd::new(eta)),
            OptimizerKind::Adam => Box::new(Adam::new(eta)),
        }
    }
}

impl FromStr for OptimizerKind {
    type Err = PlasticityError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sgd" => Ok(OptimizerKind::Sgd),
            "adam" => Ok(OptimizerKind::Adam),
            other => Err(PlasticityError::UnknownOptimizer(other.to_string())),
        }
    }
}

/// Parameters and updates must pair up one-to-one with equal shapes
pub(crate) fn check_pairs(theta: &[Tensor], updates: &[Tensor]) -> Result<()> {
    if theta.len() != updates.len() {
        return Err(PlasticityError::OptimizerState(format!(
            "{} parameters but {} updates",
            theta.len(),
            updates.len()
        )));
    }
    for (i, (p, u)) in theta.iter().zip(updates).enumerate() {
        if p.dim() != u.dim() {
            return Err(NeuralError::shape(format!("update {}", i), p.dim(), u.dim()).into());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optimizer_kind_parse() {
        assert_eq!("SGD".parse::<OptimizerKind>().unwrap(), OptimizerKind::Sgd);
        assert_eq!("adam".parse::<OptimizerKind>().unwrap(), OptimizerKind::Adam);
        assert!(matches!(
            "rmsprop".parse::<OptimizerKind>(),
            Err(PlasticityError::UnknownOptimizer(_))
        ));
        assert_eq!(OptimizerKind::Adam.build(0.1).name(), "adam");
    }

    #[test]
    fn test_check_pairs_rejects_mismatch() {
        let a = Tensor::zeros((2, 2));
        let b = Tensor::zeros((1, 2));
        assert!(check_pairs(&[a.clone()], &[a.clone()]).is_ok());
        assert!(check_pairs(&[a.clone()], &[]).is_err());
        assert!(check_pairs(&[a], &[b]).is_err());
    }
}
