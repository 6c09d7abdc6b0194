// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Random initialization of parameter matrices.

use super::compartment::Tensor;
use super::error::{NeuralError, Result};
use super::key::PrngKey;
use ndarray::Array2;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

/// Initialization kernel for a parameter matrix
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "dist", rename_all = "snake_case")]
pub enum WeightInit {
    Uniform { amin: f32, amax: f32 },
    Gaussian { mu: f32, sigma: f32 },
    Constant { value: f32 },
}

impl WeightInit {
    pub fn uniform(amin: f32, amax: f32) -> Self {
        WeightInit::Uniform { amin, amax }
    }

    pub fn validate(&self) -> Result<()> {
        match *self {
            WeightInit::Uniform { amin, amax } if amin > amax => Err(NeuralError::InvalidParameter(
                format!("uniform init requires amin <= amax (got {} > {})", amin, amax),
            )),
            WeightInit::Gaussian { sigma, .. } if !(sigma >= 0.0) => Err(
                NeuralError::InvalidParameter(format!("gaussian init requires sigma >= 0 (got {})", sigma)),
            ),
            _ => Ok(()),
        }
    }
}

/// Draw a `shape` matrix from `init` using `key`
pub fn initialize_params(key: PrngKey, init: &WeightInit, shape: (usize, usize)) -> Result<Tensor> {
    init.validate()?;
    let mut rng = key.rng();
    let values = match *init {
        WeightInit::Uniform { amin, amax } if amin == amax => Array2::from_elem(shape, amin),
        WeightInit::Uniform { amin, amax } => Array2::from_shape_simple_fn(shape, || rng.gen_range(amin..amax)),
        WeightInit::Gaussian { mu, sigma } => {
            let normal = Normal::new(mu, sigma)
                .map_err(|e| NeuralError::InvalidParameter(format!("gaussian init: {}", e)))?;
            Array2::from_shape_simple_fn(shape, || normal.sample(&mut rng))
        }
        WeightInit::Constant { value } => Array2::from_elem(shape, value),
    };
    Ok(values)
}

/// Binary mask keeping each entry with probability `p_conn`
pub fn sparse_mask(key: PrngKey, p_conn: f32, shape: (usize, usize)) -> Tensor {
    let mut rng = key.rng();
    Array2::from_shape_simple_fn(shape, || if rng.gen::<f32>() < p_conn { 1.0 } else { 0.0 })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_init_within_bounds() {
        let w = initialize_params(PrngKey::new(3), &WeightInit::uniform(0.025, 1.0), (8, 8)).unwrap();
        assert!(w.iter().all(|&x| (0.025..1.0).contains(&x)));
    }

    #[test]
    fn test_init_is_reproducible_per_key() {
        let init = WeightInit::Gaussian { mu: 0.0, sigma: 0.1 };
        let a = initialize_params(PrngKey::new(5), &init, (3, 4)).unwrap();
        let b = initialize_params(PrngKey::new(5), &init, (3, 4)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_invalid_uniform_rejected() {
        assert!(initialize_params(PrngKey::new(1), &WeightInit::uniform(1.0, 0.0), (2, 2)).is_err());
    }

    #[test]
    fn test_sparse_mask_extremes() {
        assert!(sparse_mask(PrngKey::new(1), 1.0, (4, 4)).iter().all(|&m| m == 1.0));
        assert!(sparse_mask(PrngKey::new(1), 0.0, (4, 4)).iter().all(|&m| m == 0.0));
    }
}
