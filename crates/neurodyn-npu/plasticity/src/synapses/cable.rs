// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Weight/bias block shared by every dense synapse.
//!
//! A cable owns the `inputs`, `outputs`, `weights`, `biases` and `key`
//! compartments of its synapse, the optional sparse connection mask, and the
//! optimizer commit path used by the learning rules.

use super::{compute_layer, enforce_constraints};
use crate::error::{PlasticityError, Result};
use crate::optim::Optimizer;
use neurodyn_npu_neural::{
    initialize_params, sparse_mask, Archive, CompartmentMap, PrngKey, Tensor, WeightInit,
};
use std::path::Path;

/// Construction parameters of a dense cable
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CableParameters {
    pub weight_init: WeightInit,
    /// `None` disables biases
    pub bias_init: Option<WeightInit>,
    /// Fixed scale applied to weights in the forward pass
    pub resist_scale: f32,
    /// Connection probability in `(0, 1]`
    pub p_conn: f32,
    /// Re-draw weights and biases from the initializers on reset
    pub reinit_on_reset: bool,
}

impl Default for CableParameters {
    fn default() -> Self {
        Self {
            weight_init: WeightInit::uniform(0.0, 0.3),
            bias_init: None,
            resist_scale: 1.0,
            p_conn: 1.0,
            reinit_on_reset: false,
        }
    }
}

impl CableParameters {
    pub fn validate(&self) -> Result<()> {
        self.weight_init.validate()?;
        if let Some(init) = &self.bias_init {
            init.validate()?;
        }
        if !(self.p_conn > 0.0 && self.p_conn <= 1.0) {
            return Err(PlasticityError::InvalidParameter(format!(
                "p_conn must be in (0, 1] (got {})",
                self.p_conn
            )));
        }
        Ok(())
    }
}

/// Weight bounds applied after every commit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Constraints {
    /// 0 disables clipping
    pub w_bound: f32,
    pub is_nonnegative: bool,
}

#[derive(Debug, Clone)]
pub struct Cable {
    n_in: usize,
    n_out: usize,
    resist_scale: f32,
    weight_init: WeightInit,
    bias_init: Option<WeightInit>,
    reinit_on_reset: bool,
    mask: Option<Tensor>,
}

/// `(W, b)` drawn from the initializers; unbiased cables get zero biases
fn draw_params(
    weight_init: &WeightInit,
    bias_init: Option<&WeightInit>,
    shape: (usize, usize),
    weight_key: PrngKey,
    bias_key: PrngKey,
) -> Result<(Tensor, Tensor)> {
    let weights = initialize_params(weight_key, weight_init, shape)?;
    let biases = match bias_init {
        Some(init) => initialize_params(bias_key, init, (1, shape.1))?,
        None => Tensor::zeros((1, shape.1)),
    };
    Ok((weights, biases))
}

impl Cable {
    /// Declare the cable's compartments on `compartments` and draw its parameters
    pub fn build(
        compartments: &mut CompartmentMap,
        shape: (usize, usize),
        batch_size: usize,
        params: &CableParameters,
        key: PrngKey,
    ) -> Result<Self> {
        params.validate()?;
        let (n_in, n_out) = shape;
        let keys = key.split(4);
        let (mut weights, biases) =
            draw_params(&params.weight_init, params.bias_init.as_ref(), shape, keys[1], keys[2])?;
        let mask = if params.p_conn < 1.0 {
            let mask = sparse_mask(keys[3], params.p_conn, shape);
            weights *= &mask;
            Some(mask)
        } else {
            None
        };
        compartments
            .declare("inputs", Tensor::zeros((batch_size, n_in)))
            .declare("outputs", Tensor::zeros((batch_size, n_out)))
            .declare("weights", weights)
            .declare("biases", biases)
            .declare("key", keys[0]);
        Ok(Self {
            n_in,
            n_out,
            resist_scale: params.resist_scale,
            weight_init: params.weight_init,
            bias_init: params.bias_init,
            reinit_on_reset: params.reinit_on_reset,
            mask,
        })
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.n_in, self.n_out)
    }

    pub fn has_bias(&self) -> bool {
        self.bias_init.is_some()
    }

    pub fn mask(&self) -> Option<&Tensor> {
        self.mask.as_ref()
    }

    /// `outputs = inputs · (W·resist_scale) + b` using the stored weights
    pub fn forward(&self, compartments: &CompartmentMap) -> Result<Tensor> {
        self.forward_with(compartments, compartments.tensor("weights")?)
    }

    /// Forward pass through an explicit (e.g. modulated) weight matrix
    pub fn forward_with(&self, compartments: &CompartmentMap, weights: &Tensor) -> Result<Tensor> {
        Ok(compute_layer(
            compartments.tensor("inputs")?,
            weights,
            compartments.tensor("biases")?,
            self.resist_scale,
        ))
    }

    /// Run the optimizer over `(W, b)` and `(dW, db)`, then clip and remask
    pub fn commit(
        &self,
        compartments: &mut CompartmentMap,
        optimizer: &mut dyn Optimizer,
        dw: Tensor,
        db: Option<Tensor>,
        constraints: Constraints,
    ) -> Result<()> {
        let mut theta = vec![compartments.tensor("weights")?.clone()];
        let mut updates = vec![dw];
        if let Some(db) = db.filter(|_| self.has_bias()) {
            theta.push(compartments.tensor("biases")?.clone());
            updates.push(db);
        }
        let mut next = optimizer.step(&theta, &updates)?.into_iter();
        let weights = next.next().ok_or_else(|| {
            PlasticityError::OptimizerState(format!("{} returned no parameters", optimizer.name()))
        })?;
        let mut weights = enforce_constraints(&weights, constraints.w_bound, constraints.is_nonnegative);
        if let Some(mask) = &self.mask {
            weights *= mask;
        }
        compartments.set_tensor("weights", weights)?;
        if let Some(biases) = next.next() {
            compartments.set_tensor("biases", biases)?;
        }
        Ok(())
    }

    /// Zero `inputs`/`outputs` at a (possibly new) batch size; with
    /// `reinit_on_reset`, also re-draw `(W, b)` from a split of `key`
    pub fn reset(&self, compartments: &mut CompartmentMap, batch_size: usize) -> Result<()> {
        compartments.reshape("inputs", Tensor::zeros((batch_size, self.n_in)))?;
        compartments.reshape("outputs", Tensor::zeros((batch_size, self.n_out)))?;
        if self.reinit_on_reset {
            let keys = compartments.key("key")?.split(3);
            let (mut weights, biases) = draw_params(
                &self.weight_init,
                self.bias_init.as_ref(),
                (self.n_in, self.n_out),
                keys[1],
                keys[2],
            )?;
            if let Some(mask) = &self.mask {
                weights *= mask;
            }
            compartments.set_tensor("weights", weights)?;
            compartments.set_tensor("biases", biases)?;
            compartments.set_key("key", keys[0])?;
        }
        Ok(())
    }

    /// Archive holding `weights` and, when enabled, `biases`
    pub fn archive(&self, name: &str, compartments: &CompartmentMap) -> Result<Archive> {
        let mut archive = Archive::new(name).with_tensor("weights", compartments.tensor("weights")?.clone());
        if self.has_bias() {
            archive = archive.with_tensor("biases", compartments.tensor("biases")?.clone());
        }
        Ok(archive)
    }

    /// Keys a saved archive of this cable must contain, plus `extra`
    pub fn archive_keys<'a>(&self, extra: &[&'a str]) -> Vec<&'a str> {
        let mut keys = vec!["weights"];
        if self.has_bias() {
            keys.push("biases");
        }
        keys.extend_from_slice(extra);
        keys
    }

    pub fn restore(&self, archive: &Archive, compartments: &mut CompartmentMap) -> Result<()> {
        compartments.set_tensor("weights", archive.tensor("weights")?)?;
        if self.has_bias() {
            compartments.set_tensor("biases", archive.tensor("biases")?)?;
        }
        Ok(())
    }

    pub fn save(&self, name: &str, compartments: &CompartmentMap, directory: &Path) -> Result<()> {
        self.archive(name, compartments)?.write(directory)?;
        Ok(())
    }

    pub fn load(&self, name: &str, compartments: &mut CompartmentMap, directory: &Path) -> Result<()> {
        let archive = Archive::read(directory, name)?;
        archive.expect_exact_keys(&self.archive_keys(&[]))?;
        self.restore(&archive, compartments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optim::Sgd;
    use ndarray::array;

    fn cable(params: CableParameters) -> (Cable, CompartmentMap) {
        let mut c = CompartmentMap::new("w");
        let cable = Cable::build(&mut c, (3, 2), 1, &params, PrngKey::new(9)).unwrap();
        (cable, c)
    }

    #[test]
    fn test_build_declares_compartments() {
        let (cable, c) = cable(CableParameters::default());
        assert_eq!(c.list_compartments(), ["inputs", "outputs", "weights", "biases", "key"]);
        assert_eq!(c.tensor("weights").unwrap().dim(), (3, 2));
        assert_eq!(c.tensor("biases").unwrap(), &Tensor::zeros((1, 2)));
        assert!(!cable.has_bias());
    }

    #[test]
    fn test_sparse_mask_zeroes_weights() {
        let params = CableParameters {
            weight_init: WeightInit::Constant { value: 1.0 },
            p_conn: 0.5,
            ..CableParameters::default()
        };
        let (cable, c) = cable(params);
        let mask = cable.mask().unwrap();
        assert_eq!(c.tensor("weights").unwrap(), mask);
    }

    #[test]
    fn test_commit_clips_and_remasks() {
        let params = CableParameters {
            weight_init: WeightInit::Constant { value: 0.5 },
            bias_init: Some(WeightInit::Constant { value: 0.0 }),
            ..CableParameters::default()
        };
        let (cable, mut c) = cable(params);
        let mut opt = Sgd::new(1.0);
        let dw = array![[-1.0, 1.0], [0.25, 0.0], [0.0, 0.0]];
        let constraints = Constraints {
            w_bound: 1.0,
            is_nonnegative: true,
        };
        cable
            .commit(&mut c, &mut opt, dw, Some(array![[1.0, -1.0]]), constraints)
            .unwrap();
        assert_eq!(c.tensor("weights").unwrap(), &array![[1.0, 0.0], [0.25, 0.5], [0.5, 0.5]]);
        assert_eq!(c.tensor("biases").unwrap(), &array![[-1.0, 1.0]]);
    }

    #[test]
    fn test_invalid_p_conn() {
        let mut c = CompartmentMap::new("w");
        let params = CableParameters {
            p_conn: 0.0,
            ..CableParameters::default()
        };
        assert!(Cable::build(&mut c, (2, 2), 1, &params, PrngKey::new(1)).is_err());
    }

    #[test]
    fn test_reset_keeps_weights_by_default() {
        let (cable, mut c) = cable(CableParameters::default());
        let weights = c.tensor("weights").unwrap().clone();
        let key = c.key("key").unwrap();
        cable.reset(&mut c, 4).unwrap();
        assert_eq!(c.tensor("weights").unwrap(), &weights);
        assert_eq!(c.key("key").unwrap(), key);
        assert_eq!(c.tensor("inputs").unwrap().dim(), (4, 3));
    }

    #[test]
    fn test_reset_redraws_masked_weights_and_advances_key() {
        let params = CableParameters {
            p_conn: 0.9,
            reinit_on_reset: true,
            ..CableParameters::default()
        };
        let (cable, mut c) = cable(params);
        let weights = c.tensor("weights").unwrap().clone();
        let key = c.key("key").unwrap();
        cable.reset(&mut c, 1).unwrap();

        let redrawn = c.tensor("weights").unwrap().clone();
        assert_ne!(c.key("key").unwrap(), key);
        assert_ne!(redrawn, weights);
        let mask = cable.mask().unwrap();
        for (&w, &m) in redrawn.iter().zip(mask.iter()) {
            if m == 0.0 {
                assert_eq!(w, 0.0);
            } else {
                assert!((0.0..=0.3).contains(&w));
            }
        }

        cable.reset(&mut c, 1).unwrap();
        assert_ne!(c.tensor("weights").unwrap(), &redrawn);
    }
}

