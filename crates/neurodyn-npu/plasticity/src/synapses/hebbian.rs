// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Hebbian Synapse
//!
//! Two-factor Hebbian learning over a dense cable.
//!
//! ```text
//! advance: outputs = inputs · (W·resist_scale) + b
//! evolve:  dW = (pre·pre_w)ᵀ · (post·post_w)
//!          dW = dW ⊙ (w_bound - |W|)      if w_bound > 0
//!          dW = dW - W·w_decay            if w_decay > 0
//!          (dW, db) = (dW, colsum(post·post_w)) · sign_val
//!          (W, b) = optimizer((W, b), (dW, db));  W = clip(W)
//! ```

use super::cable::{Cable, CableParameters, Constraints};
use crate::error::{PlasticityError, Result};
use crate::optim::{Optimizer, OptimizerKind};
use core::str::FromStr;
use ndarray::Axis;
use neurodyn_config::NeurodynConfig;
use neurodyn_npu_neural::{Command, CompartmentMap, Component, NeuralError, PrngKey, StepClock, Tensor};
use std::any::Any;
use std::path::Path;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HebbianParameters {
    /// Global learning rate
    pub eta: f32,
    /// Soft bound and clip limit (0 disables both)
    pub w_bound: f32,
    pub is_nonnegative: bool,
    pub w_decay: f32,
    /// Multiplies the final update (-1 turns ascent into descent)
    pub sign_val: f32,
    pub optimizer: OptimizerKind,
    pub pre_wght: f32,
    pub post_wght: f32,
    pub cable: CableParameters,
}

impl Default for HebbianParameters {
    fn default() -> Self {
        Self {
            eta: 0.0,
            w_bound: 1.0,
            is_nonnegative: false,
            w_decay: 0.0,
            sign_val: 1.0,
            optimizer: OptimizerKind::Sgd,
            pre_wght: 1.0,
            post_wght: 1.0,
            cable: CableParameters::default(),
        }
    }
}

impl HebbianParameters {
    pub fn from_config(config: &NeurodynConfig) -> Result<Self> {
        let hebbian = &config.hebbian;
        let params = Self {
            eta: hebbian.eta,
            w_bound: hebbian.w_bound,
            is_nonnegative: hebbian.is_nonnegative,
            w_decay: hebbian.w_decay,
            sign_val: hebbian.sign_val,
            optimizer: OptimizerKind::from_str(&hebbian.optim_type)?,
            pre_wght: hebbian.pre_wght,
            post_wght: hebbian.post_wght,
            cable: CableParameters {
                resist_scale: hebbian.resist_scale,
                p_conn: hebbian.p_conn,
                ..CableParameters::default()
            },
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        if self.w_bound < 0.0 {
            return Err(PlasticityError::InvalidParameter(format!(
                "Hebbian: w_bound must be >= 0 (got {})",
                self.w_bound
            )));
        }
        if self.w_decay < 0.0 {
            return Err(PlasticityError::InvalidParameter(format!(
                "Hebbian: w_decay must be >= 0 (got {})",
                self.w_decay
            )));
        }
        self.cable.validate()
    }

    fn constraints(&self) -> Constraints {
        Constraints {
            w_bound: self.w_bound,
            is_nonnegative: self.is_nonnegative,
        }
    }
}

/// Pure Hebbian update: `(dW, db)`
pub fn calc_update(params: &HebbianParameters, pre: &Tensor, post: &Tensor, weights: &Tensor) -> (Tensor, Tensor) {
    let pre = pre * params.pre_wght;
    let post = post * params.post_wght;
    let mut dw = pre.t().dot(&post);
    if params.w_bound > 0.0 {
        dw = dw * &weights.mapv(|w| params.w_bound - w.abs());
    }
    if params.w_decay > 0.0 {
        dw = dw - &(weights * params.w_decay);
    }
    let db = post.sum_axis(Axis(0)).insert_axis(Axis(0));
    (dw * params.sign_val, db * params.sign_val)
}

/// Compartments: `inputs`, `outputs`, `pre`, `post`, `weights`, `biases`,
/// `dW`, `db`, `key`.
#[derive(Debug)]
pub struct HebbianSynapse {
    name: String,
    batch_size: usize,
    params: HebbianParameters,
    cable: Cable,
    optimizer: Box<dyn Optimizer>,
    compartments: CompartmentMap,
}

impl HebbianSynapse {
    pub fn new(
        name: &str,
        shape: (usize, usize),
        batch_size: usize,
        params: HebbianParameters,
        key: PrngKey,
    ) -> Result<Self> {
        params.validate()?;
        let (n_in, n_out) = shape;
        let mut compartments = CompartmentMap::new(name);
        let cable = Cable::build(&mut compartments, shape, batch_size, &params.cable, key)?;
        compartments
            .declare("pre", Tensor::zeros((batch_size, n_in)))
            .declare("post", Tensor::zeros((batch_size, n_out)))
            .declare("dW", Tensor::zeros(shape))
            .declare("db", Tensor::zeros((1, n_out)));
        debug!(
            synapse = name,
            ?shape,
            eta = params.eta,
            optimizer = ?params.optimizer,
            "Hebbian synapse created"
        );
        Ok(Self {
            name: name.to_string(),
            batch_size,
            optimizer: params.optimizer.build(params.eta),
            params,
            cable,
            compartments,
        })
    }

    pub fn params(&self) -> &HebbianParameters {
        &self.params
    }

    pub fn advance(&mut self) -> Result<()> {
        let outputs = self.cable.forward(&self.compartments)?;
        self.compartments.set_tensor("outputs", outputs)?;
        Ok(())
    }

    /// Compute `(dW, db)`, commit them through the optimizer and clip
    pub fn evolve(&mut self) -> Result<()> {
        let c = &self.compartments;
        let (dw, db) = calc_update(&self.params, c.tensor("pre")?, c.tensor("post")?, c.tensor("weights")?);
        trace!(
            synapse = %self.name,
            dw_abs_sum = dw.iter().map(|d| d.abs()).sum::<f32>(),
            "Hebbian evolve"
        );
        self.compartments.set_tensor("dW", dw.clone())?;
        self.compartments.set_tensor("db", db.clone())?;
        self.cable.commit(
            &mut self.compartments,
            self.optimizer.as_mut(),
            dw,
            Some(db),
            self.params.constraints(),
        )
    }

    pub fn reset_batch(&mut self, batch_size: usize) -> Result<()> {
        let (n_in, n_out) = self.cable.shape();
        self.cable.reset(&mut self.compartments, batch_size)?;
        let c = &mut self.compartments;
        c.reshape("pre", Tensor::zeros((batch_size, n_in)))?;
        c.reshape("post", Tensor::zeros((batch_size, n_out)))?;
        c.set_tensor("dW", Tensor::zeros((n_in, n_out)))?;
        c.set_tensor("db", Tensor::zeros((1, n_out)))?;
        self.batch_size = batch_size;
        Ok(())
    }
}

impl Component for HebbianSynapse {
    fn name(&self) -> &str {
        &self.name
    }

    fn compartments(&self) -> &CompartmentMap {
        &self.compartments
    }

    fn compartments_mut(&mut self) -> &mut CompartmentMap {
        &mut self.compartments
    }

    fn supports(&self, command: Command) -> bool {
        matches!(command, Command::Advance | Command::Evolve | Command::Reset)
    }

    fn execute(&mut self, command: Command, _clock: StepClock) -> neurodyn_npu_neural::Result<()> {
        match command {
            Command::Advance => Ok(self.advance()?),
            Command::Evolve => Ok(self.evolve()?),
            Command::Reset => Ok(self.reset_batch(self.batch_size)?),
            other => Err(NeuralError::UnknownCommand(format!("{} on {}", other, self.name))),
        }
    }

    fn save(&self, directory: &Path) -> neurodyn_npu_neural::Result<()> {
        Ok(self.cable.save(&self.name, &self.compartments, directory)?)
    }

    fn load(&mut self, directory: &Path) -> neurodyn_npu_neural::Result<()> {
        Ok(self.cable.load(&self.name, &mut self.compartments, directory)?)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use neurodyn_npu_neural::WeightInit;

    fn constant(value: f32, params: HebbianParameters) -> HebbianParameters {
        HebbianParameters {
            cable: CableParameters {
                weight_init: WeightInit::Constant { value },
                bias_init: Some(WeightInit::Constant { value: 0.0 }),
                ..params.cable
            },
            ..params
        }
    }

    #[test]
    fn test_calc_update_outer_product() {
        let params = HebbianParameters {
            w_bound: 0.0,
            ..HebbianParameters::default()
        };
        let (dw, db) = calc_update(&params, &array![[1.0, 0.0]], &array![[2.0, 3.0]], &Tensor::zeros((2, 2)));
        assert_eq!(dw, array![[2.0, 3.0], [0.0, 0.0]]);
        assert_eq!(db, array![[2.0, 3.0]]);
    }

    #[test]
    fn test_calc_update_soft_bound_decay_and_sign() {
        let params = HebbianParameters {
            w_bound: 1.0,
            w_decay: 0.5,
            sign_val: -1.0,
            ..HebbianParameters::default()
        };
        let w = array![[0.5]];
        let (dw, db) = calc_update(&params, &array![[1.0]], &array![[1.0]], &w);
        // (1·(1 - 0.5) - 0.5·0.5)·(-1)
        assert_eq!(dw, array![[-0.25]]);
        assert_eq!(db, array![[-1.0]]);
    }

    #[test]
    fn test_evolve_ascends_with_negative_sign() {
        let params = constant(
            0.2,
            HebbianParameters {
                eta: 0.1,
                w_bound: 0.0,
                sign_val: -1.0,
                ..HebbianParameters::default()
            },
        );
        let mut syn = HebbianSynapse::new("w", (2, 1), 1, params, PrngKey::new(1)).unwrap();
        syn.compartments_mut().set_tensor("pre", array![[1.0, 0.0]]).unwrap();
        syn.compartments_mut().set_tensor("post", array![[1.0]]).unwrap();
        syn.execute(Command::Evolve, StepClock::new(0.0, 1.0)).unwrap();
        let w = syn.compartments().tensor("weights").unwrap();
        assert!((w[[0, 0]] - 0.3).abs() < 1e-6);
        assert!((w[[1, 0]] - 0.2).abs() < 1e-6);
        assert!((syn.compartments().tensor("biases").unwrap()[[0, 0]] - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_evolve_respects_bounds() {
        let params = constant(
            0.9,
            HebbianParameters {
                eta: 10.0,
                w_bound: 1.0,
                is_nonnegative: true,
                sign_val: -1.0,
                ..HebbianParameters::default()
            },
        );
        let mut syn = HebbianSynapse::new("w", (3, 3), 2, params, PrngKey::new(1)).unwrap();
        syn.compartments_mut().set_tensor("pre", Tensor::ones((2, 3))).unwrap();
        syn.compartments_mut().set_tensor("post", Tensor::ones((2, 3))).unwrap();
        for _ in 0..5 {
            syn.evolve().unwrap();
            assert!(syn
                .compartments()
                .tensor("weights")
                .unwrap()
                .iter()
                .all(|&w| (0.0..=1.0).contains(&w)));
        }
    }

    #[test]
    fn test_from_config_rejects_unknown_optimizer() {
        let mut config = NeurodynConfig::default();
        config.hebbian.optim_type = "lbfgs".to_string();
        assert!(matches!(
            HebbianParameters::from_config(&config),
            Err(PlasticityError::UnknownOptimizer(_))
        ));
        config.hebbian.optim_type = "adam".to_string();
        assert_eq!(HebbianParameters::from_config(&config).unwrap().optimizer, OptimizerKind::Adam);
    }

    #[test]
    fn test_reset_reinitializes_weights_when_configured() {
        for reinit_on_reset in [false, true] {
            let base = constant(
                0.2,
                HebbianParameters {
                    eta: 0.1,
                    w_bound: 0.0,
                    sign_val: -1.0,
                    ..HebbianParameters::default()
                },
            );
            let params = HebbianParameters {
                cable: CableParameters {
                    reinit_on_reset,
                    ..base.cable
                },
                ..base
            };
            let mut syn = HebbianSynapse::new("w", (2, 1), 1, params, PrngKey::new(1)).unwrap();
            syn.compartments_mut().set_tensor("pre", array![[1.0, 1.0]]).unwrap();
            syn.compartments_mut().set_tensor("post", array![[1.0]]).unwrap();
            syn.execute(Command::Evolve, StepClock::new(0.0, 1.0)).unwrap();
            let learned = syn.compartments().tensor("weights").unwrap().clone();
            assert_ne!(learned, array![[0.2], [0.2]]);

            syn.execute(Command::Reset, StepClock::new(0.0, 1.0)).unwrap();
            let c = syn.compartments();
            if reinit_on_reset {
                assert_eq!(c.tensor("weights").unwrap(), &array![[0.2], [0.2]]);
                assert_eq!(c.tensor("biases").unwrap(), &array![[0.0]]);
            } else {
                assert_eq!(c.tensor("weights").unwrap(), &learned);
            }
        }
    }
}

