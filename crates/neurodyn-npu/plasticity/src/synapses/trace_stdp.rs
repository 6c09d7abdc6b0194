// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Trace-based STDP Synapse
//!
//! Pair-based STDP driven by pre/post spike traces produced upstream (for
//! example by [`VarTrace`](neurodyn_npu_neural::VarTrace) cells).
//!
//! ```text
//! dW = A+·((x_pre - x_tar)ᵀ · post) - A-·(preᵀ · x_post)
//! mu > 0:  potentiation ⊙ (w_bound - W)^mu,  depression ⊙ W^mu
//! W = clip(optimizer(W, dW·sign_val), 0, w_bound)
//! ```

use super::cable::{Cable, CableParameters, Constraints};
use crate::error::{PlasticityError, Result};
use crate::optim::{Optimizer, OptimizerKind};
use core::str::FromStr;
use ndarray::Zip;
use neurodyn_config::NeurodynConfig;
use neurodyn_npu_neural::{Command, CompartmentMap, Component, NeuralError, PrngKey, StepClock, Tensor};
use std::any::Any;
use std::path::Path;
use tracing::{debug, trace};

/// Parameters shared by the STDP synapses
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct STDPParameters {
    pub eta: f32,
    /// Potentiation strength
    pub a_plus: f32,
    /// Depression strength
    pub a_minus: f32,
    /// Power-law exponent (0 disables weight dependence)
    pub mu: f32,
    /// Presynaptic trace target `x_tar`
    pub pre_trace_target: f32,
    pub w_bound: f32,
    /// Weight-dependence strength of the exponential rule
    pub exp_beta: f32,
    /// Presynaptic trace time constant of the exponential rule
    pub tau_plus: f32,
    /// Postsynaptic trace time constant of the exponential rule
    pub tau_minus: f32,
    pub sign_val: f32,
    pub optimizer: OptimizerKind,
    pub cable: CableParameters,
}

impl Default for STDPParameters {
    fn default() -> Self {
        Self {
            eta: 1.0,
            a_plus: 1.0,
            a_minus: 0.0,
            mu: 0.0,
            pre_trace_target: 0.0,
            w_bound: 1.0,
            exp_beta: 1.0,
            tau_plus: 10.0,
            tau_minus: 10.0,
            sign_val: -1.0,
            optimizer: OptimizerKind::Sgd,
            cable: CableParameters::default(),
        }
    }
}

impl STDPParameters {
    pub fn from_config(config: &NeurodynConfig) -> Result<Self> {
        let stdp = &config.stdp;
        let params = Self {
            eta: stdp.eta,
            a_plus: stdp.a_plus,
            a_minus: stdp.a_minus,
            mu: stdp.mu,
            pre_trace_target: stdp.pre_trace_target,
            w_bound: stdp.w_bound,
            exp_beta: stdp.exp_beta,
            tau_plus: stdp.tau_plus,
            tau_minus: stdp.tau_minus,
            sign_val: stdp.sign_val,
            optimizer: OptimizerKind::from_str(&stdp.optim_type)?,
            cable: CableParameters {
                resist_scale: stdp.resist_scale,
                ..CableParameters::default()
            },
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        if self.mu < 0.0 {
            return Err(PlasticityError::InvalidParameter(format!(
                "STDP: mu must be >= 0 (got {})",
                self.mu
            )));
        }
        if self.w_bound < 0.0 {
            return Err(PlasticityError::InvalidParameter(format!(
                "STDP: w_bound must be >= 0 (got {})",
                self.w_bound
            )));
        }
        if !(self.tau_plus > 0.0 && self.tau_minus > 0.0) {
            return Err(PlasticityError::InvalidParameter(
                "STDP: tau_plus and tau_minus must be > 0".into(),
            ));
        }
        self.cable.validate()
    }

    pub(crate) fn constraints(&self) -> Constraints {
        Constraints {
            w_bound: self.w_bound,
            is_nonnegative: true,
        }
    }
}

/// Statistics feeding one trace STDP update
#[derive(Debug, Clone, Copy)]
pub struct TraceStats<'a> {
    pub pre: &'a Tensor,
    pub x_pre: &'a Tensor,
    pub post: &'a Tensor,
    pub x_post: &'a Tensor,
}

/// Pure trace STDP update (before `sign_val`)
pub fn calc_update(params: &STDPParameters, stats: TraceStats<'_>, weights: &Tensor) -> Tensor {
    let x_tar = params.pre_trace_target;
    let mut dw_pos = stats.x_pre.mapv(|x| x - x_tar).t().dot(stats.post);
    let mut dw_neg = stats.pre.t().dot(stats.x_post);
    if params.mu > 0.0 {
        let (mu, bound) = (params.mu, params.w_bound);
        Zip::from(&mut dw_pos)
            .and(&mut dw_neg)
            .and(weights)
            .for_each(|p, n, &w| {
                *p *= (bound - w).max(0.0).powf(mu);
                *n *= w.max(0.0).powf(mu);
            });
    }
    dw_pos * params.a_plus - dw_neg * params.a_minus
}

/// Compartments: `inputs`, `outputs`, `pre`, `post`, `pre_trace`,
/// `post_trace`, `weights`, `biases`, `dW`, `key`.
#[derive(Debug)]
pub struct TraceSTDPSynapse {
    name: String,
    batch_size: usize,
    params: STDPParameters,
    cable: Cable,
    optimizer: Box<dyn Optimizer>,
    compartments: CompartmentMap,
}

impl TraceSTDPSynapse {
    pub fn new(
        name: &str,
        shape: (usize, usize),
        batch_size: usize,
        params: STDPParameters,
        key: PrngKey,
    ) -> Result<Self> {
        params.validate()?;
        let (n_in, n_out) = shape;
        let mut compartments = CompartmentMap::new(name);
        let cable = Cable::build(&mut compartments, shape, batch_size, &params.cable, key)?;
        compartments
            .declare("pre", Tensor::zeros((batch_size, n_in)))
            .declare("pre_trace", Tensor::zeros((batch_size, n_in)))
            .declare("post", Tensor::zeros((batch_size, n_out)))
            .declare("post_trace", Tensor::zeros((batch_size, n_out)))
            .declare("dW", Tensor::zeros(shape));
        debug!(synapse = name, ?shape, mu = params.mu, "trace STDP synapse created");
        Ok(Self {
            name: name.to_string(),
            batch_size,
            optimizer: params.optimizer.build(params.eta),
            params,
            cable,
            compartments,
        })
    }

    pub fn advance(&mut self) -> Result<()> {
        let outputs = self.cable.forward(&self.compartments)?;
        self.compartments.set_tensor("outputs", outputs)?;
        Ok(())
    }

    pub fn evolve(&mut self) -> Result<()> {
        let c = &self.compartments;
        let stats = TraceStats {
            pre: c.tensor("pre")?,
            x_pre: c.tensor("pre_trace")?,
            post: c.tensor("post")?,
            x_post: c.tensor("post_trace")?,
        };
        let dw = calc_update(&self.params, stats, c.tensor("weights")?) * self.params.sign_val;
        trace!(synapse = %self.name, dw_sum = dw.sum(), "trace STDP evolve");
        self.compartments.set_tensor("dW", dw.clone())?;
        self.cable.commit(
            &mut self.compartments,
            self.optimizer.as_mut(),
            dw,
            None,
            self.params.constraints(),
        )
    }

    pub fn reset_batch(&mut self, batch_size: usize) -> Result<()> {
        let (n_in, n_out) = self.cable.shape();
        self.cable.reset(&mut self.compartments, batch_size)?;
        let c = &mut self.compartments;
        c.reshape("pre", Tensor::zeros((batch_size, n_in)))?;
        c.reshape("pre_trace", Tensor::zeros((batch_size, n_in)))?;
        c.reshape("post", Tensor::zeros((batch_size, n_out)))?;
        c.reshape("post_trace", Tensor::zeros((batch_size, n_out)))?;
        c.set_tensor("dW", Tensor::zeros((n_in, n_out)))?;
        self.batch_size = batch_size;
        Ok(())
    }
}

impl Component for TraceSTDPSynapse {
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

    #[test]
    fn test_causal_pairing_potentiates() {
        let params = STDPParameters {
            a_plus: 1.0,
            a_minus: 0.5,
            ..STDPParameters::default()
        };
        let stats = TraceStats {
            pre: &array![[0.0, 0.0]],
            x_pre: &array![[0.8, 0.0]],
            post: &array![[1.0]],
            x_post: &array![[1.0]],
        };
        let dw = calc_update(&params, stats, &Tensor::zeros((2, 1)));
        assert!((dw[[0, 0]] - 0.8).abs() < 1e-6);
        assert_eq!(dw[[1, 0]], 0.0);
    }

    #[test]
    fn test_anti_causal_pairing_depresses() {
        let params = STDPParameters {
            a_plus: 1.0,
            a_minus: 0.5,
            ..STDPParameters::default()
        };
        let stats = TraceStats {
            pre: &array![[1.0]],
            x_pre: &array![[1.0]],
            post: &array![[0.0]],
            x_post: &array![[0.6]],
        };
        let dw = calc_update(&params, stats, &Tensor::zeros((1, 1)));
        assert!((dw[[0, 0]] + 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_power_law_weight_dependence() {
        let params = STDPParameters {
            a_plus: 1.0,
            a_minus: 1.0,
            mu: 1.0,
            w_bound: 1.0,
            ..STDPParameters::default()
        };
        let stats = TraceStats {
            pre: &array![[1.0]],
            x_pre: &array![[1.0]],
            post: &array![[1.0]],
            x_post: &array![[1.0]],
        };
        // (1 - 0.75)·1 - 0.75·1
        let dw = calc_update(&params, stats, &array![[0.75]]);
        assert!((dw[[0, 0]] + 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_evolve_moves_weights_toward_hebbian_direction() {
        let params = STDPParameters {
            eta: 0.1,
            cable: CableParameters {
                weight_init: WeightInit::Constant { value: 0.5 },
                ..CableParameters::default()
            },
            ..STDPParameters::default()
        };
        let mut syn = TraceSTDPSynapse::new("w", (1, 1), 1, params, PrngKey::new(2)).unwrap();
        let c = syn.compartments_mut();
        c.set_tensor("pre_trace", array![[1.0]]).unwrap();
        c.set_tensor("post", array![[1.0]]).unwrap();
        syn.execute(Command::Evolve, StepClock::new(0.0, 1.0)).unwrap();
        let w = syn.compartments().tensor("weights").unwrap()[[0, 0]];
        assert!((w - 0.6).abs() < 1e-6);
        assert!((syn.compartments().tensor("dW").unwrap()[[0, 0]] + 1.0).abs() < 1e-6);
    }
}
