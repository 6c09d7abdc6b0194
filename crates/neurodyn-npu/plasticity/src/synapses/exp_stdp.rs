// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Exponential STDP Synapse
//!
//! Traces are derived from each unit's time of last spike instead of being
//! carried by separate trace cells.
//!
//! ```text
//! seen' = max(seen, s)
//! x = exp(-(t - tols)/tau)   where seen, else 0
//! dW = A+·(exp(-β·W) ⊙ (x_preᵀ·post) - exp(-β·(w_bound - W)) ⊙ (x_tarᵀ·post))
//!      - A-·(preᵀ·x_post)
//! ```

use super::cable::Cable;
use super::trace_stdp::STDPParameters;
use crate::error::Result;
use crate::optim::Optimizer;
use ndarray::{Axis, Zip};
use neurodyn_npu_neural::{Command, CompartmentMap, Component, NeuralError, PrngKey, StepClock, Tensor};
use std::any::Any;
use std::path::Path;
use tracing::{debug, trace};

/// Trace implied by the time of last spike at time `t`
///
/// `seen` flags units that have spiked at least once; `tols` of the others
/// is meaningless (a spike at `t = 0` and no spike both leave `tols = 0`).
pub fn trace_from_tols(t: f32, tols: &Tensor, seen: &Tensor, tau: f32) -> Tensor {
    let mut x = Tensor::zeros(tols.dim());
    Zip::from(&mut x).and(tols).and(seen).for_each(|x, &last, &seen| {
        if seen > 0.0 {
            *x = (-(t - last) / tau).exp();
        }
    });
    x
}

/// `seen' = max(seen, spikes)`
pub fn mark_seen(seen: &Tensor, spikes: &Tensor) -> Tensor {
    let mut out = seen.clone();
    Zip::from(&mut out).and(spikes).for_each(|m, &s| *m = m.max(s));
    out
}

/// Spike and last-spike statistics feeding one update
#[derive(Debug, Clone, Copy)]
pub struct SpikeStats<'a> {
    pub pre: &'a Tensor,
    pub pre_tols: &'a Tensor,
    pub pre_seen: &'a Tensor,
    pub post: &'a Tensor,
    pub post_tols: &'a Tensor,
    pub post_seen: &'a Tensor,
}

/// Pure exponential STDP update at time `t` (before `sign_val`)
pub fn calc_update(params: &STDPParameters, t: f32, stats: SpikeStats<'_>, weights: &Tensor) -> Tensor {
    let x_pre = trace_from_tols(t, stats.pre_tols, stats.pre_seen, params.tau_plus);
    let x_post = trace_from_tols(t, stats.post_tols, stats.post_seen, params.tau_minus);
    let causal = x_pre.t().dot(stats.post);
    // x_tarᵀ·post: every row is x_tar·colsum(post)
    let target = stats.post.sum_axis(Axis(0)).insert_axis(Axis(0)) * params.pre_trace_target;
    let depress = stats.pre.t().dot(&x_post);

    let (beta, bound) = (params.exp_beta, params.w_bound);
    let mut dw = Tensor::zeros(weights.dim());
    Zip::indexed(&mut dw)
        .and(weights)
        .and(&causal)
        .and(&depress)
        .for_each(|(_, j), d, &w, &c, &n| {
            let pos = (-beta * w).exp() * c - (-beta * (bound - w)).exp() * target[[0, j]];
            *d = params.a_plus * pos - params.a_minus * n;
        });
    dw
}

/// Compartments: `inputs`, `outputs`, `pre`, `post`, `pre_tols`,
/// `post_tols`, `pre_seen`, `post_seen`, `weights`, `biases`, `dW`, `key`.
#[derive(Debug)]
pub struct ExpSTDPSynapse {
    name: String,
    batch_size: usize,
    params: STDPParameters,
    cable: Cable,
    optimizer: Box<dyn Optimizer>,
    compartments: CompartmentMap,
}

impl ExpSTDPSynapse {
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
            .declare("pre_tols", Tensor::zeros((batch_size, n_in)))
            .declare("post", Tensor::zeros((batch_size, n_out)))
            .declare("post_tols", Tensor::zeros((batch_size, n_out)))
            .declare("pre_seen", Tensor::zeros((batch_size, n_in)))
            .declare("post_seen", Tensor::zeros((batch_size, n_out)))
            .declare("dW", Tensor::zeros(shape));
        debug!(synapse = name, ?shape, beta = params.exp_beta, "exponential STDP synapse created");
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

    pub fn evolve(&mut self, clock: StepClock) -> Result<()> {
        let pre_seen = mark_seen(self.compartments.tensor("pre_seen")?, self.compartments.tensor("pre")?);
        let post_seen = mark_seen(self.compartments.tensor("post_seen")?, self.compartments.tensor("post")?);
        self.compartments.set_tensor("pre_seen", pre_seen)?;
        self.compartments.set_tensor("post_seen", post_seen)?;
        let c = &self.compartments;
        let stats = SpikeStats {
            pre: c.tensor("pre")?,
            pre_tols: c.tensor("pre_tols")?,
            pre_seen: c.tensor("pre_seen")?,
            post: c.tensor("post")?,
            post_tols: c.tensor("post_tols")?,
            post_seen: c.tensor("post_seen")?,
        };
        let dw = calc_update(&self.params, clock.t, stats, c.tensor("weights")?) * self.params.sign_val;
        trace!(synapse = %self.name, t = clock.t, dw_sum = dw.sum(), "exponential STDP evolve");
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
        c.reshape("pre_tols", Tensor::zeros((batch_size, n_in)))?;
        c.reshape("post", Tensor::zeros((batch_size, n_out)))?;
        c.reshape("post_tols", Tensor::zeros((batch_size, n_out)))?;
        c.reshape("pre_seen", Tensor::zeros((batch_size, n_in)))?;
        c.reshape("post_seen", Tensor::zeros((batch_size, n_out)))?;
        c.set_tensor("dW", Tensor::zeros((n_in, n_out)))?;
        self.batch_size = batch_size;
        Ok(())
    }
}

impl Component for ExpSTDPSynapse {
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

    fn execute(&mut self, command: Command, clock: StepClock) -> neurodyn_npu_neural::Result<()> {
        match command {
            Command::Advance => Ok(self.advance()?),
            Command::Evolve => Ok(self.evolve(clock)?),
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
