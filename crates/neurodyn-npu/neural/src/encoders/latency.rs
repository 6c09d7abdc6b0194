// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Latency Encoder
//!
//! Time-to-first-spike coding: stronger inputs fire earlier, each unit fires
//! at most once per episode.
//!
//! ```text
//! linear:  tau' = normalize ? num_steps - 1 - t0 : tau
//!          t_s  = min(-tau'(x - 1), -tau'(thr - 1)) + t0
//! log:     x'   = max(x, thr + eps)
//!          t_s  = ln(x' / (x' - thr))·tau + t0
//!          normalize: t_s = (t_s - t0)·(num_steps - t0 - 1)/max(t_s - t0) + t0
//!
//! emission at t:  s = [round(t_s) <= t]·(1 - mask);  mask' = mask + (1 - mask)·s
//! ```

use crate::component::{Command, Component, StepClock};
use crate::dynamics::{spike_count, update_times};
use crate::types::{CompartmentMap, NeuralError, Result, Tensor};
use ndarray::Zip;
use neurodyn_config::NeurodynConfig;
use std::any::Any;
use std::path::Path;
use tracing::{debug, trace};

/// Numerical guard added to the threshold in the logarithmic code
pub const LATENCY_EPS: f32 = 1e-7;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencyParameters {
    /// Latency time constant
    pub tau: f32,
    /// Inputs at or below this fire at the latest allowed time
    pub threshold: f32,
    pub first_spike_time: f32,
    /// Linear instead of logarithmic code
    pub linearize: bool,
    /// Rescale times to fit within `num_steps`
    pub normalize: bool,
    pub num_steps: f32,
}

impl Default for LatencyParameters {
    fn default() -> Self {
        Self {
            tau: 1.0,
            threshold: 0.01,
            first_spike_time: 0.0,
            linearize: false,
            normalize: false,
            num_steps: 1.0,
        }
    }
}

impl LatencyParameters {
    pub fn from_config(config: &NeurodynConfig) -> Result<Self> {
        let latency = &config.latency;
        let params = Self {
            tau: latency.tau,
            threshold: latency.threshold,
            first_spike_time: latency.first_spike_time,
            linearize: latency.linearize,
            normalize: latency.normalize,
            num_steps: latency.num_steps,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.tau > 0.0) {
            return Err(NeuralError::InvalidParameter("Latency: tau must be > 0".into()));
        }
        if self.normalize && self.num_steps < 1.0 {
            return Err(NeuralError::InvalidParameter(
                "Latency: num_steps must be >= 1 when normalizing".into(),
            ));
        }
        Ok(())
    }
}

/// Linear latency code
pub fn calc_spike_times_linear(data: &Tensor, params: &LatencyParameters) -> Tensor {
    let t0 = params.first_spike_time;
    let tau = if params.normalize {
        params.num_steps - 1.0 - t0
    } else {
        params.tau
    };
    let max_bound = -tau * (params.threshold - 1.0);
    data.mapv(|x| (-tau * (x - 1.0)).min(max_bound) + t0)
}

/// Logarithmic latency code
pub fn calc_spike_times_nonlinear(data: &Tensor, params: &LatencyParameters) -> Tensor {
    let t0 = params.first_spike_time;
    let thr = params.threshold;
    let floor = thr + LATENCY_EPS;
    let mut stimes = data.mapv(|x| {
        let x = x.max(floor);
        (x / (x - thr)).ln() * params.tau + t0
    });
    if params.normalize {
        let span = stimes.iter().map(|&s| s - t0).fold(f32::NEG_INFINITY, f32::max);
        if span > 0.0 {
            let scale = (params.num_steps - t0 - 1.0) / span;
            stimes.mapv_inplace(|s| (s - t0) * scale + t0);
        }
    }
    stimes
}

/// Target spike times for the current input
pub fn calc_spike_times(data: &Tensor, params: &LatencyParameters) -> Tensor {
    if params.linearize {
        calc_spike_times_linear(data, params)
    } else {
        calc_spike_times_nonlinear(data, params)
    }
}

/// Spikes due at `t` that have not fired yet: `(spikes, mask')`
pub fn extract_spike(spike_times: &Tensor, t: f32, mask: &Tensor) -> (Tensor, Tensor) {
    let mut spikes = Tensor::zeros(spike_times.dim());
    let mut mask_next = mask.clone();
    Zip::from(&mut spikes)
        .and(&mut mask_next)
        .and(spike_times)
        .for_each(|s, m, &st| {
            let due = if st.round() <= t { 1.0 } else { 0.0 };
            *s = due * (1.0 - *m);
            *m += (1.0 - *m) * *s;
        });
    (spikes, mask_next)
}

/// Compartments: `inputs`, `outputs`, `tols`, `mask`, `targ_sp_times`.
#[derive(Debug, Clone)]
pub struct LatencyCell {
    name: String,
    n_units: usize,
    batch_size: usize,
    params: LatencyParameters,
    compartments: CompartmentMap,
}

impl LatencyCell {
    pub fn new(name: &str, n_units: usize, batch_size: usize, params: LatencyParameters) -> Result<Self> {
        params.validate()?;
        let shape = (batch_size, n_units);
        let mut compartments = CompartmentMap::new(name);
        for comp in ["inputs", "outputs", "tols", "mask", "targ_sp_times"] {
            compartments.declare(comp, Tensor::zeros(shape));
        }
        debug!(cell = name, n_units, linearize = params.linearize, "latency encoder created");
        Ok(Self {
            name: name.to_string(),
            n_units,
            batch_size,
            params,
            compartments,
        })
    }

    /// Precompute target spike times from the current `inputs`
    pub fn calc_spike_times(&mut self) -> Result<()> {
        let stimes = calc_spike_times(self.compartments.tensor("inputs")?, &self.params);
        self.compartments.set_tensor("targ_sp_times", stimes)
    }

    pub fn advance(&mut self, clock: StepClock) -> Result<()> {
        let c = &self.compartments;
        let (spikes, mask) = extract_spike(c.tensor("targ_sp_times")?, clock.t, c.tensor("mask")?);
        let tols = update_times(clock.t, &spikes, c.tensor("tols")?);
        trace!(cell = %self.name, t = clock.t, spikes = spike_count(&spikes), "latency advance");
        let c = &mut self.compartments;
        c.set_tensor("outputs", spikes)?;
        c.set_tensor("mask", mask)?;
        c.set_tensor("tols", tols)
    }

    pub fn reset_batch(&mut self, batch_size: usize) -> Result<()> {
        let shape = (batch_size, self.n_units);
        for comp in ["inputs", "outputs", "tols", "mask", "targ_sp_times"] {
            self.compartments.reshape(comp, Tensor::zeros(shape))?;
        }
        self.batch_size = batch_size;
        Ok(())
    }
}

impl Component for LatencyCell {
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
        matches!(command, Command::Advance | Command::Reset | Command::CalcSpikeTimes)
    }

    fn execute(&mut self, command: Command, clock: StepClock) -> Result<()> {
        match command {
            Command::Advance => self.advance(clock),
            Command::CalcSpikeTimes => self.calc_spike_times(),
            Command::Reset => self.reset_batch(self.batch_size),
            other => Err(NeuralError::UnknownCommand(format!("{} on {}", other, self.name))),
        }
    }

    /// Latency encoders carry no persistent state
    fn save(&self, _directory: &Path) -> Result<()> {
        Ok(())
    }

    fn load(&mut self, _directory: &Path) -> Result<()> {
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
