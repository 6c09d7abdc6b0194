// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Poisson encoder: inputs in `[0, 1]` scale a maximum firing rate (Hz).
//!
//! ```text
//! p = inputs · (dt / 1000) · max_freq
//! s = [U[0,1) < p]
//! ```

use super::bernoulli::sample_bernoulli;
use crate::component::{Command, Component, StepClock};
use crate::dynamics::{spike_count, update_times};
use crate::types::{Archive, CompartmentMap, NeuralError, PrngKey, Result, Tensor};
use std::any::Any;
use std::path::Path;
use tracing::{debug, trace};

/// Default maximum firing frequency (Hz)
pub const DEFAULT_MAX_FREQ: f32 = 63.75;

/// Per-step spike probability for a rate-coded input
pub fn spike_probability(inputs: &Tensor, dt: f32, max_freq: f32) -> Tensor {
    let scale = dt / 1000.0 * max_freq;
    inputs.mapv(|x| x * scale)
}

/// Compartments: `inputs`, `outputs`, `tols`, `key`.
#[derive(Debug, Clone)]
pub struct PoissonCell {
    name: String,
    n_units: usize,
    batch_size: usize,
    max_freq: f32,
    compartments: CompartmentMap,
}

impl PoissonCell {
    pub fn new(name: &str, n_units: usize, batch_size: usize, max_freq: f32, key: PrngKey) -> Result<Self> {
        if !(max_freq >= 0.0) {
            return Err(NeuralError::InvalidParameter(format!(
                "{}: max_freq must be >= 0 (got {})",
                name, max_freq
            )));
        }
        let shape = (batch_size, n_units);
        let mut compartments = CompartmentMap::new(name);
        compartments
            .declare("inputs", Tensor::zeros(shape))
            .declare("outputs", Tensor::zeros(shape))
            .declare("tols", Tensor::zeros(shape))
            .declare("key", key);
        debug!(cell = name, n_units, max_freq, "Poisson encoder created");
        Ok(Self {
            name: name.to_string(),
            n_units,
            batch_size,
            max_freq,
            compartments,
        })
    }

    pub fn advance(&mut self, clock: StepClock) -> Result<()> {
        let c = &self.compartments;
        let (key, sub) = c.key("key")?.split2();
        let probs = spike_probability(c.tensor("inputs")?, clock.dt, self.max_freq);
        let outputs = sample_bernoulli(sub, &probs);
        let tols = update_times(clock.t, &outputs, c.tensor("tols")?);
        trace!(cell = %self.name, t = clock.t, spikes = spike_count(&outputs), "Poisson advance");
        let c = &mut self.compartments;
        c.set_tensor("outputs", outputs)?;
        c.set_tensor("tols", tols)?;
        c.set_key("key", key)
    }

    pub fn reset_batch(&mut self, batch_size: usize) -> Result<()> {
        let shape = (batch_size, self.n_units);
        for comp in ["inputs", "outputs", "tols"] {
            self.compartments.reshape(comp, Tensor::zeros(shape))?;
        }
        self.batch_size = batch_size;
        Ok(())
    }
}

impl Component for PoissonCell {
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
        matches!(command, Command::Advance | Command::Reset)
    }

    fn execute(&mut self, command: Command, clock: StepClock) -> Result<()> {
        match command {
            Command::Advance => self.advance(clock),
            Command::Reset => self.reset_batch(self.batch_size),
            other => Err(NeuralError::UnknownCommand(format!("{} on {}", other, self.name))),
        }
    }

    fn save(&self, directory: &Path) -> Result<()> {
        Archive::new(&self.name)
            .with_key("key", self.compartments.key("key")?)
            .write(directory)?;
        Ok(())
    }

    fn load(&mut self, directory: &Path) -> Result<()> {
        let archive = Archive::read(directory, &self.name)?;
        archive.expect_exact_keys(&["key"])?;
        self.compartments.set_key("key", archive.key("key")?)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
