// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Bernoulli encoder: each unit spikes with probability equal to its input.

use crate::component::{Command, Component, StepClock};
use crate::dynamics::{spike_count, update_times};
use crate::types::{Archive, CompartmentMap, NeuralError, PrngKey, Result, Tensor};
use ndarray::Zip;
use rand::Rng;
use std::any::Any;
use std::path::Path;
use tracing::{debug, trace};

/// Draw `s ~ Bernoulli(clamp(p, 0, 1))` elementwise with a spent key
pub fn sample_bernoulli(key: PrngKey, probs: &Tensor) -> Tensor {
    let mut rng = key.rng();
    let mut s = Tensor::zeros(probs.dim());
    Zip::from(&mut s).and(probs).for_each(|s, &p| {
        let draw: f32 = rng.gen();
        *s = if draw < p.clamp(0.0, 1.0) { 1.0 } else { 0.0 };
    });
    s
}

/// Result of one encoder step: `(outputs, tols, next key)`
pub fn advance_state(clock: StepClock, key: PrngKey, inputs: &Tensor, tols: &Tensor) -> (Tensor, Tensor, PrngKey) {
    let (key, sub) = key.split2();
    let outputs = sample_bernoulli(sub, inputs);
    let tols = update_times(clock.t, &outputs, tols);
    (outputs, tols, key)
}

/// Compartments: `inputs`, `outputs`, `tols`, `key`.
#[derive(Debug, Clone)]
pub struct BernoulliCell {
    name: String,
    n_units: usize,
    batch_size: usize,
    compartments: CompartmentMap,
}

impl BernoulliCell {
    pub fn new(name: &str, n_units: usize, batch_size: usize, key: PrngKey) -> Self {
        let shape = (batch_size, n_units);
        let mut compartments = CompartmentMap::new(name);
        compartments
            .declare("inputs", Tensor::zeros(shape))
            .declare("outputs", Tensor::zeros(shape))
            .declare("tols", Tensor::zeros(shape))
            .declare("key", key);
        debug!(cell = name, n_units, "Bernoulli encoder created");
        Self {
            name: name.to_string(),
            n_units,
            batch_size,
            compartments,
        }
    }

    pub fn advance(&mut self, clock: StepClock) -> Result<()> {
        let c = &self.compartments;
        let (outputs, tols, key) = advance_state(clock, c.key("key")?, c.tensor("inputs")?, c.tensor("tols")?);
        trace!(cell = %self.name, t = clock.t, spikes = spike_count(&outputs), "Bernoulli advance");
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

impl Component for BernoulliCell {
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
