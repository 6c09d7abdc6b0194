// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Variable trace: a low-pass filter over a spike train.
//!
//! ```text
//! a_delta > 0:  x' = x·decay + a_delta·s
//! otherwise:    x' = x·decay·(1 - s) + s      (spike snaps the trace to 1)
//! ```

use crate::component::{Command, Component, StepClock};
use crate::types::{CompartmentMap, NeuralError, Result, Tensor};
use core::str::FromStr;
use ndarray::Zip;
use std::any::Any;
use std::path::Path;
use tracing::debug;

/// Per-step decay shape
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DecayKind {
    /// `exp(-dt/tau)`
    #[default]
    Exponential,
    /// `1 - dt/tau`
    Linear,
    /// Full reset every step
    Step,
}

impl DecayKind {
    pub fn factor(&self, dt: f32, tau: f32) -> f32 {
        match self {
            DecayKind::Exponential => (-dt / tau).exp(),
            DecayKind::Linear => 1.0 - dt / tau,
            DecayKind::Step => 0.0,
        }
    }
}

impl FromStr for DecayKind {
    type Err = NeuralError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "exp" | "exponential" => Ok(DecayKind::Exponential),
            "lin" | "linear" => Ok(DecayKind::Linear),
            "step" => Ok(DecayKind::Step),
            other => Err(NeuralError::InvalidParameter(format!("unknown decay '{}'", other))),
        }
    }
}

/// Pure trace update
pub fn update_trace(x: &Tensor, s: &Tensor, decay: f32, a_delta: f32) -> Tensor {
    let mut out = x.clone();
    if a_delta > 0.0 {
        Zip::from(&mut out).and(s).for_each(|x, &s| *x = *x * decay + a_delta * s);
    } else {
        Zip::from(&mut out)
            .and(s)
            .for_each(|x, &s| *x = *x * decay * (1.0 - s) + s);
    }
    out
}

/// Trace cell
///
/// Compartments: `inputs` (spikes), `trace`.
#[derive(Debug, Clone)]
pub struct VarTrace {
    name: String,
    n_units: usize,
    batch_size: usize,
    tau_tr: f32,
    a_delta: f32,
    decay: DecayKind,
    compartments: CompartmentMap,
}

impl VarTrace {
    pub fn new(name: &str, n_units: usize, batch_size: usize, tau_tr: f32, a_delta: f32, decay: DecayKind) -> Result<Self> {
        if decay != DecayKind::Step && !(tau_tr > 0.0) {
            return Err(NeuralError::InvalidParameter(format!(
                "{}: tau_tr must be > 0 (got {})",
                name, tau_tr
            )));
        }
        let shape = (batch_size, n_units);
        let mut compartments = CompartmentMap::new(name);
        compartments
            .declare("inputs", Tensor::zeros(shape))
            .declare("trace", Tensor::zeros(shape));
        debug!(cell = name, n_units, tau_tr, a_delta, ?decay, "trace cell created");
        Ok(Self {
            name: name.to_string(),
            n_units,
            batch_size,
            tau_tr,
            a_delta,
            decay,
            compartments,
        })
    }

    pub fn advance(&mut self, clock: StepClock) -> Result<()> {
        let decay = self.decay.factor(clock.dt, self.tau_tr);
        let trace = update_trace(
            self.compartments.tensor("trace")?,
            self.compartments.tensor("inputs")?,
            decay,
            self.a_delta,
        );
        self.compartments.set_tensor("trace", trace)
    }

    pub fn reset_batch(&mut self, batch_size: usize) -> Result<()> {
        let shape = (batch_size, self.n_units);
        self.compartments.reshape("inputs", Tensor::zeros(shape))?;
        self.compartments.reshape("trace", Tensor::zeros(shape))?;
        self.batch_size = batch_size;
        Ok(())
    }
}

impl Component for VarTrace {
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
