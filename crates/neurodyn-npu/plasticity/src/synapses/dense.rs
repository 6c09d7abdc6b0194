// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Static dense synapse: `outputs = inputs · (W·resist_scale) + b`

use super::cable::{Cable, CableParameters};
use crate::error::Result;
use neurodyn_npu_neural::{Command, CompartmentMap, Component, NeuralError, PrngKey, StepClock};
use std::any::Any;
use std::path::Path;
use tracing::{debug, trace};

/// Compartments: `inputs`, `outputs`, `weights`, `biases`, `key`.
#[derive(Debug, Clone)]
pub struct DenseSynapse {
    name: String,
    batch_size: usize,
    cable: Cable,
    compartments: CompartmentMap,
}

impl DenseSynapse {
    pub fn new(
        name: &str,
        shape: (usize, usize),
        batch_size: usize,
        params: CableParameters,
        key: PrngKey,
    ) -> Result<Self> {
        let mut compartments = CompartmentMap::new(name);
        let cable = Cable::build(&mut compartments, shape, batch_size, &params, key)?;
        debug!(synapse = name, ?shape, p_conn = params.p_conn, "dense synapse created");
        Ok(Self {
            name: name.to_string(),
            batch_size,
            cable,
            compartments,
        })
    }

    pub fn cable(&self) -> &Cable {
        &self.cable
    }

    pub fn advance(&mut self) -> Result<()> {
        let outputs = self.cable.forward(&self.compartments)?;
        trace!(synapse = %self.name, "dense advance");
        self.compartments.set_tensor("outputs", outputs)?;
        Ok(())
    }

    pub fn reset_batch(&mut self, batch_size: usize) -> Result<()> {
        self.cable.reset(&mut self.compartments, batch_size)?;
        self.batch_size = batch_size;
        Ok(())
    }
}

impl Component for DenseSynapse {
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

    fn execute(&mut self, command: Command, _clock: StepClock) -> neurodyn_npu_neural::Result<()> {
        match command {
            Command::Advance => Ok(self.advance()?),
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
