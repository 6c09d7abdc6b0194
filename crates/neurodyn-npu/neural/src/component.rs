// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Component Architecture
//!
//! Every cell, encoder and synapse implements [`Component`]. A component owns
//! a [`CompartmentMap`] and answers a small set of [`Command`]s. Each command
//! is split into a pure computation returning a plain result struct and a
//! commit step that writes the result into the component's compartments.
//!
//! ## Adding a New Component
//!
//! 1. Define a `*Parameters` struct with `validate()`
//! 2. Write the pure step functions returning a result struct
//! 3. Implement `Component`, committing results in `execute`
//! 4. Add tests

use crate::types::{CompartmentMap, NeuralError, Result};
use core::fmt;
use core::str::FromStr;
use std::any::Any;
use std::path::Path;

/// Time information handed to every command
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepClock {
    /// Current simulation time
    pub t: f32,
    /// Integration step size
    pub dt: f32,
}

impl StepClock {
    pub fn new(t: f32, dt: f32) -> Self {
        Self { t, dt }
    }

    /// Clock for the following step
    pub fn tick(self) -> Self {
        Self {
            t: self.t + self.dt,
            dt: self.dt,
        }
    }
}

/// Named operations a schedule can be compiled for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Integrate state forward one step
    Advance,
    /// Compute a plasticity update, transform it through the optimizer, commit and enforce constraints
    Evolve,
    /// Restore the initial condition
    Reset,
    /// Latency encoders: precompute target spike times from the current input
    CalcSpikeTimes,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Advance => "advance",
            Command::Evolve => "evolve",
            Command::Reset => "reset",
            Command::CalcSpikeTimes => "calc_spike_times",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = NeuralError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "advance" | "advance_state" => Ok(Command::Advance),
            "evolve" => Ok(Command::Evolve),
            "reset" => Ok(Command::Reset),
            "calc_spike_times" => Ok(Command::CalcSpikeTimes),
            other => Err(NeuralError::UnknownCommand(other.to_string())),
        }
    }
}

/// A stateful simulation component
pub trait Component: Any {
    /// Unique name within a context
    fn name(&self) -> &str;

    fn compartments(&self) -> &CompartmentMap;

    fn compartments_mut(&mut self) -> &mut CompartmentMap;

    /// Whether this component takes part in schedules for `command`
    fn supports(&self, command: Command) -> bool;

    /// Run `command` once
    fn execute(&mut self, command: Command, clock: StepClock) -> Result<()>;

    /// Write persistent state to `<directory>/<name>.json`
    fn save(&self, directory: &Path) -> Result<()>;

    /// Restore persistent state from `<directory>/<name>.json`
    fn load(&mut self, directory: &Path) -> Result<()>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}
