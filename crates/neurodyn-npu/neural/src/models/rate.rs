// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Rate (Graded) Cell
//!
//! Non-spiking units sharing the integration skeleton of the spiking cells.
//!
//! ```text
//! tau_m > 0:  dz/dt = (j + j_td - leak·z) / tau_m
//! tau_m = 0:  z = j + j_td
//! z_f = f(z)
//! ```

use crate::component::{Command, Component, StepClock};
use crate::dynamics::Integrator;
use crate::types::{CompartmentMap, NeuralError, Result, Tensor};
use core::str::FromStr;
use ndarray::Zip;
use std::any::Any;
use std::path::Path;
use tracing::debug;

/// Output nonlinearity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Activation {
    #[default]
    Identity,
    Relu,
    Tanh,
    Sigmoid,
}

impl Activation {
    #[inline(always)]
    pub fn apply(&self, z: f32) -> f32 {
        match self {
            Activation::Identity => z,
            Activation::Relu => z.max(0.0),
            Activation::Tanh => z.tanh(),
            Activation::Sigmoid => 1.0 / (1.0 + (-z).exp()),
        }
    }
}

impl FromStr for Activation {
    type Err = NeuralError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "identity" => Ok(Activation::Identity),
            "relu" => Ok(Activation::Relu),
            "tanh" => Ok(Activation::Tanh),
            "sigmoid" => Ok(Activation::Sigmoid),
            other => Err(NeuralError::InvalidParameter(format!("unknown activation '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateParameters {
    /// Time constant (0 makes the cell stateless)
    pub tau_m: f32,
    pub leak: f32,
    pub activation: Activation,
    pub integrator: Integrator,
}

impl Default for RateParameters {
    fn default() -> Self {
        Self {
            tau_m: 10.0,
            leak: 1.0,
            activation: Activation::Identity,
            integrator: Integrator::Euler,
        }
    }
}

impl RateParameters {
    pub fn validate(&self) -> Result<()> {
        if self.tau_m < 0.0 {
            return Err(NeuralError::InvalidParameter("Rate: tau_m must be >= 0".into()));
        }
        Ok(())
    }
}

struct RateDrive<'a> {
    j: &'a Tensor,
    j_td: &'a Tensor,
    leak: f32,
    tau_m: f32,
}

fn dfz(_t: f32, z: &Tensor, p: &RateDrive<'_>) -> Tensor {
    let mut dz_dt = Tensor::zeros(z.dim());
    Zip::from(&mut dz_dt)
        .and(z)
        .and(p.j)
        .and(p.j_td)
        .for_each(|d, &z, &j, &jtd| *d = (j + jtd - p.leak * z) / p.tau_m);
    dz_dt
}

/// Pure rate advance: `(z', z_f')`
pub fn advance_state(params: &RateParameters, dt: f32, j: &Tensor, j_td: &Tensor, z: &Tensor) -> (Tensor, Tensor) {
    let z_next = if params.tau_m > 0.0 {
        let drive = RateDrive {
            j,
            j_td,
            leak: params.leak,
            tau_m: params.tau_m,
        };
        params.integrator.step(0.0, z, dt, &drive, dfz).1
    } else {
        j + j_td
    };
    let activation = params.activation;
    let z_f = z_next.mapv(|z| activation.apply(z));
    (z_next, z_f)
}

/// Population of graded units
///
/// Compartments: `j`, `j_td` (inputs), `z`, `z_f`.
#[derive(Debug, Clone)]
pub struct RateCell {
    name: String,
    n_units: usize,
    batch_size: usize,
    params: RateParameters,
    compartments: CompartmentMap,
}

impl RateCell {
    pub fn new(name: &str, n_units: usize, batch_size: usize, params: RateParameters) -> Result<Self> {
        params.validate()?;
        let mut cell = Self {
            name: name.to_string(),
            n_units,
            batch_size,
            params,
            compartments: CompartmentMap::new(name),
        };
        let shape = (batch_size, n_units);
        for comp in ["j", "j_td", "z", "z_f"] {
            cell.compartments.declare(comp, Tensor::zeros(shape));
        }
        debug!(cell = name, n_units, tau_m = params.tau_m, "rate cell created");
        Ok(cell)
    }

    pub fn advance(&mut self, clock: StepClock) -> Result<()> {
        let c = &self.compartments;
        let (z, z_f) = advance_state(&self.params, clock.dt, c.tensor("j")?, c.tensor("j_td")?, c.tensor("z")?);
        self.compartments.set_tensor("z", z)?;
        self.compartments.set_tensor("z_f", z_f)?;
        Ok(())
    }

    pub fn reset_batch(&mut self, batch_size: usize) -> Result<()> {
        let shape = (batch_size, self.n_units);
        for comp in ["j", "j_td", "z", "z_f"] {
            self.compartments.reshape(comp, Tensor::zeros(shape))?;
        }
        self.batch_size = batch_size;
        Ok(())
    }
}

impl Component for RateCell {
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

    /// Rate cells carry no persistent state
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

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_stateless_rate_cell() {
        let params = RateParameters {
            tau_m: 0.0,
            activation: Activation::Relu,
            ..RateParameters::default()
        };
        let (z, z_f) = advance_state(&params, 1.0, &array![[1.0, -3.0]], &array![[0.5, 1.0]], &Tensor::zeros((1, 2)));
        assert_eq!(z, array![[1.5, -2.0]]);
        assert_eq!(z_f, array![[1.5, 0.0]]);
    }

    #[test]
    fn test_leaky_rate_cell_converges() {
        let mut cell = RateCell::new("r", 1, 1, RateParameters::default()).unwrap();
        cell.compartments_mut().set_tensor("j", array![[2.0]]).unwrap();
        for step in 0..200 {
            cell.advance(StepClock::new(step as f32, 1.0)).unwrap();
        }
        // fixed point z = j / leak
        let z = cell.compartments().tensor("z").unwrap()[[0, 0]];
        assert!((z - 2.0).abs() < 1e-3);
    }

    #[test]
    fn test_activation_parse() {
        assert_eq!("Sigmoid".parse::<Activation>().unwrap(), Activation::Sigmoid);
        assert!((Activation::Sigmoid.apply(0.0) - 0.5).abs() < 1e-6);
        assert!("softmax".parse::<Activation>().is_err());
    }
}
