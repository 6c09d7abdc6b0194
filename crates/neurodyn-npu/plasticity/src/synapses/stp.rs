// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Short-Term Plasticity (STP) Synapse
//!
//! Dense synapse whose effective weights are modulated every step by a
//! release probability `u` (facilitation) and a resource availability `x`
//! (depression), both kept per presynaptic unit. Spikes are summed over the
//! batch. The baseline release fraction `U` (`resources`) is likewise one
//! fixed random value per presynaptic unit, shape `(1, n_in)`, rather than a
//! full `(n_in, n_out)` matrix.
//!
//! ```text
//! u' = u - u/tau_f + U·(1 - u)·s
//! W_eff[i, :] = W[i, :]·u'_i·x_i
//! x' = x + (1 - x)/tau_d - u'·x·s        (tau_d > 0, otherwise x is fixed)
//! outputs = inputs · (W_eff·resist_scale) + b
//! ```
//!
//! Depression dominates when `tau_d >> tau_f` with large `U`; facilitation
//! when `tau_d << tau_f` with small `U`.

use super::cable::{Cable, CableParameters};
use crate::error::{PlasticityError, Result};
use ndarray::{Axis, Zip};
use neurodyn_config::NeurodynConfig;
use neurodyn_npu_neural::{
    initialize_params, Archive, Command, CompartmentMap, Component, NeuralError, PrngKey, StepClock, Tensor,
    WeightInit,
};
use std::any::Any;
use std::path::Path;
use tracing::{debug, trace, warn};

/// Resource initializer used when none is configured
pub const DEFAULT_RESOURCES: WeightInit = WeightInit::Uniform {
    amin: 0.125,
    amax: 0.175,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct STPParameters {
    /// Facilitation time constant
    pub tau_f: f32,
    /// Depression time constant (0 disables depression)
    pub tau_d: f32,
    /// Initializer of the per-unit resources `U`
    pub resources_init: Option<WeightInit>,
    pub cable: CableParameters,
}

impl Default for STPParameters {
    fn default() -> Self {
        Self {
            tau_f: 750.0,
            tau_d: 50.0,
            resources_init: None,
            cable: CableParameters::default(),
        }
    }
}

impl STPParameters {
    pub fn from_config(config: &NeurodynConfig) -> Result<Self> {
        let stp = &config.stp;
        let params = Self {
            tau_f: stp.tau_f,
            tau_d: stp.tau_d,
            resources_init: None,
            cable: CableParameters {
                resist_scale: stp.resist_scale,
                p_conn: stp.p_conn,
                ..CableParameters::default()
            },
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.tau_f > 0.0) {
            return Err(PlasticityError::InvalidParameter(format!(
                "STP: tau_f must be > 0 (got {})",
                self.tau_f
            )));
        }
        if self.tau_d < 0.0 {
            return Err(PlasticityError::InvalidParameter(format!(
                "STP: tau_d must be >= 0 (got {})",
                self.tau_d
            )));
        }
        self.cable.validate()
    }
}

/// Result of one STP step
#[derive(Debug, Clone)]
pub struct STPStep {
    pub outputs: Tensor,
    pub u: Tensor,
    pub x: Tensor,
}

/// Per-step STP state
#[derive(Debug, Clone, Copy)]
pub struct STPState<'a> {
    pub inputs: &'a Tensor,
    pub weights: &'a Tensor,
    pub biases: &'a Tensor,
    pub resources: &'a Tensor,
    pub u: &'a Tensor,
    pub x: &'a Tensor,
}

/// Pure STP advance
pub fn advance_state(params: &STPParameters, state: STPState<'_>) -> STPStep {
    let s = state.inputs.sum_axis(Axis(0)).insert_axis(Axis(0));
    let inv_f = 1.0 / params.tau_f;

    let mut u = state.u.clone();
    Zip::from(&mut u)
        .and(state.resources)
        .and(&s)
        .for_each(|u, &res, &s| *u = *u - *u * inv_f + res * (1.0 - *u) * s);

    let mut w_eff = state.weights.clone();
    for ((mut row, &ui), &xi) in w_eff.axis_iter_mut(Axis(0)).zip(u.iter()).zip(state.x.iter()) {
        row *= ui * xi;
    }

    let mut x = state.x.clone();
    if params.tau_d > 0.0 {
        let inv_d = 1.0 / params.tau_d;
        Zip::from(&mut x)
            .and(&u)
            .and(&s)
            .for_each(|x, &u, &s| *x = *x + (1.0 - *x) * inv_d - u * *x * s);
    }

    let outputs = super::compute_layer(state.inputs, &w_eff, state.biases, params.cable.resist_scale);
    STPStep { outputs, u, x }
}

/// Compartments: `inputs`, `outputs`, `weights`, `biases`, `key`,
/// `resources`, `u`, `x`.
#[derive(Debug, Clone)]
pub struct STPDenseSynapse {
    name: String,
    batch_size: usize,
    params: STPParameters,
    cable: Cable,
    compartments: CompartmentMap,
}

impl STPDenseSynapse {
    pub fn new(
        name: &str,
        shape: (usize, usize),
        batch_size: usize,
        params: STPParameters,
        key: PrngKey,
    ) -> Result<Self> {
        params.validate()?;
        let (cable_key, resources_key) = key.split2();
        let mut compartments = CompartmentMap::new(name);
        let cable = Cable::build(&mut compartments, shape, batch_size, &params.cable, cable_key)?;
        let resources_init = match params.resources_init {
            Some(init) => init,
            None => {
                warn!(synapse = name, "using default resources initializer U[0.125, 0.175]");
                DEFAULT_RESOURCES
            }
        };
        let n_in = shape.0;
        compartments
            .declare("resources", initialize_params(resources_key, &resources_init, (1, n_in))?)
            .declare("u", Tensor::zeros((1, n_in)))
            .declare("x", Tensor::ones((1, n_in)));
        debug!(synapse = name, ?shape, tau_f = params.tau_f, tau_d = params.tau_d, "STP synapse created");
        Ok(Self {
            name: name.to_string(),
            batch_size,
            params,
            cable,
            compartments,
        })
    }

    pub fn advance(&mut self) -> Result<()> {
        let c = &self.compartments;
        let state = STPState {
            inputs: c.tensor("inputs")?,
            weights: c.tensor("weights")?,
            biases: c.tensor("biases")?,
            resources: c.tensor("resources")?,
            u: c.tensor("u")?,
            x: c.tensor("x")?,
        };
        let step = advance_state(&self.params, state);
        trace!(synapse = %self.name, u_mean = ?step.u.mean(), x_mean = ?step.x.mean(), "STP advance");
        let c = &mut self.compartments;
        c.set_tensor("outputs", step.outputs)?;
        c.set_tensor("u", step.u)?;
        c.set_tensor("x", step.x)?;
        Ok(())
    }

    pub fn reset_batch(&mut self, batch_size: usize) -> Result<()> {
        let n_in = self.cable.shape().0;
        self.cable.reset(&mut self.compartments, batch_size)?;
        self.compartments.set_tensor("u", Tensor::zeros((1, n_in)))?;
        self.compartments.set_tensor("x", Tensor::ones((1, n_in)))?;
        self.batch_size = batch_size;
        Ok(())
    }
}

impl Component for STPDenseSynapse {
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
        self.cable
            .archive(&self.name, &self.compartments)?
            .with_tensor("resources", self.compartments.tensor("resources")?.clone())
            .write(directory)?;
        Ok(())
    }

    fn load(&mut self, directory: &Path) -> neurodyn_npu_neural::Result<()> {
        let archive = Archive::read(directory, &self.name)?;
        archive.expect_exact_keys(&self.cable.archive_keys(&["resources"]))?;
        self.cable.restore(&archive, &mut self.compartments)?;
        self.compartments.set_tensor("resources", archive.tensor("resources")?)
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

    fn synapse(tau_d: f32) -> STPDenseSynapse {
        let params = STPParameters {
            tau_f: 10.0,
            tau_d,
            resources_init: Some(WeightInit::Constant { value: 0.5 }),
            cable: CableParameters {
                weight_init: WeightInit::Constant { value: 1.0 },
                ..CableParameters::default()
            },
        };
        STPDenseSynapse::new("stp", (2, 1), 1, params, PrngKey::new(3)).unwrap()
    }

    #[test]
    fn test_single_spike_facilitates_and_depresses() {
        let mut syn = synapse(5.0);
        syn.compartments_mut().set_tensor("inputs", array![[1.0, 0.0]]).unwrap();
        syn.advance().unwrap();
        let c = syn.compartments();
        // u' = 0 - 0 + 0.5·1·1
        assert_eq!(c.tensor("u").unwrap(), &array![[0.5, 0.0]]);
        // x' = 1 + 0 - 0.5·1·1
        assert_eq!(c.tensor("x").unwrap(), &array![[0.5, 1.0]]);
        // W_eff row 0 = 1·0.5·1 (x before depression)
        assert_eq!(c.tensor("outputs").unwrap(), &array![[0.5]]);
    }

    #[test]
    fn test_no_depression_when_tau_d_zero() {
        let mut syn = synapse(0.0);
        syn.compartments_mut().set_tensor("inputs", array![[1.0, 1.0]]).unwrap();
        for _ in 0..20 {
            syn.advance().unwrap();
            assert_eq!(syn.compartments().tensor("x").unwrap(), &array![[1.0, 1.0]]);
        }
    }

    #[test]
    fn test_resources_stay_bounded() {
        let mut syn = synapse(5.0);
        syn.compartments_mut().set_tensor("inputs", array![[1.0, 1.0]]).unwrap();
        for _ in 0..100 {
            syn.advance().unwrap();
            let c = syn.compartments();
            assert!(c.tensor("x").unwrap().iter().all(|&x| (0.0..=1.0).contains(&x)));
            assert!(c.tensor("u").unwrap().iter().all(|&u| (0.0..=1.0).contains(&u)));
        }
    }

    #[test]
    fn test_reset_restores_initial_condition() {
        let mut syn = synapse(5.0);
        syn.compartments_mut().set_tensor("inputs", array![[1.0, 1.0]]).unwrap();
        syn.advance().unwrap();
        syn.execute(Command::Reset, StepClock::new(0.0, 1.0)).unwrap();
        let c = syn.compartments();
        assert_eq!(c.tensor("u").unwrap(), &Tensor::zeros((1, 2)));
        assert_eq!(c.tensor("x").unwrap(), &Tensor::ones((1, 2)));
        assert_eq!(c.tensor("inputs").unwrap(), &Tensor::zeros((1, 2)));
    }

    #[test]
    fn test_default_resources_range() {
        let syn = STPDenseSynapse::new("stp", (8, 2), 1, STPParameters::default(), PrngKey::new(4)).unwrap();
        let resources = syn.compartments().tensor("resources").unwrap();
        assert_eq!(resources.dim(), (1, 8));
        assert!(resources.iter().all(|&r| (0.125..0.175).contains(&r)));
    }

    #[test]
    fn test_save_load_resources() {
        let dir = tempfile::tempdir().unwrap();
        let syn = STPDenseSynapse::new("stp", (3, 2), 1, STPParameters::default(), PrngKey::new(4)).unwrap();
        syn.save(dir.path()).unwrap();
        let mut other = STPDenseSynapse::new("stp", (3, 2), 1, STPParameters::default(), PrngKey::new(8)).unwrap();
        other.load(dir.path()).unwrap();
        assert_eq!(
            other.compartments().tensor("resources").unwrap(),
            syn.compartments().tensor("resources").unwrap()
        );
    }
}
