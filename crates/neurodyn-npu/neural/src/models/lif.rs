// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # LIF (Leaky Integrate-and-Fire) Cell
//!
//! Spiking population with refractory masking, hyperpolarizing reset and a
//! homeostatic threshold offset. The membrane equation is selected by
//! [`Membrane`]: a linear leak, or the quadratic variant.
//!
//! ## Model Dynamics
//!
//! ```text
//! Current rescaling:
//!     j' = j · R_m · (tau_m / dt)
//!
//! Refractory mask:
//!     mask = [rfr >= refract_T]
//!
//! Membrane (one integrator step):
//!     linear:     dv/dt = ((v_rest - v) + j'·mask) / tau_m
//!     quadratic:  dv/dt = ((v_rest - v)(v - v_c)·a0 + j'·mask) / tau_m
//!
//! Spike, refractory, reset (driven by raw spikes):
//!     s_raw = [v > thr + thr_theta]
//!     rfr'  = (rfr + dt)(1 - s_raw)
//!     v'    = v(1 - s_raw) + s_raw·v_reset
//!
//! Optional single-spike arbitration (per batch row) yields s.
//!
//! Homeostasis (tau_theta > 0):
//!     thr_theta' = thr_theta·exp(-dt/tau_theta) + s_raw·theta_plus
//!
//! Bookkeeping:
//!     tols' = (1 - s)·tols + s·t
//! ```

use crate::component::{Command, Component, StepClock};
use crate::dynamics::{single_spike, spike_count, spike_fx, update_times, Integrator};
use crate::types::{Archive, CompartmentMap, NeuralError, PrngKey, Result, Tensor};
use core::str::FromStr;
use ndarray::Zip;
use neurodyn_config::NeurodynConfig;
use std::any::Any;
use std::path::Path;
use tracing::{debug, trace, warn};

/// Membrane leak variant
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Membrane {
    /// `(v_rest - v)`
    Linear,
    /// `(v_rest - v)(v - v_c)·a0`
    Quadratic { v_c: f32, a0: f32 },
}

impl Membrane {
    /// Leak term of the voltage derivative (before division by `tau_m`)
    #[inline(always)]
    pub fn leak(&self, v: f32, v_rest: f32) -> f32 {
        match *self {
            Membrane::Linear => v_rest - v,
            Membrane::Quadratic { v_c, a0 } => (v_rest - v) * (v - v_c) * a0,
        }
    }

    /// Build from a variant name and the quadratic coefficients
    pub fn from_name(name: &str, v_c: f32, a0: f32) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "linear" => Ok(Membrane::Linear),
            "quadratic" => Ok(Membrane::Quadratic { v_c, a0 }),
            other => Err(NeuralError::InvalidParameter(format!(
                "unknown membrane '{}' (expected linear or quadratic)",
                other
            ))),
        }
    }

    pub fn model_name(&self) -> &'static str {
        match self {
            Membrane::Linear => "Leaky Integrate-and-Fire (LIF)",
            Membrane::Quadratic { .. } => "Quadratic Leaky Integrate-and-Fire (QuadLIF)",
        }
    }
}

/// LIF cell parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LIFParameters {
    /// Membrane time constant (ms)
    pub tau_m: f32,
    /// Membrane resistance
    pub resistance: f32,
    /// Fixed base threshold (mV)
    pub thr: f32,
    pub v_rest: f32,
    pub v_reset: f32,
    /// Homeostatic threshold time constant (0 disables)
    pub tau_theta: f32,
    pub theta_plus: f32,
    /// Refractory period (ms)
    pub refract_t: f32,
    /// At most one emitted spike per batch row per step
    pub one_spike: bool,
    /// Keep `thr_theta` across resets
    pub thr_persist: bool,
    pub membrane: Membrane,
    pub integrator: Integrator,
}

impl Default for LIFParameters {
    fn default() -> Self {
        Self {
            tau_m: 20.0,
            resistance: 1.0,
            thr: -52.0,
            v_rest: -65.0,
            v_reset: -60.0,
            tau_theta: 1e7,
            theta_plus: 0.05,
            refract_t: 5.0,
            one_spike: true,
            thr_persist: true,
            membrane: Membrane::Linear,
            integrator: Integrator::Euler,
        }
    }
}

impl LIFParameters {
    /// Quadratic-membrane parameters with the standard coefficients
    pub fn quadratic() -> Self {
        Self {
            membrane: Membrane::Quadratic { v_c: -41.6, a0: 1.0 },
            ..Self::default()
        }
    }

    /// Build from the `[lif]` and `[simulation]` configuration sections
    pub fn from_config(config: &NeurodynConfig) -> Result<Self> {
        let lif = &config.lif;
        let params = Self {
            tau_m: lif.tau_m,
            resistance: lif.resistance,
            thr: lif.thr,
            v_rest: lif.v_rest,
            v_reset: lif.v_reset,
            tau_theta: lif.tau_theta,
            theta_plus: lif.theta_plus,
            refract_t: lif.refract_t,
            one_spike: lif.one_spike,
            thr_persist: lif.thr_persist,
            membrane: Membrane::from_name(&lif.membrane, lif.v_c, lif.a0)?,
            integrator: Integrator::from_str(&config.simulation.integrator)?,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.tau_m > 0.0) {
            return Err(NeuralError::InvalidParameter(format!(
                "LIF: tau_m must be > 0 (got {})",
                self.tau_m
            )));
        }
        if self.tau_theta < 0.0 {
            return Err(NeuralError::InvalidParameter("LIF: tau_theta must be >= 0".into()));
        }
        if self.refract_t < 0.0 {
            return Err(NeuralError::InvalidParameter("LIF: refract_T must be >= 0".into()));
        }
        Ok(())
    }
}

/// Borrowed pre-step state
#[derive(Debug, Clone, Copy)]
pub struct LIFState<'a> {
    pub j: &'a Tensor,
    pub v: &'a Tensor,
    pub rfr: &'a Tensor,
    pub thr_theta: &'a Tensor,
    pub tols: &'a Tensor,
    pub key: PrngKey,
}

/// Result of one LIF step
#[derive(Debug, Clone, PartialEq)]
pub struct LIFStep {
    pub v: Tensor,
    pub s: Tensor,
    pub s_raw: Tensor,
    pub rfr: Tensor,
    pub thr_theta: Tensor,
    pub tols: Tensor,
    pub key: PrngKey,
}

/// Rescale current to counterbalance the `1/tau_m` factor of the membrane ODE
pub fn modify_current(j: &Tensor, dt: f32, tau_m: f32, resistance: f32) -> Tensor {
    let scale = resistance * (tau_m / dt);
    j.mapv(|j| j * scale)
}

struct VoltageParams<'a> {
    j: &'a Tensor,
    mask: Tensor,
    tau_m: f32,
    v_rest: f32,
    membrane: Membrane,
}

fn dfv(_t: f32, v: &Tensor, p: &VoltageParams<'_>) -> Tensor {
    let mut dv_dt = Tensor::zeros(v.dim());
    Zip::from(&mut dv_dt)
        .and(v)
        .and(p.j)
        .and(&p.mask)
        .for_each(|d, &v, &j, &m| *d = (p.membrane.leak(v, p.v_rest) + j * m) / p.tau_m);
    dv_dt
}

/// One step of membrane dynamics: `(v', s, s_raw, rfr')`
///
/// `j` must already be rescaled. `skey`, when present, triggers single-spike
/// arbitration on the emitted spikes.
pub fn run_cell(
    params: &LIFParameters,
    dt: f32,
    j: &Tensor,
    v: &Tensor,
    thr_theta: &Tensor,
    rfr: &Tensor,
    skey: Option<PrngKey>,
) -> (Tensor, Tensor, Tensor, Tensor) {
    let refract_t = params.refract_t;
    let voltage = VoltageParams {
        j,
        mask: rfr.mapv(|r| if r >= refract_t { 1.0 } else { 0.0 }),
        tau_m: params.tau_m,
        v_rest: params.v_rest,
        membrane: params.membrane,
    };
    let (_, mut v_next) = params.integrator.step(0.0, v, dt, &voltage, dfv);

    let threshold = thr_theta.mapv(|theta| theta + params.thr);
    let s_raw = spike_fx(&v_next, &threshold);

    let mut rfr_next = rfr.clone();
    Zip::from(&mut rfr_next)
        .and(&s_raw)
        .for_each(|r, &s| *r = (*r + dt) * (1.0 - s));
    let v_reset = params.v_reset;
    Zip::from(&mut v_next)
        .and(&s_raw)
        .for_each(|v, &s| *v = *v * (1.0 - s) + s * v_reset);

    let s = match skey {
        Some(key) => single_spike(&s_raw, key),
        None => s_raw.clone(),
    };
    (v_next, s, s_raw, rfr_next)
}

/// Homeostatic threshold step: exponential decay plus `theta_plus` per raw spike
pub fn update_theta(dt: f32, thr_theta: &Tensor, s_raw: &Tensor, tau_theta: f32, theta_plus: f32) -> Tensor {
    let decay = (-dt / tau_theta).exp();
    let mut out = thr_theta.clone();
    Zip::from(&mut out)
        .and(s_raw)
        .for_each(|theta, &s| *theta = *theta * decay + s * theta_plus);
    out
}

/// Pure LIF advance
pub fn advance_state(params: &LIFParameters, clock: StepClock, state: LIFState<'_>) -> LIFStep {
    let (key, skey) = if params.one_spike {
        let (next, sub) = state.key.split2();
        (next, Some(sub))
    } else {
        (state.key, None)
    };
    let j = modify_current(state.j, clock.dt, params.tau_m, params.resistance);
    let (v, s, s_raw, rfr) = run_cell(params, clock.dt, &j, state.v, state.thr_theta, state.rfr, skey);
    let thr_theta = if params.tau_theta > 0.0 {
        update_theta(clock.dt, state.thr_theta, &s_raw, params.tau_theta, params.theta_plus)
    } else {
        state.thr_theta.clone()
    };
    let tols = update_times(clock.t, &s, state.tols);
    LIFStep {
        v,
        s,
        s_raw,
        rfr,
        thr_theta,
        tols,
        key,
    }
}

/// Persisted archive keys
const ARCHIVE_KEYS: [&str; 2] = ["key", "threshold_theta"];

/// Population of LIF (or QuadLIF) units
///
/// Compartments: `j` (input), `v`, `s`, `s_raw`, `rfr`, `thr_theta`, `tols`, `key`.
#[derive(Debug, Clone)]
pub struct LIFCell {
    name: String,
    n_units: usize,
    batch_size: usize,
    params: LIFParameters,
    compartments: CompartmentMap,
}

impl LIFCell {
    pub fn new(name: &str, n_units: usize, batch_size: usize, params: LIFParameters, key: PrngKey) -> Result<Self> {
        params.validate()?;
        if n_units == 0 || batch_size == 0 {
            return Err(NeuralError::InvalidParameter(format!(
                "{}: n_units and batch_size must be positive",
                name
            )));
        }
        let shape = (batch_size, n_units);
        let mut compartments = CompartmentMap::new(name);
        compartments
            .declare("j", Tensor::zeros(shape))
            .declare("v", Tensor::from_elem(shape, params.v_rest))
            .declare("s", Tensor::zeros(shape))
            .declare("s_raw", Tensor::zeros(shape))
            .declare("rfr", Tensor::from_elem(shape, params.refract_t))
            .declare("thr_theta", Tensor::zeros(shape))
            .declare("tols", Tensor::zeros(shape))
            .declare("key", key);
        debug!(
            cell = name,
            model = params.membrane.model_name(),
            n_units,
            batch_size,
            "LIF cell created"
        );
        Ok(Self {
            name: name.to_string(),
            n_units,
            batch_size,
            params,
            compartments,
        })
    }

    pub fn params(&self) -> &LIFParameters {
        &self.params
    }

    pub fn n_units(&self) -> usize {
        self.n_units
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Advance one step and commit the result
    pub fn advance(&mut self, clock: StepClock) -> Result<()> {
        let c = &self.compartments;
        let step = advance_state(
            &self.params,
            clock,
            LIFState {
                j: c.tensor("j")?,
                v: c.tensor("v")?,
                rfr: c.tensor("rfr")?,
                thr_theta: c.tensor("thr_theta")?,
                tols: c.tensor("tols")?,
                key: c.key("key")?,
            },
        );
        trace!(cell = %self.name, t = clock.t, spikes = spike_count(&step.s), "LIF advance");
        let c = &mut self.compartments;
        c.set_tensor("v", step.v)?;
        c.set_tensor("s", step.s)?;
        c.set_tensor("s_raw", step.s_raw)?;
        c.set_tensor("rfr", step.rfr)?;
        c.set_tensor("thr_theta", step.thr_theta)?;
        c.set_tensor("tols", step.tols)?;
        c.set_key("key", step.key)?;
        Ok(())
    }

    /// Restore the initial condition for `batch_size` rows
    pub fn reset_batch(&mut self, batch_size: usize) -> Result<()> {
        let shape = (batch_size, self.n_units);
        let keep_theta = self.params.thr_persist && self.compartments.shape("thr_theta")? == Some(shape);
        if self.params.thr_persist && !keep_theta {
            warn!(cell = %self.name, "batch size changed; adaptive threshold cannot persist and is cleared");
        }
        let c = &mut self.compartments;
        c.reshape("j", Tensor::zeros(shape))?;
        c.reshape("v", Tensor::from_elem(shape, self.params.v_rest))?;
        c.reshape("s", Tensor::zeros(shape))?;
        c.reshape("s_raw", Tensor::zeros(shape))?;
        c.reshape("rfr", Tensor::from_elem(shape, self.params.refract_t))?;
        c.reshape("tols", Tensor::zeros(shape))?;
        if !keep_theta {
            c.reshape("thr_theta", Tensor::zeros(shape))?;
        }
        self.batch_size = batch_size;
        Ok(())
    }
}

impl Component for LIFCell {
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
            .with_tensor("threshold_theta", self.compartments.tensor("thr_theta")?.clone())
            .with_key("key", self.compartments.key("key")?)
            .write(directory)?;
        Ok(())
    }

    fn load(&mut self, directory: &Path) -> Result<()> {
        let archive = Archive::read(directory, &self.name)?;
        archive.expect_exact_keys(&ARCHIVE_KEYS)?;
        self.compartments.set_tensor("thr_theta", archive.tensor("threshold_theta")?)?;
        self.compartments.set_key("key", archive.key("key")?)?;
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

    fn scenario_params() -> LIFParameters {
        LIFParameters {
            tau_m: 20.0,
            resistance: 1.0,
            thr: -52.0,
            v_rest: -65.0,
            v_reset: -60.0,
            refract_t: 5.0,
            ..LIFParameters::default()
        }
    }

    #[test]
    fn test_modify_current_scale() {
        let j = array![[2.0, -1.0]];
        let out = modify_current(&j, 0.5, 10.0, 2.0);
        // 2 * 2 * (10 / 0.5) = 80
        assert_eq!(out, array![[80.0, -40.0]]);
    }

    #[test]
    fn test_membrane_leak_variants() {
        assert_eq!(Membrane::Linear.leak(-60.0, -65.0), -5.0);
        let quad = Membrane::Quadratic { v_c: -41.6, a0: 1.0 };
        // (-65 + 60)(-60 + 41.6) = (-5)(-18.4) = 92
        assert!((quad.leak(-60.0, -65.0) - 92.0).abs() < 1e-4);
        assert!(Membrane::from_name("cubic", 0.0, 0.0).is_err());
    }

    #[test]
    fn test_refractory_units_ignore_current() {
        let params = LIFParameters {
            one_spike: false,
            ..scenario_params()
        };
        let j = array![[100.0, 100.0]];
        let v = array![[-62.0, -62.0]];
        let rfr = array![[1.0, 5.0]];
        let theta = Tensor::zeros((1, 2));
        let (v_next, s, _, rfr_next) = run_cell(&params, 1.0, &j, &v, &theta, &rfr, None);

        // refractory unit: leak only, -62 + (-65 + 62)/20
        assert!((v_next[[0, 0]] - (-62.15)).abs() < 1e-4);
        assert_eq!(s[[0, 0]], 0.0);
        assert_eq!(rfr_next[[0, 0]], 2.0);
        // eligible unit: -62 + (3·-1 + 100)/20 = -57.15, below threshold
        assert!((v_next[[0, 1]] - (-57.15)).abs() < 1e-4);
        assert_eq!(rfr_next[[0, 1]], 6.0);
    }

    #[test]
    fn test_spike_resets_refractory_and_hyperpolarizes() {
        let params = LIFParameters {
            one_spike: false,
            ..scenario_params()
        };
        let j = array![[400.0, 0.0]];
        let v = array![[-65.0, -65.0]];
        let rfr = array![[5.0, 5.0]];
        let theta = Tensor::zeros((1, 2));
        let (v_next, s, s_raw, rfr_next) = run_cell(&params, 1.0, &j, &v, &theta, &rfr, None);

        assert_eq!(s, array![[1.0, 0.0]]);
        assert_eq!(s_raw, s);
        assert_eq!(v_next[[0, 0]], -60.0);
        assert_eq!(v_next[[0, 1]], -65.0);
        assert_eq!(rfr_next, array![[0.0, 6.0]]);
    }

    #[test]
    fn test_single_spike_keeps_raw_for_refractory() {
        let params = scenario_params();
        let j = Tensor::from_elem((1, 4), 400.0);
        let v = Tensor::from_elem((1, 4), -65.0);
        let rfr = Tensor::from_elem((1, 4), 5.0);
        let theta = Tensor::zeros((1, 4));
        let (_, s, s_raw, rfr_next) = run_cell(&params, 1.0, &j, &v, &theta, &rfr, Some(PrngKey::new(11)));

        assert_eq!(s.sum(), 1.0);
        assert_eq!(s_raw.sum(), 4.0);
        assert!(rfr_next.iter().all(|&r| r == 0.0));
    }

    #[test]
    fn test_update_theta_decay_and_increment() {
        let theta = array![[1.0, 1.0]];
        let s = array![[1.0, 0.0]];
        let out = update_theta(1.0, &theta, &s, 10.0, 0.05);
        let decay = (-0.1f32).exp();
        assert!((out[[0, 0]] - (decay + 0.05)).abs() < 1e-6);
        assert!((out[[0, 1]] - decay).abs() < 1e-6);
    }

    #[test]
    fn test_tols_follow_emitted_spikes() {
        let mut cell = LIFCell::new("z", 3, 1, scenario_params(), PrngKey::new(1)).unwrap();
        cell.compartments_mut()
            .set_tensor("j", array![[20.0, 20.0, 0.0]])
            .unwrap();
        cell.advance(StepClock::new(4.0, 1.0)).unwrap();

        let s = cell.compartments().tensor("s").unwrap().clone();
        let tols = cell.compartments().tensor("tols").unwrap();
        assert_eq!(s.sum(), 1.0);
        for (sv, tv) in s.iter().zip(tols.iter()) {
            assert_eq!(*tv, if *sv > 0.0 { 4.0 } else { 0.0 });
        }
        // both driven units crossed, so both adapt their threshold
        let theta = cell.compartments().tensor("thr_theta").unwrap();
        assert!(theta[[0, 0]] > 0.0 && theta[[0, 1]] > 0.0);
        assert_eq!(theta[[0, 2]], 0.0);
    }

    #[test]
    fn test_quadratic_variant_integrates() {
        let params = LIFParameters {
            one_spike: false,
            ..LIFParameters::quadratic()
        };
        let mut cell = LIFCell::new("q", 1, 1, params, PrngKey::new(2)).unwrap();
        cell.compartments_mut().set_tensor("j", array![[0.1]]).unwrap();
        cell.advance(StepClock::new(0.0, 1.0)).unwrap();
        // at rest the quadratic leak vanishes: -65 + (0 + 0.1·20)/20 = -64.9
        let v = cell.compartments().tensor("v").unwrap()[[0, 0]];
        assert!((v - (-64.9)).abs() < 1e-4);
    }

    #[test]
    fn test_reset_respects_thr_persist() {
        let mut cell = LIFCell::new("z", 2, 1, scenario_params(), PrngKey::new(3)).unwrap();
        cell.compartments_mut()
            .set_tensor("thr_theta", array![[0.5, 0.25]])
            .unwrap();
        cell.compartments_mut().set_tensor("v", array![[-50.0, -40.0]]).unwrap();
        cell.execute(Command::Reset, StepClock::new(0.0, 1.0)).unwrap();
        assert_eq!(cell.compartments().tensor("v").unwrap(), &array![[-65.0, -65.0]]);
        assert_eq!(cell.compartments().tensor("rfr").unwrap(), &array![[5.0, 5.0]]);
        assert_eq!(cell.compartments().tensor("thr_theta").unwrap(), &array![[0.5, 0.25]]);

        let params = LIFParameters {
            thr_persist: false,
            ..scenario_params()
        };
        let mut cell = LIFCell::new("z", 2, 1, params, PrngKey::new(3)).unwrap();
        cell.compartments_mut()
            .set_tensor("thr_theta", array![[0.5, 0.25]])
            .unwrap();
        cell.reset_batch(3).unwrap();
        assert_eq!(cell.compartments().tensor("thr_theta").unwrap(), &Tensor::zeros((3, 2)));
        assert_eq!(cell.batch_size(), 3);
    }

    #[test]
    fn test_save_load_threshold_and_key() {
        let dir = tempfile::tempdir().unwrap();
        let mut cell = LIFCell::new("z1", 2, 1, scenario_params(), PrngKey::new(5)).unwrap();
        cell.compartments_mut()
            .set_tensor("thr_theta", array![[0.1, 0.2]])
            .unwrap();
        cell.save(dir.path()).unwrap();

        let mut restored = LIFCell::new("z1", 2, 1, scenario_params(), PrngKey::new(99)).unwrap();
        restored.load(dir.path()).unwrap();
        assert_eq!(restored.compartments().tensor("thr_theta").unwrap(), &array![[0.1, 0.2]]);
        assert_eq!(restored.compartments().key("key").unwrap(), PrngKey::new(5));
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        let params = LIFParameters {
            tau_m: 0.0,
            ..LIFParameters::default()
        };
        assert!(LIFCell::new("bad", 1, 1, params, PrngKey::new(0)).is_err());
    }

    #[test]
    fn test_from_config() {
        let mut config = NeurodynConfig::default();
        config.lif.membrane = "quadratic".to_string();
        config.simulation.integrator = "rk2".to_string();
        let params = LIFParameters::from_config(&config).unwrap();
        assert_eq!(params.membrane, Membrane::Quadratic { v_c: -41.6, a0: 1.0 });
        assert_eq!(params.integrator, Integrator::Rk2);
    }
}
