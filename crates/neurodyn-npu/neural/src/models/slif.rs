// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Simplified LIF (sLIF) Cell
//!
//! Spiking population with lateral inhibition, a per-unit adaptive threshold,
//! optional "sticky" spikes and a secant surrogate derivative. Voltage is
//! always integrated with forward Euler.
//!
//! ```text
//! j'  = j·R_m - (s(t-dt) · W_inh)·inh_R        (inhibition only if inh_R > 0)
//! surrogate = c1 / (1 + c2·j')                  (j' > 0, else 0)
//! dv/dt = (-v + j') / tau_m · mask              mask = [rfr >= refract_T]
//! s   = [v > thr];  v' = v(1 - s)
//! thr' = max(thr + (Σ_row s - 1)·rho_b, 0.025)  if rho_b > 0
//!      = thr + s·gain - thr·leak                otherwise
//! rfr' = (rfr + dt)(1 - s) + s·dt
//! sticky: s = s·mask + (1 - mask)
//! ```

use crate::component::{Command, Component, StepClock};
use crate::dynamics::{secant_lif_derivative, spike_count, spike_fx, step_euler, update_times, SECANT_C1, SECANT_C2};
use crate::types::{initialize_params, Archive, CompartmentMap, NeuralError, PrngKey, Result, Tensor, WeightInit};
use ndarray::{Axis, Zip};
use neurodyn_config::NeurodynConfig;
use std::any::Any;
use std::path::Path;
use tracing::{debug, trace};

/// Floor applied by the sparsity-enforcing threshold rule
pub const MIN_SPARSE_THRESHOLD: f32 = 0.025;

/// sLIF cell parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SLIFParameters {
    pub tau_m: f32,
    pub resistance: f32,
    /// Base threshold before jitter
    pub thr: f32,
    /// Lateral inhibition strength (0 disables)
    pub inhibit_r: f32,
    /// Keep adapted thresholds across resets
    pub thr_persist: bool,
    pub thr_gain: f32,
    pub thr_leak: f32,
    /// Sparsity factor (> 0 selects the sparsity rule)
    pub rho_b: f32,
    pub refract_t: f32,
    pub sticky_spikes: bool,
    /// Half-width of the uniform jitter added to initial thresholds
    pub thr_jitter: f32,
}

impl Default for SLIFParameters {
    fn default() -> Self {
        Self {
            tau_m: 20.0,
            resistance: 1.0,
            thr: 0.4,
            inhibit_r: 0.0,
            thr_persist: false,
            thr_gain: 0.0,
            thr_leak: 0.0,
            rho_b: 0.0,
            refract_t: 0.0,
            sticky_spikes: false,
            thr_jitter: 0.05,
        }
    }
}

impl SLIFParameters {
    pub fn from_config(config: &NeurodynConfig) -> Result<Self> {
        let slif = &config.slif;
        let params = Self {
            tau_m: slif.tau_m,
            resistance: slif.resistance,
            thr: slif.thr,
            inhibit_r: slif.inhibit_r,
            thr_persist: slif.thr_persist,
            thr_gain: slif.thr_gain,
            thr_leak: slif.thr_leak,
            rho_b: slif.rho_b,
            refract_t: slif.refract_t,
            sticky_spikes: slif.sticky_spikes,
            thr_jitter: slif.thr_jitter,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.tau_m > 0.0) {
            return Err(NeuralError::InvalidParameter(format!(
                "sLIF: tau_m must be > 0 (got {})",
                self.tau_m
            )));
        }
        if self.inhibit_r < 0.0 || self.rho_b < 0.0 || self.refract_t < 0.0 || self.thr_jitter < 0.0 {
            return Err(NeuralError::InvalidParameter(
                "sLIF: inhibit_R, rho_b, refract_T and thr_jitter must be >= 0".into(),
            ));
        }
        Ok(())
    }
}

/// Apply membrane resistance and lateral inhibition from the previous spikes
pub fn modify_current(j: &Tensor, s_prev: &Tensor, inh_weights: &Tensor, resistance: f32, inhibit_r: f32) -> Tensor {
    let mut j_curr = j.mapv(|j| j * resistance);
    if inhibit_r > 0.0 {
        j_curr = j_curr - s_prev.dot(inh_weights) * inhibit_r;
    }
    j_curr
}

/// Threshold adaptation from this step's (non-sticky) spikes
pub fn update_threshold(thr: &Tensor, s: &Tensor, params: &SLIFParameters) -> Tensor {
    if params.rho_b > 0.0 {
        let row_spikes = s.sum_axis(Axis(1)).insert_axis(Axis(1));
        let mut out = thr.clone();
        Zip::from(&mut out)
            .and_broadcast(&row_spikes)
            .for_each(|t, &n| *t = (*t + (n - 1.0) * params.rho_b).max(MIN_SPARSE_THRESHOLD));
        out
    } else {
        let mut out = thr.clone();
        Zip::from(&mut out)
            .and(s)
            .for_each(|t, &s| *t = *t + s * params.thr_gain - *t * params.thr_leak);
        out
    }
}

/// Result of one sLIF step
#[derive(Debug, Clone, PartialEq)]
pub struct SLIFStep {
    pub v: Tensor,
    pub s: Tensor,
    pub thr: Tensor,
    pub rfr: Tensor,
    pub tols: Tensor,
    pub surrogate: Tensor,
}

/// Borrowed pre-step state
#[derive(Debug, Clone, Copy)]
pub struct SLIFState<'a> {
    pub j: &'a Tensor,
    pub s: &'a Tensor,
    pub v: &'a Tensor,
    pub thr: &'a Tensor,
    pub rfr: &'a Tensor,
    pub tols: &'a Tensor,
}

struct VoltageParams<'a> {
    j: &'a Tensor,
    mask: &'a Tensor,
    tau_m: f32,
}

fn dfv(_t: f32, v: &Tensor, p: &VoltageParams<'_>) -> Tensor {
    let mut dv_dt = Tensor::zeros(v.dim());
    Zip::from(&mut dv_dt)
        .and(v)
        .and(p.j)
        .and(p.mask)
        .for_each(|d, &v, &j, &m| *d = (-v + j) / p.tau_m * m);
    dv_dt
}

/// Pure sLIF advance
pub fn advance_state(
    params: &SLIFParameters,
    inh_weights: &Tensor,
    clock: StepClock,
    state: SLIFState<'_>,
) -> SLIFStep {
    let dt = clock.dt;
    let j_curr = modify_current(state.j, state.s, inh_weights, params.resistance, params.inhibit_r);
    let surrogate = secant_lif_derivative(&j_curr, SECANT_C1, SECANT_C2);

    let refract_t = params.refract_t;
    let mask = state.rfr.mapv(|r| if r >= refract_t { 1.0 } else { 0.0 });
    let voltage = VoltageParams {
        j: &j_curr,
        mask: &mask,
        tau_m: params.tau_m,
    };
    let (_, mut v) = step_euler(0.0, state.v, dt, &voltage, dfv);
    let mut s = spike_fx(&v, state.thr);
    Zip::from(&mut v).and(&s).for_each(|v, &s| *v *= 1.0 - s);

    let thr = update_threshold(state.thr, &s, params);

    let mut rfr = state.rfr.clone();
    Zip::from(&mut rfr)
        .and(&s)
        .for_each(|r, &s| *r = (*r + dt) * (1.0 - s) + s * dt);
    if params.sticky_spikes {
        Zip::from(&mut s).and(&mask).for_each(|s, &m| *s = *s * m + (1.0 - m));
    }

    let tols = update_times(clock.t, &s, state.tols);
    SLIFStep {
        v,
        s,
        thr,
        rfr,
        tols,
        surrogate,
    }
}

/// Population of sLIF units
///
/// Compartments: `j` (input), `s`, `v`, `thr`, `rfr`, `tols`, `surrogate`, `key`.
#[derive(Debug, Clone)]
pub struct SLIFCell {
    name: String,
    n_units: usize,
    batch_size: usize,
    params: SLIFParameters,
    /// Fixed hollow lateral inhibition matrix `(n_units, n_units)`
    inh_weights: Tensor,
    /// Initial per-unit thresholds `(1, n_units)`
    threshold0: Tensor,
    compartments: CompartmentMap,
}

impl SLIFCell {
    pub fn new(name: &str, n_units: usize, batch_size: usize, params: SLIFParameters, key: PrngKey) -> Result<Self> {
        params.validate()?;
        if n_units == 0 || batch_size == 0 {
            return Err(NeuralError::InvalidParameter(format!(
                "{}: n_units and batch_size must be positive",
                name
            )));
        }
        let (key, inh_key) = key.split2();
        let mut inh_weights = initialize_params(inh_key, &WeightInit::uniform(0.025, 1.0), (n_units, n_units))?;
        inh_weights.diag_mut().fill(0.0);

        let (key, jitter_key) = key.split2();
        let jitter = WeightInit::uniform(-params.thr_jitter, params.thr_jitter);
        let threshold0 = initialize_params(jitter_key, &jitter, (1, n_units))?.mapv(|d| d + params.thr);

        let shape = (batch_size, n_units);
        let mut compartments = CompartmentMap::new(name);
        compartments
            .declare("j", Tensor::zeros(shape))
            .declare("s", Tensor::zeros(shape))
            .declare("v", Tensor::zeros(shape))
            .declare("thr", broadcast_rows(&threshold0, batch_size))
            .declare("rfr", Tensor::from_elem(shape, params.refract_t))
            .declare("tols", Tensor::zeros(shape))
            .declare("surrogate", Tensor::zeros(shape))
            .declare("key", key);
        debug!(cell = name, n_units, batch_size, inhibit_r = params.inhibit_r, "sLIF cell created");
        Ok(Self {
            name: name.to_string(),
            n_units,
            batch_size,
            params,
            inh_weights,
            threshold0,
            compartments,
        })
    }

    pub fn params(&self) -> &SLIFParameters {
        &self.params
    }

    pub fn inhibition_weights(&self) -> &Tensor {
        &self.inh_weights
    }

    pub fn initial_threshold(&self) -> &Tensor {
        &self.threshold0
    }

    pub fn advance(&mut self, clock: StepClock) -> Result<()> {
        let c = &self.compartments;
        let step = advance_state(
            &self.params,
            &self.inh_weights,
            clock,
            SLIFState {
                j: c.tensor("j")?,
                s: c.tensor("s")?,
                v: c.tensor("v")?,
                thr: c.tensor("thr")?,
                rfr: c.tensor("rfr")?,
                tols: c.tensor("tols")?,
            },
        );
        trace!(cell = %self.name, t = clock.t, spikes = spike_count(&step.s), "sLIF advance");
        let c = &mut self.compartments;
        c.set_tensor("s", step.s)?;
        c.set_tensor("v", step.v)?;
        c.set_tensor("thr", step.thr)?;
        c.set_tensor("rfr", step.rfr)?;
        c.set_tensor("tols", step.tols)?;
        c.set_tensor("surrogate", step.surrogate)?;
        Ok(())
    }

    pub fn reset_batch(&mut self, batch_size: usize) -> Result<()> {
        let shape = (batch_size, self.n_units);
        let keep_thr = self.params.thr_persist && self.compartments.shape("thr")? == Some(shape);
        let c = &mut self.compartments;
        c.reshape("j", Tensor::zeros(shape))?;
        c.reshape("s", Tensor::zeros(shape))?;
        c.reshape("v", Tensor::zeros(shape))?;
        c.reshape("rfr", Tensor::from_elem(shape, self.params.refract_t))?;
        c.reshape("tols", Tensor::zeros(shape))?;
        c.reshape("surrogate", Tensor::zeros(shape))?;
        if !keep_thr {
            c.reshape("thr", broadcast_rows(&self.threshold0, batch_size))?;
        }
        self.batch_size = batch_size;
        Ok(())
    }
}

fn broadcast_rows(row: &Tensor, rows: usize) -> Tensor {
    let mut out = Tensor::zeros((rows, row.ncols()));
    Zip::from(&mut out).and_broadcast(row).for_each(|o, &r| *o = r);
    out
}

impl Component for SLIFCell {
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

    /// Persistent thresholds are saved as adapted; otherwise the initial ones
    fn save(&self, directory: &Path) -> Result<()> {
        let threshold = if self.params.thr_persist {
            self.compartments.tensor("thr")?.clone()
        } else {
            self.threshold0.clone()
        };
        Archive::new(&self.name).with_tensor("threshold", threshold).write(directory)?;
        Ok(())
    }

    fn load(&mut self, directory: &Path) -> Result<()> {
        let archive = Archive::read(directory, &self.name)?;
        archive.expect_exact_keys(&["threshold"])?;
        let threshold = archive.tensor("threshold")?;
        // a single row is a per-unit baseline; a full batch is adapted state
        let (rows, cols) = threshold.dim();
        if cols != self.n_units || (rows != 1 && rows != self.batch_size) {
            return Err(NeuralError::shape(
                format!("{}.threshold", self.name),
                (self.batch_size, self.n_units),
                threshold.dim(),
            ));
        }
        if rows == 1 {
            self.compartments.set_tensor("thr", broadcast_rows(&threshold, self.batch_size))?;
            self.threshold0 = threshold;
        } else {
            self.compartments.set_tensor("thr", threshold)?;
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
