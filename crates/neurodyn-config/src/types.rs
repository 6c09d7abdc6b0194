// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration type definitions
//!
//! This module defines all configuration structs that map to sections in
//! `neurodyn.toml`. Every section is optional; missing sections and fields
//! fall back to the defaults below.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct NeurodynConfig {
    pub simulation: SimulationConfig,
    pub lif: LifConfig,
    pub slif: SlifConfig,
    pub latency: LatencyConfig,
    pub hebbian: HebbianConfig,
    pub stdp: StdpConfig,
    pub stp: StpConfig,
    pub logging: LoggingConfig,
}

/// Simulation clock and batching
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Integration step size (ms)
    pub dt: f32,
    pub batch_size: usize,
    /// Root PRNG seed; `None` seeds from the clock
    pub seed: Option<u64>,
    /// "euler" or "rk2"
    pub integrator: String,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            dt: 1.0,
            batch_size: 1,
            seed: None,
            integrator: "euler".to_string(),
        }
    }
}

/// Leaky integrate-and-fire cells (linear and quadratic membranes)
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LifConfig {
    pub tau_m: f32,
    pub resistance: f32,
    pub thr: f32,
    pub v_rest: f32,
    pub v_reset: f32,
    /// Homeostatic threshold time constant (0 disables adaptation)
    pub tau_theta: f32,
    pub theta_plus: f32,
    pub refract_t: f32,
    pub one_spike: bool,
    /// Keep the adaptive threshold across resets
    pub thr_persist: bool,
    /// "linear" or "quadratic"
    pub membrane: String,
    /// Quadratic membrane critical voltage
    pub v_c: f32,
    /// Quadratic membrane scaling factor
    pub a0: f32,
}

impl Default for LifConfig {
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
            membrane: "linear".to_string(),
            v_c: -41.6,
            a0: 1.0,
        }
    }
}

/// Simplified LIF cells with lateral inhibition
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SlifConfig {
    pub tau_m: f32,
    pub resistance: f32,
    pub thr: f32,
    pub inhibit_r: f32,
    pub thr_persist: bool,
    pub thr_gain: f32,
    pub thr_leak: f32,
    /// Sparsity factor; > 0 switches on the population-sparsity threshold rule
    pub rho_b: f32,
    pub refract_t: f32,
    pub sticky_spikes: bool,
    pub thr_jitter: f32,
}

impl Default for SlifConfig {
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

/// Time-to-first-spike encoders
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LatencyConfig {
    pub tau: f32,
    pub threshold: f32,
    pub first_spike_time: f32,
    pub linearize: bool,
    pub normalize: bool,
    pub num_steps: f32,
}

impl Default for LatencyConfig {
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

/// Two-factor Hebbian synapses
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HebbianConfig {
    pub eta: f32,
    pub w_bound: f32,
    pub is_nonnegative: bool,
    pub w_decay: f32,
    pub sign_val: f32,
    /// "sgd" or "adam"
    pub optim_type: String,
    pub pre_wght: f32,
    pub post_wght: f32,
    pub resist_scale: f32,
    pub p_conn: f32,
}

impl Default for HebbianConfig {
    fn default() -> Self {
        Self {
            eta: 0.0,
            w_bound: 1.0,
            is_nonnegative: false,
            w_decay: 0.0,
            sign_val: 1.0,
            optim_type: "sgd".to_string(),
            pre_wght: 1.0,
            post_wght: 1.0,
            resist_scale: 1.0,
            p_conn: 1.0,
        }
    }
}

/// Trace-based and exponential STDP synapses
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StdpConfig {
    pub eta: f32,
    pub a_plus: f32,
    pub a_minus: f32,
    /// Power-law exponent (0 disables weight dependence)
    pub mu: f32,
    /// Presynaptic trace target
    pub pre_trace_target: f32,
    pub w_bound: f32,
    /// Exponential STDP weight-dependence strength
    pub exp_beta: f32,
    pub tau_plus: f32,
    pub tau_minus: f32,
    pub sign_val: f32,
    /// "sgd" or "adam"
    pub optim_type: String,
    pub resist_scale: f32,
}

impl Default for StdpConfig {
    fn default() -> Self {
        Self {
            eta: 1.0,
            a_plus: 1.0,
            a_minus: 0.0,
            mu: 0.0,
            pre_trace_target: 0.0,
            w_bound: 1.0,
            exp_beta: 1.0,
            tau_plus: 10.0,
            tau_minus: 10.0,
            sign_val: -1.0,
            optim_type: "sgd".to_string(),
            resist_scale: 1.0,
        }
    }
}

/// Short-term plasticity synapses
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StpConfig {
    /// Facilitation time constant
    pub tau_f: f32,
    /// Depression time constant (0 disables depression)
    pub tau_d: f32,
    pub resist_scale: f32,
    pub p_conn: f32,
}

impl Default for StpConfig {
    fn default() -> Self {
        Self {
            tau_f: 750.0,
            tau_d: 50.0,
            resist_scale: 1.0,
            p_conn: 1.0,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter level when no debug flags are set
    pub level: String,
    pub file_logging: bool,
    pub log_dir: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_logging: false,
            log_dir: PathBuf::from("logs"),
        }
    }
}
