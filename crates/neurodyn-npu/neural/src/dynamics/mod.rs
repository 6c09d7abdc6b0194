// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Neural Dynamics
//!
//! Platform-agnostic building blocks used by every cell: ODE integrators,
//! surrogate spike functions and spike bookkeeping.

pub mod integrator;
pub mod spikes;
pub mod surrogate;

pub use integrator::{step_euler, step_rk2, Integrator};
pub use spikes::{single_spike, spike_count, update_times};
pub use surrogate::{secant_lif_derivative, spike_fx, SECANT_C1, SECANT_C2};
