// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Input Encoders
//!
//! Convert continuous input into spike trains: stochastic sampling
//! (Bernoulli, Poisson) or time-to-first-spike coding (latency).

pub mod bernoulli;
pub mod latency;
pub mod poisson;

pub use bernoulli::{sample_bernoulli, BernoulliCell};
pub use latency::{calc_spike_times, extract_spike, LatencyCell, LatencyParameters};
pub use poisson::{PoissonCell, DEFAULT_MAX_FREQ};
