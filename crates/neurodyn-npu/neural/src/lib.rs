// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Neurodyn Neural Dynamics
//!
//! Stateful cell dynamics in one place:
//! - **Types**: compartments, PRNG keys, archives, initializers, errors
//! - **Dynamics**: ODE integrators, surrogate spike functions, spike bookkeeping
//! - **Models**: LIF / QuadLIF, sLIF and rate cells
//! - **Encoders**: Bernoulli, Poisson and latency input cells
//! - **Trace**: spike-train low-pass filters
//! - **Context**: component registry, links and compiled schedules
//!
//! Every array is `ndarray::Array2<f32>` shaped `(batch_size, n_units)`.

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Core type definitions
pub mod types;

// Neural dynamics algorithms
pub mod dynamics;

// Component trait and the context that drives it
pub mod component;
pub mod context;

// Cells
pub mod encoders;
pub mod models;
pub mod trace;

// Re-export everything for convenience
pub use component::{Command, Component, StepClock};
pub use context::{CompartmentRef, Context, Link, Schedule};
pub use dynamics::*;
pub use encoders::{BernoulliCell, LatencyCell, LatencyParameters, PoissonCell};
pub use models::{Activation, LIFCell, LIFParameters, Membrane, RateCell, RateParameters, SLIFCell, SLIFParameters};
pub use trace::{DecayKind, VarTrace};

// Re-export types
pub use types::{
    initialize_params, sparse_mask, Archive, ArchiveEntry, Compartment, CompartmentMap, CompartmentValue, Error,
    NeuralError, PrngKey, Result, Tensor, WeightInit,
};
