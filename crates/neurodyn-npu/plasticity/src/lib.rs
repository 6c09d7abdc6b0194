// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Neurodyn Plasticity
//!
//! Synaptic cables between cell populations and the rules that adapt them:
//! - **Dense**: static weighted projection with optional sparse connectivity
//! - **Hebbian**: two-factor rule with soft bounds and weight decay
//! - **Trace / exponential STDP**: spike-timing rules over traces or last-spike times
//! - **STP**: short-term facilitation and depression of effective weights
//! - **Optimizers**: SGD and Adam commit paths for the learning rules
//!
//! Every synapse implements [`Component`](neurodyn_npu_neural::Component) and
//! can be registered in a [`Context`](neurodyn_npu_neural::Context) next to
//! the cells it connects.

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod error;
pub mod optim;
pub mod synapses;

pub use error::{PlasticityError, Result};
pub use optim::{Adam, Optimizer, OptimizerKind, Sgd};
pub use synapses::{
    compute_layer, enforce_constraints, Cable, CableParameters, Constraints, DenseSynapse, ExpSTDPSynapse,
    HebbianParameters, HebbianSynapse, STDPParameters, STPDenseSynapse, STPParameters, TraceSTDPSynapse,
};
