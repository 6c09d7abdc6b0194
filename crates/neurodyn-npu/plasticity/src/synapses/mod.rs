// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Synapses
//!
//! Dense synaptic cables between two cell populations. Weights are shaped
//! `(n_in, n_out)`, biases `(1, n_out)`, and every synapse exposes `inputs`
//! and `outputs` compartments shaped `(batch_size, n_in)` / `(batch_size, n_out)`.
//!
//! Learning synapses answer `evolve` in two phases: a pure update
//! computation, then a commit through an [`Optimizer`](crate::optim::Optimizer)
//! followed by constraint enforcement.

pub mod cable;
pub mod dense;
pub mod exp_stdp;
pub mod hebbian;
pub mod stp;
pub mod trace_stdp;

pub use cable::{Cable, CableParameters, Constraints};
pub use dense::DenseSynapse;
pub use exp_stdp::ExpSTDPSynapse;
pub use hebbian::{HebbianParameters, HebbianSynapse};
pub use stp::{STPDenseSynapse, STPParameters};
pub use trace_stdp::{STDPParameters, TraceSTDPSynapse};

use neurodyn_npu_neural::Tensor;

/// `inputs · (W·resist_scale) + b`
pub fn compute_layer(inputs: &Tensor, weights: &Tensor, biases: &Tensor, resist_scale: f32) -> Tensor {
    inputs.dot(&(weights * resist_scale)) + biases
}

/// Clip to `[0, B]` (non-negative) or `[-B, B]`; no-op unless `B > 0`
pub fn enforce_constraints(weights: &Tensor, w_bound: f32, is_nonnegative: bool) -> Tensor {
    if w_bound > 0.0 {
        let lo = if is_nonnegative { 0.0 } else { -w_bound };
        weights.mapv(|w| w.clamp(lo, w_bound))
    } else {
        weights.clone()
    }
}
