// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # neurodyn
//!
//! Step-driven spiking neural dynamics: LIF-family and rate cells, input
//! encoders, spike traces and plastic synapses, wired together through an
//! explicit component context.
//!
//! ## Feature Flags
//!
//! - **`plasticity`** (default): synapses and optimizers
//! - **`observability`** (default): logging bootstrap and debug flags
//! - **`file-logging`**: daily-rolling log file (implies `observability`)
//!
//! ## Usage
//!
//! ```rust,no_run
//! use neurodyn::prelude::*;
//!
//! let mut ctx = Context::new("model");
//! ctx.register(BernoulliCell::new("x", 2, 1, PrngKey::new(42)))?;
//! ctx.register(LIFCell::new("z", 2, 1, LIFParameters::default(), PrngKey::new(7))?)?;
//! ctx.link(("x", "outputs"), ("z", "j"))?;
//!
//! let advance = ctx.compile(Command::Advance);
//! let mut clock = StepClock::new(0.0, 1.0);
//! for _ in 0..100 {
//!     ctx.run(&advance, clock)?;
//!     clock = clock.tick();
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Foundation: neurodyn-config                            │
//! │  (TOML settings, overrides, validation)                 │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  NPU: neurodyn-npu-neural                               │
//! │  (compartments, integrators, cells, encoders, context)  │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Algorithms: neurodyn-npu-plasticity                    │
//! │  (dense, Hebbian, STDP and STP synapses; optimizers)    │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## License
//!
//! Apache-2.0

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Re-export foundation
pub use neurodyn_config as config;
pub use neurodyn_npu_neural as neural;

// Re-export algorithms
#[cfg(feature = "plasticity")]
pub use neurodyn_npu_plasticity as plasticity;

// Re-export infrastructure
#[cfg(feature = "observability")]
pub use neurodyn_observability as observability;

/// Prelude - commonly used types and traits
pub mod prelude {
    pub use crate::config::{load_config, validate_config, NeurodynConfig};
    pub use crate::neural::{
        BernoulliCell, Command, CompartmentMap, CompartmentValue, Component, Context, DecayKind, Integrator,
        LIFCell, LIFParameters, LatencyCell, LatencyParameters, Membrane, NeuralError, PoissonCell, PrngKey,
        RateCell, RateParameters, SLIFCell, SLIFParameters, StepClock, Tensor, VarTrace, WeightInit,
    };

    #[cfg(feature = "plasticity")]
    pub use crate::plasticity::{
        CableParameters, DenseSynapse, ExpSTDPSynapse, HebbianParameters, HebbianSynapse, OptimizerKind,
        PlasticityError, STDPParameters, STPDenseSynapse, STPParameters, TraceSTDPSynapse,
    };

    #[cfg(feature = "observability")]
    pub use crate::observability::{init_from_config, init_logging, parse_debug_flags, CrateDebugFlags};
}
