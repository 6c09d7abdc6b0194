// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Cell Models
//!
//! Populations of spiking or graded units. Each model exposes a parameters
//! struct with `validate()`, a pure `advance_state` function and a cell type
//! implementing [`Component`](crate::component::Component).
//!
//! ## Adding a New Cell Model
//!
//! 1. Create `src/models/your_model.rs`
//! 2. Write the pure step function and its result struct
//! 3. Implement `Component`, committing the result in `execute`
//! 4. Add tests
//! 5. Export in `mod.rs`

pub mod lif;
pub mod rate;
pub mod slif;

pub use lif::{LIFCell, LIFParameters, Membrane};
pub use rate::{Activation, RateCell, RateParameters};
pub use slif::{SLIFCell, SLIFParameters};
