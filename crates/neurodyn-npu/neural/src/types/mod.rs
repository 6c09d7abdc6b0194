// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Neural Types Module
//!
//! Core type definitions shared by every component: compartments, PRNG
//! keys, snapshot archives, parameter initializers and errors.

pub mod archive;
pub mod compartment;
pub mod error;
pub mod init;
pub mod key;

// Re-export commonly used types
pub use archive::{Archive, ArchiveEntry};
pub use compartment::{Compartment, CompartmentMap, CompartmentValue, Tensor};
pub use error::{Error, NeuralError, Result};
pub use init::{initialize_params, sparse_mask, WeightInit};
pub use key::PrngKey;
