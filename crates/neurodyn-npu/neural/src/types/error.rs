// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for neural component operations

use std::path::PathBuf;

/// Error types for neural component operations
#[derive(Debug, thiserror::Error)]
pub enum NeuralError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Shape mismatch for {what}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        what: String,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Component '{component}' has no compartment '{compartment}'")]
    UnknownCompartment {
        component: String,
        compartment: String,
    },

    #[error("Compartment '{compartment}' of '{component}' is unset")]
    UnsetCompartment {
        component: String,
        compartment: String,
    },

    #[error("Compartment '{compartment}' holds {actual}, expected {expected}")]
    CompartmentType {
        compartment: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Component not found: {0}")]
    UnknownComponent(String),

    #[error("Component already registered: {0}")]
    DuplicateComponent(String),

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Archive not found: {}", .0.display())]
    MissingArchive(PathBuf),

    #[error("Archive for '{component}' has keys {found:?}, expected exactly {expected:?}")]
    ArchiveKeyMismatch {
        component: String,
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = core::result::Result<T, NeuralError>;
pub type Error = NeuralError;

impl NeuralError {
    /// Shorthand for a shape mismatch on a named quantity
    pub fn shape(what: impl Into<String>, expected: (usize, usize), actual: (usize, usize)) -> Self {
        NeuralError::ShapeMismatch {
            what: what.into(),
            expected,
            actual,
        }
    }
}
