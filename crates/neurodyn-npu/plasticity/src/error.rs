// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for plasticity operations

use neurodyn_npu_neural::NeuralError;

#[derive(Debug, thiserror::Error)]
pub enum PlasticityError {
    #[error(transparent)]
    Neural(#[from] NeuralError),

    #[error("Unknown optimizer: {0}")]
    UnknownOptimizer(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Optimizer state mismatch: {0}")]
    OptimizerState(String),
}

pub type Result<T> = core::result::Result<T, PlasticityError>;

/// Components report through the neural error type
impl From<PlasticityError> for NeuralError {
    fn from(err: PlasticityError) -> Self {
        match err {
            PlasticityError::Neural(inner) => inner,
            other => NeuralError::InvalidParameter(other.to_string()),
        }
    }
}
