// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration validation
//!
//! Time constants are divisors in the cell and synapse dynamics and are never
//! checked while stepping, so every degenerate value is rejected here.

use crate::{ConfigError, ConfigResult, NeurodynConfig};

/// Accepted integrator names
pub const INTEGRATORS: [&str; 3] = ["euler", "rk2", "midpoint"];
/// Accepted optimizer names
pub const OPTIMIZERS: [&str; 2] = ["sgd", "adam"];
/// Accepted membrane variants
pub const MEMBRANES: [&str; 2] = ["linear", "quadratic"];

/// Validation errors that can occur during config validation
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValidationError {
    NotPositive { field: String, value: f32 },
    Negative { field: String, value: f32 },
    OutOfRange { field: String, value: f32, min: f32, max: f32 },
    UnknownName { field: String, value: String, allowed: &'static [&'static str] },
    InvalidValue { field: String, reason: String },
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotPositive { field, value } => {
                write!(f, "{} = {} must be > 0", field, value)
            }
            Self::Negative { field, value } => {
                write!(f, "{} = {} must be >= 0", field, value)
            }
            Self::OutOfRange { field, value, min, max } => {
                write!(f, "{} = {} must be between {} and {}", field, value, min, max)
            }
            Self::UnknownName { field, value, allowed } => {
                write!(f, "{} = '{}' is not one of {:?}", field, value, allowed)
            }
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid configuration value for {}: {}", field, reason)
            }
        }
    }
}

/// Validate the complete configuration
///
/// Checks for:
/// - Strictly positive step size and time constants that divide
/// - Non-negative optional time constants and bounds
/// - Known integrator, optimizer and membrane names
/// - Consistent latency normalization settings
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` listing every violation
pub fn validate_config(config: &NeurodynConfig) -> ConfigResult<()> {
    let mut errors = Vec::new();

    validate_simulation(config, &mut errors);
    validate_cells(config, &mut errors);
    validate_synapses(config, &mut errors);

    if !errors.is_empty() {
        let error_messages = errors
            .iter()
            .map(|e| format!("  - {}", e))
            .collect::<Vec<_>>()
            .join("\n");

        return Err(ConfigError::ValidationError(format!(
            "Configuration validation failed:\n{}",
            error_messages
        )));
    }

    Ok(())
}

fn positive(field: &str, value: f32, errors: &mut Vec<ConfigValidationError>) {
    if !(value > 0.0) {
        errors.push(ConfigValidationError::NotPositive {
            field: field.to_string(),
            value,
        });
    }
}

fn non_negative(field: &str, value: f32, errors: &mut Vec<ConfigValidationError>) {
    if !(value >= 0.0) {
        errors.push(ConfigValidationError::Negative {
            field: field.to_string(),
            value,
        });
    }
}

fn known(field: &str, value: &str, allowed: &'static [&'static str], errors: &mut Vec<ConfigValidationError>) {
    if !allowed.contains(&value.to_lowercase().as_str()) {
        errors.push(ConfigValidationError::UnknownName {
            field: field.to_string(),
            value: value.to_string(),
            allowed,
        });
    }
}

fn validate_simulation(config: &NeurodynConfig, errors: &mut Vec<ConfigValidationError>) {
    positive("simulation.dt", config.simulation.dt, errors);
    if config.simulation.batch_size == 0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "simulation.batch_size".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    known("simulation.integrator", &config.simulation.integrator, &INTEGRATORS, errors);
}

fn validate_cells(config: &NeurodynConfig, errors: &mut Vec<ConfigValidationError>) {
    let lif = &config.lif;
    positive("lif.tau_m", lif.tau_m, errors);
    non_negative("lif.tau_theta", lif.tau_theta, errors);
    non_negative("lif.refract_t", lif.refract_t, errors);
    known("lif.membrane", &lif.membrane, &MEMBRANES, errors);

    let slif = &config.slif;
    positive("slif.tau_m", slif.tau_m, errors);
    non_negative("slif.inhibit_r", slif.inhibit_r, errors);
    non_negative("slif.rho_b", slif.rho_b, errors);
    non_negative("slif.refract_t", slif.refract_t, errors);
    non_negative("slif.thr_jitter", slif.thr_jitter, errors);

    let latency = &config.latency;
    positive("latency.tau", latency.tau, errors);
    non_negative("latency.threshold", latency.threshold, errors);
    if latency.normalize && latency.num_steps < 1.0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "latency.num_steps".to_string(),
            reason: format!("must be >= 1 when normalize is enabled (got {})", latency.num_steps),
        });
    }
}

fn validate_synapses(config: &NeurodynConfig, errors: &mut Vec<ConfigValidationError>) {
    let hebbian = &config.hebbian;
    non_negative("hebbian.eta", hebbian.eta, errors);
    non_negative("hebbian.w_bound", hebbian.w_bound, errors);
    non_negative("hebbian.w_decay", hebbian.w_decay, errors);
    known("hebbian.optim_type", &hebbian.optim_type, &OPTIMIZERS, errors);
    if !(hebbian.p_conn > 0.0 && hebbian.p_conn <= 1.0) {
        errors.push(ConfigValidationError::OutOfRange {
            field: "hebbian.p_conn".to_string(),
            value: hebbian.p_conn,
            min: 0.0,
            max: 1.0,
        });
    }

    let stdp = &config.stdp;
    non_negative("stdp.eta", stdp.eta, errors);
    non_negative("stdp.w_bound", stdp.w_bound, errors);
    non_negative("stdp.mu", stdp.mu, errors);
    positive("stdp.tau_plus", stdp.tau_plus, errors);
    positive("stdp.tau_minus", stdp.tau_minus, errors);
    known("stdp.optim_type", &stdp.optim_type, &OPTIMIZERS, errors);

    let stp = &config.stp;
    positive("stp.tau_f", stp.tau_f, errors);
    non_negative("stp.tau_d", stp.tau_d, errors);
    if !(stp.p_conn > 0.0 && stp.p_conn <= 1.0) {
        errors.push(ConfigValidationError::OutOfRange {
            field: "stp.p_conn".to_string(),
            value: stp.p_conn,
            min: 0.0,
            max: 1.0,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = NeurodynConfig::default();
        let result = validate_config(&config);
        if let Err(e) = &result {
            eprintln!("Validation error: {}", e);
        }
        assert!(result.is_ok());
    }

    #[test]
    fn test_zero_time_constants_rejected() {
        let mut config = NeurodynConfig::default();
        config.lif.tau_m = 0.0;
        config.stp.tau_f = 0.0;

        let result = validate_config(&config);
        match result {
            Err(ConfigError::ValidationError(msg)) => {
                assert!(msg.contains("lif.tau_m"));
                assert!(msg.contains("stp.tau_f"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_tau_d_zero_allowed_but_negative_rejected() {
        let mut config = NeurodynConfig::default();
        config.stp.tau_d = 0.0;
        assert!(validate_config(&config).is_ok());

        config.stp.tau_d = -1.0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_unknown_names_rejected() {
        let mut config = NeurodynConfig::default();
        config.simulation.integrator = "rk4".to_string();
        config.hebbian.optim_type = "rmsprop".to_string();

        if let Err(ConfigError::ValidationError(msg)) = validate_config(&config) {
            assert!(msg.contains("simulation.integrator"));
            assert!(msg.contains("rmsprop"));
        } else {
            panic!("expected validation error");
        }
    }

    #[test]
    fn test_latency_normalize_requires_steps() {
        let mut config = NeurodynConfig::default();
        config.latency.normalize = true;
        config.latency.num_steps = 0.0;

        if let Err(ConfigError::ValidationError(msg)) = validate_config(&config) {
            assert!(msg.contains("latency.num_steps"));
        } else {
            panic!("expected validation error");
        }
    }
}
