// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Neurodyn Configuration System
//!
//! Type-safe configuration for simulations, with support for:
//! - TOML file parsing (`neurodyn.toml`)
//! - Environment variable overrides
//! - CLI argument overrides (dotted keys, e.g. `simulation.dt=0.5`)
//!
//! ## Usage
//!
//! ```rust,no_run
//! use neurodyn_config::{load_config, validate_config};
//!
//! let config = load_config(None, None).expect("Failed to load config");
//! validate_config(&config).expect("Invalid config");
//!
//! println!("dt: {}", config.simulation.dt);
//! println!("LIF tau_m: {}", config.lif.tau_m);
//! ```

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod loader;
pub mod types;
pub mod validation;

pub use loader::{
    apply_cli_overrides, apply_environment_overrides, find_config_file, load_config, set_value,
    CONFIG_FILE_NAME,
};
pub use types::*;
pub use validation::{validate_config, ConfigValidationError};

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file not found. Searched: {0}")]
    FileNotFound(String),

    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax: {0}")]
    ParseError(String),

    #[error("Validation failed: {0}")]
    ValidationError(String),

    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_round_trips_through_toml() {
        let config = NeurodynConfig::default();
        let text = toml::to_string(&config).unwrap();
        let parsed: NeurodynConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.simulation.dt, config.simulation.dt);
        assert_eq!(parsed.lif.membrane, config.lif.membrane);
    }
}
