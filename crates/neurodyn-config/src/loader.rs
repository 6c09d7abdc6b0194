// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration file loading with override support
//!
//! This module implements the 3-tier configuration loading system:
//! 1. TOML file (base defaults)
//! 2. Environment variables (runtime overrides)
//! 3. CLI arguments (explicit user overrides)

use crate::{ConfigError, ConfigResult, NeurodynConfig};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Default configuration file name
pub const CONFIG_FILE_NAME: &str = "neurodyn.toml";

/// Find the neurodyn configuration file
///
/// Search order:
/// 1. `NEURODYN_CONFIG_PATH` environment variable
/// 2. Current working directory: `./neurodyn.toml`
/// 3. Parent directories (up to 5 levels)
///
/// # Errors
///
/// Returns `ConfigError::FileNotFound` if no config file is found in any location
pub fn find_config_file() -> ConfigResult<PathBuf> {
    if let Ok(env_path) = env::var("NEURODYN_CONFIG_PATH") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        return Err(ConfigError::FileNotFound(format!(
            "Config file specified by NEURODYN_CONFIG_PATH not found: {}",
            path.display()
        )));
    }

    let mut search_paths = Vec::new();
    if let Ok(cwd) = env::current_dir() {
        search_paths.push(cwd.join(CONFIG_FILE_NAME));
        let mut current = cwd.clone();
        for _ in 0..5 {
            if let Some(parent) = current.parent() {
                search_paths.push(parent.join(CONFIG_FILE_NAME));
                current = parent.to_path_buf();
            }
        }
    }

    if let Some(found) = search_paths.iter().find(|p| p.exists()) {
        return Ok(found.clone());
    }

    let search_list = search_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::FileNotFound(format!(
        "'{}' not found in any of these locations:\n{}\n\nSet NEURODYN_CONFIG_PATH to specify a custom location.",
        CONFIG_FILE_NAME, search_list
    )))
}

/// Load configuration from TOML file
///
/// # Arguments
///
/// * `config_path` - Optional path to config file. If `None`, will search for config file.
/// * `cli_args` - Optional CLI overrides keyed by dotted path (`"lif.tau_m" -> "10"`)
///
/// # Errors
///
/// Returns error if the config file is not found, contains invalid TOML, or a
/// CLI override names an unknown key or carries an unparsable value
pub fn load_config(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<NeurodynConfig> {
    let config_file = match config_path {
        Some(path) => path.to_path_buf(),
        None => find_config_file()?,
    };

    let content = fs::read_to_string(&config_file)?;
    let mut config: NeurodynConfig = toml::from_str(&content)?;

    apply_environment_overrides(&mut config);

    if let Some(cli) = cli_args {
        apply_cli_overrides(&mut config, cli)?;
    }

    Ok(config)
}

/// Apply environment variable overrides to configuration
///
/// Supported environment variables:
/// - `NEURODYN_DT` -> `simulation.dt`
/// - `NEURODYN_BATCH_SIZE` -> `simulation.batch_size`
/// - `NEURODYN_SEED` -> `simulation.seed`
/// - `NEURODYN_INTEGRATOR` -> `simulation.integrator`
/// - `NEURODYN_LOG_LEVEL` -> `logging.level`
///
/// Unparsable values are ignored.
pub fn apply_environment_overrides(config: &mut NeurodynConfig) {
    const ENV_KEYS: [(&str, &str); 5] = [
        ("NEURODYN_DT", "simulation.dt"),
        ("NEURODYN_BATCH_SIZE", "simulation.batch_size"),
        ("NEURODYN_SEED", "simulation.seed"),
        ("NEURODYN_INTEGRATOR", "simulation.integrator"),
        ("NEURODYN_LOG_LEVEL", "logging.level"),
    ];
    for (var, key) in ENV_KEYS {
        if let Ok(value) = env::var(var) {
            let _ = set_value(config, key, &value);
        }
    }
}

/// Apply CLI argument overrides to configuration
///
/// # Arguments
///
/// * `config` - Configuration to modify
/// * `cli_args` - Dotted-key overrides (e.g., `{"simulation.dt": "0.5", "stp.tau_d": "0"}`)
pub fn apply_cli_overrides(
    config: &mut NeurodynConfig,
    cli_args: &HashMap<String, String>,
) -> ConfigResult<()> {
    for (key, value) in cli_args {
        set_value(config, key, value)?;
    }
    Ok(())
}

fn parse<T: FromStr>(key: &str, value: &str) -> ConfigResult<T> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| ConfigError::InvalidValue(format!("{} = '{}'", key, value)))
}

fn parse_bool(key: &str, value: &str) -> ConfigResult<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue(format!("{} = '{}'", key, value))),
    }
}

/// Set a single field by dotted key
pub fn set_value(config: &mut NeurodynConfig, key: &str, value: &str) -> ConfigResult<()> {
    match key {
        // simulation
        "simulation.dt" => config.simulation.dt = parse(key, value)?,
        "simulation.batch_size" => config.simulation.batch_size = parse(key, value)?,
        "simulation.seed" => config.simulation.seed = Some(parse(key, value)?),
        "simulation.integrator" => config.simulation.integrator = value.trim().to_lowercase(),

        // lif
        "lif.tau_m" => config.lif.tau_m = parse(key, value)?,
        "lif.resistance" => config.lif.resistance = parse(key, value)?,
        "lif.thr" => config.lif.thr = parse(key, value)?,
        "lif.v_rest" => config.lif.v_rest = parse(key, value)?,
        "lif.v_reset" => config.lif.v_reset = parse(key, value)?,
        "lif.tau_theta" => config.lif.tau_theta = parse(key, value)?,
        "lif.theta_plus" => config.lif.theta_plus = parse(key, value)?,
        "lif.refract_t" => config.lif.refract_t = parse(key, value)?,
        "lif.one_spike" => config.lif.one_spike = parse_bool(key, value)?,
        "lif.thr_persist" => config.lif.thr_persist = parse_bool(key, value)?,
        "lif.membrane" => config.lif.membrane = value.trim().to_lowercase(),
        "lif.v_c" => config.lif.v_c = parse(key, value)?,
        "lif.a0" => config.lif.a0 = parse(key, value)?,

        // slif
        "slif.tau_m" => config.slif.tau_m = parse(key, value)?,
        "slif.resistance" => config.slif.resistance = parse(key, value)?,
        "slif.thr" => config.slif.thr = parse(key, value)?,
        "slif.inhibit_r" => config.slif.inhibit_r = parse(key, value)?,
        "slif.thr_persist" => config.slif.thr_persist = parse_bool(key, value)?,
        "slif.thr_gain" => config.slif.thr_gain = parse(key, value)?,
        "slif.thr_leak" => config.slif.thr_leak = parse(key, value)?,
        "slif.rho_b" => config.slif.rho_b = parse(key, value)?,
        "slif.refract_t" => config.slif.refract_t = parse(key, value)?,
        "slif.sticky_spikes" => config.slif.sticky_spikes = parse_bool(key, value)?,
        "slif.thr_jitter" => config.slif.thr_jitter = parse(key, value)?,

        // latency
        "latency.tau" => config.latency.tau = parse(key, value)?,
        "latency.threshold" => config.latency.threshold = parse(key, value)?,
        "latency.first_spike_time" => config.latency.first_spike_time = parse(key, value)?,
        "latency.linearize" => config.latency.linearize = parse_bool(key, value)?,
        "latency.normalize" => config.latency.normalize = parse_bool(key, value)?,
        "latency.num_steps" => config.latency.num_steps = parse(key, value)?,

        // hebbian
        "hebbian.eta" => config.hebbian.eta = parse(key, value)?,
        "hebbian.w_bound" => config.hebbian.w_bound = parse(key, value)?,
        "hebbian.is_nonnegative" => config.hebbian.is_nonnegative = parse_bool(key, value)?,
        "hebbian.w_decay" => config.hebbian.w_decay = parse(key, value)?,
        "hebbian.sign_val" => config.hebbian.sign_val = parse(key, value)?,
        "hebbian.optim_type" => config.hebbian.optim_type = value.trim().to_lowercase(),
        "hebbian.pre_wght" => config.hebbian.pre_wght = parse(key, value)?,
        "hebbian.post_wght" => config.hebbian.post_wght = parse(key, value)?,
        "hebbian.resist_scale" => config.hebbian.resist_scale = parse(key, value)?,
        "hebbian.p_conn" => config.hebbian.p_conn = parse(key, value)?,

        // stdp
        "stdp.eta" => config.stdp.eta = parse(key, value)?,
        "stdp.a_plus" => config.stdp.a_plus = parse(key, value)?,
        "stdp.a_minus" => config.stdp.a_minus = parse(key, value)?,
        "stdp.mu" => config.stdp.mu = parse(key, value)?,
        "stdp.pre_trace_target" => config.stdp.pre_trace_target = parse(key, value)?,
        "stdp.w_bound" => config.stdp.w_bound = parse(key, value)?,
        "stdp.exp_beta" => config.stdp.exp_beta = parse(key, value)?,
        "stdp.tau_plus" => config.stdp.tau_plus = parse(key, value)?,
        "stdp.tau_minus" => config.stdp.tau_minus = parse(key, value)?,
        "stdp.sign_val" => config.stdp.sign_val = parse(key, value)?,
        "stdp.optim_type" => config.stdp.optim_type = value.trim().to_lowercase(),
        "stdp.resist_scale" => config.stdp.resist_scale = parse(key, value)?,

        // stp
        "stp.tau_f" => config.stp.tau_f = parse(key, value)?,
        "stp.tau_d" => config.stp.tau_d = parse(key, value)?,
        "stp.resist_scale" => config.stp.resist_scale = parse(key, value)?,
        "stp.p_conn" => config.stp.p_conn = parse(key, value)?,

        // logging
        "logging.level" => config.logging.level = value.trim().to_string(),
        "logging.file_logging" => config.logging.file_logging = parse_bool(key, value)?,
        "logging.log_dir" => config.logging.log_dir = PathBuf::from(value.trim()),

        other => return Err(ConfigError::UnknownKey(other.to_string())),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::tempdir;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_find_config_file_env_var() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("custom.toml");
        File::create(&config_path).unwrap();

        env::set_var("NEURODYN_CONFIG_PATH", config_path.to_str().unwrap());
        let result = find_config_file();
        env::remove_var("NEURODYN_CONFIG_PATH");

        assert_eq!(result.unwrap(), config_path);
    }

    #[test]
    fn test_find_config_file_env_var_missing() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        env::set_var("NEURODYN_CONFIG_PATH", "/definitely/not/here/neurodyn.toml");
        let result = find_config_file();
        env::remove_var("NEURODYN_CONFIG_PATH");

        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_minimal_config() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        env::remove_var("NEURODYN_DT");
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);

        let mut file = File::create(&config_path).unwrap();
        writeln!(file, "[simulation]").unwrap();
        writeln!(file, "dt = 0.5").unwrap();
        writeln!(file, "seed = 1234").unwrap();
        writeln!(file, "[stp]").unwrap();
        writeln!(file, "tau_d = 0.0").unwrap();

        let config = load_config(Some(&config_path), None).unwrap();

        assert_eq!(config.simulation.dt, 0.5);
        assert_eq!(config.simulation.seed, Some(1234));
        assert_eq!(config.stp.tau_d, 0.0);
        assert_eq!(config.stp.tau_f, 750.0);
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&config_path, "[simulation\ndt = ").unwrap();

        assert!(matches!(
            load_config(Some(&config_path), None),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_environment_overrides() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let mut config = NeurodynConfig::default();

        env::set_var("NEURODYN_DT", "0.1");
        env::set_var("NEURODYN_INTEGRATOR", "RK2");
        env::set_var("NEURODYN_BATCH_SIZE", "not-a-number");

        apply_environment_overrides(&mut config);

        env::remove_var("NEURODYN_DT");
        env::remove_var("NEURODYN_INTEGRATOR");
        env::remove_var("NEURODYN_BATCH_SIZE");

        assert_eq!(config.simulation.dt, 0.1);
        assert_eq!(config.simulation.integrator, "rk2");
        assert_eq!(config.simulation.batch_size, 1);
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = NeurodynConfig::default();
        let mut cli_args = HashMap::new();
        cli_args.insert("lif.one_spike".to_string(), "false".to_string());
        cli_args.insert("hebbian.w_bound".to_string(), "2.5".to_string());

        apply_cli_overrides(&mut config, &cli_args).unwrap();

        assert!(!config.lif.one_spike);
        assert_eq!(config.hebbian.w_bound, 2.5);
    }

    #[test]
    fn test_cli_override_errors() {
        let mut config = NeurodynConfig::default();
        assert!(matches!(
            set_value(&mut config, "lif.nope", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(matches!(
            set_value(&mut config, "lif.tau_m", "fast"),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_override_precedence() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);

        let mut file = File::create(&config_path).unwrap();
        writeln!(file, "[simulation]").unwrap();
        writeln!(file, "dt = 2.0").unwrap();
        writeln!(file, "batch_size = 4").unwrap();

        env::set_var("NEURODYN_DT", "1.5");
        env::set_var("NEURODYN_BATCH_SIZE", "8");

        let mut cli_args = HashMap::new();
        cli_args.insert("simulation.dt".to_string(), "0.25".to_string());

        let config = load_config(Some(&config_path), Some(&cli_args)).unwrap();

        env::remove_var("NEURODYN_DT");
        env::remove_var("NEURODYN_BATCH_SIZE");

        // CLI wins for dt, env wins for batch_size (no CLI override)
        assert_eq!(config.simulation.dt, 0.25);
        assert_eq!(config.simulation.batch_size, 8);
    }
}
