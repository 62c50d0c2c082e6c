// Configuration module for influx-recorder
//
// Provides:
// - YAML configuration file loading
// - Environment variable substitution
// - Configuration validation
// - Persisted connection settings (host, port, user, password)

pub mod types;
mod loader;
mod settings;

pub use types::*;
pub use loader::ConfigLoader;
pub use settings::{ConnectionSettings, DEFAULT_SETTINGS_FILE};

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a YAML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<RecorderConfig> {
    ConfigLoader::load(path).context("Failed to load configuration")
}

/// Load configuration with environment variable overrides
pub fn load_config_with_env<P: AsRef<Path>>(path: P) -> Result<RecorderConfig> {
    let mut config = load_config(path)?;

    // Allow environment variables to override config values
    if let Ok(host) = std::env::var("INFLUX_HOST") {
        config.sink.influxdb.host = host;
    }

    if let Ok(port) = std::env::var("INFLUX_PORT") {
        config.sink.influxdb.port = port
            .parse()
            .with_context(|| format!("INFLUX_PORT is not a valid port: '{}'", port))?;
    }

    if let Ok(database) = std::env::var("INFLUX_DATABASE") {
        config.sink.database = database;
    }

    Ok(config)
}
