// Configuration loader with environment variable substitution

use super::types::*;
use anyhow::{bail, Context, Result};
use regex::Regex;
use std::path::Path;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file with environment variable substitution
    pub fn load<P: AsRef<Path>>(path: P) -> Result<RecorderConfig> {
        let content = std::fs::read_to_string(path.as_ref())
            .context("Failed to read config file")?;

        Self::parse(&content)
    }

    /// Parse YAML text, substituting environment variables first
    pub fn parse(content: &str) -> Result<RecorderConfig> {
        let content = Self::substitute_env_vars(content)?;

        let config: RecorderConfig = serde_yaml::from_str(&content)
            .context("Failed to parse YAML configuration")?;

        Self::validate(&config)?;

        Ok(config)
    }

    /// Write configuration back as YAML
    pub fn save<P: AsRef<Path>>(path: P, config: &RecorderConfig) -> Result<()> {
        let yaml = serde_yaml::to_string(config).context("Failed to serialize configuration")?;
        std::fs::write(path.as_ref(), yaml).context("Failed to write config file")?;
        Ok(())
    }

    /// Substitute ${VAR} and ${VAR:-default} patterns with environment variables
    ///
    /// Examples:
    /// - ${INFLUX_HOST} -> influx.internal
    /// - ${INFLUX_PORT:-8086} -> 8086 (if INFLUX_PORT not set)
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}:]+)(?::-([^}]*))?\}")
            .context("Invalid substitution pattern")?;

        Ok(re
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                let default_value = caps.get(2).map(|m| m.as_str());

                match std::env::var(var_name) {
                    Ok(value) => value,
                    Err(_) => match default_value {
                        Some(default) => default.to_string(),
                        // Keep original if no default and var not found
                        None => format!("${{{}}}", var_name),
                    },
                }
            })
            .to_string())
    }

    /// Validate configuration
    pub fn validate(config: &RecorderConfig) -> Result<()> {
        let recorder = &config.recorder;
        if recorder.queue_capacity == 0 {
            bail!("recorder.queue_capacity must be > 0");
        }

        if recorder.poll_timeout_ms == 0 {
            bail!("recorder.poll_timeout_ms must be > 0");
        }

        if recorder.max_batch_size == 0 {
            bail!("recorder.max_batch_size must be > 0");
        }

        if recorder.enqueue_timeout_ms == 0 {
            bail!("recorder.enqueue_timeout_ms must be > 0");
        }

        if recorder.events.is_empty() {
            bail!("recorder.events must list at least one event kind");
        }

        let sink = &config.sink;
        if sink.database.trim().is_empty() {
            bail!("sink.database cannot be empty");
        }

        if sink.retention_policy.name.trim().is_empty() {
            bail!("sink.retention_policy.name cannot be empty");
        }

        if sink.retention_policy.replication == 0 {
            bail!("sink.retention_policy.replication must be > 0");
        }

        match sink.backend.as_str() {
            "influxdb" => {
                if sink.influxdb.port == 0 {
                    bail!("sink.influxdb.port must be > 0");
                }
            }
            "filesystem" => {
                if sink.filesystem.base_path.is_empty() {
                    bail!("sink.filesystem.base_path cannot be empty");
                }
            }
            unknown => bail!("Unknown backend: '{}'. Supported: influxdb, filesystem", unknown),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("IR_LOADER_TEST_VAR", "test_value");

        let input = "host: ${IR_LOADER_TEST_VAR}";
        let output = ConfigLoader::substitute_env_vars(input).unwrap();
        assert_eq!(output, "host: test_value");

        std::env::remove_var("IR_LOADER_TEST_VAR");
    }

    #[test]
    fn test_env_var_with_default() {
        std::env::remove_var("IR_LOADER_TEST_VAR2");

        let input = "database: ${IR_LOADER_TEST_VAR2:-vnpy_record}";
        let output = ConfigLoader::substitute_env_vars(input).unwrap();
        assert_eq!(output, "database: vnpy_record");
    }

    #[test]
    fn test_parse_minimal_uses_defaults() {
        let config = ConfigLoader::parse("sink:\n  backend: influxdb\n").unwrap();
        assert_eq!(config.sink.database, "vnpy_record");
        assert_eq!(config.sink.retention_policy.name, "rt");
        assert_eq!(config.sink.retention_policy.duration, "7d");
        assert_eq!(config.sink.retention_policy.shard_duration, "1d");
        assert_eq!(config.recorder.queue_capacity, 100);
        assert_eq!(config.recorder.events.len(), 4);
    }

    #[test]
    fn test_parse_event_subset() {
        let yaml = "recorder:\n  events: [tick, strategy_log]\n";
        let config = ConfigLoader::parse(yaml).unwrap();
        assert_eq!(
            config.recorder.events,
            vec![EventKind::Tick, EventKind::StrategyLog]
        );
    }

    #[test]
    fn test_validation_invalid_queue_capacity() {
        let mut config = RecorderConfig::default();
        config.recorder.queue_capacity = 0;

        let result = ConfigLoader::validate(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("queue_capacity"));
    }

    #[test]
    fn test_validation_unknown_backend() {
        let mut config = RecorderConfig::default();
        config.sink.backend = "s3".to_string();

        let result = ConfigLoader::validate(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Unknown backend"));
    }

    #[test]
    fn test_validation_empty_events() {
        let mut config = RecorderConfig::default();
        config.recorder.events.clear();
        assert!(ConfigLoader::validate(&config).is_err());
    }
}
