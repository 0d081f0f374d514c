use super::types::*;
use crate::config::{expand_env_vars, expand_tilde};
use regex::Regex;
use std::fs::File;
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation failed:\n{}", .0.join("\n"))]
    ValidationList(Vec<String>),

    #[error("validation failed: {0}")]
    Validation(String),
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    use std::io::Read;

    let mut file = File::open(path).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to open config file '{}': {}", path.display(), e),
        ))
    })?;

    let mut yaml_string = String::new();
    file.read_to_string(&mut yaml_string).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read config file '{}': {}", path.display(), e),
        ))
    })?;

    parse_config(&yaml_string)
}

/// Load the config at `path`, or built-in defaults when no file was found
pub fn load_or_default(path: Option<&Path>) -> Result<Config, ConfigError> {
    match path {
        Some(path) => load_config(path),
        None => {
            let config = Config::default();
            validate_config(&config)?;
            Ok(config)
        }
    }
}

/// Parse and validate config from a YAML string
pub fn parse_config(yaml: &str) -> Result<Config, ConfigError> {
    let yaml_string = expand_env_vars(yaml);

    // Parse first so commented-out lines never reach the variable check
    let value: serde_yaml::Value = if yaml_string.trim().is_empty() {
        serde_yaml::Value::Null
    } else {
        serde_yaml::from_str(&yaml_string)?
    };

    // An empty document means "all defaults"
    let mut config: Config = if value.is_null() {
        Config::default()
    } else {
        check_unexpanded_vars(&serde_yaml::to_string(&value)?)?;
        serde_yaml::from_value(value)?
    };

    config.logging.log_directory = expand_tilde(&config.logging.log_directory);

    validate_config(&config)?;

    Ok(config)
}

fn check_unexpanded_vars(yaml_string: &str) -> Result<(), ConfigError> {
    let re = Regex::new(r"\$env\{([A-Za-z_][A-Za-z0-9_]*)\}")
        .map_err(|e| ConfigError::Validation(e.to_string()))?;

    let mut unexpanded_vars: Vec<&str> = re
        .captures_iter(yaml_string)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str()))
        .collect();

    if unexpanded_vars.is_empty() {
        return Ok(());
    }

    unexpanded_vars.sort();
    unexpanded_vars.dedup();

    Err(ConfigError::Validation(format!(
        "environment variables are not set: {}",
        unexpanded_vars.join(", ")
    )))
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    if config.logging.max_file_size_mb == 0 {
        errors.push("logging.max_file_size_mb must be greater than 0".to_string());
    }

    if config.logging.log_directory.as_os_str().is_empty() {
        errors.push("logging.log_directory cannot be empty".to_string());
    }

    if config.ingest.flush_interval_seconds == 0 {
        errors.push("ingest.flush_interval_seconds must be greater than 0".to_string());
    }

    if config.ingest.max_batch_size == 0 {
        errors.push("ingest.max_batch_size must be greater than 0".to_string());
    }

    if config.ingest.queue.capacity == Some(0) {
        errors.push("ingest.queue.capacity must be greater than 0 when set".to_string());
    }

    match (&config.remote, config.ingest.mode) {
        (None, IngestMode::Remote) => {
            errors.push("ingest.mode is 'remote' but no 'remote' section is configured".to_string());
        }
        (Some(remote), _) => validate_remote(remote, &mut errors),
        _ => {}
    }

    if config.web.listen.parse::<SocketAddr>().is_err() {
        errors.push(format!(
            "web.listen: '{}' is not a valid socket address",
            config.web.listen
        ));
    }

    match errors.len() {
        0 => Ok(()),
        1 => Err(ConfigError::Validation(errors.remove(0))),
        _ => Err(ConfigError::ValidationList(errors)),
    }
}

fn validate_remote(remote: &RemoteConfig, errors: &mut Vec<String>) {
    if !(remote.url.starts_with("http://") || remote.url.starts_with("https://")) {
        errors.push(format!(
            "remote.url: '{}' must start with http:// or https://",
            remote.url
        ));
    }

    if remote.key.trim().is_empty() {
        errors.push("remote.key cannot be empty".to_string());
    }

    if remote.poll_interval.is_zero() {
        errors.push("remote.poll_interval must be greater than 0".to_string());
    }
}
