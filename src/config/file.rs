//! Reading and writing the `config.yml` sidecar

use super::schema::Config;
use super::validate::validate_config;
use crate::error::{Error, Result};
use std::fs;
use std::path::Path;

/// File name of the configuration sidecar
pub const CONFIG_FILE: &str = "config.yml";

/// Load and validate a configuration file
pub fn load_config<P: AsRef<Path>>(config_path: P) -> Result<Config> {
    let yaml_content = fs::read_to_string(config_path.as_ref()).map_err(|e| {
        Error::ConfigError(format!(
            "Failed to read config file {}: {}",
            config_path.as_ref().display(),
            e
        ))
    })?;

    let config: Config = serde_yaml::from_str(&yaml_content)
        .map_err(|e| Error::ConfigError(format!("Failed to parse YAML config: {e}")))?;

    validate_config(&config).map_err(|e| Error::ConfigError(format!("Invalid config: {e}")))?;

    Ok(config)
}

/// Load a configuration file, writing the defaults first when it is missing
pub fn load_or_default<P: AsRef<Path>>(config_path: P) -> Result<Config> {
    let path = config_path.as_ref();
    if !path.exists() {
        log::warn!(
            "Config file {} not found, regenerating with defaults",
            path.display()
        );
        let config = Config::default();
        save_config(&config, path)?;
        return Ok(config);
    }
    load_config(path)
}

/// Write a configuration file
pub fn save_config<P: AsRef<Path>>(config: &Config, config_path: P) -> Result<()> {
    let data = serde_yaml::to_string(config)
        .map_err(|e| Error::Serialization(format!("YAML serialization failed: {e}")))?;
    fs::write(config_path, data)?;
    Ok(())
}
