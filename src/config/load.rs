//! Loading run configurations from YAML

use super::schema::RunConfig;
use super::validate::validate_config;
use crate::error::{Error, Result};
use std::fs;
use std::path::Path;

/// Parse and validate a run configuration from YAML text
pub fn parse_config(yaml: &str) -> Result<RunConfig> {
    let cfg: RunConfig = serde_yaml::from_str(yaml)
        .map_err(|e| Error::ConfigError(format!("Failed to parse YAML config: {}", e)))?;

    validate_config(&cfg).map_err(|e| Error::ConfigError(format!("Invalid config: {}", e)))?;

    Ok(cfg)
}

/// Load a run configuration from a YAML file
///
/// # Example
///
/// ```no_run
/// use preparar::config::load_config;
///
/// let cfg = load_config("run.yaml")?;
/// println!("{} epochs at lr={}", cfg.epochs, cfg.lr);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn load_config<P: AsRef<Path>>(config_path: P) -> Result<RunConfig> {
    let yaml_content = fs::read_to_string(config_path.as_ref()).map_err(|e| {
        Error::ConfigError(format!(
            "Failed to read config file {}: {}",
            config_path.as_ref().display(),
            e
        ))
    })?;

    let cfg = parse_config(&yaml_content)?;
    log::debug!(
        "loaded run config {} (task={}, version={})",
        config_path.as_ref().display(),
        cfg.task,
        cfg.version
    );
    Ok(cfg)
}
