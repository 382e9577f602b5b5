//! Loading configuration files

use crate::config::schema::LeoConfig;
use crate::config::validate::validate_config;
use crate::error::{Error, Result};
use std::fs;
use std::path::Path;

/// Serialization format of a configuration file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Json,
}

impl ConfigFormat {
    /// Format implied by the file extension; YAML unless it ends in `.json`
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Yaml,
        }
    }
}

/// Parse configuration text without validating it
pub fn parse_config(content: &str, format: ConfigFormat) -> Result<LeoConfig> {
    match format {
        ConfigFormat::Yaml => serde_yaml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse YAML config: {e}"))),
        ConfigFormat::Json => serde_json::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse JSON config: {e}"))),
    }
}

/// Load and validate a configuration file
///
/// # Example
///
/// ```no_run
/// use leoseg::config::load_config;
///
/// let config = load_config("config.yaml")?;
/// println!("experiment {}", config.experiment.number);
/// # Ok::<(), leoseg::Error>(())
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<LeoConfig> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {e}", path.display()))
    })?;

    let config = parse_config(&content, ConfigFormat::from_path(path))?;
    validate_config(&config)?;

    if config.use_gpu {
        tracing::warn!("use_gpu is set but only the CPU backend is available; running on CPU");
    }
    tracing::debug!(path = %path.display(), "configuration loaded");

    Ok(config)
}

impl LeoConfig {
    /// Load and validate a configuration file, see [`load_config`]
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        load_config(path)
    }
}
