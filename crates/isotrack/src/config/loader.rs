use std::collections::HashSet;
use std::path::Path;

use crate::config::schema::ArchiverConfig;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../schema/config-v1.json");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Yaml,
}

impl ConfigFormat {
    /// `.yaml` / `.yml` select YAML; anything else is read as JSON.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("yaml") | Some("yml") => ConfigFormat::Yaml,
            _ => ConfigFormat::Json,
        }
    }
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ArchiverConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content, ConfigFormat::from_path(path))
}

pub fn load_config_from_str(
    content: &str,
    format: ConfigFormat,
) -> Result<ArchiverConfig, ConfigError> {
    let value: serde_json::Value = match format {
        ConfigFormat::Json => serde_json::from_str(content)?,
        ConfigFormat::Yaml => serde_yaml::from_str(content)?,
    };

    validate_schema(&value)?;

    let config: ArchiverConfig = serde_json::from_value(value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let errors: Vec<String> = validator.iter_errors(value).map(|e| e.to_string()).collect();
    if !errors.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: errors.join("; "),
        });
    }

    Ok(())
}

/// Checks the rules the schema cannot express. Directories are not required
/// to exist: a missing folder is a per-tick error, not a fatal one.
pub fn validate_config(config: &ArchiverConfig) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for (key, dir) in config.directories() {
        if dir.as_os_str().is_empty() {
            return Err(ConfigError::Validation {
                message: format!("{} must not be empty", key),
            });
        }
        if !dir.is_absolute() {
            return Err(ConfigError::Validation {
                message: format!("{} must be an absolute path: {}", key, dir.display()),
            });
        }
        if !seen.insert(dir) {
            return Err(ConfigError::Validation {
                message: format!(
                    "{} duplicates another stage directory: {}",
                    key,
                    dir.display()
                ),
            });
        }
    }

    let ext = &config.tracked_extension;
    if ext.is_empty() || ext.contains(['.', '/', '\\']) {
        return Err(ConfigError::Validation {
            message: format!("tracked_extension must be a bare extension, got '{}'", ext),
        });
    }

    glob::Pattern::new(&config.report_pattern).map_err(|e| ConfigError::InvalidPattern {
        pattern: config.report_pattern.clone(),
        reason: e.to_string(),
    })?;

    if let Some(region) = &config.report_region {
        if region.is_empty() || !region.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ConfigError::Validation {
                message: format!("report_region must be a country code, got '{}'", region),
            });
        }
    }

    if config.timing.poll_interval_ms == 0 {
        return Err(ConfigError::Validation {
            message: "timing.poll_interval_ms must be positive".to_string(),
        });
    }
    if config.timing.db_busy_timeout_secs == 0 || config.timing.stop_timeout_secs == 0 {
        return Err(ConfigError::Validation {
            message: "timing timeouts must be positive".to_string(),
        });
    }
    if config.retry.max_attempts == 0 {
        return Err(ConfigError::Validation {
            message: "retry.max_attempts must be at least 1".to_string(),
        });
    }
    if config.retry.base_backoff_ms == Some(0) || config.retry.max_backoff_secs == 0 {
        return Err(ConfigError::Validation {
            message: "retry backoff durations must be positive".to_string(),
        });
    }

    Ok(())
}
