//! Configuration loading

use crate::{ConfigFormat, Error, LoaderConfig, Result};
use regex::Regex;
use std::env;
use std::fs;
use std::path::Path;

/// Load configuration from a file without validating it
pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<LoaderConfig> {
    let path = path.as_ref();

    let content = fs::read_to_string(path)?;
    let format = ConfigFormat::from_path(path)?;

    load_from_str(&content, format)
}

/// Expand environment variables in configuration string
/// Supports syntax: ${VAR} and ${VAR:-default}
fn expand_env_vars(content: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(:-([^}]*))?\}")
        .map_err(|e| Error::invalid(format!("Invalid regex: {e}")))?;

    let mut result = String::with_capacity(content.len());
    let mut last_match = 0;

    for cap in re.captures_iter(content) {
        let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
            continue;
        };
        let default_value = cap.get(3).map(|m| m.as_str());

        let value = match (env::var(var_name.as_str()), default_value) {
            (Ok(val), _) => val,
            (Err(_), Some(default)) => default.to_string(),
            (Err(_), None) => {
                return Err(Error::invalid(format!(
                    "Environment variable '{}' not set and no default provided",
                    var_name.as_str()
                )));
            }
        };

        result.push_str(&content[last_match..full_match.start()]);
        result.push_str(&value);
        last_match = full_match.end();
    }

    result.push_str(&content[last_match..]);

    Ok(result)
}

/// Load configuration from a string without validating it
pub fn load_from_str(content: &str, format: ConfigFormat) -> Result<LoaderConfig> {
    let expanded = expand_env_vars(content)?;

    let parse_error = |message: String| Error::Parse { format, message };

    let config = match format {
        ConfigFormat::Yaml => {
            serde_yaml::from_str(&expanded).map_err(|e| parse_error(e.to_string()))?
        }
        ConfigFormat::Toml => toml::from_str(&expanded).map_err(|e| parse_error(e.to_string()))?,
        ConfigFormat::Json => {
            serde_json::from_str(&expanded).map_err(|e| parse_error(e.to_string()))?
        }
    };

    Ok(config)
}

/// Load and validate configuration from a file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<LoaderConfig> {
    let config = load_from_file(path)?;

    crate::validator::validate_config(&config)?;

    tracing::debug!(
        host = %config.packages.host_id,
        loader = %config.packages.loader_id,
        "Configuration loaded"
    );

    Ok(config)
}
