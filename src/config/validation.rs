use crate::config::types::{Config, DispatchConfig, OutputConfig, RemoteConfig, ScanConfig};
use crate::ConfigError;
use url::Url;

/// Placeholder replaced by the identity in the fetch URL template
pub const ID_PLACEHOLDER: &str = "{id}";

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_scan_config(&config.scan)?;
    validate_dispatch_config(&config.dispatch)?;
    validate_remote_config(&config.remote)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates scan configuration
fn validate_scan_config(config: &ScanConfig) -> Result<(), ConfigError> {
    if config.max_iterations < 1 {
        return Err(ConfigError::Validation(format!(
            "max_iterations must be >= 1, got {}",
            config.max_iterations
        )));
    }

    Ok(())
}

/// Validates dispatch configuration
fn validate_dispatch_config(config: &DispatchConfig) -> Result<(), ConfigError> {
    if config.batch_size < 1 || config.batch_size > 500 {
        return Err(ConfigError::Validation(format!(
            "batch_size must be between 1 and 500, got {}",
            config.batch_size
        )));
    }

    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "max_attempts must be >= 1, got {}",
            config.max_attempts
        )));
    }

    Ok(())
}

/// Validates remote endpoints
fn validate_remote_config(config: &RemoteConfig) -> Result<(), ConfigError> {
    if !config.fetch_url_template.contains(ID_PLACEHOLDER) {
        return Err(ConfigError::Validation(format!(
            "fetch_url_template must contain '{}', got '{}'",
            ID_PLACEHOLDER, config.fetch_url_template
        )));
    }

    // The template is checked with a sample identity substituted
    let sample = config.fetch_url_template.replace(ID_PLACEHOLDER, "1");
    validate_http_url("fetch_url_template", &sample)?;
    validate_http_url("submit_url", &config.submit_url)?;

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "timeout_secs must be >= 1, got {}",
            config.timeout_secs
        )));
    }

    if let Some(command) = &config.rotate_command {
        if command.trim().is_empty() {
            return Err(ConfigError::Validation(
                "rotate_command cannot be empty when set".to_string(),
            ));
        }
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    if config.snapshot_path.is_empty() {
        return Err(ConfigError::Validation(
            "snapshot_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_http_url(field: &str, raw: &str) -> Result<(), ConfigError> {
    let url = Url::parse(raw)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", field, raw, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "{} '{}' must use HTTP or HTTPS scheme",
            field, raw
        )));
    }

    Ok(())
}
