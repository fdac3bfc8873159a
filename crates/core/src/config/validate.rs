use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Ledger partition is not empty
/// - Input and output containers are distinct, non-empty names
/// - Concurrency, timeouts and error length limits are non-zero
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.ledger.partition.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "ledger.partition cannot be empty".to_string(),
        ));
    }

    let storage = &config.storage;
    for (key, name) in [
        ("storage.input_container", &storage.input_container),
        ("storage.output_container", &storage.output_container),
    ] {
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(ConfigError::ValidationError(format!(
                "{} must be a plain directory name, got {:?}",
                key, name
            )));
        }
    }
    if storage.input_container == storage.output_container {
        return Err(ConfigError::ValidationError(
            "storage.input_container and storage.output_container must differ".to_string(),
        ));
    }

    if config.orchestrator.max_concurrent_jobs == 0 {
        return Err(ConfigError::ValidationError(
            "orchestrator.max_concurrent_jobs cannot be 0".to_string(),
        ));
    }

    if config.orchestrator.max_error_message_len == 0 {
        return Err(ConfigError::ValidationError(
            "orchestrator.max_error_message_len cannot be 0".to_string(),
        ));
    }

    if config.tools.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "tools.timeout_secs cannot be 0".to_string(),
        ));
    }

    if config.shortener.enabled && config.shortener.timeout_ms == 0 {
        return Err(ConfigError::ValidationError(
            "shortener.timeout_ms cannot be 0 when the shortener is enabled".to_string(),
        ));
    }

    Ok(())
}
