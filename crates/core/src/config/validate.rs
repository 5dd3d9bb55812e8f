use super::{types::Config, ConfigError, DeliveryBackend};

/// Validate configuration
/// Currently validates:
/// - Required sections exist (enforced by serde)
/// - Fetch concurrency is not 0
/// - The selected delivery backend has its section
/// - Service endpoints are http(s) URLs
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.pipeline.max_concurrent_fetches == 0 {
        return Err(ConfigError::ValidationError(
            "pipeline.max_concurrent_fetches cannot be 0".to_string(),
        ));
    }

    for (key, url) in [
        ("services.token_url", &config.services.token_url),
        ("services.listing_url", &config.services.listing_url),
        ("services.content_url", &config.services.content_url),
    ] {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::ValidationError(format!(
                "{} must be an http(s) URL, got {:?}",
                key, url
            )));
        }
    }

    match config.delivery.backend {
        DeliveryBackend::Sftp if config.delivery.sftp.is_none() => {
            return Err(ConfigError::ValidationError(
                "delivery.backend = \"sftp\" requires a [delivery.sftp] section".to_string(),
            ));
        }
        DeliveryBackend::Local if config.delivery.local.is_none() => {
            return Err(ConfigError::ValidationError(
                "delivery.backend = \"local\" requires a [delivery.local] section".to_string(),
            ));
        }
        _ => {}
    }

    Ok(())
}
