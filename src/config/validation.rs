use crate::config::types::{Config, CrawlerConfig, LibraryConfig, ReportConfig};
use crate::ConfigError;
use std::path::Path;
use url::Url;

/// Upper bound for the per-request timeout, in seconds
const MAX_REQUEST_TIMEOUT_SECS: u64 = 300;

/// Validates the entire configuration
///
/// Seeds are optional here: a report-only run needs none. Their format is
/// still checked when present.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_library_config(&config.library)?;
    validate_report_config(&config.report)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    for seed in &config.seeds {
        validate_seed_url(seed)?;
    }

    if config.max_documents < 1 {
        return Err(ConfigError::Validation(format!(
            "max-documents must be >= 1, got {}",
            config.max_documents
        )));
    }

    if config.request_timeout_secs < 1 || config.request_timeout_secs > MAX_REQUEST_TIMEOUT_SECS {
        return Err(ConfigError::Validation(format!(
            "request-timeout-secs must be between 1 and {}, got {}",
            MAX_REQUEST_TIMEOUT_SECS, config.request_timeout_secs
        )));
    }

    if config.crawl_deadline_secs == Some(0) {
        return Err(ConfigError::Validation(
            "crawl-deadline-secs must be >= 1 when set".to_string(),
        ));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates content store configuration
fn validate_library_config(config: &LibraryConfig) -> Result<(), ConfigError> {
    if config.directory.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "library directory cannot be empty".to_string(),
        ));
    }

    if config.max_size < 1 {
        return Err(ConfigError::Validation(format!(
            "max-size must be >= 1, got {}",
            config.max_size
        )));
    }

    Ok(())
}

/// Validates report targets: each needs a file suffix to pick a renderer
fn validate_report_config(config: &ReportConfig) -> Result<(), ConfigError> {
    for target in [&config.books, &config.authors].into_iter().flatten() {
        validate_report_target(target)?;
    }
    Ok(())
}

fn validate_report_target(target: &Path) -> Result<(), ConfigError> {
    let has_suffix = target
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| !ext.is_empty());

    if !has_suffix {
        return Err(ConfigError::Validation(format!(
            "report target '{}' needs a file suffix (md, pdf, epub, ...)",
            target.display()
        )));
    }

    Ok(())
}

/// Validates a seed URL: absolute, HTTP or HTTPS
pub fn validate_seed_url(seed: &str) -> Result<(), ConfigError> {
    let url = Url::parse(seed)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "Seed URL '{}' must use the HTTP or HTTPS scheme",
            seed
        )));
    }

    Ok(())
}
