use super::models::Config;
use super::profile::OutputProfile;
use crate::http::cache::{MIN_MAXLEN, MIN_THRESHOLD};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid filename template in [{scope}]: {reason}")]
    InvalidTemplate { scope: String, reason: String },

    #[error("Unknown archive method '{method}' in [{scope}], expected files, zip or cbz")]
    UnknownArchiveMethod { scope: String, method: String },

    #[error("Fallback extension in [{scope}] must not be empty")]
    EmptyFallbackExtension { scope: String },

    #[error("Request cache size must be at least {min}, got {actual}")]
    CacheTooSmall { actual: usize, min: usize },

    #[error("Request cache threshold must be at least {min} seconds, got {actual}")]
    CacheThresholdTooShort { actual: u64, min: u64 },

    #[error("Scheduler needs at least one worker")]
    NoWorkers,

    #[error("Timeout must be positive: {field}")]
    ZeroTimeout { field: &'static str },

    #[error("Site name must not be empty")]
    EmptySiteName,
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_scheduler(config)?;
    validate_requests(config)?;
    validate_outputs(config)?;
    Ok(())
}

fn validate_scheduler(config: &Config) -> Result<(), ValidationError> {
    if config.scheduler.workers == 0 {
        return Err(ValidationError::NoWorkers);
    }
    Ok(())
}

fn validate_requests(config: &Config) -> Result<(), ValidationError> {
    let requests = &config.requests;

    if requests.connect_timeout_secs == 0 {
        return Err(ValidationError::ZeroTimeout {
            field: "requests.connect_timeout_secs",
        });
    }
    if requests.read_timeout_secs == 0 {
        return Err(ValidationError::ZeroTimeout {
            field: "requests.read_timeout_secs",
        });
    }

    if requests.cache.maxlen < MIN_MAXLEN {
        return Err(ValidationError::CacheTooSmall {
            actual: requests.cache.maxlen,
            min: MIN_MAXLEN,
        });
    }
    if requests.cache.threshold_secs < MIN_THRESHOLD.as_secs() {
        return Err(ValidationError::CacheThresholdTooShort {
            actual: requests.cache.threshold_secs,
            min: MIN_THRESHOLD.as_secs(),
        });
    }

    Ok(())
}

/// Resolve the default profile and every site override once, which compiles
/// their templates
fn validate_outputs(config: &Config) -> Result<(), ValidationError> {
    OutputProfile::resolve("chapters", &config.chapters, None)?;

    for (site, overrides) in &config.sites {
        if site.trim().is_empty() {
            return Err(ValidationError::EmptySiteName);
        }
        OutputProfile::resolve(&format!("sites.{site}"), &config.chapters, Some(overrides))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::models::*;
    use super::*;

    fn create_test_config() -> Config {
        let mut config = Config::default();
        config.sites.insert(
            "mangadex.org".to_string(),
            SiteConfig {
                method: Some("zip".to_string()),
                ..Default::default()
            },
        );
        config
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&create_test_config()).is_ok());
    }

    #[test]
    fn test_no_workers() {
        let mut config = create_test_config();
        config.scheduler.workers = 0;

        assert!(matches!(validate(&config), Err(ValidationError::NoWorkers)));
    }

    #[test]
    fn test_cache_bounds() {
        let mut config = create_test_config();
        config.requests.cache.maxlen = 49;
        assert!(matches!(
            validate(&config),
            Err(ValidationError::CacheTooSmall { actual: 49, min: 50 })
        ));

        let mut config = create_test_config();
        config.requests.cache.threshold_secs = 59;
        assert!(matches!(
            validate(&config),
            Err(ValidationError::CacheThresholdTooShort { .. })
        ));
    }

    #[test]
    fn test_bad_template_rejected() {
        let mut config = create_test_config();
        config.chapters.format = "{{ manga }} {{ nope }}".to_string();

        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidTemplate { scope, .. }) if scope == "chapters"
        ));
    }

    #[test]
    fn test_site_override_checked() {
        let mut config = create_test_config();
        config.sites.get_mut("mangadex.org").unwrap().method = Some("7z".to_string());

        assert!(matches!(
            validate(&config),
            Err(ValidationError::UnknownArchiveMethod { scope, method })
                if scope == "sites.mangadex.org" && method == "7z"
        ));
    }

    #[test]
    fn test_empty_fallback_extension() {
        let mut config = create_test_config();
        config.chapters.fallback_extension = " . ".to_string();

        assert!(matches!(
            validate(&config),
            Err(ValidationError::EmptyFallbackExtension { .. })
        ));
    }

    #[test]
    fn test_zero_timeout() {
        let mut config = create_test_config();
        config.requests.read_timeout_secs = 0;

        assert!(matches!(
            validate(&config),
            Err(ValidationError::ZeroTimeout { field: "requests.read_timeout_secs" })
        ));
    }
}
