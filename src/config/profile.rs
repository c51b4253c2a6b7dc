use std::path::PathBuf;
use std::time::Duration;

use super::models::{ChaptersConfig, SiteConfig};
use super::validation::ValidationError;
use crate::archive::{ArchiveMethod, DestinationStrategy, FilenameTemplate};

/// Fully resolved archive settings for one site
#[derive(Debug)]
pub struct OutputProfile {
    pub method: ArchiveMethod,
    pub destination: PathBuf,
    pub template: FilenameTemplate,
    pub page_delay: Duration,
    pub strategy: DestinationStrategy,
    pub fallback_extension: String,
}

impl OutputProfile {
    /// Merge `[chapters]` with an optional `[sites.<name>]` override
    pub fn resolve(scope: &str, chapters: &ChaptersConfig, site: Option<&SiteConfig>) -> Result<Self, ValidationError> {
        let method = site.and_then(|s| s.method.as_deref()).unwrap_or(&chapters.method);
        let format = site.and_then(|s| s.format.as_deref()).unwrap_or(&chapters.format);
        let fallback = site
            .and_then(|s| s.fallback_extension.as_deref())
            .unwrap_or(&chapters.fallback_extension);

        let method = method
            .parse::<ArchiveMethod>()
            .map_err(|_| ValidationError::UnknownArchiveMethod {
                scope: scope.to_string(),
                method: method.to_string(),
            })?;

        let template = format
            .parse::<FilenameTemplate>()
            .map_err(|e| ValidationError::InvalidTemplate {
                scope: scope.to_string(),
                reason: e.to_string(),
            })?;

        let fallback_extension = fallback.trim().trim_start_matches('.').to_string();
        if fallback_extension.is_empty() {
            return Err(ValidationError::EmptyFallbackExtension {
                scope: scope.to_string(),
            });
        }

        Ok(Self {
            method,
            destination: site
                .and_then(|s| s.destination.clone())
                .unwrap_or_else(|| chapters.destination.clone()),
            template,
            page_delay: Duration::from_millis(
                site.and_then(|s| s.page_delay_ms).unwrap_or(chapters.page_delay_ms),
            ),
            strategy: DestinationStrategy::from_separate(
                site.and_then(|s| s.separate).unwrap_or(chapters.separate),
            ),
            fallback_extension,
        })
    }
}
