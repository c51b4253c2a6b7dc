use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use super::traits::SitePlugin;
use crate::config::OutputProfile;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no plugin found for site \"{0}\"")]
    UnknownSite(String),

    #[error("no plugin found for URL \"{0}\"")]
    UnsupportedUrl(String),
}

/// A plugin together with the archive settings of its site
#[derive(Clone)]
pub struct RegisteredPlugin {
    pub plugin: Arc<dyn SitePlugin>,
    pub profile: Arc<OutputProfile>,
}

/// Registry mapping site names to plugin instances
#[derive(Clone, Default)]
pub struct PluginRegistry {
    plugins: BTreeMap<String, RegisteredPlugin>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, plugin: Arc<dyn SitePlugin>, profile: OutputProfile) {
        let site = plugin.site().to_ascii_lowercase();
        info!(site = %site, method = %profile.method, "Registered site plugin");
        self.plugins.insert(
            site,
            RegisteredPlugin {
                plugin,
                profile: Arc::new(profile),
            },
        );
    }

    pub fn get(&self, site: &str) -> Result<RegisteredPlugin, RegistryError> {
        self.plugins
            .get(&site.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| RegistryError::UnknownSite(site.to_string()))
    }

    pub fn has_site(&self, site: &str) -> bool {
        self.plugins.contains_key(&site.to_ascii_lowercase())
    }

    /// Site owning `url`; the longest matching site name wins
    pub fn site_for_url(&self, url: &str) -> Result<&str, RegistryError> {
        let location = strip_scheme(url.trim()).to_ascii_lowercase();
        let location = location.strip_prefix("www.").unwrap_or(&location);

        self.plugins
            .keys()
            .filter(|site| matches_site(location, site))
            .max_by_key(|site| site.len())
            .map(String::as_str)
            .ok_or_else(|| RegistryError::UnsupportedUrl(url.to_string()))
    }

    pub fn for_url(&self, url: &str) -> Result<RegisteredPlugin, RegistryError> {
        let site = self.site_for_url(url)?;
        self.get(site)
    }

    pub fn sites(&self) -> Vec<String> {
        self.plugins.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

fn strip_scheme(url: &str) -> &str {
    match url.split_once("://") {
        Some((scheme, rest))
            if !scheme.is_empty()
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')) =>
        {
            rest
        }
        _ => url,
    }
}

/// `location` starts with `site` followed by a path, port or query boundary
fn matches_site(location: &str, site: &str) -> bool {
    location
        .strip_prefix(site)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with(['/', ':', '?', '#']))
}
