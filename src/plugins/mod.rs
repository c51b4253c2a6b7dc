//! Site plugins
//!
//! Each supported site is a [`SitePlugin`] trait object resolving chapter and
//! manga metadata and the ordered page URLs of a chapter. Plugins call into
//! [`crate::http::HttpClient`]; the scheduler and the API only ever see the
//! trait.
//!
//! ## Key Components
//!
//! - [`SitePlugin`] - Contract every site implements
//! - [`PluginRegistry`] - Maps a site name or URL to its plugin
//! - [`MangaDex`] - Plugin backed by the MangaDex JSON API

pub mod mangadex;
mod registry;
mod traits;
mod types;

pub use mangadex::MangaDex;
pub use registry::{PluginRegistry, RegisteredPlugin, RegistryError};
pub use traits::{PluginError, SitePlugin};
pub use types::{ChapterInfo, MangaInfo, PageList, Rating, Status};

use std::sync::Arc;

use crate::config::Config;
use crate::http::HttpCache;

/// Registry holding every built-in plugin, configured from `config`
pub fn build_registry(config: &Config, cache: Arc<HttpCache>) -> Result<PluginRegistry, PluginError> {
    let mut registry = PluginRegistry::new();

    let mangadex = MangaDex::new(
        config.http_client_config(),
        Arc::clone(&cache),
        &config.site_options(mangadex::SITE),
    )?;
    let profile = config
        .output_profile(mangadex::SITE)
        .map_err(|e| PluginError::Config(e.to_string()))?;
    registry.register(Arc::new(mangadex), profile);

    Ok(registry)
}
