use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use super::types::{ChapterInfo, MangaInfo, PageList};
use crate::http::FetchError;

#[derive(Debug, Error)]
pub enum PluginError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("URL {0} does not link to a supported page")]
    UnsupportedUrl(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("malformed payload: {0}")]
    Payload(String),

    #[error("invalid plugin configuration: {0}")]
    Config(String),
}

/// A site a chapter can be downloaded from
///
/// Plugins are shared between the API and the scheduler workers, so every
/// method takes `&self`.
#[async_trait]
pub trait SitePlugin: Send + Sync {
    /// Site name, also the URL prefix used to route requests (`mangadex.org`)
    fn site(&self) -> &str;

    fn chapter_id_from_url(&self, url: &str) -> Result<String, PluginError>;

    /// Manga id from a manga URL; plugins may also accept chapter URLs
    async fn manga_id_from_url(&self, url: &str) -> Result<String, PluginError>;

    async fn chapter_info(&self, chapter_id: &str) -> Result<ChapterInfo, PluginError>;

    async fn manga_info(&self, manga_id: &str) -> Result<MangaInfo, PluginError>;

    /// Page URLs in reading order
    async fn chapter_pages(&self, chapter_id: &str) -> Result<PageList, PluginError>;

    /// Every chapter of a manga
    async fn chapters(&self, manga_id: &str) -> Result<Vec<ChapterInfo>, PluginError>;

    /// Raw cover image of a manga
    async fn cover(&self, manga_id: &str) -> Result<Bytes, PluginError>;

    /// Public page of a chapter, written into archive metadata
    fn chapter_url(&self, _chapter_id: &str) -> Option<String> {
        None
    }
}
