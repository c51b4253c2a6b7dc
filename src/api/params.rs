//! Request context resolution
//!
//! Most routes accept either `url=<page url>` or `site=<site>&id=<id>`.
//! These helpers turn the raw query into a plugin plus identifier before
//! any core operation runs. They never touch the network.

use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;

use super::error::ApiError;
use super::models::ChapterBatchRequest;
use crate::plugins::{PluginRegistry, RegisteredPlugin};

/// Raw `url` / `site` + `id` query parameters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TargetQuery {
    pub url: Option<String>,
    pub site: Option<String>,
    pub id: Option<String>,
    #[serde(default)]
    pub mark: bool,
}

/// How the caller designated a resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Url(String),
    Id { site: String, id: String },
}

impl TargetQuery {
    pub fn target(&self) -> Result<Target, ApiError> {
        let non_empty = |v: &Option<String>| v.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(String::from);

        if let Some(url) = non_empty(&self.url) {
            return Ok(Target::Url(url));
        }
        match (non_empty(&self.site), non_empty(&self.id)) {
            (Some(site), Some(id)) => Ok(Target::Id { site, id }),
            _ => Err(ApiError::InvalidPayload(
                "request is missing the url parameter or the site and id parameters".to_string(),
            )),
        }
    }
}

/// A chapter resolved to its plugin
#[derive(Clone)]
pub struct ChapterRef {
    pub site: String,
    pub chapter_id: String,
    pub target: RegisteredPlugin,
}

/// A manga resolved to its plugin; URLs still need the plugin to extract the id
#[derive(Clone)]
pub struct MangaRef {
    pub site: String,
    pub target: RegisteredPlugin,
    pub source: Target,
}

/// Site owning `url`, or `None` when no plugin matches
pub fn site_for_url(registry: &PluginRegistry, url: &str) -> Option<String> {
    registry.site_for_url(url).ok().map(String::from)
}

pub fn resolve_chapter(registry: &PluginRegistry, query: &TargetQuery) -> Result<ChapterRef, ApiError> {
    match query.target()? {
        Target::Url(url) => chapter_from_url(registry, &url),
        Target::Id { site, id } => {
            let target = registry.get(&site)?;
            Ok(ChapterRef {
                site: target.plugin.site().to_string(),
                chapter_id: id,
                target,
            })
        }
    }
}

pub fn resolve_manga(registry: &PluginRegistry, query: &TargetQuery) -> Result<MangaRef, ApiError> {
    let source = query.target()?;
    let target = match &source {
        Target::Url(url) => registry.for_url(url)?,
        Target::Id { site, .. } => registry.get(site)?,
    };
    Ok(MangaRef {
        site: target.plugin.site().to_string(),
        target,
        source,
    })
}

/// Chapter ids per site from a batch body, deduplicated
///
/// Explicit `sites` entries and `urls` are merged; every site must be known.
pub fn resolve_batch(
    registry: &PluginRegistry,
    request: &ChapterBatchRequest,
) -> Result<BTreeMap<String, BTreeSet<String>>, ApiError> {
    let mut batch: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for (site, ids) in &request.sites {
        let target = registry.get(site)?;
        batch
            .entry(target.plugin.site().to_string())
            .or_default()
            .extend(ids.iter().map(|id| id.trim().to_string()).filter(|id| !id.is_empty()));
    }

    for url in &request.urls {
        let chapter = chapter_from_url(registry, url)?;
        batch.entry(chapter.site).or_default().insert(chapter.chapter_id);
    }

    if batch.values().all(BTreeSet::is_empty) {
        return Err(ApiError::InvalidPayload("no chapter to download".to_string()));
    }
    Ok(batch)
}

fn chapter_from_url(registry: &PluginRegistry, url: &str) -> Result<ChapterRef, ApiError> {
    let target = registry.for_url(url)?;
    let chapter_id = target.plugin.chapter_id_from_url(url)?;
    Ok(ChapterRef {
        site: target.plugin.site().to_string(),
        chapter_id,
        target,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::plugins::build_registry;
    use std::sync::Arc;

    const CHAPTER: &str = "a54c491c-8e4c-4e97-8873-5b79e59da210";

    fn registry() -> PluginRegistry {
        let config = Config::default();
        build_registry(&config, Arc::new(config.http_cache())).unwrap()
    }

    fn query(url: Option<&str>, site: Option<&str>, id: Option<&str>) -> TargetQuery {
        TargetQuery {
            url: url.map(String::from),
            site: site.map(String::from),
            id: id.map(String::from),
            mark: false,
        }
    }

    #[test]
    fn test_url_takes_precedence() {
        let q = query(Some("https://x.org/a"), Some("s"), Some("1"));
        assert_eq!(q.target().unwrap(), Target::Url("https://x.org/a".into()));
    }

    #[test]
    fn test_missing_parameters() {
        assert!(matches!(
            query(None, Some("mangadex.org"), None).target(),
            Err(ApiError::InvalidPayload(_))
        ));
        assert!(query(Some("  "), None, None).target().is_err());
    }

    #[test]
    fn test_resolve_chapter_from_url_and_id() {
        let registry = registry();

        let from_url = resolve_chapter(
            &registry,
            &query(Some(&format!("https://mangadex.org/chapter/{CHAPTER}/1")), None, None),
        )
        .unwrap();
        assert_eq!(from_url.site, "mangadex.org");
        assert_eq!(from_url.chapter_id, CHAPTER);

        let from_id = resolve_chapter(&registry, &query(None, Some("MangaDex.org"), Some("c1"))).unwrap();
        assert_eq!(from_id.site, "mangadex.org");
        assert_eq!(from_id.chapter_id, "c1");
    }

    #[test]
    fn test_unknown_site_is_not_found() {
        let registry = registry();
        let err = resolve_chapter(&registry, &query(None, Some("example.com"), Some("1")))
            .err()
            .unwrap();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[test]
    fn test_resolve_batch_merges_and_dedups() {
        let registry = registry();
        let request = ChapterBatchRequest {
            sites: BTreeMap::from([("mangadex.org".to_string(), vec![CHAPTER.to_string(), "c2".to_string()])]),
            urls: vec![format!("https://mangadex.org/chapter/{CHAPTER}")],
            mark: false,
        };

        let batch = resolve_batch(&registry, &request).unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch["mangadex.org"].len(), 2);
    }

    #[test]
    fn test_empty_batch_rejected() {
        let registry = registry();
        assert!(resolve_batch(&registry, &ChapterBatchRequest::default()).is_err());
    }
}
