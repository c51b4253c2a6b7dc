//! MangaDex (`mangadex.org`) through its public JSON API

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::traits::{PluginError, SitePlugin};
use super::types::{ChapterInfo, MangaInfo, PageList, Rating, Status};
use crate::http::client::decode_json;
use crate::http::policy::{backoff, connection_backoff, retry_after};
use crate::http::{FetchOptions, HttpCache, HttpClient, HttpClientConfig, RetryPolicy};

pub const SITE: &str = "mangadex.org";
pub const DEFAULT_API_URL: &str = "https://api.mangadex.org";
pub const DEFAULT_COVERS_URL: &str = "https://uploads.mangadex.org";
const DEFAULT_LANGUAGE: &str = "en";
const FEED_LIMIT: usize = 100;
/// Longest `Retry-After` a worker will sleep for
const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Deserialize)]
struct Entity<A> {
    id: String,
    attributes: A,
    #[serde(default)]
    relationships: Vec<Relationship>,
}

#[derive(Deserialize)]
struct Relationship {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    attributes: Option<Value>,
}

impl Relationship {
    fn attribute(&self, key: &str) -> Option<String> {
        self.attributes
            .as_ref()
            .and_then(|a| a.get(key))
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    fn name(&self) -> Option<String> {
        self.attribute("name")
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChapterAttributes {
    title: Option<String>,
    volume: Option<String>,
    chapter: Option<String>,
    translated_language: Option<String>,
    pages: Option<usize>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MangaAttributes {
    #[serde(default)]
    title: Value,
    #[serde(default)]
    description: Value,
    status: Option<String>,
    content_rating: Option<String>,
    #[serde(default)]
    tags: Vec<Tag>,
}

#[derive(Deserialize)]
struct Tag {
    attributes: TagAttributes,
}

#[derive(Deserialize)]
struct TagAttributes {
    #[serde(default)]
    name: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AtHome {
    base_url: String,
    chapter: AtHomeChapter,
}

#[derive(Deserialize)]
struct AtHomeChapter {
    hash: String,
    data: Vec<String>,
}

#[derive(Deserialize)]
struct Feed {
    data: Vec<Entity<ChapterAttributes>>,
    limit: usize,
    offset: usize,
    total: usize,
}

pub struct MangaDex {
    api_url: String,
    covers_url: String,
    language: String,
    metadata: HttpClient,
    pages: HttpClient,
}

impl MangaDex {
    /// Build the plugin; `options` may carry `api_url`, `covers_url` and `language`
    pub fn new(
        client_config: HttpClientConfig,
        cache: Arc<HttpCache>,
        options: &BTreeMap<String, String>,
    ) -> Result<Self, PluginError> {
        let api_url = options
            .get("api_url")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        Url::parse(&api_url).map_err(|e| PluginError::Config(format!("api_url {api_url}: {e}")))?;

        let covers_url = options
            .get("covers_url")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_COVERS_URL.to_string());
        Url::parse(&covers_url).map_err(|e| PluginError::Config(format!("covers_url {covers_url}: {e}")))?;

        let language = options
            .get("language")
            .cloned()
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());

        let client = HttpClient::new(client_config)?.with_policy(Self::retry_policy());

        Ok(Self {
            api_url,
            covers_url,
            language,
            metadata: client.clone().with_cache(cache),
            pages: client,
        })
    }

    /// 429 honours `Retry-After` up to a minute, 5xx and connection errors back off exponentially
    pub fn retry_policy() -> RetryPolicy {
        RetryPolicy::new()
            .on_status(429, retry_after(5, Duration::from_secs(1), MAX_RETRY_AFTER))
            .on_statuses([500, 502, 503, 504], backoff(4, Duration::from_secs(1)))
            .on_connection_error(connection_backoff(3, Duration::from_secs(2)))
    }

    fn feed_url(&self, manga_id: &str, offset: usize) -> String {
        format!(
            "{}/manga/{manga_id}/feed?translatedLanguage[]={}&limit={FEED_LIMIT}&offset={offset}&order[chapter]=asc",
            self.api_url, self.language
        )
    }

    fn chapter_from_entity(entity: Entity<ChapterAttributes>, manga_id: Option<&str>) -> ChapterInfo {
        let manga_id = manga_id.map(str::to_string).or_else(|| {
            entity
                .relationships
                .iter()
                .find(|r| r.kind == "manga")
                .map(|r| r.id.clone())
        });
        let team = entity
            .relationships
            .iter()
            .filter(|r| r.kind == "scanlation_group")
            .filter_map(Relationship::name)
            .collect();
        let attributes = entity.attributes;

        ChapterInfo {
            id: entity.id,
            manga_id: manga_id.unwrap_or_default(),
            title: attributes.title.unwrap_or_default(),
            volume: attributes.volume,
            chapter: attributes.chapter.unwrap_or_else(|| "Oneshot".to_string()),
            language: attributes.translated_language.unwrap_or_default(),
            pages: attributes.pages.filter(|p| *p > 0),
            team,
        }
    }

    fn localized(&self, value: &Value) -> Option<String> {
        let map = value.as_object()?;
        map.get(&self.language)
            .or_else(|| map.get(DEFAULT_LANGUAGE))
            .or_else(|| map.values().next())
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

/// Path segments of a mangadex.org URL, scheme optional
fn site_path(url: &str) -> Option<Vec<String>> {
    let url = url.trim();
    let parsed = if url.contains("://") {
        Url::parse(url).ok()?
    } else {
        Url::parse(&format!("https://{url}")).ok()?
    };

    let host = parsed.host_str()?;
    if host.strip_prefix("www.").unwrap_or(host) != SITE {
        return None;
    }

    Some(
        parsed
            .path_segments()?
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
    )
}

fn is_uuid_like(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_hexdigit() || c == '-')
}

fn id_after(url: &str, kind: &str) -> Option<String> {
    let segments = site_path(url)?;
    match segments.as_slice() {
        [first, id, ..] if first == kind && is_uuid_like(id) => Some(id.to_ascii_lowercase()),
        _ => None,
    }
}

fn parse_status(status: Option<&str>) -> Option<Status> {
    match status? {
        "ongoing" => Some(Status::Ongoing),
        "completed" => Some(Status::Completed),
        "hiatus" => Some(Status::Hiatus),
        "cancelled" => Some(Status::Cancelled),
        _ => None,
    }
}

fn parse_rating(rating: Option<&str>) -> Option<Rating> {
    match rating? {
        "safe" => Some(Rating::Safe),
        "suggestive" => Some(Rating::Suggestive),
        "erotica" => Some(Rating::Erotica),
        "pornographic" => Some(Rating::Pornographic),
        _ => None,
    }
}

#[async_trait]
impl SitePlugin for MangaDex {
    fn site(&self) -> &str {
        SITE
    }

    fn chapter_id_from_url(&self, url: &str) -> Result<String, PluginError> {
        id_after(url, "chapter").ok_or_else(|| PluginError::UnsupportedUrl(url.to_string()))
    }

    async fn manga_id_from_url(&self, url: &str) -> Result<String, PluginError> {
        if let Some(id) = id_after(url, "title") {
            return Ok(id);
        }
        let chapter_id = self.chapter_id_from_url(url)?;
        let chapter = self.chapter_info(&chapter_id).await?;
        if chapter.manga_id.is_empty() {
            return Err(PluginError::NotFound(format!("manga of chapter {chapter_id}")));
        }
        Ok(chapter.manga_id)
    }

    async fn chapter_info(&self, chapter_id: &str) -> Result<ChapterInfo, PluginError> {
        let url = format!("{}/chapter/{chapter_id}?includes[]=scanlation_group", self.api_url);
        let envelope: Envelope<Entity<ChapterAttributes>> =
            self.metadata.get_json(&url, FetchOptions::cached()).await?;
        Ok(Self::chapter_from_entity(envelope.data, None))
    }

    async fn manga_info(&self, manga_id: &str) -> Result<MangaInfo, PluginError> {
        let url = format!(
            "{}/manga/{manga_id}?includes[]=author&includes[]=artist",
            self.api_url
        );
        let envelope: Envelope<Entity<MangaAttributes>> =
            self.metadata.get_json(&url, FetchOptions::cached()).await?;
        let entity = envelope.data;

        let people = |kind: &str| -> Vec<String> {
            entity
                .relationships
                .iter()
                .filter(|r| r.kind == kind)
                .filter_map(Relationship::name)
                .collect()
        };
        let authors = people("author");
        let artists = people("artist");
        let attributes = &entity.attributes;

        Ok(MangaInfo {
            id: entity.id.clone(),
            title: self.localized(&attributes.title).unwrap_or_default(),
            description: self.localized(&attributes.description).filter(|d| !d.is_empty()),
            authors,
            artists,
            tags: attributes
                .tags
                .iter()
                .filter_map(|t| self.localized(&t.attributes.name))
                .collect(),
            rating: parse_rating(attributes.content_rating.as_deref()),
            status: parse_status(attributes.status.as_deref()),
        })
    }

    async fn chapter_pages(&self, chapter_id: &str) -> Result<PageList, PluginError> {
        let url = format!("{}/at-home/server/{chapter_id}", self.api_url);
        let at_home: AtHome = self.metadata.get_json(&url, FetchOptions::default()).await?;

        let base = at_home.base_url.trim_end_matches('/');
        let hash = &at_home.chapter.hash;
        let urls = at_home
            .chapter
            .data
            .iter()
            .map(|file| format!("{base}/data/{hash}/{file}"))
            .collect();

        Ok(PageList {
            urls,
            client: self.pages.clone(),
        })
    }

    async fn chapters(&self, manga_id: &str) -> Result<Vec<ChapterInfo>, PluginError> {
        let start = self.feed_url(manga_id, 0);
        let mut pages_read = 0usize;

        let chapters = self
            .metadata
            .aggregate(
                &start,
                FetchOptions::cached(),
                Vec::new(),
                &mut pages_read,
                |body, mut acc: Vec<ChapterInfo>, pages_read| {
                    let feed: Feed = decode_json(&start, &body)?;
                    *pages_read += 1;

                    let received = feed.data.len();
                    acc.extend(
                        feed.data
                            .into_iter()
                            .map(|entity| Self::chapter_from_entity(entity, Some(manga_id))),
                    );

                    let next_offset = feed.offset + feed.limit.max(received);
                    let next = (received > 0 && next_offset < feed.total)
                        .then(|| self.feed_url(manga_id, next_offset));
                    Ok((acc, next))
                },
            )
            .await?;

        debug!(manga_id, chapters = chapters.len(), pages_read, "Fetched chapter feed");
        Ok(chapters)
    }

    async fn cover(&self, manga_id: &str) -> Result<Bytes, PluginError> {
        let url = format!("{}/manga/{manga_id}?includes[]=cover_art", self.api_url);
        let envelope: Envelope<Entity<Value>> = self.metadata.get_json(&url, FetchOptions::cached()).await?;

        let file_name = envelope
            .data
            .relationships
            .iter()
            .filter(|r| r.kind == "cover_art")
            .find_map(|r| r.attribute("fileName"))
            .ok_or_else(|| PluginError::NotFound(format!("cover of manga {manga_id}")))?;

        let cover_url = format!("{}/covers/{manga_id}/{file_name}", self.covers_url);
        debug!(manga_id, url = %cover_url, "Fetching cover");
        Ok(self.pages.get_bytes(&cover_url, Duration::ZERO).await?)
    }

    fn chapter_url(&self, chapter_id: &str) -> Option<String> {
        Some(format!("https://{SITE}/chapter/{chapter_id}"))
    }
}
