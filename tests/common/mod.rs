#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{Router, extract::Path as UrlPath, http::StatusCode, routing::get};
use bytes::Bytes;
use image::codecs::png::PngEncoder;

use chapterbox::archive::ArchiveMethod;
use chapterbox::config::{ChaptersConfig, OutputProfile};
use chapterbox::http::{HttpClient, HttpClientConfig};
use chapterbox::marks::{self, MarkSink};
use chapterbox::plugins::{ChapterInfo, MangaInfo, PageList, PluginError, PluginRegistry, SitePlugin};
use chapterbox::scheduler::{JobId, JobSnapshot, Scheduler};

pub const MOCK_SITE: &str = "mock.test";
pub const SLOW_PAGE_DELAY: Duration = Duration::from_millis(150);

/// Serve `app` on an ephemeral local port and return its base URL
pub async fn start_server(app: Router) -> String {
    let addr = SocketAddr::from(([127, 0, 0, 1], 0));
    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    let bound_addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{bound_addr}")
}

/// A valid PNG of the given size
pub fn make_png(width: u32, height: u32) -> Vec<u8> {
    let img = image::DynamicImage::new_rgb8(width, height);
    let mut buf = Vec::new();
    let encoder = PngEncoder::new(&mut buf);
    img.write_with_encoder(encoder).unwrap();
    buf
}

/// Page server: `/page/{chapter}/{n}` answers at once, `/slow/...` after a
/// delay, anything else is a 404
pub async fn start_page_server() -> String {
    async fn page(UrlPath((_chapter, n)): UrlPath<(String, u32)>) -> Bytes {
        Bytes::from(make_png(n + 1, 2))
    }

    async fn slow_page(UrlPath((_chapter, n)): UrlPath<(String, u32)>) -> Bytes {
        tokio::time::sleep(SLOW_PAGE_DELAY).await;
        Bytes::from(make_png(n + 1, 2))
    }

    let app = Router::new()
        .route("/page/{chapter}/{n}", get(page))
        .route("/slow/{chapter}/{n}", get(slow_page))
        .route("/gone/{chapter}/{n}", get(|| async { StatusCode::NOT_FOUND }));
    start_server(app).await
}

/// Site plugin serving pages from [`start_page_server`]
///
/// Chapters whose id starts with `slow` stream slowly, ids starting with
/// `broken` point at missing pages and `unknown` has no metadata.
pub struct MockPlugin {
    base: String,
    pages: usize,
    client: HttpClient,
}

impl MockPlugin {
    pub fn new(base: &str, pages: usize) -> Self {
        Self {
            base: base.to_string(),
            pages,
            client: HttpClient::new(HttpClientConfig::default()).unwrap(),
        }
    }

    fn route(chapter_id: &str) -> &'static str {
        if chapter_id.starts_with("slow") {
            "slow"
        } else if chapter_id.starts_with("broken") {
            "gone"
        } else {
            "page"
        }
    }
}

#[async_trait]
impl SitePlugin for MockPlugin {
    fn site(&self) -> &str {
        MOCK_SITE
    }

    fn chapter_id_from_url(&self, url: &str) -> Result<String, PluginError> {
        url.split("/chapter/")
            .nth(1)
            .filter(|id| !id.is_empty())
            .map(String::from)
            .ok_or_else(|| PluginError::UnsupportedUrl(url.to_string()))
    }

    async fn manga_id_from_url(&self, url: &str) -> Result<String, PluginError> {
        url.split("/title/")
            .nth(1)
            .map(String::from)
            .ok_or_else(|| PluginError::UnsupportedUrl(url.to_string()))
    }

    async fn chapter_info(&self, chapter_id: &str) -> Result<ChapterInfo, PluginError> {
        if chapter_id == "unknown" {
            return Err(PluginError::NotFound(format!("chapter {chapter_id}")));
        }
        Ok(ChapterInfo {
            id: chapter_id.to_string(),
            manga_id: "m1".to_string(),
            title: format!("Chapter {chapter_id}"),
            volume: Some("1".to_string()),
            chapter: chapter_id.to_string(),
            language: "en".to_string(),
            pages: Some(self.pages),
            team: vec!["Mock Scans".to_string()],
        })
    }

    async fn manga_info(&self, manga_id: &str) -> Result<MangaInfo, PluginError> {
        Ok(MangaInfo {
            id: manga_id.to_string(),
            title: "Mock Manga".to_string(),
            description: None,
            authors: vec!["Author".to_string()],
            artists: vec![],
            tags: vec![],
            rating: None,
            status: None,
        })
    }

    async fn chapter_pages(&self, chapter_id: &str) -> Result<PageList, PluginError> {
        let route = Self::route(chapter_id);
        let urls = (1..=self.pages)
            .map(|n| format!("{}/{route}/{chapter_id}/{n}", self.base))
            .collect();
        Ok(PageList {
            urls,
            client: self.client.clone(),
        })
    }

    async fn chapters(&self, manga_id: &str) -> Result<Vec<ChapterInfo>, PluginError> {
        let mut chapters = Vec::new();
        for id in ["c1", "c2"] {
            let mut chapter = self.chapter_info(id).await?;
            chapter.manga_id = manga_id.to_string();
            chapters.push(chapter);
        }
        Ok(chapters)
    }

    async fn cover(&self, manga_id: &str) -> Result<Bytes, PluginError> {
        if manga_id == "unknown" {
            return Err(PluginError::NotFound(format!("cover of manga {manga_id}")));
        }
        let url = format!("{}/page/cover/1", self.base);
        Ok(self.client.get_bytes(&url, Duration::ZERO).await?)
    }
}

/// Archive settings writing `method` archives into `destination`
pub fn output_profile(destination: &Path, method: ArchiveMethod) -> OutputProfile {
    let chapters = ChaptersConfig {
        method: method.as_str().to_string(),
        destination: destination.to_path_buf(),
        page_delay_ms: 0,
        ..ChaptersConfig::default()
    };
    OutputProfile::resolve("chapters", &chapters, None).unwrap()
}

pub fn mock_registry(base: &str, pages: usize, destination: &Path, method: ArchiveMethod) -> PluginRegistry {
    let mut registry = PluginRegistry::new();
    registry.register(Arc::new(MockPlugin::new(base, pages)), output_profile(destination, method));
    registry
}

/// Mark sink remembering every call
#[derive(Default)]
pub struct RecordingMarks {
    pub calls: Mutex<Vec<(String, String, String)>>,
}

impl MarkSink for RecordingMarks {
    fn chapter_downloaded(&self, site: &str, chapter_id: &str, manga_id: &str) -> marks::Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push((site.to_string(), chapter_id.to_string(), manga_id.to_string()));
        Ok(())
    }
}

/// Poll until the job is terminal; panics after five seconds
pub async fn wait_terminal(scheduler: &Scheduler, id: &JobId) -> JobSnapshot {
    for _ in 0..500 {
        let snapshot = scheduler.state(id, false).await.unwrap().unwrap();
        if snapshot.status.is_terminal() {
            return snapshot;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {id} did not finish in time");
}

/// Poll until `check` holds; panics after five seconds
pub async fn wait_until<F: Fn() -> bool>(check: F) {
    for _ in 0..500 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}
