mod common;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use bytes::Bytes;
use serde_json::{Value, json};
use tempfile::TempDir;

use chapterbox::archive::ArchiveMethod;
use chapterbox::http::{HttpCache, HttpClientConfig};
use chapterbox::observability::Metrics;
use chapterbox::plugins::{MangaDex, PluginRegistry, Rating, SitePlugin, Status};
use chapterbox::scheduler::{JobState, Scheduler};
use common::{make_png, output_profile, start_server, wait_terminal};

const FEED_TOTAL: usize = 250;
const MANGA: &str = "0b2c3d4e-1111-4222-8333-444455556666";

#[derive(Clone)]
struct Api {
    base: Arc<std::sync::OnceLock<String>>,
    feed_hits: Arc<AtomicUsize>,
    chapter_hits: Arc<AtomicUsize>,
}

async fn chapter(State(api): State<Api>, Path(id): Path<String>) -> Json<Value> {
    api.chapter_hits.fetch_add(1, Ordering::SeqCst);
    Json(json!({
        "data": {
            "id": id,
            "attributes": {
                "title": "Start",
                "volume": "1",
                "chapter": "1",
                "translatedLanguage": "en",
                "pages": 2
            },
            "relationships": [
                { "id": MANGA, "type": "manga" },
                { "id": "g1", "type": "scanlation_group", "attributes": { "name": "Night Scans" } }
            ]
        }
    }))
}

async fn manga(Path(id): Path<String>) -> Json<Value> {
    Json(json!({
        "data": {
            "id": id,
            "attributes": {
                "title": { "en": "Test Manga" },
                "description": { "en": "A test." },
                "status": "ongoing",
                "contentRating": "safe",
                "tags": [{ "attributes": { "name": { "en": "Action" } } }]
            },
            "relationships": [
                { "id": "a1", "type": "author", "attributes": { "name": "Writer" } },
                { "id": "a2", "type": "artist", "attributes": { "name": "Drawer" } },
                { "id": "f1", "type": "cover_art", "attributes": { "fileName": "front.png" } }
            ]
        }
    }))
}

async fn feed(
    State(api): State<Api>,
    Path(_id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    api.feed_hits.fetch_add(1, Ordering::SeqCst);
    let offset: usize = query.get("offset").and_then(|v| v.parse().ok()).unwrap_or(0);
    let limit: usize = query.get("limit").and_then(|v| v.parse().ok()).unwrap_or(100);
    let end = (offset + limit).min(FEED_TOTAL);

    let data: Vec<Value> = (offset..end)
        .map(|n| json!({ "id": format!("c{n}"), "attributes": { "chapter": n.to_string(), "translatedLanguage": "en" } }))
        .collect();
    Json(json!({ "data": data, "limit": limit, "offset": offset, "total": FEED_TOTAL }))
}

async fn at_home(State(api): State<Api>) -> Json<Value> {
    Json(json!({
        "baseUrl": api.base.get().cloned().unwrap_or_default(),
        "chapter": { "hash": "abc", "data": ["x1.png", "x2.png"] }
    }))
}

async fn page(Path((_hash, _file)): Path<(String, String)>) -> Bytes {
    Bytes::from(make_png(3, 4))
}

async fn cover(Path((manga, file)): Path<(String, String)>) -> Result<Bytes, axum::http::StatusCode> {
    if manga == MANGA && file == "front.png" {
        Ok(Bytes::from(make_png(5, 7)))
    } else {
        Err(axum::http::StatusCode::NOT_FOUND)
    }
}

async fn start_api() -> (String, Api) {
    let api = Api {
        base: Arc::new(std::sync::OnceLock::new()),
        feed_hits: Arc::new(AtomicUsize::new(0)),
        chapter_hits: Arc::new(AtomicUsize::new(0)),
    };
    let app = Router::new()
        .route("/chapter/{id}", get(chapter))
        .route("/manga/{id}", get(manga))
        .route("/manga/{id}/feed", get(feed))
        .route("/at-home/server/{id}", get(at_home))
        .route("/data/{hash}/{file}", get(page))
        .route("/covers/{manga}/{file}", get(cover))
        .with_state(api.clone());
    let base = start_server(app).await;
    let _ = api.base.set(base.clone());
    (base, api)
}

fn plugin(base: &str) -> MangaDex {
    let options = BTreeMap::from([
        ("api_url".to_string(), base.to_string()),
        ("covers_url".to_string(), base.to_string()),
    ]);
    MangaDex::new(HttpClientConfig::default(), Arc::new(HttpCache::default()), &options).unwrap()
}

#[tokio::test]
async fn test_chapter_and_manga_metadata() {
    let (base, api) = start_api().await;
    let plugin = plugin(&base);

    let chapter = plugin.chapter_info("c-1").await.unwrap();
    assert_eq!(chapter.manga_id, MANGA);
    assert_eq!(chapter.team, vec!["Night Scans"]);
    assert_eq!(chapter.pages, Some(2));

    // metadata reads are cached
    plugin.chapter_info("c-1").await.unwrap();
    assert_eq!(api.chapter_hits.load(Ordering::SeqCst), 1);

    let manga = plugin.manga_info(MANGA).await.unwrap();
    assert_eq!(manga.title, "Test Manga");
    assert_eq!(manga.description.as_deref(), Some("A test."));
    assert_eq!(manga.authors, vec!["Writer"]);
    assert_eq!(manga.artists, vec!["Drawer"]);
    assert_eq!(manga.tags, vec!["Action"]);
    assert_eq!(manga.rating, Some(Rating::Safe));
    assert_eq!(manga.status, Some(Status::Ongoing));
}

#[tokio::test]
async fn test_manga_id_from_chapter_url() {
    let (base, _) = start_api().await;
    let plugin = plugin(&base);

    let url = "https://mangadex.org/chapter/aaaa1111-2222-4333-8444-555566667777";
    assert_eq!(plugin.manga_id_from_url(url).await.unwrap(), MANGA);
}

#[tokio::test]
async fn test_feed_is_aggregated() {
    let (base, api) = start_api().await;
    let plugin = plugin(&base);

    let chapters = plugin.chapters(MANGA).await.unwrap();
    assert_eq!(chapters.len(), FEED_TOTAL);
    assert_eq!(chapters[0].chapter, "0");
    assert_eq!(chapters[FEED_TOTAL - 1].chapter, (FEED_TOTAL - 1).to_string());
    assert!(chapters.iter().all(|c| c.manga_id == MANGA));
    assert_eq!(api.feed_hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_page_list() {
    let (base, _) = start_api().await;
    let plugin = plugin(&base);

    let pages = plugin.chapter_pages("c-1").await.unwrap();
    assert_eq!(
        pages.urls,
        vec![format!("{base}/data/abc/x1.png"), format!("{base}/data/abc/x2.png")]
    );
}

#[tokio::test]
async fn test_cover_follows_cover_art_relationship() {
    let (base, _) = start_api().await;
    let plugin = plugin(&base);

    let cover = plugin.cover(MANGA).await.unwrap();
    assert_eq!(&cover[..], &make_png(5, 7)[..]);
    assert_eq!(chapterbox::archive::magic::mime_type(&cover), Some("image/png"));
}

#[tokio::test]
async fn test_download_through_scheduler() {
    let (base, _) = start_api().await;
    let temp = TempDir::new().unwrap();

    let mut registry = PluginRegistry::new();
    registry.register(Arc::new(plugin(&base)), output_profile(temp.path(), ArchiveMethod::Cbz));
    let scheduler = Scheduler::new(Arc::new(registry), 1, None, Arc::new(Metrics::new()));

    let id = scheduler.submit("mangadex.org", "c-1", false).await.unwrap();
    let snapshot = wait_terminal(&scheduler, &id).await;
    assert_eq!(snapshot.status, JobState::Complete, "{:?}", snapshot.error);
    assert_eq!(snapshot.pages, 2);

    let path = temp.path().join("Test Manga - 1.cbz");
    let mut archive = zip::ZipArchive::new(std::fs::File::open(path).unwrap()).unwrap();
    assert!(archive.by_name("1.png").is_ok());
    assert!(archive.by_name("2.png").is_ok());

    let mut xml = String::new();
    std::io::Read::read_to_string(&mut archive.by_name("ComicInfo.xml").unwrap(), &mut xml).unwrap();
    assert!(xml.contains("<Web>https://mangadex.org/chapter/c-1</Web>"));
    assert!(xml.contains("<Writer>Writer</Writer>"));
}
