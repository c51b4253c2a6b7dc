use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use tracing::{info, warn};

use super::{
    error::ApiError,
    models::{
        CancelRequest, CancelResponse, ChapterBatchRequest, ClearHistoryResponse, CoverQuery, HealthResponse,
        MarkQuery, MarkUpdateRequest, MarksResponse, ResourceIdResponse, ResourceSiteResponse, StatesRequest,
        VersionResponse,
    },
    params::{self, MangaRef, Target, TargetQuery},
    state::AppState,
    utils,
};
use crate::archive::magic;
use crate::scheduler::JobId;

/// Real type of a cover sent as base64 text
pub const ORIGINAL_CONTENT_TYPE: HeaderName = HeaderName::from_static("original-content-type");

#[derive(Debug, Deserialize)]
pub struct UrlQuery {
    pub url: String,
}

/// Health check endpoint (GET /health)
///
/// Reports the worker pool liveness plus the process counters. Returns 503
/// when a worker died.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let mut components = HashMap::new();
    components.insert("api".to_string(), "healthy".to_string());

    let workers = if state.scheduler.health_check() {
        "healthy"
    } else {
        "unhealthy"
    };
    components.insert("scheduler".to_string(), workers.to_string());
    components.insert("marks".to_string(), "healthy".to_string());

    let all_healthy = components.values().all(|status| status == "healthy");
    let (status_code, overall) = if all_healthy {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    };

    let response = HealthResponse {
        status: overall.to_string(),
        components,
        version: env!("CARGO_PKG_VERSION").to_string(),
        metrics: state.metrics.snapshot(),
    };

    (status_code, Json(response))
}

pub async fn ping() -> impl IntoResponse {
    (StatusCode::OK, "pong")
}

pub async fn version() -> Json<VersionResponse> {
    Json(VersionResponse {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn sites(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.registry.sites())
}

/// Which plugin, if any, handles a URL (GET /api/resource/site)
pub async fn resource_site(State(state): State<AppState>, Query(query): Query<UrlQuery>) -> Json<ResourceSiteResponse> {
    let site = params::site_for_url(&state.registry, &query.url);
    Json(ResourceSiteResponse {
        url: query.url,
        registered: site.is_some(),
        site,
    })
}

pub async fn chapter_id(
    State(state): State<AppState>,
    Query(query): Query<UrlQuery>,
) -> Result<Json<ResourceIdResponse>, ApiError> {
    let target = state.registry.for_url(&query.url)?;
    let id = target.plugin.chapter_id_from_url(&query.url)?;
    Ok(Json(ResourceIdResponse {
        site: target.plugin.site().to_string(),
        url: query.url,
        id,
    }))
}

pub async fn manga_id(
    State(state): State<AppState>,
    Query(query): Query<UrlQuery>,
) -> Result<Json<ResourceIdResponse>, ApiError> {
    let target = state.registry.for_url(&query.url)?;
    let id = target.plugin.manga_id_from_url(&query.url).await?;
    Ok(Json(ResourceIdResponse {
        site: target.plugin.site().to_string(),
        url: query.url,
        id,
    }))
}

async fn manga_id_of(manga: &MangaRef) -> Result<String, ApiError> {
    match &manga.source {
        Target::Url(url) => Ok(manga.target.plugin.manga_id_from_url(url).await?),
        Target::Id { id, .. } => Ok(id.clone()),
    }
}

pub async fn manga_info(
    State(state): State<AppState>,
    Query(query): Query<TargetQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let manga = params::resolve_manga(&state.registry, &query)?;
    let id = manga_id_of(&manga).await?;
    let info = manga.target.plugin.manga_info(&id).await?;
    Ok(Json(info))
}

/// Manga cover image (GET /api/manga/cover)
///
/// The content type comes from the image signature. With `base64=true` the
/// body is base64 text and the image type moves to `Original-Content-Type`.
pub async fn manga_cover(
    State(state): State<AppState>,
    Query(query): Query<TargetQuery>,
    Query(cover): Query<CoverQuery>,
) -> Result<Response, ApiError> {
    let manga = params::resolve_manga(&state.registry, &query)?;
    let id = manga_id_of(&manga).await?;
    let data = manga.target.plugin.cover(&id).await?;

    let mime = magic::mime_type(&data).unwrap_or_else(|| {
        warn!(site = %manga.site, manga = %id, "Unrecognised cover format");
        "application/octet-stream"
    });

    if cover.base64 {
        let headers = [
            (header::CONTENT_TYPE, HeaderValue::from_static("text/plain")),
            (ORIGINAL_CONTENT_TYPE, HeaderValue::from_static(mime)),
        ];
        Ok((headers, STANDARD.encode(&data)).into_response())
    } else {
        Ok(([(header::CONTENT_TYPE, HeaderValue::from_static(mime))], data).into_response())
    }
}

pub async fn chapter_info(
    State(state): State<AppState>,
    Query(query): Query<TargetQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let chapter = params::resolve_chapter(&state.registry, &query)?;
    let info = chapter.target.plugin.chapter_info(&chapter.chapter_id).await?;
    Ok(Json(info))
}

pub async fn manga_chapters(
    State(state): State<AppState>,
    Query(query): Query<TargetQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let manga = params::resolve_manga(&state.registry, &query)?;
    let id = manga_id_of(&manga).await?;
    let chapters = manga.target.plugin.chapters(&id).await?;
    Ok(Json(chapters))
}

/// Queue one chapter (POST /api/download/chapter)
///
/// Answers 202 with the job snapshot; progress is polled through
/// `GET /api/download/{id}`.
pub async fn download_chapter(
    State(state): State<AppState>,
    Query(query): Query<TargetQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let chapter = params::resolve_chapter(&state.registry, &query)?;
    let id = state
        .scheduler
        .submit(&chapter.site, &chapter.chapter_id, query.mark)
        .await?;
    let snapshot = state.scheduler.state(&id, false).await?;

    Ok((StatusCode::ACCEPTED, Json(snapshot)))
}

/// Queue a batch of chapters (POST /api/download/chapters)
pub async fn download_chapters(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Body,
) -> Result<impl IntoResponse, ApiError> {
    let max_size = state.config.server.max_payload_bytes.as_usize();
    let request: ChapterBatchRequest = utils::read_json(&headers, body, max_size).await?;
    let batch = params::resolve_batch(&state.registry, &request)?;

    let mut ids = Vec::new();
    for (site, chapters) in &batch {
        for chapter in chapters {
            ids.push(state.scheduler.submit(site, chapter, request.mark).await?);
        }
    }
    info!(count = ids.len(), "Chapter batch queued");

    let snapshots = state.scheduler.states(Some(&ids), true).await?;
    Ok((StatusCode::ACCEPTED, Json(snapshots)))
}

pub async fn list_downloads(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.scheduler.states(None, true).await?))
}

pub async fn download_states(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Body,
) -> Result<impl IntoResponse, ApiError> {
    let max_size = state.config.server.max_payload_bytes.as_usize();
    let request: StatesRequest = utils::read_json(&headers, body, max_size).await?;
    let snapshots = state
        .scheduler
        .states(Some(&request.ids), request.best_effort)
        .await?;
    Ok(Json(snapshots))
}

pub async fn get_download(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = JobId::from(id);
    let snapshot = state
        .scheduler
        .state(&id, false)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("download {id}")))?;
    Ok(Json(snapshot))
}

pub async fn cancel_download(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CancelResponse>, ApiError> {
    let id = JobId::from(id);
    let cancelled = state.scheduler.cancel(&id).await?;
    Ok(Json(CancelResponse { id, cancelled }))
}

pub async fn cancel_downloads(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Body,
) -> Result<Json<Vec<CancelResponse>>, ApiError> {
    let max_size = state.config.server.max_payload_bytes.as_usize();
    let request: CancelRequest = utils::read_json(&headers, body, max_size).await?;
    let results = state.scheduler.cancel_all(&request.ids).await;
    Ok(Json(
        results
            .into_iter()
            .map(|(id, cancelled)| CancelResponse { id, cancelled })
            .collect(),
    ))
}

pub async fn clear_history(State(state): State<AppState>) -> Json<ClearHistoryResponse> {
    let cleared = state.scheduler.clear_history().await;
    Json(ClearHistoryResponse { cleared })
}

/// Chapter marks (GET /api/chapter/mark?site=&ids=a,b or ?site=&manga=)
pub async fn chapter_marks(
    State(state): State<AppState>,
    Query(query): Query<MarkQuery>,
) -> Result<Json<MarksResponse>, ApiError> {
    let target = state.registry.get(&query.site)?;
    let site = target.plugin.site().to_string();

    let marks = match (&query.manga, &query.ids) {
        (Some(manga), _) => state
            .marks
            .manga_marks(&site, manga)?
            .into_iter()
            .map(|(chapter, mark)| (chapter, Some(mark)))
            .collect(),
        (None, Some(ids)) => state.marks.get_marks(&site, &utils::split_ids(ids))?,
        (None, None) => {
            return Err(ApiError::InvalidPayload(
                "request is missing the ids or manga parameter".to_string(),
            ));
        }
    };

    Ok(Json(MarksResponse { site, marks }))
}

/// Set or clear chapter marks (POST /api/chapter/mark)
///
/// Answers with the marks as stored after the update.
pub async fn update_chapter_marks(
    State(state): State<AppState>,
    Json(request): Json<MarkUpdateRequest>,
) -> Result<Json<MarksResponse>, ApiError> {
    let target = state.registry.get(&request.site)?;
    let site = target.plugin.site().to_string();
    if request.ids.is_empty() {
        return Err(ApiError::InvalidPayload("request has no chapter ids".to_string()));
    }

    match request.mark {
        Some(mark) => {
            let manga = request
                .manga
                .as_deref()
                .filter(|m| !m.trim().is_empty())
                .ok_or_else(|| ApiError::InvalidPayload("setting a mark needs the manga id".to_string()))?;
            for id in &request.ids {
                state.marks.set_mark(&site, id, manga, mark)?;
            }
            info!(%site, chapters = request.ids.len(), mark = mark.as_str(), "Marks set");
        }
        None => {
            let mut cleared = 0;
            for id in &request.ids {
                if state.marks.clear_mark(&site, id)? {
                    cleared += 1;
                }
            }
            info!(%site, cleared, "Marks cleared");
        }
    }

    let marks = state.marks.get_marks(&site, &request.ids)?;
    Ok(Json(MarksResponse { site, marks }))
}
