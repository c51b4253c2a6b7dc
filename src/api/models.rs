//! Request and response bodies of the HTTP front end
//!
//! Download routes return [`JobSnapshot`](crate::scheduler::JobSnapshot)s straight from the scheduler, for
//! instance:
//!
//! ```json
//! {
//!   "id": "n8H0x1mWq3s7Yb2k",
//!   "site": "mangadex.org",
//!   "chapter": "a54c491c-8e4c-4e97-8873-5b79e59da210",
//!   "file": "Some Manga - 12.cbz",
//!   "status": "PROCESSING",
//!   "completion": 0.4,
//!   "bytes": 1843200,
//!   "pages": 8,
//!   "total_pages": 20,
//!   "created": "2026-10-17T09:12:44.120Z",
//!   "begin": "2026-10-17T09:12:44.803Z",
//!   "end": null,
//!   "error": null
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::marks::ChapterMark;
use crate::observability::MetricsSnapshot;
use crate::scheduler::JobId;

/// Body of `POST /api/download/chapters`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChapterBatchRequest {
    /// Chapter ids keyed by site
    #[serde(default)]
    pub sites: BTreeMap<String, Vec<String>>,
    /// Chapter page URLs
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default)]
    pub mark: bool,
}

/// Body of `POST /api/downloads/states`
#[derive(Debug, Clone, Deserialize)]
pub struct StatesRequest {
    pub ids: Vec<JobId>,
    #[serde(default)]
    pub best_effort: bool,
}

/// Body of `POST /api/downloads/cancel`
#[derive(Debug, Clone, Deserialize)]
pub struct CancelRequest {
    pub ids: Vec<JobId>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResourceSiteResponse {
    pub url: String,
    pub registered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResourceIdResponse {
    pub url: String,
    pub site: String,
    pub id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VersionResponse {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CancelResponse {
    pub id: JobId,
    pub cancelled: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClearHistoryResponse {
    pub cleared: usize,
}

/// Marks of the requested chapters; unmarked chapters map to `null`
#[derive(Debug, Serialize, Deserialize)]
pub struct MarksResponse {
    pub site: String,
    pub marks: BTreeMap<String, Option<ChapterMark>>,
}

#[derive(Debug, Deserialize)]
pub struct MarkQuery {
    pub site: String,
    /// Comma separated chapter ids
    pub ids: Option<String>,
    /// List every marked chapter of this manga instead
    pub manga: Option<String>,
}

/// Body of `POST /api/chapter/mark`; a `null` mark clears it
#[derive(Debug, Deserialize)]
pub struct MarkUpdateRequest {
    pub site: String,
    pub ids: Vec<String>,
    /// Owning manga, needed whenever a mark is set
    pub manga: Option<String>,
    pub mark: Option<ChapterMark>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CoverQuery {
    /// Answer with a base64 text body instead of raw bytes
    #[serde(default)]
    pub base64: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub components: HashMap<String, String>,
    pub version: String,
    pub metrics: MetricsSnapshot,
}
