use serde::{Deserialize, Serialize};

use crate::archive::{ComicInfo, FormatData};
use crate::http::HttpClient;

/// Metadata of one chapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterInfo {
    pub id: String,
    pub manga_id: String,
    pub title: String,
    pub volume: Option<String>,
    pub chapter: String,
    /// Translation language code
    pub language: String,
    /// Page count when the site reports one
    pub pages: Option<usize>,
    /// Scanlation groups credited for the chapter
    pub team: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ongoing,
    Completed,
    Hiatus,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    Safe,
    Suggestive,
    Erotica,
    Pornographic,
}

/// Metadata of one manga
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MangaInfo {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub authors: Vec<String>,
    pub artists: Vec<String>,
    pub tags: Vec<String>,
    pub rating: Option<Rating>,
    pub status: Option<Status>,
}

/// Ordered page URLs plus the client configured to download them
pub struct PageList {
    pub urls: Vec<String>,
    pub client: HttpClient,
}

impl ChapterInfo {
    pub fn format_data(&self, manga: &MangaInfo) -> FormatData {
        FormatData {
            id: self.id.clone(),
            title: self.title.clone(),
            manga: manga.title.clone(),
            manga_id: manga.id.clone(),
            volume: self.volume.clone().unwrap_or_default(),
            chapter: self.chapter.clone(),
            lang: self.language.clone(),
            team: self.team.join(", "),
        }
    }

    pub fn comic_info(&self, manga: &MangaInfo, web: Option<String>) -> ComicInfo {
        ComicInfo {
            series: manga.title.clone(),
            title: self.title.clone(),
            number: self.chapter.clone(),
            volume: self.volume.clone(),
            summary: manga.description.clone(),
            writers: manga.authors.clone(),
            pencillers: manga.artists.clone(),
            translators: self.team.clone(),
            genres: manga.tags.clone(),
            language: Some(self.language.clone()).filter(|l| !l.is_empty()),
            web,
        }
    }
}
