//! Archive file naming and destination layout
//!
//! Output names come from an [upon] template (`{{ manga }} - {{ chapter }}`)
//! rendered against [`FormatData`]. Templates are compiled and test-rendered
//! when parsed, so an unknown variable or malformed syntax is rejected while
//! the configuration loads instead of when the first job runs.
//!
//! | Variable   | Description                           |
//! |------------|---------------------------------------|
//! | `id`       | Chapter id on the site                |
//! | `title`    | Chapter title                         |
//! | `manga`    | Manga title                           |
//! | `manga_id` | Manga id on the site                  |
//! | `volume`   | Volume label, empty when unknown      |
//! | `chapter`  | Chapter number label                  |
//! | `lang`     | Translation language code             |
//! | `team`     | Comma separated scanlation groups     |

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use upon::{Engine, Template};

use super::{ArchiveError, Result};

pub const DEFAULT_TEMPLATE: &str = "{{ manga }} - {{ chapter }}";

const FORBIDDEN: [char; 9] = ['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Values exposed to a filename template
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FormatData {
    pub id: String,
    pub title: String,
    pub manga: String,
    pub manga_id: String,
    pub volume: String,
    pub chapter: String,
    pub lang: String,
    pub team: String,
}

impl FormatData {
    fn sample() -> Self {
        Self {
            id: "0".to_string(),
            title: "Title".to_string(),
            manga: "Manga".to_string(),
            manga_id: "0".to_string(),
            volume: "1".to_string(),
            chapter: "1".to_string(),
            lang: "en".to_string(),
            team: "Team".to_string(),
        }
    }

    fn to_value(&self) -> upon::Value {
        upon::value! {
            id: sanitize_component(&self.id),
            title: sanitize_component(&self.title),
            manga: sanitize_component(&self.manga),
            manga_id: sanitize_component(&self.manga_id),
            volume: sanitize_component(&self.volume),
            chapter: sanitize_component(&self.chapter),
            lang: sanitize_component(&self.lang),
            team: sanitize_component(&self.team),
        }
    }
}

/// Compiled filename template
pub struct FilenameTemplate {
    source: String,
    engine: Engine<'static>,
    template: Template<'static>,
}

impl FromStr for FilenameTemplate {
    type Err = ArchiveError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let engine = Engine::new();
        let template = engine
            .compile(s.to_string())
            .map_err(|e| ArchiveError::Template(e.to_string()))?;

        let parsed = Self {
            source: s.to_string(),
            engine,
            template,
        };
        parsed.render(&FormatData::sample())?;
        Ok(parsed)
    }
}

impl FilenameTemplate {
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Render a file stem (no extension) safe to use as one path component
    pub fn render(&self, data: &FormatData) -> Result<String> {
        let rendered = self
            .template
            .render(&self.engine, data.to_value())
            .to_string()
            .map_err(|e| ArchiveError::Template(e.to_string()))?;

        let stem = sanitize_component(rendered.trim());
        if stem.is_empty() || stem.chars().all(|c| c == '.') {
            return Err(ArchiveError::Template(format!(
                "template {:?} rendered an empty file name",
                self.source
            )));
        }
        Ok(stem)
    }
}

impl fmt::Debug for FilenameTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FilenameTemplate").field(&self.source).finish()
    }
}

/// Where archives land relative to the configured destination
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationStrategy {
    /// Every archive directly in the destination
    #[default]
    Mixed,
    /// One sub-folder per manga title
    PerManga,
}

impl DestinationStrategy {
    pub fn from_separate(separate: bool) -> Self {
        if separate { Self::PerManga } else { Self::Mixed }
    }

    pub fn directory(&self, root: &Path, manga: &str) -> PathBuf {
        match self {
            Self::Mixed => root.to_path_buf(),
            Self::PerManga => {
                let folder = sanitize_component(manga.trim());
                if folder.is_empty() {
                    root.to_path_buf()
                } else {
                    root.join(folder)
                }
            }
        }
    }
}

/// Replace characters that are not allowed in file names
pub fn sanitize_component(s: &str) -> String {
    s.chars()
        .map(|c| if FORBIDDEN.contains(&c) || c.is_control() { '_' } else { c })
        .collect()
}
