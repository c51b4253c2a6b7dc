//! Chapter bookkeeping
//!
//! Completed downloads can be recorded through the [`MarkSink`] callback the
//! scheduler invokes after a job reaches `COMPLETE`. [`FjallMarks`] persists
//! marks in an embedded fjall keyspace so the front end can tell which
//! chapters were already fetched or deliberately skipped.

pub mod partitions;
pub mod store;

pub use store::FjallMarks;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MarkError {
    #[error("Fjall error: {0}")]
    Fjall(#[from] fjall::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid key format: {0}")]
    InvalidKey(String),

    #[error("Unknown mark: {0}")]
    UnknownMark(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MarkError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChapterMark {
    Downloaded,
    Ignored,
}

impl ChapterMark {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Downloaded => "DOWNLOADED",
            Self::Ignored => "IGNORED",
        }
    }
}

impl FromStr for ChapterMark {
    type Err = MarkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DOWNLOADED" => Ok(Self::Downloaded),
            "IGNORED" => Ok(Self::Ignored),
            other => Err(MarkError::UnknownMark(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkRecord {
    pub mark: ChapterMark,
    pub manga_id: String,
    pub marked_at: DateTime<Utc>,
}

/// Persistence callback run after a successful download
pub trait MarkSink: Send + Sync {
    fn chapter_downloaded(&self, site: &str, chapter_id: &str, manga_id: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_parsing() {
        assert_eq!("downloaded".parse::<ChapterMark>().unwrap(), ChapterMark::Downloaded);
        assert_eq!(" IGNORED".parse::<ChapterMark>().unwrap(), ChapterMark::Ignored);
        assert!(matches!("read".parse::<ChapterMark>(), Err(MarkError::UnknownMark(_))));
    }

    #[test]
    fn test_mark_serialization() {
        assert_eq!(serde_json::to_string(&ChapterMark::Downloaded).unwrap(), "\"DOWNLOADED\"");
    }
}
