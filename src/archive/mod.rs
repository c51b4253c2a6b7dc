//! Chapter archive writers
//!
//! A writer receives the pages of one chapter in order and persists them as
//! loose files, a zip or a cbz. Nothing carries the final name until
//! [`ArchiveWriter::commit`] succeeds; an aborted or dropped writer removes its
//! staging data.

pub mod cbz;
pub mod files;
pub mod magic;
pub mod naming;
pub mod zipfile;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

pub use cbz::{CbzWriter, ComicInfo};
pub use files::FilesWriter;
pub use naming::{DestinationStrategy, FilenameTemplate, FormatData};
pub use zipfile::ZipWriter;

/// Zero padding used for page names when the page count is unknown
const UNKNOWN_TOTAL_WIDTH: usize = 3;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("zip error: {0}")]
    Zip(#[from] ::zip::result::ZipError),

    #[error("unknown archive method '{0}', expected files, zip or cbz")]
    UnknownMethod(String),

    #[error("invalid filename template: {0}")]
    Template(String),

    #[error("archive writer used before open")]
    NotOpen,
}

pub type Result<T> = std::result::Result<T, ArchiveError>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveMethod {
    #[default]
    Files,
    Zip,
    Cbz,
}

impl ArchiveMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Files => "files",
            Self::Zip => "zip",
            Self::Cbz => "cbz",
        }
    }
}

impl FromStr for ArchiveMethod {
    type Err = ArchiveError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "files" => Ok(Self::Files),
            "zip" => Ok(Self::Zip),
            "cbz" => Ok(Self::Cbz),
            other => Err(ArchiveError::UnknownMethod(other.to_string())),
        }
    }
}

impl fmt::Display for ArchiveMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where and under which name a chapter is written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveTarget {
    pub directory: PathBuf,
    /// File name without extension
    pub stem: String,
    pub total_pages: Option<usize>,
    pub fallback_extension: String,
}

/// Outcome of writing one page
#[derive(Debug, Clone, PartialEq)]
pub struct PageReceipt {
    /// 1-based position in the chapter
    pub ordinal: usize,
    pub name: String,
    pub bytes: usize,
    /// `ordinal / total`, `None` when the total is unknown
    pub progress: Option<f64>,
}

/// Incremental sink for the pages of one chapter
pub trait ArchiveWriter: Send {
    /// Acquire the staging area; must succeed before any page is added
    fn open(&mut self) -> Result<()>;

    fn add_page(&mut self, data: &[u8]) -> Result<PageReceipt>;

    /// Hook run after the last page and before commit
    fn finish_pages(&mut self) -> Result<()> {
        Ok(())
    }

    /// Move the staged archive to its final name
    fn commit(self: Box<Self>) -> Result<PathBuf>;

    /// Discard everything written so far
    fn abort(self: Box<Self>) {}

    /// Final artifact path, valid once committed
    fn destination(&self) -> PathBuf;

    fn pages_written(&self) -> usize;
}

/// Build the writer for `method`; the caller still has to `open` it
pub fn create_writer(method: ArchiveMethod, target: ArchiveTarget, info: ComicInfo) -> Box<dyn ArchiveWriter> {
    match method {
        ArchiveMethod::Files => Box::new(FilesWriter::new(target)),
        ArchiveMethod::Zip => Box::new(ZipWriter::new(target, "zip")),
        ArchiveMethod::Cbz => Box::new(CbzWriter::new(target, info)),
    }
}

/// Ordinal and name assignment shared by every writer
#[derive(Debug, Clone)]
pub(crate) struct PageSequence {
    total: Option<usize>,
    written: usize,
    fallback: String,
}

impl PageSequence {
    pub(crate) fn new(total: Option<usize>, fallback: &str) -> Self {
        Self {
            total,
            written: 0,
            fallback: fallback.to_string(),
        }
    }

    /// Assign the next ordinal and file name for `data`
    pub(crate) fn next(&mut self, data: &[u8]) -> (usize, String) {
        self.written += 1;
        let extension = magic::extension_or(data, &self.fallback);
        let width = self
            .total
            .map(|total| total.to_string().len())
            .unwrap_or(UNKNOWN_TOTAL_WIDTH);
        (self.written, format!("{:0width$}.{extension}", self.written))
    }

    pub(crate) fn receipt(&self, ordinal: usize, name: String, bytes: usize) -> PageReceipt {
        PageReceipt {
            ordinal,
            name,
            bytes,
            progress: self.progress(),
        }
    }

    pub(crate) fn progress(&self) -> Option<f64> {
        match self.total {
            Some(total) if total > 0 => Some((self.written as f64 / total as f64).min(1.0)),
            _ => None,
        }
    }

    pub(crate) fn written(&self) -> usize {
        self.written
    }
}
