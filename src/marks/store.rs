use std::collections::BTreeMap;
use std::path::Path;

use chrono::Utc;
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle};
use tracing::{debug, info};

use super::partitions::{decode_manga_key, encode_chapter_key, encode_manga_key, encode_manga_prefix};
use super::{ChapterMark, MarkError, MarkRecord, MarkSink, Result};

/// Fjall-backed chapter marks
#[derive(Clone)]
pub struct FjallMarks {
    keyspace: Keyspace,
    marks: PartitionHandle,
}

impl FjallMarks {
    /// Open or create the mark store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Opening mark store");

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let keyspace = Config::new(path).open()?;
        let marks = keyspace.open_partition("marks", PartitionCreateOptions::default())?;

        Ok(Self { keyspace, marks })
    }

    /// Mark a chapter, replacing any previous mark
    pub fn set_mark(&self, site: &str, chapter_id: &str, manga_id: &str, mark: ChapterMark) -> Result<()> {
        let record = MarkRecord {
            mark,
            manga_id: manga_id.to_string(),
            marked_at: Utc::now(),
        };

        let mut batch = self.keyspace.batch();
        if let Some(previous) = self.get_mark(site, chapter_id)? {
            if previous.manga_id != manga_id {
                batch.remove(&self.marks, encode_manga_key(site, &previous.manga_id, chapter_id));
            }
        }
        batch.insert(&self.marks, encode_chapter_key(site, chapter_id), serde_json::to_vec(&record)?);
        if !manga_id.is_empty() {
            batch.insert(
                &self.marks,
                encode_manga_key(site, manga_id, chapter_id),
                mark.as_str().as_bytes(),
            );
        }
        batch.commit()?;

        debug!(site, chapter_id, manga_id, mark = mark.as_str(), "Chapter marked");
        Ok(())
    }

    pub fn get_mark(&self, site: &str, chapter_id: &str) -> Result<Option<MarkRecord>> {
        match self.marks.get(encode_chapter_key(site, chapter_id))? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    /// Marks of several chapters; unmarked chapters map to `None`
    pub fn get_marks(&self, site: &str, chapter_ids: &[String]) -> Result<BTreeMap<String, Option<ChapterMark>>> {
        chapter_ids
            .iter()
            .map(|id| Ok((id.clone(), self.get_mark(site, id)?.map(|r| r.mark))))
            .collect()
    }

    /// Remove a mark; returns whether one existed
    pub fn clear_mark(&self, site: &str, chapter_id: &str) -> Result<bool> {
        let Some(previous) = self.get_mark(site, chapter_id)? else {
            return Ok(false);
        };

        let mut batch = self.keyspace.batch();
        batch.remove(&self.marks, encode_chapter_key(site, chapter_id));
        batch.remove(&self.marks, encode_manga_key(site, &previous.manga_id, chapter_id));
        batch.commit()?;
        Ok(true)
    }

    /// Every marked chapter of a manga
    pub fn manga_marks(&self, site: &str, manga_id: &str) -> Result<BTreeMap<String, ChapterMark>> {
        let prefix = encode_manga_prefix(site, manga_id);
        let mut marks = BTreeMap::new();

        for item in self.marks.prefix(&prefix) {
            let (key, value) = item?;
            let chapter_id = decode_manga_key(&key, &prefix)
                .ok_or_else(|| MarkError::InvalidKey(String::from_utf8_lossy(&key).to_string()))?;
            let mark = std::str::from_utf8(&value)
                .ok()
                .and_then(|s| s.parse::<ChapterMark>().ok())
                .ok_or_else(|| MarkError::InvalidKey(String::from_utf8_lossy(&key).to_string()))?;
            marks.insert(chapter_id, mark);
        }

        Ok(marks)
    }

    /// Persist all pending writes to disk
    pub fn persist(&self) -> Result<()> {
        self.keyspace.persist(fjall::PersistMode::SyncAll)?;
        Ok(())
    }
}

impl MarkSink for FjallMarks {
    fn chapter_downloaded(&self, site: &str, chapter_id: &str, manga_id: &str) -> Result<()> {
        self.set_mark(site, chapter_id, manga_id, ChapterMark::Downloaded)
    }
}
