use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;
use tracing::{debug, info, warn};

use super::{ArchiveError, ArchiveTarget, ArchiveWriter, PageReceipt, PageSequence, Result};

/// Writes pages as loose files into one folder per chapter
///
/// Pages go to a hidden `.{stem}.*.part` folder private to this writer, which
/// is renamed on commit and removed on abort or drop.
pub struct FilesWriter {
    target: ArchiveTarget,
    pages: PageSequence,
    staging: Option<TempDir>,
}

impl FilesWriter {
    pub fn new(target: ArchiveTarget) -> Self {
        let pages = PageSequence::new(target.total_pages, &target.fallback_extension);
        Self {
            target,
            pages,
            staging: None,
        }
    }
}

impl ArchiveWriter for FilesWriter {
    fn open(&mut self) -> Result<()> {
        fs::create_dir_all(&self.target.directory)?;

        let staging = tempfile::Builder::new()
            .prefix(&format!(".{}.", self.target.stem))
            .suffix(".part")
            .tempdir_in(&self.target.directory)?;
        debug!(path = %staging.path().display(), "Staging folder created");

        self.staging = Some(staging);
        Ok(())
    }

    fn add_page(&mut self, data: &[u8]) -> Result<PageReceipt> {
        let staging = self.staging.as_ref().ok_or(ArchiveError::NotOpen)?;
        let (ordinal, name) = self.pages.next(data);
        fs::write(staging.path().join(&name), data)?;
        Ok(self.pages.receipt(ordinal, name, data.len()))
    }

    fn commit(mut self: Box<Self>) -> Result<PathBuf> {
        let staging = self.staging.take().ok_or(ArchiveError::NotOpen)?;
        let destination = self.destination();

        if destination.exists() {
            warn!(path = %destination.display(), "Replacing existing chapter folder");
            fs::remove_dir_all(&destination)?;
        }
        // the emptied TempDir handle is dropped afterwards; its cleanup finds nothing
        fs::rename(staging.path(), &destination)?;

        info!(path = %destination.display(), pages = self.pages.written(), "Chapter folder committed");
        Ok(destination)
    }

    fn abort(mut self: Box<Self>) {
        if let Some(staging) = self.staging.take() {
            let path = staging.path().to_path_buf();
            match staging.close() {
                Ok(()) => debug!(path = %path.display(), "Discarded staged pages"),
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to discard staged pages"),
            }
        }
    }

    fn destination(&self) -> PathBuf {
        self.target.directory.join(&self.target.stem)
    }

    fn pages_written(&self) -> usize {
        self.pages.written()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn target(dir: &TempDir) -> ArchiveTarget {
        ArchiveTarget {
            directory: dir.path().join("out"),
            stem: "Manga - 1".to_string(),
            total_pages: Some(2),
            fallback_extension: "png".to_string(),
        }
    }

    #[test]
    fn test_commit_renames_staging_folder() {
        let dir = TempDir::new().unwrap();
        let mut writer = Box::new(FilesWriter::new(target(&dir)));
        writer.open().unwrap();

        let first = writer.add_page(b"\xff\xd8\xffpage-one").unwrap();
        assert_eq!(first.name, "1.jpg");
        assert_eq!(first.progress, Some(0.5));
        writer.add_page(b"\x89PNG\r\n\x1a\npage-two").unwrap();

        let path = writer.commit().unwrap();
        assert_eq!(path, dir.path().join("out/Manga - 1"));
        assert_eq!(fs::read(path.join("1.jpg")).unwrap(), b"\xff\xd8\xffpage-one");
        assert!(path.join("2.png").exists());
        assert_eq!(fs::read_dir(dir.path().join("out")).unwrap().count(), 1);
    }

    #[test]
    fn test_writers_for_one_chapter_do_not_share_staging() {
        let dir = TempDir::new().unwrap();
        let mut first = Box::new(FilesWriter::new(target(&dir)));
        let mut second = Box::new(FilesWriter::new(target(&dir)));
        first.open().unwrap();
        first.add_page(b"\x89PNG\r\n\x1a\none").unwrap();

        second.open().unwrap();
        second.add_page(b"\x89PNG\r\n\x1a\nother").unwrap();
        second.abort();

        first.add_page(b"\x89PNG\r\n\x1a\ntwo").unwrap();
        let path = first.commit().unwrap();
        assert!(path.join("1.png").exists());
        assert!(path.join("2.png").exists());
        assert_eq!(fs::read_dir(dir.path().join("out")).unwrap().count(), 1);
    }

    #[test]
    fn test_abort_leaves_nothing_behind() {
        let dir = TempDir::new().unwrap();
        let mut writer = Box::new(FilesWriter::new(target(&dir)));
        writer.open().unwrap();
        writer.add_page(b"data").unwrap();

        writer.abort();

        let leftovers: Vec<_> = fs::read_dir(dir.path().join("out")).unwrap().collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_add_page_requires_open() {
        let dir = TempDir::new().unwrap();
        let mut writer = FilesWriter::new(target(&dir));
        assert!(matches!(writer.add_page(b"data"), Err(ArchiveError::NotOpen)));
    }
}
