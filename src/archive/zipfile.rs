use std::fs;
use std::io::{Cursor, Write};
use std::path::PathBuf;
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter as ZipStream};

use super::{ArchiveError, ArchiveTarget, ArchiveWriter, PageReceipt, PageSequence, Result};

/// Builds a zip archive in memory and writes it out on commit
pub struct ZipWriter {
    target: ArchiveTarget,
    extension: &'static str,
    pages: PageSequence,
    stream: Option<ZipStream<Cursor<Vec<u8>>>>,
}

impl ZipWriter {
    pub fn new(target: ArchiveTarget, extension: &'static str) -> Self {
        let pages = PageSequence::new(target.total_pages, &target.fallback_extension);
        Self {
            target,
            extension,
            pages,
            stream: None,
        }
    }

    /// Append an arbitrary entry, pages are stored uncompressed
    pub fn add_entry(&mut self, name: &str, data: &[u8], compress: bool) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(ArchiveError::NotOpen)?;
        let method = if compress {
            CompressionMethod::Deflated
        } else {
            CompressionMethod::Stored
        };
        stream.start_file(name, SimpleFileOptions::default().compression_method(method))?;
        stream.write_all(data)?;
        Ok(())
    }

    /// Flush the archive to a private `.{name}.*.part` file and rename it into place
    ///
    /// Every writer stages under its own random name, so concurrent jobs for
    /// the same chapter never touch each other's data.
    pub(crate) fn finalize(&mut self) -> Result<PathBuf> {
        let stream = self.stream.take().ok_or(ArchiveError::NotOpen)?;
        let buffer = stream.finish()?.into_inner();

        let destination = self.destination();
        let mut staging = tempfile::Builder::new()
            .prefix(&format!(".{}.{}.", self.target.stem, self.extension))
            .suffix(".part")
            .tempfile_in(&self.target.directory)?;
        staging.write_all(&buffer)?;
        staging.persist(&destination).map_err(|e| e.error)?;

        info!(
            path = %destination.display(),
            pages = self.pages.written(),
            size = buffer.len(),
            "Archive committed"
        );
        Ok(destination)
    }

    pub(crate) fn sequence(&self) -> &PageSequence {
        &self.pages
    }
}

impl ArchiveWriter for ZipWriter {
    fn open(&mut self) -> Result<()> {
        fs::create_dir_all(&self.target.directory)?;
        self.stream = Some(ZipStream::new(Cursor::new(Vec::new())));
        Ok(())
    }

    fn add_page(&mut self, data: &[u8]) -> Result<PageReceipt> {
        if self.stream.is_none() {
            return Err(ArchiveError::NotOpen);
        }
        let (ordinal, name) = self.pages.next(data);
        self.add_entry(&name, data, false)?;
        Ok(self.pages.receipt(ordinal, name, data.len()))
    }

    fn commit(mut self: Box<Self>) -> Result<PathBuf> {
        self.finalize()
    }

    fn abort(self: Box<Self>) {
        debug!(path = %self.destination().display(), "Archive discarded");
    }

    fn destination(&self) -> PathBuf {
        self.target
            .directory
            .join(format!("{}.{}", self.target.stem, self.extension))
    }

    fn pages_written(&self) -> usize {
        self.pages.written()
    }
}
