//! Comic book zip: a zip archive plus a `ComicInfo.xml` sidecar

use image::ImageReader;
use quick_xml::escape::escape;
use std::fmt::Write as _;
use std::io::Cursor;
use std::path::PathBuf;
use tracing::debug;

use super::zipfile::ZipWriter;
use super::{ArchiveTarget, ArchiveWriter, PageReceipt, Result};

const SIDECAR: &str = "ComicInfo.xml";

/// Chapter metadata rendered into `ComicInfo.xml`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComicInfo {
    pub series: String,
    pub title: String,
    pub number: String,
    pub volume: Option<String>,
    pub summary: Option<String>,
    pub writers: Vec<String>,
    pub pencillers: Vec<String>,
    pub translators: Vec<String>,
    pub genres: Vec<String>,
    pub language: Option<String>,
    pub web: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageInfo {
    pub size: usize,
    pub dimensions: Option<(u32, u32)>,
}

/// Collects size and dimensions of every page as it is written
#[derive(Debug, Default)]
pub struct PageInfoAccumulator {
    pages: Vec<PageInfo>,
}

impl PageInfoAccumulator {
    pub fn record(&mut self, data: &[u8]) {
        let dimensions = ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .ok()
            .and_then(|reader| reader.into_dimensions().ok());
        self.pages.push(PageInfo {
            size: data.len(),
            dimensions,
        });
    }

    pub fn pages(&self) -> &[PageInfo] {
        &self.pages
    }
}

impl ComicInfo {
    pub fn to_xml(&self, pages: &[PageInfo]) -> String {
        let mut xml = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
        xml.push_str(
            "<ComicInfo xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" \
             xmlns:xsd=\"http://www.w3.org/2001/XMLSchema\">\n",
        );

        element(&mut xml, "Title", &self.title);
        element(&mut xml, "Series", &self.series);
        element(&mut xml, "Number", &self.number);
        if let Some(volume) = self.volume.as_deref().and_then(|v| v.trim().parse::<u32>().ok()) {
            element(&mut xml, "Volume", &volume.to_string());
        }
        if let Some(summary) = &self.summary {
            element(&mut xml, "Summary", summary);
        }
        element(&mut xml, "Writer", &self.writers.join(", "));
        element(&mut xml, "Penciller", &self.pencillers.join(", "));
        element(&mut xml, "Translator", &self.translators.join(", "));
        element(&mut xml, "Genre", &self.genres.join(", "));
        if let Some(web) = &self.web {
            element(&mut xml, "Web", web);
        }
        element(&mut xml, "PageCount", &pages.len().to_string());
        if let Some(language) = &self.language {
            element(&mut xml, "LanguageISO", language);
        }
        element(&mut xml, "Manga", "Yes");

        if pages.is_empty() {
            xml.push_str("  <Pages />\n");
        } else {
            xml.push_str("  <Pages>\n");
            for (index, page) in pages.iter().enumerate() {
                let _ = write!(xml, "    <Page Image=\"{index}\" ImageSize=\"{}\"", page.size);
                if let Some((width, height)) = page.dimensions {
                    let _ = write!(xml, " ImageWidth=\"{width}\" ImageHeight=\"{height}\"");
                }
                xml.push_str(" />\n");
            }
            xml.push_str("  </Pages>\n");
        }

        xml.push_str("</ComicInfo>\n");
        xml
    }
}

fn element(xml: &mut String, name: &str, value: &str) {
    if value.is_empty() {
        return;
    }
    let _ = writeln!(xml, "  <{name}>{}</{name}>", escape(value));
}

/// Zip writer that appends `ComicInfo.xml` once all pages are in
pub struct CbzWriter {
    zip: ZipWriter,
    info: ComicInfo,
    pages: PageInfoAccumulator,
    sidecar_written: bool,
}

impl CbzWriter {
    pub fn new(target: ArchiveTarget, info: ComicInfo) -> Self {
        Self {
            zip: ZipWriter::new(target, "cbz"),
            info,
            pages: PageInfoAccumulator::default(),
            sidecar_written: false,
        }
    }
}

impl ArchiveWriter for CbzWriter {
    fn open(&mut self) -> Result<()> {
        self.zip.open()
    }

    fn add_page(&mut self, data: &[u8]) -> Result<PageReceipt> {
        let receipt = self.zip.add_page(data)?;
        self.pages.record(data);
        Ok(receipt)
    }

    fn finish_pages(&mut self) -> Result<()> {
        if self.sidecar_written {
            return Ok(());
        }
        let xml = self.info.to_xml(self.pages.pages());
        self.zip.add_entry(SIDECAR, xml.as_bytes(), true)?;
        self.sidecar_written = true;
        debug!(pages = self.pages.pages().len(), "ComicInfo.xml written");
        Ok(())
    }

    fn commit(mut self: Box<Self>) -> Result<PathBuf> {
        self.finish_pages()?;
        self.zip.finalize()
    }

    fn destination(&self) -> PathBuf {
        self.zip.destination()
    }

    fn pages_written(&self) -> usize {
        self.zip.sequence().written()
    }
}
