use std::collections::hash_map::DefaultHasher;
use std::fs::File;
use std::hash::{Hash, Hasher};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use lazy_static::lazy_static;
use log::debug;
use regex::{Captures, Regex};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{Error, Result};
use crate::generator::{ChapterEntry, Generator, OutputOptions, escape_xml, plan_chapters};
use crate::path_utils::path_to_string_lossy;
use crate::types::{ExtractedImage, PackageMetadata, image_media_type};

const CONTAINER_TEMPLATE: &str = include_str!("../../templates/container.xml");
const PAGE_TEMPLATE: &str = include_str!("../../templates/Page.xhtml");
const PACKAGE_TEMPLATE: &str = include_str!("../../templates/content.opf");
const NAV_TEMPLATE: &str = include_str!("../../templates/nav.xhtml");
const NCX_TEMPLATE: &str = include_str!("../../templates/toc.ncx");

const MIMETYPE: &str = "application/epub+zip";
const CONTENT_DIR: &str = "OEBPS";

lazy_static! {
    static ref PLACEHOLDER_REGEX: Regex = Regex::new(r"%(\w+)%").unwrap();
}

fn archive_write_error(e: impl std::fmt::Display) -> Error {
    Error::ArchiveWrite(e.to_string())
}

/// Fills every `%name%` placeholder of `template` in a single pass.
///
/// Substituted values are never scanned again, so text containing `%title%` stays
/// literal. Placeholders without a value are kept as they are.
fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    PLACEHOLDER_REGEX
        .replace_all(template, |caps: &Captures| {
            values
                .iter()
                .find(|(name, _)| *name == &caps[1])
                .map(|(_, value)| value.to_string())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Page documents are numbered from 1.
fn page_href(number: usize) -> String {
    format!("Text/page_{:04}.xhtml", number)
}

/// Images are named by their 0-based position.
fn image_href(index: usize, extension: &str) -> String {
    format!("Images/img_{}.{}", index, extension)
}

/// Generates the XHTML page wrapping one image, titled with its chapter label.
fn generate_xhtml(image_source: &str, alt: &str, chapter_label: &str, language: &str) -> String {
    let language = escape_xml(language);
    let src = escape_xml(image_source);
    let alt = escape_xml(alt);
    let title = escape_xml(chapter_label);
    fill_template(
        PAGE_TEMPLATE,
        &[
            ("language", language.as_str()),
            ("src", src.as_str()),
            ("alt", alt.as_str()),
            ("title", title.as_str()),
        ],
    )
}

/// Builds a `urn:uuid:` identifier for one generated book from its title, page count
/// and creation time.
///
/// The value only has UUID shape; it is not an RFC 4122 UUID, and since it comes from
/// `DefaultHasher` the same inputs may give a different value under another Rust
/// release. Nothing relies on identifiers matching across rebuilds.
fn book_identifier(title: &str, pages: usize, timestamp: i64) -> String {
    let mut first = DefaultHasher::new();
    (title, pages, timestamp).hash(&mut first);
    let high = first.finish();

    let mut second = DefaultHasher::new();
    (high, "mangapress").hash(&mut second);
    let low = second.finish();

    format!(
        "urn:uuid:{:08x}-{:04x}-4{:03x}-{:04x}-{:012x}",
        high >> 32,
        (high >> 16) & 0xffff,
        high & 0x0fff,
        ((low >> 48) & 0x3fff) | 0x8000,
        low & 0xffff_ffff_ffff
    )
}

/// A generator writing an image-only EPUB 3 package.
///
/// The `mimetype` entry (stored, first), the container document and the stylesheet
/// are written on creation, and each image is streamed in as it is added. Page
/// documents, the package document, the navigation document and the NCX are written on
/// [`Generator::save`], once the page count and chapter ranges are known.
pub struct EPub {
    zip: ZipWriter<File>,
    output_path: PathBuf,
    options: OutputOptions,
    title: String,
    creator: String,
    /// Lowercased extension of every image written so far, in page order.
    pages: Vec<String>,
}

impl EPub {
    fn deflated() -> SimpleFileOptions {
        SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(0o644)
    }

    fn write_entry(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        self.zip
            .start_file(name, Self::deflated())
            .map_err(archive_write_error)?;
        self.zip.write_all(bytes).map_err(archive_write_error)?;
        Ok(())
    }

    fn write_page_documents(&mut self, chapters: &[ChapterEntry]) -> Result<()> {
        let per_chapter = self.options.style.pages_per_chapter.max(1);
        for index in 0..self.pages.len() {
            let number = index + 1;
            let label = chapters
                .get(index / per_chapter)
                .map(|chapter| chapter.label.as_str())
                .unwrap_or_default();
            let xhtml = generate_xhtml(
                &format!("../{}", image_href(index, &self.pages[index])),
                &format!("Page {}", number),
                label,
                &self.options.language,
            );
            self.write_entry(
                &format!("{}/{}", CONTENT_DIR, page_href(number)),
                xhtml.as_bytes(),
            )?;
        }
        Ok(())
    }

    fn manifest_items(&self) -> String {
        let mut items = Vec::with_capacity(self.pages.len() * 2);
        for (index, extension) in self.pages.iter().enumerate() {
            let number = index + 1;
            items.push(format!(
                r#"    <item id="page-{n}" href="{href}" media-type="application/xhtml+xml"/>"#,
                n = number,
                href = page_href(number)
            ));
            let (id, properties) = if index == 0 {
                ("cover-image".to_string(), r#" properties="cover-image""#)
            } else {
                (format!("image-{}", index), "")
            };
            items.push(format!(
                r#"    <item id="{id}" href="{href}" media-type="{media}"{properties}/>"#,
                href = escape_xml(&image_href(index, extension)),
                media = image_media_type(extension),
            ));
        }
        items.join("\n")
    }

    fn spine_items(&self) -> String {
        (1..=self.pages.len())
            .map(|number| format!(r#"    <itemref idref="page-{}"/>"#, number))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn nav_document(&self, chapters: &[ChapterEntry]) -> String {
        let entries = chapters
            .iter()
            .map(|chapter| {
                format!(
                    r#"      <li><a href="{}">{}</a></li>"#,
                    page_href(chapter.first_page + 1),
                    escape_xml(&chapter.label)
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        let language = escape_xml(&self.options.language);
        let title = escape_xml(&self.title);
        fill_template(
            NAV_TEMPLATE,
            &[
                ("language", language.as_str()),
                ("title", title.as_str()),
                ("entries", entries.as_str()),
            ],
        )
    }

    fn ncx_document(&self, identifier: &str, chapters: &[ChapterEntry]) -> String {
        let navpoints = chapters
            .iter()
            .enumerate()
            .map(|(order, chapter)| {
                format!(
                    "    <navPoint id=\"chapter-{n}\" playOrder=\"{n}\">\n      <navLabel><text>{label}</text></navLabel>\n      <content src=\"{src}\"/>\n    </navPoint>",
                    n = order + 1,
                    label = escape_xml(&chapter.label),
                    src = page_href(chapter.first_page + 1)
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        let title = escape_xml(&self.title);
        fill_template(
            NCX_TEMPLATE,
            &[
                ("identifier", identifier),
                ("title", title.as_str()),
                ("navpoints", navpoints.as_str()),
            ],
        )
    }

    fn package_document(&self, identifier: &str, modified: &str) -> String {
        let language = escape_xml(&self.options.language);
        let title = escape_xml(&self.title);
        let creator = escape_xml(&self.creator);
        let direction = self.options.reading_direction.to_string();
        let manifest = self.manifest_items();
        let spine = self.spine_items();
        fill_template(
            PACKAGE_TEMPLATE,
            &[
                ("language", language.as_str()),
                ("identifier", identifier),
                ("title", title.as_str()),
                ("creator", creator.as_str()),
                ("modified", modified),
                ("direction", direction.as_str()),
                ("manifest", manifest.as_str()),
                ("spine", spine.as_str()),
            ],
        )
    }
}

impl Generator for EPub {
    fn new(output_path: &Path, options: OutputOptions) -> Result<Self> {
        if let Some(parent) = output_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = File::create(output_path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to create EPUB file '{}': {}",
                    path_to_string_lossy(output_path),
                    e
                ),
            ))
        })?;

        let mut epub = EPub {
            zip: ZipWriter::new(file),
            output_path: output_path.to_path_buf(),
            options,
            title: crate::types::PLACEHOLDER_TITLE.to_string(),
            creator: crate::types::PLACEHOLDER_AUTHOR.to_string(),
            pages: Vec::new(),
        };

        // Readers sniff the first local header, so `mimetype` must be first and stored.
        epub.zip
            .start_file(
                "mimetype",
                SimpleFileOptions::default().compression_method(CompressionMethod::Stored),
            )
            .map_err(archive_write_error)?;
        epub.zip
            .write_all(MIMETYPE.as_bytes())
            .map_err(archive_write_error)?;

        epub.write_entry("META-INF/container.xml", CONTAINER_TEMPLATE.as_bytes())?;
        let stylesheet = epub.options.style.stylesheet();
        epub.write_entry(&format!("{}/style.css", CONTENT_DIR), stylesheet.as_bytes())?;

        Ok(epub)
    }

    fn set_metadata(&mut self, metadata: &PackageMetadata) -> Result<&mut Self> {
        self.title = metadata.title.clone();
        self.creator = metadata.author.clone();
        Ok(self)
    }

    fn add_page(&mut self, image: &ExtractedImage) -> Result<&mut Self> {
        let index = self.pages.len();
        let extension = image.extension.to_ascii_lowercase();

        let mut source = File::open(&image.source_path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to open image file '{}': {}",
                    path_to_string_lossy(&image.source_path),
                    e
                ),
            ))
        })?;
        self.zip
            .start_file(
                format!("{}/{}", CONTENT_DIR, image_href(index, &extension)),
                Self::deflated(),
            )
            .map_err(archive_write_error)?;
        std::io::copy(&mut source, &mut self.zip).map_err(archive_write_error)?;

        self.pages.push(extension);
        Ok(self)
    }

    fn save(mut self) -> Result<Vec<ChapterEntry>> {
        let chapters = plan_chapters(self.pages.len(), &self.options.style);
        self.write_page_documents(&chapters)?;

        let now = Utc::now();
        let identifier = book_identifier(&self.title, self.pages.len(), now.timestamp_millis());
        let modified = now.format("%Y-%m-%dT%H:%M:%SZ").to_string();

        let package = self.package_document(&identifier, &modified);
        let nav = self.nav_document(&chapters);
        let ncx = self.ncx_document(&identifier, &chapters);

        self.write_entry(&format!("{}/content.opf", CONTENT_DIR), package.as_bytes())?;
        self.write_entry(&format!("{}/nav.xhtml", CONTENT_DIR), nav.as_bytes())?;
        self.write_entry(&format!("{}/toc.ncx", CONTENT_DIR), ncx.as_bytes())?;

        let file = self.zip.finish().map_err(archive_write_error)?;
        file.sync_all()?;

        debug!(
            "EPUB written to {} ({} pages, {} chapters)",
            path_to_string_lossy(&self.output_path),
            self.pages.len(),
            chapters.len()
        );
        Ok(chapters)
    }
}
