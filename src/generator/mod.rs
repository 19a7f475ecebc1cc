//! Generator module: turns an ordered image sequence into an output e-book.
//!
//! This module contains the common interface for output generators, the chapter
//! planning shared by every format, and [`rebuild`], the single entry point the rebuild
//! pipeline uses.

use std::path::Path;

use crate::error::{Error, Result};
use crate::types::{Direction, ExtractedImage, PackageMetadata, StyleConfig};

pub mod epub;

use epub::EPub;

/// Format-independent options for a generated book.
#[derive(Debug, Clone)]
pub struct OutputOptions {
    pub style: StyleConfig,
    /// BCP 47 language tag written to the package and page documents.
    pub language: String,
    pub reading_direction: Direction,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            style: StyleConfig::default(),
            language: "en".to_string(),
            reading_direction: Direction::Ltr,
        }
    }
}

/// One navigation entry, opened at every `pages_per_chapter`-th page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterEntry {
    /// 0-based position of the page the entry links to.
    pub first_page: usize,
    /// 1-based inclusive page range covered by the entry.
    pub start: usize,
    pub end: usize,
    pub label: String,
}

/// Computes the chapter boundaries for `total_pages` pages.
///
/// A boundary opens at every page index `i` with `i % pages_per_chapter == 0`; its
/// range ends at `min(i + pages_per_chapter, total_pages)`, so the last chapter may be
/// shorter.
pub fn plan_chapters(total_pages: usize, style: &StyleConfig) -> Vec<ChapterEntry> {
    let per_chapter = style.pages_per_chapter.max(1);
    (0..total_pages)
        .step_by(per_chapter)
        .map(|first_page| {
            let start = first_page + 1;
            let end = (first_page + per_chapter).min(total_pages);
            ChapterEntry {
                first_page,
                start,
                end,
                label: style.chapter_label(start, end),
            }
        })
        .collect()
}

/// Escapes text for inclusion in XML content or attribute values.
pub(crate) fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Common interface for output generators.
///
/// A generator is created for one output file, receives the book metadata and then the
/// pages in reading order, and finally writes everything out in [`Generator::save`].
pub trait Generator: Sized {
    /// Creates a generator writing to `output_path`.
    fn new(output_path: &Path, options: OutputOptions) -> Result<Self>;

    /// Sets the title and creator carried into the output.
    fn set_metadata(&mut self, metadata: &PackageMetadata) -> Result<&mut Self>;

    /// Appends the next page. Pages are numbered in call order.
    fn add_page(&mut self, image: &ExtractedImage) -> Result<&mut Self>;

    /// Finalizes the output and returns the chapter entries that were written.
    fn save(self) -> Result<Vec<ChapterEntry>>;
}

/// Writes a new image-centric EPUB at `output_path` from `images`.
///
/// Images are laid out by ascending `sequence_index`. Fails with [`Error::EmptyInput`]
/// when `images` is empty. A partially written output file is removed on failure.
pub fn rebuild(
    images: &[ExtractedImage],
    metadata: &PackageMetadata,
    options: &OutputOptions,
    output_path: &Path,
) -> Result<Vec<ChapterEntry>> {
    if images.is_empty() {
        return Err(Error::EmptyInput);
    }
    options.style.validate()?;

    let mut ordered: Vec<&ExtractedImage> = images.iter().collect();
    ordered.sort_by_key(|image| image.sequence_index);

    let result = (|| -> Result<Vec<ChapterEntry>> {
        let mut generator = EPub::new(output_path, options.clone())?;
        generator.set_metadata(metadata)?;
        for image in ordered {
            generator.add_page(image)?;
        }
        generator.save()
    })();

    if result.is_err() && output_path.exists() {
        let _ = std::fs::remove_file(output_path);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn style(pages_per_chapter: usize) -> StyleConfig {
        StyleConfig {
            pages_per_chapter,
            chapter_title_template: "({start}-{end})".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_plan_chapters_clamps_last() {
        let chapters = plan_chapters(45, &style(20));
        let ranges: Vec<(usize, usize)> = chapters.iter().map(|c| (c.start, c.end)).collect();
        assert_eq!(ranges, vec![(1, 20), (21, 40), (41, 45)]);
        assert_eq!(chapters[2].first_page, 40);
        assert_eq!(chapters[2].label, "(41-45)");
    }

    #[test]
    fn test_plan_chapters_exact_multiple() {
        let chapters = plan_chapters(40, &style(20));
        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[1].end, 40);
    }

    #[test]
    fn test_plan_chapters_single_page_chapters() {
        let chapters = plan_chapters(3, &style(1));
        let labels: Vec<&str> = chapters.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["(1-1)", "(2-2)", "(3-3)"]);
    }

    #[test]
    fn test_plan_chapters_empty() {
        assert!(plan_chapters(0, &style(20)).is_empty());
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml(r#"<a & "b">"#), "&lt;a &amp; &quot;b&quot;&gt;");
    }

    #[test]
    fn test_rebuild_rejects_empty_input() {
        let metadata = PackageMetadata::new("content.opf");
        let output = std::env::temp_dir().join("mangapress-never-written.epub");
        let result = rebuild(&[], &metadata, &OutputOptions::default(), &output);
        assert!(matches!(result, Err(Error::EmptyInput)));
        assert!(!output.exists());
    }
}
