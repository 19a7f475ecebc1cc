use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::archive::{Archive, ZipSource};
use crate::error::{Error, Result};
use crate::extractor::{Extractor, WorkArea};
use crate::generator::{self, OutputOptions};
use crate::package;
use crate::path_utils::path_to_string_lossy;
use crate::types::{Direction, RebuildReport, StyleConfig};

/// Rebuilds one EPUB archive into a spine-ordered, image-only EPUB.
///
/// A rebuild runs in four steps, each feeding the next:
///
/// 1. **Inspect** the input for its package document, title and creator
///    ([`package::inspect`]).
/// 2. **Extract** page images in spine order, falling back to natural file-name order
///    ([`Extractor::extract`]). Images land in a scoped [`WorkArea`].
/// 3. **Generate** the new book with one page per image and a chapter entry every
///    [`StyleConfig::pages_per_chapter`] pages ([`generator::rebuild`]).
/// 4. **Clean up** the work area, whether the rebuild succeeded or not.
///
/// The input is never modified.
///
/// ## Builder Pattern
///
/// ```rust,no_run
/// # use mangapress::prelude::*;
/// # use std::path::Path;
/// let rebuilder = Rebuilder::builder()
///     .reading_direction(Direction::Rtl)
///     .language("ja")
///     .build()
///     .expect("Invalid configuration");
/// let report = rebuilder.rebuild_file(Path::new("in.epub"), Path::new("out.epub"))?;
/// println!("{} pages, {} chapters", report.pages, report.chapters.len());
/// # Ok::<(), mangapress::error::Error>(())
/// ```
#[derive(Debug, Clone, derive_builder::Builder)]
#[builder(setter(into, strip_option), build_fn(validate = "Self::validate"))]
pub struct Rebuilder {
    /// Chaptering and stylesheet rules for generated books.
    #[builder(default)]
    pub style: StyleConfig,

    /// Directory under which per-rebuild work areas are created.
    ///
    /// Defaults to the system temporary directory.
    #[builder(default)]
    pub work_root: Option<PathBuf>,

    /// Language tag of generated books.
    #[builder(default = "\"en\".to_string()")]
    pub language: String,

    /// Page progression direction of generated books.
    #[builder(default = "Direction::Ltr")]
    pub reading_direction: Direction,
}

impl Default for Rebuilder {
    fn default() -> Self {
        Self {
            style: StyleConfig::default(),
            work_root: None,
            language: "en".to_string(),
            reading_direction: Direction::Ltr,
        }
    }
}

impl Rebuilder {
    pub fn builder() -> RebuilderBuilder {
        RebuilderBuilder::default()
    }

    fn output_options(&self) -> OutputOptions {
        OutputOptions {
            style: self.style.clone(),
            language: self.language.clone(),
            reading_direction: self.reading_direction,
        }
    }

    fn create_work_area(&self) -> Result<WorkArea> {
        match &self.work_root {
            Some(root) => WorkArea::create_in(root),
            None => WorkArea::create(),
        }
    }

    /// Rebuilds the EPUB at `input` into a new EPUB at `output`.
    ///
    /// # Errors
    ///
    /// * [`Error::Structure`] - no package document could be located
    /// * [`Error::EmptyInput`] - neither extractor found any image
    /// * [`Error::ArchiveWrite`] - the output could not be written
    pub fn rebuild_file(&self, input: &Path, output: &Path) -> Result<RebuildReport> {
        if input == output {
            return Err(Error::InvalidPath(
                output.to_path_buf(),
                "Output must not overwrite the input archive".to_string(),
            ));
        }
        info!(
            "Rebuilding '{}' -> '{}'",
            path_to_string_lossy(input),
            path_to_string_lossy(output)
        );
        let mut archive = ZipSource::open(input)?;
        self.rebuild_archive(&mut archive, output)
    }

    /// Rebuilds an already opened [`Archive`] into a new EPUB at `output`.
    pub fn rebuild_archive<A: Archive>(&self, archive: &mut A, output: &Path) -> Result<RebuildReport> {
        self.style.validate()?;

        let metadata = package::inspect(archive)?;
        info!(
            "Package '{}': title '{}', creator '{}'",
            metadata.root_document_path, metadata.title, metadata.author
        );

        let work_area = self.create_work_area()?;
        let outcome = Extractor::new(&work_area)
            .extract(archive, &metadata)
            .and_then(|extraction| {
                let chapters = generator::rebuild(
                    &extraction.images,
                    &metadata,
                    &self.output_options(),
                    output,
                )?;
                Ok(RebuildReport {
                    pages: extraction.images.len(),
                    chapters: chapters.into_iter().map(|chapter| chapter.label).collect(),
                    source: extraction.source,
                    skipped: extraction.skipped,
                    metadata: metadata.clone(),
                })
            });

        if let Err(e) = work_area.close() {
            warn!("Failed to remove work area: {}", e);
        }

        let report = outcome?;
        info!(
            "Rebuilt '{}': {} pages in {} chapters ({:?} order)",
            path_to_string_lossy(output),
            report.pages,
            report.chapters.len(),
            report.source
        );
        Ok(report)
    }

    /// Runs [`Rebuilder::rebuild_file`] on the blocking thread pool.
    pub async fn rebuild_file_async(&self, input: PathBuf, output: PathBuf) -> Result<RebuildReport> {
        let rebuilder = self.clone();
        tokio::task::spawn_blocking(move || rebuilder.rebuild_file(&input, &output)).await?
    }
}

impl RebuilderBuilder {
    fn validate(&self) -> std::result::Result<(), String> {
        if let Some(style) = &self.style {
            if style.pages_per_chapter == 0 {
                return Err("pages_per_chapter must be at least 1".to_string());
            }
        }
        if let Some(language) = &self.language {
            if language.trim().is_empty() {
                return Err("language must not be empty".to_string());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let rebuilder = Rebuilder::builder().build().unwrap();
        assert_eq!(rebuilder.language, "en");
        assert_eq!(rebuilder.reading_direction, Direction::Ltr);
        assert_eq!(rebuilder.style.pages_per_chapter, 20);
        assert!(rebuilder.work_root.is_none());
    }

    #[test]
    fn test_builder_rejects_zero_pages_per_chapter() {
        let style = StyleConfig {
            pages_per_chapter: 0,
            ..Default::default()
        };
        assert!(Rebuilder::builder().style(style).build().is_err());
    }

    #[test]
    fn test_builder_rejects_empty_language() {
        assert!(Rebuilder::builder().language("  ").build().is_err());
    }

    #[test]
    fn test_rebuild_refuses_in_place_output() {
        let path = Path::new("same.epub");
        let result = Rebuilder::default().rebuild_file(path, path);
        assert!(matches!(result, Err(Error::InvalidPath(_, _))));
    }
}
