//! Page image extraction in reading order.
//!
//! Two extractors feed the rebuild:
//! - the spine-order extractor walks the package spine, opens each content document,
//!   takes its first image reference and copies that image out;
//! - the natural-order extractor is the fallback for books whose structure yields nothing,
//!   ordering every image entry by [`natural_cmp`].
//!
//! Both copy bytes into a [`WorkArea`] under sequential names, so the rebuild never sees
//! original file names again.

use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use log::{debug, info, warn};
use regex::Regex;
use tempfile::TempDir;

use crate::archive::Archive;
use crate::error::{Error, Result};
use crate::package::PackageDocument;
use crate::path_utils::{
    extension, is_hidden_entry, natural_cmp, parent_dir, path_to_string_lossy, resolve_reference,
};
use crate::types::{ExtractedImage, ExtractionSource, PackageMetadata, is_image_extension};

/// Extension used when a referenced image has none.
const FALLBACK_EXTENSION: &str = "bin";

lazy_static! {
    /// First `<img ... src="...">`, quoted or bare.
    static ref IMG_SRC_REGEX: Regex =
        Regex::new(r#"(?is)<img\b[^>]*?\ssrc\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#).unwrap();
    /// SVG-wrapped pages: `<image xlink:href="...">` or `<svg:image href="...">`.
    static ref SVG_IMAGE_REGEX: Regex =
        Regex::new(r#"(?is)<(?:[a-z_][\w.-]*:)?image\b[^>]*?\s(?:xlink:)?href\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap();
}

/// A caller-scoped temporary directory holding extracted images.
///
/// The directory is created on construction and removed when the value is dropped, on
/// success and error paths alike. Each rebuild owns its own area, so concurrent rebuilds
/// never share files.
#[derive(Debug)]
pub struct WorkArea {
    dir: TempDir,
}

impl WorkArea {
    /// Creates a fresh, uniquely named work area inside `parent`.
    pub fn create_in(parent: &Path) -> Result<Self> {
        std::fs::create_dir_all(parent)?;
        let dir = tempfile::Builder::new()
            .prefix("mangapress-")
            .tempdir_in(parent)
            .map_err(|e| {
                Error::InvalidPath(
                    parent.to_path_buf(),
                    format!("Cannot create work area: {}", e),
                )
            })?;
        debug!("Work area created at {}", path_to_string_lossy(dir.path()));
        Ok(Self { dir })
    }

    /// Creates a work area in the system temporary directory.
    pub fn create() -> Result<Self> {
        Self::create_in(&std::env::temp_dir())
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Writes one image under its sequence number.
    pub fn store_image(
        &self,
        sequence_index: usize,
        extension: &str,
        bytes: &[u8],
    ) -> Result<ExtractedImage> {
        let source_path: PathBuf = self
            .dir
            .path()
            .join(format!("{:05}.{}", sequence_index, extension));
        std::fs::write(&source_path, bytes)?;
        Ok(ExtractedImage {
            sequence_index,
            source_path,
            extension: extension.to_string(),
        })
    }

    /// Removes the work area now, reporting failures instead of ignoring them on drop.
    pub fn close(self) -> Result<()> {
        let path = self.dir.path().to_path_buf();
        self.dir.close()?;
        debug!("Work area removed: {}", path_to_string_lossy(&path));
        Ok(())
    }
}

/// Ordered images produced by one extraction.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub images: Vec<ExtractedImage>,
    pub source: ExtractionSource,
    /// Spine items that contributed no image.
    pub skipped: usize,
}

/// Finds the first image reference in a content document's text.
///
/// HTML `<img src>` wins; an SVG `<image href>` is used only when no `<img>` exists.
pub fn find_image_reference(content: &str) -> Option<String> {
    [&*IMG_SRC_REGEX, &*SVG_IMAGE_REGEX]
        .iter()
        .find_map(|pattern| {
            let captures = pattern.captures(content)?;
            (1..=3)
                .find_map(|group| captures.get(group))
                .map(|m| m.as_str().trim().to_string())
        })
        .filter(|reference| !reference.is_empty())
}

/// Copies page images out of an archive into a [`WorkArea`].
pub struct Extractor<'w> {
    work_area: &'w WorkArea,
}

impl<'w> Extractor<'w> {
    pub fn new(work_area: &'w WorkArea) -> Self {
        Self { work_area }
    }

    /// Extracts in spine order, falling back to natural order when the spine yields
    /// nothing. Fails with [`Error::EmptyInput`] when both come up empty.
    pub fn extract<A: Archive>(
        &self,
        archive: &mut A,
        metadata: &PackageMetadata,
    ) -> Result<Extraction> {
        let (images, skipped) = self.extract_in_order(archive, metadata)?;

        if !images.is_empty() {
            info!(
                "Extracted {} images in spine order ({} items skipped)",
                images.len(),
                skipped
            );
            return Ok(Extraction {
                images,
                source: ExtractionSource::Spine,
                skipped,
            });
        }

        warn!("Spine yielded no images, falling back to natural file order");
        let images = self.extract_by_natural_order(archive)?;
        if images.is_empty() {
            return Err(Error::EmptyInput);
        }
        info!("Extracted {} images in natural order", images.len());
        Ok(Extraction {
            images,
            source: ExtractionSource::NaturalOrder,
            skipped,
        })
    }

    /// Walks the spine and copies the first image of every content document.
    ///
    /// Per-item problems (unknown id, missing document, no image, unresolvable or
    /// unreadable image) are logged and skipped. An unreadable or malformed package
    /// document yields no images rather than an error. Returns the images and the number
    /// of skipped spine items; errors only when the work area cannot be written.
    pub fn extract_in_order<A: Archive>(
        &self,
        archive: &mut A,
        metadata: &PackageMetadata,
    ) -> Result<(Vec<ExtractedImage>, usize)> {
        let Some(document) = Self::load_package_document(archive, metadata) else {
            return Ok((Vec::new(), 0));
        };

        let mut images = Vec::new();
        let mut skipped = 0;
        for id in &document.spine {
            let Some(href) = document.href(id) else {
                debug!("Spine id '{}' is not in the manifest, skipping", id);
                skipped += 1;
                continue;
            };

            match Self::read_spine_image(archive, &metadata.root_document_dir, href) {
                Ok((image_path, bytes)) => {
                    let ext = extension(&image_path).unwrap_or(FALLBACK_EXTENSION);
                    let image = self.work_area.store_image(images.len(), ext, &bytes)?;
                    debug!("Page {} <- {}", image.sequence_index, image_path);
                    images.push(image);
                }
                Err(e) if e.is_per_item() => {
                    warn!("Skipping spine item '{}': {}", id, e);
                    skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }

        Ok((images, skipped))
    }

    fn load_package_document<A: Archive>(
        archive: &mut A,
        metadata: &PackageMetadata,
    ) -> Option<PackageDocument> {
        let parsed = archive
            .read_entry_lossy(&metadata.root_document_path)
            .and_then(|text| PackageDocument::parse(&text));
        match parsed {
            Ok(document) => {
                debug!(
                    "Manifest has {} items, spine has {} entries",
                    document.manifest.len(),
                    document.spine.len()
                );
                Some(document)
            }
            Err(e) => {
                warn!(
                    "Package document '{}' unusable ({}), spine order unavailable",
                    metadata.root_document_path, e
                );
                None
            }
        }
    }

    /// Resolves one content document and its first image, returning the image's archive
    /// path and bytes. Every failure is reported as [`Error::ReferenceUnresolvable`].
    fn read_spine_image<A: Archive>(
        archive: &mut A,
        root_dir: &str,
        href: &str,
    ) -> Result<(String, Vec<u8>)> {
        let document_path = resolve_reference(root_dir, href)?;
        let content = archive
            .read_entry_lossy(&document_path)
            .map_err(|e| Error::unresolvable(&document_path, e.to_string()))?;

        let reference = find_image_reference(&content).ok_or_else(|| {
            Error::unresolvable(&document_path, "content document has no image reference")
        })?;

        // Images are anchored at the content document, not at the package root.
        let image_path = resolve_reference(parent_dir(&document_path), &reference)?;
        let bytes = archive
            .read_entry(&image_path)
            .map_err(|e| Error::unresolvable(&image_path, e.to_string()))?;

        Ok((image_path, bytes))
    }

    /// Copies every non-hidden image entry, ordered by natural comparison of its path.
    pub fn extract_by_natural_order<A: Archive>(
        &self,
        archive: &mut A,
    ) -> Result<Vec<ExtractedImage>> {
        let mut candidates: Vec<String> = archive
            .entry_names()
            .into_iter()
            .filter(|name| !is_hidden_entry(name))
            .filter(|name| extension(name).is_some_and(is_image_extension))
            .collect();
        candidates.sort_by(|a, b| natural_cmp(a, b));

        let mut images = Vec::with_capacity(candidates.len());
        for name in candidates {
            let bytes = match archive.read_entry(&name) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!("Skipping unreadable image '{}': {}", name, e);
                    continue;
                }
            };
            let ext = extension(&name).unwrap_or(FALLBACK_EXTENSION);
            images.push(self.work_area.store_image(images.len(), ext, &bytes)?);
        }
        Ok(images)
    }
}
