//! Core data types for the mangapress rebuild pipeline.
//!
//! This module defines the fundamental data structures used throughout mangapress:
//! - Package-level facts discovered in an input archive (`PackageMetadata`)
//! - Extracted page images and where they came from (`ExtractedImage`, `ExtractionSource`)
//! - Output styling and chaptering options (`StyleConfig`, `Direction`)
//! - The outcome of one rebuild (`RebuildReport`)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Title written to the output when the input's title cannot be extracted.
pub const PLACEHOLDER_TITLE: &str = "Unknown Manga";
/// Creator written to the output when the input's creator cannot be extracted.
pub const PLACEHOLDER_AUTHOR: &str = "Unknown Author";

/// Image extensions recognized by the extractors, lowercase.
pub const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "webp", "gif"];

/// Facts about an input archive's package, gathered once per rebuild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageMetadata {
    /// Archive path of the package document, e.g. `OEBPS/content.opf`.
    pub root_document_path: String,
    /// Directory of the package document (`""` when it sits at the archive root).
    pub root_document_dir: String,
    pub title: String,
    pub author: String,
}

impl PackageMetadata {
    /// Creates metadata for the package document at `root_document_path`,
    /// with placeholder title and author.
    pub fn new(root_document_path: impl Into<String>) -> Self {
        let root_document_path = root_document_path.into();
        let root_document_dir = crate::path_utils::parent_dir(&root_document_path).to_string();
        Self {
            root_document_path,
            root_document_dir,
            title: PLACEHOLDER_TITLE.to_string(),
            author: PLACEHOLDER_AUTHOR.to_string(),
        }
    }
}

/// One page image copied out of the input archive into a scoped work area.
///
/// `sequence_index` is the only ordering key used by the rebuild; the original
/// archive file name is deliberately not kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedImage {
    pub sequence_index: usize,
    pub source_path: PathBuf,
    /// Extension without the leading dot, as found on the original entry.
    pub extension: String,
}

impl ExtractedImage {
    /// Media type of the image, derived from its extension.
    pub fn media_type(&self) -> &'static str {
        image_media_type(&self.extension)
    }
}

/// Which extractor produced the page sequence of a rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtractionSource {
    /// Pages follow the package spine (authored reading order).
    Spine,
    /// The spine yielded nothing; pages follow natural file-name order.
    NaturalOrder,
}

/// Defines the page progression direction written to the output spine.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Copy, Default)]
pub enum Direction {
    #[default]
    Ltr,
    Rtl,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Ltr => f.write_str("ltr"),
            Direction::Rtl => f.write_str("rtl"),
        }
    }
}

fn default_pages_per_chapter() -> usize {
    20
}

fn default_chapter_template() -> String {
    "({start}-{end})".to_string()
}

fn default_css_rules() -> Vec<String> {
    vec![
        "html, body { margin: 0; padding: 0; background: #000; }".to_string(),
        "div.page { width: 100%; height: 100%; text-align: center; }".to_string(),
        "img { display: block; width: 100%; height: auto; margin: 0 auto; }".to_string(),
    ]
}

/// Styling and chaptering rules for a rebuild.
///
/// Deserializes from the same JSON shape the style files use:
///
/// ```json
/// { "pages_per_chapter": 20, "chapter_template": "({start}-{end})", "css_rules": ["img { width: 100%; }"] }
/// ```
///
/// Every key is optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleConfig {
    #[serde(default = "default_pages_per_chapter")]
    pub pages_per_chapter: usize,
    /// Chapter label with `{start}` and `{end}` placeholders (1-based, inclusive).
    #[serde(default = "default_chapter_template", rename = "chapter_template")]
    pub chapter_title_template: String,
    #[serde(default = "default_css_rules")]
    pub css_rules: Vec<String>,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            pages_per_chapter: default_pages_per_chapter(),
            chapter_title_template: default_chapter_template(),
            css_rules: default_css_rules(),
        }
    }
}

impl StyleConfig {
    /// Parses a style from JSON text and validates it.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let style: StyleConfig = serde_json::from_str(json)?;
        style.validate()?;
        Ok(style)
    }

    /// Reads and parses a JSON style file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.pages_per_chapter == 0 {
            return Err(Error::Unsupported(
                "pages_per_chapter must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Fills the chapter template for the 1-based inclusive page range.
    pub fn chapter_label(&self, start: usize, end: usize) -> String {
        self.chapter_title_template
            .replace("{start}", &start.to_string())
            .replace("{end}", &end.to_string())
    }

    /// The shared stylesheet content.
    pub fn stylesheet(&self) -> String {
        self.css_rules.join("\n")
    }
}

/// Outcome of a successful rebuild.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebuildReport {
    /// Number of pages (and images) written.
    pub pages: usize,
    /// Navigation labels, one per chapter boundary, in order.
    pub chapters: Vec<String>,
    pub source: ExtractionSource,
    /// Spine items skipped because they had no usable image.
    pub skipped: usize,
    pub metadata: PackageMetadata,
}

/// Returns `true` when `extension` (without dot) is a recognized image extension.
pub fn is_image_extension(extension: &str) -> bool {
    IMAGE_EXTENSIONS
        .iter()
        .any(|known| known.eq_ignore_ascii_case(extension))
}

/// Maps an image extension (without dot) to its media type.
pub fn image_media_type(extension: &str) -> &'static str {
    match extension.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => "application/octet-stream",
    }
}
