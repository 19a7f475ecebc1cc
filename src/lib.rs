//! Mangapress - Manga EPUB Rebuilding Library
//!
//! Comic and manga EPUBs often come with broken navigation, pages whose file names do
//! not match reading order, and content documents full of wrappers that e-readers render
//! badly. This crate rebuilds such a book into a clean, image-only EPUB: it follows the
//! package spine to recover authored page order, copies one image per page, and writes a
//! fresh package with a chapter entry every N pages.
//!
//! # Getting Started
//!
//! ```rust,no_run
//! use mangapress::prelude::*;
//! use std::path::Path;
//!
//! fn main() -> mangapress::error::Result<()> {
//!     // 1. Describe the output
//!     let style = StyleConfig {
//!         pages_per_chapter: 25,
//!         ..Default::default()
//!     };
//!
//!     // 2. Configure the rebuild
//!     let rebuilder = Rebuilder::builder()
//!         .style(style)
//!         .reading_direction(Direction::Rtl)
//!         .language("ja")
//!         .build()?;
//!
//!     // 3. Rebuild
//!     let report = rebuilder.rebuild_file(Path::new("volume01.epub"), Path::new("volume01.rebuilt.epub"))?;
//!     println!("{} pages from {:?} order", report.pages, report.source);
//!     Ok(())
//! }
//! ```
//!
//! For unattended processing of whole storage folders, see [`pipeline::Pipeline`].

pub mod archive;
pub mod converter;
pub mod error;
pub mod extractor;
pub mod generator;
pub mod package;
pub mod path_utils;
pub mod pipeline;
pub mod rebuilder;
pub mod storage;
pub mod types;

pub use rebuilder::Rebuilder;
pub use rebuilder::RebuilderBuilder;

// Re-export error and core types for direct access
pub use types::{
    Direction, ExtractedImage, ExtractionSource, PackageMetadata, RebuildReport, StyleConfig,
};

/// Prelude module for convenient imports.
///
/// Brings the rebuild entry point, its configuration types and the batch pipeline
/// into scope with a single `use mangapress::prelude::*;`.
pub mod prelude {
    pub use super::{
        Direction, ExtractedImage, ExtractionSource, PackageMetadata, RebuildReport, Rebuilder,
        RebuilderBuilder, StyleConfig,
    };
    pub use crate::archive::{Archive, MemoryArchive, ZipSource};
    pub use crate::converter::{Converter, ExternalConverter};
    pub use crate::error::{Error, Result};
    pub use crate::pipeline::{BatchConfig, BatchReport, Pipeline};
    pub use crate::storage::{LocalStorage, RemoteFile, StorageClient};
}
