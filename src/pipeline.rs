//! Batch processing of storage folders.
//!
//! A [`Pipeline`] walks the monitored subfolders of a storage backend and, for every
//! EPUB it finds, downloads it, optionally rebuilds it, converts it, uploads the result
//! and archives the source. One book failing never stops the batch.

use std::path::{Path, PathBuf};

use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::converter::{Converter, KEPUB_SUFFIX};
use crate::error::Result;
use crate::path_utils::sanitize_filename;
use crate::rebuilder::Rebuilder;
use crate::storage::{RemoteFile, StorageClient};

fn default_output_suffix() -> String {
    KEPUB_SUFFIX.to_string()
}

/// Folder layout and per-folder behavior of a batch run.
///
/// Loaded from JSON:
///
/// ```json
/// {
///   "input_base": "/Manga/Input",
///   "output_base": "/Manga/Output",
///   "archive_base": "/Manga/Archive",
///   "monitor_subfolders": ["001", "002"],
///   "rebuild_subfolders": ["001"]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    pub input_base: String,
    pub output_base: String,
    pub archive_base: String,
    /// Subfolders of `input_base` scanned for books, in processing order.
    pub monitor_subfolders: Vec<String>,
    /// Subfolders whose books are rebuilt before conversion. Books elsewhere are
    /// converted as they are.
    #[serde(default)]
    pub rebuild_subfolders: Vec<String>,
    #[serde(default = "default_output_suffix")]
    pub output_suffix: String,
}

impl BatchConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    fn should_rebuild(&self, subfolder: &str) -> bool {
        self.rebuild_subfolders.iter().any(|s| s == subfolder)
    }
}

/// Outcome of a batch run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    /// Source locators of books that were converted, uploaded and archived.
    pub processed: Vec<String>,
    /// Source locators of books that failed, with the reason.
    pub failed: Vec<(String, String)>,
}

/// Returns `true` for names ending in `.epub`, ignoring case.
pub fn is_epub_name(name: &str) -> bool {
    name.to_ascii_lowercase().ends_with(".epub")
}

/// Strips a trailing `.epub` (any case) from `name`.
fn book_stem(name: &str) -> &str {
    if is_epub_name(name) {
        &name[..name.len() - ".epub".len()]
    } else {
        name
    }
}

fn join_remote(base: &str, subfolder: &str, name: &str) -> String {
    format!("{}/{}/{}", base.trim_end_matches('/'), subfolder, name)
}

/// Runs batch conversions against a storage backend.
pub struct Pipeline<S: StorageClient, C: Converter> {
    storage: S,
    converter: C,
    config: BatchConfig,
    rebuilder: Rebuilder,
}

impl<S: StorageClient, C: Converter> Pipeline<S, C> {
    pub fn new(storage: S, converter: C, config: BatchConfig, rebuilder: Rebuilder) -> Self {
        Self {
            storage,
            converter,
            config,
            rebuilder,
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Processes every EPUB in every monitored subfolder, one book at a time.
    ///
    /// Fails only when the scratch directory cannot be created. Listing failures and
    /// per-book failures are logged and recorded in the report.
    pub async fn run(&self) -> Result<BatchReport> {
        let parent = self
            .rebuilder
            .work_root
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        tokio::fs::create_dir_all(&parent).await?;
        let scratch = tempfile::Builder::new()
            .prefix("mangapress-batch-")
            .tempdir_in(&parent)?;

        let mut report = BatchReport::default();
        let mut book_number = 0;

        for subfolder in &self.config.monitor_subfolders {
            let folder = format!("{}/{}", self.config.input_base.trim_end_matches('/'), subfolder);
            info!("Scanning '{}'", folder);

            let files = match self.storage.list_files(&folder).await {
                Ok(files) => files,
                Err(e) => {
                    error!("Cannot list '{}': {}", folder, e);
                    report.failed.push((folder, e.to_string()));
                    continue;
                }
            };

            for file in files.into_iter().filter(|f| is_epub_name(&f.name)) {
                book_number += 1;
                let book_dir = scratch.path().join(format!("book-{:04}", book_number));
                info!("Processing '{}'", file.name);

                match self.process_book(subfolder, &file, &book_dir).await {
                    Ok(()) => {
                        info!("Finished '{}'", file.name);
                        report.processed.push(file.locator.clone());
                    }
                    Err(e) => {
                        error!("Failed '{}': {}", file.name, e);
                        report.failed.push((file.locator.clone(), e.to_string()));
                    }
                }

                if let Err(e) = tokio::fs::remove_dir_all(&book_dir).await {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        warn!("Failed to clean up {:?}: {}", book_dir, e);
                    }
                }
            }
        }

        scratch.close()?;
        info!(
            "Batch finished: {} processed, {} failed",
            report.processed.len(),
            report.failed.len()
        );
        Ok(report)
    }

    async fn process_book(&self, subfolder: &str, file: &RemoteFile, book_dir: &Path) -> Result<()> {
        tokio::fs::create_dir_all(book_dir).await?;
        let local_name = sanitize_filename(&file.name);
        let downloaded = book_dir.join(&local_name);
        self.storage.download_file(&file.locator, &downloaded).await?;

        let to_convert: PathBuf = if self.config.should_rebuild(subfolder) {
            let rebuilt = book_dir.join(format!("rebuilt_{}", local_name));
            let report = self
                .rebuilder
                .rebuild_file_async(downloaded.clone(), rebuilt.clone())
                .await?;
            info!(
                "Rebuilt '{}' with {} pages in {} chapters",
                file.name,
                report.pages,
                report.chapters.len()
            );
            rebuilt
        } else {
            info!("Subfolder '{}' is pass-through, converting as is", subfolder);
            downloaded
        };

        let output_dir = book_dir.join("converted");
        let converted = self.converter.convert(&to_convert, &output_dir).await?;

        let target_name = format!("{}{}", book_stem(&file.name), self.config.output_suffix);
        let target = join_remote(&self.config.output_base, subfolder, &target_name);
        self.storage.upload_file(&converted, &target).await?;
        info!("Uploaded '{}'", target);

        let archive_target = join_remote(&self.config.archive_base, subfolder, &file.name);
        let archived = self.storage.move_file(&file.locator, &archive_target).await?;
        info!("Archived source as '{}'", archived);
        Ok(())
    }
}
