//! Remote storage seam for batch processing.
//!
//! The batch pipeline lists input folders, downloads books, uploads results and archives
//! processed sources through a [`StorageClient`]. Only a filesystem-backed client ships
//! with the crate; cloud backends implement the same trait.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::debug;
use tokio::fs;

use crate::error::{Error, Result};
use crate::path_utils::path_to_string_lossy;

/// A file listed in a storage folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    /// File name without any folder part.
    pub name: String,
    /// Backend-specific locator accepted by the other [`StorageClient`] methods.
    pub locator: String,
}

/// Operations the batch pipeline needs from a storage backend.
///
/// Folder and file locators are `/`-separated paths relative to the backend root.
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Lists the files directly inside `folder`. A missing folder lists as empty.
    async fn list_files(&self, folder: &str) -> Result<Vec<RemoteFile>>;

    /// Copies the remote file at `locator` to `local_path`.
    async fn download_file(&self, locator: &str, local_path: &Path) -> Result<()>;

    /// Stores `local_path` at `remote_path`, replacing any existing file.
    async fn upload_file(&self, local_path: &Path, remote_path: &str) -> Result<()>;

    /// Moves a remote file. Never overwrites: a taken destination is renamed
    /// `name (1).ext`, `name (2).ext`, and so on. Returns the final locator.
    async fn move_file(&self, from: &str, to: &str) -> Result<String>;
}

/// A [`StorageClient`] over a local directory tree.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, locator: &str) -> Result<PathBuf> {
        let mut path = self.root.clone();
        for segment in locator.split('/').filter(|s| !s.is_empty() && *s != ".") {
            if segment == ".." {
                return Err(Error::Storage(format!(
                    "Locator '{}' escapes the storage root",
                    locator
                )));
            }
            path.push(segment);
        }
        Ok(path)
    }

    fn locator_for(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .map(|relative| {
                relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/")
            })
            .unwrap_or_else(|_| path_to_string_lossy(path))
    }

    async fn ensure_parent(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

/// Returns the first of `path`, `stem (1).ext`, `stem (2).ext`, ... that does not exist.
pub(crate) async fn free_destination(path: &Path) -> Result<PathBuf> {
    if !fs::try_exists(path).await? {
        return Ok(path.to_path_buf());
    }
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut counter = 1;
    loop {
        let candidate = path.with_file_name(format!("{} ({}){}", stem, counter, extension));
        if !fs::try_exists(&candidate).await? {
            return Ok(candidate);
        }
        counter += 1;
    }
}

#[async_trait]
impl StorageClient for LocalStorage {
    async fn list_files(&self, folder: &str) -> Result<Vec<RemoteFile>> {
        let dir = self.resolve(folder)?;
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let path = entry.path();
            files.push(RemoteFile {
                name: entry.file_name().to_string_lossy().into_owned(),
                locator: self.locator_for(&path),
            });
        }
        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }

    async fn download_file(&self, locator: &str, local_path: &Path) -> Result<()> {
        let source = self.resolve(locator)?;
        Self::ensure_parent(local_path).await?;
        fs::copy(&source, local_path).await.map_err(|e| {
            Error::Storage(format!("Failed to download '{}': {}", locator, e))
        })?;
        debug!("Downloaded '{}' to {}", locator, path_to_string_lossy(local_path));
        Ok(())
    }

    async fn upload_file(&self, local_path: &Path, remote_path: &str) -> Result<()> {
        let destination = self.resolve(remote_path)?;
        Self::ensure_parent(&destination).await?;
        fs::copy(local_path, &destination).await.map_err(|e| {
            Error::Storage(format!("Failed to upload to '{}': {}", remote_path, e))
        })?;
        debug!("Uploaded {} to '{}'", path_to_string_lossy(local_path), remote_path);
        Ok(())
    }

    async fn move_file(&self, from: &str, to: &str) -> Result<String> {
        let source = self.resolve(from)?;
        let requested = self.resolve(to)?;
        Self::ensure_parent(&requested).await?;
        let destination = free_destination(&requested).await?;
        fs::rename(&source, &destination)
            .await
            .map_err(|e| Error::Storage(format!("Failed to move '{}' to '{}': {}", from, to, e)))?;
        let locator = self.locator_for(&destination);
        debug!("Moved '{}' to '{}'", from, locator);
        Ok(locator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_missing_folder_is_empty() {
        let root = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(root.path());
        assert!(storage.list_files("nope").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_move_never_overwrites() {
        let root = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(root.path());
        std::fs::create_dir_all(root.path().join("in")).unwrap();
        std::fs::create_dir_all(root.path().join("done")).unwrap();
        std::fs::write(root.path().join("in/book.epub"), b"new").unwrap();
        std::fs::write(root.path().join("done/book.epub"), b"old").unwrap();

        let moved = storage.move_file("in/book.epub", "done/book.epub").await.unwrap();
        assert_eq!(moved, "done/book (1).epub");
        assert_eq!(std::fs::read(root.path().join("done/book.epub")).unwrap(), b"old");
        assert_eq!(std::fs::read(root.path().join("done/book (1).epub")).unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_list_skips_directories() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("in/sub")).unwrap();
        std::fs::write(root.path().join("in/b.epub"), b"").unwrap();
        std::fs::write(root.path().join("in/a.epub"), b"").unwrap();

        let files = LocalStorage::new(root.path()).list_files("in").await.unwrap();
        let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a.epub", "b.epub"]);
        assert_eq!(files[0].locator, "in/a.epub");
    }

    #[test]
    fn test_resolve_rejects_parent_segments() {
        let storage = LocalStorage::new("/srv/books");
        assert!(matches!(storage.resolve("../etc"), Err(Error::Storage(_))));
    }
}
