//! Read access to e-book container archives.
//!
//! The rebuild pipeline only needs two things from an input container: the flat list of
//! entry paths and the bytes stored under one path. [`Archive`] captures exactly that, so
//! the inspector and the extractors work the same way over a zip file on disk
//! ([`ZipSource`]) or over entries already held in memory ([`MemoryArchive`]).

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, Write};
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{Error, Result};
use crate::path_utils::path_to_string_lossy;

/// A container exposing its entry paths and per-path byte reads.
///
/// Entry paths are POSIX-style, archive-relative and case-sensitive.
pub trait Archive {
    /// All file entries in archive order. Directory entries are not listed.
    fn entry_names(&self) -> Vec<String>;

    /// Reads the full content of the entry at `path`.
    fn read_entry(&mut self, path: &str) -> Result<Vec<u8>>;

    /// Returns `true` when a file entry exists at `path`.
    fn contains(&self, path: &str) -> bool {
        self.entry_names().iter().any(|name| name == path)
    }

    /// Reads the entry at `path` as text, replacing invalid UTF-8 sequences.
    fn read_entry_lossy(&mut self, path: &str) -> Result<String> {
        let bytes = self.read_entry(path)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// An [`Archive`] backed by a zip reader.
pub struct ZipSource<R: Read + Seek> {
    zip: ZipArchive<R>,
}

impl ZipSource<BufReader<File>> {
    /// Opens the zip archive at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to open archive '{}': {}", path_to_string_lossy(path), e),
            ))
        })?;
        Self::new(BufReader::new(file))
    }
}

impl<R: Read + Seek> ZipSource<R> {
    pub fn new(reader: R) -> Result<Self> {
        Ok(Self {
            zip: ZipArchive::new(reader)?,
        })
    }
}

impl<R: Read + Seek> Archive for ZipSource<R> {
    fn entry_names(&self) -> Vec<String> {
        // `file_names` iterates a hash map; index order is the central directory order.
        (0..self.zip.len())
            .filter_map(|index| self.zip.name_for_index(index))
            .filter(|name| !name.ends_with('/'))
            .map(|name| name.to_string())
            .collect()
    }

    fn read_entry(&mut self, path: &str) -> Result<Vec<u8>> {
        let mut entry = self.zip.by_name(path)?;
        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut bytes)?;
        Ok(bytes)
    }

    fn contains(&self, path: &str) -> bool {
        self.zip.index_for_name(path).is_some()
    }
}

/// An in-memory [`Archive`], listing entries in insertion order.
#[derive(Debug, Clone, Default)]
pub struct MemoryArchive {
    order: Vec<String>,
    entries: BTreeMap<String, Vec<u8>>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the entry at `path`. Replacing keeps the original position.
    pub fn insert(&mut self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) -> &mut Self {
        let path = path.into();
        if !self.entries.contains_key(&path) {
            self.order.push(path.clone());
        }
        self.entries.insert(path, bytes.into());
        self
    }

    /// Serializes the entries into a zip archive, deflating everything except a root
    /// `mimetype` entry, which is stored.
    pub fn to_zip_bytes(&self) -> Result<Vec<u8>> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

        for name in &self.order {
            let options = if name == "mimetype" { stored } else { deflated };
            zip.start_file(name.as_str(), options)?;
            zip.write_all(&self.entries[name])?;
        }
        Ok(zip.finish()?.into_inner())
    }
}

impl Archive for MemoryArchive {
    fn entry_names(&self) -> Vec<String> {
        self.order.clone()
    }

    fn read_entry(&mut self, path: &str) -> Result<Vec<u8>> {
        self.entries
            .get(path)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Archive entry '{}'", path)))
    }

    fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_archive_replace_keeps_position() {
        let mut archive = MemoryArchive::new();
        archive
            .insert("mimetype", "application/epub+zip")
            .insert("a.xhtml", "first")
            .insert("mimetype", "application/epub+zip");

        assert_eq!(archive.entry_names(), vec!["mimetype", "a.xhtml"]);
        assert_eq!(archive.read_entry("a.xhtml").unwrap(), b"first");
        assert!(matches!(archive.read_entry("missing"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_zip_source_reads_memory_archive_bytes() {
        let mut archive = MemoryArchive::new();
        archive
            .insert("mimetype", "application/epub+zip")
            .insert("OEBPS/content.opf", "<package/>");
        let bytes = archive.to_zip_bytes().unwrap();

        let mut source = ZipSource::new(Cursor::new(bytes)).unwrap();
        assert_eq!(source.entry_names(), vec!["mimetype", "OEBPS/content.opf"]);
        assert!(source.contains("OEBPS/content.opf"));
        assert_eq!(source.read_entry_lossy("OEBPS/content.opf").unwrap(), "<package/>");
    }
}
