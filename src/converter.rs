//! External conversion step applied to each book after rebuilding.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::{debug, info};
use tokio::process::Command;

use crate::error::{Error, Result};
use crate::path_utils::path_to_string_lossy;

/// Default suffix of converted files.
pub const KEPUB_SUFFIX: &str = ".kepub.epub";

/// Converts one EPUB into a reader-specific variant.
#[async_trait]
pub trait Converter: Send + Sync {
    /// Converts `input`, writing the result into `output_dir`, and returns the path of
    /// the produced file.
    async fn convert(&self, input: &Path, output_dir: &Path) -> Result<PathBuf>;
}

/// A [`Converter`] running an external command line tool such as `kepubify`.
///
/// The tool is invoked as `program [args] -o <output_dir> <input>`.
#[derive(Debug, Clone)]
pub struct ExternalConverter {
    pub program: String,
    pub args: Vec<String>,
    /// Suffix identifying the produced file inside the output directory.
    pub output_suffix: String,
}

impl Default for ExternalConverter {
    fn default() -> Self {
        Self {
            program: "kepubify".to_string(),
            args: Vec::new(),
            output_suffix: KEPUB_SUFFIX.to_string(),
        }
    }
}

impl ExternalConverter {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    /// Finds the single file in `output_dir` ending with the output suffix.
    pub async fn find_output(&self, output_dir: &Path) -> Result<PathBuf> {
        let suffix = self.output_suffix.to_ascii_lowercase();
        let mut matches = Vec::new();
        let mut entries = tokio::fs::read_dir(output_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_ascii_lowercase();
            if name.ends_with(&suffix) && entry.file_type().await?.is_file() {
                matches.push(entry.path());
            }
        }

        match matches.len() {
            1 => Ok(matches.remove(0)),
            0 => Err(Error::Conversion(format!(
                "No '*{}' file produced in {}",
                self.output_suffix,
                path_to_string_lossy(output_dir)
            ))),
            n => Err(Error::Conversion(format!(
                "{} '*{}' files found in {}, expected one",
                n,
                self.output_suffix,
                path_to_string_lossy(output_dir)
            ))),
        }
    }
}

#[async_trait]
impl Converter for ExternalConverter {
    async fn convert(&self, input: &Path, output_dir: &Path) -> Result<PathBuf> {
        tokio::fs::create_dir_all(output_dir).await?;
        debug!(
            "Running {} {:?} -o {} {}",
            self.program,
            self.args,
            path_to_string_lossy(output_dir),
            path_to_string_lossy(input)
        );

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg("-o")
            .arg(output_dir)
            .arg(input)
            .output()
            .await
            .map_err(|e| Error::Conversion(format!("Failed to run '{}': {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Conversion(format!(
                "'{}' exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        let produced = self.find_output(output_dir).await?;
        info!("Converted to {}", path_to_string_lossy(&produced));
        Ok(produced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_find_output_requires_exactly_one_match() {
        let dir = tempfile::tempdir().unwrap();
        let converter = ExternalConverter::default();
        assert!(matches!(
            converter.find_output(dir.path()).await,
            Err(Error::Conversion(_))
        ));

        std::fs::write(dir.path().join("book.kepub.epub"), b"").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"").unwrap();
        let found = converter.find_output(dir.path()).await.unwrap();
        assert_eq!(found, dir.path().join("book.kepub.epub"));

        std::fs::write(dir.path().join("other.kepub.epub"), b"").unwrap();
        assert!(matches!(
            converter.find_output(dir.path()).await,
            Err(Error::Conversion(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_program_is_conversion_error() {
        let dir = tempfile::tempdir().unwrap();
        let converter = ExternalConverter::new("mangapress-no-such-tool");
        let result = converter
            .convert(&dir.path().join("in.epub"), &dir.path().join("out"))
            .await;
        assert!(matches!(result, Err(Error::Conversion(_))));
    }
}
