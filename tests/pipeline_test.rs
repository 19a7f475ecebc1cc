//! Batch pipeline tests over a local storage tree with a stand-in converter.

use async_trait::async_trait;
use mangapress::error::{Error, Result};
use mangapress::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::timeout;

mod common;
use common::{cleanup_test_dir, read_zip_text, setup_test_dir, spine_book};

const PIPELINE_TIMEOUT: Duration = Duration::from_secs(60);

/// Copies its input to `<output_dir>/<stem>.kepub.epub`, or fails for names containing
/// "reject".
struct CopyConverter;

#[async_trait]
impl Converter for CopyConverter {
    async fn convert(&self, input: &Path, output_dir: &Path) -> Result<PathBuf> {
        let name = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if name.contains("reject") {
            return Err(Error::Conversion(format!("refused {}", name)));
        }
        tokio::fs::create_dir_all(output_dir).await?;
        let stem = name.trim_end_matches(".epub");
        let output = output_dir.join(format!("{}.kepub.epub", stem));
        tokio::fs::copy(input, &output).await?;
        Ok(output)
    }
}

fn config() -> BatchConfig {
    BatchConfig::from_json_str(
        r#"{
            "input_base": "in",
            "output_base": "out",
            "archive_base": "done",
            "monitor_subfolders": ["001", "002", "003"],
            "rebuild_subfolders": ["001"]
        }"#,
    )
    .unwrap()
}

#[tokio::test]
async fn test_pipeline_rebuilds_converts_and_archives() {
    let dir = setup_test_dir("pipeline");
    let remote = dir.join("remote");

    let rebuilt_source = spine_book(Some("Rebuilt"), None, &[2, 1]).to_zip_bytes().unwrap();
    let passthrough_source = spine_book(Some("Kept"), None, &[1]).to_zip_bytes().unwrap();
    std::fs::create_dir_all(remote.join("in/001")).unwrap();
    std::fs::create_dir_all(remote.join("in/002")).unwrap();
    std::fs::write(remote.join("in/001/Vol 01.EPUB"), &rebuilt_source).unwrap();
    std::fs::write(remote.join("in/001/broken.epub"), b"not a zip").unwrap();
    std::fs::write(remote.join("in/002/Vol 02.epub"), &passthrough_source).unwrap();
    std::fs::write(remote.join("in/002/reject.epub"), &passthrough_source).unwrap();
    std::fs::write(remote.join("in/002/readme.txt"), b"ignored").unwrap();

    let rebuilder = Rebuilder::builder()
        .work_root(dir.join("work"))
        .build()
        .unwrap();
    let pipeline = Pipeline::new(LocalStorage::new(&remote), CopyConverter, config(), rebuilder);

    let report = timeout(PIPELINE_TIMEOUT, pipeline.run())
        .await
        .expect("Test timed out")
        .unwrap();

    assert_eq!(report.processed, vec!["in/001/Vol 01.EPUB", "in/002/Vol 02.epub"]);
    let failed: Vec<&str> = report.failed.iter().map(|(locator, _)| locator.as_str()).collect();
    assert_eq!(failed, vec!["in/001/broken.epub", "in/002/reject.epub"]);

    // Rebuilt folder: the uploaded book has the regenerated layout.
    let rebuilt = remote.join("out/001/Vol 01.kepub.epub");
    assert!(read_zip_text(&rebuilt, "OEBPS/content.opf").contains("<dc:title>Rebuilt</dc:title>"));
    assert!(read_zip_text(&rebuilt, "OEBPS/Text/page_0002.xhtml").contains("img_1.jpg"));

    // Pass-through folder: the uploaded book is the source, byte for byte.
    let converted = std::fs::read(remote.join("out/002/Vol 02.kepub.epub")).unwrap();
    assert_eq!(converted, passthrough_source);

    // Sources are archived only on success.
    assert!(remote.join("done/001/Vol 01.EPUB").exists());
    assert!(remote.join("done/002/Vol 02.epub").exists());
    assert!(!remote.join("in/001/Vol 01.EPUB").exists());
    assert!(remote.join("in/001/broken.epub").exists());
    assert!(remote.join("in/002/reject.epub").exists());
    assert!(remote.join("in/002/readme.txt").exists());

    // Scratch space is gone.
    assert_eq!(std::fs::read_dir(dir.join("work")).unwrap().count(), 0);
    cleanup_test_dir(&dir);
}

#[tokio::test]
async fn test_pipeline_archives_without_overwriting() {
    let dir = setup_test_dir("pipeline_archive");
    let remote = dir.join("remote");
    let source = spine_book(Some("Again"), None, &[1]).to_zip_bytes().unwrap();
    std::fs::create_dir_all(remote.join("in/002")).unwrap();
    std::fs::create_dir_all(remote.join("done/002")).unwrap();
    std::fs::write(remote.join("in/002/Book.epub"), &source).unwrap();
    std::fs::write(remote.join("done/002/Book.epub"), b"earlier run").unwrap();

    let rebuilder = Rebuilder::builder()
        .work_root(dir.join("work"))
        .build()
        .unwrap();
    let pipeline = Pipeline::new(LocalStorage::new(&remote), CopyConverter, config(), rebuilder);
    let report = pipeline.run().await.unwrap();

    assert_eq!(report.processed.len(), 1);
    assert_eq!(std::fs::read(remote.join("done/002/Book.epub")).unwrap(), b"earlier run");
    assert_eq!(std::fs::read(remote.join("done/002/Book (1).epub")).unwrap(), source);
    cleanup_test_dir(&dir);
}
