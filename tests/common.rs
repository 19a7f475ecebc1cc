//! Common test utilities for the mangapress crate.
//!
//! Provides builders for synthetic input EPUBs, dummy JPEG bytes, unique scratch
//! directories, and readers for generated output.

use image::{ImageFormat, Rgb, RgbImage};
use mangapress::archive::{Archive, MemoryArchive, ZipSource};
use rand::{Rng, distributions::Alphanumeric};
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

#[allow(dead_code)]
pub const TEST_TMP_DIR: &str = "tests/tmp";

/// Creates a fresh, uniquely named scratch directory under [`TEST_TMP_DIR`].
#[allow(dead_code)]
pub fn setup_test_dir(sub_path: &str) -> PathBuf {
    let rand_string: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();
    let test_dir = PathBuf::from(TEST_TMP_DIR).join(format!("{}-{}", sub_path, rand_string));
    if test_dir.exists() {
        std::fs::remove_dir_all(&test_dir).unwrap();
    }
    std::fs::create_dir_all(&test_dir).unwrap();
    test_dir
}

/// Removes a scratch directory created by [`setup_test_dir`].
#[allow(dead_code)]
pub fn cleanup_test_dir(path: &Path) {
    let _ = std::fs::remove_dir_all(path);
}

/// Encodes a small solid-color JPEG. Different seeds give different bytes.
#[allow(dead_code)]
pub fn dummy_jpeg(seed: u8) -> Vec<u8> {
    let color = Rgb([
        seed.wrapping_mul(60),
        255 - seed.wrapping_mul(60),
        seed.wrapping_mul(25),
    ]);
    let img = RgbImage::from_pixel(16, 16, color);
    let mut bytes = Cursor::new(Vec::new());
    img.write_to(&mut bytes, ImageFormat::Jpeg).unwrap();
    bytes.into_inner()
}

#[allow(dead_code)]
pub fn container_xml(rootfile: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="{}" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#,
        rootfile
    )
}

/// A content document showing one image.
#[allow(dead_code)]
pub fn page_xhtml(image_src: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml"><head><title>p</title></head>
<body><div class="wrap"><img src="{}" alt=""/></div></body></html>"#,
        image_src
    )
}

/// A package document with the given manifest `(id, href)` items and spine idrefs.
#[allow(dead_code)]
pub fn package_opf(
    title: Option<&str>,
    creator: Option<&str>,
    items: &[(String, String)],
    spine: &[String],
) -> String {
    let mut metadata = String::new();
    if let Some(title) = title {
        metadata.push_str(&format!("<dc:title>{}</dc:title>", title));
    }
    if let Some(creator) = creator {
        metadata.push_str(&format!("<dc:creator>{}</dc:creator>", creator));
    }
    let manifest: String = items
        .iter()
        .map(|(id, href)| {
            format!(
                r#"<item id="{}" href="{}" media-type="application/xhtml+xml"/>"#,
                id, href
            )
        })
        .collect();
    let spine: String = spine
        .iter()
        .map(|id| format!(r#"<itemref idref="{}"/>"#, id))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0">
<metadata xmlns:dc="http://purl.org/dc/elements/1.1/">{}</metadata>
<manifest>{}</manifest>
<spine>{}</spine>
</package>"#,
        metadata, manifest, spine
    )
}

/// Builds a typical publisher layout: `OEBPS/content.opf`, one content document per
/// image under `OEBPS/Text/`, images under `OEBPS/Images/{k}.jpg` with `dummy_jpeg(k)`.
///
/// `spine_order` lists image numbers in reading order; archive and file-name order
/// stay ascending.
#[allow(dead_code)]
pub fn spine_book(title: Option<&str>, creator: Option<&str>, spine_order: &[u8]) -> MemoryArchive {
    let mut numbers: Vec<u8> = spine_order.to_vec();
    numbers.sort_unstable();

    let items: Vec<(String, String)> = numbers
        .iter()
        .map(|k| (format!("p{}", k), format!("Text/page{}.xhtml", k)))
        .collect();
    let spine: Vec<String> = spine_order.iter().map(|k| format!("p{}", k)).collect();

    let mut archive = MemoryArchive::new();
    archive
        .insert("mimetype", "application/epub+zip")
        .insert("META-INF/container.xml", container_xml("OEBPS/content.opf"))
        .insert("OEBPS/content.opf", package_opf(title, creator, &items, &spine));
    for k in &numbers {
        archive.insert(
            format!("OEBPS/Text/page{}.xhtml", k),
            page_xhtml(&format!("../Images/{}.jpg", k)),
        );
    }
    for k in &numbers {
        archive.insert(format!("OEBPS/Images/{}.jpg", k), dummy_jpeg(*k));
    }
    archive
}

/// Writes `archive` as a zip file at `path`.
#[allow(dead_code)]
pub fn write_epub(archive: &MemoryArchive, path: &Path) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, archive.to_zip_bytes().unwrap()).unwrap();
}

/// Reads the entry `name` of the zip file at `path`.
#[allow(dead_code)]
pub fn read_zip_entry(path: &Path, name: &str) -> Vec<u8> {
    let mut source = ZipSource::open(path).unwrap();
    source.read_entry(name).unwrap()
}

#[allow(dead_code)]
pub fn read_zip_text(path: &Path, name: &str) -> String {
    String::from_utf8(read_zip_entry(path, name)).unwrap()
}

/// Page images of a generated book, in page order.
#[allow(dead_code)]
pub fn output_images(path: &Path, pages: usize) -> Vec<Vec<u8>> {
    (0..pages)
        .map(|index| read_zip_entry(path, &format!("OEBPS/Images/img_{}.jpg", index)))
        .collect()
}

/// Name and compression of the first local entry of a zip file.
#[allow(dead_code)]
pub fn first_entry(path: &Path) -> (String, zip::CompressionMethod, String) {
    let file = std::fs::File::open(path).unwrap();
    let mut zip = zip::ZipArchive::new(file).unwrap();
    let mut entry = zip.by_index(0).unwrap();
    let mut content = String::new();
    entry.read_to_string(&mut content).unwrap();
    (entry.name().to_string(), entry.compression(), content)
}
