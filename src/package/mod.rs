//! Package Inspector: finds and reads the package document of an e-book container.
//!
//! Discovery is two-tiered on purpose. The rootfile pointer in `META-INF/container.xml`
//! is parsed as strict XML; if that fails for any reason the entry list is scanned for
//! the first `.opf` file instead. Title and creator are likewise pulled from the raw
//! package text with tolerant patterns, because a package document that a strict parser
//! rejects can still name its book and still point at recoverable pages.

use std::collections::HashMap;

use lazy_static::lazy_static;
use log::{debug, info, warn};
use regex::Regex;

use crate::archive::Archive;
use crate::error::{Error, Result};
use crate::path_utils::is_hidden_entry;
use crate::types::PackageMetadata;

pub(crate) mod xml;

use xml::{LocalElement, visit_elements};

/// Fixed location of the root pointer document.
pub const CONTAINER_PATH: &str = "META-INF/container.xml";
/// Extension identifying a package document during the lenient scan.
pub const PACKAGE_EXTENSION: &str = ".opf";

lazy_static! {
    /// `<title>` / `<dc:title>` / `<x:title lang="..">` with any attributes.
    static ref TITLE_REGEX: Regex =
        Regex::new(r"(?is)<(?:[a-z_][\w.-]*:)?title\b[^>]*>(.*?)</(?:[a-z_][\w.-]*:)?title\s*>").unwrap();
    /// `<creator>` / `<dc:creator opf:role="aut">` with any attributes.
    static ref CREATOR_REGEX: Regex =
        Regex::new(r"(?is)<(?:[a-z_][\w.-]*:)?creator\b[^>]*>(.*?)</(?:[a-z_][\w.-]*:)?creator\s*>").unwrap();
    static ref CDATA_REGEX: Regex = Regex::new(r"(?s)<!\[CDATA\[(.*?)\]\]>").unwrap();
    static ref TAG_REGEX: Regex = Regex::new(r"<[^>]*>").unwrap();
    static ref WHITESPACE_REGEX: Regex = Regex::new(r"\s+").unwrap();
}

/// Manifest of a package: item id to href (relative to the package document's directory).
pub type Manifest = HashMap<String, String>;

/// Structural view of a package document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageDocument {
    pub manifest: Manifest,
    /// Item ids in authored reading order.
    pub spine: Vec<String>,
}

impl PackageDocument {
    /// Parses the manifest and spine of a package document.
    ///
    /// `item` elements count only directly under `manifest`, `itemref` elements only
    /// directly under `spine`, both matched by local name. Duplicate ids are last-write-wins.
    pub fn parse(xml: &str) -> Result<Self> {
        let mut document = PackageDocument::default();

        visit_elements(xml, |ancestors, element| {
            let parent = ancestors.last().map(String::as_str);
            if parent == Some("manifest") && element.is_local("item") {
                match (element.local_attribute("id"), element.local_attribute("href")) {
                    (Some(id), Some(href)) => {
                        document.manifest.insert(id, href);
                    }
                    _ => debug!("Ignoring manifest item without id or href"),
                }
            } else if parent == Some("spine") && element.is_local("itemref") {
                if let Some(idref) = element.local_attribute("idref") {
                    document.spine.push(idref);
                }
            }
        })?;

        Ok(document)
    }

    /// Looks up the href of a spine id.
    pub fn href(&self, id: &str) -> Option<&str> {
        self.manifest.get(id).map(String::as_str)
    }
}

/// Locates the package document and reads the book's title and author.
///
/// Fails with [`Error::Structure`] only when neither the rootfile pointer nor any
/// `.opf` entry can be found. Missing metadata falls back to placeholders.
pub fn inspect<A: Archive>(archive: &mut A) -> Result<PackageMetadata> {
    let root_document_path = match find_rootfile(archive) {
        Ok(path) => path,
        Err(e) => {
            warn!(
                "Rootfile pointer unusable ({}), scanning for a '{}' entry",
                e, PACKAGE_EXTENSION
            );
            find_package_by_extension(archive).ok_or_else(|| {
                Error::Structure(format!(
                    "no rootfile pointer and no '{}' entry in the archive",
                    PACKAGE_EXTENSION
                ))
            })?
        }
    };
    info!("Package document: {}", root_document_path);

    let mut metadata = PackageMetadata::new(root_document_path);
    match archive.read_entry_lossy(&metadata.root_document_path) {
        Ok(text) => {
            let (title, author) = extract_metadata_lenient(&text);
            if let Some(title) = title {
                metadata.title = title;
            }
            if let Some(author) = author {
                metadata.author = author;
            }
        }
        Err(e) => warn!(
            "Could not read package document '{}' for metadata: {}",
            metadata.root_document_path, e
        ),
    }
    debug!("Title: '{}', author: '{}'", metadata.title, metadata.author);

    Ok(metadata)
}

/// Strict tier: reads `META-INF/container.xml` and returns the rootfile's full path.
fn find_rootfile<A: Archive>(archive: &mut A) -> Result<String> {
    let container = archive.read_entry_lossy(CONTAINER_PATH)?;
    let path = parse_rootfile(&container)?;
    if !archive.contains(&path) {
        return Err(Error::NotFound(format!(
            "rootfile '{}' is not in the archive",
            path
        )));
    }
    Ok(path)
}

/// Extracts the first rootfile `full-path` from a container document.
pub fn parse_rootfile(container_xml: &str) -> Result<String> {
    let mut full_path = None;
    visit_elements(container_xml, |_, element| {
        if full_path.is_none() && element.is_local("rootfile") {
            full_path = element
                .local_attribute("full-path")
                .map(|path| path.trim().trim_start_matches('/').to_string())
                .filter(|path| !path.is_empty());
        }
    })?;
    full_path.ok_or_else(|| Error::Structure("container has no rootfile full-path".to_string()))
}

/// Lenient tier: first non-hidden entry with the package-document extension.
fn find_package_by_extension<A: Archive>(archive: &A) -> Option<String> {
    archive.entry_names().into_iter().find(|name| {
        !is_hidden_entry(name) && name.to_ascii_lowercase().ends_with(PACKAGE_EXTENSION)
    })
}

/// Pulls title and creator out of raw package text without XML parsing.
///
/// Accepts any namespace prefix and attribute order. Inner markup is dropped,
/// entities are unescaped and whitespace is collapsed; an empty result counts as absent.
pub fn extract_metadata_lenient(text: &str) -> (Option<String>, Option<String>) {
    (
        first_element_text(&TITLE_REGEX, text),
        first_element_text(&CREATOR_REGEX, text),
    )
}

fn first_element_text(pattern: &Regex, text: &str) -> Option<String> {
    let raw = pattern.captures(text)?.get(1)?.as_str();
    let without_cdata = CDATA_REGEX.replace_all(raw, "$1");
    let without_tags = TAG_REGEX.replace_all(&without_cdata, "");
    let unescaped = match quick_xml::escape::unescape(&without_tags) {
        Ok(value) => value.into_owned(),
        Err(_) => without_tags.to_string(),
    };
    let collapsed = WHITESPACE_REGEX.replace_all(unescaped.trim(), " ").into_owned();
    (!collapsed.is_empty()).then_some(collapsed)
}
