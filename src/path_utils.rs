//! Path utilities for archive-internal paths.
//!
//! Archive entry paths are POSIX-style, archive-relative and case-sensitive. Everything in
//! this module works on plain strings and never touches the host filesystem, so resolution
//! behaves identically on every platform.

use std::cmp::Ordering;
use std::path::Path;

use percent_encoding::percent_decode_str;

use crate::error::{Error, Result};

/// Returns the directory part of an archive path, `""` for root-level entries.
pub fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(pos) => &path[..pos],
        None => "",
    }
}

/// Returns the last segment of an archive path.
pub fn file_name(path: &str) -> &str {
    match path.rfind('/') {
        Some(pos) => &path[pos + 1..],
        None => path,
    }
}

/// Returns the extension of an archive path without the dot, if any.
pub fn extension(path: &str) -> Option<&str> {
    let name = file_name(path);
    match name.rfind('.') {
        Some(0) | None => None,
        Some(pos) if pos + 1 < name.len() => Some(&name[pos + 1..]),
        Some(_) => None,
    }
}

/// Resolves `reference`, written inside a document that lives in `base_dir`, to an
/// archive path.
///
/// The reference is percent-decoded, stripped of any `#fragment` or `?query`, and
/// backslashes become forward slashes. A leading slash anchors the reference at the
/// archive root instead of `base_dir`. `.` and `..` segments are then folded away.
///
/// Returns [`Error::ReferenceUnresolvable`] when the reference is empty or when a `..`
/// would climb above the archive root.
///
/// ```
/// use mangapress::path_utils::resolve_reference;
///
/// assert_eq!(resolve_reference("OEBPS/Text", "../Images/01.jpg").unwrap(), "OEBPS/Images/01.jpg");
/// assert!(resolve_reference("OEBPS/Text", "../../../etc/x").is_err());
/// ```
pub fn resolve_reference(base_dir: &str, reference: &str) -> Result<String> {
    let without_suffix = reference
        .split(['#', '?'])
        .next()
        .unwrap_or_default()
        .trim();
    let decoded = percent_decode_str(without_suffix)
        .decode_utf8_lossy()
        .replace('\\', "/");

    if decoded.is_empty() {
        return Err(Error::unresolvable(reference, "empty reference"));
    }

    let joined = if decoded.starts_with('/') {
        decoded
    } else {
        format!("{}/{}", base_dir.replace('\\', "/"), decoded)
    };

    let mut segments: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(Error::unresolvable(
                        reference,
                        format!("escapes the archive root from '{}'", base_dir),
                    ));
                }
            }
            other => segments.push(other),
        }
    }

    if segments.is_empty() {
        return Err(Error::unresolvable(reference, "resolves to the archive root"));
    }
    Ok(segments.join("/"))
}

/// Checks if an entry's base name starts with a dot (hidden file, macOS resource fork).
pub fn is_hidden_entry(path: &str) -> bool {
    file_name(path).starts_with('.')
}

#[derive(Debug)]
enum NaturalToken<'a> {
    Text(String),
    Number(&'a str),
}

/// Splits `s` into alternating text/digit runs, always starting with a (possibly empty)
/// text run so that tokens at the same position have the same kind.
fn natural_tokens(s: &str) -> Vec<NaturalToken<'_>> {
    let mut tokens = Vec::new();
    let mut rest = s;
    loop {
        let digit_start = rest.find(|c: char| c.is_ascii_digit()).unwrap_or(rest.len());
        tokens.push(NaturalToken::Text(rest[..digit_start].to_lowercase()));
        rest = &rest[digit_start..];
        if rest.is_empty() {
            break;
        }
        let digit_end = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        tokens.push(NaturalToken::Number(&rest[..digit_end]));
        rest = &rest[digit_end..];
        if rest.is_empty() {
            break;
        }
    }
    tokens
}

/// Compares two digit runs by integer value without parsing (no overflow on long runs).
fn compare_digit_runs(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Human-natural ordering: digit runs compare as integers, text runs compare
/// case-insensitively. `page2.jpg` sorts before `page10.jpg`.
///
/// Strings that are equal under those rules fall back to plain byte order, so the result
/// is a total order and sorting is deterministic.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let a_tokens = natural_tokens(a);
    let b_tokens = natural_tokens(b);

    for (left, right) in a_tokens.iter().zip(b_tokens.iter()) {
        let ordering = match (left, right) {
            (NaturalToken::Number(x), NaturalToken::Number(y)) => compare_digit_runs(x, y),
            (NaturalToken::Text(x), NaturalToken::Text(y)) => x.cmp(y),
            // Unreachable with aligned tokenization; keep the order total anyway.
            (NaturalToken::Number(_), NaturalToken::Text(_)) => Ordering::Less,
            (NaturalToken::Text(_), NaturalToken::Number(_)) => Ordering::Greater,
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    a_tokens
        .len()
        .cmp(&b_tokens.len())
        .then_with(|| a.cmp(b))
}

/// Converts a host path to a string with fallback to lossy conversion.
pub fn path_to_string_lossy(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

/// Sanitizes a filename by replacing invalid characters with safe alternatives.
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| match c {
            '<' | '>' | '"' | '|' | '?' | '*' => '-',
            ':' => '-',
            '/' | '\\' => '-',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}
