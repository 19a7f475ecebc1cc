//! Namespace-tolerant XML helpers.
//!
//! Real packages disagree on prefixes (`opf:item`, `item`, `ns0:itemref`), so every
//! element and attribute comparison here goes through the local name and ignores the
//! prefix. Nothing outside the `package` module touches quick-xml directly.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::Result;

/// Lookups on a start tag by local name.
pub(crate) trait LocalElement {
    fn is_local(&self, local_name: &str) -> bool;

    /// Value of the first attribute whose local name matches, entity-unescaped when possible.
    fn local_attribute(&self, local_name: &str) -> Option<String>;
}

impl LocalElement for BytesStart<'_> {
    fn is_local(&self, local_name: &str) -> bool {
        self.local_name().as_ref() == local_name.as_bytes()
    }

    fn local_attribute(&self, local_name: &str) -> Option<String> {
        self.attributes()
            .with_checks(false)
            .flatten()
            .find(|attr| attr.key.local_name().as_ref() == local_name.as_bytes())
            .map(|attr| match attr.unescape_value() {
                Ok(value) => value.into_owned(),
                Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
            })
    }
}

/// Walks every element of `xml` in document order.
///
/// `visit` receives the local names of the open ancestors (outermost first) and the
/// element's start tag. Self-closing elements are visited like any other element.
/// Malformed XML is reported as [`crate::error::Error::Xml`].
pub(crate) fn visit_elements<F>(xml: &str, mut visit: F) -> Result<()>
where
    F: FnMut(&[String], &BytesStart<'_>),
{
    let mut reader = Reader::from_str(xml.trim_start_matches('\u{feff}'));
    reader.config_mut().trim_text(true);

    let mut ancestors: Vec<String> = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Start(element) => {
                visit(&ancestors, &element);
                ancestors.push(String::from_utf8_lossy(element.local_name().as_ref()).into_owned());
            }
            Event::Empty(element) => visit(&ancestors, &element),
            Event::End(_) => {
                ancestors.pop();
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(())
}
