//! HTML link extraction
//!
//! Reports every reference the crawler may need to archive a page
//! faithfully: anchors and image maps, stylesheets and other `<link>`
//! targets, images, scripts, frames and embedded media.

use super::{read_to_string, resolve, ParseError};
use scraper::{Html, Selector};
use std::io::BufRead;
use url::Url;

/// Elements and the attribute holding their reference
const LINK_ATTRIBUTES: &[(&str, &str)] = &[
    ("a[href]", "href"),
    ("area[href]", "href"),
    ("link[href]", "href"),
    ("img[src]", "src"),
    ("script[src]", "src"),
    ("frame[src]", "src"),
    ("iframe[src]", "src"),
    ("embed[src]", "src"),
    ("source[src]", "src"),
    ("body[background]", "background"),
];

/// Extracts links from HTML documents
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlParser;

impl HtmlParser {
    /// Extracts links from an HTML document
    ///
    /// Relative references are resolved against `<base href>` when the
    /// document has one, otherwise against `base`.
    ///
    /// # Exclusions
    ///
    /// - `javascript:`, `mailto:`, `tel:` and `data:` references
    /// - Fragment-only references (same page anchors)
    /// - Empty attributes
    pub fn parse_for_urls(
        &self,
        source: &mut dyn BufRead,
        base: Option<&Url>,
        found: &mut dyn FnMut(String),
    ) -> Result<(), ParseError> {
        let html = read_to_string(source)?;
        let document = Html::parse_document(&html);

        let document_base = document_base(&document, base);
        let base = document_base.as_ref().or(base);

        for (selector, attr) in LINK_ATTRIBUTES {
            let selector = Selector::parse(selector)
                .map_err(|e| ParseError::Malformed(format!("selector {}: {:?}", selector, e)))?;

            for element in document.select(&selector) {
                if let Some(reference) = element.value().attr(attr) {
                    if let Some(reference) = usable_reference(reference) {
                        found(resolve(reference, base));
                    }
                }
            }
        }

        Ok(())
    }
}

/// Returns the URL given by `<base href>`, resolved against the page URL
fn document_base(document: &Html, page: Option<&Url>) -> Option<Url> {
    let selector = Selector::parse("base[href]").ok()?;
    let href = document.select(&selector).next()?.value().attr("href")?.trim();
    match page {
        Some(page) => page.join(href).ok(),
        None => Url::parse(href).ok(),
    }
}

fn usable_reference(reference: &str) -> Option<&str> {
    let reference = reference.trim();
    if reference.is_empty() || reference.starts_with('#') {
        return None;
    }

    let lower = reference.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    Some(reference)
}
