//! Content parsers that extract candidate URLs from fetched content
//!
//! Each parser reads a byte stream and reports every URL it finds through a
//! callback, so large sources are consumed incrementally. Parsers hold only
//! configuration and can be shared across crawls.
//!
//! # Components
//!
//! - `HtmlParser`: links, images, scripts, frames and embeds in HTML
//! - `CssParser`: `@import` and `url(...)` references in stylesheets
//! - `RamParser`: one URL per line RealMedia metafiles

mod css;
mod html;
mod ram;

pub use css::CssParser;
pub use html::HtmlParser;
pub use ram::{RamParser, RamTranslation};

use std::io::BufRead;
use thiserror::Error;
use url::Url;

/// Errors raised while extracting URLs from content
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Failed to read content: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed content: {0}")]
    Malformed(String),
}

/// Options that configure parsers for one archival unit
#[derive(Debug, Clone, Default)]
pub struct ParserOptions {
    /// Scheme translation applied by the RAM parser
    pub ram_translation: Option<RamTranslation>,
}

/// A content parser selected by MIME type
#[derive(Debug, Clone)]
pub enum ContentParser {
    Html(HtmlParser),
    Css(CssParser),
    Ram(RamParser),
}

impl ContentParser {
    /// Selects the parser for a Content-Type header value
    ///
    /// MIME parameters (`; charset=...`) and case are ignored.
    ///
    /// # Returns
    ///
    /// * `Some(ContentParser)` - A parser for the type
    /// * `None` - Content of this type contains no links the crawler follows
    pub fn for_content_type(content_type: &str, options: &ParserOptions) -> Option<Self> {
        let mime = mime_type(content_type);
        match mime.as_str() {
            "text/html" | "application/xhtml+xml" => Some(ContentParser::Html(HtmlParser)),
            "text/css" => Some(ContentParser::Css(CssParser)),
            "audio/x-pn-realaudio" | "audio/vnd.rn-realaudio" => Some(ContentParser::Ram(
                RamParser::new(options.ram_translation.clone()),
            )),
            _ => None,
        }
    }

    /// Extracts URLs from `source`
    ///
    /// # Arguments
    ///
    /// * `source` - The content to scan
    /// * `base` - URL of the content, for resolving relative references
    /// * `found` - Called once per URL, in document order
    pub fn parse_for_urls(
        &self,
        source: &mut dyn BufRead,
        base: Option<&Url>,
        found: &mut dyn FnMut(String),
    ) -> Result<(), ParseError> {
        match self {
            ContentParser::Html(parser) => parser.parse_for_urls(source, base, found),
            ContentParser::Css(parser) => parser.parse_for_urls(source, base, found),
            ContentParser::Ram(parser) => parser.parse_for_urls(source, found),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ContentParser::Html(_) => "html",
            ContentParser::Css(_) => "css",
            ContentParser::Ram(_) => "ram",
        }
    }
}

/// Returns the lower-cased MIME type without parameters
pub fn mime_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

/// Resolves a reference against the content URL when one is known
///
/// References that cannot be resolved are reported as found.
pub(crate) fn resolve(reference: &str, base: Option<&Url>) -> String {
    match base.map(|b| b.join(reference)) {
        Some(Ok(url)) => url.to_string(),
        _ => reference.to_string(),
    }
}

fn read_to_string(source: &mut dyn BufRead) -> Result<String, ParseError> {
    let mut bytes = Vec::new();
    source.read_to_end(&mut bytes)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_content_type() {
        let options = ParserOptions::default();
        let pick = |ct: &str| ContentParser::for_content_type(ct, &options).map(|p| p.name());

        assert_eq!(pick("text/html"), Some("html"));
        assert_eq!(pick("Text/HTML; charset=UTF-8"), Some("html"));
        assert_eq!(pick("application/xhtml+xml"), Some("html"));
        assert_eq!(pick("text/css"), Some("css"));
        assert_eq!(pick("audio/x-pn-realaudio"), Some("ram"));
        assert_eq!(pick("audio/vnd.rn-realaudio"), Some("ram"));
        assert_eq!(pick("application/pdf"), None);
        assert_eq!(pick(""), None);
    }

    #[test]
    fn test_ram_parser_gets_translation() {
        let options = ParserOptions {
            ram_translation: Some(RamTranslation::new("rtsp://host/", "http://host/media/")),
        };
        let parser = ContentParser::for_content_type("audio/x-pn-realaudio", &options).unwrap();

        let mut found = Vec::new();
        parser
            .parse_for_urls(&mut "rtsp://host/a.rm\n".as_bytes(), None, &mut |u: String| found.push(u))
            .unwrap();
        assert_eq!(found, vec!["http://host/media/a.rm"]);
    }

    #[test]
    fn test_resolve() {
        let base = Url::parse("http://example.com/css/site.css").unwrap();
        assert_eq!(resolve("img/bg.png", Some(&base)), "http://example.com/css/img/bg.png");
        assert_eq!(resolve("img/bg.png", None), "img/bg.png");
    }
}
