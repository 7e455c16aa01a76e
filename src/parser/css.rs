use super::{read_to_string, resolve, ParseError};
use regex::Regex;
use std::io::BufRead;
use std::sync::OnceLock;
use url::Url;

/// Matches `@import url(...)`, `@import '...'`, `@import "..."` and bare
/// `url(...)`, each with single, double or no quotes
fn reference_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?ix)
            @import \s+
                (?:
                    url\( \s* (?: '([^']*)' | "([^"]*)" | ([^)'"\s]+) ) \s* \)
                  | '([^']*)'
                  | "([^"]*)"
                )
          | url\( \s* (?: '([^']*)' | "([^"]*)" | ([^)'"\s]+) ) \s* \)
            "#,
        )
        .expect("static CSS reference regex")
    })
}

fn comment_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)/\*.*?\*/").expect("static CSS comment regex"))
}

/// Extracts `@import` and `url(...)` references from stylesheets
#[derive(Debug, Clone, Copy, Default)]
pub struct CssParser;

impl CssParser {
    pub fn parse_for_urls(
        &self,
        source: &mut dyn BufRead,
        base: Option<&Url>,
        found: &mut dyn FnMut(String),
    ) -> Result<(), ParseError> {
        let text = read_to_string(source)?;
        let text = comment_regex().replace_all(&text, " ");

        for caps in reference_regex().captures_iter(&text) {
            let reference = caps
                .iter()
                .skip(1)
                .flatten()
                .map(|m| m.as_str().trim())
                .find(|s| !s.is_empty());

            if let Some(reference) = reference {
                if !reference.starts_with("data:") {
                    found(resolve(reference, base));
                }
            }
        }

        Ok(())
    }
}
