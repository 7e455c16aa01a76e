use super::ParseError;
use serde::Deserialize;
use std::io::BufRead;

/// Rewrites URLs starting with `from` (any case) to start with `to`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RamTranslation {
    pub from: String,
    pub to: String,
}

impl RamTranslation {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }

    fn apply(&self, line: &str) -> Option<String> {
        let prefix = line.get(..self.from.len())?;
        if prefix.eq_ignore_ascii_case(&self.from) {
            Some(format!("{}{}", self.to, &line[self.from.len()..]))
        } else {
            None
        }
    }
}

/// Extracts URLs from RealMedia metafiles
///
/// A metafile lists one URL per line. Blank lines and `#` comments are
/// skipped and query strings are dropped. Only `http://` URLs are reported
/// unless a translation maps another prefix onto one.
#[derive(Debug, Clone, Default)]
pub struct RamParser {
    translation: Option<RamTranslation>,
}

impl RamParser {
    pub fn new(translation: Option<RamTranslation>) -> Self {
        Self { translation }
    }

    pub fn parse_for_urls(
        &self,
        source: &mut dyn BufRead,
        found: &mut dyn FnMut(String),
    ) -> Result<(), ParseError> {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if source.read_until(b'\n', &mut buf)? == 0 {
                break;
            }

            let line = String::from_utf8_lossy(&buf);
            if let Some(url) = self.url_from_line(&line) {
                found(url);
            }
        }
        Ok(())
    }

    fn url_from_line(&self, line: &str) -> Option<String> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }

        let line = match line.find('?') {
            Some(idx) => &line[..idx],
            None => line,
        };

        if let Some(translation) = &self.translation {
            if let Some(url) = translation.apply(line) {
                return Some(url);
            }
        }

        lowercase_http_authority(line)
    }
}

/// Lower-cases the scheme and host of an `http://` URL, leaving the path as is
fn lowercase_http_authority(line: &str) -> Option<String> {
    const SCHEME: &str = "http://";

    let scheme = line.get(..SCHEME.len())?;
    if !scheme.eq_ignore_ascii_case(SCHEME) {
        return None;
    }

    let rest = &line[SCHEME.len()..];
    let (host, path) = match rest.find('/') {
        Some(idx) => rest.split_at(idx),
        None => (rest, ""),
    };

    Some(format!("{}{}{}", SCHEME, host.to_lowercase(), path))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_with(parser: &RamParser, input: &str) -> Vec<String> {
        let mut found = Vec::new();
        parser
            .parse_for_urls(&mut input.as_bytes(), &mut |u: String| found.push(u))
            .unwrap();
        found
    }

    fn parse(input: &str) -> Vec<String> {
        parse_with(&RamParser::default(), input)
    }

    #[test]
    fn test_empty_input() {
        assert!(parse("").is_empty());
    }

    #[test]
    fn test_single_http_url() {
        assert_eq!(
            parse("http://www.example.com/blah.rm"),
            vec!["http://www.example.com/blah.rm"]
        );
    }

    #[test]
    fn test_rtsp_not_emitted() {
        assert!(parse("rtsp://www.example.com/blah.rm").is_empty());
    }

    #[test]
    fn test_case_insensitive_protocol_and_host() {
        assert_eq!(
            parse("HTTP://WWW.Example.COM/Blah/File.rm"),
            vec!["http://www.example.com/Blah/File.rm"]
        );
    }

    #[test]
    fn test_query_stripped() {
        assert_eq!(
            parse("http://www.example.com/blah.rm?start=\"00:00:05\""),
            vec!["http://www.example.com/blah.rm"]
        );
    }

    #[test]
    fn test_whitespace_comments_and_blank_lines() {
        let input = "# comment line\n\
                     \n\
                     \t  http://www.example.com/a.rm  \n\
                     #http://www.example.com/hidden.rm\n\
                     \r\n\
                     http://www.example.com/b.rm\r\n";
        assert_eq!(
            parse(input),
            vec!["http://www.example.com/a.rm", "http://www.example.com/b.rm"]
        );
    }

    #[test]
    fn test_host_only_url() {
        assert_eq!(parse("http://WWW.EXAMPLE.COM"), vec!["http://www.example.com"]);
    }

    #[test]
    fn test_translation() {
        let parser = RamParser::new(Some(RamTranslation::new(
            "rtsp://www.example.com/",
            "http://www.example.com/media/",
        )));
        let input = "rtsp://www.example.com/blah1.rm\n\
                     RTSP://WWW.EXAMPLE.COM/blah2.rm?param=1\n\
                     http://www.example.com/blah3.rm\n\
                     rtsp://other.example.org/blah4.rm\n";

        assert_eq!(
            parse_with(&parser, input),
            vec![
                "http://www.example.com/media/blah1.rm",
                "http://www.example.com/media/blah2.rm",
                "http://www.example.com/blah3.rm",
            ]
        );
    }

    #[test]
    fn test_non_utf8_line_does_not_fail() {
        let mut found = Vec::new();
        let input: &[u8] = b"http://example.com/\xff.rm\nhttp://example.com/ok.rm\n";
        RamParser::default()
            .parse_for_urls(&mut &input[..], &mut |u: String| found.push(u))
            .unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[1], "http://example.com/ok.rm");
    }
}
