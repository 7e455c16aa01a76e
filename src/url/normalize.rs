use crate::UrlError;
use url::Url;

/// Returns true if the crawler knows how to fetch URLs with this scheme
pub fn is_supported_protocol(scheme: &str) -> bool {
    scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https")
}

/// Normalizes a discovered link for the crawl frontier
///
/// # Normalization Steps
///
/// 1. Trim surrounding whitespace
/// 2. Resolve against `base` when one is given, otherwise parse as absolute
/// 3. Reject anything other than http/https
/// 4. Reject URLs without a host
/// 5. Remove the fragment (everything after #)
///
/// Scheme and host are lower-cased by the `url` crate itself. Path, query and
/// trailing slashes are preserved, since archived content is keyed by the
/// exact URL the publisher serves.
///
/// # Arguments
///
/// * `raw` - The link as found in content
/// * `base` - The URL of the page the link was found on, if any
///
/// # Returns
///
/// * `Ok(Url)` - Normalized absolute URL
/// * `Err(UrlError)` - The link could not be resolved to a fetchable URL
///
/// # Examples
///
/// ```
/// use au_crawler::url::normalize_url;
/// use url::Url;
///
/// let base = Url::parse("http://example.com/issue/1/").unwrap();
/// let url = normalize_url("../2/toc.html#top", Some(&base)).unwrap();
/// assert_eq!(url.as_str(), "http://example.com/issue/2/toc.html");
/// ```
pub fn normalize_url(raw: &str, base: Option<&Url>) -> Result<Url, UrlError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(UrlError::Parse("empty URL".to_string()));
    }

    let mut url = match base {
        Some(base) => base.join(raw),
        None => Url::parse(raw),
    }
    .map_err(|e| UrlError::Parse(format!("{}: {}", raw, e)))?;

    if !is_supported_protocol(url.scheme()) {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingHost);
    }

    url.set_fragment(None);

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("http://www.example.com/vol1/issue2/index.html").unwrap()
    }

    #[test]
    fn test_absolute_url_unchanged() {
        let url = normalize_url("https://example.com/a/b/", None).unwrap();
        assert_eq!(url.as_str(), "https://example.com/a/b/");
    }

    #[test]
    fn test_lowercases_scheme_and_host() {
        let url = normalize_url("HTTP://Example.COM/Path/File.HTML", None).unwrap();
        assert_eq!(url.as_str(), "http://example.com/Path/File.HTML");
    }

    #[test]
    fn test_keeps_www_and_scheme() {
        let url = normalize_url("http://www.example.com/", None).unwrap();
        assert_eq!(url.as_str(), "http://www.example.com/");
    }

    #[test]
    fn test_relative_resolution() {
        let base = base();
        assert_eq!(
            normalize_url("art1.html", Some(&base)).unwrap().as_str(),
            "http://www.example.com/vol1/issue2/art1.html"
        );
        assert_eq!(
            normalize_url("/styles/main.css", Some(&base)).unwrap().as_str(),
            "http://www.example.com/styles/main.css"
        );
        assert_eq!(
            normalize_url("//cdn.example.org/x.js", Some(&base)).unwrap().as_str(),
            "http://cdn.example.org/x.js"
        );
    }

    #[test]
    fn test_removes_fragment_keeps_query() {
        let url = normalize_url("http://example.com/page?b=2&a=1#section", None).unwrap();
        assert_eq!(url.as_str(), "http://example.com/page?b=2&a=1");
    }

    #[test]
    fn test_rejects_unsupported_schemes() {
        assert!(matches!(
            normalize_url("mailto:editor@example.com", None),
            Err(UrlError::InvalidScheme(_))
        ));
        assert!(matches!(
            normalize_url("javascript:void(0)", Some(&base())),
            Err(UrlError::InvalidScheme(_))
        ));
        assert!(matches!(
            normalize_url("rtsp://media.example.com/a.rm", None),
            Err(UrlError::InvalidScheme(_))
        ));
    }

    #[test]
    fn test_rejects_relative_without_base() {
        assert!(matches!(
            normalize_url("relative/page.html", None),
            Err(UrlError::Parse(_))
        ));
    }

    #[test]
    fn test_rejects_empty() {
        assert!(normalize_url("   ", Some(&base())).is_err());
    }

    #[test]
    fn test_supported_protocol() {
        assert!(is_supported_protocol("http"));
        assert!(is_supported_protocol("HTTPS"));
        assert!(!is_supported_protocol("ftp"));
    }
}
