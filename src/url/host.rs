use url::Url;

/// Extracts the lower-cased host from a parsed URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use au_crawler::url::extract_host;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_host(&url), Some("example.com".to_string()));
/// ```
pub fn extract_host(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Parses a URL string and returns its lower-cased host
///
/// Returns `None` when the string is not an absolute URL or has no host.
pub fn host_of(url: &str) -> Option<String> {
    Url::parse(url).ok().as_ref().and_then(extract_host)
}
