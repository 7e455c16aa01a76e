/// Checks if a host matches a permitted-host pattern
///
/// Patterns are either an exact host name or `*.base`, which matches `base`
/// itself and any host below it. A lone `*` matches every host. Comparison
/// ignores ASCII case.
///
/// # Examples
///
/// ```
/// use au_crawler::url::matches_host_pattern;
///
/// assert!(matches_host_pattern("cdn.example.com", "CDN.example.com"));
/// assert!(matches_host_pattern("*.example.com", "example.com"));
/// assert!(matches_host_pattern("*.example.com", "img.cdn.example.com"));
/// assert!(!matches_host_pattern("*.example.com", "example.org"));
/// ```
pub fn matches_host_pattern(pattern: &str, host: &str) -> bool {
    let pattern = pattern.trim().to_ascii_lowercase();
    let host = host.to_ascii_lowercase();

    if pattern == "*" {
        return !host.is_empty();
    }

    match pattern.strip_prefix("*.") {
        Some(base) => host == base || host.ends_with(&format!(".{}", base)),
        None => host == pattern,
    }
}

/// Returns true if the host matches any of the patterns
pub fn matches_any_host_pattern<S: AsRef<str>>(patterns: &[S], host: &str) -> bool {
    patterns
        .iter()
        .any(|pattern| matches_host_pattern(pattern.as_ref(), host))
}
