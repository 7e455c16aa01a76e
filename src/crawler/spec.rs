use crate::crawler::unit::ArchivalUnit;
use crate::rules::CrawlRule;
use crate::CrawlError;

/// Static description of one crawl
///
/// A spec may be built before its archival unit is fully configured, so
/// missing URL lists are accepted here and reported as definition errors
/// only when they are asked for.
#[derive(Debug, Clone)]
pub struct CrawlSpec {
    start_urls: Option<Vec<String>>,
    permission_urls: Option<Vec<String>>,
    rule: Option<CrawlRule>,
    max_depth: u32,
    fail_on_start_url_error: bool,
}

impl CrawlSpec {
    pub fn new(
        start_urls: Option<Vec<String>>,
        permission_urls: Option<Vec<String>>,
        rule: Option<CrawlRule>,
        max_depth: u32,
    ) -> Self {
        Self {
            start_urls,
            permission_urls,
            rule,
            max_depth,
            fail_on_start_url_error: true,
        }
    }

    /// Takes URLs, rule, depth and start URL policy from the unit
    pub fn from_unit(unit: &dyn ArchivalUnit) -> Self {
        Self {
            start_urls: unit.start_urls(),
            permission_urls: unit.permission_urls(),
            rule: unit.crawl_rule().cloned(),
            max_depth: unit.max_depth(),
            fail_on_start_url_error: unit.fail_on_start_url_error(),
        }
    }

    pub fn with_fail_on_start_url_error(mut self, fail: bool) -> Self {
        self.fail_on_start_url_error = fail;
        self
    }

    /// Start URLs of the crawl
    ///
    /// # Returns
    ///
    /// * `Ok(&[String])` - The non-empty list
    /// * `Err(CrawlError::Definition)` - The list is missing or empty
    pub fn start_urls(&self) -> Result<&[String], CrawlError> {
        non_empty(self.start_urls.as_deref(), "start")
    }

    /// Manifest pages of the crawl
    ///
    /// # Returns
    ///
    /// * `Ok(&[String])` - The non-empty list
    /// * `Err(CrawlError::Definition)` - The list is missing or empty
    pub fn permission_urls(&self) -> Result<&[String], CrawlError> {
        non_empty(self.permission_urls.as_deref(), "permission")
    }

    pub fn rule(&self) -> Option<&CrawlRule> {
        self.rule.as_ref()
    }

    /// Returns true if the URL is within the crawl rule, or there is no rule
    pub fn is_included(&self, url: &str) -> bool {
        self.rule.as_ref().map_or(true, |rule| rule.should_crawl(url))
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    pub fn fail_on_start_url_error(&self) -> bool {
        self.fail_on_start_url_error
    }
}

fn non_empty<'a>(urls: Option<&'a [String]>, kind: &str) -> Result<&'a [String], CrawlError> {
    match urls {
        Some(urls) if !urls.is_empty() => Ok(urls),
        _ => Err(CrawlError::Definition(format!(
            "CrawlSpec requires a non-null {} URL list",
            kind
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::DefinableUnit;
    use crate::rules::PatternAction;

    #[test]
    fn test_missing_start_urls_is_definition_error() {
        let spec = CrawlSpec::new(None, Some(vec!["http://a/perm".to_string()]), None, 3);
        let err = spec.start_urls().unwrap_err();

        assert!(matches!(err, CrawlError::Definition(_)));
        assert!(err.to_string().contains("non-null start URL list"));
    }

    #[test]
    fn test_empty_permission_urls_is_definition_error() {
        let spec = CrawlSpec::new(Some(vec!["http://a/".to_string()]), Some(Vec::new()), None, 3);
        let err = spec.permission_urls().unwrap_err();

        assert!(matches!(err, CrawlError::Definition(_)));
        assert!(err.to_string().contains("non-null permission URL list"));
    }

    #[test]
    fn test_from_unit() {
        let rule = CrawlRule::pattern(r"^http://a/", PatternAction::MatchInclude, false).unwrap();
        let unit = DefinableUnit::new("u", 4)
            .with_start_urls(["http://a/"])
            .with_permission_urls(["http://a/perm"])
            .with_rule(rule)
            .with_fail_on_start_url_error(false);

        let spec = CrawlSpec::from_unit(&unit);
        assert_eq!(spec.start_urls().unwrap(), ["http://a/".to_string()]);
        assert_eq!(spec.permission_urls().unwrap(), ["http://a/perm".to_string()]);
        assert_eq!(spec.max_depth(), 4);
        assert!(!spec.fail_on_start_url_error());
        assert!(spec.is_included("http://a/x"));
        assert!(!spec.is_included("http://b/x"));
    }
}
