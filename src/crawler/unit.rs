//! Archival units
//!
//! An archival unit supplies everything a crawl needs to know about the
//! content it targets: where to start, which manifest pages grant
//! permission, which URLs are in scope and when crawling is allowed.

use crate::config::{
    build_crawl_rule, build_crawl_window, CrawlOrder, CrawlerConfig, OaiConfig, UnitConfig,
};
use crate::crawler::queue::{BreadthFirst, DeepestFirst, UrlComparator};
use crate::parser::ParserOptions;
use crate::permission::{PermissionChecker, StatementPermissionChecker};
use crate::rules::{CrawlRule, CrawlWindow};
use crate::ConfigResult;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;

/// The logical collection of content a crawl targets
pub trait ArchivalUnit: Send + Sync {
    /// Unique identifier, also the key under which content is stored
    fn id(&self) -> &str;

    /// URLs the crawl starts from; `None` when the unit does not define them
    fn start_urls(&self) -> Option<Vec<String>>;

    /// Manifest pages; `None` when the unit does not define them
    fn permission_urls(&self) -> Option<Vec<String>>;

    fn crawl_rule(&self) -> Option<&CrawlRule>;

    fn crawl_window(&self) -> Option<&CrawlWindow>;

    fn max_depth(&self) -> u32;

    fn fail_on_start_url_error(&self) -> bool {
        true
    }

    /// Absolute path probed for a manifest on hosts that have none
    fn per_host_permission_path(&self) -> Option<&str> {
        None
    }

    /// Hosts the unit may fetch from without a manifest page
    fn permitted_host_patterns(&self) -> &[String] {
        &[]
    }

    /// Checkers a manifest page must satisfy in addition to the daemon's
    fn plugin_permission_checkers(&self) -> Vec<Arc<dyn PermissionChecker>> {
        Vec::new()
    }

    fn parser_options(&self) -> ParserOptions {
        ParserOptions::default()
    }

    /// OAI-PMH harvest settings, if the unit is harvested rather than spidered
    fn oai(&self) -> Option<&OaiConfig> {
        None
    }

    /// Frontier order
    fn url_comparator(&self) -> Arc<dyn UrlComparator> {
        Arc::new(BreadthFirst)
    }

    /// Returns true if the URL is within the unit's crawl rules
    fn should_be_cached(&self, url: &str) -> bool {
        self.crawl_rule().map_or(true, |rule| rule.should_crawl(url))
    }

    /// Returns true if crawling is allowed at `now`
    fn in_crawl_window(&self, now: DateTime<Utc>) -> bool {
        self.crawl_window().map_or(true, |window| window.is_open(now))
    }
}

/// An archival unit defined by configuration
#[derive(Clone)]
pub struct DefinableUnit {
    id: String,
    name: Option<String>,
    start_urls: Option<Vec<String>>,
    permission_urls: Option<Vec<String>>,
    rule: Option<CrawlRule>,
    window: Option<CrawlWindow>,
    max_depth: u32,
    fail_on_start_url_error: bool,
    per_host_permission_path: Option<String>,
    permitted_host_patterns: Vec<String>,
    plugin_checkers: Vec<Arc<dyn PermissionChecker>>,
    parser_options: ParserOptions,
    oai: Option<OaiConfig>,
    order: CrawlOrder,
}

impl DefinableUnit {
    /// Creates a unit with no URLs, no rules and no window
    pub fn new(id: impl Into<String>, max_depth: u32) -> Self {
        Self {
            id: id.into(),
            name: None,
            start_urls: None,
            permission_urls: None,
            rule: None,
            window: None,
            max_depth,
            fail_on_start_url_error: true,
            per_host_permission_path: None,
            permitted_host_patterns: Vec::new(),
            plugin_checkers: Vec::new(),
            parser_options: ParserOptions::default(),
            oai: None,
            order: CrawlOrder::default(),
        }
    }

    /// Builds a unit from its configuration entry
    ///
    /// # Arguments
    ///
    /// * `config` - The unit's configuration entry
    /// * `crawler` - Daemon-wide defaults
    ///
    /// # Returns
    ///
    /// * `Ok(DefinableUnit)` - The unit
    /// * `Err(ConfigError)` - A rule or window could not be built
    pub fn from_config(config: &UnitConfig, crawler: &CrawlerConfig) -> ConfigResult<Self> {
        let plugin_checkers: Vec<Arc<dyn PermissionChecker>> = config
            .plugin_permission_statement
            .iter()
            .map(|statement| {
                Arc::new(StatementPermissionChecker::new([statement])) as Arc<dyn PermissionChecker>
            })
            .collect();

        let window = config.window.as_ref().map(build_crawl_window).transpose()?;

        Ok(Self {
            id: config.id.clone(),
            name: config.name.clone(),
            start_urls: config.start_urls.clone(),
            permission_urls: config.permission_urls.clone(),
            rule: build_crawl_rule(&config.rules)?,
            window,
            max_depth: config.max_depth.unwrap_or(crawler.max_depth),
            fail_on_start_url_error: config.fail_on_start_url_error,
            per_host_permission_path: config.per_host_permission_path.clone(),
            permitted_host_patterns: config.permitted_host_patterns.clone(),
            plugin_checkers,
            parser_options: ParserOptions {
                ram_translation: config.ram_translation.clone(),
            },
            oai: config.oai.clone(),
            order: config.order,
        })
    }

    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    pub fn with_start_urls<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.start_urls = Some(urls.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_permission_urls<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permission_urls = Some(urls.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_rule(mut self, rule: CrawlRule) -> Self {
        self.rule = Some(rule);
        self
    }

    pub fn with_window(mut self, window: CrawlWindow) -> Self {
        self.window = Some(window);
        self
    }

    pub fn with_fail_on_start_url_error(mut self, fail: bool) -> Self {
        self.fail_on_start_url_error = fail;
        self
    }

    pub fn with_per_host_permission_path(mut self, path: impl Into<String>) -> Self {
        self.per_host_permission_path = Some(path.into());
        self
    }

    pub fn with_permitted_host_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permitted_host_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_plugin_checker(mut self, checker: Arc<dyn PermissionChecker>) -> Self {
        self.plugin_checkers.push(checker);
        self
    }

    pub fn with_parser_options(mut self, options: ParserOptions) -> Self {
        self.parser_options = options;
        self
    }

    pub fn with_oai(mut self, oai: OaiConfig) -> Self {
        self.oai = Some(oai);
        self
    }

    pub fn with_order(mut self, order: CrawlOrder) -> Self {
        self.order = order;
        self
    }
}

impl ArchivalUnit for DefinableUnit {
    fn id(&self) -> &str {
        &self.id
    }

    fn start_urls(&self) -> Option<Vec<String>> {
        self.start_urls.clone()
    }

    fn permission_urls(&self) -> Option<Vec<String>> {
        self.permission_urls.clone()
    }

    fn crawl_rule(&self) -> Option<&CrawlRule> {
        self.rule.as_ref()
    }

    fn crawl_window(&self) -> Option<&CrawlWindow> {
        self.window.as_ref()
    }

    fn max_depth(&self) -> u32 {
        self.max_depth
    }

    fn fail_on_start_url_error(&self) -> bool {
        self.fail_on_start_url_error
    }

    fn per_host_permission_path(&self) -> Option<&str> {
        self.per_host_permission_path.as_deref()
    }

    fn permitted_host_patterns(&self) -> &[String] {
        &self.permitted_host_patterns
    }

    fn plugin_permission_checkers(&self) -> Vec<Arc<dyn PermissionChecker>> {
        self.plugin_checkers.clone()
    }

    fn parser_options(&self) -> ParserOptions {
        self.parser_options.clone()
    }

    fn oai(&self) -> Option<&OaiConfig> {
        self.oai.as_ref()
    }

    fn url_comparator(&self) -> Arc<dyn UrlComparator> {
        match self.order {
            CrawlOrder::BreadthFirst => Arc::new(BreadthFirst),
            CrawlOrder::DeepestFirst => Arc::new(DeepestFirst),
        }
    }
}

impl fmt::Debug for DefinableUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefinableUnit")
            .field("id", &self.id)
            .field("start_urls", &self.start_urls)
            .field("permission_urls", &self.permission_urls)
            .field("max_depth", &self.max_depth)
            .field("order", &self.order)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RuleConfig, WindowConfig};
    use crate::crawler::queue::CrawlUrlData;
    use crate::rules::PatternAction;
    use chrono::TimeZone;
    use std::cmp::Ordering;

    fn unit_config(id: &str) -> UnitConfig {
        UnitConfig {
            id: id.to_string(),
            name: None,
            start_urls: Some(vec!["http://www.example.com/".to_string()]),
            permission_urls: Some(vec!["http://www.example.com/lockss.html".to_string()]),
            max_depth: None,
            fail_on_start_url_error: true,
            per_host_permission_path: None,
            permitted_host_patterns: Vec::new(),
            plugin_permission_statement: None,
            order: CrawlOrder::BreadthFirst,
            rules: Vec::new(),
            window: None,
            ram_translation: None,
            oai: None,
        }
    }

    #[test]
    fn test_from_config_uses_crawler_default_depth() {
        let unit = DefinableUnit::from_config(&unit_config("u1"), &CrawlerConfig::default())
            .unwrap();

        assert_eq!(unit.id(), "u1");
        assert_eq!(unit.name(), "u1");
        assert_eq!(unit.max_depth(), 1000);
        assert!(unit.crawl_rule().is_none());
        assert!(unit.should_be_cached("http://anywhere.org/"));
        assert!(unit.plugin_permission_checkers().is_empty());
    }

    #[test]
    fn test_from_config_builds_rules_and_window() {
        let mut config = unit_config("u1");
        config.max_depth = Some(2);
        config.rules = vec![RuleConfig {
            pattern: r"^http://www\.example\.com/".to_string(),
            action: PatternAction::MatchInclude,
            ignore_case: false,
        }];
        config.window = Some(WindowConfig::Never);
        config.plugin_permission_statement = Some("Publisher grants permission".to_string());

        let unit = DefinableUnit::from_config(&config, &CrawlerConfig::default()).unwrap();

        assert_eq!(unit.max_depth(), 2);
        assert!(unit.should_be_cached("http://www.example.com/a.html"));
        assert!(!unit.should_be_cached("http://other.org/a.html"));
        assert!(!unit.in_crawl_window(Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()));
        assert_eq!(unit.plugin_permission_checkers().len(), 1);
    }

    #[test]
    fn test_missing_url_lists_are_none() {
        let unit = DefinableUnit::new("bare", 3);
        assert!(unit.start_urls().is_none());
        assert!(unit.permission_urls().is_none());
        assert!(unit.in_crawl_window(Utc::now()));
    }

    #[test]
    fn test_url_comparator_follows_order() {
        let shallow = CrawlUrlData::new("http://a/", 0);
        let deep = CrawlUrlData::new("http://b/", 2);

        let bfs = DefinableUnit::new("u", 3).url_comparator();
        assert_eq!(bfs.compare(&shallow, &deep), Ordering::Less);

        let dfs = DefinableUnit::new("u", 3)
            .with_order(CrawlOrder::DeepestFirst)
            .url_comparator();
        assert_eq!(dfs.compare(&shallow, &deep), Ordering::Greater);
    }
}
