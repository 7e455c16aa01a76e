//! Per-crawl status sink
//!
//! One `CrawlStatus` exists per crawl. The crawler, its permission map and
//! its seed report into it by mutable reference; nothing else writes to it.

use crate::state::CrawlPhase;
use crate::CrawlError;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

pub const HOST_PERM_ERR_MSG: &str = "No permission for host";
pub const NO_PERM_STATEMENT_ERR_MSG: &str = "No permission statement on permission page";
pub const UNABLE_TO_FETCH_PERM_ERR_MSG: &str = "Unable to fetch permission page";
pub const START_URL_ERR_MSG: &str = "Failed to fetch start url";

/// Outcome code of a crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlStatusCode {
    Unknown,
    Queued,
    Active,
    Successful,
    Error,
    Aborted,
    WindowClosed,
    FetchError,
    NoPubPermission,
    PluginError,
    RepoError,
    ExtractorError,
}

impl CrawlStatusCode {
    /// Message reported when no specific message was recorded
    pub fn default_message(&self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Queued => "Pending",
            Self::Active => "Active",
            Self::Successful => "Successful",
            Self::Error => "Error",
            Self::Aborted => "Aborted",
            Self::WindowClosed => "Interrupted by crawl window",
            Self::FetchError => "Fetch error",
            Self::NoPubPermission => "No permission from publisher",
            Self::PluginError => "Plugin error",
            Self::RepoError => "Repository error",
            Self::ExtractorError => "Link extractor error",
        }
    }

    /// Returns true for every code that means the crawl did not succeed
    pub fn is_error(&self) -> bool {
        !matches!(
            self,
            Self::Unknown | Self::Queued | Self::Active | Self::Successful
        )
    }
}

impl fmt::Display for CrawlStatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.default_message())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Warning,
    Error,
    Fatal,
}

/// An error recorded against one URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlErrorInfo {
    pub message: String,
    pub severity: Severity,
}

/// Progress and outcome of one crawl
#[derive(Debug, Clone)]
pub struct CrawlStatus {
    unit_id: String,
    phase: CrawlPhase,
    code: CrawlStatusCode,
    message: Option<String>,
    start_urls: Vec<String>,
    fetched: Vec<String>,
    parsed: Vec<String>,
    excluded: BTreeMap<String, Option<String>>,
    pending: BTreeSet<String>,
    errors: BTreeMap<String, UrlErrorInfo>,
    bytes_fetched: u64,
    depth: u32,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
}

impl CrawlStatus {
    pub fn new(unit_id: impl Into<String>) -> Self {
        Self {
            unit_id: unit_id.into(),
            phase: CrawlPhase::NotStarted,
            code: CrawlStatusCode::Queued,
            message: None,
            start_urls: Vec::new(),
            fetched: Vec::new(),
            parsed: Vec::new(),
            excluded: BTreeMap::new(),
            pending: BTreeSet::new(),
            errors: BTreeMap::new(),
            bytes_fetched: 0,
            depth: 0,
            started_at: None,
            ended_at: None,
        }
    }

    pub fn unit_id(&self) -> &str {
        &self.unit_id
    }

    pub fn phase(&self) -> CrawlPhase {
        self.phase
    }

    fn transition(&mut self, next: CrawlPhase) -> Result<(), CrawlError> {
        if !self.phase.can_transition_to(next) {
            return Err(CrawlError::InvalidTransition {
                from: self.phase,
                to: next,
            });
        }
        self.phase = next;
        Ok(())
    }

    /// Marks the crawl as running
    pub fn signal_crawl_started(&mut self) -> Result<(), CrawlError> {
        self.transition(CrawlPhase::Running)?;
        self.started_at = Some(Utc::now());
        self.code = CrawlStatusCode::Active;
        self.message = None;
        Ok(())
    }

    /// Marks the crawl as finished
    ///
    /// The terminal phase follows from the status code recorded so far: no
    /// error means success, `Aborted` means aborted, anything else is an
    /// error.
    pub fn signal_crawl_ended(&mut self) -> Result<CrawlPhase, CrawlError> {
        let next = match self.code {
            CrawlStatusCode::Aborted => CrawlPhase::Aborted,
            code if code.is_error() => CrawlPhase::Error,
            _ => CrawlPhase::Success,
        };
        self.transition(next)?;
        if next == CrawlPhase::Success {
            self.code = CrawlStatusCode::Successful;
        }
        self.ended_at = Some(Utc::now());
        Ok(next)
    }

    /// Sets the status code, with an optional message overriding the default
    pub fn set_crawl_status(&mut self, code: CrawlStatusCode, message: Option<&str>) {
        self.code = code;
        self.message = message.map(str::to_string);
    }

    pub fn crawl_status(&self) -> CrawlStatusCode {
        self.code
    }

    /// Returns "Active" while the crawl runs, else the crawl error message
    pub fn crawl_status_message(&self) -> &str {
        if self.phase == CrawlPhase::Running {
            CrawlStatusCode::Active.default_message()
        } else {
            self.crawl_error_message()
        }
    }

    /// Returns the recorded message, even while the crawl runs
    pub fn crawl_error_message(&self) -> &str {
        self.message
            .as_deref()
            .unwrap_or_else(|| self.code.default_message())
    }

    pub fn is_crawl_error(&self) -> bool {
        self.code.is_error()
    }

    /// Records a warning against a URL
    pub fn signal_error_for_url(&mut self, url: &str, message: &str) {
        self.signal_error_with_severity(url, message, Severity::Warning);
    }

    pub fn signal_error_with_severity(&mut self, url: &str, message: &str, severity: Severity) {
        tracing::debug!("Error for {}: {}", url, message);
        self.errors.insert(
            url.to_string(),
            UrlErrorInfo {
                message: message.to_string(),
                severity,
            },
        );
    }

    /// Records an error against a URL and sets the crawl status
    ///
    /// # Arguments
    ///
    /// * `url` - The URL the error belongs to
    /// * `url_message` - Message stored for the URL
    /// * `code` - New crawl status code
    /// * `status_message` - New crawl status message, or `None` for the default
    pub fn signal_error_for_url_with_status(
        &mut self,
        url: &str,
        url_message: &str,
        code: CrawlStatusCode,
        status_message: Option<&str>,
    ) {
        self.set_crawl_status(code, status_message);
        let severity = if code.is_error() {
            Severity::Error
        } else {
            Severity::Warning
        };
        self.signal_error_with_severity(url, url_message, severity);
    }

    /// Like `signal_error_for_url_with_status`, but keeps an existing URL error
    pub fn signal_error_for_url_no_override(
        &mut self,
        url: &str,
        url_message: &str,
        code: CrawlStatusCode,
    ) {
        if self.errors.contains_key(url) {
            self.set_crawl_status(code, None);
        } else {
            self.signal_error_for_url_with_status(url, url_message, code, None);
        }
    }

    pub fn error_for_url(&self, url: &str) -> Option<&str> {
        self.errors.get(url).map(|e| e.message.as_str())
    }

    pub fn error_info_for_url(&self, url: &str) -> Option<&UrlErrorInfo> {
        self.errors.get(url)
    }

    pub fn urls_with_errors(&self) -> &BTreeMap<String, UrlErrorInfo> {
        &self.errors
    }

    pub fn num_urls_with_errors_of_severity(&self, severity: Severity) -> usize {
        self.errors.values().filter(|e| e.severity == severity).count()
    }

    pub fn set_start_urls(&mut self, urls: Vec<String>) {
        self.start_urls = urls;
    }

    pub fn start_urls(&self) -> &[String] {
        &self.start_urls
    }

    pub fn signal_url_fetched(&mut self, url: &str) {
        self.fetched.push(url.to_string());
    }

    pub fn urls_fetched(&self) -> &[String] {
        &self.fetched
    }

    pub fn signal_url_parsed(&mut self, url: &str) {
        self.parsed.push(url.to_string());
    }

    pub fn urls_parsed(&self) -> &[String] {
        &self.parsed
    }

    pub fn signal_url_excluded(&mut self, url: &str, reason: Option<&str>) {
        self.excluded
            .insert(url.to_string(), reason.map(str::to_string));
    }

    pub fn urls_excluded(&self) -> &BTreeMap<String, Option<String>> {
        &self.excluded
    }

    pub fn add_pending_url(&mut self, url: &str) {
        self.pending.insert(url.to_string());
    }

    pub fn remove_pending_url(&mut self, url: &str) {
        self.pending.remove(url);
    }

    pub fn num_pending(&self) -> usize {
        self.pending.len()
    }

    pub fn add_content_bytes_fetched(&mut self, bytes: u64) {
        self.bytes_fetched += bytes;
    }

    pub fn content_bytes_fetched(&self) -> u64 {
        self.bytes_fetched
    }

    /// Records that the crawl reached `depth`, keeping the maximum
    pub fn update_depth(&mut self, depth: u32) {
        self.depth = self.depth.max(depth);
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_successful_lifecycle() {
        let mut status = CrawlStatus::new("unit");
        assert_eq!(status.phase(), CrawlPhase::NotStarted);
        assert_eq!(status.crawl_status_message(), "Pending");

        status.signal_crawl_started().unwrap();
        assert_eq!(status.phase(), CrawlPhase::Running);
        assert_eq!(status.crawl_status(), CrawlStatusCode::Active);
        assert!(status.started_at().is_some());

        assert_eq!(status.signal_crawl_ended().unwrap(), CrawlPhase::Success);
        assert_eq!(status.crawl_status(), CrawlStatusCode::Successful);
        assert_eq!(status.crawl_status_message(), "Successful");
        assert!(status.ended_at().is_some());
    }

    #[test]
    fn test_error_lifecycle() {
        let mut status = CrawlStatus::new("unit");
        status.signal_crawl_started().unwrap();
        status.set_crawl_status(CrawlStatusCode::NoPubPermission, Some("custom"));

        // still running: message reports active
        assert_eq!(status.crawl_status_message(), "Active");
        assert_eq!(status.crawl_error_message(), "custom");

        assert_eq!(status.signal_crawl_ended().unwrap(), CrawlPhase::Error);
        assert_eq!(status.crawl_status_message(), "custom");
        assert_eq!(status.crawl_status(), CrawlStatusCode::NoPubPermission);
    }

    #[test]
    fn test_abort_lifecycle() {
        let mut status = CrawlStatus::new("unit");
        status.signal_crawl_started().unwrap();
        status.set_crawl_status(CrawlStatusCode::Aborted, None);
        assert_eq!(status.signal_crawl_ended().unwrap(), CrawlPhase::Aborted);
        assert_eq!(status.crawl_status_message(), "Aborted");
    }

    #[test]
    fn test_invalid_transition() {
        let mut status = CrawlStatus::new("unit");
        status.signal_crawl_started().unwrap();
        status.signal_crawl_ended().unwrap();
        let result = status.signal_crawl_started();
        assert!(matches!(
            result,
            Err(CrawlError::InvalidTransition {
                from: CrawlPhase::Success,
                to: CrawlPhase::Running
            })
        ));
    }

    #[test]
    fn test_end_before_start_is_error() {
        let mut status = CrawlStatus::new("unit");
        status.set_crawl_status(CrawlStatusCode::PluginError, Some("bad definition"));
        assert_eq!(status.signal_crawl_ended().unwrap(), CrawlPhase::Error);
    }

    #[test]
    fn test_default_messages() {
        assert_eq!(
            CrawlStatusCode::WindowClosed.default_message(),
            "Interrupted by crawl window"
        );
        assert_eq!(
            CrawlStatusCode::NoPubPermission.default_message(),
            "No permission from publisher"
        );
        assert!(!CrawlStatusCode::Active.is_error());
        assert!(CrawlStatusCode::FetchError.is_error());
    }

    #[test]
    fn test_url_errors() {
        let mut status = CrawlStatus::new("unit");
        status.signal_error_for_url("http://a/", "warned");
        status.signal_error_for_url_with_status(
            "http://b/",
            "fetch failed",
            CrawlStatusCode::FetchError,
            None,
        );

        assert_eq!(status.error_for_url("http://a/"), Some("warned"));
        assert_eq!(
            status.error_info_for_url("http://b/").unwrap().severity,
            Severity::Error
        );
        assert_eq!(status.crawl_status(), CrawlStatusCode::FetchError);
        assert_eq!(status.num_urls_with_errors_of_severity(Severity::Warning), 1);
        assert_eq!(status.urls_with_errors().len(), 2);
    }

    #[test]
    fn test_no_override_keeps_first_error() {
        let mut status = CrawlStatus::new("unit");
        status.signal_error_for_url("http://a/", "first");
        status.signal_error_for_url_no_override(
            "http://a/",
            "second",
            CrawlStatusCode::NoPubPermission,
        );
        assert_eq!(status.error_for_url("http://a/"), Some("first"));
        assert_eq!(status.crawl_status(), CrawlStatusCode::NoPubPermission);
    }

    #[test]
    fn test_counters() {
        let mut status = CrawlStatus::new("unit");
        status.signal_url_fetched("http://a/");
        status.signal_url_parsed("http://a/");
        status.signal_url_excluded("http://x/", Some("Excluded by crawl rule"));
        status.add_pending_url("http://b/");
        status.add_pending_url("http://c/");
        status.remove_pending_url("http://b/");
        status.add_content_bytes_fetched(100);
        status.add_content_bytes_fetched(23);
        status.update_depth(3);
        status.update_depth(1);

        assert_eq!(status.urls_fetched(), &["http://a/".to_string()]);
        assert_eq!(status.urls_parsed().len(), 1);
        assert_eq!(status.urls_excluded().len(), 1);
        assert_eq!(status.num_pending(), 1);
        assert_eq!(status.content_bytes_fetched(), 123);
        assert_eq!(status.depth(), 3);
    }
}
