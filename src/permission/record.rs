use std::fmt;

/// State of one manifest page
///
/// `Unchecked -> (probe) -> {Ok | NotOk | CrawlWindowRefused | FetchFailed |
/// IoException | NotInCrawlSpec}`. Only `FetchFailed` and `Unchecked` are
/// probed again; everything else is kept for the rest of the crawl.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PermissionStatus {
    /// Not probed yet
    Unchecked,

    /// The page grants permission
    Ok,

    /// The page was fetched but a checker refused
    NotOk,

    /// The crawl window was closed when the page was due to be probed
    CrawlWindowRefused,

    /// The page could not be fetched
    FetchFailed,

    /// The page granted permission but could not be stored
    IoException,

    /// Another page on the same host already granted permission
    MultiplePages,

    /// The page is outside the unit's crawl rules
    NotInCrawlSpec,

    /// No page governs the host
    Missing,
}

impl PermissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unchecked => "unchecked",
            Self::Ok => "ok",
            Self::NotOk => "not_ok",
            Self::CrawlWindowRefused => "crawl_window_refused",
            Self::FetchFailed => "fetch_failed",
            Self::IoException => "io_exception",
            Self::MultiplePages => "multiple_pages",
            Self::NotInCrawlSpec => "not_in_crawl_spec",
            Self::Missing => "missing",
        }
    }
}

impl fmt::Display for PermissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One manifest page and its permission status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionRecord {
    url: String,
    host: String,
    status: PermissionStatus,
    probes: u32,
}

impl PermissionRecord {
    pub(crate) fn new(url: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            host: host.into(),
            status: PermissionStatus::Unchecked,
            probes: 0,
        }
    }

    /// The manifest page URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Lower-cased host of the manifest page
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn status(&self) -> PermissionStatus {
        self.status
    }

    pub fn set_status(&mut self, status: PermissionStatus) {
        self.status = status;
    }

    /// Number of times the page has been fetched
    pub fn probes(&self) -> u32 {
        self.probes
    }

    pub(crate) fn record_probe(&mut self) {
        self.probes += 1;
    }
}
