use crate::config::CheckerKind;
use scraper::{Html, Selector};
use std::sync::Arc;
use url::Url;

pub const LOCKSS_PERMISSION_STATEMENT: &str =
    "LOCKSS system has permission to collect, preserve, and serve this Archival Unit";

pub const CLOCKSS_PERMISSION_STATEMENT: &str =
    "CLOCKSS system has permission to ingest, preserve, and serve this Archival Unit";

/// Decides whether a manifest page grants crawl permission
///
/// Checkers may be shared between crawls and are called with the decoded
/// text of the page and its URL.
pub trait PermissionChecker: Send + Sync {
    fn check_permission(&self, content: &str, permission_url: &str) -> bool;

    fn name(&self) -> &str;
}

/// Grants permission when the page contains one of a set of statements
///
/// Matching ignores case and treats any run of whitespace, including line
/// breaks, as a single space.
#[derive(Debug, Clone)]
pub struct StatementPermissionChecker {
    statements: Vec<String>,
}

impl StatementPermissionChecker {
    pub fn new<I, S>(statements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            statements: statements
                .into_iter()
                .map(|s| collapse_whitespace(s.as_ref()))
                .collect(),
        }
    }

    /// Accepts the LOCKSS and CLOCKSS statements
    pub fn lockss() -> Self {
        Self::new([LOCKSS_PERMISSION_STATEMENT, CLOCKSS_PERMISSION_STATEMENT])
    }
}

impl PermissionChecker for StatementPermissionChecker {
    fn check_permission(&self, content: &str, permission_url: &str) -> bool {
        let text = collapse_whitespace(content);
        let found = self.statements.iter().any(|s| text.contains(s.as_str()));
        if !found {
            tracing::debug!("No permission statement found on {}", permission_url);
        }
        found
    }

    fn name(&self) -> &str {
        "statement"
    }
}

/// Builds the daemon-wide checkers named in configuration
pub fn checkers_for(kinds: &[CheckerKind]) -> Vec<Arc<dyn PermissionChecker>> {
    kinds
        .iter()
        .map(|kind| -> Arc<dyn PermissionChecker> {
            match kind {
                CheckerKind::Statement => Arc::new(StatementPermissionChecker::lockss()),
                CheckerKind::CreativeCommons => Arc::new(CreativeCommonsPermissionChecker),
            }
        })
        .collect()
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Grants permission when the page links a Creative Commons license
///
/// Looks for `<a rel="license">` or `<link rel="license">` whose target is
/// on creativecommons.org.
#[derive(Debug, Clone, Copy, Default)]
pub struct CreativeCommonsPermissionChecker;

impl PermissionChecker for CreativeCommonsPermissionChecker {
    fn check_permission(&self, content: &str, permission_url: &str) -> bool {
        let Ok(selector) = Selector::parse("a[rel][href], link[rel][href]") else {
            return false;
        };
        let base = Url::parse(permission_url).ok();
        let document = Html::parse_document(content);

        document.select(&selector).any(|element| {
            let is_license = element
                .value()
                .attr("rel")
                .map(|rel| rel.split_whitespace().any(|r| r.eq_ignore_ascii_case("license")))
                .unwrap_or(false);

            is_license
                && element
                    .value()
                    .attr("href")
                    .and_then(|href| match &base {
                        Some(base) => base.join(href).ok(),
                        None => Url::parse(href).ok(),
                    })
                    .and_then(|url| url.host_str().map(|h| h.to_ascii_lowercase()))
                    .map(|host| host == "creativecommons.org" || host.ends_with(".creativecommons.org"))
                    .unwrap_or(false)
        })
    }

    fn name(&self) -> &str {
        "creative-commons"
    }
}
