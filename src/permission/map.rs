use crate::crawler::{
    AbortSignal, ArchivalUnit, CrawlStatus, CrawlStatusCode, NO_PERM_STATEMENT_ERR_MSG,
    UNABLE_TO_FETCH_PERM_ERR_MSG,
};
use crate::permission::{
    PermissionChecker, PermissionHelper, PermissionRecord, PermissionStatus,
    NO_PERMISSION_STATEMENT_MSG, WINDOW_CLOSED_MSG,
};
use crate::url::{host_of, matches_any_host_pattern};
use crate::CrawlError;
use chrono::Utc;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use url::Url;

const MALFORMED_PERMISSION_URL_MSG: &str = "Malformed permission page url";

/// Resolves content URLs to the manifest page that governs them
///
/// Records are kept per (lower-cased) host: once a manifest page on a host
/// has granted permission, every URL on that host may be fetched. The map
/// belongs to one crawl and reports into that crawl's [`CrawlStatus`].
pub struct PermissionMap {
    unit: Arc<dyn ArchivalUnit>,
    helper: Arc<dyn PermissionHelper>,
    daemon_checkers: Vec<Arc<dyn PermissionChecker>>,
    plugin_checkers: Vec<Arc<dyn PermissionChecker>>,
    globally_permitted_hosts: Vec<String>,
    per_host_permission_path: Option<String>,
    permission_urls: Vec<String>,
    abort: AbortSignal,

    /// host -> governing record
    records: HashMap<String, PermissionRecord>,

    /// Pages skipped because their host already granted permission
    redundant: Vec<PermissionRecord>,
}

impl PermissionMap {
    pub fn builder() -> PermissionMapBuilder {
        PermissionMapBuilder::default()
    }

    /// Registers a manifest page as the record for its host
    ///
    /// Any previous record for the same host is replaced.
    ///
    /// # Returns
    ///
    /// * `Ok(&PermissionRecord)` - The new, unchecked record
    /// * `Err(CrawlError::InvalidArgument)` - The URL is empty or has no host
    pub fn create_record(&mut self, permission_url: &str) -> Result<&PermissionRecord, CrawlError> {
        if permission_url.trim().is_empty() {
            return Err(CrawlError::InvalidArgument(
                "Permission URL must not be empty".to_string(),
            ));
        }

        let host = host_of(permission_url).ok_or_else(|| {
            CrawlError::InvalidArgument(format!(
                "Malformed permission page URL: {}",
                permission_url
            ))
        })?;

        let record = PermissionRecord::new(permission_url, host.clone());
        self.records.insert(host.clone(), record);
        Ok(&self.records[&host])
    }

    /// Probes every permission URL before the crawl fetches any content
    ///
    /// Pages are grouped by host and tried in order until one grants
    /// permission for its host. When the unit has a per-host permission
    /// path, that page is tried last on every host.
    ///
    /// # Returns
    ///
    /// * `true` - Every host was granted permission
    /// * `false` - A host was refused, the window closed or the crawl was aborted
    pub async fn init(&mut self, status: &mut CrawlStatus) -> bool {
        let mut hosts: Vec<(String, Vec<String>)> = Vec::new();

        for page in &self.permission_urls {
            let Some(host) = host_of(page) else {
                tracing::error!("Malformed permission page URL: {}", page);
                status.signal_error_for_url(page, "Malformed permission page URL");
                return false;
            };

            match hosts.iter_mut().find(|(h, _)| *h == host) {
                Some((_, pages)) => pages.push(page.clone()),
                None => hosts.push((host, vec![page.clone()])),
            }
        }

        if let Some(path) = &self.per_host_permission_path {
            for (_, pages) in hosts.iter_mut() {
                if let Some(extra) = resolve_on_host(&pages[0], path) {
                    if !pages.contains(&extra) {
                        pages.push(extra);
                    }
                } else {
                    tracing::error!("Malformed permission page using permission path {}", path);
                }
            }
        }

        tracing::info!(
            "Checking permission for {} at {:?}",
            self.unit.id(),
            self.permission_urls
        );

        for (host, pages) in hosts {
            if !self.check_permission_on_host(&pages, &host, status).await {
                tracing::info!("Aborting because no permission on {}", host);
                return false;
            }
        }

        status.set_crawl_status(CrawlStatusCode::Active, None);
        true
    }

    async fn check_permission_on_host(
        &mut self,
        pages: &[String],
        host: &str,
        status: &mut CrawlStatus,
    ) -> bool {
        for page in pages {
            if let Some(previous) = self.records.get(host) {
                if previous.status() == PermissionStatus::Ok {
                    tracing::warn!(
                        "Already found permission on {}, skipping permission page {}",
                        host,
                        page
                    );
                    let mut skipped = PermissionRecord::new(page.as_str(), host);
                    skipped.set_status(PermissionStatus::MultiplePages);
                    self.redundant.push(skipped);
                    continue;
                }
                tracing::debug!(
                    "Previous permission page on {} had no permission, trying {}",
                    host,
                    page
                );
            }

            if self.abort.is_aborted() {
                tracing::debug!("Crawl aborted, skipping permission page {}", page);
                return false;
            }

            if let Err(e) = self.create_record(page) {
                tracing::error!("{}", e);
                status.signal_error_for_url(page, "Malformed permission page URL");
                continue;
            }

            match self.probe(host, status).await {
                PermissionStatus::Ok => {
                    tracing::debug!("Permission granted on host: {}", host);
                    status.signal_url_fetched(page);
                }
                PermissionStatus::CrawlWindowRefused => {
                    tracing::debug!("Crawl window closed, aborting crawl");
                    status.set_crawl_status(CrawlStatusCode::WindowClosed, Some(WINDOW_CLOSED_MSG));
                    return false;
                }
                _ => {}
            }
        }

        self.records
            .get(host)
            .map_or(false, |record| record.status() == PermissionStatus::Ok)
    }

    /// Fetches the host's manifest page and runs the checkers against it
    ///
    /// The crawl rules are consulted first, then the crawl window; only a
    /// page that passes both is fetched.
    async fn probe(&mut self, host: &str, status: &mut CrawlStatus) -> PermissionStatus {
        let page_url = match self.records.get_mut(host) {
            Some(record) => {
                record.record_probe();
                record.url().to_string()
            }
            None => return PermissionStatus::Missing,
        };
        tracing::debug!("Checking for permission on {}", page_url);

        let outcome = if !self.unit.should_be_cached(&page_url) {
            tracing::error!("Permission page not within CrawlSpec: {}", page_url);
            let msg = "Permission page not within CrawlSpec";
            status.signal_error_for_url_with_status(
                &page_url,
                msg,
                CrawlStatusCode::PluginError,
                Some(msg),
            );
            PermissionStatus::NotInCrawlSpec
        } else if !self.unit.in_crawl_window(Utc::now()) {
            tracing::debug!("{}", WINDOW_CLOSED_MSG);
            status.set_crawl_status(CrawlStatusCode::WindowClosed, Some(WINDOW_CLOSED_MSG));
            PermissionStatus::CrawlWindowRefused
        } else {
            self.fetch_and_check(&page_url, status).await
        };

        if let Some(record) = self.records.get_mut(host) {
            record.set_status(outcome);
        }
        outcome
    }

    async fn fetch_and_check(&self, page_url: &str, status: &mut CrawlStatus) -> PermissionStatus {
        let page = match self.helper.fetch_permission_page(page_url).await {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!("Failed to fetch permission page {}: {}", page_url, e);
                status.signal_error_for_url_with_status(
                    page_url,
                    &e.to_string(),
                    CrawlStatusCode::NoPubPermission,
                    Some(UNABLE_TO_FETCH_PERM_ERR_MSG),
                );
                return PermissionStatus::FetchFailed;
            }
        };

        let text = page.text();
        let granted = self
            .daemon_checkers
            .iter()
            .chain(self.plugin_checkers.iter())
            .all(|checker| checker.check_permission(&text, page_url));

        if !granted {
            tracing::warn!("No permission statement at {}", page_url);
            status.signal_error_for_url_no_override(
                page_url,
                NO_PERM_STATEMENT_ERR_MSG,
                CrawlStatusCode::NoPubPermission,
            );
            return PermissionStatus::NotOk;
        }

        match self.helper.store_permission_page(self.unit.id(), &page) {
            Ok(()) => PermissionStatus::Ok,
            Err(e) => {
                tracing::error!("Repository error storing permission page {}: {}", page_url, e);
                status.signal_error_for_url_with_status(
                    page_url,
                    &format!("Can't store page: {}", e),
                    CrawlStatusCode::RepoError,
                    None,
                );
                PermissionStatus::IoException
            }
        }
    }

    /// Returns true if the content URL may be fetched
    ///
    /// Unchecked manifest pages are probed on demand, and a page that could
    /// not be fetched is probed once more before permission is refused.
    /// Every refusal records its reason on `status`.
    pub async fn has_permission(&mut self, url: &str, status: &mut CrawlStatus) -> bool {
        let mut retry_if_failed = true;

        loop {
            if self.abort.is_aborted() {
                tracing::debug!("Crawl aborted, not checking permission for {}", url);
                return false;
            }
            tracing::trace!("Checking permission for {}", url);

            let host = match self.resolve(url) {
                Ok(host) => host,
                Err(_) => {
                    tracing::error!("{}: {}", MALFORMED_PERMISSION_URL_MSG, url);
                    status.signal_error_for_url_with_status(
                        url,
                        &format!("{}: {}", MALFORMED_PERMISSION_URL_MSG, url),
                        CrawlStatusCode::PluginError,
                        Some(MALFORMED_PERMISSION_URL_MSG),
                    );
                    return false;
                }
            };

            let (current, page_url) = match host.as_deref().and_then(|h| self.records.get(h)) {
                Some(record) => (record.status(), record.url().to_string()),
                None => (PermissionStatus::Missing, url.to_string()),
            };

            match current {
                PermissionStatus::Ok => return true,
                PermissionStatus::NotOk => {
                    tracing::warn!("No permission statement on manifest page: {}", page_url);
                    status.set_crawl_status(
                        CrawlStatusCode::NoPubPermission,
                        Some(NO_PERMISSION_STATEMENT_MSG),
                    );
                    return false;
                }
                PermissionStatus::Missing => {
                    tracing::error!(
                        "Plugin error: no permission page specified for host of: {}",
                        url
                    );
                    if status.error_for_url(url).is_none() {
                        status.signal_error_for_url(url, "No permission URL for this host");
                    }
                    status.set_crawl_status(
                        CrawlStatusCode::NoPubPermission,
                        Some("Plugin error (missing permission URL)"),
                    );
                    return false;
                }
                PermissionStatus::NotInCrawlSpec => {
                    let msg = "Permission page not in crawl spec";
                    tracing::error!("{}: {}", msg, url);
                    if status.error_for_url(&page_url).is_none() {
                        status.signal_error_for_url(url, msg);
                    }
                    status.set_crawl_status(CrawlStatusCode::PluginError, Some(msg));
                    return false;
                }
                PermissionStatus::Unchecked => {
                    tracing::debug!("Permission unchecked for host: {}", page_url);
                    if let Some(host) = host.as_deref() {
                        self.probe(host, status).await;
                    }
                    retry_if_failed = false;
                }
                PermissionStatus::FetchFailed if retry_if_failed => {
                    tracing::warn!("Failed to fetch permission page, retrying: {}", page_url);
                    if let Some(host) = host.as_deref() {
                        self.probe(host, status).await;
                    }
                    retry_if_failed = false;
                }
                PermissionStatus::FetchFailed => {
                    tracing::error!(
                        "Can't fetch permission page on second attempt: {}",
                        page_url
                    );
                    if status.error_for_url(&page_url).is_none() {
                        status.signal_error_for_url(
                            &page_url,
                            "Cannot fetch permission page on the second attempt",
                        );
                    }
                    status.set_crawl_status(
                        CrawlStatusCode::NoPubPermission,
                        Some("Cannot fetch permission page."),
                    );
                    return false;
                }
                PermissionStatus::CrawlWindowRefused => {
                    tracing::debug!(
                        "Couldn't fetch permission page because crawl window was closed"
                    );
                    status.set_crawl_status(CrawlStatusCode::WindowClosed, Some(WINDOW_CLOSED_MSG));
                    return false;
                }
                PermissionStatus::IoException => {
                    let msg = "Repository error storing permission page";
                    tracing::error!("Error trying to store: {}", page_url);
                    if status.error_for_url(&page_url).is_none() {
                        status.signal_error_for_url(&page_url, msg);
                    }
                    status.set_crawl_status(CrawlStatusCode::RepoError, Some(msg));
                    return false;
                }
                PermissionStatus::MultiplePages => {
                    tracing::error!("Unexpected permission status {} for {}", current, page_url);
                    return false;
                }
            }
        }
    }

    /// Finds or creates the record governing a content URL
    ///
    /// # Returns
    ///
    /// * `Ok(Some(host))` - The key of the governing record
    /// * `Ok(None)` - No manifest page governs the URL's host
    /// * `Err(CrawlError)` - The URL has no host
    fn resolve(&mut self, url: &str) -> Result<Option<String>, CrawlError> {
        let host = host_of(url).ok_or_else(|| {
            CrawlError::InvalidArgument(format!("{}: {}", MALFORMED_PERMISSION_URL_MSG, url))
        })?;

        if self.records.contains_key(&host) {
            return Ok(Some(host));
        }

        if matches_any_host_pattern(&self.globally_permitted_hosts, &host) {
            tracing::debug!("Creating globally permitted host PermissionRecord: {}", url);
            self.create_record(url)?;
            self.set_status_for_host(&host, PermissionStatus::Ok);
            return Ok(Some(host));
        }

        if matches_any_host_pattern(self.unit.permitted_host_patterns(), &host) {
            tracing::debug!("Creating plugin permitted host PermissionRecord: {}", url);
            self.create_record(url)?;
            self.set_status_for_host(&host, PermissionStatus::Ok);
            return Ok(Some(host));
        }

        if let Some(path) = self.per_host_permission_path.clone() {
            if let Some(page) = resolve_on_host(url, &path) {
                tracing::debug!("Creating per-host PermissionRecord: {}", page);
                let key = self.create_record(&page)?.host().to_string();
                return Ok(Some(key));
            }
        }

        Ok(None)
    }

    fn set_status_for_host(&mut self, host: &str, status: PermissionStatus) {
        if let Some(record) = self.records.get_mut(host) {
            record.set_status(status);
        }
    }

    /// Permission status governing a content URL
    pub fn status_of(&mut self, url: &str) -> PermissionStatus {
        match self.resolve(url) {
            Ok(Some(host)) => self
                .records
                .get(&host)
                .map_or(PermissionStatus::Missing, PermissionRecord::status),
            _ => PermissionStatus::Missing,
        }
    }

    /// URL of the manifest page governing a content URL
    pub fn permission_url_for(&mut self, url: &str) -> Option<String> {
        let host = self.resolve(url).ok()??;
        self.records.get(&host).map(|record| record.url().to_string())
    }

    /// Overrides the status of the record governing `url`
    pub fn set_permission_result(&mut self, url: &str, status: PermissionStatus) {
        if let Ok(Some(host)) = self.resolve(url) {
            self.set_status_for_host(&host, status);
        }
    }

    pub fn record_for_host(&self, host: &str) -> Option<&PermissionRecord> {
        self.records.get(&host.to_ascii_lowercase())
    }

    pub fn records(&self) -> impl Iterator<Item = &PermissionRecord> {
        self.records.values()
    }

    /// Manifest pages recorded as `MultiplePages` during `init`
    pub fn redundant_pages(&self) -> &[PermissionRecord] {
        &self.redundant
    }

    pub fn daemon_checkers(&self) -> &[Arc<dyn PermissionChecker>] {
        &self.daemon_checkers
    }

    pub fn plugin_checkers(&self) -> &[Arc<dyn PermissionChecker>] {
        &self.plugin_checkers
    }

    pub fn per_host_permission_path(&self) -> Option<&str> {
        self.per_host_permission_path.as_deref()
    }
}

impl fmt::Debug for PermissionMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PermissionMap")
            .field("unit", &self.unit.id())
            .field("permission_urls", &self.permission_urls)
            .field("records", &self.records)
            .finish_non_exhaustive()
    }
}

/// Resolves an absolute path against the scheme, host and port of `url`
fn resolve_on_host(url: &str, path: &str) -> Option<String> {
    let base = Url::parse(url).ok()?;
    let page = base.join(path).ok()?;
    (page.host_str() == base.host_str()).then(|| page.into())
}

/// Builder for [`PermissionMap`]
///
/// The archival unit and the permission helper are required.
#[derive(Default)]
pub struct PermissionMapBuilder {
    unit: Option<Arc<dyn ArchivalUnit>>,
    helper: Option<Arc<dyn PermissionHelper>>,
    permission_urls: Vec<String>,
    daemon_checkers: Vec<Arc<dyn PermissionChecker>>,
    plugin_checkers: Option<Vec<Arc<dyn PermissionChecker>>>,
    globally_permitted_hosts: Vec<String>,
    abort: Option<AbortSignal>,
}

impl PermissionMapBuilder {
    pub fn unit(mut self, unit: Arc<dyn ArchivalUnit>) -> Self {
        self.unit = Some(unit);
        self
    }

    pub fn helper(mut self, helper: Arc<dyn PermissionHelper>) -> Self {
        self.helper = Some(helper);
        self
    }

    pub fn permission_urls(mut self, urls: Vec<String>) -> Self {
        self.permission_urls = urls;
        self
    }

    pub fn daemon_checkers(mut self, checkers: Vec<Arc<dyn PermissionChecker>>) -> Self {
        self.daemon_checkers = checkers;
        self
    }

    /// Overrides the checkers supplied by the unit
    pub fn plugin_checkers(mut self, checkers: Vec<Arc<dyn PermissionChecker>>) -> Self {
        self.plugin_checkers = Some(checkers);
        self
    }

    pub fn globally_permitted_hosts(mut self, hosts: Vec<String>) -> Self {
        self.globally_permitted_hosts = hosts;
        self
    }

    pub fn abort_signal(mut self, abort: AbortSignal) -> Self {
        self.abort = Some(abort);
        self
    }

    /// Builds the map
    ///
    /// # Returns
    ///
    /// * `Ok(PermissionMap)` - The map, with no records yet
    /// * `Err(CrawlError::InvalidArgument)` - The unit or helper is missing, or
    ///   the unit's per-host permission path is not absolute
    pub fn build(self) -> Result<PermissionMap, CrawlError> {
        let unit = self.unit.ok_or_else(|| {
            CrawlError::InvalidArgument("Called with null archival unit".to_string())
        })?;
        let helper = self.helper.ok_or_else(|| {
            CrawlError::InvalidArgument("Called with null permission helper".to_string())
        })?;

        let per_host_permission_path = unit.per_host_permission_path().map(str::to_string);
        if let Some(path) = &per_host_permission_path {
            if !path.starts_with('/') || path.starts_with("//") {
                return Err(CrawlError::InvalidArgument(format!(
                    "Per-host permission path must be an absolute path on the host: {}",
                    path
                )));
            }
        }

        let plugin_checkers = self
            .plugin_checkers
            .unwrap_or_else(|| unit.plugin_permission_checkers());

        Ok(PermissionMap {
            unit,
            helper,
            daemon_checkers: self.daemon_checkers,
            plugin_checkers,
            globally_permitted_hosts: self.globally_permitted_hosts,
            per_host_permission_path,
            permission_urls: self.permission_urls,
            abort: self.abort.unwrap_or_default(),
            records: HashMap::new(),
            redundant: Vec::new(),
        })
    }
}
