use crate::config::{OaiConfig, StartPermissionPolicy};
use crate::crawler::abort::AbortSignal;
use crate::crawler::facade::CrawlerFacade;
use crate::crawler::fetcher::{FetchError, FetchedContent, Fetcher};
use crate::crawler::oai::OaiHarvester;
use crate::crawler::pacer::Pacer;
use crate::crawler::queue::{CrawlQueue, CrawlUrlData};
use crate::crawler::seed::{CrawlSeed, OaiCrawlSeed};
use crate::crawler::spec::CrawlSpec;
use crate::crawler::status::{
    CrawlStatus, CrawlStatusCode, Severity, HOST_PERM_ERR_MSG, START_URL_ERR_MSG,
};
use crate::crawler::unit::ArchivalUnit;
use crate::parser::ContentParser;
use crate::permission::{PermissionChecker, PermissionMap};
use crate::state::{AuState, CrawlPhase};
use crate::storage::ContentStore;
use crate::url::normalize_url;
use crate::CrawlError;
use chrono::{NaiveDate, Utc};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::io::Cursor;
use std::sync::Arc;
use url::Url;

const ABORTED_BEFORE_START_MSG: &str = "Crawl aborted before start";
const ABORTED_MSG: &str = "Crawl aborted";
const START_URL_NOT_IN_RULES_MSG: &str = "Start URL from CrawlSeed not within crawl rules";

/// Called once at the end of every crawl, whatever its outcome
pub trait CrawlEndHook: Send + Sync {
    fn crawl_ended(&self, status: &CrawlStatus, phase: CrawlPhase);
}

/// Result of handling one frontier entry
enum FetchOutcome {
    /// Content was fetched and stored
    Fetched(FetchedContent),
    /// Nothing to parse; the crawl continues
    Skipped,
    /// The crawl must stop
    Terminate,
}

/// Bookkeeping of one pass over the frontier
#[derive(Default)]
struct CrawlTracker {
    processed: HashSet<String>,
    too_deep: BTreeMap<String, CrawlUrlData>,
    excluded: HashSet<String>,
    failed: HashSet<String>,
    hi_depth: u32,
}

/// Crawls one archival unit
///
/// The crawler seeds its frontier from the unit's crawl seed, obtains
/// permission from the unit's manifest pages, then drains the frontier in
/// order: every URL is checked against the permission map, fetched, stored,
/// and, when a parser exists for its content type, parsed for links that
/// are filtered by the crawl rules and the depth limit before being queued.
pub struct Crawler {
    unit: Arc<dyn ArchivalUnit>,
    spec: CrawlSpec,
    state: AuState,
    fetcher: Arc<dyn Fetcher>,
    store: Arc<dyn ContentStore>,
    daemon_checkers: Vec<Arc<dyn PermissionChecker>>,
    globally_permitted_hosts: Vec<String>,
    start_permission_policy: StartPermissionPolicy,
    pacer: Arc<Pacer>,
    abort: AbortSignal,
    hooks: Vec<Arc<dyn CrawlEndHook>>,
    http_client: Option<reqwest::Client>,
    status: CrawlStatus,
}

impl Crawler {
    pub fn builder() -> CrawlerBuilder {
        CrawlerBuilder::default()
    }

    pub fn status(&self) -> &CrawlStatus {
        &self.status
    }

    pub fn state(&self) -> &AuState {
        &self.state
    }

    pub fn unit(&self) -> &dyn ArchivalUnit {
        self.unit.as_ref()
    }

    /// Signal that stops this crawl when raised
    pub fn abort_signal(&self) -> AbortSignal {
        self.abort.clone()
    }

    /// Runs the crawl to completion
    ///
    /// End-of-crawl hooks run exactly once on every path, and the unit's
    /// crawl history is updated and saved.
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlPhase)` - The terminal phase (success, error or aborted)
    /// * `Err(CrawlError::Definition)` - The crawl definition is incomplete
    /// * `Err(CrawlError)` - The crawl was already run, or an internal
    ///   invariant was violated
    pub async fn do_crawl(&mut self) -> Result<CrawlPhase, CrawlError> {
        self.status.signal_crawl_started()?;
        self.state.new_crawl_started(Utc::now());

        let result = self.do_crawl0().await;
        if let Err(e) = &result {
            tracing::error!("Crawl of {} failed: {}", self.unit.id(), e);
            let code = match e {
                CrawlError::Definition(_) => CrawlStatusCode::PluginError,
                _ => CrawlStatusCode::Error,
            };
            self.status.set_crawl_status(code, Some(&e.to_string()));
        }

        let phase = self.status.signal_crawl_ended()?;
        self.state
            .new_crawl_finished(phase, self.status.crawl_error_message(), Utc::now());
        if let Err(e) = self.store.save_au_state(&self.state) {
            tracing::error!("Failed to save crawl state of {}: {}", self.unit.id(), e);
        }

        for hook in &self.hooks {
            hook.crawl_ended(&self.status, phase);
        }

        if self.status.is_crawl_error() {
            tracing::info!(
                "Unfinished crawl of {}, {}",
                self.unit.id(),
                self.status.crawl_error_message()
            );
        } else {
            tracing::info!("Finished crawl of {}", self.unit.id());
        }

        result.map(|()| phase)
    }

    async fn do_crawl0(&mut self) -> Result<(), CrawlError> {
        if self.abort.is_aborted() {
            self.aborted(ABORTED_BEFORE_START_MSG);
            return Ok(());
        }

        let seed = self.make_seed()?;
        seed.check_definition()?;
        let follow_links = seed.should_follow_links();
        let max_depth = seed.spec().max_depth();

        tracing::info!(
            "Beginning crawl, max depth: {} {}of {}",
            max_depth,
            if follow_links { "" } else { "(no follow) " },
            self.unit.id()
        );

        let helper = Arc::new(CrawlerFacade::new(
            self.fetcher.clone(),
            self.store.clone(),
            self.pacer.clone(),
        ));
        let mut permission_map = PermissionMap::builder()
            .unit(self.unit.clone())
            .helper(helper)
            .permission_urls(seed.permission_urls()?)
            .daemon_checkers(self.daemon_checkers.clone())
            .globally_permitted_hosts(self.globally_permitted_hosts.clone())
            .abort_signal(self.abort.clone())
            .build()?;

        if !permission_map.init(&mut self.status).await {
            if self.abort.is_aborted() {
                self.aborted(ABORTED_MSG);
                return Ok(());
            }
            if !self.status.is_crawl_error() {
                self.status
                    .set_crawl_status(CrawlStatusCode::NoPubPermission, None);
            }
            return Ok(());
        }

        let start_urls = match seed.start_urls().await {
            Ok(urls) => urls,
            Err(CrawlError::Oai(e)) => {
                tracing::error!("Unable to harvest start URLs: {}", e);
                self.status
                    .set_crawl_status(CrawlStatusCode::FetchError, Some(&e.to_string()));
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let mut queue = CrawlQueue::with_comparator(self.unit.url_comparator());
        self.enqueue_start_urls(&start_urls, &mut queue)?;

        if self.abort.is_aborted() {
            self.aborted(ABORTED_BEFORE_START_MSG);
            return Ok(());
        }

        let fail_on_start = seed.fail_on_start_url_error();
        let mut tracker = CrawlTracker::default();

        while !queue.is_empty() {
            if self.abort.is_aborted() {
                self.status.update_depth(tracker.hi_depth);
                self.aborted(ABORTED_MSG);
                return Ok(());
            }

            if !self.unit.in_crawl_window(Utc::now()) {
                tracing::info!("Crawl window closed, stopping crawl of {}", self.unit.id());
                self.status
                    .set_crawl_status(CrawlStatusCode::WindowClosed, None);
                self.status.update_depth(tracker.hi_depth);
                return Ok(());
            }

            let curl = queue.remove()?;
            tracing::trace!("Removed from queue: {:?}", curl);
            tracker.hi_depth = tracker.hi_depth.max(curl.depth);
            self.status.remove_pending_url(&curl.url);

            let outcome = self
                .fetch(&curl, &mut permission_map, &mut tracker, fail_on_start)
                .await;

            match outcome {
                FetchOutcome::Fetched(content) if follow_links => {
                    self.parse(&curl, &content, &mut queue, &mut tracker, max_depth)?;
                }
                FetchOutcome::Fetched(_) | FetchOutcome::Skipped => {}
                FetchOutcome::Terminate => {
                    self.status.update_depth(tracker.hi_depth);
                    return Ok(());
                }
            }

            tracker.processed.insert(curl.url);
        }

        self.status.update_depth(tracker.hi_depth);

        if !tracker.too_deep.is_empty() {
            let msg = format!("Site depth exceeds max crawl depth ({})", max_depth);
            tracing::error!("{}. Stopped crawl of {}", msg, self.unit.id());
            tracing::debug!("Too deep URLs: {:?}", tracker.too_deep.keys());
            self.status
                .set_crawl_status(CrawlStatusCode::Error, Some(&msg));
        } else {
            tracing::info!(
                "Crawled depth = {}, fetched {} bytes in {} files",
                tracker.hi_depth,
                self.status.content_bytes_fetched(),
                self.status.urls_fetched().len()
            );
        }

        Ok(())
    }

    fn make_seed(&self) -> Result<CrawlSeed, CrawlError> {
        let Some(oai) = self.unit.oai() else {
            return Ok(CrawlSeed::Base(self.spec.clone()));
        };

        let client = self.http_client.clone().unwrap_or_default();
        Ok(CrawlSeed::Oai(OaiCrawlSeed::new(
            self.spec.clone(),
            OaiHarvester::new(client, OaiConfig::clone(oai)),
            self.oai_from_date(),
            Utc::now().date_naive(),
        )))
    }

    /// Date of the last successful crawl, or the epoch
    fn oai_from_date(&self) -> NaiveDate {
        self.state.last_crawl_date().unwrap_or_default()
    }

    fn aborted(&mut self, message: &str) {
        tracing::info!("{}: {}", message, self.unit.id());
        self.status
            .set_crawl_status(CrawlStatusCode::Aborted, Some(message));
    }

    fn enqueue_start_urls(
        &mut self,
        start_urls: &[String],
        queue: &mut CrawlQueue,
    ) -> Result<(), CrawlError> {
        self.status.set_start_urls(start_urls.to_vec());

        for url in start_urls {
            if queue.contains(url) {
                tracing::debug!("Duplicate start URL: {}", url);
                continue;
            }

            if self.spec.is_included(url) {
                queue.add(CrawlUrlData::new(url.as_str(), 0))?;
                self.status.add_pending_url(url);
            } else {
                self.status
                    .signal_error_with_severity(url, START_URL_NOT_IN_RULES_MSG, Severity::Error);
                self.status.set_crawl_status(
                    CrawlStatusCode::PluginError,
                    Some(START_URL_NOT_IN_RULES_MSG),
                );
            }
        }

        Ok(())
    }

    /// Whether a start URL refused permission stops the crawl
    fn refused_start_url_stops_crawl(&self, fail_on_start: bool) -> bool {
        match self.start_permission_policy {
            StartPermissionPolicy::Continue => false,
            StartPermissionPolicy::FailOnStartUrlError => fail_on_start,
            StartPermissionPolicy::Abort => true,
        }
    }

    async fn fetch(
        &mut self,
        curl: &CrawlUrlData,
        permission_map: &mut PermissionMap,
        tracker: &mut CrawlTracker,
        fail_on_start: bool,
    ) -> FetchOutcome {
        let url = curl.url.as_str();

        if tracker.failed.contains(url) {
            tracing::debug!("Already failed to cache {}. Not retrying.", url);
            return FetchOutcome::Skipped;
        }

        if !permission_map.has_permission(url, &mut self.status).await {
            if self.abort.is_aborted() {
                self.aborted(ABORTED_MSG);
                return FetchOutcome::Terminate;
            }
            if !self.status.is_crawl_error() {
                self.status.set_crawl_status(
                    CrawlStatusCode::NoPubPermission,
                    Some(HOST_PERM_ERR_MSG),
                );
            }
            tracker.failed.insert(url.to_string());

            if curl.is_start_url() && self.refused_start_url_stops_crawl(fail_on_start) {
                tracing::error!("No permission for start URL {}, stopping crawl", url);
                return FetchOutcome::Terminate;
            }
            return FetchOutcome::Skipped;
        }

        self.pacer.pace().await;
        tracing::debug!("Fetching {}", url);

        let content = match self.fetcher.fetch(url).await {
            Ok(content) => content,
            Err(e) => {
                tracker.failed.insert(url.to_string());
                return self.fetch_failed(curl, e, fail_on_start);
            }
        };

        self.status.signal_url_fetched(url);
        self.status
            .add_content_bytes_fetched(content.body.len() as u64);

        if let Err(e) = self.store.store_content(self.unit.id(), &content) {
            tracing::error!("Can't store {}: {}", url, e);
            self.status.signal_error_with_severity(
                url,
                &format!("Can't store page: {}", e),
                Severity::Error,
            );
            if !self.status.is_crawl_error() {
                self.status.set_crawl_status(CrawlStatusCode::RepoError, None);
            }
            return FetchOutcome::Skipped;
        }

        FetchOutcome::Fetched(content)
    }

    fn fetch_failed(
        &mut self,
        curl: &CrawlUrlData,
        error: FetchError,
        fail_on_start: bool,
    ) -> FetchOutcome {
        let url = curl.url.as_str();
        let message = error.to_string();

        if curl.is_start_url() && fail_on_start {
            tracing::error!("{}: {}", START_URL_ERR_MSG, url);
            self.status
                .signal_error_with_severity(url, &message, Severity::Error);
            self.status
                .set_crawl_status(CrawlStatusCode::FetchError, Some(START_URL_ERR_MSG));
            return FetchOutcome::Terminate;
        }

        match error {
            FetchError::Http { .. } => {
                tracing::warn!("{}", message);
                self.status.signal_error_for_url(url, &message);
            }
            _ => {
                tracing::warn!("{}", message);
                self.status
                    .signal_error_with_severity(url, &message, Severity::Error);
                if !self.status.is_crawl_error() {
                    self.status
                        .set_crawl_status(CrawlStatusCode::FetchError, Some(&message));
                }
            }
        }

        FetchOutcome::Skipped
    }

    fn parse(
        &mut self,
        curl: &CrawlUrlData,
        content: &FetchedContent,
        queue: &mut CrawlQueue,
        tracker: &mut CrawlTracker,
        max_depth: u32,
    ) -> Result<(), CrawlError> {
        let options = self.unit.parser_options();
        let Some(parser) = ContentParser::for_content_type(&content.content_type, &options) else {
            tracing::trace!("No parser for {} ({})", curl.url, content.content_type);
            return Ok(());
        };

        let base = Url::parse(&content.final_url)
            .or_else(|_| Url::parse(&curl.url))
            .ok();

        let mut found = Vec::new();
        let mut source = Cursor::new(content.body.as_slice());
        tracing::trace!("Parsing {} with {} parser", curl.url, parser.name());

        if let Err(e) = parser.parse_for_urls(&mut source, base.as_ref(), &mut |url: String| {
            found.push(url)
        }) {
            tracing::error!("Problem parsing {}: {}", curl.url, e);
            self.status
                .signal_error_with_severity(&curl.url, &e.to_string(), Severity::Error);
            if !self.status.is_crawl_error() {
                self.status
                    .set_crawl_status(CrawlStatusCode::ExtractorError, Some("Error parsing page"));
            }
            return Ok(());
        }

        self.status.signal_url_parsed(&curl.url);

        let mut children = HashSet::new();
        for link in found {
            self.found_link(curl, &link, base.as_ref(), &mut children, queue, tracker, max_depth)?;
        }

        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn found_link(
        &mut self,
        curl: &CrawlUrlData,
        link: &str,
        base: Option<&Url>,
        children: &mut HashSet<String>,
        queue: &mut CrawlQueue,
        tracker: &mut CrawlTracker,
        max_depth: u32,
    ) -> Result<(), CrawlError> {
        let url = match normalize_url(link, base) {
            Ok(url) => url.to_string(),
            Err(e) => {
                tracing::trace!("Skipping link {}: {}", link, e);
                return Ok(());
            }
        };

        if url == curl.url {
            tracing::trace!("Self reference to {}", url);
            return Ok(());
        }
        if !children.insert(url.clone()) {
            tracing::trace!("Redundant child: {}", url);
            return Ok(());
        }

        if tracker.processed.contains(&url)
            || queue.contains(&url)
            || tracker.too_deep.contains_key(&url)
            || tracker.excluded.contains(&url)
            || tracker.failed.contains(&url)
        {
            return Ok(());
        }

        if !self.spec.is_included(&url) {
            tracing::debug!("Excluded url: {}", url);
            self.status.signal_url_excluded(&url, None);
            tracker.excluded.insert(url);
            return Ok(());
        }

        let child = CrawlUrlData::child_of(url.as_str(), curl);
        if child.depth > max_depth {
            tracing::debug!("Too deep ({}): {}", child.depth, url);
            tracker.too_deep.insert(url, child);
        } else {
            tracing::debug!("Included url: {}", url);
            queue.add(child)?;
            self.status.add_pending_url(&url);
        }

        Ok(())
    }
}

impl fmt::Debug for Crawler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Crawler")
            .field("unit", &self.unit.id())
            .field("spec", &self.spec)
            .field("phase", &self.status.phase())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Crawler`]
///
/// The archival unit, crawl spec, crawl state, fetcher and content store
/// are required.
#[derive(Default)]
pub struct CrawlerBuilder {
    unit: Option<Arc<dyn ArchivalUnit>>,
    spec: Option<CrawlSpec>,
    state: Option<AuState>,
    fetcher: Option<Arc<dyn Fetcher>>,
    store: Option<Arc<dyn ContentStore>>,
    daemon_checkers: Vec<Arc<dyn PermissionChecker>>,
    globally_permitted_hosts: Vec<String>,
    start_permission_policy: StartPermissionPolicy,
    pacer: Option<Arc<Pacer>>,
    abort: Option<AbortSignal>,
    hooks: Vec<Arc<dyn CrawlEndHook>>,
    http_client: Option<reqwest::Client>,
}

impl CrawlerBuilder {
    pub fn unit(mut self, unit: Arc<dyn ArchivalUnit>) -> Self {
        self.unit = Some(unit);
        self
    }

    pub fn spec(mut self, spec: CrawlSpec) -> Self {
        self.spec = Some(spec);
        self
    }

    pub fn state(mut self, state: AuState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn store(mut self, store: Arc<dyn ContentStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn daemon_checkers(mut self, checkers: Vec<Arc<dyn PermissionChecker>>) -> Self {
        self.daemon_checkers = checkers;
        self
    }

    pub fn globally_permitted_hosts(mut self, hosts: Vec<String>) -> Self {
        self.globally_permitted_hosts = hosts;
        self
    }

    pub fn start_permission_policy(mut self, policy: StartPermissionPolicy) -> Self {
        self.start_permission_policy = policy;
        self
    }

    pub fn pacer(mut self, pacer: Arc<Pacer>) -> Self {
        self.pacer = Some(pacer);
        self
    }

    pub fn abort_signal(mut self, abort: AbortSignal) -> Self {
        self.abort = Some(abort);
        self
    }

    pub fn end_hook(mut self, hook: Arc<dyn CrawlEndHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Client used for OAI-PMH requests
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Builds the crawler
    ///
    /// # Returns
    ///
    /// * `Ok(Crawler)` - A crawler that has not started
    /// * `Err(CrawlError::InvalidArgument)` - A required collaborator is missing
    pub fn build(self) -> Result<Crawler, CrawlError> {
        let unit = self
            .unit
            .ok_or_else(|| missing("archival unit"))?;
        let spec = self.spec.ok_or_else(|| missing("crawl spec"))?;
        let state = self.state.ok_or_else(|| missing("crawl state"))?;
        let fetcher = self.fetcher.ok_or_else(|| missing("fetcher"))?;
        let store = self.store.ok_or_else(|| missing("content store"))?;

        let status = CrawlStatus::new(unit.id());

        Ok(Crawler {
            unit,
            spec,
            state,
            fetcher,
            store,
            daemon_checkers: self.daemon_checkers,
            globally_permitted_hosts: self.globally_permitted_hosts,
            start_permission_policy: self.start_permission_policy,
            pacer: self.pacer.unwrap_or_default(),
            abort: self.abort.unwrap_or_default(),
            hooks: self.hooks,
            http_client: self.http_client,
            status,
        })
    }
}

fn missing(what: &str) -> CrawlError {
    CrawlError::InvalidArgument(format!("Called with null {}", what))
}
