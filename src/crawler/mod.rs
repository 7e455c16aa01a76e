//! Crawl engine
//!
//! This module contains the core crawling logic, including:
//! - Archival units, crawl specs and crawl seeds
//! - The ordered crawl queue
//! - HTTP fetching and OAI-PMH harvesting
//! - Per-crawl status reporting
//! - The follow-link crawler itself

mod abort;
mod crawl;
mod facade;
mod fetcher;
mod oai;
mod pacer;
mod queue;
mod seed;
mod spec;
mod status;
mod unit;

pub use abort::AbortSignal;
pub use crawl::{CrawlEndHook, Crawler, CrawlerBuilder};
pub use facade::CrawlerFacade;
pub use fetcher::{build_http_client, FetchError, FetchedContent, Fetcher, HttpFetcher};
pub use oai::{parse_list_records, OaiError, OaiHarvester, OaiPage, OAI_DATE_FORMAT};
pub use pacer::Pacer;
pub use queue::{BreadthFirst, CrawlQueue, CrawlUrlData, DeepestFirst, QueueError, UrlComparator};
pub use seed::{CrawlSeed, OaiCrawlSeed};
pub use spec::CrawlSpec;
pub use status::{
    CrawlStatus, CrawlStatusCode, Severity, UrlErrorInfo, HOST_PERM_ERR_MSG,
    NO_PERM_STATEMENT_ERR_MSG, START_URL_ERR_MSG, UNABLE_TO_FETCH_PERM_ERR_MSG,
};
pub use unit::{ArchivalUnit, DefinableUnit};
