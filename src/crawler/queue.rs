//! The crawl frontier
//!
//! `CrawlQueue` holds discovered-but-not-yet-fetched URLs, keyed by URL and
//! drained in the total order given by a [`UrlComparator`].

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised when the queue contract is violated
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("URL already in crawl queue: {0}")]
    DuplicateUrl(String),

    #[error("Crawl queue is empty")]
    Empty,
}

/// A URL waiting in the frontier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlUrlData {
    /// The URL to fetch; identity of the entry
    pub url: String,

    /// Number of links followed from a start URL to reach this URL
    pub depth: u32,

    /// Page the URL was found on, if it was not a start URL
    pub referrer: Option<String>,
}

impl CrawlUrlData {
    pub fn new(url: impl Into<String>, depth: u32) -> Self {
        Self {
            url: url.into(),
            depth,
            referrer: None,
        }
    }

    /// Creates an entry for a link found on `referrer`
    pub fn child_of(url: impl Into<String>, referrer: &CrawlUrlData) -> Self {
        Self {
            url: url.into(),
            depth: referrer.depth + 1,
            referrer: Some(referrer.url.clone()),
        }
    }

    pub fn is_start_url(&self) -> bool {
        self.referrer.is_none() && self.depth == 0
    }
}

/// A total order over frontier entries
///
/// The queue drains the entry for which `compare` returns `Less` against
/// every other entry first. Entries the comparator reports as equal are
/// ordered by URL.
pub trait UrlComparator: Send + Sync {
    fn compare(&self, a: &CrawlUrlData, b: &CrawlUrlData) -> Ordering;
}

/// Shallow URLs first, then lexicographic by URL
#[derive(Debug, Clone, Copy, Default)]
pub struct BreadthFirst;

impl UrlComparator for BreadthFirst {
    fn compare(&self, a: &CrawlUrlData, b: &CrawlUrlData) -> Ordering {
        a.depth.cmp(&b.depth).then_with(|| a.url.cmp(&b.url))
    }
}

/// Deep URLs first, then reverse lexicographic by URL
#[derive(Debug, Clone, Copy, Default)]
pub struct DeepestFirst;

impl UrlComparator for DeepestFirst {
    fn compare(&self, a: &CrawlUrlData, b: &CrawlUrlData) -> Ordering {
        b.depth.cmp(&a.depth).then_with(|| b.url.cmp(&a.url))
    }
}

struct QueueEntry {
    data: CrawlUrlData,
    comparator: Arc<dyn UrlComparator>,
}

impl QueueEntry {
    fn order(&self, other: &Self) -> Ordering {
        self.comparator
            .compare(&self.data, &other.data)
            .then_with(|| self.data.url.cmp(&other.data.url))
    }
}

// BinaryHeap is a max-heap, so the comparator result is reversed to pop the
// order-minimum first
impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other.order(self)
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.data.url == other.data.url
    }
}

impl Eq for QueueEntry {}

/// Ordered, deduplicated work queue of URLs to crawl
pub struct CrawlQueue {
    comparator: Arc<dyn UrlComparator>,
    by_url: HashMap<String, CrawlUrlData>,
    heap: BinaryHeap<QueueEntry>,
}

impl CrawlQueue {
    /// Creates an empty breadth-first queue
    pub fn new() -> Self {
        Self::with_comparator(Arc::new(BreadthFirst))
    }

    /// Creates an empty queue ordered by `comparator`
    pub fn with_comparator(comparator: Arc<dyn UrlComparator>) -> Self {
        Self {
            comparator,
            by_url: HashMap::new(),
            heap: BinaryHeap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.by_url.is_empty()
    }

    pub fn len(&self) -> usize {
        self.by_url.len()
    }

    /// Returns the entry for `url`, if queued
    pub fn get(&self, url: &str) -> Option<&CrawlUrlData> {
        self.by_url.get(url)
    }

    pub fn contains(&self, url: &str) -> bool {
        self.by_url.contains_key(url)
    }

    /// Adds an entry to the queue
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The entry was queued
    /// * `Err(QueueError::DuplicateUrl)` - An entry with the same URL is already queued
    pub fn add(&mut self, item: CrawlUrlData) -> Result<(), QueueError> {
        if self.by_url.contains_key(&item.url) {
            return Err(QueueError::DuplicateUrl(item.url));
        }

        self.by_url.insert(item.url.clone(), item.clone());
        self.heap.push(QueueEntry {
            data: item,
            comparator: Arc::clone(&self.comparator),
        });
        Ok(())
    }

    /// Returns the order-minimum entry without removing it
    pub fn first(&self) -> Result<&CrawlUrlData, QueueError> {
        self.heap.peek().map(|e| &e.data).ok_or(QueueError::Empty)
    }

    /// Removes and returns the order-minimum entry
    pub fn remove(&mut self) -> Result<CrawlUrlData, QueueError> {
        let entry = self.heap.pop().ok_or(QueueError::Empty)?;
        self.by_url.remove(&entry.data.url);
        Ok(entry.data)
    }
}

impl Default for CrawlQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CrawlQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrawlQueue")
            .field("len", &self.len())
            .finish()
    }
}
