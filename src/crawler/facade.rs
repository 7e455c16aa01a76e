use crate::crawler::fetcher::{FetchError, FetchedContent, Fetcher};
use crate::crawler::pacer::Pacer;
use crate::permission::PermissionHelper;
use crate::storage::{ContentStore, StorageResult};
use async_trait::async_trait;
use std::sync::Arc;

/// The crawler's fetch and store collaborators, as seen by its permission map
///
/// Manifest fetches go through the same pacer as content fetches.
pub struct CrawlerFacade {
    fetcher: Arc<dyn Fetcher>,
    store: Arc<dyn ContentStore>,
    pacer: Arc<Pacer>,
}

impl CrawlerFacade {
    pub fn new(fetcher: Arc<dyn Fetcher>, store: Arc<dyn ContentStore>, pacer: Arc<Pacer>) -> Self {
        Self {
            fetcher,
            store,
            pacer,
        }
    }
}

#[async_trait]
impl PermissionHelper for CrawlerFacade {
    async fn fetch_permission_page(&self, url: &str) -> Result<FetchedContent, FetchError> {
        self.pacer.pace().await;
        self.fetcher.fetch(url).await
    }

    fn store_permission_page(&self, unit_id: &str, page: &FetchedContent) -> StorageResult<()> {
        self.store.store_content(unit_id, page)
    }
}
