//! Crawl permission gating
//!
//! No content of an archival unit may be fetched before a manifest page on
//! the same host has granted permission. This module tracks one
//! [`PermissionRecord`] per manifest page and resolves every content URL to
//! the record that governs it.
//!
//! # Components
//!
//! - `PermissionRecord` / `PermissionStatus`: one manifest page and its state
//! - `PermissionChecker`: decides whether a fetched manifest grants permission
//! - `PermissionMap`: content URL to record resolution and the probe routine
//! - `PermissionHelper`: fetches and stores manifest pages for the map

mod checker;
mod map;
mod record;

pub use checker::{
    checkers_for, CreativeCommonsPermissionChecker, PermissionChecker, StatementPermissionChecker,
    CLOCKSS_PERMISSION_STATEMENT, LOCKSS_PERMISSION_STATEMENT,
};
pub use map::{PermissionMap, PermissionMapBuilder};
pub use record::{PermissionRecord, PermissionStatus};

use crate::crawler::{FetchError, FetchedContent};
use crate::storage::StorageResult;
use async_trait::async_trait;

/// Status message recorded when a manifest page lacks a permission statement
pub const NO_PERMISSION_STATEMENT_MSG: &str = "No permission statement on manifest page.";

/// Status message recorded when the crawl window stops a manifest probe
pub const WINDOW_CLOSED_MSG: &str = "Crawl window closed, aborting permission check.";

/// Fetches and stores manifest pages on behalf of a `PermissionMap`
#[async_trait]
pub trait PermissionHelper: Send + Sync {
    /// Fetches a manifest page
    async fn fetch_permission_page(&self, url: &str) -> Result<FetchedContent, FetchError>;

    /// Stores a manifest page that granted permission
    fn store_permission_page(&self, unit_id: &str, page: &FetchedContent) -> StorageResult<()>;
}
