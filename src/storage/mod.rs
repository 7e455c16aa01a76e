//! Storage module for crawled content and per-unit crawl history
//!
//! This module handles persistence for the crawler, including:
//! - SQLite database initialization and schema management
//! - Content fetched for each archival unit, permission pages included
//! - `AuState` records that survive between runs

mod memory;
mod schema;
mod sqlite;
mod traits;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{ContentStore, StorageError, StorageResult};

use chrono::{DateTime, Utc};
use std::path::Path;

/// Opens or creates the SQLite content store
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStore)` - Successfully opened store
/// * `Err(StorageError)` - Failed to open or initialize the database
pub fn open_store(path: &Path) -> StorageResult<SqliteStore> {
    SqliteStore::new(path)
}

/// A stored copy of fetched content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredContent {
    pub unit_id: String,
    pub url: String,
    pub final_url: String,
    pub content_type: String,
    pub status_code: u16,
    pub body: Vec<u8>,
    pub fetched_at: DateTime<Utc>,
}
