//! Storage traits and error types
//!
//! This module defines the trait interface for content stores and
//! associated error types.

use crate::crawler::FetchedContent;
use crate::state::AuState;
use crate::storage::StoredContent;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Storage lock poisoned")]
    LockPoisoned,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for content store implementations
///
/// A single store is shared by every crawl running in the process, so
/// implementations take `&self` and synchronize internally.
pub trait ContentStore: Send + Sync {
    // ===== Content =====

    /// Stores fetched content for a unit, replacing any earlier copy
    ///
    /// # Arguments
    ///
    /// * `unit_id` - The archival unit the content belongs to
    /// * `content` - The fetched content
    fn store_content(&self, unit_id: &str, content: &FetchedContent) -> StorageResult<()>;

    /// Returns true if content for `url` has been stored for the unit
    fn has_content(&self, unit_id: &str, url: &str) -> StorageResult<bool>;

    /// Loads the stored copy of `url`
    fn load_content(&self, unit_id: &str, url: &str) -> StorageResult<Option<StoredContent>>;

    /// Counts stored URLs for a unit
    fn count_urls(&self, unit_id: &str) -> StorageResult<u64>;

    // ===== Unit State =====

    /// Loads the crawl history of a unit, or a fresh state if it has none
    fn load_au_state(&self, unit_id: &str) -> StorageResult<AuState>;

    /// Saves the crawl history of a unit
    fn save_au_state(&self, state: &AuState) -> StorageResult<()>;

    /// Lists the crawl history of every unit with a saved state
    fn list_au_states(&self) -> StorageResult<Vec<AuState>>;
}
