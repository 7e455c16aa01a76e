//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the content store.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Crawl history per archival unit
CREATE TABLE IF NOT EXISTS units (
    unit_id TEXT PRIMARY KEY,
    last_crawl_time TEXT,
    last_crawl_attempt TEXT,
    last_crawl_result TEXT,
    last_crawl_message TEXT
);

-- Content fetched for each archival unit
CREATE TABLE IF NOT EXISTS content (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    unit_id TEXT NOT NULL,
    url TEXT NOT NULL,
    final_url TEXT NOT NULL,
    content_type TEXT NOT NULL,
    status_code INTEGER NOT NULL,
    body BLOB NOT NULL,
    fetched_at TEXT NOT NULL,
    UNIQUE(unit_id, url)
);

CREATE INDEX IF NOT EXISTS idx_content_unit ON content(unit_id);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
