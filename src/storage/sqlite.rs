//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the ContentStore trait.

use crate::crawler::FetchedContent;
use crate::state::{AuState, CrawlPhase};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{ContentStore, StorageError, StorageResult};
use crate::storage::StoredContent;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// SQLite content store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Creates a new SqliteStore instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStore)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }
}

fn parse_time(value: Option<String>) -> StorageResult<Option<DateTime<Utc>>> {
    value
        .map(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| StorageError::Serialization(format!("bad timestamp {}: {}", s, e)))
        })
        .transpose()
}

fn au_state_from_row(row: &Row<'_>) -> rusqlite::Result<(String, [Option<String>; 4])> {
    Ok((
        row.get(0)?,
        [row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?],
    ))
}

fn build_au_state(unit_id: String, columns: [Option<String>; 4]) -> StorageResult<AuState> {
    let [time, attempt, result, message] = columns;
    let last_crawl_result = match result {
        Some(s) => Some(
            CrawlPhase::from_db_string(&s)
                .ok_or_else(|| StorageError::Serialization(format!("unknown crawl result {}", s)))?,
        ),
        None => None,
    };

    Ok(AuState {
        unit_id,
        last_crawl_time: parse_time(time)?,
        last_crawl_attempt: parse_time(attempt)?,
        last_crawl_result,
        last_crawl_message: message,
    })
}

impl ContentStore for SqliteStore {
    // ===== Content =====

    fn store_content(&self, unit_id: &str, content: &FetchedContent) -> StorageResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO content (unit_id, url, final_url, content_type, status_code, body, fetched_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(unit_id, url) DO UPDATE SET
                final_url = excluded.final_url,
                content_type = excluded.content_type,
                status_code = excluded.status_code,
                body = excluded.body,
                fetched_at = excluded.fetched_at",
            params![
                unit_id,
                content.url,
                content.final_url,
                content.content_type,
                content.status_code,
                content.body,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn has_content(&self, unit_id: &str, url: &str) -> StorageResult<bool> {
        let conn = self.conn()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM content WHERE unit_id = ?1 AND url = ?2",
                params![unit_id, url],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn load_content(&self, unit_id: &str, url: &str) -> StorageResult<Option<StoredContent>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT final_url, content_type, status_code, body, fetched_at
                 FROM content WHERE unit_id = ?1 AND url = ?2",
                params![unit_id, url],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, u16>(2)?,
                        row.get::<_, Vec<u8>>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((final_url, content_type, status_code, body, fetched_at)) => {
                let fetched_at = parse_time(Some(fetched_at))?.unwrap_or_else(Utc::now);
                Ok(Some(StoredContent {
                    unit_id: unit_id.to_string(),
                    url: url.to_string(),
                    final_url,
                    content_type,
                    status_code,
                    body,
                    fetched_at,
                }))
            }
            None => Ok(None),
        }
    }

    fn count_urls(&self, unit_id: &str) -> StorageResult<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM content WHERE unit_id = ?1",
            params![unit_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    // ===== Unit State =====

    fn load_au_state(&self, unit_id: &str) -> StorageResult<AuState> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT unit_id, last_crawl_time, last_crawl_attempt, last_crawl_result, last_crawl_message
                 FROM units WHERE unit_id = ?1",
                params![unit_id],
                au_state_from_row,
            )
            .optional()?;

        match row {
            Some((id, columns)) => build_au_state(id, columns),
            None => Ok(AuState::new(unit_id)),
        }
    }

    fn save_au_state(&self, state: &AuState) -> StorageResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO units (unit_id, last_crawl_time, last_crawl_attempt, last_crawl_result, last_crawl_message)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(unit_id) DO UPDATE SET
                last_crawl_time = excluded.last_crawl_time,
                last_crawl_attempt = excluded.last_crawl_attempt,
                last_crawl_result = excluded.last_crawl_result,
                last_crawl_message = excluded.last_crawl_message",
            params![
                state.unit_id,
                state.last_crawl_time.map(|t| t.to_rfc3339()),
                state.last_crawl_attempt.map(|t| t.to_rfc3339()),
                state.last_crawl_result.map(|r| r.to_db_string()),
                state.last_crawl_message,
            ],
        )?;
        Ok(())
    }

    fn list_au_states(&self) -> StorageResult<Vec<AuState>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT unit_id, last_crawl_time, last_crawl_attempt, last_crawl_result, last_crawl_message
             FROM units ORDER BY unit_id",
        )?;
        let rows = stmt
            .query_map([], au_state_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, columns)| build_au_state(id, columns))
            .collect()
    }
}
