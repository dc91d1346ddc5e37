//! Chunk store database migrations
//!
//! SQL migrations are embedded as strings and executed when the store opens.

use rusqlite::Connection;

/// Chunk tables SQL (001)
pub const CHUNK_TABLES_SQL: &str = include_str!("001_chunk_tables.sql");

/// Run all chunk store migrations
pub fn run_migrations(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(CHUNK_TABLES_SQL)
}
