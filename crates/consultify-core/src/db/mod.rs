//! SQLite connection bootstrap and schema migrations.
//!
//! Every connection handed out by this module has `foreign_keys=ON`, a busy
//! timeout, and all migrations applied. Nothing reads or writes application
//! tables before that.

use crate::error::Result;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

pub mod migrations;

/// Open (or create) the database file at `path` and migrate it.
pub fn open(path: impl AsRef<Path>) -> Result<Connection> {
    let path = path.as_ref();
    let started_at = Instant::now();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut conn = Connection::open(path).inspect_err(|e| {
        tracing::error!(event = "db_open", mode = "file", error = %e, "failed to open database");
    })?;
    bootstrap(&mut conn)?;
    tracing::info!(
        event = "db_open",
        mode = "file",
        path = %path.display(),
        duration_ms = started_at.elapsed().as_millis() as u64,
        "database ready"
    );
    Ok(conn)
}

/// Open a private in-memory database, migrated. Used by tests and demos.
pub fn open_in_memory() -> Result<Connection> {
    let mut conn = Connection::open_in_memory()?;
    bootstrap(&mut conn)?;
    tracing::debug!(event = "db_open", mode = "memory", "database ready");
    Ok(conn)
}

fn bootstrap(conn: &mut Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_secs(5))?;
    migrations::apply(conn)?;
    Ok(())
}

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Run `f` atomically.
///
/// Starts a transaction when `conn` is in autocommit mode; when the caller
/// already holds one, `f` joins it and the caller decides the outcome.
pub fn with_transaction<T>(
    conn: &Connection,
    f: impl FnOnce(&Connection) -> Result<T>,
) -> Result<T> {
    if !conn.is_autocommit() {
        return f(conn);
    }
    let tx = conn.unchecked_transaction()?;
    let out = f(&tx)?;
    tx.commit()?;
    Ok(out)
}

/// Map `QueryReturnedNoRows` to `None`, leaving other errors intact.
pub(crate) fn optional<T>(result: rusqlite::Result<T>) -> Result<Option<T>> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}
