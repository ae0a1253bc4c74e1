//! Ordered schema migrations, tracked through `PRAGMA user_version`.

use crate::error::{ConsultifyError, Result};
use rusqlite::Connection;

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        sql: include_str!("0001_init.sql"),
    },
    Migration {
        version: 2,
        sql: include_str!("0002_append_only.sql"),
    },
];

pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |m| m.version)
}

pub fn current_version(conn: &Connection) -> Result<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}

/// Apply every pending migration in one transaction.
///
/// Returns the number of migrations applied. A database written by a newer
/// binary is rejected rather than silently downgraded.
pub fn apply(conn: &mut Connection) -> Result<usize> {
    let current = current_version(conn)?;
    let latest = latest_version();

    if current > latest {
        return Err(ConsultifyError::UnsupportedSchemaVersion {
            db_version: current,
            latest_supported: latest,
        });
    }
    if current == latest {
        return Ok(0);
    }

    let tx = conn.transaction()?;
    let mut applied = 0;
    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        tx.execute_batch(migration.sql)?;
        tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))?;
        tracing::info!(
            event = "migration_applied",
            version = migration.version,
            "schema migration applied"
        );
        applied += 1;
    }
    tx.commit()?;
    Ok(applied)
}
