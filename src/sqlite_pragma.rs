//! Shared SQLite connection tuning
//!
//! Every connection opened by the pipelines goes through
//! [`apply_optimized_pragmas`] so reader and writer see the same settings.

use rusqlite::Connection;

/// Pages kept in the page cache (negative = KiB).
const CACHE_SIZE_KIB: i64 = -16_000;

/// Apply the PRAGMAs used for a single-writer batch run.
///
/// - `journal_mode = WAL` keeps readers consistent with a committed load
/// - `synchronous = NORMAL` is durable at commit boundaries in WAL mode
/// - `temp_store = MEMORY` keeps sort/group scratch space off disk
/// - `foreign_keys = ON` so declared keys are enforced if a schema uses them
pub fn apply_optimized_pragmas(conn: &Connection) -> rusqlite::Result<()> {
    // journal_mode returns a row, so it goes through pragma_update_and_check
    let mode: String = conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;
    conn.pragma_update(None, "cache_size", CACHE_SIZE_KIB)?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    log::debug!("SQLite pragmas applied (journal_mode={})", mode);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_wal_mode_enabled() {
        let dir = tempdir().unwrap();
        let conn = Connection::open(dir.path().join("pragma.db")).unwrap();

        apply_optimized_pragmas(&conn).unwrap();

        let journal_mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(journal_mode.to_lowercase(), "wal");

        let synchronous: i64 = conn
            .query_row("PRAGMA synchronous", [], |row| row.get(0))
            .unwrap();
        assert_eq!(synchronous, 1); // NORMAL
    }
}
