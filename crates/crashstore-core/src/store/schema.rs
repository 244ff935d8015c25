//! SQLite schema DDL and migration framework.

use rusqlite::Connection;
use tracing::debug;

use crate::errors::{CrashStoreError, CrashStoreResult};

/// Current schema version. Migrations run from whatever the DB currently
/// reports up to this value.
pub const SCHEMA_VERSION: i32 = 1;

/// Core DDL statements: 6 CREATE TABLE + 4 CREATE INDEX.
///
/// Executed with `CREATE … IF NOT EXISTS` so they are safe to replay on an
/// already-initialised database. Frames and dumps cascade with their report.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    // ── tables (6) ──────────────────────────────────────────────────────
    "CREATE TABLE IF NOT EXISTS store_meta (
        key TEXT PRIMARY KEY,
        value TEXT
    );",
    "CREATE TABLE IF NOT EXISTS reports (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        date TEXT NOT NULL,
        uuid TEXT NOT NULL UNIQUE,
        product TEXT,
        version TEXT,
        build TEXT,
        signature TEXT,
        signature_hash TEXT,
        url TEXT,
        install_age INTEGER,
        last_crash INTEGER,
        comments TEXT,
        cpu_name TEXT,
        cpu_info TEXT,
        reason TEXT,
        address TEXT,
        os_name TEXT,
        os_version TEXT
    );",
    "CREATE TABLE IF NOT EXISTS frames (
        report_id INTEGER NOT NULL REFERENCES reports(id) ON DELETE CASCADE,
        frame_num INTEGER NOT NULL,
        module_name TEXT,
        function TEXT,
        source TEXT,
        source_line INTEGER,
        instruction TEXT,
        PRIMARY KEY(report_id, frame_num)
    );",
    "CREATE TABLE IF NOT EXISTS dumps (
        report_id INTEGER PRIMARY KEY REFERENCES reports(id) ON DELETE CASCADE,
        data TEXT NOT NULL
    );",
    "CREATE TABLE IF NOT EXISTS fetch_counters (
        item_key TEXT PRIMARY KEY,
        item TEXT NOT NULL,
        hits INTEGER NOT NULL DEFAULT 0,
        misses INTEGER NOT NULL DEFAULT 0
    );",
    "CREATE TABLE IF NOT EXISTS migration_history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        from_version INTEGER NOT NULL,
        to_version INTEGER NOT NULL,
        status TEXT NOT NULL,
        error_message TEXT,
        created_at TEXT DEFAULT CURRENT_TIMESTAMP
    );",
    // ── indexes (4) ─────────────────────────────────────────────────────
    "CREATE INDEX IF NOT EXISTS idx_reports_signature ON reports(signature);",
    "CREATE INDEX IF NOT EXISTS idx_reports_signature_hash ON reports(signature_hash);",
    "CREATE INDEX IF NOT EXISTS idx_reports_url ON reports(url);",
    // Top-crasher queries filter on product/version/build.
    "CREATE INDEX IF NOT EXISTS idx_reports_product_version_build \
     ON reports(product, version, build);",
];

// ─── Migration framework ────────────────────────────────────────────────────

/// Run all pending migrations from the current stored version up to
/// [`SCHEMA_VERSION`].  Each step is wrapped in a SAVEPOINT so a failure
/// rolls back only that single step.
///
/// A database written by a newer schema is refused rather than opened.
pub fn migrate_schema(conn: &Connection) -> CrashStoreResult<()> {
    let mut current_version = get_schema_version(conn);
    if current_version > SCHEMA_VERSION {
        return Err(CrashStoreError::Database(format!(
            "schema version {current_version} is newer than supported version {SCHEMA_VERSION}"
        )));
    }

    while current_version < SCHEMA_VERSION {
        let next_version = current_version + 1;
        conn.execute_batch("SAVEPOINT crashstore_migrate_step;")?;

        let step_result = (|| -> CrashStoreResult<()> {
            match next_version {
                1 => migrate_to_v1(conn)?,
                _ => {}
            }
            set_schema_version(conn, next_version)?;
            record_migration_step(conn, current_version, next_version, "success", None)?;
            conn.execute_batch("RELEASE SAVEPOINT crashstore_migrate_step;")?;
            Ok(())
        })();

        match step_result {
            Ok(()) => {
                debug!(from = current_version, to = next_version, "schema migration applied");
                current_version = next_version;
            }
            Err(e) => {
                let _ = conn.execute_batch("ROLLBACK TO SAVEPOINT crashstore_migrate_step;");
                let _ = conn.execute_batch("RELEASE SAVEPOINT crashstore_migrate_step;");
                let _ = record_migration_step(
                    conn,
                    current_version,
                    next_version,
                    "failed",
                    Some(&e.to_string()),
                );
                return Err(e);
            }
        }
    }

    Ok(())
}

/// Read the current schema version from `store_meta`.
/// Returns 0 when the key is absent or unparseable.
pub fn get_schema_version(conn: &Connection) -> i32 {
    let result: Result<String, _> = conn.query_row(
        "SELECT value FROM store_meta WHERE key = 'schema_version';",
        [],
        |row| row.get(0),
    );
    match result {
        Ok(v) => v.parse::<i32>().unwrap_or(0),
        Err(_) => 0,
    }
}

fn set_schema_version(conn: &Connection, version: i32) -> CrashStoreResult<()> {
    conn.execute(
        "INSERT INTO store_meta(key, value) \
         VALUES('schema_version', ?1) \
         ON CONFLICT(key) DO UPDATE SET value = excluded.value;",
        rusqlite::params![version.to_string()],
    )?;
    Ok(())
}

fn record_migration_step(
    conn: &Connection,
    from_v: i32,
    to_v: i32,
    status: &str,
    error_msg: Option<&str>,
) -> CrashStoreResult<()> {
    conn.execute(
        "INSERT INTO migration_history(from_version, to_version, status, error_message) \
         VALUES (?1, ?2, ?3, ?4);",
        rusqlite::params![from_v, to_v, status, error_msg],
    )?;
    Ok(())
}

// ─── Individual migration steps ─────────────────────────────────────────────

/// v0 -> v1: baseline, no-op.
fn migrate_to_v1(_conn: &Connection) -> CrashStoreResult<()> {
    Ok(())
}
