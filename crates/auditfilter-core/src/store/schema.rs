//! SQLite schema emulating the `audit_log_filter` component tables.
//!
//! - `audit_log_filter` holds one row per named filter; `filter_id` is
//!   assigned by the store and never reused
//! - `audit_log_user` binds a `(username, userhost)` key to a filter name and
//!   disappears with the filter through `ON DELETE CASCADE`
//!
//! The installed layout is tagged in `PRAGMA user_version`. A store file
//! written by a newer `afctl` is refused rather than read with the wrong
//! layout.

use anyhow::{Result, bail};
use rusqlite::{Connection, types::Type};

/// Layout version written by this build.
pub const SCHEMA_VERSION: u32 = 1;

/// Filter and user tables plus the per-filter assignment index.
pub const SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS audit_log_filter (
    filter_id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE CHECK (length(name) > 0),
    filter TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS audit_log_user (
    username TEXT NOT NULL CHECK (length(username) > 0),
    userhost TEXT NOT NULL,
    filtername TEXT NOT NULL REFERENCES audit_log_filter(name) ON DELETE CASCADE,
    PRIMARY KEY (username, userhost)
);

CREATE INDEX IF NOT EXISTS idx_audit_log_user_filtername
    ON audit_log_user(filtername, username, userhost);
";

/// Read `PRAGMA user_version` as a `u32`.
///
/// # Errors
///
/// Returns an error if the pragma query fails or the value is negative.
pub fn schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    u32::try_from(version).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(0, Type::Integer, Box::new(error))
    })
}

/// Create the tables on a fresh database and tag it with [`SCHEMA_VERSION`].
///
/// A database already at [`SCHEMA_VERSION`] is left untouched.
///
/// # Errors
///
/// Returns an error if the database carries a newer version, or if creating
/// the tables fails.
pub fn install(conn: &mut Connection) -> Result<u32> {
    match schema_version(conn)? {
        0 => {
            let tx = conn.transaction()?;
            tx.execute_batch(SCHEMA_SQL)?;
            tx.pragma_update(None, "user_version", i64::from(SCHEMA_VERSION))?;
            tx.commit()?;
            Ok(SCHEMA_VERSION)
        }
        SCHEMA_VERSION => Ok(SCHEMA_VERSION),
        newer => bail!(
            "filter store has schema version {newer}; this build only reads version {SCHEMA_VERSION}"
        ),
    }
}
