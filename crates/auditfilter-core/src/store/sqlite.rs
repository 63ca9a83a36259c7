//! Local SQLite stand-in for the `audit_log_filter` component.
//!
//! Mirrors the component's observable behavior: function-style calls answer
//! `"OK"` or an `"ERROR: ..."` string, removing a filter cascades its user
//! bindings, and `filter_id`s are never reused. Used by `afctl` against a local
//! file and by the integration tests.
//!
//! Runtime defaults:
//! - `foreign_keys = ON` so the assignment cascade is enforced by SQLite
//! - `journal_mode = WAL` and a busy timeout for concurrent readers

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};
use std::{path::Path, time::Duration};

use super::{FUNCTION_OK, FilterStore, StoreError, StoredFilter, schema};
use crate::model::UserKey;

/// Busy timeout used when the caller does not configure one.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// [`FilterStore`] backed by a SQLite database.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the store at `path`, apply pragmas, and install the
    /// schema on a fresh file.
    ///
    /// # Errors
    ///
    /// Returns an error if opening or configuring the database fails, or if
    /// the file carries a newer schema version.
    pub fn open(path: &Path, busy_timeout: Duration) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create store directory {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("open filter store {}", path.display()))?;
        Self::from_connection(conn, busy_timeout)
    }

    /// Open a private in-memory store.
    ///
    /// # Errors
    ///
    /// Returns an error if SQLite cannot create the database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory filter store")?;
        Self::from_connection(conn, DEFAULT_BUSY_TIMEOUT)
    }

    fn from_connection(mut conn: Connection, busy_timeout: Duration) -> Result<Self> {
        configure_connection(&conn, busy_timeout).context("configure sqlite pragmas")?;
        let version = schema::install(&mut conn).context("install store schema")?;
        tracing::debug!(schema_version = version, "filter store ready");
        Ok(Self { conn })
    }

    /// Underlying connection, for inspection in tests and tooling.
    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }

    fn filter_exists(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.count_filters(name)? > 0)
    }
}

fn configure_connection(conn: &Connection, busy_timeout: Duration) -> rusqlite::Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    let _journal_mode: String =
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.busy_timeout(busy_timeout)?;
    Ok(())
}

fn ok() -> String {
    FUNCTION_OK.to_string()
}

fn count_to_u64(count: i64) -> u64 {
    u64::try_from(count).unwrap_or_default()
}

impl FilterStore for SqliteStore {
    fn set_filter(&self, name: &str, definition: &str) -> Result<String, StoreError> {
        if name.is_empty() {
            return Ok("ERROR: Invalid filter name.".to_string());
        }
        if serde_json::from_str::<serde_json::Value>(definition).is_err() {
            return Ok("ERROR: Incorrect rule definition.".to_string());
        }

        let inserted = self.conn.execute(
            "INSERT INTO audit_log_filter (name, filter) VALUES (?1, ?2)
             ON CONFLICT(name) DO NOTHING",
            params![name, definition],
        )?;
        if inserted == 0 {
            return Ok(format!("ERROR: Filter '{name}' already exists."));
        }
        Ok(ok())
    }

    fn remove_filter(&self, name: &str) -> Result<String, StoreError> {
        let removed = self
            .conn
            .execute("DELETE FROM audit_log_filter WHERE name = ?1", params![name])?;
        if removed == 0 {
            return Ok(format!("ERROR: Unknown filter name '{name}'."));
        }
        Ok(ok())
    }

    fn get_filter(&self, name: &str) -> Result<Option<StoredFilter>, StoreError> {
        let row = self
            .conn
            .query_row(
                "SELECT filter_id, filter FROM audit_log_filter WHERE name = ?1",
                params![name],
                |row| {
                    Ok(StoredFilter {
                        filter_id: row.get(0)?,
                        text: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    fn count_filters(&self, name: &str) -> Result<u64, StoreError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM audit_log_filter WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;
        Ok(count_to_u64(count))
    }

    fn list_assignments(&self, filter_name: &str) -> Result<Vec<UserKey>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT username, userhost FROM audit_log_user
             WHERE filtername = ?1
             ORDER BY username, userhost",
        )?;
        let rows = stmt.query_map(params![filter_name], |row| {
            Ok(UserKey {
                username: row.get(0)?,
                userhost: row.get(1)?,
            })
        })?;
        let keys = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(keys)
    }

    fn set_user(&self, user_spec: &str, filter_name: &str) -> Result<String, StoreError> {
        let key = UserKey::from_spec(user_spec);
        if key.username.is_empty() {
            return Ok(format!("ERROR: Invalid user specification '{user_spec}'."));
        }
        if !self.filter_exists(filter_name)? {
            return Ok(format!("ERROR: Unknown filter name '{filter_name}'."));
        }

        self.conn.execute(
            "INSERT INTO audit_log_user (username, userhost, filtername) VALUES (?1, ?2, ?3)
             ON CONFLICT(username, userhost) DO UPDATE SET filtername = excluded.filtername",
            params![key.username, key.userhost, filter_name],
        )?;
        Ok(ok())
    }

    fn remove_user(&self, user_spec: &str) -> Result<String, StoreError> {
        let key = UserKey::from_spec(user_spec);
        let removed = self.conn.execute(
            "DELETE FROM audit_log_user WHERE username = ?1 AND userhost = ?2",
            params![key.username, key.userhost],
        )?;
        if removed == 0 {
            return Ok(format!("ERROR: Unknown user '{user_spec}'."));
        }
        Ok(ok())
    }

    fn get_user(&self, username: &str, userhost: &str) -> Result<Option<String>, StoreError> {
        let filter = self
            .conn
            .query_row(
                "SELECT filtername FROM audit_log_user WHERE username = ?1 AND userhost = ?2",
                params![username, userhost],
                |row| row.get(0),
            )
            .optional()?;
        Ok(filter)
    }

    fn count_users(&self, username: &str, userhost: &str) -> Result<u64, StoreError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM audit_log_user WHERE username = ?1 AND userhost = ?2",
            params![username, userhost],
            |row| row.get(0),
        )?;
        Ok(count_to_u64(count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::schema;
    use tempfile::TempDir;

    const CONNECTION_FILTER: &str = r#"{"filter":{"class":{"name":"connection"}}}"#;

    fn store() -> SqliteStore {
        SqliteStore::open_in_memory().expect("open in-memory store")
    }

    #[test]
    fn open_creates_parent_dirs_and_installs_schema() {
        let dir = TempDir::new().expect("create temp dir");
        let path = dir.path().join("nested/store.sqlite3");
        let store = SqliteStore::open(&path, Duration::from_millis(250)).expect("open store");
        assert!(path.exists());

        let version = schema::schema_version(store.connection()).expect("version");
        assert_eq!(version, schema::SCHEMA_VERSION);

        let foreign_keys: i64 = store
            .connection()
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))
            .expect("query foreign_keys");
        assert_eq!(foreign_keys, 1);
    }

    #[test]
    fn set_filter_rejects_duplicates_and_bad_json() {
        let store = store();
        assert_eq!(store.set_filter("conn", CONNECTION_FILTER).expect("set"), "OK");
        assert!(
            store
                .set_filter("conn", CONNECTION_FILTER)
                .expect("duplicate")
                .starts_with("ERROR:")
        );
        assert!(
            store
                .set_filter("broken", "{\"filter\":")
                .expect("bad json")
                .starts_with("ERROR:")
        );
        assert_eq!(store.count_filters("conn").expect("count"), 1);
        assert_eq!(store.count_filters("broken").expect("count"), 0);
    }

    #[test]
    fn filter_ids_are_not_reused() {
        let store = store();
        store.set_filter("a", CONNECTION_FILTER).expect("set a");
        let first = store.get_filter("a").expect("get").expect("present").filter_id;
        assert_eq!(store.remove_filter("a").expect("remove"), "OK");
        store.set_filter("a", CONNECTION_FILTER).expect("recreate a");
        let second = store.get_filter("a").expect("get").expect("present").filter_id;
        assert_ne!(first, second);
    }

    #[test]
    fn remove_filter_cascades_assignments() {
        let store = store();
        store.set_filter("conn", CONNECTION_FILTER).expect("set");
        assert_eq!(store.set_user("app@%", "conn").expect("bind"), "OK");
        assert_eq!(store.set_user("%", "conn").expect("bind default"), "OK");
        assert_eq!(store.list_assignments("conn").expect("list").len(), 2);

        store.remove_filter("conn").expect("remove");
        assert!(store.list_assignments("conn").expect("list").is_empty());
        assert_eq!(store.get_user("app", "%").expect("get user"), None);
    }

    #[test]
    fn set_user_requires_filter_and_upserts() {
        let store = store();
        assert!(
            store
                .set_user("app@localhost", "missing")
                .expect("unknown filter")
                .starts_with("ERROR:")
        );

        store.set_filter("one", CONNECTION_FILTER).expect("one");
        store.set_filter("two", CONNECTION_FILTER).expect("two");
        store.set_user("app@localhost", "one").expect("bind");
        store.set_user("app@localhost", "two").expect("rebind");
        assert_eq!(
            store.get_user("app", "localhost").expect("get"),
            Some("two".to_string())
        );
        assert_eq!(store.count_users("app", "localhost").expect("count"), 1);
    }

    #[test]
    fn default_user_is_stored_without_host() {
        let store = store();
        store.set_filter("all", CONNECTION_FILTER).expect("set");
        store.set_user("%", "all").expect("bind default");
        let keys = store.list_assignments("all").expect("list");
        assert_eq!(keys, vec![UserKey::new("%", None)]);
        assert_eq!(store.get_user("%", "").expect("get"), Some("all".to_string()));
    }

    #[test]
    fn remove_user_reports_unknown_users() {
        let store = store();
        store.set_filter("all", CONNECTION_FILTER).expect("set");
        store.set_user("app", "all").expect("bind");
        assert_eq!(store.remove_user("app@%").expect("remove"), "OK");
        assert!(store.remove_user("app@%").expect("again").starts_with("ERROR:"));
    }

    #[test]
    fn list_assignments_is_ordered() {
        let store = store();
        store.set_filter("f", CONNECTION_FILTER).expect("set");
        for spec in ["zed@h", "amy@z", "amy@a"] {
            store.set_user(spec, "f").expect("bind");
        }
        let specs: Vec<String> = store
            .list_assignments("f")
            .expect("list")
            .iter()
            .map(UserKey::spec)
            .collect();
        assert_eq!(specs, vec!["amy@a", "amy@z", "zed@h"]);
    }
}
