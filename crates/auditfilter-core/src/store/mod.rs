//! Store contract for audit log filters and user assignments.
//!
//! The store only offers side-effecting functions that report success as the
//! literal string `"OK"` and failure as any other string:
//!
//! | Method | Function |
//! |---|---|
//! | [`FilterStore::set_filter`] | `audit_log_filter_set_filter(name, definition)` |
//! | [`FilterStore::remove_filter`] | `audit_log_filter_remove_filter(name)`, cascades assignments |
//! | [`FilterStore::set_user`] | `audit_log_filter_set_user(user_spec, filter)` |
//! | [`FilterStore::remove_user`] | `audit_log_filter_remove_user(user_spec)` |
//!
//! Reads go against the `audit_log_filter` and `audit_log_user` tables.
//! Transport and SQL failures are [`StoreError`]s; a non-`"OK"` function result
//! is returned as-is and interpreted by the controllers.

pub mod schema;
pub mod sqlite;

pub use sqlite::SqliteStore;

use crate::model::UserKey;
use std::fmt;

/// Success result of every store function.
pub const FUNCTION_OK: &str = "OK";

/// Transport-level store failure.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// SQLite failure in [`SqliteStore`].
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Any other adapter failure (connection lost, timeout, ...).
    #[error("{0}")]
    Transport(String),
}

/// Filter row as read back from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFilter {
    pub filter_id: i64,
    pub text: String,
}

/// Store calls, named after the functions and tables they hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    SetFilter,
    RemoveFilter,
    GetFilter,
    CountFilters,
    ListAssignments,
    SetUser,
    RemoveUser,
    GetUser,
    CountUsers,
}

impl StoreOp {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SetFilter => "audit_log_filter_set_filter",
            Self::RemoveFilter => "audit_log_filter_remove_filter",
            Self::GetFilter => "read audit_log_filter",
            Self::CountFilters => "count audit_log_filter",
            Self::ListAssignments => "list audit_log_user",
            Self::SetUser => "audit_log_filter_set_user",
            Self::RemoveUser => "audit_log_filter_remove_user",
            Self::GetUser => "read audit_log_user",
            Self::CountUsers => "count audit_log_user",
        }
    }
}

impl fmt::Display for StoreOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Narrow contract over the remote filter store.
///
/// Calls are synchronous; each blocks until the store answers or the adapter's
/// own timeout fires.
pub trait FilterStore {
    /// Create filter `name`. Returns the function result string.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on transport or SQL failure.
    fn set_filter(&self, name: &str, definition: &str) -> Result<String, StoreError>;

    /// Remove filter `name` and, as a side effect, every assignment to it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on transport or SQL failure.
    fn remove_filter(&self, name: &str) -> Result<String, StoreError>;

    /// Read filter `name`; `None` when absent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on transport or SQL failure.
    fn get_filter(&self, name: &str) -> Result<Option<StoredFilter>, StoreError>;

    /// Number of filters called `name`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on transport or SQL failure.
    fn count_filters(&self, name: &str) -> Result<u64, StoreError>;

    /// Users bound to `filter_name`, ordered by username then host.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on transport or SQL failure.
    fn list_assignments(&self, filter_name: &str) -> Result<Vec<UserKey>, StoreError>;

    /// Bind `user_spec` (`%` or `name@host`) to `filter_name`, replacing any
    /// existing binding. The filter must already exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on transport or SQL failure.
    fn set_user(&self, user_spec: &str, filter_name: &str) -> Result<String, StoreError>;

    /// Drop the binding for `user_spec`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on transport or SQL failure.
    fn remove_user(&self, user_spec: &str) -> Result<String, StoreError>;

    /// Filter bound to `(username, userhost)`; `None` when unbound.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on transport or SQL failure.
    fn get_user(&self, username: &str, userhost: &str) -> Result<Option<String>, StoreError>;

    /// Number of bindings for `(username, userhost)`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on transport or SQL failure.
    fn count_users(&self, username: &str, userhost: &str) -> Result<u64, StoreError>;
}

impl<S: FilterStore + ?Sized> FilterStore for &S {
    fn set_filter(&self, name: &str, definition: &str) -> Result<String, StoreError> {
        (**self).set_filter(name, definition)
    }

    fn remove_filter(&self, name: &str) -> Result<String, StoreError> {
        (**self).remove_filter(name)
    }

    fn get_filter(&self, name: &str) -> Result<Option<StoredFilter>, StoreError> {
        (**self).get_filter(name)
    }

    fn count_filters(&self, name: &str) -> Result<u64, StoreError> {
        (**self).count_filters(name)
    }

    fn list_assignments(&self, filter_name: &str) -> Result<Vec<UserKey>, StoreError> {
        (**self).list_assignments(filter_name)
    }

    fn set_user(&self, user_spec: &str, filter_name: &str) -> Result<String, StoreError> {
        (**self).set_user(user_spec, filter_name)
    }

    fn remove_user(&self, user_spec: &str) -> Result<String, StoreError> {
        (**self).remove_user(user_spec)
    }

    fn get_user(&self, username: &str, userhost: &str) -> Result<Option<String>, StoreError> {
        (**self).get_user(username, userhost)
    }

    fn count_users(&self, username: &str, userhost: &str) -> Result<u64, StoreError> {
        (**self).count_users(username, userhost)
    }
}
