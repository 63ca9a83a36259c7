//! Store-side records and user identities.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Username sentinel for the default assignment of every otherwise
/// unassigned account. It carries no host qualifier.
pub const DEFAULT_USER: &str = "%";

/// Host pattern used when a non-sentinel user gives no host.
pub const ANY_HOST: &str = "%";

/// A filter as materialized in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterRecord {
    pub name: String,
    /// Server-assigned and opaque; may change when the filter is replaced.
    pub filter_id: i64,
    pub stored_text: String,
}

/// `(username, userhost)` key of an assignment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserKey {
    pub username: String,
    pub userhost: String,
}

impl UserKey {
    /// Build a key, applying the host conventions: the `%` user never has a
    /// host, anyone else defaults to `%` when the host is absent or empty.
    #[must_use]
    pub fn new(username: impl Into<String>, userhost: Option<&str>) -> Self {
        let username = username.into();
        let userhost = if username == DEFAULT_USER {
            String::new()
        } else {
            match userhost {
                Some(host) if !host.is_empty() => host.to_string(),
                _ => ANY_HOST.to_string(),
            }
        };
        Self { username, userhost }
    }

    /// Parse the single-string user argument taken by the store functions.
    ///
    /// `%` is the default user; `name@host` splits at the first `@`; a bare
    /// `name` gets the `%` host.
    #[must_use]
    pub fn from_spec(spec: &str) -> Self {
        match spec.split_once('@') {
            Some((username, userhost)) => Self::new(username, Some(userhost)),
            None => Self::new(spec, None),
        }
    }

    /// Whether this is the `%` default-user key.
    #[must_use]
    pub fn is_default_user(&self) -> bool {
        self.username == DEFAULT_USER
    }

    /// The user argument for the store functions: `%` or `name@host`.
    #[must_use]
    pub fn spec(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for UserKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_default_user() {
            f.write_str(DEFAULT_USER)
        } else {
            write!(f, "{}@{}", self.username, self.userhost)
        }
    }
}

/// A binding of one user key to a filter name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserAssignment {
    pub username: String,
    pub userhost: String,
    pub filter_name: String,
}

impl UserAssignment {
    #[must_use]
    pub fn new(key: UserKey, filter_name: impl Into<String>) -> Self {
        Self {
            username: key.username,
            userhost: key.userhost,
            filter_name: filter_name.into(),
        }
    }

    #[must_use]
    pub fn key(&self) -> UserKey {
        UserKey {
            username: self.username.clone(),
            userhost: self.userhost.clone(),
        }
    }

    /// The same user bound to a different filter.
    #[must_use]
    pub fn retarget(&self, filter_name: &str) -> Self {
        Self {
            filter_name: filter_name.to_string(),
            ..self.clone()
        }
    }
}
