//! Snapshot and restore of user→filter bindings around a filter replacement.
//!
//! Removing a filter silently drops every binding to it, so the bindings are
//! captured first and re-issued afterwards. Restoration is best effort: each
//! binding is attempted once, failures are collected, and nothing is retried.

use tracing::{debug, warn};

use super::expect_ok;
use crate::error::ControllerError;
use crate::model::UserAssignment;
use crate::store::{FilterStore, StoreOp};

/// Result of re-issuing one binding.
#[derive(Debug)]
pub struct RestoreOutcome {
    /// The binding as it was re-issued (pointing at the restored filter).
    pub assignment: UserAssignment,
    pub result: Result<(), ControllerError>,
}

impl RestoreOutcome {
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Captures and restores the bindings of one filter.
#[derive(Debug)]
pub struct AssignmentReconciler<'s, S: ?Sized> {
    store: &'s S,
}

impl<'s, S: FilterStore + ?Sized> AssignmentReconciler<'s, S> {
    #[must_use]
    pub const fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// Every binding currently pointing at `filter_name`, in store order.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::Store`] if the listing fails.
    pub fn snapshot(&self, filter_name: &str) -> Result<Vec<UserAssignment>, ControllerError> {
        let keys = self
            .store
            .list_assignments(filter_name)
            .map_err(|source| ControllerError::store(StoreOp::ListAssignments, source))?;
        debug!(filter = filter_name, bindings = keys.len(), "captured assignment snapshot");
        Ok(keys
            .into_iter()
            .map(|key| UserAssignment::new(key, filter_name))
            .collect())
    }

    /// Re-bind every user in `assignments` to `filter_name`.
    ///
    /// Never fails as a whole; one outcome is returned per input binding, in
    /// input order.
    #[must_use]
    pub fn restore(&self, assignments: &[UserAssignment], filter_name: &str) -> Vec<RestoreOutcome> {
        assignments
            .iter()
            .map(|assignment| {
                let assignment = assignment.retarget(filter_name);
                let spec = assignment.key().spec();
                let result = expect_ok(StoreOp::SetUser, self.store.set_user(&spec, filter_name));
                if let Err(err) = &result {
                    warn!(filter = filter_name, user = %spec, error = %err, "failed to restore user assignment");
                }
                RestoreOutcome { assignment, result }
            })
            .collect()
    }
}
