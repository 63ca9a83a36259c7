//! User → filter bindings.

use tracing::info;

use super::expect_ok;
use crate::error::ControllerError;
use crate::model::{UserAssignment, UserKey};
use crate::store::{FilterStore, StoreOp};

/// Drives assign/reassign/unassign/import/read for user bindings.
#[derive(Debug)]
pub struct AssignmentController<S> {
    store: S,
}

impl<S: FilterStore> AssignmentController<S> {
    #[must_use]
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Bind a user to `filter_name`. `userhost` defaults to `%`, and is
    /// ignored for the `%` default user.
    ///
    /// # Errors
    ///
    /// - [`ControllerError::FilterNotFound`] if the filter does not exist
    /// - [`ControllerError::AssignmentAlreadyExists`] if the user is bound
    ///   already (use [`reassign`](Self::reassign))
    /// - [`ControllerError::Store`] / [`ControllerError::StoreRejected`] if a
    ///   store call fails
    pub fn assign(
        &self,
        username: &str,
        userhost: Option<&str>,
        filter_name: &str,
    ) -> Result<UserAssignment, ControllerError> {
        let key = UserKey::new(username, userhost);
        self.require_filter(filter_name)?;

        let existing = self
            .store
            .count_users(&key.username, &key.userhost)
            .map_err(|source| ControllerError::store(StoreOp::CountUsers, source))?;
        if existing > 0 {
            return Err(ControllerError::AssignmentAlreadyExists(key.spec()));
        }

        self.bind(key, filter_name)
    }

    /// Point an existing (or new) binding at `filter_name`.
    ///
    /// # Errors
    ///
    /// - [`ControllerError::FilterNotFound`] if the filter does not exist
    /// - [`ControllerError::Store`] / [`ControllerError::StoreRejected`] if a
    ///   store call fails
    pub fn reassign(
        &self,
        username: &str,
        userhost: Option<&str>,
        filter_name: &str,
    ) -> Result<UserAssignment, ControllerError> {
        let key = UserKey::new(username, userhost);
        self.require_filter(filter_name)?;
        self.bind(key, filter_name)
    }

    /// Drop a user's binding.
    ///
    /// # Errors
    ///
    /// [`ControllerError::StoreRejected`] when the store does not know the
    /// user, [`ControllerError::Store`] on transport failure.
    pub fn unassign(&self, username: &str, userhost: Option<&str>) -> Result<(), ControllerError> {
        let key = UserKey::new(username, userhost);
        let spec = key.spec();
        expect_ok(StoreOp::RemoveUser, self.store.remove_user(&spec))?;
        info!(user = %spec, "removed user assignment");
        Ok(())
    }

    /// Current binding of a user; `None` when unbound.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::Store`] if the read fails.
    pub fn read(
        &self,
        username: &str,
        userhost: Option<&str>,
    ) -> Result<Option<UserAssignment>, ControllerError> {
        self.lookup(UserKey::new(username, userhost))
    }

    /// Adopt an existing binding by its `%` / `name@host` spec.
    ///
    /// # Errors
    ///
    /// - [`ControllerError::AssignmentNotFound`] if the user is unbound
    /// - [`ControllerError::Store`] if the read fails
    pub fn import(&self, user_spec: &str) -> Result<UserAssignment, ControllerError> {
        let key = UserKey::from_spec(user_spec);
        let spec = key.spec();
        let assignment = self
            .lookup(key)?
            .ok_or(ControllerError::AssignmentNotFound(spec))?;
        info!(
            user = %assignment.key(),
            filter = %assignment.filter_name,
            "imported user assignment"
        );
        Ok(assignment)
    }

    fn lookup(&self, key: UserKey) -> Result<Option<UserAssignment>, ControllerError> {
        let filter = self
            .store
            .get_user(&key.username, &key.userhost)
            .map_err(|source| ControllerError::store(StoreOp::GetUser, source))?;
        Ok(filter.map(|filter| UserAssignment::new(key, filter)))
    }

    fn require_filter(&self, filter_name: &str) -> Result<(), ControllerError> {
        let count = self
            .store
            .count_filters(filter_name)
            .map_err(|source| ControllerError::store(StoreOp::CountFilters, source))?;
        if count == 0 {
            return Err(ControllerError::FilterNotFound(filter_name.to_string()));
        }
        Ok(())
    }

    fn bind(&self, key: UserKey, filter_name: &str) -> Result<UserAssignment, ControllerError> {
        let spec = key.spec();
        expect_ok(StoreOp::SetUser, self.store.set_user(&spec, filter_name))?;
        info!(user = %spec, filter = filter_name, "assigned audit log filter");
        Ok(UserAssignment::new(key, filter_name))
    }
}
