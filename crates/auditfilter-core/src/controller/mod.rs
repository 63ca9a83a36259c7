//! Filter and assignment lifecycle controllers.
//!
//! Every operation validates first, then talks to the store one call at a time.
//! Nothing is cached between calls and no lock is taken: two controllers
//! working on the same filter name can interleave (the existence check in
//! [`FilterController::create`] and the snapshot-then-remove window in
//! [`FilterController::update`] are both check-then-act).

pub mod assignment;
pub mod reconcile;
pub mod update;

pub use assignment::AssignmentController;
pub use reconcile::{AssignmentReconciler, RestoreOutcome};
pub use update::{UpdatePlan, UpdateReport, UpdateState};

use serde::Serialize;
use tracing::{info, warn};

use crate::definition::{FilterDefinition, canonicalize, same_definition};
use crate::error::ControllerError;
use crate::model::FilterRecord;
use crate::store::{FUNCTION_OK, FilterStore, StoreError, StoreOp, StoredFilter};

/// Caller-visible, non-fatal diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub summary: String,
    pub detail: String,
}

impl Warning {
    #[must_use]
    pub fn new(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            detail: detail.into(),
        }
    }
}

/// Map a function-style store result to `Ok(())` only for `"OK"`.
pub(crate) fn expect_ok(
    operation: StoreOp,
    result: Result<String, StoreError>,
) -> Result<(), ControllerError> {
    match result {
        Ok(message) if message == FUNCTION_OK => Ok(()),
        Ok(message) => {
            warn!(%operation, %message, "store function rejected the call");
            Err(ControllerError::StoreRejected { operation, message })
        }
        Err(source) => Err(ControllerError::store(operation, source)),
    }
}

/// Result of [`FilterController::read`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterObservation {
    pub record: FilterRecord,
    /// Canonical stored text differs from the last known desired text.
    pub drifted: bool,
}

/// Drives create/update/delete/import/read for named filters.
#[derive(Debug)]
pub struct FilterController<S> {
    store: S,
}

impl<S: FilterStore> FilterController<S> {
    #[must_use]
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Reconciler for the bindings held by this controller's store.
    #[must_use]
    pub const fn reconciler(&self) -> AssignmentReconciler<'_, S> {
        AssignmentReconciler::new(&self.store)
    }

    /// Create filter `name` from `text`.
    ///
    /// The canonical form of `text` is what gets stored.
    ///
    /// # Errors
    ///
    /// - [`ControllerError::Validation`] if `text` is rejected (no store call
    ///   is made)
    /// - [`ControllerError::AlreadyExists`] if a filter called `name` exists
    /// - [`ControllerError::Store`] / [`ControllerError::StoreRejected`] if a
    ///   store call fails
    pub fn create(&self, name: &str, text: &str) -> Result<FilterRecord, ControllerError> {
        let definition = FilterDefinition::parse(name, text)?;

        if self.filter_count(name)? > 0 {
            return Err(ControllerError::AlreadyExists(name.to_string()));
        }

        expect_ok(
            StoreOp::SetFilter,
            self.store.set_filter(name, &definition.normalized_text),
        )?;

        let record = self.fetch_record(name)?;
        info!(filter = name, filter_id = record.filter_id, "created audit log filter");
        Ok(record)
    }

    /// Remove filter `name`. The store drops its assignments with it.
    ///
    /// # Errors
    ///
    /// - [`ControllerError::FilterNotFound`] if the filter does not exist
    /// - [`ControllerError::Store`] / [`ControllerError::StoreRejected`] if a
    ///   store call fails
    pub fn delete(&self, name: &str) -> Result<(), ControllerError> {
        if self.filter_count(name)? == 0 {
            return Err(ControllerError::FilterNotFound(name.to_string()));
        }

        expect_ok(StoreOp::RemoveFilter, self.store.remove_filter(name))?;
        info!(filter = name, "removed audit log filter");
        Ok(())
    }

    /// Adopt an existing filter.
    ///
    /// # Errors
    ///
    /// - [`ControllerError::FilterNotFound`] if the filter does not exist
    /// - [`ControllerError::Store`] if the read fails
    pub fn import(&self, name: &str) -> Result<FilterRecord, ControllerError> {
        let record = self.fetch_record(name)?;
        info!(filter = name, filter_id = record.filter_id, "imported audit log filter");
        Ok(record)
    }

    /// Read filter `name` as currently stored.
    ///
    /// Returns `None` when the filter is gone, so the caller can drop it from
    /// its state. When `last_known` is given, `drifted` reports whether the
    /// stored definition differs from it after canonicalization.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::Store`] if the read fails.
    pub fn read(
        &self,
        name: &str,
        last_known: Option<&str>,
    ) -> Result<Option<FilterObservation>, ControllerError> {
        let Some(stored) = self.stored_filter(name)? else {
            return Ok(None);
        };
        let record = to_record(name, stored);
        let drifted = last_known.is_some_and(|known| !same_definition(known, &record.stored_text));
        Ok(Some(FilterObservation { record, drifted }))
    }

    fn filter_count(&self, name: &str) -> Result<u64, ControllerError> {
        self.store
            .count_filters(name)
            .map_err(|source| ControllerError::store(StoreOp::CountFilters, source))
    }

    fn stored_filter(&self, name: &str) -> Result<Option<StoredFilter>, ControllerError> {
        self.store
            .get_filter(name)
            .map_err(|source| ControllerError::store(StoreOp::GetFilter, source))
    }

    fn fetch_record(&self, name: &str) -> Result<FilterRecord, ControllerError> {
        self.stored_filter(name)?
            .map(|stored| to_record(name, stored))
            .ok_or_else(|| ControllerError::FilterNotFound(name.to_string()))
    }
}

/// Build a record with canonical text. Stored text that is not JSON is kept
/// verbatim.
fn to_record(name: &str, stored: StoredFilter) -> FilterRecord {
    let stored_text = match canonicalize(&stored.text) {
        Ok(canonical) => canonical,
        Err(err) => {
            warn!(filter = name, error = %err, "stored filter definition is not valid JSON");
            stored.text
        }
    };
    FilterRecord {
        name: name.to_string(),
        filter_id: stored.filter_id,
        stored_text,
    }
}
