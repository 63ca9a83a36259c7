//! Replace-and-restore update of a filter definition.
//!
//! The store has no in-place update, so an update is:
//!
//! ```text
//! Requested → Validating ─┬─ Rejected
//!                         └─ CapturingSnapshot ─┬─ Aborted
//!                                               └─ Removing ─┬─ Aborted
//!                                                            └─ Recreating
//! Recreating ─┬─ RestoringAssignments ─┬─ CompletedClean
//!             │                        └─ CompletedWithWarnings
//!             └─ RecreateFailed → RollingBack ─┬─ RolledBackOk
//!                                              └─ RolledBackFailed
//! ```
//!
//! Each non-terminal step owns the [`UpdatePlan`] it needs, so the rollback and
//! restoration paths only see data that exists at that point. Every report
//! carries the in-place-update advisory, whatever the outcome.

use serde::Serialize;
use std::fmt;
use tracing::{debug, error, info, warn};

use super::reconcile::RestoreOutcome;
use super::{FilterController, Warning, expect_ok};
use crate::definition::FilterDefinition;
use crate::error::ControllerError;
use crate::model::{FilterRecord, UserAssignment};
use crate::store::{FilterStore, StoreOp};

/// Externally visible update states, recorded in [`UpdateReport::trace`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateState {
    Requested,
    Validating,
    Rejected,
    CapturingSnapshot,
    Removing,
    Aborted,
    Recreating,
    RecreateFailed,
    RollingBack,
    RolledBackOk,
    RolledBackFailed,
    RestoringAssignments,
    CompletedClean,
    CompletedWithWarnings,
}

impl UpdateState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Requested => "requested",
            Self::Validating => "validating",
            Self::Rejected => "rejected",
            Self::CapturingSnapshot => "capturing_snapshot",
            Self::Removing => "removing",
            Self::Aborted => "aborted",
            Self::Recreating => "recreating",
            Self::RecreateFailed => "recreate_failed",
            Self::RollingBack => "rolling_back",
            Self::RolledBackOk => "rolled_back_ok",
            Self::RolledBackFailed => "rolled_back_failed",
            Self::RestoringAssignments => "restoring_assignments",
            Self::CompletedClean => "completed_clean",
            Self::CompletedWithWarnings => "completed_with_warnings",
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Rejected
                | Self::Aborted
                | Self::RolledBackOk
                | Self::RolledBackFailed
                | Self::CompletedClean
                | Self::CompletedWithWarnings
        )
    }

    /// Whether the new definition is in place.
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::CompletedClean | Self::CompletedWithWarnings)
    }
}

impl fmt::Display for UpdateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything needed to roll back or restore during one update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatePlan {
    pub filter_name: String,
    /// Stored text before the update, byte for byte.
    pub old_text: String,
    /// Canonical new definition.
    pub new_text: String,
    pub affected_assignments: Vec<UserAssignment>,
}

/// What an update did.
#[derive(Debug)]
pub struct UpdateReport {
    pub filter_name: String,
    /// States visited, ending in a terminal state.
    pub trace: Vec<UpdateState>,
    /// Advisory and restoration warnings, in the order they were raised.
    pub warnings: Vec<Warning>,
    /// One outcome per binding re-issued, onto the new filter or, after a
    /// rollback, onto the restored one.
    pub restorations: Vec<RestoreOutcome>,
    /// Filter as read back after the update, when it could be read.
    pub record: Option<FilterRecord>,
    /// Set for every terminal state except the two completed ones.
    pub error: Option<ControllerError>,
}

impl UpdateReport {
    /// Terminal state of the update.
    #[must_use]
    pub fn state(&self) -> UpdateState {
        self.trace.last().copied().unwrap_or(UpdateState::Requested)
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.state().is_success()
    }

    /// Bindings that could not be re-issued and need manual reassignment.
    pub fn failed_restorations(&self) -> impl Iterator<Item = &RestoreOutcome> {
        self.restorations.iter().filter(|outcome| !outcome.is_ok())
    }

    /// Convert into `Ok(self)` on completion, or the update's error.
    ///
    /// # Errors
    ///
    /// Returns the error recorded for the terminal state.
    pub fn into_result(mut self) -> Result<Self, ControllerError> {
        match self.error.take() {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }
}

/// Summary of the advisory attached to every update.
pub const IN_PLACE_ADVISORY: &str = "Filter Update Requires Recreation";

fn in_place_advisory() -> Warning {
    Warning::new(
        IN_PLACE_ADVISORY,
        "Audit log filters cannot be updated in place. The existing filter is removed and \
         recreated with the new definition, which may briefly affect sessions using it. \
         Sessions may need to reconnect to pick up the new rules.",
    )
}

enum Step {
    Requested,
    Validating,
    CapturingSnapshot(FilterDefinition),
    Removing(UpdatePlan),
    Recreating(UpdatePlan),
    RecreateFailed(UpdatePlan, ControllerError),
    RollingBack(UpdatePlan, ControllerError),
    RestoringAssignments(UpdatePlan),
    Finished(UpdateState, Option<ControllerError>),
}

impl Step {
    const fn state(&self) -> UpdateState {
        match self {
            Self::Requested => UpdateState::Requested,
            Self::Validating => UpdateState::Validating,
            Self::CapturingSnapshot(_) => UpdateState::CapturingSnapshot,
            Self::Removing(_) => UpdateState::Removing,
            Self::Recreating(_) => UpdateState::Recreating,
            Self::RecreateFailed(..) => UpdateState::RecreateFailed,
            Self::RollingBack(..) => UpdateState::RollingBack,
            Self::RestoringAssignments(_) => UpdateState::RestoringAssignments,
            Self::Finished(state, _) => *state,
        }
    }
}

/// Mutable state of one update run; becomes the [`UpdateReport`].
struct UpdateRun<'a> {
    name: &'a str,
    new_text: &'a str,
    trace: Vec<UpdateState>,
    warnings: Vec<Warning>,
    restorations: Vec<RestoreOutcome>,
    record: Option<FilterRecord>,
}

impl UpdateRun<'_> {
    fn into_report(self, error: Option<ControllerError>) -> UpdateReport {
        UpdateReport {
            filter_name: self.name.to_string(),
            trace: self.trace,
            warnings: self.warnings,
            restorations: self.restorations,
            record: self.record,
            error,
        }
    }
}

impl<S: FilterStore> FilterController<S> {
    /// Replace the definition of filter `name` with `new_text`.
    ///
    /// Never returns early: the outcome, including failures, is in the
    /// returned report. Use [`UpdateReport::into_result`] to turn it into a
    /// `Result`.
    ///
    /// On a failed recreation the previous stored text is written back
    /// verbatim and its bindings are restored; if that also fails the error
    /// [`requires_manual_intervention`](ControllerError::requires_manual_intervention).
    /// Binding restoration never aborts the update: failures are reported as
    /// warnings and in [`UpdateReport::failed_restorations`].
    #[must_use]
    pub fn update(&self, name: &str, new_text: &str) -> UpdateReport {
        let mut run = UpdateRun {
            name,
            new_text,
            trace: Vec::new(),
            warnings: vec![in_place_advisory()],
            restorations: Vec::new(),
            record: None,
        };

        let mut step = Step::Requested;
        loop {
            let state = step.state();
            debug!(filter = name, ?state, "filter update state");
            run.trace.push(state);

            step = match step {
                Step::Finished(state, error) => {
                    if let Some(err) = &error {
                        warn!(filter = name, ?state, error = %err, "filter update failed");
                    } else {
                        info!(filter = name, ?state, "filter updated");
                    }
                    return run.into_report(error);
                }
                other => self.advance(other, &mut run),
            };
        }
    }

    fn advance(&self, step: Step, run: &mut UpdateRun<'_>) -> Step {
        match step {
            Step::Requested => Step::Validating,

            Step::Validating => match FilterDefinition::parse(run.name, run.new_text) {
                Ok(definition) => Step::CapturingSnapshot(definition),
                Err(err) => Step::Finished(UpdateState::Rejected, Some(err.into())),
            },

            Step::CapturingSnapshot(definition) => match self.capture_plan(definition) {
                Ok(plan) => Step::Removing(plan),
                Err(err) => Step::Finished(UpdateState::Aborted, Some(err)),
            },

            Step::Removing(plan) => {
                match expect_ok(StoreOp::RemoveFilter, self.store.remove_filter(&plan.filter_name))
                {
                    Ok(()) => Step::Recreating(plan),
                    Err(err) => Step::Finished(UpdateState::Aborted, Some(err)),
                }
            }

            Step::Recreating(plan) => match expect_ok(
                StoreOp::SetFilter,
                self.store.set_filter(&plan.filter_name, &plan.new_text),
            ) {
                Ok(()) => Step::RestoringAssignments(plan),
                Err(err) => Step::RecreateFailed(plan, err),
            },

            Step::RecreateFailed(plan, recreate) => {
                warn!(
                    filter = %plan.filter_name,
                    error = %recreate,
                    "recreate with new definition failed, rolling back"
                );
                Step::RollingBack(plan, recreate)
            }

            Step::RollingBack(plan, recreate) => self.roll_back(plan, recreate, run),

            Step::RestoringAssignments(plan) => self.finish_restore(&plan, run),

            Step::Finished(..) => step,
        }
    }

    /// Read what a rollback and restoration would need. No mutation happens
    /// before this succeeds.
    fn capture_plan(&self, definition: FilterDefinition) -> Result<UpdatePlan, ControllerError> {
        let old = self
            .store
            .get_filter(&definition.name)
            .map_err(|source| ControllerError::store(StoreOp::GetFilter, source))?
            .ok_or_else(|| ControllerError::FilterNotFound(definition.name.clone()))?;

        let affected_assignments = self.reconciler().snapshot(&definition.name)?;

        Ok(UpdatePlan {
            filter_name: definition.name,
            old_text: old.text,
            new_text: definition.normalized_text,
            affected_assignments,
        })
    }

    fn roll_back(&self, plan: UpdatePlan, recreate: ControllerError, run: &mut UpdateRun<'_>) -> Step {
        let rollback = expect_ok(
            StoreOp::SetFilter,
            self.store.set_filter(&plan.filter_name, &plan.old_text),
        );

        match rollback {
            Ok(()) => {
                info!(filter = %plan.filter_name, "previous filter definition restored");
                self.restore_bindings(&plan, run);
                run.record = self.read_back(&plan.filter_name, run);
                Step::Finished(
                    UpdateState::RolledBackOk,
                    Some(ControllerError::RecreateFailed {
                        filter: plan.filter_name,
                        recreate: Box::new(recreate),
                        rollback: None,
                    }),
                )
            }
            Err(rollback) => {
                error!(
                    filter = %plan.filter_name,
                    error = %rollback,
                    lost_bindings = plan.affected_assignments.len(),
                    "rollback failed; filter and its bindings need manual restoration"
                );
                Step::Finished(
                    UpdateState::RolledBackFailed,
                    Some(ControllerError::RecreateFailed {
                        filter: plan.filter_name,
                        recreate: Box::new(recreate),
                        rollback: Some(Box::new(rollback)),
                    }),
                )
            }
        }
    }

    fn finish_restore(&self, plan: &UpdatePlan, run: &mut UpdateRun<'_>) -> Step {
        let clean = self.restore_bindings(plan, run);
        run.record = self.read_back(&plan.filter_name, run);

        let state = if clean && run.record.is_some() {
            UpdateState::CompletedClean
        } else {
            UpdateState::CompletedWithWarnings
        };
        Step::Finished(state, None)
    }

    /// Re-issue every captured binding; returns whether all succeeded.
    fn restore_bindings(&self, plan: &UpdatePlan, run: &mut UpdateRun<'_>) -> bool {
        if plan.affected_assignments.is_empty() {
            return true;
        }

        run.warnings.push(Warning::new(
            "Restoring User Assignments",
            format!(
                "Restoring {} user assignments that were affected by the filter update. \
                 These users may experience a brief interruption in audit logging.",
                plan.affected_assignments.len()
            ),
        ));

        let outcomes = self
            .reconciler()
            .restore(&plan.affected_assignments, &plan.filter_name);

        let mut clean = true;
        for outcome in &outcomes {
            if let Err(err) = &outcome.result {
                clean = false;
                run.warnings.push(Warning::new(
                    "Failed to Restore User Assignment",
                    format!(
                        "Could not restore user assignment for '{}' ({}, {}): {err}. \
                         You may need to manually reassign this user to filter '{}'.",
                        outcome.assignment.key(),
                        outcome.assignment.username,
                        outcome.assignment.userhost,
                        plan.filter_name
                    ),
                ));
            }
        }
        run.restorations.extend(outcomes);
        clean
    }

    fn read_back(&self, name: &str, run: &mut UpdateRun<'_>) -> Option<FilterRecord> {
        match self.fetch_record(name) {
            Ok(record) => Some(record),
            Err(err) => {
                warn!(filter = name, error = %err, "could not read back filter after update");
                run.warnings.push(Warning::new(
                    "Filter Read-Back Failed",
                    format!("The filter was written but could not be read back: {err}."),
                ));
                None
            }
        }
    }
}
