//! Store failures at each step of the filter and assignment lifecycles.
//!
//! Checks that nothing destructive happens before the update snapshot is
//! complete, that rollback failures are flagged for manual repair, and that
//! store errors are never retried.

mod support;

use auditfilter_core::controller::{AssignmentController, FilterController, UpdateState};
use auditfilter_core::error::{ControllerError, ErrorCode};
use auditfilter_core::store::{FilterStore, StoreOp};
use support::{FaultKind, FaultyStore, seed};

const OLD: &str = r#"{"filter":{"class":{"name":"connection"}}}"#;
const NEW: &str = r#"{"filter":{"class":{"name":"general"}}}"#;

#[test]
fn snapshot_failure_aborts_before_removal() {
    let store = FaultyStore::new();
    seed(&store, "audit", OLD, &["app@%"]);
    store.fail(StoreOp::ListAssignments, FaultKind::Transport("timeout"));

    let report = FilterController::new(&store).update("audit", NEW);
    assert_eq!(report.state(), UpdateState::Aborted);
    assert_eq!(store.call_count(StoreOp::RemoveFilter), 0);
    assert_eq!(store.inner().get_filter("audit").expect("get").expect("kept").text, OLD);
    assert_eq!(store.inner().list_assignments("audit").expect("list").len(), 1);

    let err = report.into_result().expect_err("aborted");
    assert_eq!(err.code(), ErrorCode::StoreUnavailable);
}

#[test]
fn remove_failure_aborts_with_store_message() {
    let store = FaultyStore::new();
    seed(&store, "audit", OLD, &["app@%"]);
    store.fail(StoreOp::RemoveFilter, FaultKind::Rejected("ERROR: Permission denied."));

    let report = FilterController::new(&store).update("audit", NEW);
    assert_eq!(report.state(), UpdateState::Aborted);
    assert_eq!(store.call_count(StoreOp::SetFilter), 0);
    assert_eq!(store.inner().list_assignments("audit").expect("list").len(), 1);

    let err = report.into_result().expect_err("aborted");
    assert!(matches!(
        err,
        ControllerError::StoreRejected { operation: StoreOp::RemoveFilter, ref message }
            if message == "ERROR: Permission denied."
    ));
}

#[test]
fn failed_rollback_requires_manual_intervention() {
    let store = FaultyStore::new();
    seed(&store, "audit", OLD, &["app@%", "ops@%"]);
    store.fail(StoreOp::SetFilter, FaultKind::Transport("connection lost"));

    let report = FilterController::new(&store).update("audit", NEW);
    assert_eq!(report.state(), UpdateState::RolledBackFailed);
    assert_eq!(store.call_count(StoreOp::SetFilter), 2);
    assert_eq!(store.call_count(StoreOp::SetUser), 0);
    assert!(report.restorations.is_empty());
    assert_eq!(store.inner().get_filter("audit").expect("get"), None);

    let err = report.into_result().expect_err("rollback failed");
    assert!(err.requires_manual_intervention());
    assert_eq!(err.code(), ErrorCode::RollbackFailed);
    assert!(err.to_string().contains("manual restoration"));
}

#[test]
fn rollback_succeeds_but_some_bindings_are_not_restored() {
    let store = FaultyStore::new();
    seed(&store, "audit", OLD, &["app@%", "ops@10.0.0.%"]);
    store
        .fail_nth(StoreOp::SetFilter, 1, FaultKind::Rejected("ERROR: Incorrect rule definition."))
        .fail_arg(StoreOp::SetUser, "ops@10.0.0.%", FaultKind::Transport("connection reset"));

    let report = FilterController::new(&store).update("audit", NEW);
    assert_eq!(report.state(), UpdateState::RolledBackOk);
    assert_eq!(store.call_count(StoreOp::SetFilter), 2);
    assert_eq!(store.call_count(StoreOp::SetUser), 2);
    assert_eq!(store.inner().get_filter("audit").expect("get").expect("restored").text, OLD);

    assert_eq!(report.restorations.len(), 2);
    let failed: Vec<String> = report
        .failed_restorations()
        .map(|outcome| outcome.assignment.key().spec())
        .collect();
    assert_eq!(failed, vec!["ops@10.0.0.%".to_string()]);

    let restore_warnings: Vec<_> = report
        .warnings
        .iter()
        .filter(|w| w.summary == "Failed to Restore User Assignment")
        .collect();
    assert_eq!(restore_warnings.len(), 1);
    assert!(restore_warnings[0].detail.contains("ops@10.0.0.%"));
    assert!(restore_warnings[0].detail.contains("manually reassign"));

    assert_eq!(
        store.inner().get_user("app", "%").expect("get"),
        Some("audit".to_string())
    );
    assert_eq!(store.inner().get_user("ops", "10.0.0.%").expect("get"), None);

    let err = report.into_result().expect_err("rolled back");
    assert_eq!(err.code(), ErrorCode::RecreateRolledBack);
    assert!(!err.requires_manual_intervention());
}

#[test]
fn read_back_failure_after_update_is_only_a_warning() {
    let store = FaultyStore::new();
    seed(&store, "audit", OLD, &[]);
    // First read is the snapshot, second the read-back.
    store.fail_nth(StoreOp::GetFilter, 2, FaultKind::Transport("timeout"));

    let report = FilterController::new(&store).update("audit", NEW);
    assert_eq!(report.state(), UpdateState::CompletedWithWarnings);
    assert!(report.record.is_none());
    assert!(report.error.is_none());
    assert!(report.warnings.iter().any(|w| w.summary == "Filter Read-Back Failed"));
    assert_eq!(store.inner().get_filter("audit").expect("get").expect("new").text, NEW);
}

#[test]
fn restoration_failures_are_not_retried() {
    let store = FaultyStore::new();
    seed(&store, "audit", OLD, &["a@%", "b@%", "c@%"]);
    store.fail(StoreOp::SetUser, FaultKind::Transport("pool exhausted"));

    let report = FilterController::new(&store).update("audit", NEW);
    assert_eq!(report.state(), UpdateState::CompletedWithWarnings);
    assert_eq!(store.call_count(StoreOp::SetUser), 3);
    assert_eq!(report.failed_restorations().count(), 3);
}

#[test]
fn create_surfaces_store_failures() {
    let store = FaultyStore::new();
    store.fail(StoreOp::CountFilters, FaultKind::Transport("no route to host"));
    let err = FilterController::new(&store)
        .create("audit", OLD)
        .expect_err("store down");
    assert!(matches!(
        err,
        ControllerError::Store { operation: StoreOp::CountFilters, .. }
    ));
    assert_eq!(store.call_count(StoreOp::SetFilter), 0);
}

#[test]
fn invalid_definition_makes_no_store_calls() {
    let store = FaultyStore::new();
    let ctl = FilterController::new(&store);
    assert!(ctl.create("audit", "[1, 2]").expect_err("not an object").is_validation());

    let report = ctl.update("audit", r#"{"filter":{"and":[]}}"#);
    assert_eq!(report.state(), UpdateState::Rejected);
    assert!(store.calls().is_empty());
}

#[test]
fn assignment_rejected_by_store() {
    let store = FaultyStore::new();
    seed(&store, "audit", OLD, &[]);
    store.fail(StoreOp::SetUser, FaultKind::Rejected("ERROR: Invalid user."));

    let err = AssignmentController::new(&store)
        .assign("app", None, "audit")
        .expect_err("rejected");
    assert_eq!(err.code(), ErrorCode::StoreRejected);
    assert_eq!(store.inner().get_user("app", "%").expect("get"), None);
}

#[test]
fn delete_checks_existence_first() {
    let store = FaultyStore::new();
    let err = FilterController::new(&store).delete("ghost").expect_err("missing");
    assert!(err.is_not_found());
    assert_eq!(store.calls(), vec![StoreOp::CountFilters]);
}
