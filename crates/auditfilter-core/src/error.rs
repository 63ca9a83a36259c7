use std::fmt;

use crate::definition::ValidationError;
use crate::store::{StoreError, StoreOp};

/// Machine-readable error codes for operators and automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    MalformedJson,
    NotAnObject,
    MissingFilterRoot,
    AmbiguousCondition,
    InvalidOperand,
    FilterExists,
    AssignmentExists,
    FilterNotFound,
    AssignmentNotFound,
    StoreUnavailable,
    StoreRejected,
    RecreateRolledBack,
    RollbackFailed,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::MalformedJson => "E1001",
            Self::NotAnObject => "E1002",
            Self::MissingFilterRoot => "E1003",
            Self::AmbiguousCondition => "E1004",
            Self::InvalidOperand => "E1005",
            Self::FilterExists => "E2001",
            Self::AssignmentExists => "E2002",
            Self::FilterNotFound => "E3001",
            Self::AssignmentNotFound => "E3002",
            Self::StoreUnavailable => "E5001",
            Self::StoreRejected => "E5002",
            Self::RecreateRolledBack => "E6001",
            Self::RollbackFailed => "E6002",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::MalformedJson => "Invalid JSON definition",
            Self::NotAnObject => "Definition is not a JSON object",
            Self::MissingFilterRoot => "Missing top-level filter object",
            Self::AmbiguousCondition => "Multiple logical operators in one condition",
            Self::InvalidOperand => "Malformed logical operator operand",
            Self::FilterExists => "Filter already exists",
            Self::AssignmentExists => "Assignment already exists",
            Self::FilterNotFound => "Filter not found",
            Self::AssignmentNotFound => "User assignment not found",
            Self::StoreUnavailable => "Store call failed",
            Self::StoreRejected => "Store function returned an error",
            Self::RecreateRolledBack => "Filter recreation failed, previous definition restored",
            Self::RollbackFailed => "Filter recreation and rollback both failed",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::MalformedJson | Self::NotAnObject | Self::MissingFilterRoot => {
                Some("Wrap the rules in a single JSON object: {\"filter\": { ... }}.")
            }
            Self::AmbiguousCondition => Some(
                "Split the object so each condition uses exactly one of and, or, not, field.",
            ),
            Self::InvalidOperand => Some(
                "Use a non-empty array of objects for and/or and an object for not/field.",
            ),
            Self::FilterExists => Some("Choose another name, or import the existing filter."),
            Self::AssignmentExists => Some("Reassign the user instead of creating a new binding."),
            Self::FilterNotFound | Self::AssignmentNotFound => None,
            Self::StoreUnavailable => Some("Check store connectivity and retry."),
            Self::StoreRejected => Some("Inspect the store's message; nothing was retried."),
            Self::RecreateRolledBack => Some(
                "The previous definition is active again. Fix the new definition and retry.",
            ),
            Self::RollbackFailed => Some(
                "The filter is missing from the store. Recreate it and reassign its users manually.",
            ),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Failure of a controller operation.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    /// Definition rejected before any store call.
    #[error("invalid filter definition: {0}")]
    Validation(#[from] ValidationError),

    #[error("a filter with name '{0}' already exists")]
    AlreadyExists(String),

    #[error("user assignment already exists for '{0}'")]
    AssignmentAlreadyExists(String),

    #[error("no audit log filter found with name '{0}'")]
    FilterNotFound(String),

    #[error("no user assignment found for '{0}'")]
    AssignmentNotFound(String),

    /// Transport or SQL failure.
    #[error("{operation} failed: {source}")]
    Store {
        operation: StoreOp,
        #[source]
        source: StoreError,
    },

    /// The store function answered something other than `"OK"`.
    #[error("{operation} returned an error: {message}")]
    StoreRejected { operation: StoreOp, message: String },

    /// Recreating a removed filter failed. `rollback` is `None` when the
    /// previous definition was restored, or the rollback failure otherwise.
    #[error("{}", describe_recreate_failure(.filter, .recreate, .rollback.as_deref()))]
    RecreateFailed {
        filter: String,
        recreate: Box<ControllerError>,
        rollback: Option<Box<ControllerError>>,
    },
}

fn describe_recreate_failure(
    filter: &str,
    recreate: &ControllerError,
    rollback: Option<&ControllerError>,
) -> String {
    match rollback {
        None => format!(
            "could not recreate filter '{filter}' with the new definition: {recreate}; \
             the previous definition was restored"
        ),
        Some(rollback) => format!(
            "could not recreate filter '{filter}' with the new definition: {recreate}; \
             restoring the previous definition also failed: {rollback}. \
             The filter has been removed and needs manual restoration"
        ),
    }
}

impl ControllerError {
    pub(crate) const fn store(operation: StoreOp, source: StoreError) -> Self {
        Self::Store { operation, source }
    }

    /// Machine-readable code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Validation(err) => match err {
                ValidationError::MalformedJson { .. } => ErrorCode::MalformedJson,
                ValidationError::NotAnObject { .. } => ErrorCode::NotAnObject,
                ValidationError::MissingFilterRoot { .. } => ErrorCode::MissingFilterRoot,
                ValidationError::MultipleLogicalOperators { .. } => ErrorCode::AmbiguousCondition,
                ValidationError::InvalidOperand { .. } => ErrorCode::InvalidOperand,
            },
            Self::AlreadyExists(_) => ErrorCode::FilterExists,
            Self::AssignmentAlreadyExists(_) => ErrorCode::AssignmentExists,
            Self::FilterNotFound(_) => ErrorCode::FilterNotFound,
            Self::AssignmentNotFound(_) => ErrorCode::AssignmentNotFound,
            Self::Store { .. } => ErrorCode::StoreUnavailable,
            Self::StoreRejected { .. } => ErrorCode::StoreRejected,
            Self::RecreateFailed { rollback: None, .. } => ErrorCode::RecreateRolledBack,
            Self::RecreateFailed { .. } => ErrorCode::RollbackFailed,
        }
    }

    /// Optional remediation hint for operators.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }

    /// Whether the error happened before any store call was made.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Whether the caller should drop local state for the missing object.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::FilterNotFound(_) | Self::AssignmentNotFound(_))
    }

    /// Whether the store may now hold neither the old nor the new filter.
    #[must_use]
    pub const fn requires_manual_intervention(&self) -> bool {
        matches!(self, Self::RecreateFailed { rollback: Some(_), .. })
    }
}
