//! auditfilter-core library.
//!
//! Validates audit log filter definitions and drives their lifecycle against a
//! store that only exposes side-effecting functions (`set_filter`,
//! `remove_filter`, `set_user`, ...). Replacing a filter therefore means
//! removing it, recreating it, and restoring the user assignments the removal
//! cascaded away; [`controller::FilterController::update`] runs that sequence as
//! an explicit state machine with rollback.
//!
//! # Conventions
//!
//! - **Errors**: library operations return [`error::ControllerError`] (or a
//!   module-specific `thiserror` enum); setup code uses `anyhow::Result`.
//! - **Logging**: use `tracing` macros (`info!`, `warn!`, `debug!`).

pub mod config;
pub mod controller;
pub mod definition;
pub mod error;
pub mod model;
pub mod store;

pub use controller::{AssignmentController, FilterController};
pub use definition::{FilterDefinition, canonicalize, validate};
pub use error::{ControllerError, ErrorCode};
pub use store::{FilterStore, SqliteStore};
