//! Controller module for nexus-operator.
//!
//! The reconcile engine (supervisor, differ, applier), automatic update
//! tracking, status computation and conflict-safe persistence, and the
//! reconcile loop that ties them together.

pub mod apply;
pub mod context;
pub mod defaults;
pub mod diff;
pub mod error;
pub mod persist;
pub mod reconciler;
pub mod status;
pub mod supervisor;
pub mod update_monitor;
pub mod update_state;
