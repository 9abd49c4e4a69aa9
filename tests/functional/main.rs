// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

//! Functional tests for the Nexus reconcile loop.
//!
//! Every scenario drives the real `reconcile` function against the
//! in-memory cluster store, with recorded events, static capabilities, a
//! fixed tag list and a fake Nexus REST server. No Kubernetes cluster is
//! needed.
//!
//! ```bash
//! # Run all functional tests
//! cargo test --test functional
//!
//! # Run specific test
//! cargo test --test functional test_update_rollback
//! ```
//!
//! ## Test Categories
//!
//! - **Reconcile tests**: child creation, idempotence, drift repair,
//!   validation and fatal errors
//! - **Update tests**: automatic update start, success and rollback
//! - **Persistence tests**: optimistic-concurrency conflicts on the CR
//! - **Engine tests**: applier ordering and failures, deployed-state reads
//! - **Update monitor tests**: rollout tracking and rollback in isolation

#[path = "../common/mod.rs"]
mod common;

mod engine_tests;
mod harness;
mod persistence_tests;
mod update_monitor_tests;

pub use harness::*;
