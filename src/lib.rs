// src/lib.rs

//! Kiln
//!
//! Buildpack detection and build-plan resolution core.
//!
//! Given an ordered set of candidate buildpack groups and an
//! application source tree, kiln runs each member's `bin/detect`
//! executable, parses the plans they publish, and selects the first
//! group whose members jointly satisfy the provides/requires graph
//! and the privileged-mixin stage rules. The result is the chosen
//! build group, the privileged (stack) build and run groups, and the
//! materialized build and run plans.
//!
//! # Architecture
//!
//! - Descriptors: `(id, version)` references resolved from
//!   content-addressed buildpack roots
//! - Detect runs: one blocking child process per buildpack with a
//!   composed environment and captured output
//! - Orders: nested meta-buildpack orders flattened lazily in
//!   lexicographic depth-first order
//! - Resolution: a mixed-radix search over alternate plans with
//!   greedy relaxation of optional contributors

pub mod api;
pub mod buildpack;
pub mod detect;
mod error;
pub mod logging;
pub mod plan;

pub use api::BuildpackApi;
pub use buildpack::{
    Buildpack, BuildpackDescriptor, BuildpackGroup, BuildpackOrder, BuildpackStore, OrderToml,
};
pub use detect::{DetectConfig, DetectResult, DetectRun, CODE_DETECT_FAIL, CODE_DETECT_PASS};
pub use error::{Error, Result};
pub use logging::{LogLevel, Logger, MemoryLogger, TracingLogger};
pub use plan::{BuildPlan, BuildPlanEntry, Provide, Require};
