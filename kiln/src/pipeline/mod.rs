//! Pipeline definition and execution.
//!
//! This module provides:
//! - The ordered pipeline definition and its validation
//! - The per-phase runner with fail-fast/fail-soft semantics
//! - The executor sequencing the four phases with a guaranteed exit phase

mod def;
mod executor;
mod phase_runner;


pub use def::{PipelineDef, PluginRequest};
pub use executor::{BuildOutcome, PipelineExecutor};
pub use phase_runner::{
    PhaseOutcome, PhaseReport, PhaseRunner, PluginExecution, PluginFailureRecord,
};
