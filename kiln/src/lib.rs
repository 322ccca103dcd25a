//! # Kiln
//!
//! A plugin-pipeline orchestrator for container image builds.
//!
//! Kiln sequences discrete plugins through four fixed phases (pre-build,
//! build-step, post-build, exit) against a shared workflow state:
//!
//! - **Workflow state**: the single accumulator of build facts and
//!   per-phase plugin results, with field-level write-once invariants
//! - **Fault tolerance**: per-plugin fail-fast vs fail-soft policy; the
//!   exit phase runs on every path, success or abort
//! - **Build-step fallback**: the first build-step plugin to produce an
//!   image wins, the rest are skipped
//! - **Capability injection**: container runtime, build-tracking and
//!   remote-source services are consumed through narrow traits, never
//!   owned by the core
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use kiln::prelude::*;
//!
//! let registry = PluginRegistry::with_builtins()?;
//! let def = PipelineDef::new()
//!     .prebuild(PluginRequest::new("bump_release"))
//!     .buildstep(PluginRequest::new("filesystem_builder"))
//!     .postbuild(PluginRequest::new("rpm_manifest"))
//!     .exit(PluginRequest::new("store_metadata"));
//!
//! let executor = PipelineExecutor::from_def(&registry, &def)?;
//! let outcome = executor.execute(&state, &caps).await;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod artifacts;
pub mod capabilities;
pub mod core;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pipeline;
pub mod plugin;
pub mod plugins;
pub mod testing;
pub mod utils;
pub mod workflow;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::capabilities::{
        CachitoClient, Capabilities, ContainerTasker, HttpClient, KojiClient, NvrRequest,
        TaskInfo, TaskState,
    };
    pub use crate::core::{BuildPhase, BuildResult, ImageComponent};
    pub use crate::errors::{BuildError, CapabilityError, PluginRunError, StateConflictError};
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::pipeline::{
        BuildOutcome, PhaseOutcome, PhaseReport, PhaseRunner, PipelineDef, PipelineExecutor,
        PluginRequest,
    };
    pub use crate::plugin::{BuildstepPlugin, Plugin, PluginRegistry};
    pub use crate::workflow::{
        BuildDir, BuildFailure, BuildReservation, DockerfileImages, Source, UserParams,
        WorkflowState,
    };
}
