//! Workflow state and build-context collaborators.
//!
//! The [`WorkflowState`] is the single source of truth passed to every
//! plugin; its accessors enforce the field-level write-once invariants.

mod params;
mod source;
mod state;

pub use params::{RemoteSource, UserParams};
pub use source::{BuildDir, DockerfileImages, Source};
pub use state::{BuildFailure, BuildReservation, WorkflowState};
