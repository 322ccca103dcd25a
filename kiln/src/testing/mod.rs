//! Test fixtures and mock implementations.
//!
//! Available to downstream crates writing plugin tests as well as to this
//! crate's own test suite.

mod mocks;

pub use mocks::{
    ExecutionLog, MockBuildstepPlugin, MockCachitoClient, MockKojiClient, MockPlugin, MockTasker,
};

use crate::workflow::{BuildDir, DockerfileImages, Source, UserParams, WorkflowState};
use std::path::Path;

/// Creates a throwaway workflow state for tests.
#[must_use]
pub fn test_state() -> WorkflowState {
    test_state_in(Path::new("/tmp/kiln-test"))
}

/// Creates a throwaway workflow state writing artifacts under `dir`.
#[must_use]
pub fn test_state_in(dir: &Path) -> WorkflowState {
    WorkflowState::new(
        UserParams::new("x86_64", "httpd", "2.4").with_image_tag("registry.example.com/httpd:2.4"),
        DockerfileImages::new(vec!["registry.example.com/ubi9:latest".to_string()])
            .with_base_layer_count(3),
        BuildDir::new(dir),
        Source::dummy(dir),
    )
}
