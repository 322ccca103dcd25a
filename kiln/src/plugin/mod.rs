//! Plugin traits.
//!
//! Plugins are the units of orchestration logic in a kiln pipeline. Each
//! contributes one named result to its phase, reads and writes the shared
//! [`WorkflowState`](crate::workflow::WorkflowState), and reaches external
//! systems only through injected
//! [`Capabilities`](crate::capabilities::Capabilities).

mod registry;

pub use registry::PluginRegistry;

use crate::capabilities::Capabilities;
use crate::core::BuildResult;
use crate::errors::BuildError;
use crate::workflow::WorkflowState;
use async_trait::async_trait;
use std::fmt::Debug;

/// Trait for pre-build, post-build and exit plugins.
///
/// A plugin's result value is stored under its key in the phase's result
/// mapping; plugins mutate only the workflow fields documented as
/// shared-write.
#[async_trait]
pub trait Plugin: Send + Sync + Debug {
    /// Returns the unique key of the plugin within its phase.
    fn key(&self) -> &str;

    /// Whether a failure of this plugin is non-fatal to its phase.
    fn is_allowed_to_fail(&self) -> bool {
        false
    }

    /// Executes the plugin against the shared workflow state.
    async fn run(
        &self,
        state: &WorkflowState,
        caps: &Capabilities,
    ) -> Result<serde_json::Value, BuildError>;
}

/// Trait for build-step plugins.
///
/// Exactly one build-step plugin is expected to produce the built artifact;
/// when several are configured the executor runs them as a fallback chain.
#[async_trait]
pub trait BuildstepPlugin: Send + Sync + Debug {
    /// Returns the unique key of the plugin.
    fn key(&self) -> &str;

    /// Builds the artifact, returning the build result.
    async fn build(
        &self,
        state: &WorkflowState,
        caps: &Capabilities,
    ) -> Result<BuildResult, BuildError>;
}

/// A plugin that does nothing and returns an empty result.
#[derive(Debug, Clone)]
pub struct NoOpPlugin {
    key: String,
}

impl NoOpPlugin {
    /// Creates a new no-op plugin.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

#[async_trait]
impl Plugin for NoOpPlugin {
    fn key(&self) -> &str {
        &self.key
    }

    async fn run(
        &self,
        _state: &WorkflowState,
        _caps: &Capabilities,
    ) -> Result<serde_json::Value, BuildError> {
        Ok(serde_json::Value::Null)
    }
}
