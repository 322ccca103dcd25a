//! Pipeline definition.

use crate::core::BuildPhase;
use crate::errors::BuildError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

fn default_true() -> bool {
    true
}

/// A request for one plugin in a pipeline definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginRequest {
    /// The plugin key to resolve from the registry.
    pub name: String,
    /// Plugin arguments, validated by the plugin's constructor.
    #[serde(default)]
    pub args: serde_json::Value,
    /// When false, an unregistered plugin is silently skipped instead of
    /// failing the pipeline build.
    #[serde(default = "default_true")]
    pub required: bool,
}

impl PluginRequest {
    /// Creates a required plugin request with no arguments.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: serde_json::Value::Null,
            required: true,
        }
    }

    /// Sets the plugin arguments.
    #[must_use]
    pub fn with_args(mut self, args: serde_json::Value) -> Self {
        self.args = args;
        self
    }

    /// Marks the plugin as optional.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

/// The ordered pipeline definition: which plugins run in which phase.
///
/// Within a phase, execution order is exactly declaration order; later
/// plugins may rely on earlier plugins' results already being present in
/// the workflow state. Producer-before-consumer ordering is the caller's
/// responsibility.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineDef {
    /// Pre-build plugins.
    #[serde(default)]
    pub prebuild: Vec<PluginRequest>,
    /// Build-step plugins (fallback chain).
    #[serde(default)]
    pub buildstep: Vec<PluginRequest>,
    /// Post-build plugins.
    #[serde(default)]
    pub postbuild: Vec<PluginRequest>,
    /// Exit plugins; these run on every exit path.
    #[serde(default, rename = "exit")]
    pub exit_plugins: Vec<PluginRequest>,
}

impl PipelineDef {
    /// Creates an empty pipeline definition.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a pre-build plugin.
    #[must_use]
    pub fn prebuild(mut self, request: PluginRequest) -> Self {
        self.prebuild.push(request);
        self
    }

    /// Appends a build-step plugin.
    #[must_use]
    pub fn buildstep(mut self, request: PluginRequest) -> Self {
        self.buildstep.push(request);
        self
    }

    /// Appends a post-build plugin.
    #[must_use]
    pub fn postbuild(mut self, request: PluginRequest) -> Self {
        self.postbuild.push(request);
        self
    }

    /// Appends an exit plugin.
    #[must_use]
    pub fn exit(mut self, request: PluginRequest) -> Self {
        self.exit_plugins.push(request);
        self
    }

    /// Returns the requests declared for a phase.
    #[must_use]
    pub fn phase(&self, phase: BuildPhase) -> &[PluginRequest] {
        match phase {
            BuildPhase::Prebuild => &self.prebuild,
            BuildPhase::Buildstep => &self.buildstep,
            BuildPhase::Postbuild => &self.postbuild,
            BuildPhase::Exit => &self.exit_plugins,
        }
    }

    /// Validates the definition before execution.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when a phase declares the same plugin
    /// key twice.
    pub fn validate(&self) -> Result<(), BuildError> {
        for phase in BuildPhase::ORDER {
            let mut seen = HashSet::new();
            for request in self.phase(phase) {
                if !seen.insert(request.name.as_str()) {
                    return Err(BuildError::configuration(format!(
                        "duplicate plugin '{}' in {phase} phase",
                        request.name
                    )));
                }
            }
        }
        Ok(())
    }
}
