//! Error types for the kiln build orchestrator.
//!
//! The taxonomy distinguishes configuration problems (caught before any
//! phase starts), illegal re-writes of once-only workflow state, wrapped
//! upstream service failures, malformed external data, and an external
//! build-cancellation signal observed mid-plugin.

use crate::core::BuildPhase;
use thiserror::Error;

/// The main error type raised by plugins and the pipeline core.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Bad or missing pipeline/plugin arguments. Fatal; detected before
    /// execution where possible.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An illegal re-write of a once-only workflow state field.
    #[error("{0}")]
    StateConflict(#[from] StateConflictError),

    /// A wrapped failure from an external capability (tasker, Koji,
    /// Cachito, registry, HTTP).
    #[error("{0}")]
    External(#[from] CapabilityError),

    /// Malformed data received from an external system.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// The build was canceled by an external orchestrator.
    #[error("build canceled: {0}")]
    Canceled(String),

    /// IO error while writing or reading a build artifact.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BuildError {
    /// Creates a configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Creates an invalid-data error.
    #[must_use]
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData(message.into())
    }

    /// Creates a cancellation error.
    #[must_use]
    pub fn canceled(reason: impl Into<String>) -> Self {
        Self::Canceled(reason.into())
    }

    /// Returns true if this error is a build cancellation.
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled(_))
    }
}

/// Error raised when a once-only workflow state field is written twice.
#[derive(Debug, Clone, Error)]
#[error("state conflict: field '{field}' is already set")]
pub struct StateConflictError {
    /// The workflow state field that was illegally re-written.
    pub field: String,
}

impl StateConflictError {
    /// Creates a new state conflict error.
    #[must_use]
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }
}

/// Errors raised by external capability clients.
///
/// Capability clients own their own retry/backoff policy; by the time an
/// error surfaces here it is terminal for the call that produced it.
#[derive(Debug, Error)]
pub enum CapabilityError {
    /// The remote service rejected or failed the call.
    #[error("{service} call '{call}' failed: {message}")]
    Service {
        /// The capability that failed (e.g. "koji", "cachito", "tasker").
        service: &'static str,
        /// The call that failed (e.g. "getTaskInfo").
        call: &'static str,
        /// The failure detail reported by the service.
        message: String,
    },

    /// The transport layer failed before the service could answer.
    #[error("transport failure: {source}")]
    Transport {
        /// The underlying transport error.
        #[source]
        source: anyhow::Error,
    },

    /// IO failure while moving capability payloads (e.g. task output
    /// downloads).
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CapabilityError {
    /// Creates a service failure error.
    #[must_use]
    pub fn service(
        service: &'static str,
        call: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self::Service {
            service,
            call,
            message: message.into(),
        }
    }

    /// Creates a transport failure from any underlying error.
    #[must_use]
    pub fn transport(source: impl Into<anyhow::Error>) -> Self {
        Self::Transport {
            source: source.into(),
        }
    }
}

/// A plugin failure attributed to its plugin key and phase.
#[derive(Debug, Error)]
#[error("plugin '{plugin}' in {phase} phase failed: {source}")]
pub struct PluginRunError {
    /// The key of the failing plugin.
    pub plugin: String,
    /// The phase the plugin ran in.
    pub phase: BuildPhase,
    /// The underlying error.
    #[source]
    pub source: BuildError,
}

impl PluginRunError {
    /// Creates a new attributed plugin failure.
    #[must_use]
    pub fn new(plugin: impl Into<String>, phase: BuildPhase, source: BuildError) -> Self {
        Self {
            plugin: plugin.into(),
            phase,
            source,
        }
    }

    /// Returns true if the underlying error is a build cancellation.
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.source.is_canceled()
    }
}
