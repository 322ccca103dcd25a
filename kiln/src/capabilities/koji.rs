//! Build-tracking service (Koji) capability.

use crate::errors::CapabilityError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::path::{Path, PathBuf};

/// A name-version(-release) build coordinate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NvrRequest {
    /// Component name.
    pub name: String,
    /// Component version.
    pub version: String,
    /// Release; absent when querying for the next release.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release: Option<String>,
}

impl NvrRequest {
    /// Creates a name-version coordinate.
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            release: None,
        }
    }

    /// Sets the release.
    #[must_use]
    pub fn with_release(mut self, release: impl Into<String>) -> Self {
        self.release = Some(release.into());
        self
    }
}

/// An existing build record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRecord {
    /// The build id.
    pub id: u64,
    /// The build's name-version-release string.
    pub nvr: String,
}

/// A content-generator build reservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationReply {
    /// The reserved build id.
    pub build_id: u64,
    /// The token authorizing import or refund of the reservation.
    pub token: String,
}

/// The lifecycle state of a remote task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Queued, not picked up yet.
    Free,
    /// Running.
    Open,
    /// Finished successfully.
    Closed,
    /// Canceled remotely.
    Canceled,
    /// Failed remotely.
    Failed,
}

impl TaskState {
    /// Returns true for states the task will never leave.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Canceled | Self::Failed)
    }
}

/// A snapshot of a remote task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskInfo {
    /// The task id.
    pub id: u64,
    /// The task state at the time of the query.
    pub state: TaskState,
}

/// Capability interface over the Koji build-tracking service.
///
/// Retry/backoff policy belongs to implementations of this trait, not to
/// the plugins calling it.
#[async_trait]
pub trait KojiClient: Send + Sync + Debug {
    /// Returns the next release for a name-version coordinate.
    async fn get_next_release(&self, build: &NvrRequest) -> Result<String, CapabilityError>;

    /// Looks up an existing build, returning `None` when absent.
    async fn get_build(&self, nvr: &NvrRequest)
        -> Result<Option<BuildRecord>, CapabilityError>;

    /// Reserves a build for later content-generator import.
    async fn cg_init_build(
        &self,
        agent: &str,
        nvr: &NvrRequest,
    ) -> Result<ReservationReply, CapabilityError>;

    /// Refunds an unused build reservation.
    async fn cg_refund_build(
        &self,
        agent: &str,
        build_id: u64,
        token: &str,
    ) -> Result<(), CapabilityError>;

    /// Triggers a filesystem image build task, returning the task id.
    async fn build_image_oz(
        &self,
        name: &str,
        arches: &[String],
        target: Option<&str>,
    ) -> Result<u64, CapabilityError>;

    /// Returns a snapshot of a task.
    async fn get_task_info(&self, task_id: u64) -> Result<TaskInfo, CapabilityError>;

    /// Returns the result payload of a finished task.
    async fn get_task_result(&self, task_id: u64) -> Result<serde_json::Value, CapabilityError>;

    /// Downloads one output file of a finished task into a directory,
    /// returning the downloaded path.
    async fn download_task_output(
        &self,
        task_id: u64,
        file_name: &str,
        dest_dir: &Path,
    ) -> Result<PathBuf, CapabilityError>;

    /// Cancels a running task.
    async fn cancel_task(&self, task_id: u64) -> Result<(), CapabilityError>;
}
