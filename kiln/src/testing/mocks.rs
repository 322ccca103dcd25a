//! Mock plugins and capability clients for testing.

use crate::artifacts::ContentManifest;
use crate::capabilities::{
    BuildRecord, CachitoClient, ContainerTasker, KojiClient, NvrRequest, ReservationReply,
    TaskInfo, TaskState,
};
use crate::capabilities::Capabilities;
use crate::core::BuildResult;
use crate::errors::{BuildError, CapabilityError};
use crate::plugin::{BuildstepPlugin, Plugin};
use crate::workflow::WorkflowState;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A shared execution log for asserting plugin ordering.
pub type ExecutionLog = Arc<Mutex<Vec<String>>>;

#[derive(Debug, Clone)]
enum MockBehavior {
    Succeed(serde_json::Value),
    Fail(String),
    Cancel(String),
}

/// A mock plugin that records calls and returns a configurable outcome.
#[derive(Debug)]
pub struct MockPlugin {
    key: String,
    allowed_to_fail: bool,
    behavior: MockBehavior,
    log: Option<ExecutionLog>,
    call_count: Mutex<usize>,
}

impl MockPlugin {
    /// Creates a mock plugin that succeeds with a null result.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            allowed_to_fail: false,
            behavior: MockBehavior::Succeed(serde_json::Value::Null),
            log: None,
            call_count: Mutex::new(0),
        }
    }

    /// Creates a fresh shared execution log.
    #[must_use]
    pub fn shared_log() -> ExecutionLog {
        Arc::new(Mutex::new(Vec::new()))
    }

    /// Marks the plugin as allowed to fail.
    #[must_use]
    pub fn allowed_to_fail(mut self) -> Self {
        self.allowed_to_fail = true;
        self
    }

    /// Makes the plugin succeed with the given value.
    #[must_use]
    pub fn returning(mut self, value: serde_json::Value) -> Self {
        self.behavior = MockBehavior::Succeed(value);
        self
    }

    /// Makes the plugin fail with an external-service error.
    #[must_use]
    pub fn failing_with(mut self, message: impl Into<String>) -> Self {
        self.behavior = MockBehavior::Fail(message.into());
        self
    }

    /// Makes the plugin fail with a cancellation.
    #[must_use]
    pub fn canceling_with(mut self, reason: impl Into<String>) -> Self {
        self.behavior = MockBehavior::Cancel(reason.into());
        self
    }

    /// Attaches a shared execution log.
    #[must_use]
    pub fn with_log(mut self, log: ExecutionLog) -> Self {
        self.log = Some(log);
        self
    }

    /// Returns the number of times the plugin ran.
    #[must_use]
    pub fn call_count(&self) -> usize {
        *self.call_count.lock()
    }
}

#[async_trait]
impl Plugin for MockPlugin {
    fn key(&self) -> &str {
        &self.key
    }

    fn is_allowed_to_fail(&self) -> bool {
        self.allowed_to_fail
    }

    async fn run(
        &self,
        _state: &WorkflowState,
        _caps: &Capabilities,
    ) -> Result<serde_json::Value, BuildError> {
        *self.call_count.lock() += 1;
        if let Some(log) = &self.log {
            log.lock().push(self.key.clone());
        }
        match &self.behavior {
            MockBehavior::Succeed(value) => Ok(value.clone()),
            MockBehavior::Fail(message) => {
                Err(CapabilityError::service("mock", "run", message.clone()).into())
            }
            MockBehavior::Cancel(reason) => Err(BuildError::canceled(reason.clone())),
        }
    }
}

/// A mock build-step plugin with a configurable build result.
#[derive(Debug)]
pub struct MockBuildstepPlugin {
    key: String,
    behavior: MockBehavior,
    result: BuildResult,
    log: Option<ExecutionLog>,
}

impl MockBuildstepPlugin {
    /// Creates a mock that succeeds with a generic image id.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            result: BuildResult::success(format!("sha256:mock-{key}")),
            key,
            behavior: MockBehavior::Succeed(serde_json::Value::Null),
            log: None,
        }
    }

    /// Sets the build result returned on success.
    #[must_use]
    pub fn with_result(mut self, result: BuildResult) -> Self {
        self.result = result;
        self
    }

    /// Makes the plugin fail with an external-service error.
    #[must_use]
    pub fn failing_with(mut self, message: impl Into<String>) -> Self {
        self.behavior = MockBehavior::Fail(message.into());
        self
    }

    /// Makes the plugin fail with a cancellation.
    #[must_use]
    pub fn canceling_with(mut self, reason: impl Into<String>) -> Self {
        self.behavior = MockBehavior::Cancel(reason.into());
        self
    }

    /// Attaches a shared execution log.
    #[must_use]
    pub fn with_log(mut self, log: ExecutionLog) -> Self {
        self.log = Some(log);
        self
    }
}

#[async_trait]
impl BuildstepPlugin for MockBuildstepPlugin {
    fn key(&self) -> &str {
        &self.key
    }

    async fn build(
        &self,
        _state: &WorkflowState,
        _caps: &Capabilities,
    ) -> Result<BuildResult, BuildError> {
        if let Some(log) = &self.log {
            log.lock().push(self.key.clone());
        }
        match &self.behavior {
            MockBehavior::Succeed(_) => Ok(self.result.clone()),
            MockBehavior::Fail(message) => {
                Err(CapabilityError::service("mock", "build", message.clone()).into())
            }
            MockBehavior::Cancel(reason) => Err(BuildError::canceled(reason.clone())),
        }
    }
}

/// A scripted container tasker.
#[derive(Debug, Default)]
pub struct MockTasker {
    /// Output lines returned by `container_logs`.
    pub logs: Mutex<Vec<String>>,
    /// Archive bytes returned by `get_archive`.
    pub archive: Mutex<Vec<u8>>,
    /// When set, `get_archive` fails with this message.
    pub fail_get_archive: Mutex<Option<String>>,
    /// When set, `container_logs` fails with this message.
    pub fail_logs: Mutex<Option<String>>,
    created: Mutex<Vec<(String, Vec<String>)>>,
    started: Mutex<Vec<String>>,
    cleaned: Mutex<Vec<String>>,
    next_id: Mutex<usize>,
}

impl MockTasker {
    /// Creates a tasker returning the given log lines.
    #[must_use]
    pub fn with_logs(lines: Vec<String>) -> Self {
        Self {
            logs: Mutex::new(lines),
            ..Self::default()
        }
    }

    /// Returns the images and commands containers were created from.
    #[must_use]
    pub fn created(&self) -> Vec<(String, Vec<String>)> {
        self.created.lock().clone()
    }

    /// Returns the ids of cleaned-up containers.
    #[must_use]
    pub fn cleaned(&self) -> Vec<String> {
        self.cleaned.lock().clone()
    }
}

#[async_trait]
impl ContainerTasker for MockTasker {
    async fn create_container(
        &self,
        image: &str,
        command: &[String],
    ) -> Result<String, CapabilityError> {
        let mut next_id = self.next_id.lock();
        *next_id += 1;
        let id = format!("container-{next_id}", next_id = *next_id);
        self.created.lock().push((image.to_string(), command.to_vec()));
        Ok(id)
    }

    async fn start_container(&self, container_id: &str) -> Result<(), CapabilityError> {
        self.started.lock().push(container_id.to_string());
        Ok(())
    }

    async fn stop_container(&self, _container_id: &str) -> Result<(), CapabilityError> {
        Ok(())
    }

    async fn container_logs(&self, _container_id: &str) -> Result<Vec<String>, CapabilityError> {
        if let Some(message) = self.fail_logs.lock().clone() {
            return Err(CapabilityError::service("tasker", "container_logs", message));
        }
        Ok(self.logs.lock().clone())
    }

    async fn get_archive(
        &self,
        _container_id: &str,
        _path: &str,
    ) -> Result<Vec<u8>, CapabilityError> {
        if let Some(message) = self.fail_get_archive.lock().clone() {
            return Err(CapabilityError::service("tasker", "get_archive", message));
        }
        Ok(self.archive.lock().clone())
    }

    async fn cleanup_containers(&self, container_ids: &[String]) -> Result<(), CapabilityError> {
        self.cleaned.lock().extend(container_ids.iter().cloned());
        Ok(())
    }
}

/// A scripted Koji client.
#[derive(Debug)]
pub struct MockKojiClient {
    /// Release returned by `get_next_release`.
    pub next_release: Mutex<String>,
    /// NVRs that already exist as builds.
    pub existing_builds: Mutex<HashSet<String>>,
    /// Number of `cg_init_build` calls that fail before one succeeds.
    pub cg_init_failures: Mutex<usize>,
    /// Task id handed out by `build_image_oz`.
    pub oz_task_id: u64,
    /// Task states returned by successive `get_task_info` calls; when the
    /// script runs out, the task reports closed.
    pub task_states: Mutex<VecDeque<TaskState>>,
    /// Result payload of a finished task.
    pub task_result: Mutex<serde_json::Value>,
    /// When set, `cancel_task` fails with this message.
    pub fail_cancel: Mutex<Option<String>>,
    reservations: Mutex<u64>,
    refunds: Mutex<Vec<(u64, String)>>,
    canceled_tasks: Mutex<Vec<u64>>,
    calls: Mutex<Vec<String>>,
}

impl Default for MockKojiClient {
    fn default() -> Self {
        Self {
            next_release: Mutex::new("1".to_string()),
            existing_builds: Mutex::new(HashSet::new()),
            cg_init_failures: Mutex::new(0),
            oz_task_id: 7788,
            task_states: Mutex::new(VecDeque::new()),
            task_result: Mutex::new(serde_json::json!({})),
            fail_cancel: Mutex::new(None),
            reservations: Mutex::new(0),
            refunds: Mutex::new(Vec::new()),
            canceled_tasks: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl MockKojiClient {
    /// Creates a client with default scripting.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the recorded call names, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Returns refunded (build_id, token) pairs.
    #[must_use]
    pub fn refunds(&self) -> Vec<(u64, String)> {
        self.refunds.lock().clone()
    }

    /// Returns ids of canceled tasks.
    #[must_use]
    pub fn canceled_tasks(&self) -> Vec<u64> {
        self.canceled_tasks.lock().clone()
    }

    /// Returns how many reservations were handed out.
    #[must_use]
    pub fn reservation_count(&self) -> u64 {
        *self.reservations.lock()
    }

    fn record(&self, call: &str) {
        self.calls.lock().push(call.to_string());
    }

    fn nvr_string(nvr: &NvrRequest) -> String {
        format!(
            "{}-{}-{}",
            nvr.name,
            nvr.version,
            nvr.release.as_deref().unwrap_or("")
        )
    }
}

#[async_trait]
impl KojiClient for MockKojiClient {
    async fn get_next_release(&self, _build: &NvrRequest) -> Result<String, CapabilityError> {
        self.record("getNextRelease");
        Ok(self.next_release.lock().clone())
    }

    async fn get_build(
        &self,
        nvr: &NvrRequest,
    ) -> Result<Option<BuildRecord>, CapabilityError> {
        self.record("getBuild");
        let key = Self::nvr_string(nvr);
        if self.existing_builds.lock().contains(&key) {
            return Ok(Some(BuildRecord { id: 1, nvr: key }));
        }
        Ok(None)
    }

    async fn cg_init_build(
        &self,
        _agent: &str,
        _nvr: &NvrRequest,
    ) -> Result<ReservationReply, CapabilityError> {
        self.record("CGInitBuild");
        let mut failures = self.cg_init_failures.lock();
        if *failures > 0 {
            *failures -= 1;
            return Err(CapabilityError::service(
                "koji",
                "CGInitBuild",
                "reservation temporarily unavailable",
            ));
        }
        let mut reservations = self.reservations.lock();
        *reservations += 1;
        Ok(ReservationReply {
            build_id: 1000 + *reservations,
            token: format!("token-{reservations}", reservations = *reservations),
        })
    }

    async fn cg_refund_build(
        &self,
        _agent: &str,
        build_id: u64,
        token: &str,
    ) -> Result<(), CapabilityError> {
        self.record("CGRefundBuild");
        self.refunds.lock().push((build_id, token.to_string()));
        Ok(())
    }

    async fn build_image_oz(
        &self,
        _name: &str,
        _arches: &[String],
        _target: Option<&str>,
    ) -> Result<u64, CapabilityError> {
        self.record("buildImageOz");
        Ok(self.oz_task_id)
    }

    async fn get_task_info(&self, task_id: u64) -> Result<TaskInfo, CapabilityError> {
        self.record("getTaskInfo");
        let state = self
            .task_states
            .lock()
            .pop_front()
            .unwrap_or(TaskState::Closed);
        Ok(TaskInfo { id: task_id, state })
    }

    async fn get_task_result(
        &self,
        _task_id: u64,
    ) -> Result<serde_json::Value, CapabilityError> {
        self.record("getTaskResult");
        Ok(self.task_result.lock().clone())
    }

    async fn download_task_output(
        &self,
        task_id: u64,
        file_name: &str,
        dest_dir: &Path,
    ) -> Result<PathBuf, CapabilityError> {
        self.record("downloadTaskOutput");
        let path = dest_dir.join(file_name);
        std::fs::write(&path, format!("output of task {task_id}"))?;
        Ok(path)
    }

    async fn cancel_task(&self, task_id: u64) -> Result<(), CapabilityError> {
        self.record("cancelTask");
        if let Some(message) = self.fail_cancel.lock().clone() {
            return Err(CapabilityError::service("koji", "cancelTask", message));
        }
        self.canceled_tasks.lock().push(task_id);
        Ok(())
    }
}

/// A scripted Cachito client.
#[derive(Debug)]
pub struct MockCachitoClient {
    /// The manifest returned by `get_image_content_manifest`.
    pub manifest: Mutex<ContentManifest>,
    requested: Mutex<Vec<Vec<u64>>>,
}

impl Default for MockCachitoClient {
    fn default() -> Self {
        Self {
            manifest: Mutex::new(ContentManifest::minimal()),
            requested: Mutex::new(Vec::new()),
        }
    }
}

impl MockCachitoClient {
    /// Creates a client returning the minimal manifest.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a client returning the given manifest.
    #[must_use]
    pub fn with_manifest(manifest: ContentManifest) -> Self {
        Self {
            manifest: Mutex::new(manifest),
            requested: Mutex::new(Vec::new()),
        }
    }

    /// Returns the request-id batches that were queried.
    #[must_use]
    pub fn requested(&self) -> Vec<Vec<u64>> {
        self.requested.lock().clone()
    }
}

#[async_trait]
impl CachitoClient for MockCachitoClient {
    async fn get_image_content_manifest(
        &self,
        request_ids: &[u64],
    ) -> Result<ContentManifest, CapabilityError> {
        self.requested.lock().push(request_ids.to_vec());
        Ok(self.manifest.lock().clone())
    }
}
