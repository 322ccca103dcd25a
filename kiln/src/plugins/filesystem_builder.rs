//! Filesystem image build through a remote Koji task.

use crate::capabilities::{Capabilities, TaskState};
use crate::core::BuildResult;
use crate::errors::BuildError;
use crate::plugin::BuildstepPlugin;
use crate::workflow::WorkflowState;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct Args {
    from_task_output: String,
    poll_interval_ms: u64,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            from_task_output: "filesystem.tar.gz".to_string(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

/// Builds the base filesystem image by triggering a remote image-build
/// task and polling it to completion.
///
/// While polling, the plugin observes the workflow's cancellation flag; on
/// cancellation it makes a best-effort attempt to cancel the remote task
/// and then fails with a cancellation error. A failed remote cancel is
/// logged and does not mask the cancellation outcome.
#[derive(Debug)]
pub struct FilesystemBuilder {
    from_task_output: String,
    poll_interval: Duration,
}

impl FilesystemBuilder {
    /// The plugin key.
    pub const KEY: &'static str = "filesystem_builder";

    /// Creates the plugin from its JSON arguments.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for unknown or ill-typed arguments.
    pub fn from_args(args: &serde_json::Value) -> Result<Self, BuildError> {
        let args: Args = if args.is_null() {
            Args::default()
        } else {
            serde_json::from_value(args.clone()).map_err(|err| {
                BuildError::configuration(format!("bad arguments for {}: {err}", Self::KEY))
            })?
        };
        Ok(Self {
            from_task_output: args.from_task_output,
            poll_interval: Duration::from_millis(args.poll_interval_ms),
        })
    }

    async fn watch_task(
        &self,
        state: &WorkflowState,
        caps: &Capabilities,
        task_id: u64,
    ) -> Result<(), BuildError> {
        let koji = caps.koji()?;

        loop {
            if state.is_cancel_requested() {
                warn!(task_id, "build was canceled, canceling task");
                match koji.cancel_task(task_id).await {
                    Ok(()) => info!(task_id, "task canceled"),
                    Err(err) => {
                        warn!(task_id, error = %err, "exception while canceling a task (ignored)");
                    }
                }
                let reason = state
                    .cancel_reason()
                    .unwrap_or_else(|| "build canceled".to_string());
                return Err(BuildError::canceled(reason));
            }

            let info = koji.get_task_info(task_id).await?;
            debug!(task_id, state = ?info.state, "task state");
            match info.state {
                TaskState::Closed => return Ok(()),
                TaskState::Canceled => {
                    return Err(BuildError::canceled(format!(
                        "task {task_id} was canceled remotely"
                    )));
                }
                TaskState::Failed => {
                    return Err(BuildError::invalid_data(format!(
                        "image build task {task_id} failed"
                    )));
                }
                TaskState::Free | TaskState::Open => {
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }
}

#[async_trait]
impl BuildstepPlugin for FilesystemBuilder {
    fn key(&self) -> &str {
        Self::KEY
    }

    async fn build(
        &self,
        state: &WorkflowState,
        caps: &Capabilities,
    ) -> Result<BuildResult, BuildError> {
        let koji = caps.koji()?.clone();
        let params = state.user_params();

        let task_id = koji
            .build_image_oz(
                &params.component,
                &[params.platform.clone()],
                params.koji_target.as_deref(),
            )
            .await?;
        info!(task_id, "filesystem image build task created");

        self.watch_task(state, caps, task_id).await?;

        let task_result = koji.get_task_result(task_id).await?;
        let output = koji
            .download_task_output(task_id, &self.from_task_output, state.build_dir().path())
            .await?;
        info!(path = %output.display(), "task output downloaded");

        let image_id = task_result
            .get("image_id")
            .and_then(serde_json::Value::as_str)
            .map_or_else(|| format!("koji-task-{task_id}"), str::to_string);

        Ok(BuildResult::success(image_id)
            .with_oci_image_path(output)
            .skipping_layer_squash())
    }
}
