//! RPM package enumeration of the built image.

use crate::capabilities::{Capabilities, ContainerTasker};
use crate::errors::BuildError;
use crate::plugin::Plugin;
use crate::utils::rpm::{parse_rpm_output, rpm_query_command, RPM_OUTPUT_SEP};
use crate::workflow::WorkflowState;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct Args {
    ignore_autogenerated_gpg_keys: bool,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            ignore_autogenerated_gpg_keys: true,
        }
    }
}

/// Lists the rpm packages installed in the built image and records them as
/// the workflow's image components.
///
/// Skips itself when another plugin already filled the component list.
/// Containers created for the query are always cleaned up, also on
/// failure.
#[derive(Debug)]
pub struct RpmManifest {
    ignore_autogenerated_gpg_keys: bool,
}

impl RpmManifest {
    /// The plugin key.
    pub const KEY: &'static str = "rpm_manifest";

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
            ignore_autogenerated_gpg_keys: args.ignore_autogenerated_gpg_keys,
        })
    }

    async fn gather_output(
        &self,
        tasker: &Arc<dyn ContainerTasker>,
        container_id: &str,
    ) -> Result<Vec<String>, BuildError> {
        tasker.start_container(container_id).await?;
        let lines = tasker.container_logs(container_id).await?;
        Ok(lines
            .into_iter()
            .filter(|line| !line.trim().is_empty())
            .collect())
    }
}

#[async_trait]
impl Plugin for RpmManifest {
    fn key(&self) -> &str {
        Self::KEY
    }

    async fn run(
        &self,
        state: &WorkflowState,
        caps: &Capabilities,
    ) -> Result<serde_json::Value, BuildError> {
        // Another component may have already filled in the component list
        if state.image_components().is_some() {
            debug!("image components already set, skipping");
            return Ok(serde_json::Value::Null);
        }

        let build_result = state.build_result().ok_or_else(|| {
            BuildError::configuration("rpm_manifest requires a completed build step")
        })?;
        let image_id = build_result.image_id.ok_or_else(|| {
            BuildError::configuration("build result has no image id")
        })?;

        let tasker = caps.tasker()?.clone();
        let command = rpm_query_command(None);
        let container_id = tasker.create_container(&image_id, &command).await?;
        let containers = vec![container_id.clone()];

        let output = self.gather_output(&tasker, &container_id).await;

        if let Err(err) = tasker.cleanup_containers(&containers).await {
            warn!(error = %err, "failed to clean up query containers");
        }

        let mut lines = output?;

        if lines.is_empty() && state.dockerfile_images().base_from_scratch() {
            debug!("empty rpmdb in a from-scratch image, nothing to record");
            return Ok(serde_json::Value::Null);
        }

        // gpg-pubkey packages are autogenerated by rpm on key import and
        // are never signed themselves
        if self.ignore_autogenerated_gpg_keys {
            debug!("ignoring gpg-pubkey packages");
            let prefix = format!("gpg-pubkey{RPM_OUTPUT_SEP}");
            lines.retain(|line| !line.starts_with(&prefix));
        }

        let components = parse_rpm_output(&lines)?;
        info!(count = components.len(), "image components recorded");
        state.set_image_components(components)?;

        Ok(serde_json::json!(lines))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{BuildResult, ImageComponent};
    use crate::testing::{test_state, MockTasker};
    use crate::workflow::{BuildDir, DockerfileImages, Source, UserParams, WorkflowState};

    fn plugin() -> RpmManifest {
        RpmManifest::from_args(&serde_json::Value::Null).unwrap()
    }

    fn caps_with(tasker: Arc<MockTasker>) -> Capabilities {
        Capabilities::new().with_tasker(tasker)
    }

    #[tokio::test]
    async fn test_records_components_and_cleans_up() {
        let tasker = Arc::new(MockTasker::with_logs(vec![
            "bash;5.1.8;4.el9;x86_64;(none);abc;(none)".to_string(),
            "gpg-pubkey;deadbeef;1;(none);(none);(none);(none)".to_string(),
        ]));

        let state = test_state();
        state
            .set_buildstep_result("builder", BuildResult::success("sha256:img"))
            .unwrap();

        let result = plugin()
            .run(&state, &caps_with(tasker.clone()))
            .await
            .unwrap();

        let components = state.image_components().unwrap();
        assert_eq!(components.len(), 1);
        assert_eq!(components[0].name, "bash");

        // gpg-pubkey filtered out of the recorded output too
        assert_eq!(result.as_array().unwrap().len(), 1);

        assert_eq!(tasker.cleaned(), vec!["container-1"]);
        let (image, command) = &tasker.created()[0];
        assert_eq!(image, "sha256:img");
        assert_eq!(command[0], "rpm");
    }

    #[tokio::test]
    async fn test_skips_when_components_already_set() {
        let tasker = Arc::new(MockTasker::default());
        let state = test_state();
        state
            .set_image_components(vec![ImageComponent::rpm("bash", "5.1", "1", "x86_64")])
            .unwrap();

        let result = plugin()
            .run(&state, &caps_with(tasker.clone()))
            .await
            .unwrap();

        assert!(result.is_null());
        assert!(tasker.created().is_empty());
    }

    #[tokio::test]
    async fn test_cleans_up_on_query_failure() {
        let tasker = Arc::new(MockTasker::default());
        *tasker.fail_logs.lock() = Some("daemon went away".to_string());

        let state = test_state();
        state
            .set_buildstep_result("builder", BuildResult::success("sha256:img"))
            .unwrap();

        let err = plugin()
            .run(&state, &caps_with(tasker.clone()))
            .await
            .unwrap_err();

        assert!(matches!(err, BuildError::External(_)));
        assert_eq!(tasker.cleaned(), vec!["container-1"]);
    }

    #[tokio::test]
    async fn test_empty_rpmdb_from_scratch_is_fine() {
        let tasker = Arc::new(MockTasker::default());
        let state = WorkflowState::new(
            UserParams::new("x86_64", "app", "1.0"),
            DockerfileImages::new(vec!["scratch".to_string()]),
            BuildDir::new("/tmp/build"),
            Source::dummy("/tmp/build"),
        );
        state
            .set_buildstep_result("builder", BuildResult::success("sha256:img"))
            .unwrap();

        let result = plugin().run(&state, &caps_with(tasker)).await.unwrap();
        assert!(result.is_null());
        assert!(state.image_components().is_none());
    }

    #[tokio::test]
    async fn test_requires_build_result() {
        let tasker = Arc::new(MockTasker::default());
        let state = test_state();

        let err = plugin().run(&state, &caps_with(tasker)).await.unwrap_err();
        assert!(matches!(err, BuildError::Configuration(_)));
    }
}
