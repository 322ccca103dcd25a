//! Build metadata storage.

use crate::capabilities::Capabilities;
use crate::core::BuildPhase;
use crate::errors::BuildError;
use crate::plugin::Plugin;
use crate::utils::checksum::checksums_of_file;
use crate::workflow::WorkflowState;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct Args {
    file_name: String,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            file_name: "metadata.json".to_string(),
        }
    }
}

/// Exit-phase plugin snapshotting the workflow into a JSON document in the
/// build directory.
///
/// Runs on every exit path; the snapshot records the outcome, per-phase
/// results, plugin failures and artifact digests, so it is useful for
/// failed builds too. Failures of this plugin never change the build
/// outcome.
#[derive(Debug)]
pub struct StoreMetadata {
    file_name: String,
}

impl StoreMetadata {
    /// The plugin key.
    pub const KEY: &'static str = "store_metadata";

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
            file_name: args.file_name,
        })
    }
}

#[async_trait]
impl Plugin for StoreMetadata {
    fn key(&self) -> &str {
        Self::KEY
    }

    fn is_allowed_to_fail(&self) -> bool {
        true
    }

    async fn run(
        &self,
        state: &WorkflowState,
        _caps: &Capabilities,
    ) -> Result<serde_json::Value, BuildError> {
        let params = state.user_params();
        let failure = state.failure();

        let buildstep = state.buildstep_result().map(|(plugin, result)| {
            let failed = result.is_failed();
            serde_json::json!({
                "plugin": plugin,
                "image_id": result.image_id,
                "failed": failed,
            })
        });

        let artifact = state
            .build_result()
            .and_then(|result| result.oci_image_path)
            .filter(|path| path.exists())
            .map(|path| -> Result<serde_json::Value, BuildError> {
                let checksums = checksums_of_file(&path)?;
                Ok(serde_json::json!({
                    "path": path,
                    "md5": checksums.md5,
                    "sha256": checksums.sha256,
                    "size": checksums.size,
                }))
            })
            .transpose()?;

        let document = serde_json::json!({
            "run_id": state.run_id(),
            "component": params.component,
            "version": params.version,
            "release": state.release(),
            "platform": params.platform,
            "scratch": params.scratch,
            "success": failure.is_none(),
            "canceled": failure.as_ref().is_some_and(|f| f.canceled),
            "failure": failure,
            "results": {
                "prebuild": state.phase_results(BuildPhase::Prebuild),
                "postbuild": state.phase_results(BuildPhase::Postbuild),
                "exit": state.phase_results(BuildPhase::Exit),
            },
            "buildstep": buildstep,
            "plugin_errors": state.plugin_errors(),
            "image_component_count": state.image_components().map(|c| c.len()),
            "artifact": artifact,
            "created_at": chrono::Utc::now().to_rfc3339(),
        });

        let out_path = state.build_dir().join(&self.file_name);
        std::fs::write(&out_path, serde_json::to_string_pretty(&document)?)?;
        info!(path = %out_path.display(), "build metadata stored");

        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{BuildResult, ImageComponent};
    use crate::testing::test_state_in;
    use crate::workflow::BuildFailure;

    fn plugin() -> StoreMetadata {
        StoreMetadata::from_args(&serde_json::Value::Null).unwrap()
    }

    #[tokio::test]
    async fn test_snapshot_of_successful_build() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state_in(dir.path());

        let artifact = dir.path().join("image.tar");
        std::fs::write(&artifact, b"layers").unwrap();

        state.set_release("3").unwrap();
        state
            .set_buildstep_result(
                "builder",
                BuildResult::success("sha256:img").with_oci_image_path(&artifact),
            )
            .unwrap();
        state
            .set_image_components(vec![ImageComponent::rpm("bash", "5.1", "1", "x86_64")])
            .unwrap();
        state
            .record_phase_result(BuildPhase::Prebuild, "bump_release", serde_json::json!({"release": "3"}))
            .unwrap();

        let document = plugin().run(&state, &Capabilities::new()).await.unwrap();

        assert_eq!(document["success"], true);
        assert_eq!(document["canceled"], false);
        assert_eq!(document["release"], "3");
        assert_eq!(document["buildstep"]["plugin"], "builder");
        assert_eq!(document["image_component_count"], 1);
        assert_eq!(document["results"]["prebuild"]["bump_release"]["release"], "3");
        assert_eq!(document["artifact"]["size"], 6);

        let written = dir.path().join("metadata.json");
        assert!(written.exists());
        let parsed: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(written).unwrap()).unwrap();
        assert_eq!(parsed["success"], true);
    }

    #[tokio::test]
    async fn test_snapshot_of_failed_build() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state_in(dir.path());
        state.record_plugin_error("prep", "koji down");
        state.mark_failed(BuildFailure {
            phase: BuildPhase::Prebuild,
            plugin: "prep".to_string(),
            reason: "koji down".to_string(),
            canceled: false,
        });

        let document = plugin().run(&state, &Capabilities::new()).await.unwrap();

        assert_eq!(document["success"], false);
        assert_eq!(document["failure"]["plugin"], "prep");
        assert_eq!(document["plugin_errors"]["prep"], "koji down");
        assert!(document["buildstep"].is_null());
        assert!(document["image_component_count"].is_null());
    }

    #[tokio::test]
    async fn test_custom_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state_in(dir.path());

        StoreMetadata::from_args(&serde_json::json!({"file_name": "build-metadata.json"}))
            .unwrap()
            .run(&state, &Capabilities::new())
            .await
            .unwrap();

        assert!(dir.path().join("build-metadata.json").exists());
    }

    #[test]
    fn test_is_allowed_to_fail() {
        assert!(plugin().is_allowed_to_fail());
    }
}
