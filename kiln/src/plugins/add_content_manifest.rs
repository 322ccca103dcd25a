//! Content manifest generation.

use crate::artifacts::ContentManifest;
use crate::capabilities::Capabilities;
use crate::errors::BuildError;
use crate::plugin::Plugin;
use crate::workflow::WorkflowState;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, info};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct Args {
    /// Content sets per platform.
    content_sets: HashMap<String, Vec<String>>,
}

/// Writes the image content manifest JSON into the build directory for the
/// current platform, named `{component}-{version}-{release}.json`.
///
/// Remote sources, when present in the user params, contribute their
/// Cachito-aggregated contents; otherwise the manifest starts from the
/// minimal skeleton.
#[derive(Debug)]
pub struct AddContentManifest {
    content_sets: HashMap<String, Vec<String>>,
}

impl AddContentManifest {
    /// The plugin key.
    pub const KEY: &'static str = "add_content_manifest";

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
            content_sets: args.content_sets,
        })
    }

    async fn base_manifest(
        &self,
        state: &WorkflowState,
        caps: &Capabilities,
    ) -> Result<ContentManifest, BuildError> {
        let remote_sources = &state.user_params().remote_sources;
        if remote_sources.is_empty() {
            return Ok(ContentManifest::minimal());
        }

        let request_ids: Vec<u64> = remote_sources.iter().map(|s| s.request_id).collect();
        debug!(?request_ids, "fetching content manifest for remote sources");
        let manifest = caps
            .cachito()?
            .get_image_content_manifest(&request_ids)
            .await?;
        manifest.validate()?;
        Ok(manifest)
    }
}

#[async_trait]
impl Plugin for AddContentManifest {
    fn key(&self) -> &str {
        Self::KEY
    }

    async fn run(
        &self,
        state: &WorkflowState,
        caps: &Capabilities,
    ) -> Result<serde_json::Value, BuildError> {
        let params = state.user_params();
        let release = state.release().ok_or_else(|| {
            BuildError::configuration("release is not resolved; run bump_release first")
        })?;

        let platform_sets = self
            .content_sets
            .get(&params.platform)
            .cloned()
            .unwrap_or_default();

        let manifest = self
            .base_manifest(state, caps)
            .await?
            .with_layer_index(state.dockerfile_images().content_layer_index())
            .with_content_sets(platform_sets);

        let file_name = ContentManifest::file_name(&params.component, &params.version, &release);
        let out_path = manifest.write_to(state.build_dir().path(), &file_name)?;
        info!(path = %out_path.display(), "content manifest written");

        Ok(serde_json::to_value(&manifest)?)
    }
}
