//! Build-step result type.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The result produced by a build-step plugin.
///
/// Exactly one build-step plugin is expected to produce the winning result
/// for a build; the executor stores it on the workflow once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildResult {
    /// The identifier of the built image, when the build succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
    /// Build log lines captured from the build backend.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub logs: Vec<String>,
    /// The failure reason, when the build failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail_reason: Option<String>,
    /// Path to an exported image archive, when one was produced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oci_image_path: Option<PathBuf>,
    /// Whether the layer squash step should be skipped for this result.
    #[serde(default)]
    pub skip_layer_squash: bool,
}

impl BuildResult {
    /// Creates a successful build result.
    #[must_use]
    pub fn success(image_id: impl Into<String>) -> Self {
        Self {
            image_id: Some(image_id.into()),
            logs: Vec::new(),
            fail_reason: None,
            oci_image_path: None,
            skip_layer_squash: false,
        }
    }

    /// Creates a failed build result.
    #[must_use]
    pub fn failure(fail_reason: impl Into<String>) -> Self {
        Self {
            image_id: None,
            logs: Vec::new(),
            fail_reason: Some(fail_reason.into()),
            oci_image_path: None,
            skip_layer_squash: false,
        }
    }

    /// Attaches build logs.
    #[must_use]
    pub fn with_logs(mut self, logs: Vec<String>) -> Self {
        self.logs = logs;
        self
    }

    /// Sets the exported image archive path.
    #[must_use]
    pub fn with_oci_image_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.oci_image_path = Some(path.into());
        self
    }

    /// Marks the result as not needing layer squashing.
    #[must_use]
    pub fn skipping_layer_squash(mut self) -> Self {
        self.skip_layer_squash = true;
        self
    }

    /// Returns true if the build failed.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.fail_reason.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_result() {
        let result = BuildResult::success("sha256:abcd");
        assert!(!result.is_failed());
        assert_eq!(result.image_id.as_deref(), Some("sha256:abcd"));
    }

    #[test]
    fn test_failure_result() {
        let result = BuildResult::failure("base image pull failed");
        assert!(result.is_failed());
        assert!(result.image_id.is_none());
    }

    #[test]
    fn test_builder_chain() {
        let result = BuildResult::success("sha256:abcd")
            .with_logs(vec!["step 1".to_string(), "step 2".to_string()])
            .with_oci_image_path("/build/image.tar")
            .skipping_layer_squash();
        assert_eq!(result.logs.len(), 2);
        assert!(result.skip_layer_squash);
        assert_eq!(result.oci_image_path, Some(PathBuf::from("/build/image.tar")));
    }

    #[test]
    fn test_round_trip() {
        let result = BuildResult::success("sha256:abcd").with_logs(vec!["ok".to_string()]);
        let json = serde_json::to_string(&result).unwrap();
        let back: BuildResult = serde_json::from_str(&json).unwrap();
        assert_eq!(result, back);
    }
}
