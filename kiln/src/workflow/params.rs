//! Build-invocation parameters.

use serde::{Deserialize, Serialize};

/// A remote source archive fetched for the build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSource {
    /// Name of the remote source.
    pub name: String,
    /// URL from which the source archive is downloaded.
    pub url: String,
    /// The Cachito request id backing this source; used to request the
    /// image content manifest.
    pub request_id: u64,
}

/// Immutable parameters of one build invocation.
///
/// Set once at workflow construction; plugins only read them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserParams {
    /// Target platform (e.g. `x86_64`).
    pub platform: String,
    /// Whether this is a scratch build (no release reservation, no import).
    #[serde(default)]
    pub scratch: bool,
    /// The tag the built image will be pushed under.
    pub image_tag: String,
    /// Component name of the image being built.
    pub component: String,
    /// Version label of the image being built.
    pub version: String,
    /// Explicit release label, when one was supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release: Option<String>,
    /// Remote sources to include in the content manifest.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remote_sources: Vec<RemoteSource>,
    /// Koji build target, when building through Koji.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub koji_target: Option<String>,
}

impl UserParams {
    /// Creates parameters for a named component build.
    #[must_use]
    pub fn new(
        platform: impl Into<String>,
        component: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            platform: platform.into(),
            component: component.into(),
            version: version.into(),
            ..Self::default()
        }
    }

    /// Sets the image tag.
    #[must_use]
    pub fn with_image_tag(mut self, tag: impl Into<String>) -> Self {
        self.image_tag = tag.into();
        self
    }

    /// Marks the build as a scratch build.
    #[must_use]
    pub fn scratch(mut self) -> Self {
        self.scratch = true;
        self
    }

    /// Sets an explicit release label.
    #[must_use]
    pub fn with_release(mut self, release: impl Into<String>) -> Self {
        self.release = Some(release.into());
        self
    }

    /// Adds a remote source.
    #[must_use]
    pub fn with_remote_source(mut self, source: RemoteSource) -> Self {
        self.remote_sources.push(source);
        self
    }

    /// Sets the Koji build target.
    #[must_use]
    pub fn with_koji_target(mut self, target: impl Into<String>) -> Self {
        self.koji_target = Some(target.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_builder() {
        let params = UserParams::new("x86_64", "httpd", "2.4")
            .with_image_tag("registry.example.com/httpd:2.4")
            .with_release("3")
            .scratch();

        assert_eq!(params.platform, "x86_64");
        assert_eq!(params.component, "httpd");
        assert_eq!(params.release.as_deref(), Some("3"));
        assert!(params.scratch);
    }

    #[test]
    fn test_params_round_trip() {
        let params = UserParams::new("aarch64", "nginx", "1.24").with_remote_source(RemoteSource {
            name: "app".to_string(),
            url: "https://cachito.example.com/archive.tar.gz".to_string(),
            request_id: 42,
        });
        let json = serde_json::to_string(&params).unwrap();
        let back: UserParams = serde_json::from_str(&json).unwrap();
        assert_eq!(params, back);
    }

    #[test]
    fn test_default_is_not_scratch() {
        assert!(!UserParams::default().scratch);
    }
}
