//! Build-context collaborators owned by the workflow.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The source repository a build works from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Source URI, when the build has a real source repository.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    /// Working directory holding the checked-out source.
    pub workdir: PathBuf,
}

impl Source {
    /// Creates a source backed by a repository URI.
    #[must_use]
    pub fn new(uri: impl Into<String>, workdir: impl Into<PathBuf>) -> Self {
        Self {
            uri: Some(uri.into()),
            workdir: workdir.into(),
        }
    }

    /// Creates a placeholder source for builds without a repository
    /// (e.g. source-container builds).
    #[must_use]
    pub fn dummy(workdir: impl Into<PathBuf>) -> Self {
        Self {
            uri: None,
            workdir: workdir.into(),
        }
    }
}

/// The directory a build writes its artifacts into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildDir {
    root: PathBuf,
}

impl BuildDir {
    /// Creates a build dir rooted at the given path.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the build dir root.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Returns a path inside the build dir.
    #[must_use]
    pub fn join(&self, name: impl AsRef<Path>) -> PathBuf {
        self.root.join(name)
    }
}

/// The parent image chain declared by the Dockerfile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockerfileImages {
    /// Parent images in order of appearance; `"scratch"` is literal.
    parents: Vec<String>,
    /// Number of layers in the base image, when it was inspected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    base_layer_count: Option<usize>,
}

impl DockerfileImages {
    /// Creates the image chain from parent image references.
    #[must_use]
    pub fn new(parents: Vec<String>) -> Self {
        Self {
            parents,
            base_layer_count: None,
        }
    }

    /// Records the inspected base image layer count.
    #[must_use]
    pub fn with_base_layer_count(mut self, count: usize) -> Self {
        self.base_layer_count = Some(count);
        self
    }

    /// Returns the base (last) parent image, if any.
    #[must_use]
    pub fn base_image(&self) -> Option<&str> {
        self.parents.last().map(String::as_str)
    }

    /// Returns true when the image builds from scratch.
    #[must_use]
    pub fn base_from_scratch(&self) -> bool {
        self.base_image() == Some("scratch")
    }

    /// Returns the layer index new content lands at.
    ///
    /// Base and scratch images squash to a single layer, so content sits at
    /// index 0; otherwise it follows the base image's layers.
    #[must_use]
    pub fn content_layer_index(&self) -> usize {
        if self.base_from_scratch() {
            return 0;
        }
        self.base_layer_count.unwrap_or(0)
    }
}
