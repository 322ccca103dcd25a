//! Image content manifest (ICM) document.

use crate::errors::BuildError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The ICM document version this crate produces.
pub const ICM_VERSION: u32 = 1;

/// URL of the content manifest JSON schema.
pub const ICM_SPEC: &str =
    "https://raw.githubusercontent.com/kiln-build/kiln/main/schemas/content_manifest.json";

/// A package URL reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Purl {
    /// The package URL.
    pub purl: String,
}

impl Purl {
    /// Creates a purl reference.
    #[must_use]
    pub fn new(purl: impl Into<String>) -> Self {
        Self { purl: purl.into() }
    }
}

/// One entry in the image contents list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageContent {
    /// The package URL of the content.
    pub purl: String,
    /// Runtime dependencies, when known.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<Purl>,
    /// Build sources, when known.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<Purl>,
}

impl ImageContent {
    /// Creates an image content entry.
    #[must_use]
    pub fn new(purl: impl Into<String>) -> Self {
        Self {
            purl: purl.into(),
            dependencies: Vec::new(),
            sources: Vec::new(),
        }
    }
}

/// ICM document metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IcmMetadata {
    /// Document version; always [`ICM_VERSION`].
    pub icm_version: u32,
    /// Schema URL.
    pub icm_spec: String,
    /// Index of the image layer the content lands in.
    pub image_layer_index: usize,
}

/// The image content manifest attached to a built image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentManifest {
    /// Document metadata.
    pub metadata: IcmMetadata,
    /// Content sets enabled for the platform.
    #[serde(default)]
    pub content_sets: Vec<String>,
    /// Contents included in the image.
    #[serde(default)]
    pub image_contents: Vec<ImageContent>,
}

impl ContentManifest {
    /// Creates the minimal (empty) manifest skeleton.
    #[must_use]
    pub fn minimal() -> Self {
        Self {
            metadata: IcmMetadata {
                icm_version: ICM_VERSION,
                icm_spec: ICM_SPEC.to_string(),
                image_layer_index: 1,
            },
            content_sets: Vec::new(),
            image_contents: Vec::new(),
        }
    }

    /// Sets the image layer index.
    #[must_use]
    pub fn with_layer_index(mut self, index: usize) -> Self {
        self.metadata.image_layer_index = index;
        self
    }

    /// Sets the content sets.
    #[must_use]
    pub fn with_content_sets(mut self, content_sets: Vec<String>) -> Self {
        self.content_sets = content_sets;
        self
    }

    /// Adds an image content entry.
    #[must_use]
    pub fn with_content(mut self, content: ImageContent) -> Self {
        self.image_contents.push(content);
        self
    }

    /// Checks the document invariants the schema would enforce.
    ///
    /// # Errors
    ///
    /// Returns an invalid-data error when the document does not match the
    /// supported manifest version.
    pub fn validate(&self) -> Result<(), BuildError> {
        if self.metadata.icm_version != ICM_VERSION {
            return Err(BuildError::invalid_data(format!(
                "unsupported content manifest version {}",
                self.metadata.icm_version
            )));
        }
        Ok(())
    }

    /// Returns the manifest file name for a name-version-release.
    #[must_use]
    pub fn file_name(name: &str, version: &str, release: &str) -> String {
        format!("{name}-{version}-{release}.json")
    }

    /// Writes the manifest as pretty JSON into a directory.
    ///
    /// Refuses to overwrite an existing file.
    ///
    /// # Errors
    ///
    /// Returns an error when the target file already exists, the document
    /// fails validation, or the write fails.
    pub fn write_to(&self, dir: &Path, file_name: &str) -> Result<PathBuf, BuildError> {
        self.validate()?;

        let out_path = dir.join(file_name);
        if out_path.exists() {
            return Err(BuildError::configuration(format!(
                "content manifest {} already exists",
                out_path.display()
            )));
        }

        let body = serde_json::to_string_pretty(self)?;
        std::fs::write(&out_path, body)?;
        Ok(out_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_minimal_manifest() {
        let icm = ContentManifest::minimal();
        assert_eq!(icm.metadata.icm_version, ICM_VERSION);
        assert!(icm.content_sets.is_empty());
        assert!(icm.image_contents.is_empty());
        icm.validate().unwrap();
    }

    #[test]
    fn test_file_name() {
        assert_eq!(
            ContentManifest::file_name("httpd", "2.4", "3"),
            "httpd-2.4-3.json"
        );
    }

    #[test]
    fn test_serialization_shape() {
        let icm = ContentManifest::minimal()
            .with_layer_index(2)
            .with_content_sets(vec!["rhel-9-for-x86_64-baseos-rpms".to_string()])
            .with_content(ImageContent {
                purl: "pkg:golang/github.com%2Fexample%2Fapp@v1.0.0".to_string(),
                dependencies: vec![Purl::new("pkg:golang/github.com%2Fother%2Flib@v0.2.0")],
                sources: Vec::new(),
            });

        let json = serde_json::to_value(&icm).unwrap();
        assert_eq!(json["metadata"]["image_layer_index"], 2);
        assert_eq!(json["content_sets"][0], "rhel-9-for-x86_64-baseos-rpms");
        assert_eq!(json["image_contents"][0]["dependencies"].as_array().unwrap().len(), 1);
        assert!(json["image_contents"][0].get("sources").is_none());
    }

    #[test]
    fn test_validate_rejects_unknown_version() {
        let mut icm = ContentManifest::minimal();
        icm.metadata.icm_version = 7;
        assert!(icm.validate().is_err());
    }

    #[test]
    fn test_write_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let icm = ContentManifest::minimal();

        let path = icm.write_to(dir.path(), "app-1.0-1.json").unwrap();
        assert!(path.exists());

        let err = icm.write_to(dir.path(), "app-1.0-1.json").unwrap_err();
        assert!(matches!(err, BuildError::Configuration(_)));
    }

    #[test]
    fn test_round_trip() {
        let icm = ContentManifest::minimal().with_layer_index(4);
        let json = serde_json::to_string(&icm).unwrap();
        let back: ContentManifest = serde_json::from_str(&json).unwrap();
        assert_eq!(icm, back);
    }
}
