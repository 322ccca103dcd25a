//! Image component records.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single installed package record inside a built image.
///
/// Matches the component record shape expected by content-generator
/// metadata imports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageComponent {
    /// The component type; currently always `"rpm"`.
    #[serde(rename = "type")]
    pub component_type: String,
    /// Package name.
    pub name: String,
    /// Package version.
    pub version: String,
    /// Package release.
    pub release: String,
    /// Package architecture.
    pub arch: String,
    /// Package epoch, when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epoch: Option<u64>,
    /// Header md5 digest, when available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sigmd5: Option<String>,
    /// PGP signature, when the package is signed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl ImageComponent {
    /// Creates a new rpm component record.
    #[must_use]
    pub fn rpm(
        name: impl Into<String>,
        version: impl Into<String>,
        release: impl Into<String>,
        arch: impl Into<String>,
    ) -> Self {
        Self {
            component_type: "rpm".to_string(),
            name: name.into(),
            version: version.into(),
            release: release.into(),
            arch: arch.into(),
            epoch: None,
            sigmd5: None,
            signature: None,
        }
    }

    /// Sets the epoch.
    #[must_use]
    pub fn with_epoch(mut self, epoch: u64) -> Self {
        self.epoch = Some(epoch);
        self
    }

    /// Sets the header digest.
    #[must_use]
    pub fn with_sigmd5(mut self, sigmd5: impl Into<String>) -> Self {
        self.sigmd5 = Some(sigmd5.into());
        self
    }

    /// Sets the signature.
    #[must_use]
    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    /// Returns the name-version-release string for this component.
    #[must_use]
    pub fn nvr(&self) -> String {
        format!("{}-{}-{}", self.name, self.version, self.release)
    }
}

impl fmt::Display for ImageComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.nvr(), self.arch)
    }
}
