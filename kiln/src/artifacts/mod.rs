//! Persisted build artifacts produced through the file-I/O contract.

mod buildargs;
mod content_manifest;

pub use buildargs::{render_env_export, write_env_script};
pub use content_manifest::{
    ContentManifest, IcmMetadata, ImageContent, Purl, ICM_SPEC, ICM_VERSION,
};
