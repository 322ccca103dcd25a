//! Built-in plugins.
//!
//! These cover the standard binary-container pipeline: release resolution
//! and reservation, content manifest generation, the filesystem build
//! step, rpm enumeration, and the exit-phase cleanup/reporting pair.

mod add_content_manifest;
mod bump_release;
mod cancel_build_reservation;
mod filesystem_builder;
mod rpm_manifest;
mod store_metadata;

pub use add_content_manifest::AddContentManifest;
pub use bump_release::BumpRelease;
pub use cancel_build_reservation::CancelBuildReservation;
pub use filesystem_builder::FilesystemBuilder;
pub use rpm_manifest::RpmManifest;
pub use store_metadata::StoreMetadata;

use crate::errors::BuildError;
use crate::plugin::PluginRegistry;
use std::sync::Arc;

/// Registers all built-in plugins into a registry.
///
/// # Errors
///
/// Returns a configuration error on key collisions.
pub fn register_builtins(registry: &mut PluginRegistry) -> Result<(), BuildError> {
    registry.register(BumpRelease::KEY, |args| {
        Ok(Arc::new(BumpRelease::from_args(args)?))
    })?;
    registry.register(AddContentManifest::KEY, |args| {
        Ok(Arc::new(AddContentManifest::from_args(args)?))
    })?;
    registry.register(RpmManifest::KEY, |args| {
        Ok(Arc::new(RpmManifest::from_args(args)?))
    })?;
    registry.register(CancelBuildReservation::KEY, |args| {
        Ok(Arc::new(CancelBuildReservation::from_args(args)?))
    })?;
    registry.register(StoreMetadata::KEY, |args| {
        Ok(Arc::new(StoreMetadata::from_args(args)?))
    })?;
    registry.register_buildstep(FilesystemBuilder::KEY, |args| {
        Ok(Arc::new(FilesystemBuilder::from_args(args)?))
    })?;
    Ok(())
}
