//! Container runtime capability.

use crate::errors::CapabilityError;
use async_trait::async_trait;
use std::fmt::Debug;

/// Capability interface over the container runtime.
///
/// Plugins drive containers only through this trait; the core never owns a
/// runtime connection.
#[async_trait]
pub trait ContainerTasker: Send + Sync + Debug {
    /// Creates a container from an image, returning the container id.
    async fn create_container(
        &self,
        image: &str,
        command: &[String],
    ) -> Result<String, CapabilityError>;

    /// Starts a created container and waits for it to finish.
    async fn start_container(&self, container_id: &str) -> Result<(), CapabilityError>;

    /// Stops a running container.
    async fn stop_container(&self, container_id: &str) -> Result<(), CapabilityError>;

    /// Returns the captured output lines of a finished container.
    async fn container_logs(&self, container_id: &str) -> Result<Vec<String>, CapabilityError>;

    /// Copies a path out of a container as an archive.
    async fn get_archive(&self, container_id: &str, path: &str)
        -> Result<Vec<u8>, CapabilityError>;

    /// Removes the given containers, ignoring ones already gone.
    async fn cleanup_containers(&self, container_ids: &[String]) -> Result<(), CapabilityError>;
}
