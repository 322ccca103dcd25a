//! External capability interfaces.
//!
//! Capabilities are injected abstractions over external systems: the
//! container runtime, the build-tracking service, the remote-source
//! service, plain HTTP. Plugins use them without owning them, and the
//! pipeline core never reaches around them.

mod cachito;
mod http;
mod koji;
mod tasker;

pub use cachito::CachitoClient;
pub use http::HttpClient;
pub use koji::{
    BuildRecord, KojiClient, NvrRequest, ReservationReply, TaskInfo, TaskState,
};
pub use tasker::ContainerTasker;

#[cfg(feature = "remote")]
pub use cachito::CachitoApiClient;
#[cfg(feature = "remote")]
pub use http::ReqwestHttpClient;

use crate::errors::BuildError;
use std::fmt;
use std::sync::Arc;

/// The bundle of capabilities injected into plugins.
///
/// Pure-metadata phases typically run without a tasker; a plugin asking
/// for an unconfigured capability gets a configuration error, not a panic.
#[derive(Clone, Default)]
pub struct Capabilities {
    tasker: Option<Arc<dyn ContainerTasker>>,
    koji: Option<Arc<dyn KojiClient>>,
    cachito: Option<Arc<dyn CachitoClient>>,
    http: Option<Arc<dyn HttpClient>>,
}

impl Capabilities {
    /// Creates an empty capability bundle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a container tasker.
    #[must_use]
    pub fn with_tasker(mut self, tasker: Arc<dyn ContainerTasker>) -> Self {
        self.tasker = Some(tasker);
        self
    }

    /// Adds a Koji client.
    #[must_use]
    pub fn with_koji(mut self, koji: Arc<dyn KojiClient>) -> Self {
        self.koji = Some(koji);
        self
    }

    /// Adds a Cachito client.
    #[must_use]
    pub fn with_cachito(mut self, cachito: Arc<dyn CachitoClient>) -> Self {
        self.cachito = Some(cachito);
        self
    }

    /// Adds an HTTP client.
    #[must_use]
    pub fn with_http(mut self, http: Arc<dyn HttpClient>) -> Self {
        self.http = Some(http);
        self
    }

    /// Returns the container tasker.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no tasker was injected.
    pub fn tasker(&self) -> Result<&Arc<dyn ContainerTasker>, BuildError> {
        self.tasker
            .as_ref()
            .ok_or_else(|| BuildError::configuration("no container tasker configured"))
    }

    /// Returns the Koji client.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no Koji client was injected.
    pub fn koji(&self) -> Result<&Arc<dyn KojiClient>, BuildError> {
        self.koji
            .as_ref()
            .ok_or_else(|| BuildError::configuration("no koji client configured"))
    }

    /// Returns the Cachito client.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no Cachito client was injected.
    pub fn cachito(&self) -> Result<&Arc<dyn CachitoClient>, BuildError> {
        self.cachito
            .as_ref()
            .ok_or_else(|| BuildError::configuration("no cachito client configured"))
    }

    /// Returns the HTTP client.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no HTTP client was injected.
    pub fn http(&self) -> Result<&Arc<dyn HttpClient>, BuildError> {
        self.http
            .as_ref()
            .ok_or_else(|| BuildError::configuration("no http client configured"))
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capabilities")
            .field("tasker", &self.tasker.is_some())
            .field("koji", &self.koji.is_some())
            .field("cachito", &self.cachito.is_some())
            .field("http", &self.http.is_some())
            .finish()
    }
}
