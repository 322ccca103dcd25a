//! Remote-source service (Cachito) capability.

use crate::artifacts::ContentManifest;
use crate::errors::CapabilityError;
use async_trait::async_trait;
use std::fmt::Debug;

/// Capability interface over the Cachito remote-source service.
#[async_trait]
pub trait CachitoClient: Send + Sync + Debug {
    /// Returns the aggregated image content manifest for the given request
    /// ids.
    async fn get_image_content_manifest(
        &self,
        request_ids: &[u64],
    ) -> Result<ContentManifest, CapabilityError>;
}

/// HTTP-backed Cachito client.
#[cfg(feature = "remote")]
#[derive(Debug, Clone)]
pub struct CachitoApiClient {
    base_url: String,
    client: reqwest::Client,
}

#[cfg(feature = "remote")]
impl CachitoApiClient {
    /// Creates a client for the Cachito API at the given base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[cfg(feature = "remote")]
#[async_trait]
impl CachitoClient for CachitoApiClient {
    async fn get_image_content_manifest(
        &self,
        request_ids: &[u64],
    ) -> Result<ContentManifest, CapabilityError> {
        let requests = request_ids
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let url = format!(
            "{}/api/v1/content-manifest?requests={requests}",
            self.base_url.trim_end_matches('/')
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(CapabilityError::transport)?;

        if !response.status().is_success() {
            return Err(CapabilityError::service(
                "cachito",
                "content-manifest",
                format!("unexpected status {}", response.status()),
            ));
        }

        response
            .json::<ContentManifest>()
            .await
            .map_err(CapabilityError::transport)
    }
}
