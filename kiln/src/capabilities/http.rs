//! Generic HTTP download capability.

use crate::errors::CapabilityError;
use async_trait::async_trait;
use std::fmt::Debug;
use std::path::Path;

/// Capability interface for plain HTTP fetches (remote-source archives,
/// configuration downloads).
#[async_trait]
pub trait HttpClient: Send + Sync + Debug {
    /// Fetches a URL, returning the response body.
    async fn get(&self, url: &str) -> Result<Vec<u8>, CapabilityError>;

    /// Downloads a URL into a file.
    async fn download(&self, url: &str, dest: &Path) -> Result<(), CapabilityError>;
}

/// reqwest-backed HTTP client.
#[cfg(feature = "remote")]
#[derive(Debug, Clone, Default)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

#[cfg(feature = "remote")]
impl ReqwestHttpClient {
    /// Creates a new client.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(feature = "remote")]
#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get(&self, url: &str) -> Result<Vec<u8>, CapabilityError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(CapabilityError::transport)?;

        if !response.status().is_success() {
            return Err(CapabilityError::service(
                "http",
                "get",
                format!("unexpected status {} for {url}", response.status()),
            ));
        }

        let bytes = response.bytes().await.map_err(CapabilityError::transport)?;
        Ok(bytes.to_vec())
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<(), CapabilityError> {
        let body = self.get(url).await?;
        std::fs::write(dest, body)?;
        Ok(())
    }
}
