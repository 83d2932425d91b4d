//! Transport collaborator: turns a URL into a decoded payload.

use serde_json::Value;
use showsync_core::CatalogError;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::ClientConfig;

/// Fetches one catalog URL. Implementations must give up with
/// [`CatalogError::Cancelled`] once `cancel` fires.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, url: &str, cancel: &CancellationToken) -> Result<Value, CatalogError>;
}

/// HTTP transport over `reqwest`, expecting JSON bodies.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, CatalogError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| CatalogError::Transport(format!("build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    async fn get_json(&self, url: &str) -> Result<Value, CatalogError> {
        debug!(url = %url, "catalog request");

        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CatalogError::Transport(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(CatalogError::NotFound(url.to_string()));
        }

        if !resp.status().is_success() {
            return Err(CatalogError::Transport(format!(
                "catalog returned {}",
                resp.status()
            )));
        }

        resp.json()
            .await
            .map_err(|e| CatalogError::Transport(format!("parse JSON: {e}")))
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, url: &str, cancel: &CancellationToken) -> Result<Value, CatalogError> {
        if cancel.is_cancelled() {
            return Err(CatalogError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(CatalogError::Cancelled),
            result = self.get_json(url) => result,
        }
    }
}
