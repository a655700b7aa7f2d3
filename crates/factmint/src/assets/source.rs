//! Asset listing fetch.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use serde_json::json;

use crate::assets::types::AssetRecord;
use crate::error::PollError;

/// The external asset index holding the wallet's minted assets.
#[async_trait]
pub trait AssetSource: Send + Sync {
    /// The full current asset list for an owner, unordered.
    async fn assets_by_owner(&self, owner: &str) -> Result<Vec<AssetRecord>, PollError>;
}

/// reqwest-backed asset source with a per-request timeout.
pub struct HttpAssetSource {
    http: reqwest::Client,
    index_url: String,
    timeout: Duration,
}

impl HttpAssetSource {
    pub fn new(index_url: &str, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            index_url: index_url.to_string(),
            timeout,
        }
    }
}

#[async_trait]
impl AssetSource for HttpAssetSource {
    async fn assets_by_owner(&self, owner: &str) -> Result<Vec<AssetRecord>, PollError> {
        debug!("Fetching asset list for {}", owner);
        let request = self
            .http
            .post(&self.index_url)
            .json(&json!({ "ownerAddress": owner }))
            .send();
        let response = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| PollError::RequestTimedOut)?
            .map_err(|e| PollError::Transport(e.to_string()))?;

        response
            .json()
            .await
            .map_err(|e| PollError::MalformedResponse(e.to_string()))
    }
}
