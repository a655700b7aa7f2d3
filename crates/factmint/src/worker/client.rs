//! Worker HTTP client.
//!
//! Every request runs under a fixed timeout; an abort surfaces as
//! `RequestTimedOut` and is counted like any other transport failure.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use serde_json::json;

use crate::error::{PollError, SubmitError};
use crate::worker::status::{StatusResponse, SubmitResponse};

/// The remote extraction worker, seen from the pipeline.
#[async_trait]
pub trait WorkerClient: Send + Sync {
    /// Submits an extraction request; `parent_asset_id` is set on
    /// re-processing attempts.
    async fn submit_job(
        &self,
        url: &str,
        parent_asset_id: Option<&str>,
    ) -> Result<SubmitResponse, SubmitError>;

    /// One status poll for an active job.
    async fn job_status(&self, job_id: &str) -> Result<StatusResponse, PollError>;
}

/// reqwest-backed worker client with a per-request timeout.
pub struct HttpWorkerClient {
    http: reqwest::Client,
    submit_url: String,
    status_url: String,
    timeout: Duration,
}

impl HttpWorkerClient {
    pub fn new(submit_url: &str, status_url: &str, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            submit_url: submit_url.to_string(),
            status_url: status_url.to_string(),
            timeout,
        }
    }
}

#[async_trait]
impl WorkerClient for HttpWorkerClient {
    async fn submit_job(
        &self,
        url: &str,
        parent_asset_id: Option<&str>,
    ) -> Result<SubmitResponse, SubmitError> {
        debug!("Submitting job for {} (parent: {:?})", url, parent_asset_id);
        let mut body = json!({ "url": url });
        if let Some(parent) = parent_asset_id {
            body["parentAssetId"] = json!(parent);
        }

        let request = self.http.post(&self.submit_url).json(&body).send();
        let response = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| SubmitError::JobSubmissionFailed("request timed out".to_string()))?
            .map_err(|e| SubmitError::JobSubmissionFailed(e.to_string()))?;

        response
            .json()
            .await
            .map_err(|e| SubmitError::JobSubmissionFailed(format!("malformed response: {}", e)))
    }

    async fn job_status(&self, job_id: &str) -> Result<StatusResponse, PollError> {
        let request = self
            .http
            .get(&self.status_url)
            .query(&[("jobId", job_id)])
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
