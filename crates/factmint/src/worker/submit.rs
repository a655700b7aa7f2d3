//! Job submission: reference normalization plus one request to the worker.

use std::sync::OnceLock;

use log::{info, warn};
use regex::Regex;

use crate::error::SubmitError;
use crate::worker::client::WorkerClient;

fn url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // Absolute http(s) references; stops at whitespace and the quote
        // characters free text tends to wrap links in.
        Regex::new(r#"https?://[^\s"'<>]+"#).unwrap()
    })
}

/// Normalizes caller input into an absolute reference.
///
/// Accepts text that is itself a well-formed URL, or free text with an
/// embedded URL (the first match wins). Anything else is `NoValidReference`.
pub fn normalize_reference(text: &str) -> Result<String, SubmitError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(SubmitError::NoValidReference);
    }

    if let Some(m) = url_pattern().find(trimmed) {
        if m.start() == 0 && m.end() == trimmed.len() {
            return Ok(trimmed.to_string());
        }
        let extracted = m.as_str().to_string();
        info!("Extracted reference {} from free text", extracted);
        return Ok(extracted);
    }

    Err(SubmitError::NoValidReference)
}

/// Sends one extraction request and returns the issued job id.
///
/// Transport failure and semantic failure (`success: false` or a missing
/// job id) both surface as `JobSubmissionFailed`; the caller never starts
/// a polling loop on any error path.
pub async fn submit_job(
    client: &dyn WorkerClient,
    url: &str,
    parent_asset_id: Option<&str>,
) -> Result<String, SubmitError> {
    let response = client.submit_job(url, parent_asset_id).await?;

    if !response.success {
        let reason = response
            .error
            .unwrap_or_else(|| "worker reported failure without a reason".to_string());
        warn!("Job submission for {} rejected: {}", url, reason);
        return Err(SubmitError::JobSubmissionFailed(reason));
    }

    match response.job_id {
        Some(job_id) if !job_id.is_empty() => {
            info!("Job {} accepted for {}", job_id, url);
            Ok(job_id)
        }
        _ => Err(SubmitError::JobSubmissionFailed(
            "worker response omitted the job id".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    use crate::error::PollError;
    use crate::worker::status::{StatusResponse, SubmitResponse};

    #[test]
    fn test_normalize_plain_url() {
        let url = normalize_reference("https://example.com/article").unwrap();
        assert_eq!(url, "https://example.com/article");
    }

    #[test]
    fn test_normalize_trims_whitespace() {
        let url = normalize_reference("  https://example.com/x \n").unwrap();
        assert_eq!(url, "https://example.com/x");
    }

    #[test]
    fn test_normalize_extracts_embedded_url() {
        let url =
            normalize_reference("check this out: https://example.com/post?id=3 amazing").unwrap();
        assert_eq!(url, "https://example.com/post?id=3");
    }

    #[test]
    fn test_normalize_first_match_wins() {
        let url = normalize_reference("https://a.test/1 and https://b.test/2").unwrap();
        assert_eq!(url, "https://a.test/1");
    }

    #[test]
    fn test_normalize_rejects_plain_text() {
        assert!(matches!(
            normalize_reference("not a link at all"),
            Err(SubmitError::NoValidReference)
        ));
    }

    #[test]
    fn test_normalize_rejects_empty() {
        assert!(normalize_reference("   ").is_err());
    }

    #[test]
    fn test_normalize_rejects_relative_reference() {
        assert!(normalize_reference("/articles/42").is_err());
    }

    struct ScriptedWorker {
        responses: Mutex<Vec<Result<SubmitResponse, SubmitError>>>,
    }

    #[async_trait]
    impl WorkerClient for ScriptedWorker {
        async fn submit_job(
            &self,
            _url: &str,
            _parent: Option<&str>,
        ) -> Result<SubmitResponse, SubmitError> {
            self.responses.lock().unwrap().remove(0)
        }

        async fn job_status(&self, _job_id: &str) -> Result<StatusResponse, PollError> {
            unreachable!("submission tests never poll")
        }
    }

    fn worker(response: Result<SubmitResponse, SubmitError>) -> ScriptedWorker {
        ScriptedWorker {
            responses: Mutex::new(vec![response]),
        }
    }

    #[tokio::test]
    async fn test_submit_returns_job_id() {
        let client = worker(Ok(SubmitResponse {
            success: true,
            job_id: Some("job-7".to_string()),
            error: None,
        }));
        let job_id = submit_job(&client, "https://example.com/x", None)
            .await
            .unwrap();
        assert_eq!(job_id, "job-7");
    }

    #[tokio::test]
    async fn test_submit_semantic_failure() {
        let client = worker(Ok(SubmitResponse {
            success: false,
            job_id: None,
            error: Some("queue full".to_string()),
        }));
        let err = submit_job(&client, "https://example.com/x", None)
            .await
            .unwrap_err();
        match err {
            SubmitError::JobSubmissionFailed(reason) => assert!(reason.contains("queue full")),
            other => panic!("expected JobSubmissionFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_submit_missing_job_id_is_failure() {
        let client = worker(Ok(SubmitResponse {
            success: true,
            job_id: None,
            error: None,
        }));
        assert!(submit_job(&client, "https://example.com/x", None)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_submit_transport_failure() {
        let client = worker(Err(SubmitError::JobSubmissionFailed(
            "connection refused".to_string(),
        )));
        assert!(submit_job(&client, "https://example.com/x", None)
            .await
            .is_err());
    }
}
