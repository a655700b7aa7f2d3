//! Worker wire types: job statuses, progress hints and minted results.

use serde::{Deserialize, Serialize};

/// Worker-reported status of an extraction job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Extracting,
    Processing,
    Batching,
    Completed,
    Failed,
}

impl JobStatus {
    /// True once the worker will never report another status for the job.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::Extracting => write!(f, "extracting"),
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::Batching => write!(f, "batching"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Free-form step description with optional numerator/denominator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressHint {
    #[serde(default)]
    pub step: String,
    #[serde(default)]
    pub done: Option<u64>,
    #[serde(default)]
    pub total: Option<u64>,
}

/// A fact record minted by a completed job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintedFact {
    pub mint_id: String,
    pub fact: String,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub extracted_date: Option<String>,
}

/// Results payload attached to a `completed` status response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResults {
    #[serde(default)]
    pub minted_facts: Vec<MintedFact>,
}

/// Response from the job status endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub status: JobStatus,
    #[serde(default)]
    pub progress: Option<ProgressHint>,
    #[serde(default)]
    pub results: Option<JobResults>,
    #[serde(default)]
    pub error: Option<String>,
}

impl StatusResponse {
    /// Ids of the minted fact assets, empty when no results are attached.
    pub fn minted_ids(&self) -> Vec<String> {
        self.results
            .as_ref()
            .map(|r| r.minted_facts.iter().map(|f| f.mint_id.clone()).collect())
            .unwrap_or_default()
    }
}

/// Response from the job submission endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub success: bool,
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}
