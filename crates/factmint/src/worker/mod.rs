//! Remote extraction worker integration: submission, status polling and
//! progress estimation.

pub mod client;
pub mod poller;
pub mod progress;
pub mod status;
pub mod submit;

pub use client::{HttpWorkerClient, WorkerClient};
pub use poller::{JobPoller, PollPolicy, PollerRegistry};
pub use status::{JobStatus, MintedFact, ProgressHint, StatusResponse, SubmitResponse};
pub use submit::{normalize_reference, submit_job};
