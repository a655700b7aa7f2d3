use thiserror::Error;

/// Crate-wide error type aggregating the per-concern enums.
#[derive(Error, Debug)]
pub enum FactmintError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Submission error: {0}")]
    Submit(#[from] SubmitError),

    #[error("Polling error: {0}")]
    Poll(#[from] PollError),
}

pub type Result<T> = std::result::Result<T, FactmintError>;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config validation failed: {message}")]
    Validation { message: String },
}

/// Admission errors. Every variant is fatal to the current action and is
/// surfaced to the user verbatim; nothing here is retried automatically.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("No token account holding mint {mint} found for owner {owner}")]
    NoTokenAccount { owner: String, mint: String },

    #[error("Insufficient balance: have {balance} smallest units, need {required}")]
    InsufficientBalance { balance: u128, required: u128 },

    #[error("Transfer rejected by the ledger: {0}")]
    TransferRejected(String),

    #[error("Signer declined the transaction: {0}")]
    SignerDeclined(String),

    #[error("A payment is already in flight for {action}")]
    PaymentInFlight { action: String },

    #[error("Transaction {signature} was not confirmed in time")]
    ConfirmationTimeout { signature: String },

    #[error("Ledger RPC request failed: {0}")]
    Rpc(String),

    #[error("Malformed ledger response: {0}")]
    MalformedResponse(String),
}

/// Submission errors: fatal to the current action, the owning task stays
/// at (or returns to) the open-request phase and no poller is left running.
#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("No valid reference found in input")]
    NoValidReference,

    #[error("Job submission failed: {0}")]
    JobSubmissionFailed(String),

    #[error("No known source asset with id {0}")]
    UnknownAsset(String),

    #[error("Task {0} is already running")]
    AlreadyRunning(String),
}

/// Polling errors. Transport failures, timeouts and malformed responses
/// are recovered locally up to the failure budget; `LostConnection` is the
/// escalation after the budget is exhausted.
#[derive(Error, Debug)]
pub enum PollError {
    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Request timed out")]
    RequestTimedOut,

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Lost connection to the worker after {failures} consecutive failures (job {job_id})")]
    LostConnection { job_id: String, failures: u32 },
}

impl PollError {
    /// True for failures worth retrying within a poll cycle. A malformed
    /// body reads the same on an immediate retry, and `LostConnection`
    /// is the terminal escalation, so neither is retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, PollError::Transport(_) | PollError::RequestTimedOut)
    }
}
