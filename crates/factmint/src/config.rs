//! Pipeline configuration.
//!
//! All timing knobs default to the values the production system used:
//! a 3 second poll interval, a 30 second per-request timeout and a
//! budget of 5 consecutive failed poll cycles before a poller gives up.

use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

fn default_poll_interval_secs() -> u64 {
    3
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_failure_budget() -> u32 {
    5
}

fn default_poll_retries() -> u32 {
    1
}

fn default_confirm_rounds() -> u32 {
    30
}

fn default_confirm_interval_secs() -> u64 {
    1
}

/// Configuration for the task execution pipeline.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineConfig {
    /// Base URL of the ledger RPC endpoint.
    pub ledger_rpc_url: String,
    /// URL of the worker's job submission endpoint.
    pub worker_submit_url: String,
    /// URL of the worker's job status endpoint.
    pub worker_status_url: String,
    /// URL of the asset listing endpoint.
    pub asset_index_url: String,
    /// Owner address of the treasury that receives payments.
    pub treasury_owner: String,
    /// Mint identifier of the payment token.
    pub token_mint: String,
    /// Seconds between status polls for an active job.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Seconds before any single network attempt is aborted.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Consecutive failed poll cycles before a poller gives up.
    #[serde(default = "default_failure_budget")]
    pub failure_budget: u32,
    /// Extra attempts per poll cycle before the cycle counts as failed.
    /// This replaces the historical dual-transport fallback; both legacy
    /// paths hit the same endpoint, so one retrying client is equivalent.
    #[serde(default = "default_poll_retries")]
    pub poll_retries: u32,
    /// Confirmation polls before a submitted transfer is considered lost.
    #[serde(default = "default_confirm_rounds")]
    pub confirm_rounds: u32,
    /// Seconds between confirmation polls.
    #[serde(default = "default_confirm_interval_secs")]
    pub confirm_interval_secs: u64,
}

impl PipelineConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn confirm_interval(&self) -> Duration {
        Duration::from_secs(self.confirm_interval_secs)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn require_url(name: &str, value: &str) -> Result<(), ConfigError> {
            if value.trim().is_empty() {
                return Err(ConfigError::Validation {
                    message: format!("{} must not be empty", name),
                });
            }
            if !value.starts_with("http://") && !value.starts_with("https://") {
                return Err(ConfigError::Validation {
                    message: format!("{} must be an absolute http(s) URL, got '{}'", name, value),
                });
            }
            Ok(())
        }

        require_url("ledgerRpcUrl", &self.ledger_rpc_url)?;
        require_url("workerSubmitUrl", &self.worker_submit_url)?;
        require_url("workerStatusUrl", &self.worker_status_url)?;
        require_url("assetIndexUrl", &self.asset_index_url)?;

        if self.treasury_owner.trim().is_empty() {
            return Err(ConfigError::Validation {
                message: "treasuryOwner must not be empty".to_string(),
            });
        }
        if self.token_mint.trim().is_empty() {
            return Err(ConfigError::Validation {
                message: "tokenMint must not be empty".to_string(),
            });
        }
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Validation {
                message: "pollIntervalSecs must be greater than zero".to_string(),
            });
        }
        if self.failure_budget == 0 {
            return Err(ConfigError::Validation {
                message: "failureBudget must be greater than zero".to_string(),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Validation {
                message: "requestTimeoutSecs must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}
