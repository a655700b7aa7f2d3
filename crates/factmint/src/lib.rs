//! factmint — tokenized task execution pipeline.
//!
//! Authorizes a paid action with a value transfer on a distributed
//! ledger, hands the extraction job to a remote worker, polls its status
//! under unreliable network conditions, and reconciles the wallet's flat
//! asset collection into a parent/child derivation graph without
//! discarding in-flight progress.

pub mod assets;
pub mod config;
pub mod engine;
pub mod error;
pub mod labels;
pub mod ledger;
pub mod store;
pub mod telemetry;
pub mod worker;

pub use assets::{Asset, AssetGraphReconciler, AssetSource, DeclaredType, HttpAssetSource};
pub use config::PipelineConfig;
pub use engine::TaskEngine;
pub use error::{ConfigError, FactmintError, LedgerError, PollError, Result, SubmitError};
pub use ledger::{
    HttpLedgerClient, LedgerClient, PaymentAuthorizer, TokenAccount, TransactionSigner,
};
pub use store::{AssetId, JobId, TaskEvent, TaskPhase, TaskState, TaskStore};
pub use worker::{HttpWorkerClient, JobPoller, JobStatus, PollPolicy, PollerRegistry, WorkerClient};
