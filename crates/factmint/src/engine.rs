//! The task engine: the pipeline's single entry point for the UI layer.
//!
//! Owns the task store, the payment authorizer, the poller registry and
//! the reconciler. Control flow for a paid action: reference validation →
//! payment (must succeed) → job submission → polling; derived assets
//! become visible to the reconciler on the next refresh.

use std::sync::Arc;

use log::info;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::assets::reconciler::AssetGraphReconciler;
use crate::assets::source::{AssetSource, HttpAssetSource};
use crate::config::PipelineConfig;
use crate::error::{Result, SubmitError};
use crate::ledger::client::{HttpLedgerClient, LedgerClient, TransactionSigner};
use crate::ledger::payment::PaymentAuthorizer;
use crate::store::{AssetId, TaskEvent, TaskPhase, TaskState, TaskStore};
use crate::worker::client::{HttpWorkerClient, WorkerClient};
use crate::worker::poller::{JobPoller, PollPolicy, PollerRegistry};
use crate::worker::submit::{normalize_reference, submit_job};

pub struct TaskEngine {
    wallet: String,
    worker: Arc<dyn WorkerClient>,
    store: Arc<TaskStore>,
    payments: PaymentAuthorizer,
    reconciler: AssetGraphReconciler,
    pollers: Arc<PollerRegistry>,
    policy: PollPolicy,
}

impl TaskEngine {
    /// Builds an engine over explicit collaborator implementations.
    pub fn new(
        config: &PipelineConfig,
        wallet: &str,
        ledger: Arc<dyn LedgerClient>,
        signer: Arc<dyn TransactionSigner>,
        worker: Arc<dyn WorkerClient>,
        assets: Arc<dyn AssetSource>,
    ) -> Result<Self> {
        config.validate()?;

        let store = Arc::new(TaskStore::new());
        let payments = PaymentAuthorizer::new(
            ledger,
            signer,
            &config.treasury_owner,
            &config.token_mint,
            config.confirm_rounds,
            config.confirm_interval(),
        );
        let reconciler =
            AssetGraphReconciler::new(assets, Arc::clone(&store), wallet);
        let policy = PollPolicy {
            interval: config.poll_interval(),
            failure_budget: config.failure_budget,
            retries: config.poll_retries,
        };

        Ok(Self {
            wallet: wallet.to_string(),
            worker,
            store,
            payments,
            reconciler,
            pollers: Arc::new(PollerRegistry::new()),
            policy,
        })
    }

    /// Builds an engine with HTTP collaborators from the configured URLs.
    /// Signing stays external; the wallet's signer cannot be reimplemented
    /// here.
    pub fn from_config(
        config: &PipelineConfig,
        wallet: &str,
        signer: Arc<dyn TransactionSigner>,
    ) -> Result<Self> {
        let ledger = Arc::new(HttpLedgerClient::new(&config.ledger_rpc_url));
        let worker = Arc::new(HttpWorkerClient::new(
            &config.worker_submit_url,
            &config.worker_status_url,
            config.request_timeout(),
        ));
        let assets = Arc::new(HttpAssetSource::new(
            &config.asset_index_url,
            config.request_timeout(),
        ));
        Self::new(config, wallet, ledger, signer, worker, assets)
    }

    /// Submits a new paid extraction task for `source_text`.
    ///
    /// Payment is the admission gate: it must confirm before the job is
    /// submitted. Returns the id the task is tracked under; that is a
    /// synthetic `pending:` id until the reconciler observes the minted
    /// source asset and hands the entry over to it.
    pub async fn submit_paid_task(&self, source_text: &str) -> Result<AssetId> {
        let url = normalize_reference(source_text)?;
        let task_id = format!("pending:{}", Uuid::new_v4());

        self.payments.authorize(&task_id, &self.wallet).await?;
        let job_id = submit_job(self.worker.as_ref(), &url, None).await?;

        self.store.begin_pending_task(&task_id, &url);
        self.start_poller(&job_id, &task_id);
        info!("Paid task {} submitted as job {}", task_id, job_id);
        Ok(task_id)
    }

    /// Re-runs extraction for an existing source asset, linking the new
    /// job back to it. Requires a fresh payment, like any paid action.
    pub async fn resubmit(&self, asset_id: &str) -> Result<()> {
        if let Some(state) = self.store.get(asset_id) {
            if state.phase == TaskPhase::InProgress {
                return Err(SubmitError::AlreadyRunning(asset_id.to_string()).into());
            }
        }
        let asset = self
            .store
            .source_asset(asset_id)
            .ok_or_else(|| SubmitError::UnknownAsset(asset_id.to_string()))?;
        let url = normalize_reference(&asset.description)?;

        self.payments.authorize(asset_id, &self.wallet).await?;
        let job_id = match submit_job(self.worker.as_ref(), &url, Some(asset_id)).await {
            Ok(job_id) => job_id,
            Err(e) => {
                // The task stays open; record why the attempt died.
                self.store.revert_to_open(asset_id, &e.to_string());
                return Err(e.into());
            }
        };

        self.store.begin_task(asset_id);
        self.start_poller(&job_id, asset_id);
        info!("Task {} resubmitted as job {}", asset_id, job_id);
        Ok(())
    }

    /// Fetches the wallet's assets and merges them into the task map.
    /// Never fails from the caller's point of view; fetch errors are
    /// logged and leave the map untouched.
    pub async fn refresh_asset_graph(&self) {
        self.reconciler.refresh().await;
    }

    fn start_poller(&self, job_id: &str, task_id: &str) {
        let poller = JobPoller::new(
            job_id,
            task_id,
            Arc::clone(&self.worker),
            Arc::clone(&self.store),
            self.policy.clone(),
        );
        self.pollers.start(poller);
    }

    /// State of one task.
    pub fn task_state(&self, asset_id: &str) -> Option<TaskState> {
        self.store.get(asset_id)
    }

    /// Snapshot of every task.
    pub fn task_states(&self) -> std::collections::HashMap<AssetId, TaskState> {
        self.store.snapshot()
    }

    /// Counts by phase: (open, in progress, complete).
    pub fn counts(&self) -> (usize, usize, usize) {
        self.store.counts()
    }

    /// Subscribes to task state changes for reactive display.
    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.store.subscribe()
    }

    /// Number of jobs currently being polled.
    pub fn active_pollers(&self) -> usize {
        self.pollers.active_count()
    }

    /// Cancels every active poller. Called when the owning view goes away;
    /// no poller may outlive its owner.
    pub fn shutdown(&self) {
        self.pollers.abort_all();
    }
}

impl Drop for TaskEngine {
    fn drop(&mut self) {
        self.pollers.abort_all();
    }
}
