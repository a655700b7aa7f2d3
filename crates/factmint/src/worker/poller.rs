//! Job status polling.
//!
//! One cancellable task per active job id drives its owning task state
//! forward from periodic worker responses. A poll cycle tries the request
//! plus a configured number of retries before the cycle counts as failed;
//! the consecutive-failure counter resets on any successful poll and
//! escalates to `LostConnection` when the budget is exhausted.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, info, warn};
use tokio::task::JoinHandle;

use crate::error::PollError;
use crate::store::{AssetId, JobId, TaskStore};
use crate::worker::client::WorkerClient;
use crate::worker::progress::estimate_percent;
use crate::worker::status::{JobStatus, StatusResponse};

/// Timing and retry knobs for a poller.
#[derive(Debug, Clone)]
pub struct PollPolicy {
    pub interval: Duration,
    /// Consecutive failed cycles before the poller gives up.
    pub failure_budget: u32,
    /// Extra attempts within one cycle before it counts as failed.
    pub retries: u32,
}

#[derive(Debug, PartialEq, Eq)]
enum CycleOutcome {
    Continue,
    Stop,
}

/// Polls one job and advances its task state.
pub struct JobPoller {
    job_id: JobId,
    task_id: AssetId,
    client: Arc<dyn WorkerClient>,
    store: Arc<TaskStore>,
    policy: PollPolicy,
    consecutive_failures: u32,
}

impl JobPoller {
    pub fn new(
        job_id: &str,
        task_id: &str,
        client: Arc<dyn WorkerClient>,
        store: Arc<TaskStore>,
        policy: PollPolicy,
    ) -> Self {
        Self {
            job_id: job_id.to_string(),
            task_id: task_id.to_string(),
            client,
            store,
            policy,
            consecutive_failures: 0,
        }
    }

    /// Runs until a terminal status or exhaustion of the failure budget.
    pub async fn run(mut self) {
        let mut interval = tokio::time::interval(self.policy.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        interval.tick().await; // skip immediate first tick

        loop {
            interval.tick().await;
            if self.step().await == CycleOutcome::Stop {
                break;
            }
        }
        debug!("Poller for job {} stopped", self.job_id);
    }

    /// One poll cycle: request with retries, then state transition.
    async fn step(&mut self) -> CycleOutcome {
        match self.poll_with_retries().await {
            Ok(response) => {
                self.consecutive_failures = 0;
                self.apply(&response)
            }
            Err(e) => {
                self.consecutive_failures += 1;
                warn!(
                    "Poll cycle for job {} failed ({}/{}): {}",
                    self.job_id, self.consecutive_failures, self.policy.failure_budget, e
                );
                if self.consecutive_failures >= self.policy.failure_budget {
                    let lost = PollError::LostConnection {
                        job_id: self.job_id.clone(),
                        failures: self.consecutive_failures,
                    };
                    self.store.revert_to_open(&self.task_id, &lost.to_string());
                    CycleOutcome::Stop
                } else {
                    CycleOutcome::Continue
                }
            }
        }
    }

    /// The attempt plus its retries. All attempts within a cycle must
    /// fail for the cycle to count against the budget; a non-transient
    /// error fails the cycle at once, without burning the retries.
    async fn poll_with_retries(&self) -> Result<StatusResponse, PollError> {
        let mut last_error = None;
        for attempt in 0..=self.policy.retries {
            match self.client.job_status(&self.job_id).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    debug!(
                        "Status attempt {} for job {} failed: {}",
                        attempt + 1,
                        self.job_id,
                        e
                    );
                    let retryable = e.is_transient();
                    last_error = Some(e);
                    if !retryable {
                        break;
                    }
                }
            }
        }
        // retries >= 0 guarantees at least one attempt ran
        Err(last_error.unwrap_or(PollError::RequestTimedOut))
    }

    fn apply(&self, response: &StatusResponse) -> CycleOutcome {
        if !response.status.is_terminal() {
            let percent = estimate_percent(response.status, response.progress.as_ref());
            self.store.update_progress(&self.task_id, percent);
            return CycleOutcome::Continue;
        }
        match response.status {
            JobStatus::Completed => {
                self.store
                    .complete_task(&self.task_id, response.minted_ids());
            }
            _ => {
                let reason = response
                    .error
                    .clone()
                    .unwrap_or_else(|| "worker reported failure".to_string());
                self.store.revert_to_open(&self.task_id, &reason);
            }
        }
        CycleOutcome::Stop
    }
}

// ─── Registry ───────────────────────────────────────────────────────────────

struct ActivePoller {
    generation: u64,
    handle: JoinHandle<()>,
}

/// Tracks the active poller per job id. At most one poller per id:
/// starting a new one stops any old one first, and a finished poller
/// removes its own entry.
pub struct PollerRegistry {
    inner: Mutex<HashMap<JobId, ActivePoller>>,
    generations: AtomicU64,
}

impl PollerRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            generations: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<JobId, ActivePoller>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Poller registry lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Spawns a poller for its job id, stopping any previous one.
    pub fn start(self: &Arc<Self>, poller: JobPoller) {
        let job_id = poller.job_id.clone();
        let generation = self.generations.fetch_add(1, Ordering::Relaxed);

        let registry = Arc::clone(self);
        let cleanup_job_id = job_id.clone();
        let handle = tokio::spawn(async move {
            poller.run().await;
            registry.deregister(&cleanup_job_id, generation);
        });

        let mut map = self.lock();
        if let Some(old) = map.insert(job_id.clone(), ActivePoller { generation, handle }) {
            info!("Replacing active poller for job {}", job_id);
            old.handle.abort();
        }
    }

    /// Removes an entry, but only if it still belongs to the finished
    /// poller; a replacement registered under the same id stays.
    fn deregister(&self, job_id: &str, generation: u64) {
        let mut map = self.lock();
        if map.get(job_id).is_some_and(|p| p.generation == generation) {
            map.remove(job_id);
        }
    }

    /// Stops and removes the poller for one job id.
    pub fn stop(&self, job_id: &str) -> bool {
        match self.lock().remove(job_id) {
            Some(poller) => {
                poller.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Number of currently tracked pollers.
    pub fn active_count(&self) -> usize {
        self.lock().len()
    }

    pub fn is_active(&self, job_id: &str) -> bool {
        self.lock().contains_key(job_id)
    }

    /// Aborts every tracked poller; no poller outlives its owner.
    pub fn abort_all(&self) {
        let mut map = self.lock();
        for (job_id, poller) in map.drain() {
            debug!("Aborting poller for job {}", job_id);
            poller.handle.abort();
        }
    }
}

impl Default for PollerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
