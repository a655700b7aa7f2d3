//! Task state store.
//!
//! The single source of truth the UI reads. All mutation flows through the
//! merge function or the poller transition methods, each inside one write
//! lock scope, so a reconciler merge can never interleave with a poller
//! update on the same entry.

use std::collections::HashMap;
use std::sync::RwLock;

use log::{debug, info, warn};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::assets::reconciler::AssetGraph;
use crate::assets::types::Asset;
use crate::labels::LabelMint;

pub type AssetId = String;
pub type JobId = String;

/// Phase of a source asset's task.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskPhase {
    /// No job running; the asset can be (re)submitted.
    OpenRequest,
    /// A job is running and being polled.
    InProgress,
    /// Derived facts exist. Terminal; never regresses.
    Complete,
}

impl std::fmt::Display for TaskPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskPhase::OpenRequest => write!(f, "open_request"),
            TaskPhase::InProgress => write!(f, "in_progress"),
            TaskPhase::Complete => write!(f, "complete"),
        }
    }
}

/// Pipeline-owned state for one source asset.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaskState {
    pub phase: TaskPhase,
    /// 0–100; non-decreasing while in progress.
    pub progress_percent: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Ids of derived-fact assets belonging to this asset as parent.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub derived_facts: Vec<AssetId>,
}

impl TaskState {
    /// The state a freshly observed source asset starts in.
    pub fn open_request() -> Self {
        Self {
            phase: TaskPhase::OpenRequest,
            progress_percent: 0,
            assigned_label: None,
            error: None,
            derived_facts: Vec::new(),
        }
    }
}

/// Broadcast on every task state change, for reactive display.
#[derive(Debug, Clone)]
pub struct TaskEvent {
    pub asset_id: AssetId,
    pub state: TaskState,
}

/// Outcome of one reconciler merge, for logging.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub new_tasks: usize,
    pub newly_completed: usize,
    /// Synthetic pending entries taken over by their minted source asset.
    pub adopted: usize,
}

/// Owned map of task states keyed by source asset id, plus the last seen
/// source assets (for resubmission) and a change broadcaster.
///
/// A fresh submission is tracked under a synthetic id until its source
/// asset is minted; `pending` remembers the submitted reference so the
/// merge can match the minted asset to the synthetic entry, and `aliases`
/// keeps the synthetic id answering after the handoff (the poller that
/// started the job still keys by it).
pub struct TaskStore {
    tasks: RwLock<HashMap<AssetId, TaskState>>,
    sources: RwLock<HashMap<AssetId, Asset>>,
    pending: RwLock<HashMap<AssetId, String>>,
    aliases: RwLock<HashMap<AssetId, AssetId>>,
    events: broadcast::Sender<TaskEvent>,
    labels: LabelMint,
}

impl TaskStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            tasks: RwLock::new(HashMap::new()),
            sources: RwLock::new(HashMap::new()),
            pending: RwLock::new(HashMap::new()),
            aliases: RwLock::new(HashMap::new()),
            events,
            labels: LabelMint::new(),
        }
    }

    /// Subscribes to task state changes.
    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.events.subscribe()
    }

    fn emit(&self, asset_id: &str, state: &TaskState) {
        // No active receivers is fine
        let _ = self.events.send(TaskEvent {
            asset_id: asset_id.to_string(),
            state: state.clone(),
        });
    }

    fn read_tasks(&self) -> std::sync::RwLockReadGuard<'_, HashMap<AssetId, TaskState>> {
        match self.tasks.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Task store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write_tasks(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<AssetId, TaskState>> {
        match self.tasks.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Task store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write_pending(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<AssetId, String>> {
        match self.pending.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Pending reference lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Follows the synthetic-id alias left behind by a handoff, if any.
    fn resolve(&self, asset_id: &str) -> AssetId {
        let aliases = match self.aliases.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Alias lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        aliases
            .get(asset_id)
            .cloned()
            .unwrap_or_else(|| asset_id.to_string())
    }

    fn record_alias(&self, pending_id: &str, minted_id: &str) {
        let mut aliases = match self.aliases.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Alias lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        aliases.insert(pending_id.to_string(), minted_id.to_string());
    }

    /// Removes and returns the synthetic id whose submitted reference
    /// matches a minted source asset's description.
    fn take_pending_match(&self, description: &str) -> Option<AssetId> {
        let mut pending = self.write_pending();
        let reference = description.trim();
        let id = pending
            .iter()
            .find_map(|(id, url)| (url.as_str() == reference).then(|| id.clone()))?;
        pending.remove(&id);
        Some(id)
    }

    /// Returns the state for one task.
    pub fn get(&self, asset_id: &str) -> Option<TaskState> {
        let id = self.resolve(asset_id);
        self.read_tasks().get(&id).cloned()
    }

    /// Snapshot of the whole map.
    pub fn snapshot(&self) -> HashMap<AssetId, TaskState> {
        self.read_tasks().clone()
    }

    /// Counts by phase: (open, in progress, complete).
    pub fn counts(&self) -> (usize, usize, usize) {
        let tasks = self.read_tasks();
        let mut open = 0;
        let mut in_progress = 0;
        let mut complete = 0;
        for state in tasks.values() {
            match state.phase {
                TaskPhase::OpenRequest => open += 1,
                TaskPhase::InProgress => in_progress += 1,
                TaskPhase::Complete => complete += 1,
            }
        }
        (open, in_progress, complete)
    }

    /// The last observed source asset with this id, if any.
    pub fn source_asset(&self, asset_id: &str) -> Option<Asset> {
        let id = self.resolve(asset_id);
        match self.sources.read() {
            Ok(guard) => guard.get(&id).cloned(),
            Err(poisoned) => {
                warn!("Source cache lock was poisoned, recovering");
                poisoned.into_inner().get(&id).cloned()
            }
        }
    }

    // ─── Poller / submission transitions ────────────────────────────────────

    /// Marks a task in progress at job-submission time, assigning a label
    /// on first use and clearing any stale error.
    pub fn begin_task(&self, asset_id: &str) -> TaskState {
        let mut tasks = self.write_tasks();
        let state = tasks
            .entry(asset_id.to_string())
            .or_insert_with(TaskState::open_request);
        state.phase = TaskPhase::InProgress;
        state.progress_percent = 0;
        state.error = None;
        if state.assigned_label.is_none() {
            state.assigned_label = Some(self.labels.next());
        }
        let state = state.clone();
        drop(tasks);
        self.emit(asset_id, &state);
        state
    }

    /// Marks a fresh submission in progress under its synthetic id,
    /// remembering the submitted reference so the minted source asset
    /// can take the entry over on a later refresh.
    pub fn begin_pending_task(&self, task_id: &str, reference: &str) -> TaskState {
        self.write_pending()
            .insert(task_id.to_string(), reference.to_string());
        self.begin_task(task_id)
    }

    /// Advances the display percentage, clamped non-decreasing. Ignored
    /// once a task is complete.
    pub fn update_progress(&self, asset_id: &str, percent: u8) {
        let id = self.resolve(asset_id);
        let mut tasks = self.write_tasks();
        let Some(state) = tasks.get_mut(&id) else {
            return;
        };
        if state.phase == TaskPhase::Complete {
            return;
        }
        let clamped = crate::worker::progress::monotonic(state.progress_percent, percent);
        if state.phase == TaskPhase::InProgress && clamped == state.progress_percent {
            return;
        }
        state.phase = TaskPhase::InProgress;
        state.progress_percent = clamped;
        let state = state.clone();
        drop(tasks);
        self.emit(&id, &state);
    }

    /// Terminal success: records the derived facts and pins the task at
    /// complete. Idempotent.
    pub fn complete_task(&self, asset_id: &str, derived_facts: Vec<AssetId>) {
        let id = self.resolve(asset_id);
        let mut tasks = self.write_tasks();
        let state = tasks
            .entry(id.clone())
            .or_insert_with(TaskState::open_request);
        if state.phase == TaskPhase::Complete {
            return;
        }
        state.phase = TaskPhase::Complete;
        state.progress_percent = 100;
        state.error = None;
        state.derived_facts = derived_facts;
        if state.assigned_label.is_none() {
            state.assigned_label = Some(self.labels.next());
        }
        let state = state.clone();
        drop(tasks);
        info!("Task {} complete with {} derived facts", id, state.derived_facts.len());
        self.emit(&id, &state);
    }

    /// Aborts an in-flight task back to open with an error. A complete
    /// task never regresses; the revert is dropped with a log line.
    pub fn revert_to_open(&self, asset_id: &str, error: &str) {
        let id = self.resolve(asset_id);
        let mut tasks = self.write_tasks();
        let Some(state) = tasks.get_mut(&id) else {
            return;
        };
        if state.phase == TaskPhase::Complete {
            debug!("Ignoring revert for completed task {}", id);
            return;
        }
        state.phase = TaskPhase::OpenRequest;
        state.progress_percent = 0;
        state.error = Some(error.to_string());
        let state = state.clone();
        drop(tasks);
        warn!("Task {} reverted to open: {}", id, error);
        self.emit(&id, &state);
    }

    // ─── Reconciler merge ───────────────────────────────────────────────────

    /// Merges a fetched asset graph into the map as one atomic step.
    ///
    /// Refresh-safe and idempotent: a task that is already complete, or
    /// already carries derived facts, is never overwritten; every entry not
    /// explicitly covered keeps its state, which preserves in-progress jobs
    /// across a concurrent refresh.
    pub fn merge_graph(&self, graph: &AssetGraph) -> MergeSummary {
        let _span = tracing::info_span!("store.merge").entered();
        let mut summary = MergeSummary::default();
        let mut changed: Vec<(AssetId, TaskState)> = Vec::new();

        {
            let mut tasks = self.write_tasks();

            for source in &graph.sources {
                if tasks.contains_key(&source.id) {
                    continue;
                }
                let state = match self.take_pending_match(&source.description) {
                    Some(pending_id) => {
                        // The job outran the mint: the synthetic entry
                        // carries the task's real state, so the minted
                        // asset takes it over instead of starting fresh.
                        let state = tasks
                            .remove(&pending_id)
                            .unwrap_or_else(TaskState::open_request);
                        self.record_alias(&pending_id, &source.id);
                        info!("Minted asset {} takes over task {}", source.id, pending_id);
                        summary.adopted += 1;
                        state
                    }
                    None => {
                        summary.new_tasks += 1;
                        TaskState::open_request()
                    }
                };
                changed.push((source.id.clone(), state.clone()));
                tasks.insert(source.id.clone(), state);
            }

            for (parent_id, derived) in &graph.derived_by_parent {
                let Some(state) = tasks.get_mut(parent_id) else {
                    // Parent referenced by derived facts but absent from the
                    // fetched source set; nothing to attach to.
                    debug!("Derived facts reference unknown parent {}", parent_id);
                    continue;
                };
                if state.phase == TaskPhase::Complete || !state.derived_facts.is_empty() {
                    continue;
                }
                state.phase = TaskPhase::Complete;
                state.progress_percent = 100;
                state.error = None;
                state.derived_facts = derived.iter().map(|a| a.id.clone()).collect();
                if state.assigned_label.is_none() {
                    state.assigned_label = Some(self.labels.next());
                }
                summary.newly_completed += 1;
                changed.push((parent_id.clone(), state.clone()));
            }
        }

        match self.sources.write() {
            Ok(mut guard) => {
                for source in &graph.sources {
                    guard.insert(source.id.clone(), source.clone());
                }
            }
            Err(poisoned) => {
                warn!("Source cache lock was poisoned, recovering");
                let mut guard = poisoned.into_inner();
                for source in &graph.sources {
                    guard.insert(source.id.clone(), source.clone());
                }
            }
        }

        for (asset_id, state) in changed {
            self.emit(&asset_id, &state);
        }

        summary
    }
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}
