//! JSON snapshot persistence for plans.
//!
//! One snapshot file per plan, written atomically (temp file + rename) under
//! a configured directory. Auto-save subscribes to store events and coalesces
//! bursts of mutations into a single debounced write per plan; [`flush`]
//! performs the pending writes immediately before shutdown.
//!
//! [`flush`]: ProgressPersistence::flush

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use jiff::Timestamp;
use tokio::fs;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{ProgressError, Result};
use crate::models::Plan;
use crate::params::{CreateTask, UpdateTask};
use crate::store::{ListenerId, ProgressStore};

/// Snapshots older than this are eligible for [`ProgressPersistence::cleanup`].
pub const DEFAULT_MAX_SNAPSHOT_AGE: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Persistence configuration.
#[derive(Debug, Clone)]
pub struct PersistenceConfig {
    /// Enable/disable persistence entirely.
    pub enabled: bool,
    /// Directory for snapshot files, relative to the persistence root.
    pub directory: PathBuf,
    /// Auto-save on store mutations.
    pub auto_save: bool,
    /// Debounce delay for auto-save, in milliseconds.
    pub auto_save_delay_ms: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: PathBuf::from(".compass/progress"),
            auto_save: true,
            auto_save_delay_ms: 1000,
        }
    }
}

/// A scheduled debounced save. The timer task checks `seq` before writing so
/// a stale timer never removes an entry that was rescheduled after it fired.
struct PendingSave {
    seq: u64,
    plan: Plan,
    // Filled in after the timer task is spawned; `None` for an entry whose
    // timer has not been attached yet or whose flush attempt failed.
    timer: Option<JoinHandle<()>>,
}

impl PendingSave {
    fn abort_timer(&self) {
        if let Some(timer) = &self.timer {
            timer.abort();
        }
    }
}

struct AutoSaveState {
    listener: ListenerId,
    forwarder: JoinHandle<()>,
}

/// Snapshot persistence manager: save, debounced auto-save, restore, and
/// snapshot housekeeping.
pub struct ProgressPersistence {
    root: PathBuf,
    config: PersistenceConfig,
    pending: Mutex<HashMap<String, PendingSave>>,
    next_seq: AtomicU64,
    auto_save: Mutex<Option<AutoSaveState>>,
}

impl std::fmt::Debug for ProgressPersistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressPersistence")
            .field("root", &self.root)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ProgressPersistence {
    /// Creates a persistence manager rooted at `root`.
    pub fn new(root: impl Into<PathBuf>, config: PersistenceConfig) -> Self {
        Self {
            root: root.into(),
            config,
            pending: Mutex::new(HashMap::new()),
            next_seq: AtomicU64::new(0),
            auto_save: Mutex::new(None),
        }
    }

    /// The directory snapshot files live in.
    pub fn progress_dir(&self) -> PathBuf {
        self.root.join(&self.config.directory)
    }

    fn file_path(&self, plan_id: &str) -> PathBuf {
        self.progress_dir().join(format!("{plan_id}.json"))
    }

    fn pending_lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, PendingSave>> {
        // Lock poisoning would mean a panic while holding the map; the map
        // only holds snapshots, so continuing with it is safe.
        match self.pending.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn auto_save_lock(&self) -> std::sync::MutexGuard<'_, Option<AutoSaveState>> {
        match self.auto_save.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    // ----- Saving ----------------------------------------------------------

    /// Writes a plan snapshot to disk, atomically at the file level.
    pub async fn save(&self, plan: &Plan) -> Result<()> {
        if !self.config.enabled {
            return Ok(());
        }

        let dir = self.progress_dir();
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| ProgressError::file_system(&dir, e))?;

        let bytes = serde_json::to_vec_pretty(plan)?;
        let path = self.file_path(&plan.plan_id);
        let tmp = dir.join(format!("{}.json.tmp", plan.plan_id));

        fs::write(&tmp, &bytes)
            .await
            .map_err(|e| ProgressError::file_system(&tmp, e))?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|e| ProgressError::file_system(&path, e))?;

        log::debug!("saved plan {} ({} bytes)", plan.plan_id, bytes.len());
        Ok(())
    }

    /// Schedules a debounced save of the given snapshot. A later call for the
    /// same plan cancels the pending timer and reschedules with the newer
    /// snapshot, so only the last state in the window hits the disk.
    pub fn save_debounced(self: &Arc<Self>, plan: Plan) {
        if !self.config.enabled || !self.config.auto_save {
            return;
        }

        let plan_id = plan.plan_id.clone();
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let delay = Duration::from_millis(self.config.auto_save_delay_ms);

        // The entry goes in before the timer task exists, so a timer that
        // fires immediately (zero delay) always finds it.
        {
            let mut pending = self.pending_lock();
            let entry = PendingSave { seq, plan, timer: None };
            if let Some(previous) = pending.insert(plan_id.clone(), entry) {
                previous.abort_timer();
            }
        }

        let this = Arc::clone(self);
        let timer_plan_id = plan_id.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            // Only consume the entry if it is still ours.
            let snapshot = {
                let mut pending = this.pending_lock();
                match pending.get(&timer_plan_id) {
                    Some(entry) if entry.seq == seq => {
                        pending.remove(&timer_plan_id).map(|e| e.plan)
                    }
                    _ => None,
                }
            };

            if let Some(plan) = snapshot {
                if let Err(err) = this.save(&plan).await {
                    log::error!("debounced save of plan {timer_plan_id} failed: {err}");
                }
            }
        });

        let mut pending = self.pending_lock();
        match pending.get_mut(&plan_id) {
            // Attach the timer only if the entry is still ours.
            Some(entry) if entry.seq == seq => entry.timer = Some(timer),
            // Consumed or superseded in the meantime; the timer has nothing
            // left to do.
            _ => timer.abort(),
        }
    }

    /// Performs all pending debounced saves immediately, bypassing their
    /// timers. Call before shutdown for a durability guarantee.
    ///
    /// Every pending snapshot is attempted even if one fails; failed entries
    /// are put back so a retried flush can still write them. The first error
    /// is returned after all attempts.
    pub async fn flush(&self) -> Result<()> {
        let drained: Vec<(String, PendingSave)> = {
            let mut pending = self.pending_lock();
            pending.drain().collect()
        };

        let mut first_error = None;
        for (plan_id, mut entry) in drained {
            entry.abort_timer();
            entry.timer = None;
            if let Err(err) = self.save(&entry.plan).await {
                log::error!("flush of plan {plan_id} failed: {err}");
                // Keep a newer snapshot if one was scheduled meanwhile.
                self.pending_lock().entry(plan_id).or_insert(entry);
                first_error.get_or_insert(err);
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    // ----- Loading & restore -----------------------------------------------

    /// Loads a plan snapshot from disk. Missing files and snapshots that fail
    /// structural validation yield `Ok(None)`; the latter are logged.
    pub async fn load(&self, plan_id: &str) -> Result<Option<Plan>> {
        if !self.config.enabled {
            return Ok(None);
        }

        let path = self.file_path(plan_id);
        let content = match fs::read(&path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(ProgressError::file_system(&path, err)),
        };

        let plan: Plan = match serde_json::from_slice(&content) {
            Ok(plan) => plan,
            Err(err) => {
                log::warn!("ignoring unparseable snapshot {}: {err}", path.display());
                return Ok(None);
            }
        };

        if plan.plan_id.is_empty() || plan.goal.is_empty() {
            log::warn!("ignoring invalid snapshot {}", path.display());
            return Ok(None);
        }

        Ok(Some(plan))
    }

    /// Restores a snapshot into the store by replaying it through the store's
    /// normal operations, so blocked/pending state and unblock propagation are
    /// re-derived rather than trusted from the file. The restored plan gets
    /// fresh plan and task ids; dependency, evidence, and decision references
    /// are remapped to the new task ids once every task has been recreated,
    /// so a dependency may name a task that appears later in the snapshot.
    /// Returns the restored plan.
    pub async fn restore(
        &self,
        store: &mut ProgressStore,
        plan_id: &str,
    ) -> Result<Option<Plan>> {
        let Some(snapshot) = self.load(plan_id).await? else {
            return Ok(None);
        };

        if store.has_plan(plan_id) {
            store.delete_plan(plan_id);
        }

        let new_plan = store.create_plan(snapshot.goal.clone(), snapshot.strategic_plan.clone());
        let new_plan_id = new_plan.plan_id;

        // Old task id -> new task id, for remapping references.
        let mut id_map: HashMap<String, String> = HashMap::new();

        // First recreate every task, carrying the snapshot's dependency ids
        // as-is. The map is only complete once all tasks exist, so a
        // dependency on a task listed later in the snapshot still resolves.
        for task in &snapshot.tasks {
            let mut params = CreateTask::new(&task.description)
                .with_dependencies(task.dependencies.clone())
                .with_priority(task.priority)
                .with_max_retries(task.max_retries);
            if let Some(agent) = &task.assigned_agent {
                params = params.with_assigned_agent(agent);
            }

            let Some(created) = store.add_task(&new_plan_id, &params) else {
                continue;
            };
            id_map.insert(task.id.clone(), created.id.clone());
        }

        // Then rewrite dependencies through the complete map and force each
        // task into its snapshot status.
        store.remap_dependencies(&new_plan_id, &id_map);
        for task in &snapshot.tasks {
            let Some(new_id) = id_map.get(&task.id) else {
                continue;
            };
            let _ = store.update_task(
                &new_plan_id,
                new_id,
                &UpdateTask {
                    status: Some(task.status),
                    result: task.result.clone(),
                    ..UpdateTask::default()
                },
            );
        }

        for evidence in &snapshot.evidence {
            let task_id = id_map
                .get(&evidence.task_id)
                .cloned()
                .unwrap_or_else(|| evidence.task_id.clone());
            let restored = store.add_evidence(
                &new_plan_id,
                &task_id,
                evidence.kind,
                evidence.content.clone(),
                evidence.significance,
            );
            if evidence.processed {
                if let Some(restored) = restored {
                    store.mark_evidence_processed(&new_plan_id, &[restored.id]);
                }
            }
        }

        for decision in &snapshot.decisions {
            let related: Vec<String> = decision
                .related_task_ids
                .iter()
                .map(|id| id_map.get(id).cloned().unwrap_or_else(|| id.clone()))
                .collect();
            let _ = store.log_decision(
                &new_plan_id,
                decision.kind,
                decision.decision.clone(),
                decision.rationale.clone(),
                decision.actor,
                related,
            );
        }

        let _ = store.update_plan_status(&new_plan_id, snapshot.status);

        log::info!(
            "restored plan {plan_id} as {new_plan_id} ({} tasks)",
            snapshot.tasks.len()
        );
        Ok(store.plan(&new_plan_id).cloned())
    }

    // ----- Housekeeping ----------------------------------------------------

    /// Deletes a plan's snapshot file, along with any pending debounced save.
    /// Returns whether a file was removed.
    pub async fn delete(&self, plan_id: &str) -> Result<bool> {
        if !self.config.enabled {
            return Ok(false);
        }

        if let Some(entry) = self.pending_lock().remove(plan_id) {
            entry.abort_timer();
        }

        let path = self.file_path(plan_id);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(ProgressError::file_system(&path, err)),
        }
    }

    /// Lists the plan ids with a snapshot on disk.
    pub async fn list_persisted_plans(&self) -> Result<Vec<String>> {
        if !self.config.enabled {
            return Ok(Vec::new());
        }

        let dir = self.progress_dir();
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(ProgressError::file_system(&dir, err)),
        };

        let mut plan_ids = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ProgressError::file_system(&dir, e))?
        {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(plan_id) = name.strip_suffix(".json") {
                plan_ids.push(plan_id.to_string());
            }
        }

        plan_ids.sort();
        Ok(plan_ids)
    }

    /// Deletes snapshots that are older than `max_age` or belong to a plan
    /// that already reached a terminal status. Returns the number removed.
    pub async fn cleanup(&self, max_age: Duration) -> Result<usize> {
        if !self.config.enabled {
            return Ok(0);
        }

        let now = Timestamp::now().as_millisecond();
        let max_age_ms = max_age.as_millis() as i64;
        let mut deleted = 0;

        for plan_id in self.list_persisted_plans().await? {
            let Some(plan) = self.load(&plan_id).await? else {
                continue;
            };

            let age_ms = now - plan.updated_at.as_millisecond();
            if age_ms > max_age_ms || plan.status.is_terminal() {
                self.delete(&plan_id).await?;
                deleted += 1;
            }
        }

        Ok(deleted)
    }

    // ----- Auto-save -------------------------------------------------------

    /// Subscribes to store events and schedules a debounced save whenever a
    /// task, evidence, or decision mutation lands. Idempotent.
    ///
    /// The store listener only forwards the plan id over a channel; the
    /// actual snapshot is taken by a background task that re-locks the store,
    /// so listeners never re-enter the store mid-mutation.
    pub async fn enable_auto_save(
        self: &Arc<Self>,
        store: &Arc<tokio::sync::Mutex<ProgressStore>>,
    ) {
        if !self.config.enabled || !self.config.auto_save {
            return;
        }
        if self.auto_save_lock().is_some() {
            return;
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<String>();

        let listener = {
            let mut guard = store.lock().await;
            guard.subscribe(Box::new(move |event| {
                if event.kind.triggers_auto_save() {
                    let _ = tx.send(event.plan_id.clone());
                }
            }))
        };

        let this = Arc::clone(self);
        let store_handle = Arc::clone(store);
        let forwarder = tokio::spawn(async move {
            while let Some(plan_id) = rx.recv().await {
                let plan = {
                    let guard = store_handle.lock().await;
                    guard.plan(&plan_id).cloned()
                };
                if let Some(plan) = plan {
                    this.save_debounced(plan);
                }
            }
        });

        *self.auto_save_lock() = Some(AutoSaveState {
            listener,
            forwarder,
        });
    }

    /// Unsubscribes from store events and discards pending debounced saves
    /// without writing them. Use [`Self::flush`] first if durability matters.
    pub async fn disable_auto_save(&self, store: &Arc<tokio::sync::Mutex<ProgressStore>>) {
        let state = self.auto_save_lock().take();

        if let Some(state) = state {
            state.forwarder.abort();
            let mut guard = store.lock().await;
            guard.unsubscribe(state.listener);
        }

        let mut pending = self.pending_lock();
        for (_, entry) in pending.drain() {
            entry.abort_timer();
        }
    }
}
