// libs/booking-cell/src/services/batch.rs
//
// Sequential batch-booking controller. One run processes its captured items
// strictly serially; the run state lives behind a mutex that is never held
// across an engine call. Every network step is bracketed by a generation
// stamp so an outcome that resolves after the operator closed the run (or
// re-drove it) is dropped instead of mutating fresher state.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use scheduling_cell::{SlotQuery, SlotSelectionService};
use shared_config::AppConfig;
use shared_database::EngineClient;
use worklist_cell::{
    derive_state, RowState, SharedOverlay, WorklistItem, WorklistKey, WorklistLocalState,
    services::WorklistService,
};

use crate::error::BookingError;
use crate::models::{
    BatchRunSnapshot, BatchSummary, BookingAttempt, BookingOutcome, HardNextConflict, OverridePayload,
    PauseReason, RunState,
};
use crate::services::negotiation::BookingNegotiationService;

// ==============================================================================
// COMPLETION CHANNEL
// ==============================================================================

/// The single channel by which a finished run's booked/skipped partition
/// reaches the rest of the system. Fired exactly once per run.
#[async_trait]
pub trait BatchNotifier: Send + Sync {
    async fn batch_completed(&self, summary: BatchSummary);
}

pub struct TracingBatchNotifier;

#[async_trait]
impl BatchNotifier for TracingBatchNotifier {
    async fn batch_completed(&self, summary: BatchSummary) {
        info!(
            "Batch run {} finished: {} booked, {} skipped",
            summary.run_id,
            summary.booked_keys.len(),
            summary.skipped_keys.len()
        );
    }
}

// ==============================================================================
// RUN STATE
// ==============================================================================

/// One batch run: an immutable-at-start item sequence, a forward-only
/// cursor, and the accumulating booked/skipped partition.
#[derive(Debug)]
pub struct BatchRun {
    run_id: Uuid,
    generation: u64,
    items: Vec<WorklistItem>,
    cursor: usize,
    booked_keys: BTreeSet<WorklistKey>,
    skipped_keys: BTreeSet<WorklistKey>,
    state: RunState,
    pause: Option<PauseReason>,
    summary_fired: bool,
    overlay: SharedOverlay,
}

impl BatchRun {
    pub fn new(items: Vec<WorklistItem>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            generation: 0,
            items,
            cursor: 0,
            booked_keys: BTreeSet::new(),
            skipped_keys: BTreeSet::new(),
            state: RunState::Idle,
            pause: None,
            summary_fired: false,
            overlay: SharedOverlay::new(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn overlay(&self) -> &SharedOverlay {
        &self.overlay
    }

    pub fn pause_reason(&self) -> Option<&PauseReason> {
        self.pause.as_ref()
    }

    pub fn current_item(&self) -> Option<&WorklistItem> {
        self.items.get(self.cursor)
    }

    pub fn start(&mut self) -> Result<(), BookingError> {
        if self.state != RunState::Idle {
            return Err(self.bad_transition(RunState::Running));
        }
        self.state = RunState::Running;
        Ok(())
    }

    /// Records the current item's resolution and moves the cursor forward.
    /// Returns the summary when this resolution exhausted the queue.
    pub fn advance_after(&mut self, key: WorklistKey, booked: bool) -> Option<BatchSummary> {
        if booked {
            self.booked_keys.insert(key);
        } else {
            self.skipped_keys.insert(key);
        }
        self.cursor += 1;

        if self.cursor >= self.items.len() {
            self.state = RunState::Completed;
            self.pause = None;
            return self.take_summary();
        }
        None
    }

    pub fn pause(&mut self, reason: PauseReason) {
        self.state = RunState::Paused;
        self.pause = Some(reason);
    }

    /// Operator-driven resumption. Bumps the generation so a driver still
    /// holding a pre-pause snapshot cannot apply its outcome.
    pub fn resume(&mut self) -> Result<(), BookingError> {
        if self.state != RunState::Paused {
            return Err(self.bad_transition(RunState::Running));
        }
        self.state = RunState::Running;
        self.pause = None;
        self.generation += 1;
        Ok(())
    }

    /// Completion for a run that started with an empty queue.
    pub fn complete(&mut self) -> Option<BatchSummary> {
        self.state = RunState::Completed;
        self.pause = None;
        self.take_summary()
    }

    /// Hard cancellation: every unresolved item (current and remaining)
    /// folds into the skipped set and the run becomes terminal.
    pub fn abort(&mut self) -> Option<BatchSummary> {
        for item in &self.items[self.cursor.min(self.items.len())..] {
            let key = item.key();
            if !self.booked_keys.contains(&key) {
                self.skipped_keys.insert(key);
            }
        }
        self.state = RunState::Aborted;
        self.pause = None;
        self.generation += 1;
        self.take_summary()
    }

    fn take_summary(&mut self) -> Option<BatchSummary> {
        if self.summary_fired {
            return None;
        }
        self.summary_fired = true;
        Some(BatchSummary {
            run_id: self.run_id,
            booked_keys: self.booked_keys.clone(),
            skipped_keys: self.skipped_keys.clone(),
        })
    }

    pub fn snapshot(&self) -> BatchRunSnapshot {
        BatchRunSnapshot {
            run_id: self.run_id,
            state: self.state,
            cursor: self.cursor,
            total_items: self.items.len(),
            booked_keys: self.booked_keys.clone(),
            skipped_keys: self.skipped_keys.clone(),
            pause: self.pause.clone(),
        }
    }

    fn bad_transition(&self, to: RunState) -> BookingError {
        BookingError::InvalidRunTransition {
            from: self.state.to_string(),
            to: to.to_string(),
        }
    }
}

// ==============================================================================
// REGISTRY
// ==============================================================================

type RunHandle = Arc<Mutex<BatchRun>>;

/// In-memory registry of batch runs, keyed by run id. Terminal runs stay
/// queryable until the process restarts.
#[derive(Clone, Default)]
pub struct BatchRegistry {
    runs: Arc<RwLock<HashMap<Uuid, RunHandle>>>,
}

impl BatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, run: BatchRun) -> (Uuid, RunHandle) {
        let run_id = run.run_id();
        let handle = Arc::new(Mutex::new(run));
        self.runs.write().await.insert(run_id, Arc::clone(&handle));
        (run_id, handle)
    }

    pub async fn get(&self, run_id: Uuid) -> Option<RunHandle> {
        self.runs.read().await.get(&run_id).cloned()
    }
}

// ==============================================================================
// CONTROLLER
// ==============================================================================

enum Resolution {
    Booked,
    Skipped,
    OverrideRequired { slot_id: Uuid, conflict: HardNextConflict },
    Failed { message: String, retryable: bool },
}

pub struct BatchController {
    worklist: WorklistService,
    slots: SlotSelectionService,
    negotiation: BookingNegotiationService,
    registry: BatchRegistry,
    notifier: Arc<dyn BatchNotifier>,
}

impl BatchController {
    pub fn new(config: &AppConfig, registry: BatchRegistry, notifier: Arc<dyn BatchNotifier>) -> Self {
        let engine = Arc::new(EngineClient::new(config));
        Self::with_engine(engine, registry, notifier)
    }

    pub fn with_engine(
        engine: Arc<EngineClient>,
        registry: BatchRegistry,
        notifier: Arc<dyn BatchNotifier>,
    ) -> Self {
        Self {
            worklist: WorklistService::with_engine(Arc::clone(&engine)),
            slots: SlotSelectionService::with_engine(Arc::clone(&engine)),
            negotiation: BookingNegotiationService::with_engine(engine),
            registry,
            notifier,
        }
    }

    /// Captures the run's item set from a fresh worklist fetch. Every
    /// requested key must resolve to an item whose derived state is READY;
    /// the set is fixed for the lifetime of the run.
    pub async fn start_batch(
        &self,
        keys: Vec<WorklistKey>,
        auth_token: &str,
    ) -> Result<Uuid, BookingError> {
        let fetched = self
            .worklist
            .fetch_worklist(None, auth_token)
            .await
            .map_err(|e| BookingError::EngineError(e.to_string()))?;

        let mut by_key: HashMap<WorklistKey, WorklistItem> =
            fetched.into_iter().map(|item| (item.key(), item)).collect();

        let fresh_overlay = WorklistLocalState::new();
        let mut items = Vec::with_capacity(keys.len());
        let mut seen = BTreeSet::new();

        for key in keys {
            if !seen.insert(key.clone()) {
                continue;
            }
            let item = by_key
                .remove(&key)
                .ok_or_else(|| BookingError::ItemNotEligible(format!("{} not in worklist", key)))?;
            if derive_state(&item, &fresh_overlay) != RowState::Ready {
                return Err(BookingError::ItemNotEligible(format!("{} is not ready", key)));
            }
            items.push(item);
        }

        if items.is_empty() {
            return Err(BookingError::ValidationError(
                "Batch run needs at least one item".to_string(),
            ));
        }

        let mut run = BatchRun::new(items);
        run.start()?;
        let (run_id, _) = self.registry.insert(run).await;

        info!("Batch run {} started", run_id);
        Ok(run_id)
    }

    /// Drives the run item by item until it pauses, terminates, or this
    /// driver's snapshot goes stale. The run lock is released around every
    /// engine call.
    #[instrument(skip(self, auth_token))]
    pub async fn drive(&self, run_id: Uuid, auth_token: &str) -> Result<(), BookingError> {
        let handle = self
            .registry
            .get(run_id)
            .await
            .ok_or(BookingError::RunNotFound(run_id))?;

        loop {
            let (generation, item, overlay) = {
                let mut run = handle.lock().await;
                if run.state() != RunState::Running {
                    return Ok(());
                }
                match run.current_item() {
                    Some(item) => (run.generation(), item.clone(), run.overlay().clone()),
                    None => {
                        let summary = run.complete();
                        drop(run);
                        self.fire(summary).await;
                        return Ok(());
                    }
                }
            };

            let resolution = self.resolve_item(&item, &overlay, auth_token).await;

            let (summary, paused) =
                match self.apply(&handle, generation, &item, resolution).await {
                    Some(applied) => applied,
                    None => {
                        debug!("Dropping stale outcome for run {}", run_id);
                        return Ok(());
                    }
                };

            self.fire(summary).await;
            if paused {
                return Ok(());
            }
            let finished = { handle.lock().await.state().is_terminal() };
            if finished {
                return Ok(());
            }
        }
    }

    /// Confirms the operator's override for the item the run paused on and
    /// retries the same slot before advancing. Gating happens here: an
    /// invalid payload is rejected with no attempt issued.
    pub async fn confirm_override(
        &self,
        run_id: Uuid,
        payload: OverridePayload,
        auth_token: &str,
    ) -> Result<(), BookingError> {
        payload.validate()?;

        let handle = self
            .registry
            .get(run_id)
            .await
            .ok_or(BookingError::RunNotFound(run_id))?;

        let (generation, item, slot_id, overlay) = {
            let mut run = handle.lock().await;
            let slot_id = match run.pause_reason() {
                Some(PauseReason::OverrideRequired { slot_id, .. }) => *slot_id,
                _ => {
                    return Err(BookingError::InvalidRunTransition {
                        from: run.state().to_string(),
                        to: RunState::Running.to_string(),
                    })
                }
            };
            run.resume()?;
            let item = run
                .current_item()
                .cloned()
                .ok_or_else(|| BookingError::MissingIdentifier("current item".to_string()))?;
            (run.generation(), item, slot_id, run.overlay().clone())
        };

        let attempt = BookingAttempt {
            patient_id: item.patient_id,
            episode_id: item.episode_id,
            step_code: item.step_code.clone(),
            pool: item.pool,
            slot_id,
        };

        let outcome = self
            .negotiation
            .attempt_booking(&attempt, Some(&payload), &overlay, auth_token)
            .await;

        let resolution = match outcome {
            BookingOutcome::Success { .. } => Resolution::Booked,
            BookingOutcome::SlotTaken => Resolution::Skipped,
            BookingOutcome::NeedsOverride { conflict } => {
                Resolution::OverrideRequired { slot_id, conflict }
            }
            BookingOutcome::Fatal { message, retryable } => {
                Resolution::Failed { message, retryable }
            }
        };

        let applied = self.apply(&handle, generation, &item, resolution).await;
        let (summary, paused) = match applied {
            Some(pair) => pair,
            None => return Ok(()),
        };

        self.fire(summary).await;
        if paused {
            return Ok(());
        }
        self.drive(run_id, auth_token).await
    }

    /// Re-resolves the current item after a failure pause, without losing
    /// queue position or committed results.
    pub async fn retry(&self, run_id: Uuid, auth_token: &str) -> Result<(), BookingError> {
        let handle = self
            .registry
            .get(run_id)
            .await
            .ok_or(BookingError::RunNotFound(run_id))?;

        {
            let mut run = handle.lock().await;
            if !matches!(run.pause_reason(), Some(PauseReason::Failure { .. })) {
                return Err(BookingError::InvalidRunTransition {
                    from: run.state().to_string(),
                    to: RunState::Running.to_string(),
                });
            }
            run.resume()?;
        }

        self.drive(run_id, auth_token).await
    }

    /// Skips the item the run paused on and continues with the rest.
    pub async fn skip(&self, run_id: Uuid, auth_token: &str) -> Result<(), BookingError> {
        let handle = self
            .registry
            .get(run_id)
            .await
            .ok_or(BookingError::RunNotFound(run_id))?;

        let summary = {
            let mut run = handle.lock().await;
            let key = run
                .current_item()
                .map(WorklistItem::key)
                .ok_or_else(|| BookingError::MissingIdentifier("current item".to_string()))?;
            run.resume()?;
            run.overlay().clear_needs_review(&key);
            run.advance_after(key, false)
        };

        if summary.is_some() {
            self.fire(summary).await;
            return Ok(());
        }
        self.drive(run_id, auth_token).await
    }

    /// Stops a paused run: remaining items fold into the skipped set.
    pub async fn stop(&self, run_id: Uuid) -> Result<(), BookingError> {
        let handle = self
            .registry
            .get(run_id)
            .await
            .ok_or(BookingError::RunNotFound(run_id))?;

        let summary = {
            let mut run = handle.lock().await;
            if run.state() != RunState::Paused {
                return Err(BookingError::InvalidRunTransition {
                    from: run.state().to_string(),
                    to: RunState::Aborted.to_string(),
                });
            }
            run.abort()
        };

        self.fire(summary).await;
        Ok(())
    }

    /// Operator closed the batch dialog mid-run. Hard cancellation: any
    /// outstanding engine call keeps running at the transport level, but its
    /// eventual outcome fails the generation check and is dropped.
    pub async fn close(&self, run_id: Uuid) -> Result<(), BookingError> {
        let handle = self
            .registry
            .get(run_id)
            .await
            .ok_or(BookingError::RunNotFound(run_id))?;

        let summary = {
            let mut run = handle.lock().await;
            if !matches!(run.state(), RunState::Running | RunState::Paused) {
                return Err(BookingError::InvalidRunTransition {
                    from: run.state().to_string(),
                    to: RunState::Aborted.to_string(),
                });
            }
            run.abort()
        };

        self.fire(summary).await;
        Ok(())
    }

    pub async fn snapshot(&self, run_id: Uuid) -> Result<BatchRunSnapshot, BookingError> {
        let handle = self
            .registry
            .get(run_id)
            .await
            .ok_or(BookingError::RunNotFound(run_id))?;
        let run = handle.lock().await;
        Ok(run.snapshot())
    }

    // --------------------------------------------------------------------------

    async fn resolve_item(
        &self,
        item: &WorklistItem,
        overlay: &SharedOverlay,
        auth_token: &str,
    ) -> Resolution {
        let query = SlotQuery {
            pool: item.pool,
            duration_minutes: item.duration_minutes,
            window_start: item.window_start,
            window_end: item.window_end,
            provider_id: None,
        };

        let days = match self.slots.query_slots(&query, auth_token).await {
            Ok(days) => days,
            Err(e) => {
                return Resolution::Failed {
                    message: e.to_string(),
                    retryable: true,
                }
            }
        };

        let slot = match days.first().and_then(|day| day.slots.first()) {
            Some(slot) => slot.clone(),
            None => {
                // No offerable slot in the window; re-attempted later from
                // the worklist, never a reason to pause the run.
                warn!("No slot available for {}, skipping", item.key());
                return Resolution::Skipped;
            }
        };

        let attempt = BookingAttempt {
            patient_id: item.patient_id,
            episode_id: item.episode_id,
            step_code: item.step_code.clone(),
            pool: item.pool,
            slot_id: slot.id,
        };

        match self
            .negotiation
            .attempt_booking(&attempt, None, overlay, auth_token)
            .await
        {
            BookingOutcome::Success { .. } => Resolution::Booked,
            BookingOutcome::SlotTaken => Resolution::Skipped,
            BookingOutcome::NeedsOverride { conflict } => Resolution::OverrideRequired {
                slot_id: slot.id,
                conflict,
            },
            BookingOutcome::Fatal { message, retryable } => {
                Resolution::Failed { message, retryable }
            }
        }
    }

    /// Applies a resolution under the lock, generation-checked. Returns None
    /// when the outcome went stale (run closed or re-driven meanwhile).
    async fn apply(
        &self,
        handle: &RunHandle,
        generation: u64,
        item: &WorklistItem,
        resolution: Resolution,
    ) -> Option<(Option<BatchSummary>, bool)> {
        let mut run = handle.lock().await;
        if run.generation() != generation || run.state() != RunState::Running {
            return None;
        }

        Some(match resolution {
            Resolution::Booked => (run.advance_after(item.key(), true), false),
            Resolution::Skipped => (run.advance_after(item.key(), false), false),
            Resolution::OverrideRequired { slot_id, conflict } => {
                run.pause(PauseReason::OverrideRequired {
                    key: item.key(),
                    slot_id,
                    conflict,
                });
                (None, true)
            }
            Resolution::Failed { message, retryable } => {
                run.pause(PauseReason::Failure { message, retryable });
                (None, true)
            }
        })
    }

    async fn fire(&self, summary: Option<BatchSummary>) {
        if let Some(summary) = summary {
            self.notifier.batch_completed(summary).await;
        }
    }
}
