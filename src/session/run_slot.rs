// Run slot: the single active refinement run, as seen by the UI
//
// Each submission spawns the loop as a tokio task and bumps a generation
// counter. Every update from a task is applied only if its generation is
// still current, so an abandoned run can never overwrite a newer one.

use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinHandle};
use uuid::Uuid;

use crate::refine::{BusyPolicy, ConversationResult, RefineError, RefineLoop, RunPhase};

/// Observable state of the slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSnapshot {
    pub is_running: bool,
    pub phase: RunPhase,
    /// Id of the run this snapshot describes (active or most recent)
    pub run_id: Option<Uuid>,
    /// Last successful result; kept across later failures
    pub result: Option<Arc<ConversationResult>>,
    /// Human-readable message from the last failure
    pub error: Option<String>,
    /// Stable label for `error` (see `RefineError::kind`)
    pub error_kind: Option<String>,
}

impl Default for RunSnapshot {
    fn default() -> Self {
        Self {
            is_running: false,
            phase: RunPhase::Idle,
            run_id: None,
            result: None,
            error: None,
            error_kind: None,
        }
    }
}

/// Handle returned by a successful submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunTicket {
    pub run_id: Uuid,
    pub generation: u64,
}

struct ActiveRun {
    run_id: Uuid,
    /// Supervisor that publishes the outcome
    handle: JoinHandle<()>,
    /// The loop itself, spawned separately so a panic surfaces as a `JoinError`
    run: AbortHandle,
}

impl ActiveRun {
    fn abort(&self) {
        self.run.abort();
        self.handle.abort();
    }
}

#[derive(Default)]
struct SlotState {
    generation: u64,
    active: Option<ActiveRun>,
}

/// At most one in-flight run, plus the last outcome.
#[derive(Clone)]
pub struct RunSlot {
    refine: Arc<RefineLoop>,
    state: Arc<Mutex<SlotState>>,
    snapshot_tx: Arc<watch::Sender<RunSnapshot>>,
}

impl RunSlot {
    pub fn new(refine: RefineLoop) -> Self {
        let (snapshot_tx, _) = watch::channel(RunSnapshot::default());
        Self {
            refine: Arc::new(refine),
            state: Arc::new(Mutex::new(SlotState::default())),
            snapshot_tx: Arc::new(snapshot_tx),
        }
    }

    pub fn refine_loop(&self) -> &RefineLoop {
        &self.refine
    }

    /// Start a run for `prompt`.
    ///
    /// Invalid prompts are rejected here, before any task is spawned. A
    /// submission while a run is active follows the configured busy policy.
    /// Must be called from within a tokio runtime.
    pub fn submit(&self, prompt: &str) -> Result<RunTicket, RefineError> {
        let prompt = self.refine.validate_prompt(prompt)?;
        let mut state = self.lock();

        if let Some(active) = state.active.as_ref().filter(|a| !a.handle.is_finished()) {
            match self.refine.config().busy_policy {
                BusyPolicy::Reject => {
                    tracing::warn!(active_run = %active.run_id, "Submission rejected: run in progress");
                    return Err(RefineError::RunInProgress);
                }
                BusyPolicy::Replace => {
                    tracing::info!(active_run = %active.run_id, "Replacing active run");
                    active.abort();
                }
            }
        }

        state.generation += 1;
        let generation = state.generation;
        let run_id = Uuid::new_v4();

        self.snapshot_tx.send_modify(|snap| {
            snap.is_running = true;
            snap.phase = RunPhase::Enhancing;
            snap.run_id = Some(run_id);
            snap.error = None;
            snap.error_kind = None;
        });

        let runner = self.clone();
        let run = tokio::spawn(async move {
            let observe = |phase: RunPhase| runner.publish_phase(generation, phase);
            runner.refine.run_observed(&prompt, &observe).await
        });
        let run_abort = run.abort_handle();

        let slot = self.clone();
        let handle = tokio::spawn(async move {
            let outcome = match run.await {
                Ok(outcome) => outcome,
                Err(e) if e.is_panic() => {
                    tracing::error!(%run_id, "Run task panicked");
                    Err(RefineError::Internal("run task panicked".into()))
                }
                // Aborted by cancel or replace; the slot has already moved on
                Err(_) => return,
            };
            slot.finish(generation, outcome);
        });

        state.active = Some(ActiveRun {
            run_id,
            handle,
            run: run_abort,
        });
        tracing::debug!(%run_id, generation, "Run submitted");

        Ok(RunTicket { run_id, generation })
    }

    /// Abandon the active run, if any. Returns whether one was running.
    ///
    /// The previous successful result is kept.
    pub fn cancel(&self) -> bool {
        let mut state = self.lock();
        let Some(active) = state.active.take() else {
            return false;
        };
        if active.handle.is_finished() {
            return false;
        }

        active.abort();
        state.generation += 1;
        let err = RefineError::Cancelled;
        self.snapshot_tx.send_modify(|snap| {
            snap.is_running = false;
            snap.phase = RunPhase::Idle;
            snap.error = Some(err.to_string());
            snap.error_kind = Some(err.kind().to_string());
        });
        tracing::info!(run_id = %active.run_id, "Run cancelled");
        true
    }

    pub fn snapshot(&self) -> RunSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    /// Receive every snapshot change.
    pub fn subscribe(&self) -> watch::Receiver<RunSnapshot> {
        self.snapshot_tx.subscribe()
    }

    fn publish_phase(&self, generation: u64, phase: RunPhase) {
        let state = self.lock();
        if state.generation != generation {
            return;
        }
        // Terminal phases are published together with the outcome in `finish`
        if phase.is_terminal() {
            return;
        }
        self.snapshot_tx.send_modify(|snap| snap.phase = phase);
    }

    fn finish(&self, generation: u64, outcome: Result<ConversationResult, RefineError>) {
        let mut state = self.lock();
        if state.generation != generation {
            tracing::debug!(generation, "Discarding outcome of superseded run");
            return;
        }
        state.active = None;

        self.snapshot_tx.send_modify(|snap| {
            snap.is_running = false;
            match outcome {
                Ok(result) => {
                    snap.phase = RunPhase::Done;
                    snap.result = Some(Arc::new(result));
                    snap.error = None;
                    snap.error_kind = None;
                }
                Err(e) => {
                    snap.phase = RunPhase::Failed;
                    snap.error = Some(e.to_string());
                    snap.error_kind = Some(e.kind().to_string());
                }
            }
        });
    }

    fn lock(&self) -> MutexGuard<'_, SlotState> {
        // State stays consistent across a panicking holder; recover the guard
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
