//! Keeps a running session's elapsed time honest across suspension.
//!
//! While the host is suspended nothing ticks. On suspend the live session is
//! written out with a wall-clock marker; on resume the wall-clock delta since
//! that marker is added back. The persisted copy is authoritative only right
//! after a reconciliation; the rest of the time the in-memory session is.

pub mod worker;

use anyhow::Result;
use std::sync::Arc;

use crate::{
    clock::Clock,
    persistence::{PersistedSessionState, SessionStore},
    timer::TimerSession,
};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_warn};

pub use worker::{TickWorker, WorkerCommand, WorkerTick};

/// Abstract visibility signal: `Suspend` when the host hides or freezes the
/// app, `Resume` when it becomes visible again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleSignal {
    Suspend,
    Resume,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub state: PersistedSessionState,
    pub drift_seconds: u64,
}

#[derive(Clone)]
pub struct ContinuityService {
    store: SessionStore,
    clock: Arc<dyn Clock>,
}

impl ContinuityService {
    pub fn new(store: SessionStore, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Persist the live session stamped with the current wall-clock time.
    pub async fn checkpoint(&self, session: &TimerSession, pomodoro_count: u32) -> Result<()> {
        let state = PersistedSessionState {
            session: session.clone(),
            pomodoro_count,
            last_update_epoch_ms: self.clock.epoch_ms(),
        };
        self.store.save(&state).await
    }

    /// Load the persisted session and fold in the whole seconds that passed
    /// since it was written. Returns `None` when there is no usable session.
    ///
    /// The sub-second remainder stays on the marker, so reconciling twice in
    /// a row never counts the same window twice.
    pub async fn reconcile(&self) -> Option<Reconciled> {
        let mut state = self.store.load().await?;
        if !state.session.is_running {
            return Some(Reconciled {
                state,
                drift_seconds: 0,
            });
        }

        let now_ms = self.clock.epoch_ms();
        let delta_ms = now_ms - state.last_update_epoch_ms;
        let drift_seconds = if delta_ms < 0 {
            log_warn!("Clock moved backwards by {}ms; ignoring drift", -delta_ms);
            state.last_update_epoch_ms = now_ms;
            0
        } else {
            let drift = (delta_ms / 1000) as u64;
            state.last_update_epoch_ms += drift as i64 * 1000;
            drift
        };

        state.session.elapsed_seconds = state.session.elapsed_seconds.saturating_add(drift_seconds);
        log_debug!(
            "Reconciled session: +{}s drift, elapsed now {}s",
            drift_seconds,
            state.session.elapsed_seconds
        );

        if let Err(err) = self.store.save(&state).await {
            log_error!("Failed to persist reconciled session: {err:#}");
        }

        Some(Reconciled {
            state,
            drift_seconds,
        })
    }

    pub async fn clear(&self) {
        if let Err(err) = self.store.clear().await {
            log_error!("Failed to clear persisted session: {err:#}");
        }
    }
}
