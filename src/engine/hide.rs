//! Debounced hide timer
//!
//! Each release schedules a one-shot sleeper that posts `HideElapsed`
//! back into the engine channel. A press cancels every outstanding
//! sleeper before any new work; this cancel-all discipline is what
//! prevents a stale timer from clearing text that belongs to a newer
//! combination.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::debug;

use super::machine::EngineMsg;

/// Cancellable one-shot hide timers
pub struct HideScheduler {
    msg_tx: mpsc::Sender<EngineMsg>,
    pending: Vec<AbortHandle>,
    generation: u64,
}

impl HideScheduler {
    pub fn new(msg_tx: mpsc::Sender<EngineMsg>) -> Self {
        Self {
            msg_tx,
            pending: Vec::new(),
            generation: 0,
        }
    }

    /// Schedule a clear after `delay`. Outstanding timers are expected
    /// to have been cancelled already by the caller.
    pub fn schedule(&mut self, delay: Duration) {
        let msg_tx = self.msg_tx.clone();
        let generation = self.generation;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = msg_tx.send(EngineMsg::HideElapsed { generation }).await;
        });
        self.pending.push(handle.abort_handle());
    }

    /// Cancel every outstanding timer and invalidate any already-fired
    /// message still sitting in the engine channel.
    ///
    /// Aborting a finished or already-aborted task is a no-op, so this
    /// is safe to call at any point.
    pub fn cancel_all(&mut self) {
        if !self.pending.is_empty() {
            debug!(count = self.pending.len(), "cancelling pending hide timers");
        }
        for handle in self.pending.drain(..) {
            handle.abort();
        }
        self.generation = self.generation.wrapping_add(1);
    }

    /// Whether a fired timer message belongs to the current generation
    pub fn is_current(&self, generation: u64) -> bool {
        generation == self.generation
    }
}
