//! # Pause / Cancellation Controller
//!
//! Oggetto esplicito (niente globali) che possiede lo stato condiviso tra i task:
//! flag di pausa e registro di cancellazione, protetti dallo stesso mutex.
//!
//! ## Invarianti:
//! - Al massimo una entry viva per id: è il meccanismo di deduplica della submission
//! - L'entry esiste esattamente finché il task è in volo; la rimozione avviene nel
//!   `Drop` di [`Registration`], quindi su ogni percorso di uscita
//! - Ogni operazione che modifica lo stato (resume, cancel, cancel_all, shutdown)
//!   sveglia **tutti** i task in attesa sul gate di pausa; ognuno ricontrolla
//!   pausa e cancellazione dopo ogni risveglio

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug)]
struct Entry {
    serial: u64,
    token: CancellationToken,
}

#[derive(Debug, Default)]
struct State {
    paused: bool,
    registry: HashMap<String, Entry>,
    next_serial: u64,
}

/// Shared pause flag plus per-job cancellation registry
#[derive(Debug, Default)]
pub struct JobController {
    state: Mutex<State>,
    wake: Notify,
    root: CancellationToken,
}

impl JobController {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `id` as in flight. Returns `None` if a live entry already exists.
    pub fn register(self: &Arc<Self>, id: &str) -> Option<Registration> {
        let mut state = self.lock();
        if state.registry.contains_key(id) {
            debug!("Job already in flight, skipping: {}", id);
            return None;
        }

        let serial = state.next_serial;
        state.next_serial += 1;
        let token = self.root.child_token();
        state.registry.insert(
            id.to_string(),
            Entry {
                serial,
                token: token.clone(),
            },
        );

        Some(Registration {
            controller: Arc::clone(self),
            id: id.to_string(),
            serial,
            token,
        })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().registry.contains_key(id)
    }

    /// Number of jobs currently in flight
    pub fn in_flight(&self) -> usize {
        self.lock().registry.len()
    }

    pub fn is_paused(&self) -> bool {
        self.lock().paused
    }

    /// Returns true if the queue was running
    pub fn pause(&self) -> bool {
        let mut state = self.lock();
        let changed = !state.paused;
        state.paused = true;
        if changed {
            info!("⏸️ Queue paused");
        }
        changed
    }

    /// Returns true if the queue was paused
    pub fn resume(&self) -> bool {
        let changed = {
            let mut state = self.lock();
            let changed = state.paused;
            state.paused = false;
            changed
        };
        if changed {
            info!("▶️ Queue resumed");
        }
        self.wake.notify_waiters();
        changed
    }

    /// Cancel one job. Returns false if `id` is not in flight.
    pub fn cancel(&self, id: &str) -> bool {
        // Tokens fire under the lock: once a job has left the registry its token is final
        let found = match self.lock().registry.remove(id) {
            Some(entry) => {
                entry.token.cancel();
                true
            }
            None => false,
        };
        if found {
            info!("🛑 Cancelling {}", id);
        } else {
            debug!("Cancel requested for unknown job: {}", id);
        }
        // Tasks blocked on pause must observe their own cancellation
        self.wake.notify_waiters();
        found
    }

    /// Cancel every job currently in flight; returns how many were cancelled
    pub fn cancel_all(&self) -> usize {
        let count = {
            let mut state = self.lock();
            let count = state.registry.len();
            for (_, entry) in state.registry.drain() {
                entry.token.cancel();
            }
            count
        };
        if count > 0 {
            info!("🛑 Cancelled {} jobs", count);
        }
        self.wake.notify_waiters();
        count
    }

    /// Cancel everything, including jobs registered from now on
    pub fn shutdown(&self) {
        {
            let _state = self.lock();
            self.root.cancel();
        }
        self.cancel_all();
    }

    /// Block while the queue is paused. Returns false if `token` was cancelled.
    pub async fn wait_gate(&self, token: &CancellationToken) -> bool {
        loop {
            let notified = self.wake.notified();
            tokio::pin!(notified);
            // Register interest before checking so a wake between check and await is not lost
            notified.as_mut().enable();

            {
                let state = self.lock();
                if token.is_cancelled() {
                    return false;
                }
                if !state.paused {
                    return true;
                }
            }

            notified.await;
        }
    }
}

/// In-flight marker for one job; dropping it unregisters the job
#[derive(Debug)]
pub struct Registration {
    controller: Arc<JobController>,
    id: String,
    serial: u64,
    token: CancellationToken,
}

impl Registration {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        let mut state = self.controller.lock();
        // A cancelled id may already belong to a newer submission
        if state
            .registry
            .get(&self.id)
            .is_some_and(|entry| entry.serial == self.serial)
        {
            state.registry.remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready, task};

    #[test]
    fn test_register_deduplicates() {
        let controller = Arc::new(JobController::new());
        let first = controller.register("/v/a.mov").unwrap();
        assert!(controller.register("/v/a.mov").is_none());
        assert!(controller.contains("/v/a.mov"));

        drop(first);
        assert!(!controller.contains("/v/a.mov"));
        assert!(controller.register("/v/a.mov").is_some());
    }

    #[test]
    fn test_stale_registration_keeps_newer_entry() {
        let controller = Arc::new(JobController::new());
        let old = controller.register("/v/a.mov").unwrap();
        assert!(controller.cancel("/v/a.mov"));
        assert!(old.is_cancelled());

        let new = controller.register("/v/a.mov").unwrap();
        drop(old);
        assert!(controller.contains("/v/a.mov"));
        assert!(!new.is_cancelled());
    }

    #[tokio::test]
    async fn test_gate_open_when_running() {
        let controller = Arc::new(JobController::new());
        let job = controller.register("a").unwrap();
        assert!(controller.wait_gate(job.token()).await);
    }

    #[tokio::test]
    async fn test_resume_releases_paused_waiters() {
        let controller = Arc::new(JobController::new());
        let job = controller.register("a").unwrap();
        assert!(controller.pause());
        assert!(!controller.pause());

        let mut gate = task::spawn(controller.wait_gate(job.token()));
        assert_pending!(gate.poll());

        assert!(controller.resume());
        assert!(gate.is_woken());
        assert!(assert_ready!(gate.poll()));
    }

    #[tokio::test]
    async fn test_cancel_while_paused_exits_gate() {
        let controller = Arc::new(JobController::new());
        let job = controller.register("a").unwrap();
        controller.pause();

        let mut gate = task::spawn(controller.wait_gate(job.token()));
        assert_pending!(gate.poll());

        assert!(controller.cancel("a"));
        assert!(gate.is_woken());
        assert!(!assert_ready!(gate.poll()));
        assert!(!controller.contains("a"));
        assert!(controller.is_paused());
    }

    #[tokio::test]
    async fn test_other_cancellation_wakes_but_keeps_waiting() {
        let controller = Arc::new(JobController::new());
        let a = controller.register("a").unwrap();
        let b = controller.register("b").unwrap();
        controller.pause();

        let mut gate_a = task::spawn(controller.wait_gate(a.token()));
        let mut gate_b = task::spawn(controller.wait_gate(b.token()));
        assert_pending!(gate_a.poll());
        assert_pending!(gate_b.poll());

        controller.cancel("a");
        assert!(gate_b.is_woken());
        assert_pending!(gate_b.poll());
        assert!(!assert_ready!(gate_a.poll()));

        controller.resume();
        assert!(assert_ready!(gate_b.poll()));
    }

    #[tokio::test]
    async fn test_cancel_all_and_shutdown() {
        let controller = Arc::new(JobController::new());
        let a = controller.register("a").unwrap();
        let b = controller.register("b").unwrap();

        assert_eq!(controller.cancel_all(), 2);
        assert!(a.is_cancelled() && b.is_cancelled());
        assert_eq!(controller.in_flight(), 0);

        let c = controller.register("c").unwrap();
        assert!(!c.is_cancelled());
        controller.shutdown();
        assert!(c.is_cancelled());

        // Jobs registered after shutdown start cancelled
        let d = controller.register("d").unwrap();
        assert!(!controller.wait_gate(d.token()).await);
    }

    #[test]
    fn test_cancel_unknown_job() {
        let controller = JobController::new();
        assert!(!controller.cancel("missing"));
    }
}
