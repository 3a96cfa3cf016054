//! Admission control for extraction calls.
//!
//! A [`RequestQueue`] lets at most `limit` tasks hold a [`Slot`] at once.
//! Everyone else waits in arrival order behind a [`Ticket`] that can report
//! its 1-based position while it waits. A slot is handed straight to the
//! next waiter when it is dropped, so capacity is never briefly free while
//! someone is queued, and a task that fails or panics still releases it.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{oneshot, watch};
use tracing::debug;
use uuid::Uuid;

/// Concurrent extraction calls allowed per queue unless configured otherwise.
pub const DEFAULT_CONCURRENCY: usize = 2;

/// Snapshot of a queue's occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueStats {
    pub active: usize,
    pub queued: usize,
}

struct Waiter {
    id: Uuid,
    admit: oneshot::Sender<()>,
}

struct QueueState {
    active: usize,
    pending: VecDeque<Waiter>,
}

struct Shared {
    limit: usize,
    state: Mutex<QueueState>,
    changes: watch::Sender<QueueStats>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &QueueState) {
        self.changes.send_replace(QueueStats {
            active: state.active,
            queued: state.pending.len(),
        });
    }

    /// Give a finished slot to the oldest live waiter, or free it.
    fn release(&self) {
        let mut state = self.lock();
        while let Some(waiter) = state.pending.pop_front() {
            if waiter.admit.send(()).is_ok() {
                debug!(ticket = %waiter.id, "request admitted from queue");
                self.publish(&state);
                return;
            }
        }
        state.active = state.active.saturating_sub(1);
        self.publish(&state);
    }
}

/// Shared concurrency limiter. Clones refer to the same queue.
#[derive(Clone)]
pub struct RequestQueue {
    shared: Arc<Shared>,
}

impl Default for RequestQueue {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENCY)
    }
}

impl RequestQueue {
    /// A limit of 0 is treated as 1.
    pub fn new(limit: usize) -> Self {
        let (changes, _) = watch::channel(QueueStats::default());
        Self {
            shared: Arc::new(Shared {
                limit: limit.max(1),
                state: Mutex::new(QueueState {
                    active: 0,
                    pending: VecDeque::new(),
                }),
                changes,
            }),
        }
    }

    pub fn limit(&self) -> usize {
        self.shared.limit
    }

    pub fn stats(&self) -> QueueStats {
        let state = self.shared.lock();
        QueueStats {
            active: state.active,
            queued: state.pending.len(),
        }
    }

    /// Fires on every admission, release and withdrawal.
    pub fn subscribe(&self) -> watch::Receiver<QueueStats> {
        self.shared.changes.subscribe()
    }

    /// Take a place in line. The ticket is admitted immediately when capacity is free.
    pub fn enqueue(&self) -> Ticket {
        let id = Uuid::new_v4();
        let (admit, admitted) = oneshot::channel();

        let mut state = self.shared.lock();
        if state.active < self.shared.limit {
            state.active += 1;
            let _ = admit.send(());
        } else {
            state.pending.push_back(Waiter { id, admit });
            debug!(ticket = %id, position = state.pending.len(), "request queued");
        }
        self.shared.publish(&state);
        drop(state);

        Ticket {
            id,
            shared: self.shared.clone(),
            admitted: Some(admitted),
        }
    }

    /// Run `task` once a slot is free and hand its output back to the caller.
    pub async fn submit<F, Fut, T>(&self, task: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let slot = self.enqueue().admitted().await;
        let output = task().await;
        drop(slot);
        output
    }
}

/// A caller's place in a [`RequestQueue`]. Dropping a waiting ticket withdraws it.
pub struct Ticket {
    id: Uuid,
    shared: Arc<Shared>,
    admitted: Option<oneshot::Receiver<()>>,
}

impl Ticket {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// 1-based rank among waiting tickets, or `None` once admitted.
    pub fn position(&self) -> Option<usize> {
        let state = self.shared.lock();
        state
            .pending
            .iter()
            .position(|w| w.id == self.id)
            .map(|index| index + 1)
    }

    /// Wait for admission and take the slot.
    pub async fn admitted(mut self) -> Slot {
        if let Some(admitted) = self.admitted.as_mut() {
            // The sender is only dropped unsent by this ticket's own Drop.
            let _ = admitted.await;
        }
        self.admitted = None;
        Slot {
            shared: self.shared.clone(),
        }
    }
}

impl Drop for Ticket {
    fn drop(&mut self) {
        let Some(mut admitted) = self.admitted.take() else {
            return;
        };

        let mut state = self.shared.lock();
        if let Some(index) = state.pending.iter().position(|w| w.id == self.id) {
            state.pending.remove(index);
            debug!(ticket = %self.id, "queued request withdrawn");
            self.shared.publish(&state);
            return;
        }
        drop(state);

        // Admitted but never claimed.
        if admitted.try_recv().is_ok() {
            self.shared.release();
        }
    }
}

/// Permission to run one task. Capacity is released when dropped.
pub struct Slot {
    shared: Arc<Shared>,
}

impl Drop for Slot {
    fn drop(&mut self) {
        self.shared.release();
    }
}
