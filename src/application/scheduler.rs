//! Priority admission scheduler.
//!
//! Caps the number of requests in flight and admits waiters in strict
//! priority order (`Critical` first), FIFO within a priority level. A waiter
//! holds a [`Ticket`]; once admitted it receives a [`SlotPermit`] that frees
//! its slot when dropped and immediately admits the next waiter.
//!
//! Cancelled waiters are skipped at admission time and never consume a slot.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, trace};

use crate::domain::{CancellationToken, Priority, RequestId};

mod permit;
mod queue;

pub use permit::{SlotPermit, Ticket};
use queue::PendingQueue;

/// A request waiting for a slot.
struct Waiter {
    token: CancellationToken,
    tx: oneshot::Sender<SlotPermit>,
}

struct State {
    pending: PendingQueue<Waiter>,
    in_flight: usize,
}

struct Shared {
    state: Mutex<State>,
    limit: usize,
}

/// Bounded-concurrency, priority-ordered admission control.
///
/// # Example
///
/// ```
/// use courier::application::scheduler::AdmissionScheduler;
/// use courier::domain::{CancellationToken, Priority, RequestId};
///
/// # tokio_test::block_on(async {
/// let scheduler = AdmissionScheduler::new(2);
/// let ticket = scheduler.enqueue(RequestId::new(), Priority::High, CancellationToken::new());
/// let permit = ticket.admitted().await.unwrap();
/// assert_eq!(scheduler.in_flight(), 1);
/// drop(permit);
/// assert_eq!(scheduler.in_flight(), 0);
/// # });
/// ```
#[derive(Clone)]
pub struct AdmissionScheduler {
    shared: Arc<Shared>,
}

impl AdmissionScheduler {
    /// Create a scheduler admitting at most `limit` concurrent requests.
    ///
    /// A limit of zero is raised to one.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    pending: PendingQueue::new(),
                    in_flight: 0,
                }),
                limit: limit.max(1),
            }),
        }
    }

    /// Queue a request for admission.
    ///
    /// The request may be admitted before this returns if a slot is free.
    pub fn enqueue(&self, id: RequestId, priority: Priority, token: CancellationToken) -> Ticket {
        let (tx, rx) = oneshot::channel();
        {
            let mut state = self.shared.state.lock();
            let waiter = Waiter {
                token: token.clone(),
                tx,
            };
            if let Some(previous) = state.pending.push(id, priority, waiter) {
                debug!(request_id = %id, "request re-queued, replacing previous waiter");
                drop(previous);
            }
            trace!(
                request_id = %id,
                priority = %priority,
                pending = state.pending.len(),
                "request queued"
            );
        }
        self.shared.admit();
        Ticket::new(id, token, rx, Arc::clone(&self.shared))
    }

    /// Remove a queued request. Returns `false` if it was not queued.
    pub fn withdraw(&self, id: RequestId) -> bool {
        self.shared.withdraw(id)
    }

    /// Drop every queued request. Their tickets resolve to `Cancelled`.
    pub fn clear(&self) -> usize {
        let drained = self.shared.state.lock().pending.drain();
        let count = drained.len();
        drop(drained);
        if count > 0 {
            debug!(count, "cleared pending queue");
        }
        count
    }

    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.shared.state.lock().pending.len()
    }

    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.shared.state.lock().in_flight
    }

    #[must_use]
    pub fn limit(&self) -> usize {
        self.shared.limit
    }
}

impl Shared {
    /// Hand out free slots to the most urgent live waiters.
    ///
    /// Permits are sent after the lock is released: a failed send drops the
    /// permit, which re-enters `admit` through `release`.
    fn admit(self: &Arc<Self>) {
        let mut grants = Vec::new();
        {
            let mut state = self.state.lock();
            while state.in_flight < self.limit {
                let Some((id, waiter)) = state.pending.pop() else {
                    break;
                };
                if waiter.token.is_cancelled() || waiter.tx.is_closed() {
                    trace!(request_id = %id, "skipping cancelled waiter");
                    continue;
                }
                state.in_flight += 1;
                grants.push((id, waiter.tx, SlotPermit::new(id, Arc::clone(self))));
            }
        }

        for (id, tx, permit) in grants {
            trace!(request_id = %id, "request admitted");
            if let Err(permit) = tx.send(permit) {
                trace!(request_id = %id, "waiter gone before admission");
                drop(permit);
            }
        }
    }

    fn release(self: &Arc<Self>) {
        {
            let mut state = self.state.lock();
            state.in_flight = state.in_flight.saturating_sub(1);
        }
        self.admit();
    }

    fn withdraw(&self, id: RequestId) -> bool {
        let removed = self.state.lock().pending.remove(id);
        removed.is_some()
    }
}
