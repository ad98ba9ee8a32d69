//! Admission handles.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::oneshot;

use super::Shared;
use crate::domain::{CancellationToken, RequestId};
use crate::error::RequestError;

/// A queued request waiting for admission.
///
/// Dropping the ticket withdraws the request from the queue.
pub struct Ticket {
    id: RequestId,
    token: CancellationToken,
    rx: oneshot::Receiver<SlotPermit>,
    shared: Arc<Shared>,
    queued_at: Instant,
}

impl Ticket {
    pub(super) fn new(
        id: RequestId,
        token: CancellationToken,
        rx: oneshot::Receiver<SlotPermit>,
        shared: Arc<Shared>,
    ) -> Self {
        Self {
            id,
            token,
            rx,
            shared,
            queued_at: Instant::now(),
        }
    }

    #[must_use]
    pub const fn id(&self) -> RequestId {
        self.id
    }

    /// Wait for a slot.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::Cancelled`] if the request's token fires while
    /// queued, or if the queue was cleared. A permit granted concurrently with
    /// cancellation is released without dispatch.
    pub async fn admitted(mut self) -> Result<SlotPermit, RequestError> {
        let outcome = tokio::select! {
            biased;
            () = self.token.cancelled() => Err(RequestError::Cancelled),
            permit = &mut self.rx => permit.map_err(|_| RequestError::Cancelled),
        };
        outcome.map(|mut permit| {
            permit.queue_wait = self.queued_at.elapsed();
            permit
        })
    }
}

impl Drop for Ticket {
    fn drop(&mut self) {
        self.shared.withdraw(self.id);
    }
}

/// One occupied concurrency slot. Dropping it admits the next waiter.
pub struct SlotPermit {
    id: RequestId,
    shared: Arc<Shared>,
    admitted_at: Instant,
    queue_wait: Duration,
}

impl SlotPermit {
    pub(super) fn new(id: RequestId, shared: Arc<Shared>) -> Self {
        Self {
            id,
            shared,
            admitted_at: Instant::now(),
            queue_wait: Duration::ZERO,
        }
    }

    #[must_use]
    pub const fn id(&self) -> RequestId {
        self.id
    }

    #[must_use]
    pub const fn admitted_at(&self) -> Instant {
        self.admitted_at
    }

    /// Time spent queued before admission.
    #[must_use]
    pub const fn queue_wait(&self) -> Duration {
        self.queue_wait
    }
}

impl fmt::Debug for SlotPermit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotPermit")
            .field("id", &self.id)
            .field("queue_wait", &self.queue_wait)
            .finish_non_exhaustive()
    }
}

impl Drop for SlotPermit {
    fn drop(&mut self) {
        self.shared.release();
    }
}
