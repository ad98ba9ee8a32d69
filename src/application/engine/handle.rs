//! Handle to a request running on a background task.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::task::JoinHandle;

use crate::domain::{CancellationToken, RequestId, Response};
use crate::error::RequestError;

/// Returned by [`Engine::spawn`](super::Engine::spawn).
///
/// Await the handle for the terminal outcome. Dropping it does not cancel
/// the request; call [`cancel`](Self::cancel) for that.
#[must_use = "a dropped handle keeps the request running without a way to read its outcome"]
pub struct RequestHandle {
    id: RequestId,
    token: CancellationToken,
    task: JoinHandle<Result<Response, RequestError>>,
}

impl RequestHandle {
    pub(super) fn new(
        id: RequestId,
        token: CancellationToken,
        task: JoinHandle<Result<Response, RequestError>>,
    ) -> Self {
        Self { id, token, task }
    }

    pub const fn id(&self) -> RequestId {
        self.id
    }

    /// Cancel the request. Returns `false` if it was already cancelled.
    pub fn cancel(&self) -> bool {
        self.token.cancel()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Future for RequestHandle {
    type Output = Result<Response, RequestError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.task).poll(cx).map(|joined| match joined {
            Ok(outcome) => outcome,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => Err(RequestError::Cancelled),
        })
    }
}
