//! Cooperative cancellation signal.
//!
//! A [`CancellationToken`] is a cloneable flag backed by a `watch` channel.
//! Queued work checks it before dispatch; in-flight work awaits
//! [`CancellationToken::cancelled`] alongside its own future.

use std::sync::Arc;

use tokio::sync::watch;

/// Cloneable, one-way cancellation flag.
///
/// Once cancelled a token stays cancelled. All clones observe the same flag.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    tx: Arc<watch::Sender<bool>>,
}

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Fire the token. Returns `true` if this call performed the transition.
    pub fn cancel(&self) -> bool {
        !self.tx.send_replace(true)
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once the token has been cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this only resolves on cancel.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Fires a token when dropped.
///
/// Wrapped around each transport attempt so the underlying connection is
/// told to abort on every exit path, including when a timer wins the race.
#[derive(Debug)]
pub struct AbortOnDrop(CancellationToken);

impl AbortOnDrop {
    #[must_use]
    pub fn new(token: CancellationToken) -> Self {
        Self(token)
    }

    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.0
    }
}

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}
