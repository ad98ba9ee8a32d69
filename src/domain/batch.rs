//! Batch records and per-item results.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::id::{BatchId, RequestId};
use super::response::Response;
use crate::error::RequestError;

/// Lifecycle of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl BatchStatus {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Outcome of one item of a batch, aligned with its submission index.
#[derive(Debug, Clone)]
pub struct BatchItemResult {
    pub id: RequestId,
    pub outcome: Result<Response, RequestError>,
    /// Time from submission to terminal state.
    pub latency: Duration,
}

impl BatchItemResult {
    #[must_use]
    pub const fn success(&self) -> bool {
        self.outcome.is_ok()
    }

    #[must_use]
    pub fn data(&self) -> Option<&serde_json::Value> {
        self.outcome.as_ref().ok().map(Response::data)
    }

    #[must_use]
    pub fn error(&self) -> Option<&RequestError> {
        self.outcome.as_ref().err()
    }
}

/// What `submit_batch` returns: the batch id, its final status and the
/// per-item results in submission order.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub id: BatchId,
    pub status: BatchStatus,
    pub results: Vec<BatchItemResult>,
}

impl BatchReport {
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.success()).count()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }
}

/// Bookkeeping record of a batch.
///
/// Once the status is terminal, `results` and `errors` together hold every
/// id of `request_ids` exactly once, and the record is no longer modified.
#[derive(Debug, Clone)]
pub struct Batch {
    id: BatchId,
    request_ids: Vec<RequestId>,
    status: BatchStatus,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    results: HashMap<RequestId, serde_json::Value>,
    errors: HashMap<RequestId, RequestError>,
}

impl Batch {
    #[must_use]
    pub fn new(id: BatchId, request_ids: Vec<RequestId>) -> Self {
        Self {
            id,
            request_ids,
            status: BatchStatus::Pending,
            started_at: Utc::now(),
            ended_at: None,
            results: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    #[must_use]
    pub const fn id(&self) -> BatchId {
        self.id
    }

    #[must_use]
    pub fn request_ids(&self) -> &[RequestId] {
        &self.request_ids
    }

    #[must_use]
    pub const fn status(&self) -> BatchStatus {
        self.status
    }

    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub const fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    #[must_use]
    pub const fn results(&self) -> &HashMap<RequestId, serde_json::Value> {
        &self.results
    }

    #[must_use]
    pub const fn errors(&self) -> &HashMap<RequestId, RequestError> {
        &self.errors
    }

    /// Move from `Pending` to `Processing`. No-op in any other state.
    pub fn start(&mut self) {
        if self.status == BatchStatus::Pending {
            self.status = BatchStatus::Processing;
        }
    }

    /// Record item outcomes and freeze the batch.
    ///
    /// Ignored once the batch is terminal. Items whose id is not part of the
    /// batch are dropped; ids without an item are recorded as failed with
    /// `fallback` so the partition stays exact.
    pub fn finish(
        &mut self,
        status: BatchStatus,
        items: &[BatchItemResult],
        fallback: &RequestError,
    ) {
        if self.status.is_terminal() || !status.is_terminal() {
            return;
        }

        for item in items {
            if !self.request_ids.contains(&item.id) {
                continue;
            }
            match &item.outcome {
                Ok(response) => {
                    self.results.insert(item.id, response.data().clone());
                }
                Err(err) => {
                    self.errors.insert(item.id, err.clone());
                }
            }
        }
        for id in &self.request_ids {
            if !self.results.contains_key(id) && !self.errors.contains_key(id) {
                self.errors.insert(*id, fallback.clone());
            }
        }

        self.status = status;
        self.ended_at = Some(Utc::now());
    }

    /// Whether `results` and `errors` partition `request_ids` exactly.
    #[must_use]
    pub fn is_partitioned(&self) -> bool {
        self.results.len() + self.errors.len() == self.request_ids.len()
            && self
                .request_ids
                .iter()
                .all(|id| self.results.contains_key(id) != self.errors.contains_key(id))
    }
}
