//! Batch submission and the record of recent batches.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::time::Instant;

use futures_util::future::join_all;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::domain::{
    Batch, BatchId, BatchItemResult, BatchReport, BatchStatus, RequestDescriptor, RequestId,
    Response,
};
use crate::error::RequestError;

#[derive(Default)]
struct History {
    order: VecDeque<BatchId>,
    batches: HashMap<BatchId, Batch>,
}

/// Runs batches and keeps the last `max_retained` records for inspection.
///
/// Items are independent: each one gets its own success or failure and one
/// failing item never aborts the others.
pub struct BatchCoordinator {
    history: Mutex<History>,
    max_retained: usize,
}

impl BatchCoordinator {
    #[must_use]
    pub fn new(max_retained: usize) -> Self {
        Self {
            history: Mutex::new(History::default()),
            max_retained: max_retained.max(1),
        }
    }

    /// Submit every request through `submit` and wait for all of them.
    ///
    /// Results are returned in submission order. When `accepting` is false the
    /// batch cannot start: it is recorded as failed and every item carries
    /// [`RequestError::Stopped`].
    pub async fn run<F, Fut>(
        &self,
        requests: Vec<RequestDescriptor>,
        accepting: bool,
        submit: F,
    ) -> BatchReport
    where
        F: Fn(RequestDescriptor) -> Fut,
        Fut: Future<Output = Result<Response, RequestError>>,
    {
        let id = BatchId::new();
        let request_ids: Vec<RequestId> = requests.iter().map(RequestDescriptor::id).collect();
        self.insert(Batch::new(id, request_ids));

        if !accepting {
            warn!(batch_id = %id, items = requests.len(), "engine stopped, batch rejected");
            let results: Vec<BatchItemResult> = requests
                .iter()
                .map(|request| BatchItemResult {
                    id: request.id(),
                    outcome: Err(RequestError::Stopped),
                    latency: std::time::Duration::ZERO,
                })
                .collect();
            return self.finish(id, BatchStatus::Failed, results);
        }

        self.update(id, Batch::start);
        debug!(batch_id = %id, items = requests.len(), "batch processing");

        let items = requests.into_iter().map(|request| {
            let request_id = request.id();
            let started = Instant::now();
            let pending = submit(request);
            async move {
                let outcome = pending.await;
                BatchItemResult {
                    id: request_id,
                    outcome,
                    latency: started.elapsed(),
                }
            }
        });
        let results = join_all(items).await;

        self.finish(id, BatchStatus::Completed, results)
    }

    /// Snapshot of a retained batch record.
    #[must_use]
    pub fn get(&self, id: BatchId) -> Option<Batch> {
        self.history.lock().batches.get(&id).cloned()
    }

    /// Number of retained records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.history.lock().batches.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every finished batch. Running batches keep their records.
    pub fn clear(&self) {
        let mut history = self.history.lock();
        history.batches.retain(|_, batch| !batch.status().is_terminal());
        let History { order, batches } = &mut *history;
        order.retain(|id| batches.contains_key(id));
    }

    fn insert(&self, batch: Batch) {
        let mut history = self.history.lock();
        history.order.push_back(batch.id());
        history.batches.insert(batch.id(), batch);
    }

    fn update(&self, id: BatchId, apply: impl FnOnce(&mut Batch)) {
        if let Some(batch) = self.history.lock().batches.get_mut(&id) {
            apply(batch);
        }
    }

    fn finish(&self, id: BatchId, status: BatchStatus, results: Vec<BatchItemResult>) -> BatchReport {
        self.update(id, |batch| batch.finish(status, &results, &RequestError::Stopped));
        self.prune();

        let report = BatchReport {
            id,
            status,
            results,
        };
        info!(
            batch_id = %id,
            status = ?status,
            succeeded = report.succeeded(),
            failed = report.failed(),
            "batch finished"
        );
        report
    }

    /// Drop the oldest finished records beyond `max_retained`.
    fn prune(&self) {
        let mut history = self.history.lock();
        let History { order, batches } = &mut *history;
        let mut excess = batches.len().saturating_sub(self.max_retained);
        order.retain(|id| {
            if excess == 0 {
                return true;
            }
            let finished = batches.get(id).map_or(true, |b| b.status().is_terminal());
            if finished {
                batches.remove(id);
                excess -= 1;
                false
            } else {
                true
            }
        });
    }
}
