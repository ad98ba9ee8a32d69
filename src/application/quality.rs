//! Rolling-window connection quality estimation.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tracing::debug;

use crate::domain::{ConnectionQuality, QualitySample, WindowSummary};

/// Classification before any sample exists.
pub const INITIAL_QUALITY: ConnectionQuality = ConnectionQuality::Good;

/// A change of the published quality class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityTransition {
    pub from: ConnectionQuality,
    pub to: ConnectionQuality,
}

/// Keeps the last `window_size` samples and classifies them on demand.
///
/// The current class is published through a `watch` channel so observers
/// only wake on actual transitions.
pub struct QualityEstimator {
    samples: RwLock<VecDeque<QualitySample>>,
    window_size: usize,
    platform_online: RwLock<bool>,
    last_activity: Mutex<Instant>,
    tx: watch::Sender<ConnectionQuality>,
}

impl QualityEstimator {
    #[must_use]
    pub fn new(window_size: usize) -> Self {
        let window_size = window_size.max(1);
        let (tx, _rx) = watch::channel(INITIAL_QUALITY);
        Self {
            samples: RwLock::new(VecDeque::with_capacity(window_size)),
            window_size,
            platform_online: RwLock::new(true),
            last_activity: Mutex::new(Instant::now()),
            tx,
        }
    }

    /// Record an attempt outcome, evicting the oldest sample when full.
    pub fn record(&self, latency: Duration, success: bool) {
        let sample = QualitySample::new(latency, success);
        {
            let mut samples = self.samples.write();
            samples.push_back(sample);
            while samples.len() > self.window_size {
                samples.pop_front();
            }
        }
        *self.last_activity.lock() = sample.timestamp;
    }

    /// Aggregate of the current window, `None` when it is empty.
    #[must_use]
    pub fn summary(&self) -> Option<WindowSummary> {
        WindowSummary::from_samples(self.samples.read().iter())
    }

    #[must_use]
    pub fn sample_count(&self) -> usize {
        self.samples.read().len()
    }

    /// Classify the window without publishing.
    #[must_use]
    pub fn classify(&self) -> ConnectionQuality {
        if !*self.platform_online.read() {
            return ConnectionQuality::Offline;
        }
        self.summary()
            .map_or(INITIAL_QUALITY, |summary| summary.classify())
    }

    /// Classify and publish. Returns the transition if the class changed.
    pub fn evaluate(&self) -> Option<QualityTransition> {
        let next = self.classify();
        let mut previous = next;
        let changed = self.tx.send_if_modified(|current| {
            previous = *current;
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
        if changed {
            debug!(from = %previous, to = %next, "connection quality changed");
            Some(QualityTransition {
                from: previous,
                to: next,
            })
        } else {
            None
        }
    }

    /// Last published class.
    #[must_use]
    pub fn current(&self) -> ConnectionQuality {
        *self.tx.borrow()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ConnectionQuality> {
        self.tx.subscribe()
    }

    /// Apply a host-platform connectivity signal and re-evaluate.
    pub fn set_platform_online(&self, online: bool) -> Option<QualityTransition> {
        *self.platform_online.write() = online;
        self.evaluate()
    }

    #[must_use]
    pub fn is_platform_online(&self) -> bool {
        *self.platform_online.read()
    }

    /// Time since the last recorded sample.
    #[must_use]
    pub fn idle_for(&self) -> Duration {
        self.last_activity.lock().elapsed()
    }

    /// Drop every sample and publish the initial class again.
    pub fn clear(&self) -> Option<QualityTransition> {
        self.samples.write().clear();
        *self.last_activity.lock() = Instant::now();
        self.evaluate()
    }
}
