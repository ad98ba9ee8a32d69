//! Connection quality classes and the threshold table.

use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Coarse classification of current network health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionQuality {
    Excellent,
    Good,
    Poor,
    Offline,
}

impl ConnectionQuality {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Poor => "poor",
            Self::Offline => "offline",
        }
    }

    #[must_use]
    pub const fn is_online(self) -> bool {
        !matches!(self, Self::Offline)
    }
}

impl fmt::Display for ConnectionQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one observed attempt or probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualitySample {
    pub latency: Duration,
    pub success: bool,
    pub timestamp: Instant,
}

impl QualitySample {
    #[must_use]
    pub fn new(latency: Duration, success: bool) -> Self {
        Self {
            latency,
            success,
            timestamp: Instant::now(),
        }
    }
}

/// Aggregate over a sample window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowSummary {
    pub average_latency: Duration,
    /// Fraction of successful samples, `0.0..=1.0`.
    pub success_rate: f64,
    pub sample_count: usize,
}

impl WindowSummary {
    #[must_use]
    pub fn from_samples<'a>(samples: impl IntoIterator<Item = &'a QualitySample>) -> Option<Self> {
        let mut count = 0usize;
        let mut successes = 0usize;
        let mut total = Duration::ZERO;
        for sample in samples {
            count += 1;
            total += sample.latency;
            if sample.success {
                successes += 1;
            }
        }
        if count == 0 {
            return None;
        }
        Some(Self {
            average_latency: total / count as u32,
            success_rate: successes as f64 / count as f64,
            sample_count: count,
        })
    }

    /// Apply the threshold table.
    ///
    /// | avg latency | success rate | class     |
    /// |-------------|--------------|-----------|
    /// | < 300ms     | > 95%        | excellent |
    /// | < 1000ms    | > 90%        | good      |
    /// | < 3000ms    | > 80%        | poor      |
    /// | else        |              | offline   |
    #[must_use]
    pub fn classify(&self) -> ConnectionQuality {
        let ms = self.average_latency.as_millis();
        let rate = self.success_rate;
        if ms < 300 && rate > 0.95 {
            ConnectionQuality::Excellent
        } else if ms < 1000 && rate > 0.90 {
            ConnectionQuality::Good
        } else if ms < 3000 && rate > 0.80 {
            ConnectionQuality::Poor
        } else {
            ConnectionQuality::Offline
        }
    }
}
