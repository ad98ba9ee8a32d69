//! Periodic connection quality evaluation.

use std::sync::Weak;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace};

use super::EngineInner;

/// Spawn the monitor loop. It exits on shutdown or once the engine is gone.
pub(super) fn spawn(engine: Weak<EngineInner>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let Some(interval) = engine
            .upgrade()
            .map(|inner| inner.settings.quality.evaluation_interval)
        else {
            return;
        };
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        debug!(interval_ms = interval.as_millis() as u64, "quality monitor started");

        loop {
            tokio::select! {
                result = shutdown.changed() => {
                    if result.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    let Some(inner) = engine.upgrade() else {
                        break;
                    };
                    tick(&inner).await;
                }
            }
        }
        debug!("quality monitor stopped");
    })
}

async fn tick(inner: &EngineInner) {
    let quality = &inner.settings.quality;
    if let Some(address) = &quality.probe_address {
        let idle = inner.quality.idle_for();
        if idle >= quality.idle_threshold {
            trace!(idle_ms = idle.as_millis() as u64, "no recent traffic, probing");
            inner.probe(address).await;
        }
    }
    let current = inner.refresh_quality();
    trace!(quality = %current, "quality evaluated");
}
