//! Periodic replay of buffered mirror writes.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::core::{Spawn, StopHandle};
use crate::sync::mirror::{FlushReport, MirrorSync};

/// Default pause between flush cycles.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(60);

/// Background task that flushes the mirror buffer on a fixed interval.
pub struct Flusher {
    mirror: Arc<MirrorSync>,
    interval: Duration,
}

impl Flusher {
    /// Flusher for a mirror adapter.
    pub fn new(mirror: Arc<MirrorSync>, interval: Duration) -> Self {
        Self {
            mirror,
            interval: if interval.is_zero() { DEFAULT_FLUSH_INTERVAL } else { interval },
        }
    }

    /// Run one cycle now.
    pub async fn run_once(&self) -> FlushReport {
        self.mirror.flush().await
    }

    /// Spawn the loop. The first cycle runs one interval after start.
    pub fn start<S: Spawn>(self, spawner: &S) -> StopHandle {
        let handle = StopHandle::new();
        let loop_handle = handle.clone();
        info!(interval_secs = self.interval.as_secs(), "mirror flusher started");
        spawner.spawn(async move {
            let start = tokio::time::Instant::now() + self.interval;
            let mut ticker = tokio::time::interval_at(start, self.interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    () = loop_handle.stop_requested() => {}
                }
                if loop_handle.is_stopped() {
                    break;
                }
                let report = self.run_once().await;
                debug!(?report, "flush cycle");
            }
            info!("mirror flusher stopped");
        });
        handle
    }
}
