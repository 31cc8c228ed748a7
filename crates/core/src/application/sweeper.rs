// Background eviction of idle channels

use super::pool::ChannelPool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

/// Tells a running sweeper to stop
pub struct SweepStop {
    tx: watch::Sender<bool>,
}

impl SweepStop {
    pub fn stop(&self) {
        let _ = self.tx.send(true);
    }
}

/// Held by the sweeper loop
#[derive(Clone)]
pub struct SweepSignal {
    rx: watch::Receiver<bool>,
}

impl SweepSignal {
    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }

    async fn stopped(&mut self) {
        while !*self.rx.borrow() {
            if self.rx.changed().await.is_err() {
                // Sender dropped
                return;
            }
        }
    }
}

pub fn sweep_signal() -> (SweepStop, SweepSignal) {
    let (tx, rx) = watch::channel(false);
    (SweepStop { tx }, SweepSignal { rx })
}

/// Periodically closes channels that outlived the session timeout
pub struct PoolSweeper {
    pool: Arc<ChannelPool>,
    interval: Duration,
}

impl PoolSweeper {
    pub fn new(pool: Arc<ChannelPool>, interval: Duration) -> Self {
        Self { pool, interval }
    }

    /// One pass; returns the number of evicted channels
    pub async fn sweep_once(&self) -> usize {
        let evicted = self.pool.evict_expired().await;
        if evicted > 0 {
            info!(evicted = %evicted, "Swept idle channels");
        } else {
            debug!("Sweep found no idle channels");
        }
        evicted
    }

    /// Sweep every `interval` until stopped
    pub async fn run(self, mut signal: SweepSignal) {
        info!(interval_ms = %self.interval.as_millis(), "Pool sweeper started");

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {
                    self.sweep_once().await;
                }
                _ = signal.stopped() => {
                    break;
                }
            }
        }

        info!("Pool sweeper stopped");
    }
}
