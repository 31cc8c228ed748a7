//! procmand - Process manager daemon
//! Keeps remote channels pooled between requests and serves JSON-RPC

mod config;
mod logging;
mod telemetry;

use anyhow::Result;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

use procman_api_rpc::RpcServer;
use procman_core::application::{
    sweep_signal, Catalog, ChannelPool, CloseFault, PoolSweeper, ProcessManager,
};
use procman_core::port::id_provider::UuidProvider;
use procman_core::port::time_provider::SystemTimeProvider;
use procman_infra_system::ShellConnector;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Logging
    let _log_guard = logging::init()?;
    info!("procmand v{} starting...", VERSION);
    if telemetry::endpoint_ignored() {
        warn!("OpenTelemetry endpoint set but feature 'telemetry' not enabled");
    }

    // 2. Configuration
    let config_path = config::config_path();
    let config = config::load(&config_path)?;
    let settings = config.settings.clone();
    info!(
        path = %config_path.display(),
        targets = config.targets.len(),
        session_timeout_ms = settings.session_timeout_ms,
        max_attempts = settings.max_attempts,
        "Configuration loaded"
    );

    // 3. Wiring
    let id_provider = Arc::new(UuidProvider);
    let connector = Arc::new(ShellConnector::new(id_provider.clone(), config.channel.clone()));
    let (fault_tx, fault_rx) = mpsc::unbounded_channel();
    let pool = Arc::new(
        ChannelPool::new(
            connector,
            Arc::new(SystemTimeProvider),
            id_provider,
            settings.session_timeout(),
        )
        .with_diagnostics(fault_tx),
    );
    let close_faults = Arc::new(AtomicUsize::new(0));
    let fault_counter = tokio::spawn(count_close_faults(fault_rx, close_faults.clone()));

    let manager = Arc::new(ProcessManager::new(pool.clone(), &settings));
    let catalog = Arc::new(Catalog::new(config.targets));

    // 4. JSON-RPC server
    let (addr, rpc_handle) = RpcServer::new(config.server, manager.clone(), catalog)
        .start()
        .await?;

    // 5. Sweeper
    let (sweep_stop, signal) = sweep_signal();
    let sweeper = PoolSweeper::new(pool.clone(), settings.sweep_interval());
    let sweeper_handle = tokio::spawn(sweeper.run(signal));

    info!(addr = %addr, "System ready. Press Ctrl+C to shutdown");

    // 6. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Exiting gracefully...");

    // 7. Graceful shutdown: no new requests, no more sweeps, then close channels
    rpc_handle
        .stop()
        .map_err(|e| anyhow::anyhow!("RPC server stop failed: {}", e))?;
    rpc_handle.stopped().await;
    sweep_stop.stop();
    let _ = tokio::time::timeout(SHUTDOWN_GRACE, sweeper_handle).await;
    manager.shutdown().await;

    // The fault counter ends once the last pool handle is gone
    drop(manager);
    drop(pool);
    let _ = tokio::time::timeout(SHUTDOWN_GRACE, fault_counter).await;

    info!(
        close_faults = close_faults.load(Ordering::SeqCst),
        "Shutdown complete."
    );
    Ok(())
}

async fn count_close_faults(mut rx: mpsc::UnboundedReceiver<CloseFault>, total: Arc<AtomicUsize>) {
    while let Some(fault) = rx.recv().await {
        let seen = total.fetch_add(1, Ordering::SeqCst) + 1;
        warn!(
            key = %fault.key,
            channel_id = %fault.channel_id,
            error = %fault.error,
            total = seen,
            "Close fault recorded"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use procman_core::domain::TargetDescriptor;
    use procman_core::port::ChannelError;

    #[tokio::test]
    async fn test_close_faults_are_counted_until_pool_drops() {
        let (tx, rx) = mpsc::unbounded_channel();
        let total = Arc::new(AtomicUsize::new(0));
        let counter = tokio::spawn(count_close_faults(rx, total.clone()));

        for id in ["channel-1", "channel-2"] {
            tx.send(CloseFault {
                key: TargetDescriptor::new("H1").pool_key(),
                channel_id: id.to_string(),
                error: ChannelError::Io("broken pipe".to_string()),
            })
            .unwrap();
        }
        drop(tx);
        counter.await.unwrap();

        assert_eq!(total.load(Ordering::SeqCst), 2);
    }
}
