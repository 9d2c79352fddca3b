use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use faasr_monitor::WorkflowMonitorHandle;

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut terminate = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = terminate.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

/// Requests graceful shutdown on the first interrupt/terminate signal and
/// forces immediate shutdown on the second, the same two-stage behavior the
/// rest of this family of tools gives an interactive Ctrl+C.
pub fn spawn_signal_handler(monitor: WorkflowMonitorHandle, graceful_timeout: Duration) {
    tokio::spawn(async move {
        let forced = Arc::new(AtomicBool::new(false));
        loop {
            wait_for_signal().await;
            if forced.swap(true, Ordering::SeqCst) {
                tracing::warn!("second shutdown signal received, forcing immediate stop");
                monitor.force_shutdown().await;
                return;
            }

            tracing::info!("shutdown signal received, requesting graceful stop");
            let graceful_monitor = monitor.clone();
            tokio::spawn(async move {
                if !graceful_monitor.shutdown(graceful_timeout).await {
                    tracing::warn!("graceful shutdown timed out, forcing");
                    graceful_monitor.force_shutdown().await;
                }
            });
        }
    });
}
