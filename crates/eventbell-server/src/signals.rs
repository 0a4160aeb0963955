//! Shutdown signalling for the poll loop.
//!
//! SIGTERM and SIGINT (Ctrl+C elsewhere) flip a watch channel; the poll loop
//! checks it between cycles and races it against its sleep.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Owns the shutdown channel and the OS signal listener.
#[derive(Debug)]
pub struct SignalHandler {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Default for SignalHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalHandler {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    /// Spawns the task that listens for SIGTERM and SIGINT.
    ///
    /// Must be called from within a tokio runtime.
    #[cfg(unix)]
    pub fn spawn_listener(&self) {
        use tokio::signal::unix::{SignalKind, signal};

        let tx = self.tx.clone();
        tokio::spawn(async move {
            let (mut sigterm, mut sigint) =
                match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                    (Ok(term), Ok(int)) => (term, int),
                    (Err(e), _) | (_, Err(e)) => {
                        warn!(error = %e, "cannot install signal handlers, falling back to Ctrl+C");
                        if tokio::signal::ctrl_c().await.is_ok() {
                            info!("received Ctrl+C, shutting down");
                            let _ = tx.send(true);
                        }
                        return;
                    }
                };

            tokio::select! {
                _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
                _ = sigint.recv() => info!("received SIGINT, shutting down"),
            }
            let _ = tx.send(true);
            debug!("signal listener stopped");
        });
    }

    /// Spawns the task that listens for Ctrl+C.
    #[cfg(not(unix))]
    pub fn spawn_listener(&self) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("received Ctrl+C, shutting down");
                let _ = tx.send(true);
            }
        });
    }

    /// Returns a handle that can trigger or observe shutdown.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.tx.clone(),
            rx: self.rx.clone(),
        }
    }
}

/// A cloneable handle for triggering or awaiting shutdown.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl ShutdownHandle {
    /// Requests shutdown.
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }

    /// Returns true once shutdown has been requested.
    pub fn is_shutdown(&self) -> bool {
        *self.rx.borrow()
    }

    /// Completes when shutdown is requested.
    pub async fn wait(&self) {
        let mut rx = self.rx.clone();
        // The sender lives in `self`, so the channel cannot close under us.
        let _ = rx.wait_for(|stop| *stop).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn trigger_sets_flag() {
        let handler = SignalHandler::new();
        let handle = handler.shutdown_handle();

        assert!(!handle.is_shutdown());
        handle.trigger();
        assert!(handle.is_shutdown());
        assert!(handler.shutdown_handle().is_shutdown());
    }

    #[tokio::test]
    async fn wait_returns_immediately_when_already_triggered() {
        let handle = SignalHandler::new().shutdown_handle();
        handle.trigger();
        tokio::time::timeout(Duration::from_millis(50), handle.wait())
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn wait_completes_after_trigger() {
        let handle = SignalHandler::new().shutdown_handle();

        let trigger = handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            trigger.trigger();
        });

        let start = tokio::time::Instant::now();
        handle.wait().await;
        assert_eq!(start.elapsed(), Duration::from_secs(5));
    }
}
