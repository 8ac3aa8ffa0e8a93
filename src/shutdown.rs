//! Graceful shutdown plumbing
//!
//! A single [`ShutdownController`] is created at startup and listens for
//! SIGTERM/SIGINT. Long-blocking stages (readiness probe, build step,
//! supervised wait) hold a [`ShutdownSignal`] and select on it so a
//! termination signal unwinds the current stage instead of killing the
//! orchestrator mid-write.

use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tracing::{debug, info};

/// Sender half of the shutdown channel
pub struct ShutdownController {
    tx: watch::Sender<bool>,
}

/// Receiver half, cloned into every cancellable stage
#[derive(Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownController {
    pub fn new() -> (Self, ShutdownSignal) {
        let (tx, rx) = watch::channel(false);
        (Self { tx }, ShutdownSignal { rx })
    }

    /// Trip the shutdown channel manually
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }

    /// Spawn handlers for SIGTERM and SIGINT that trip the channel.
    ///
    /// Installation failure is fatal: an orchestrator that cannot observe
    /// termination signals would leave the managed process orphaned.
    pub fn listen_for_signals(&self) -> std::io::Result<()> {
        let tx = self.tx.clone();
        let mut term = signal(SignalKind::terminate())?;
        let mut int = signal(SignalKind::interrupt())?;

        tokio::spawn(async move {
            tokio::select! {
                _ = term.recv() => info!("Received SIGTERM, shutting down"),
                _ = int.recv() => info!("Received SIGINT, shutting down"),
            }
            let _ = tx.send(true);
        });

        debug!("Signal handlers installed");
        Ok(())
    }
}

impl ShutdownSignal {
    /// Create a signal that never fires (for tests and one-shot commands)
    pub fn never() -> Self {
        let (tx, rx) = watch::channel(false);
        // Keep the sender alive forever so the channel never closes.
        std::mem::forget(tx);
        Self { rx }
    }

    /// True once a termination signal has been observed
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve when shutdown is requested
    pub async fn recv(&mut self) {
        // wait_for returns immediately if already true; a closed channel is
        // treated as shutdown.
        let _ = self.rx.wait_for(|v| *v).await;
    }
}
