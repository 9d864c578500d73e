//! Shutdown coordination.

use std::future::Future;

use tokio::sync::broadcast;

/// One-shot shutdown signal fanned out to every long-running task.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Resolves on `trigger`, or when the coordinator is dropped.
    ///
    /// Registration happens at call time, so a trigger that fires before
    /// the future is first polled is not missed.
    pub fn notified(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.tx.subscribe();
        async move {
            let _ = rx.recv().await;
        }
    }

    pub fn trigger(&self) {
        let notified = self.tx.send(()).unwrap_or(0);
        tracing::info!(listeners = notified, "Shutdown triggered");
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
