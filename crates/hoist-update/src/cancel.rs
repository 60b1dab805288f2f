//! Cooperative cancellation for an in-flight update attempt

use std::sync::Arc;
use tokio::sync::watch;

/// Requests cancellation of the attempt currently running
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

/// Observed by the download and staging steps
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

/// Create a connected handle/signal pair
pub fn cancellation() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx: Arc::new(tx) }, CancelSignal { rx })
}

impl CancelHandle {
    /// Ask the running attempt to stop at its next checkpoint before commit
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub(crate) fn reset(&self) {
        self.tx.send_replace(false);
    }

    pub fn signal(&self) -> CancelSignal {
        CancelSignal {
            rx: self.tx.subscribe(),
        }
    }
}

impl CancelSignal {
    /// A signal that never fires
    pub fn never() -> Self {
        cancellation().1
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is requested
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            // Handle dropped: cancellation can no longer happen
            std::future::pending::<()>().await;
        }
    }
}
