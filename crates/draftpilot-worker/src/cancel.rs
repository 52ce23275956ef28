//! Cooperative cancellation.

use std::sync::Arc;
use tokio::sync::watch;

/// Sending side; cancelling is idempotent.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

/// Receiving side, cheap to clone into tasks.
#[derive(Debug, Clone)]
pub struct CancellationSignal {
    rx: watch::Receiver<bool>,
    /// Sender kept alive for signals that have no handle.
    _owner: Option<Arc<watch::Sender<bool>>>,
}

/// Create a connected handle and signal.
pub fn pair() -> (CancelHandle, CancellationSignal) {
    let (tx, rx) = watch::channel(false);
    (
        CancelHandle { tx },
        CancellationSignal { rx, _owner: None },
    )
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

impl CancellationSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            rx,
            _owner: Some(Arc::new(tx)),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once cancelled. Pends forever if the handle is dropped uncancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
