//! Process-wide shutdown signal.
//!
//! [`ShutdownTrigger`] is held by whoever listens for the operator interrupt;
//! every blocking point in the cycle holds a [`Shutdown`] clone and races its
//! work against [`Shutdown::requested`].

use std::future::Future;

use tokio::sync::watch;

/// Sending half of the shutdown signal.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    /// Request shutdown. Idempotent.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

/// Receiving half of the shutdown signal. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

/// Create a connected trigger/signal pair.
pub fn channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

impl Shutdown {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (tx, rx) = watch::channel(false);
        // Keep the value readable after the sender is gone.
        drop(tx);
        Shutdown { rx }
    }

    pub fn is_requested(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once shutdown has been requested.
    ///
    /// If the trigger is dropped without firing, this never resolves.
    pub async fn requested(&mut self) {
        if self.rx.wait_for(|requested| *requested).await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    /// Run `work` unless shutdown is requested first.
    ///
    /// Returns `None` when shutdown won the race; `work` is dropped at its
    /// current await point.
    pub async fn guard<F: Future>(&mut self, work: F) -> Option<F::Output> {
        if self.is_requested() {
            return None;
        }
        tokio::select! {
            biased;
            _ = self.requested() => None,
            output = work => Some(output),
        }
    }

    /// Sleep for `duration`, returning `false` if interrupted by shutdown.
    pub async fn sleep(&mut self, duration: std::time::Duration) -> bool {
        self.guard(tokio::time::sleep(duration)).await.is_some()
    }
}
