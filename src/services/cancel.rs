//! Cancellation signal shared between the engine, the executor and the
//! agent invokers.

use std::sync::Arc;

use tokio::sync::watch;

/// Cloneable cancellation token over a watch channel.
///
/// Cancellation is observed at transition checkpoints and inside streaming
/// selects; it never interrupts a store write mid-flight.
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx: Arc::new(tx), rx }
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Receiver handle for select loops.
    pub fn watch(&self) -> watch::Receiver<bool> {
        self.rx.clone()
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}
