use std::sync::Arc;

use tokio::sync::broadcast;

use chirp_types::events::StoreEvent;

/// Fans store writes out to any interested viewers. Having no subscribers
/// is the normal case.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    broadcast_tx: broadcast::Sender<StoreEvent>,
}

impl Dispatcher {
    pub fn new(capacity: usize) -> Self {
        let (broadcast_tx, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Arc::new(DispatcherInner { broadcast_tx }),
        }
    }

    /// Subscribe to store events. Only events sent after this call arrive.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.inner.broadcast_tx.subscribe()
    }

    pub fn broadcast(&self, event: StoreEvent) {
        let _ = self.inner.broadcast_tx.send(event);
    }
}
