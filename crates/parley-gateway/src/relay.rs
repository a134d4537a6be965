use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, trace, warn};
use uuid::Uuid;

use parley_types::events::{ChatEvent, Envelope};

/// Default per-subscriber queue bound. Any requested capacity is rounded up
/// to the next power of two by the underlying broadcast ring, so 1000 gives
/// 1024 slots and 3 gives 4.
pub const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out bus. Every subscriber sees every published event in
/// publish order. Delivery is best-effort: each subscriber has a bounded
/// queue and a subscriber that falls behind loses its oldest events.
#[derive(Clone)]
pub struct Relay {
    inner: Arc<RelayInner>,
}

struct RelayInner {
    /// Identifies this process to the bridge; stamped on every local publish
    instance_id: Uuid,

    /// Ring buffer shared by all subscribers, each with its own cursor
    tx: broadcast::Sender<Envelope>,
}

impl Relay {
    /// `capacity` is rounded up to a power of two, see [`DEFAULT_CAPACITY`].
    pub fn new(capacity: usize) -> Self {
        Self::with_instance_id(Uuid::new_v4(), capacity)
    }

    pub fn with_instance_id(instance_id: Uuid, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Arc::new(RelayInner { instance_id, tx }),
        }
    }

    pub fn instance_id(&self) -> Uuid {
        self.inner.instance_id
    }

    /// Register a new consumer. It receives only events published after
    /// this call returns.
    pub fn subscribe(&self) -> Subscription {
        let rx = self.inner.tx.subscribe();
        debug!(subscribers = self.subscriber_count(), "Relay subscription opened");
        Subscription { rx: Some(rx) }
    }

    /// Publish a locally originated event. Returns the number of
    /// subscribers it was queued for. Never blocks.
    pub fn publish(&self, event: ChatEvent) -> usize {
        self.send(Envelope {
            origin: self.inner.instance_id,
            event,
        })
    }

    /// Deliver an event received from another instance. Envelopes carrying
    /// this instance's own origin are dropped so a bridged event can never
    /// loop back into the relay that produced it.
    pub fn deliver_remote(&self, envelope: Envelope) -> bool {
        if envelope.origin == self.inner.instance_id {
            trace!(kind = envelope.event.kind(), "Dropping own event echoed back by bridge");
            return false;
        }
        self.send(envelope);
        true
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.tx.receiver_count()
    }

    fn send(&self, envelope: Envelope) -> usize {
        let kind = envelope.event.kind();
        let origin = envelope.origin;
        // Err only means nobody is listening right now
        let delivered = self.inner.tx.send(envelope).unwrap_or(0);
        trace!(kind, %origin, delivered, "Relay publish");
        delivered
    }
}

/// A live binding to a [`Relay`]. Produces events until unsubscribed or
/// dropped; dropping releases the queue slot immediately.
pub struct Subscription {
    rx: Option<broadcast::Receiver<Envelope>>,
}

impl Subscription {
    /// Wait for the next envelope. Returns `None` once unsubscribed.
    /// Events lost to queue overflow are logged and skipped.
    pub async fn recv(&mut self) -> Option<Envelope> {
        loop {
            let result = match self.rx.as_mut() {
                Some(rx) => rx.recv().await,
                None => return None,
            };

            match result {
                Ok(envelope) => return Some(envelope),
                Err(RecvError::Lagged(n)) => {
                    warn!("Relay subscriber lagged, dropped {} oldest events", n);
                }
                Err(RecvError::Closed) => {
                    self.rx = None;
                    return None;
                }
            }
        }
    }

    /// Like [`recv`](Self::recv) but yields only the event.
    pub async fn next_event(&mut self) -> Option<ChatEvent> {
        self.recv().await.map(|envelope| envelope.event)
    }

    pub fn is_active(&self) -> bool {
        self.rx.is_some()
    }

    /// Release the subscription. Safe to call more than once.
    pub fn unsubscribe(&mut self) {
        if self.rx.take().is_some() {
            debug!("Relay subscription released");
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
