// crates/server/src/events.rs
//! Fan-out of progress events to connected observers.

use dashmap::DashMap;
use tokio::sync::mpsc;
use tubefetch_core::ProgressEvent;

use crate::metrics::set_observers_connected;

/// Opaque observer identifier, also sent to the client as `clientId`.
pub type ObserverId = String;

/// A subscription: its id plus the queue of events published after it
/// was created.
pub struct Observer {
    pub id: ObserverId,
    pub rx: mpsc::UnboundedReceiver<ProgressEvent>,
}

/// The set of connected observers.
///
/// Holds no job state; a new observer only sees events published after it
/// subscribed. Each observer has its own FIFO queue, so events published by
/// one task (the runner for one job) arrive in emission order.
#[derive(Debug, Default)]
pub struct EventBroadcaster {
    observers: DashMap<ObserverId, mpsc::UnboundedSender<ProgressEvent>>,
}

impl EventBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Observer {
        let id = uuid::Uuid::new_v4().to_string();
        let (tx, rx) = mpsc::unbounded_channel();
        self.observers.insert(id.clone(), tx);
        set_observers_connected(self.observers.len());
        tracing::info!(observer_id = %id, "observer connected");
        Observer { id, rx }
    }

    /// Returns false if the observer was already gone.
    pub fn unsubscribe(&self, id: &str) -> bool {
        let removed = self.observers.remove(id).is_some();
        if removed {
            set_observers_connected(self.observers.len());
            tracing::info!(observer_id = %id, "observer disconnected");
        }
        removed
    }

    /// Deliver `event` to every observer; returns how many received it.
    ///
    /// An observer whose receiver is gone is dropped on the spot. That never
    /// affects delivery to the others.
    pub fn publish(&self, event: &ProgressEvent) -> usize {
        let mut delivered = 0;
        let before = self.observers.len();
        self.observers.retain(|id, tx| match tx.send(event.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(_) => {
                tracing::debug!(observer_id = %id, "dropping closed observer");
                false
            }
        });
        if delivered != before {
            set_observers_connected(self.observers.len());
        }
        delivered
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }
}
