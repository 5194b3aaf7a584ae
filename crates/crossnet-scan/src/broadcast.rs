//! Fan-out of scan events to any number of observers.
//!
//! Each observer owns a bounded queue. Publishing never waits: an observer
//! whose queue is full misses the event. The last free slot of every queue is
//! kept for the terminal event, so a slow observer may lose progress updates
//! but always learns how the scan ended.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc::{self, error::TrySendError};

use crossnet_core::ScanEvent;

pub type ObserverId = u64;

/// Smallest queue that still leaves room for one non-terminal event.
const MIN_CAPACITY: usize = 2;

#[derive(Default)]
struct Registry {
    next_id: ObserverId,
    observers: HashMap<ObserverId, mpsc::Sender<ScanEvent>>,
}

/// Registry of observers shared by the engine and the controller.
#[derive(Clone)]
pub struct EventBroadcaster {
    registry: Arc<Mutex<Registry>>,
    capacity: usize,
}

impl EventBroadcaster {
    pub fn new(capacity: usize) -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry::default())),
            capacity: capacity.max(MIN_CAPACITY),
        }
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        // Registry updates cannot be left half-done, so a poisoned lock is still usable.
        self.registry.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn subscribe(&self) -> Observer {
        let (tx, rx) = mpsc::channel(self.capacity);
        let mut registry = self.registry();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.observers.insert(id, tx);
        tracing::debug!(observer = id, "Observer subscribed");

        Observer {
            id,
            rx,
            broadcaster: self.clone(),
            finished: false,
        }
    }

    /// Remove an observer. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        let removed = self.registry().observers.remove(&id).is_some();
        if removed {
            tracing::debug!(observer = id, "Observer unsubscribed");
        }
        removed
    }

    pub fn observer_count(&self) -> usize {
        self.registry().observers.len()
    }

    /// Deliver `event` to every observer with room for it.
    ///
    /// Returns the number of observers the event was queued for.
    pub fn publish(&self, event: &ScanEvent) -> usize {
        let terminal = event.is_terminal();
        let mut registry = self.registry();
        let mut delivered = 0;

        registry.observers.retain(|id, tx| {
            if !terminal && tx.capacity() <= 1 {
                tracing::trace!(
                    observer = id,
                    kind = event.kind(),
                    "Observer queue full, event dropped"
                );
                return !tx.is_closed();
            }

            match tx.try_send(event.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(TrySendError::Full(_)) => {
                    tracing::debug!(
                        observer = id,
                        kind = event.kind(),
                        "Observer queue full, event dropped"
                    );
                    true
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(observer = id, "Pruning closed observer");
                    false
                }
            }
        });

        delivered
    }
}

/// Receiving end of one subscription.
///
/// The stream ends after a terminal event. Dropping the observer
/// unsubscribes it.
pub struct Observer {
    id: ObserverId,
    rx: mpsc::Receiver<ScanEvent>,
    broadcaster: EventBroadcaster,
    finished: bool,
}

impl Observer {
    pub fn id(&self) -> ObserverId {
        self.id
    }

    /// Next event, or `None` once the stream has ended.
    pub async fn recv(&mut self) -> Option<ScanEvent> {
        if self.finished {
            return None;
        }

        let event = self.rx.recv().await;
        match &event {
            Some(e) if e.is_terminal() => self.finish(),
            None => self.finished = true,
            Some(_) => {}
        }
        event
    }

    /// Stop receiving events.
    pub fn unsubscribe(mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        self.finished = true;
        self.broadcaster.unsubscribe(self.id);
        self.rx.close();
    }
}

impl Drop for Observer {
    fn drop(&mut self) {
        if !self.finished {
            self.broadcaster.unsubscribe(self.id);
        }
    }
}
