//! Subscriber registry for published line snapshots.
//!
//! Each subscriber owns the receiving half of an unbounded channel. The
//! registry is guarded by a single mutex; [`SnapshotHub::publish`] copies the
//! sender list before sending, so subscribers may join or leave while a
//! publish is in progress. Receivers that have gone away are pruned on the
//! next publish.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use linewatch_core::LineSnapshot;
use tokio::sync::mpsc;
use uuid::Uuid;

type SnapshotSender = mpsc::UnboundedSender<Arc<LineSnapshot>>;

/// A live subscription. Dropping it (or its receiver) unsubscribes lazily.
#[derive(Debug)]
pub struct Subscription {
    pub id: Uuid,
    pub receiver: mpsc::UnboundedReceiver<Arc<LineSnapshot>>,
}

#[derive(Default)]
pub struct SnapshotHub {
    subscribers: Mutex<HashMap<Uuid, SnapshotSender>>,
}

impl SnapshotHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, SnapshotSender>> {
        self.subscribers.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a new subscriber.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        let count = {
            let mut subscribers = self.lock();
            subscribers.insert(id, tx);
            subscribers.len()
        };
        tracing::debug!(subscription_id = %id, subscribers = count, "Subscriber added");
        Subscription { id, receiver: rx }
    }

    /// Remove a subscriber. Its receiver sees the channel close.
    pub fn unsubscribe(&self, id: Uuid) -> bool {
        let removed = self.lock().remove(&id).is_some();
        if removed {
            tracing::debug!(subscription_id = %id, "Subscriber removed");
        }
        removed
    }

    /// Deliver `snapshot` to every current subscriber.
    ///
    /// Returns the number of subscribers it was delivered to.
    pub fn publish(&self, snapshot: Arc<LineSnapshot>) -> usize {
        let targets: Vec<(Uuid, SnapshotSender)> = self
            .lock()
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect();

        let mut delivered = 0;
        let mut closed = Vec::new();
        for (id, tx) in targets {
            if tx.send(Arc::clone(&snapshot)).is_ok() {
                delivered += 1;
            } else {
                closed.push(id);
            }
        }

        if !closed.is_empty() {
            let mut subscribers = self.lock();
            for id in &closed {
                subscribers.remove(id);
            }
            tracing::debug!(pruned = closed.len(), "Pruned closed subscribers");
        }

        tracing::debug!(tick = snapshot.tick, delivered, "Snapshot published");
        delivered
    }

    /// Drop every subscription; each receiver sees its channel close.
    pub fn close_all(&self) -> usize {
        let closed = {
            let mut subscribers = self.lock();
            let count = subscribers.len();
            subscribers.clear();
            count
        };
        tracing::info!(closed, "Closed all snapshot subscriptions");
        closed
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
