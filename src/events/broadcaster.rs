use super::{ChangeListener, SnapshotSource};
use crate::models::Item;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::RwLock;
use tracing::{trace, warn};

struct Registration {
    id: u64,
    listener: Arc<dyn ChangeListener>,
}

/// Fans a single "catalog changed" signal out to every registered listener.
///
/// Each trigger fetches the catalog exactly once and hands every listener
/// that one snapshot, so all listeners in a cycle observe the same state no
/// matter how many are registered.
pub struct ChangeBroadcaster {
    source: Arc<dyn SnapshotSource>,
    listeners: Arc<RwLock<Vec<Registration>>>,
    next_id: AtomicU64,
}

impl ChangeBroadcaster {
    pub fn new(source: Arc<dyn SnapshotSource>) -> Self {
        Self {
            source,
            listeners: Arc::new(RwLock::new(Vec::new())),
            next_id: AtomicU64::new(0),
        }
    }

    /// Registers a listener; it stays registered until the returned handle
    /// is cancelled.
    pub async fn subscribe(&self, listener: Arc<dyn ChangeListener>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .write()
            .await
            .push(Registration { id, listener });
        Subscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    /// Convenience wrapper registering a plain closure as a listener.
    pub async fn subscribe_fn<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&[Item]) + Send + Sync + 'static,
    {
        self.subscribe(Arc::new(FnListener(callback))).await
    }

    /// Fetches the current snapshot once, then invokes every registered
    /// listener with it, in registration order. The fetch happens even with
    /// no listeners registered.
    pub async fn trigger(&self) {
        let snapshot = self.source.snapshot().await;

        // Copy the registrations so listeners can subscribe or cancel while
        // dispatch is underway; a cancellation mid-dispatch does not affect
        // the cycle already in flight.
        let current: Vec<(u64, Arc<dyn ChangeListener>)> = {
            let listeners = self.listeners.read().await;
            listeners
                .iter()
                .map(|registration| (registration.id, registration.listener.clone()))
                .collect()
        };

        trace!(
            listeners = current.len(),
            items = snapshot.len(),
            "dispatching catalog change"
        );

        for (id, listener) in current {
            // A failing listener must not starve the ones after it.
            if let Err(err) = listener.on_catalog_changed(&snapshot).await {
                warn!(listener = id, "catalog change listener failed: {err:#}");
            }
        }
    }

    pub async fn subscriber_count(&self) -> usize {
        self.listeners.read().await.len()
    }
}

struct FnListener<F>(F);

#[async_trait]
impl<F> ChangeListener for FnListener<F>
where
    F: Fn(&[Item]) + Send + Sync,
{
    async fn on_catalog_changed(&self, items: &[Item]) -> Result<()> {
        (self.0)(items);
        Ok(())
    }
}

/// Handle for one listener registration. Cancelling twice is a no-op, and
/// dropping the handle leaves the listener registered.
pub struct Subscription {
    id: u64,
    listeners: Weak<RwLock<Vec<Registration>>>,
}

impl Subscription {
    pub async fn cancel(&self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners
                .write()
                .await
                .retain(|registration| registration.id != self.id);
        }
    }
}
