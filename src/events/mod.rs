pub mod broadcaster;

pub use broadcaster::{ChangeBroadcaster, Subscription};

use crate::models::Item;
use anyhow::Result;
use async_trait::async_trait;

/// Listener invoked on every catalog change broadcast with the freshly
/// fetched item snapshot.
#[async_trait]
pub trait ChangeListener: Send + Sync {
    async fn on_catalog_changed(&self, items: &[Item]) -> Result<()>;
}

/// Source of the authoritative snapshot delivered with each broadcast.
///
/// Implementations share the adapter's read contract: on backend failure
/// they degrade to an empty snapshot instead of returning an error.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn snapshot(&self) -> Vec<Item>;
}
