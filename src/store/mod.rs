mod api;
mod realtime;


pub use api::CatalogApi;
pub use realtime::{RealtimeClient, RealtimeHandle, RemoteChange};

use anyhow::Result;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::events::{ChangeBroadcaster, SnapshotSource};
use crate::models::{Item, ItemPatch, NewItem};

/// Adapter over the remote catalog table.
///
/// Read failures degrade to empty results and write failures to
/// `false`/`None`; no transport error reaches callers. The display layer
/// tolerates empty states, so failures surface in the logs only. Every
/// successful mutation triggers one catalog change broadcast.
pub struct CatalogStore {
    api: Arc<CatalogApi>,
    changes: Arc<ChangeBroadcaster>,
    realtime: RealtimeClient,
}

impl CatalogStore {
    pub fn new(config: &Config) -> Result<Self> {
        let api = Arc::new(CatalogApi::new(&config.store, &config.network));
        let source: Arc<dyn SnapshotSource> = api.clone();
        let changes = Arc::new(ChangeBroadcaster::new(source));
        let realtime = RealtimeClient::new(&config.store)?;

        Ok(Self {
            api,
            changes,
            realtime,
        })
    }

    /// The broadcaster through which catalog changes fan out. Views register
    /// their listeners here.
    pub fn changes(&self) -> &Arc<ChangeBroadcaster> {
        &self.changes
    }

    /// Seeds the catalog with the default items when the remote table is
    /// empty. Inserts run sequentially, in declaration order. A probe
    /// failure is logged and leaves the table untouched.
    pub async fn initialize_if_empty(&self) {
        match self.api.any_items().await {
            Ok(true) => debug!("catalog already populated"),
            Ok(false) => {
                info!("catalog empty, seeding default items");
                for item in default_items() {
                    if self.insert(item).await.is_none() {
                        error!("failed to seed default catalog item");
                    }
                }
            }
            Err(err) => error!("failed to check catalog state: {err:#}"),
        }
    }

    /// All items ordered by creation time, newest first. Empty on any
    /// backend error.
    pub async fn list_all(&self) -> Vec<Item> {
        self.api.snapshot().await
    }

    /// Point lookup by identifier. Not-found and backend failure both yield
    /// `None`; callers cannot tell them apart.
    pub async fn get_by_id(&self, id: &str) -> Option<Item> {
        match self.api.fetch_item(id).await {
            Ok(item) => Some(item),
            Err(err) => {
                error!(item = id, "failed to fetch catalog item: {err:#}");
                None
            }
        }
    }

    /// Inserts one item; returns the store-assigned identifier, or `None` on
    /// failure.
    pub async fn insert(&self, item: NewItem) -> Option<String> {
        match self.api.insert_item(&item).await {
            Ok(created) => {
                self.changes.trigger().await;
                Some(created.id)
            }
            Err(err) => {
                error!("failed to add catalog item: {err:#}");
                None
            }
        }
    }

    /// Applies a partial update. `false` when the update failed or matched
    /// no row.
    pub async fn update(&self, id: &str, patch: ItemPatch) -> bool {
        match self.api.update_item(id, &patch).await {
            Ok(_) => {
                self.changes.trigger().await;
                true
            }
            Err(err) => {
                error!(item = id, "failed to update catalog item: {err:#}");
                false
            }
        }
    }

    /// Deletes by identifier. `false` only on backend error; deleting an
    /// absent item still reports success.
    pub async fn remove(&self, id: &str) -> bool {
        match self.api.delete_item(id).await {
            Ok(()) => {
                self.changes.trigger().await;
                true
            }
            Err(err) => {
                error!(item = id, "failed to delete catalog item: {err:#}");
                false
            }
        }
    }

    pub async fn distinct_categories(&self) -> Vec<String> {
        match self.api.fetch_text_column("category").await {
            Ok(values) => dedupe_sorted(values),
            Err(err) => {
                error!("failed to fetch categories: {err:#}");
                Vec::new()
            }
        }
    }

    pub async fn distinct_colors(&self) -> Vec<String> {
        match self.api.fetch_list_column("colors").await {
            Ok(values) => dedupe_sorted(values),
            Err(err) => {
                error!("failed to fetch colors: {err:#}");
                Vec::new()
            }
        }
    }

    pub async fn distinct_sizes(&self) -> Vec<String> {
        match self.api.fetch_list_column("sizes").await {
            Ok(values) => dedupe_sorted(values),
            Err(err) => {
                error!("failed to fetch sizes: {err:#}");
                Vec::new()
            }
        }
    }

    /// Opens the long-lived push channel; every remote table change triggers
    /// one catalog change broadcast. Connection errors do propagate, this is
    /// startup wiring rather than a data path.
    pub async fn subscribe_to_remote_changes(&self) -> Result<RealtimeHandle> {
        let changes = self.changes.clone();
        self.realtime
            .subscribe(move |_change| {
                let changes = changes.clone();
                // One trigger per remote event; the fetch runs on the
                // runtime, not on the socket task.
                tokio::spawn(async move { changes.trigger().await });
            })
            .await
    }
}

/// Deduplicated values in Rust's default string order. Shared by the
/// distinct-value queries and the view facets.
pub(crate) fn dedupe_sorted(values: Vec<String>) -> Vec<String> {
    let unique: BTreeSet<String> = values.into_iter().collect();
    unique.into_iter().collect()
}

/// Seed catalog inserted exactly once, when the remote table is empty.
fn default_items() -> Vec<NewItem> {
    vec![
        NewItem {
            name: "Classic Black Abaya".to_string(),
            description: "Elegant classic black abaya with flowing silhouette, perfect for any \
                          occasion. Made from premium quality fabric with attention to detail."
                .to_string(),
            category: "Classic Abayas".to_string(),
            price: Some("$120".to_string()),
            sizes: vec!["S", "M", "L", "XL"].into_iter().map(String::from).collect(),
            colors: vec!["Black".to_string()],
            images: vec![
                "https://images.unsplash.com/photo-1594633313593-bab3825d0caf?w=400&h=600&fit=crop"
                    .to_string(),
            ],
            videos: vec![],
        },
        NewItem {
            name: "Embroidered Brown Abaya".to_string(),
            description: "Luxurious brown abaya featuring delicate embroidery and modern cut. \
                          Crafted for the discerning woman who appreciates elegance."
                .to_string(),
            category: "Embroidered Collection".to_string(),
            price: Some("$180".to_string()),
            sizes: vec!["S", "M", "L"].into_iter().map(String::from).collect(),
            colors: vec!["Brown".to_string(), "Beige".to_string()],
            images: vec![
                "https://images.unsplash.com/photo-1583292650898-7d22cd27ca6f?w=400&h=600&fit=crop"
                    .to_string(),
            ],
            videos: vec![],
        },
        NewItem {
            name: "Modern Kimono Style Abaya".to_string(),
            description: "Contemporary kimono-inspired abaya with wide sleeves and minimalist \
                          design. Perfect blend of tradition and modernity."
                .to_string(),
            category: "Modern Collection".to_string(),
            price: Some("$155".to_string()),
            sizes: vec!["M", "L", "XL"].into_iter().map(String::from).collect(),
            colors: vec!["Charcoal".to_string(), "Navy".to_string()],
            images: vec![
                "https://images.unsplash.com/photo-1551698618-1dfe5d97d256?w=400&h=600&fit=crop"
                    .to_string(),
            ],
            videos: vec![],
        },
    ]
}
