use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use vetrina::config::Config;
use vetrina::store::CatalogStore;
use vetrina::views::{AdminView, GalleryView};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("vetrina=debug")
        .init();

    info!("Starting Vetrina catalog");

    let config = Config::load()?;
    let store = Arc::new(CatalogStore::new(&config)?);

    store.initialize_if_empty().await;

    let gallery = Arc::new(GalleryView::new());
    let admin = Arc::new(AdminView::new());
    let _gallery_subscription = store.changes().subscribe(gallery.clone()).await;
    let _admin_subscription = store.changes().subscribe(admin.clone()).await;

    let realtime = store.subscribe_to_remote_changes().await?;

    // Populate the views with the current catalog before any change arrives.
    store.changes().trigger().await;
    info!(items = gallery.results_count().await, "catalog ready");

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    realtime.shutdown();

    Ok(())
}
