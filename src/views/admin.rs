use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::events::ChangeListener;
use crate::models::Item;

/// One row of the admin item list.
#[derive(Debug, Clone, PartialEq)]
pub struct AdminRow {
    pub id: String,
    pub name: String,
    pub category: String,
}

/// Admin list state, refreshed on every catalog change broadcast
/// independently of the gallery.
#[derive(Default)]
pub struct AdminView {
    rows: RwLock<Vec<AdminRow>>,
}

impl AdminView {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn rows(&self) -> Vec<AdminRow> {
        self.rows.read().await.clone()
    }
}

#[async_trait]
impl ChangeListener for AdminView {
    async fn on_catalog_changed(&self, items: &[Item]) -> Result<()> {
        let rows = items
            .iter()
            .map(|item| AdminRow {
                id: item.id.clone(),
                name: item.name.clone(),
                category: item.category.clone(),
            })
            .collect::<Vec<_>>();

        debug!(rows = rows.len(), "admin list refreshed");
        *self.rows.write().await = rows;
        Ok(())
    }
}
