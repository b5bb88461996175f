use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::events::ChangeListener;
use crate::filter::ItemFilter;
use crate::models::Item;
use crate::store::dedupe_sorted;

/// Filter facet values derived from the current snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Facets {
    pub sizes: Vec<String>,
    pub categories: Vec<String>,
}

#[derive(Default)]
struct GalleryState {
    items: Vec<Item>,
    visible: Vec<Item>,
    facets: Facets,
    filter: ItemFilter,
}

/// Gallery view state, refreshed on every catalog change broadcast. Filter
/// changes re-apply against the retained snapshot without touching the
/// network.
#[derive(Default)]
pub struct GalleryView {
    state: RwLock<GalleryState>,
}

impl GalleryView {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_filter(&self, filter: ItemFilter) {
        let mut state = self.state.write().await;
        state.filter = filter;
        state.visible = state.filter.apply(&state.items);
    }

    pub async fn clear_filter(&self) {
        self.set_filter(ItemFilter::default()).await;
    }

    pub async fn filter(&self) -> ItemFilter {
        self.state.read().await.filter.clone()
    }

    /// Items currently passing the active filter, in snapshot order.
    pub async fn visible(&self) -> Vec<Item> {
        self.state.read().await.visible.clone()
    }

    pub async fn results_count(&self) -> usize {
        self.state.read().await.visible.len()
    }

    pub async fn facets(&self) -> Facets {
        self.state.read().await.facets.clone()
    }
}

#[async_trait]
impl ChangeListener for GalleryView {
    async fn on_catalog_changed(&self, items: &[Item]) -> Result<()> {
        let mut state = self.state.write().await;
        state.items = items.to_vec();
        state.visible = state.filter.apply(&state.items);
        state.facets = Facets {
            sizes: dedupe_sorted(items.iter().flat_map(|item| item.sizes.clone()).collect()),
            categories: dedupe_sorted(items.iter().map(|item| item.category.clone()).collect()),
        };

        debug!(
            total = state.items.len(),
            visible = state.visible.len(),
            "gallery refreshed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn item(name: &str, category: &str, sizes: &[&str]) -> Item {
        Item {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            description: String::new(),
            category: category.to_string(),
            price: None,
            sizes: sizes.iter().map(|s| s.to_string()).collect(),
            colors: vec![],
            images: vec![],
            videos: vec![],
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn refresh_updates_visible_items_and_facets() {
        let gallery = GalleryView::new();
        let snapshot = vec![
            item("Classic", "Classic Abayas", &["S", "M"]),
            item("Kimono", "Modern Collection", &["M", "XL"]),
        ];

        gallery.on_catalog_changed(&snapshot).await.unwrap();

        assert_eq!(gallery.results_count().await, 2);
        let facets = gallery.facets().await;
        assert_eq!(facets.sizes, vec!["M", "S", "XL"]);
        assert_eq!(
            facets.categories,
            vec!["Classic Abayas", "Modern Collection"]
        );
    }

    #[tokio::test]
    async fn active_filter_survives_a_refresh() {
        let gallery = GalleryView::new();
        gallery
            .set_filter(ItemFilter {
                category: Some("Modern Collection".to_string()),
                ..Default::default()
            })
            .await;

        let snapshot = vec![
            item("Classic", "Classic Abayas", &["S"]),
            item("Kimono", "Modern Collection", &["M"]),
        ];
        gallery.on_catalog_changed(&snapshot).await.unwrap();

        let visible = gallery.visible().await;
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].name, "Kimono");
    }

    #[tokio::test]
    async fn changing_the_filter_reuses_the_retained_snapshot() {
        let gallery = GalleryView::new();
        let snapshot = vec![
            item("Classic", "Classic Abayas", &["S"]),
            item("Kimono", "Modern Collection", &["M"]),
        ];
        gallery.on_catalog_changed(&snapshot).await.unwrap();

        gallery
            .set_filter(ItemFilter {
                size: Some("S".to_string()),
                ..Default::default()
            })
            .await;
        assert_eq!(gallery.results_count().await, 1);

        gallery.clear_filter().await;
        assert_eq!(gallery.results_count().await, 2);
    }
}
