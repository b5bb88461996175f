use crate::models::Item;

/// Gallery filter state. Active criteria are conjunctive; an empty filter
/// passes every item.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemFilter {
    /// Case-insensitive substring matched against name, description,
    /// category and every color label.
    pub query: Option<String>,
    /// Exact size label the item must carry.
    pub size: Option<String>,
    /// Exact category the item must belong to.
    pub category: Option<String>,
}

impl ItemFilter {
    pub fn is_empty(&self) -> bool {
        self.active_query().is_none() && self.size.is_none() && self.category.is_none()
    }

    fn active_query(&self) -> Option<String> {
        self.query
            .as_deref()
            .map(|query| query.trim().to_lowercase())
            .filter(|query| !query.is_empty())
    }

    pub fn matches(&self, item: &Item) -> bool {
        if let Some(size) = &self.size
            && !item.sizes.iter().any(|candidate| candidate == size)
        {
            return false;
        }

        if let Some(category) = &self.category
            && item.category != *category
        {
            return false;
        }

        if let Some(query) = self.active_query() {
            let hit = item.name.to_lowercase().contains(&query)
                || item.description.to_lowercase().contains(&query)
                || item.category.to_lowercase().contains(&query)
                || item
                    .colors
                    .iter()
                    .any(|color| color.to_lowercase().contains(&query));
            if !hit {
                return false;
            }
        }

        true
    }

    /// Items passing the filter, in snapshot order.
    pub fn apply(&self, items: &[Item]) -> Vec<Item> {
        items
            .iter()
            .filter(|item| self.matches(item))
            .cloned()
            .collect()
    }
}
