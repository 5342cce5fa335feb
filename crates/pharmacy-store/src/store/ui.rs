//! Advisory per-collection UI state: a search query and a filter bag.
//!
//! The store only holds this state. Consuming pages apply it to the
//! collections themselves.

use pharmacy_core::EntityKind;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Search and filter state for one collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewState {
    pub query: String,
    pub filters: BTreeMap<String, Value>,
}

#[derive(Debug, Default)]
pub(crate) struct UiState {
    views: HashMap<EntityKind, ViewState>,
}

impl UiState {
    pub(crate) fn set_query(&mut self, kind: EntityKind, query: String) {
        self.views.entry(kind).or_default().query = query;
    }

    pub(crate) fn set_filter(&mut self, kind: EntityKind, key: String, value: Value) {
        self.views.entry(kind).or_default().filters.insert(key, value);
    }

    /// Drops the filter bag; the search query is kept.
    pub(crate) fn clear_filters(&mut self, kind: EntityKind) {
        if let Some(view) = self.views.get_mut(&kind) {
            view.filters.clear();
        }
    }

    pub(crate) fn view(&self, kind: EntityKind) -> ViewState {
        self.views.get(&kind).cloned().unwrap_or_default()
    }

    pub(crate) fn clear(&mut self) {
        self.views.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_views_are_per_collection() {
        let mut ui = UiState::default();
        ui.set_query(EntityKind::Products, "amox".into());
        ui.set_filter(EntityKind::Products, "category".into(), json!("Antibiotics"));
        ui.set_filter(EntityKind::Orders, "status".into(), json!("pending"));

        assert_eq!(ui.view(EntityKind::Products).query, "amox");
        assert_eq!(ui.view(EntityKind::Orders).query, "");
        assert_eq!(ui.view(EntityKind::Users), ViewState::default());

        ui.clear_filters(EntityKind::Products);
        let products = ui.view(EntityKind::Products);
        assert!(products.filters.is_empty());
        assert_eq!(products.query, "amox");
        assert_eq!(ui.view(EntityKind::Orders).filters.len(), 1);
    }
}
