//! Item, stock batch, and item visibility records.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::add_if_unique;

/// A catalogue item (drug, consumable, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    /// Every batch is pack-to-one locally, so this stays 1 for synced items.
    #[serde(default)]
    pub default_pack_size: Option<f64>,
    #[serde(default)]
    pub default_price: Option<f64>,
    /// Set from the item-store join for this store.
    #[serde(default)]
    pub is_visible: bool,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub department_id: Option<String>,
    /// Back-references to the stock batches of this item.
    #[serde(default)]
    pub batch_ids: Vec<String>,
}

impl Item {
    pub fn add_batch_if_unique(&mut self, batch_id: &str) {
        add_if_unique(&mut self.batch_ids, batch_id);
    }
}

/// One batch of stock for an item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemBatch {
    pub id: String,
    #[serde(default)]
    pub item_id: String,
    #[serde(default)]
    pub pack_size: Option<f64>,
    #[serde(default)]
    pub number_of_packs: Option<f64>,
    #[serde(default)]
    pub expiry_date: Option<NaiveDateTime>,
    #[serde(default)]
    pub batch: Option<String>,
    /// Per-unit prices; wire prices arrive per pack and are divided down.
    #[serde(default)]
    pub cost_price: Option<f64>,
    #[serde(default)]
    pub sell_price: Option<f64>,
    #[serde(default)]
    pub supplier_id: Option<String>,
    #[serde(default)]
    pub donor_id: Option<String>,
}

impl ItemBatch {
    pub fn total_quantity(&self) -> f64 {
        self.number_of_packs.unwrap_or(0.0) * self.pack_size.unwrap_or(1.0)
    }
}

/// Joins an item to a store; controls item visibility for this store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemStoreJoin {
    pub id: String,
    #[serde(default)]
    pub item_id: String,
    #[serde(default)]
    pub joins_this_store: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_batch_if_unique_deduplicates() {
        let mut item = Item {
            id: "i1".to_string(),
            ..Item::default()
        };
        item.add_batch_if_unique("b1");
        item.add_batch_if_unique("b2");
        item.add_batch_if_unique("b1");
        assert_eq!(item.batch_ids, vec!["b1".to_string(), "b2".to_string()]);
    }

    #[test]
    fn total_quantity_multiplies_packs_by_pack_size() {
        let batch = ItemBatch {
            id: "b1".to_string(),
            pack_size: Some(10.0),
            number_of_packs: Some(3.0),
            ..ItemBatch::default()
        };
        assert!((batch.total_quantity() - 30.0).abs() < f64::EPSILON);
    }
}
