//! Stocktake records and their lines.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::add_if_unique;

/// A stock count over some or all of the store's batches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stocktake {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub created_date: Option<NaiveDateTime>,
    #[serde(default)]
    pub stocktake_date: Option<NaiveDateTime>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub serial_number: Option<String>,
    #[serde(default)]
    pub created_by_id: Option<String>,
    #[serde(default)]
    pub finalised_by_id: Option<String>,
    /// Inventory adjustment transactions generated on finalisation.
    #[serde(default)]
    pub additions_id: Option<String>,
    #[serde(default)]
    pub reductions_id: Option<String>,
    /// Back-references to this stocktake's lines.
    #[serde(default)]
    pub batch_ids: Vec<String>,
}

impl Stocktake {
    pub fn add_batch_if_unique(&mut self, batch_id: &str) {
        add_if_unique(&mut self.batch_ids, batch_id);
    }
}

/// One counted batch within a stocktake.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StocktakeBatch {
    pub id: String,
    #[serde(default)]
    pub stocktake_id: String,
    #[serde(default)]
    pub item_batch_id: String,
    #[serde(default)]
    pub item_id: String,
    #[serde(default)]
    pub snapshot_number_of_packs: Option<f64>,
    #[serde(default)]
    pub counted_number_of_packs: Option<f64>,
    #[serde(default)]
    pub pack_size: Option<f64>,
    #[serde(default)]
    pub expiry_date: Option<NaiveDateTime>,
    #[serde(default)]
    pub batch: Option<String>,
    #[serde(default)]
    pub cost_price: Option<f64>,
    #[serde(default)]
    pub sell_price: Option<f64>,
    #[serde(default)]
    pub sort_index: Option<f64>,
}
