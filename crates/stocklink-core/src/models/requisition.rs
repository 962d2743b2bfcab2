//! Requisition (stock order) records and their lines.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::add_if_unique;

/// A stock order against another store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Requisition {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    /// Internal requisition type ("request", "response", "imprest", ...).
    #[serde(default)]
    pub requisition_type: Option<String>,
    #[serde(default)]
    pub entry_date: Option<NaiveDateTime>,
    #[serde(default)]
    pub days_to_supply: Option<f64>,
    #[serde(default)]
    pub serial_number: Option<String>,
    #[serde(default)]
    pub requester_reference: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub other_store_name_id: Option<String>,
    #[serde(default)]
    pub entered_by_id: Option<String>,
    #[serde(default)]
    pub linked_transaction_id: Option<String>,
    /// Back-references to this requisition's lines.
    #[serde(default)]
    pub item_ids: Vec<String>,
}

impl Requisition {
    pub fn add_item_if_unique(&mut self, requisition_item_id: &str) {
        add_if_unique(&mut self.item_ids, requisition_item_id);
    }
}

/// One line of a requisition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequisitionItem {
    pub id: String,
    #[serde(default)]
    pub requisition_id: String,
    #[serde(default)]
    pub item_id: String,
    #[serde(default)]
    pub stock_on_hand: Option<f64>,
    #[serde(default)]
    pub daily_usage: Option<f64>,
    #[serde(default)]
    pub required_quantity: Option<f64>,
    #[serde(default)]
    pub suggested_quantity: Option<f64>,
    #[serde(default)]
    pub supplied_quantity: Option<f64>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub sort_index: Option<f64>,
}
