//! Master list records and their joins.

use serde::{Deserialize, Serialize};

/// A server-curated list of items (including local lists mimicked under the
/// id of their name join).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MasterList {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub is_program: bool,
}

/// Joins an item into a master list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MasterListItem {
    pub id: String,
    #[serde(default)]
    pub master_list_id: String,
    #[serde(default)]
    pub item_id: String,
    #[serde(default)]
    pub imprest_quantity: Option<f64>,
    #[serde(default)]
    pub price: Option<f64>,
}

/// Joins a name to a master list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MasterListNameJoin {
    pub id: String,
    #[serde(default)]
    pub master_list_id: String,
    #[serde(default)]
    pub name_id: String,
}
