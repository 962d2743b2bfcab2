//! Name (customer/supplier/facility) records.

use serde::{Deserialize, Serialize};

use super::add_if_unique;

/// A party the store trades with: customer, supplier, facility or patient.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Name {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub email_address: Option<String>,
    /// Internal name type ("facility", "patient", ...).
    #[serde(default)]
    pub name_type: Option<String>,
    #[serde(default)]
    pub is_customer: bool,
    #[serde(default)]
    pub is_supplier: bool,
    #[serde(default)]
    pub is_manufacturer: bool,
    /// Set from the name-store join for this store.
    #[serde(default)]
    pub is_visible: bool,
    #[serde(default)]
    pub supplying_store_id: Option<String>,
    /// Back-references to master lists this name is joined to.
    #[serde(default)]
    pub master_list_ids: Vec<String>,
}

impl Name {
    pub fn add_master_list_if_unique(&mut self, master_list_id: &str) {
        add_if_unique(&mut self.master_list_ids, master_list_id);
    }
}

/// Joins a name to a store; controls name visibility for this store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NameStoreJoin {
    pub id: String,
    #[serde(default)]
    pub name_id: String,
    #[serde(default)]
    pub joins_this_store: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_master_list_if_unique_deduplicates() {
        let mut name = Name {
            id: "n1".to_string(),
            ..Name::default()
        };
        name.add_master_list_if_unique("m1");
        name.add_master_list_if_unique("m1");
        assert_eq!(name.master_list_ids, vec!["m1".to_string()]);
    }
}
