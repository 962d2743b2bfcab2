//! Transaction (invoice) records and their lines.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::{add_if_unique, Name};

/// An invoice or inventory movement against another party.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    #[serde(default)]
    pub serial_number: Option<String>,
    #[serde(default)]
    pub other_party_id: Option<String>,
    /// Denormalised from the other party; keep in sync via `set_other_party`.
    #[serde(default)]
    pub other_party_name: Option<String>,
    /// Internal transaction type ("customer_invoice", ...).
    #[serde(default)]
    pub transaction_type: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub entry_date: Option<NaiveDateTime>,
    #[serde(default)]
    pub confirm_date: Option<NaiveDateTime>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub their_ref: Option<String>,
    #[serde(default)]
    pub linked_requisition_id: Option<String>,
    /// Back-references to this transaction's lines.
    #[serde(default)]
    pub batch_ids: Vec<String>,
}

impl Transaction {
    /// Repoint the other party, recomputing the denormalised party name.
    pub fn set_other_party(&mut self, party: &Name) {
        self.other_party_id = Some(party.id.clone());
        self.other_party_name = party.name.clone();
    }

    pub fn add_batch_if_unique(&mut self, batch_id: &str) {
        add_if_unique(&mut self.batch_ids, batch_id);
    }
}

/// One line of a transaction, tied to an item batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionBatch {
    pub id: String,
    #[serde(default)]
    pub transaction_id: String,
    #[serde(default)]
    pub item_id: String,
    #[serde(default)]
    pub item_name: Option<String>,
    #[serde(default)]
    pub item_batch_id: Option<String>,
    #[serde(default)]
    pub pack_size: Option<f64>,
    #[serde(default)]
    pub number_of_packs: Option<f64>,
    #[serde(default)]
    pub cost_price: Option<f64>,
    #[serde(default)]
    pub sell_price: Option<f64>,
    #[serde(default)]
    pub expiry_date: Option<NaiveDateTime>,
    #[serde(default)]
    pub batch: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub donor_id: Option<String>,
    #[serde(default)]
    pub sort_index: Option<f64>,
}

impl TransactionBatch {
    pub fn total(&self) -> f64 {
        self.sell_price.unwrap_or(0.0) * self.number_of_packs.unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_other_party_updates_denormalised_name() {
        let mut transaction = Transaction {
            id: "t1".to_string(),
            other_party_id: Some("old".to_string()),
            other_party_name: Some("Old Clinic".to_string()),
            ..Transaction::default()
        };
        let party = Name {
            id: "new".to_string(),
            name: Some("New Clinic".to_string()),
            ..Name::default()
        };
        transaction.set_other_party(&party);
        assert_eq!(transaction.other_party_id.as_deref(), Some("new"));
        assert_eq!(transaction.other_party_name.as_deref(), Some("New Clinic"));
    }
}
