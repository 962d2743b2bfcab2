//! Vocabulary translation between internal names and the server's wire
//! vocabulary.
//!
//! Every table maps internal values (left) to external values (right).
//! Unknown values translate to `None`, which callers treat as "skip": the
//! server's vocabulary is wider than the closed set modelled locally.

use std::collections::HashMap;
use std::sync::LazyLock;

/// Which way a value is being translated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    InternalToExternal,
    ExternalToInternal,
}

/// A bidirectional lookup over a fixed set of (internal, external) pairs.
pub struct Translator {
    forward: HashMap<&'static str, &'static str>,
    backward: HashMap<&'static str, &'static str>,
}

impl Translator {
    fn new(pairs: &[(&'static str, &'static str)]) -> Self {
        let mut forward = HashMap::new();
        let mut backward = HashMap::new();
        for &(internal, external) in pairs {
            forward.insert(internal, external);
            // First pair wins when several internal values share an external
            // one, matching insertion order below.
            backward.entry(external).or_insert(internal);
        }
        Self { forward, backward }
    }

    pub fn translate(&self, direction: Direction, value: &str) -> Option<&'static str> {
        let table = match direction {
            Direction::InternalToExternal => &self.forward,
            Direction::ExternalToInternal => &self.backward,
        };
        table.get(value).copied()
    }
}

/// Record type names: internal kind name to server table name.
pub static RECORD_TYPES: LazyLock<Translator> = LazyLock::new(|| {
    Translator::new(&[
        ("Item", "item"),
        ("ItemBatch", "item_line"),
        ("ItemStoreJoin", "item_store_join"),
        ("LocalListItem", "list_local_line"),
        ("MasterList", "list_master"),
        ("MasterListItem", "list_master_line"),
        ("MasterListNameJoin", "list_master_name_join"),
        ("Name", "name"),
        ("NameStoreJoin", "name_store_join"),
        ("Requisition", "requisition"),
        ("RequisitionItem", "requisition_line"),
        ("Stocktake", "Stock_take"),
        ("StocktakeBatch", "Stock_take_lines"),
        ("Transaction", "transact"),
        ("TransactionBatch", "trans_line"),
    ])
});

/// Change type to sync type letter.
pub static SYNC_TYPES: LazyLock<Translator> = LazyLock::new(|| {
    Translator::new(&[
        ("create", "I"),
        ("update", "U"),
        ("delete", "D"),
        ("merge", "M"),
    ])
});

/// Transaction and stocktake statuses.
pub static STATUSES: LazyLock<Translator> = LazyLock::new(|| {
    Translator::new(&[
        ("confirmed", "cn"),
        ("finalised", "fn"),
        ("suggested", "sg"),
        ("new", "nw"),
    ])
});

/// Requisition statuses use a narrower external vocabulary.
pub static REQUISITION_STATUSES: LazyLock<Translator> = LazyLock::new(|| {
    Translator::new(&[
        ("new", "wp"),
        ("suggested", "sg"),
        ("finalised", "fn"),
    ])
});

pub static REQUISITION_TYPES: LazyLock<Translator> = LazyLock::new(|| {
    Translator::new(&[
        ("imprest", "im"),
        ("forecast", "sh"),
        ("request", "request"),
        ("response", "response"),
    ])
});

pub static TRANSACTION_TYPES: LazyLock<Translator> = LazyLock::new(|| {
    Translator::new(&[
        ("customer_invoice", "ci"),
        ("customer_credit", "cc"),
        ("supplier_invoice", "si"),
        ("supplier_credit", "sc"),
        ("inventory_adjustment", "in"),
        ("prescription", "pi"),
        ("receipt", "rc"),
        ("payment", "ps"),
        ("build", "bu"),
        ("repack", "sr"),
    ])
});

pub static NAME_TYPES: LazyLock<Translator> = LazyLock::new(|| {
    Translator::new(&[
        ("inventory_adjustment", "invad"),
        ("facility", "facility"),
        ("patient", "patient"),
        ("build", "build"),
        ("store", "store"),
        ("repack", "repack"),
    ])
});

/// Translate an incoming transaction or stocktake status, folding legacy
/// "web processed" and "web finalised" statuses onto the modelled set.
pub fn translate_incoming_status(value: &str) -> Option<&'static str> {
    match value {
        "wp" => Some("new"),
        "wf" => Some("finalised"),
        other => STATUSES.translate(Direction::ExternalToInternal, other),
    }
}

/// Translate an incoming requisition status. Confirmed and web-finalised
/// requisitions are treated as finalised: neither is editable on a mobile
/// store.
pub fn translate_incoming_requisition_status(value: &str) -> Option<&'static str> {
    match value {
        "cn" | "wf" => Some("finalised"),
        other => REQUISITION_STATUSES.translate(Direction::ExternalToInternal, other),
    }
}
