//! Typed domain graph shared by the local store and the sync engine.
//!
//! Entities reference each other by stable id only; the store resolves ids
//! on demand, so partially-arrived graphs are always representable.

mod item;
mod master_list;
mod name;
mod requisition;
mod stocktake;
mod transaction;

pub use item::{Item, ItemBatch, ItemStoreJoin};
pub use master_list::{MasterList, MasterListItem, MasterListNameJoin};
pub use name::{Name, NameStoreJoin};
pub use requisition::{Requisition, RequisitionItem};
pub use stocktake::{Stocktake, StocktakeBatch};
pub use transaction::{Transaction, TransactionBatch};

/// Status value shared by transactions, requisitions and stocktakes that
/// marks the record as an immutable business milestone.
pub const STATUS_FINALISED: &str = "finalised";

/// The type of change a local mutation or incoming record represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeType {
    Create,
    Update,
    Delete,
}

impl ChangeType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "create" => Some(Self::Create),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }
}

/// The closed set of record kinds the local store models.
///
/// External record types outside this set are tolerated (and ignored) at the
/// translation boundary rather than represented here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Item,
    ItemBatch,
    ItemStoreJoin,
    Name,
    NameStoreJoin,
    Transaction,
    TransactionBatch,
    Requisition,
    RequisitionItem,
    Stocktake,
    StocktakeBatch,
    MasterList,
    MasterListItem,
    MasterListNameJoin,
}

impl RecordKind {
    pub const ALL: [Self; 14] = [
        Self::Item,
        Self::ItemBatch,
        Self::ItemStoreJoin,
        Self::Name,
        Self::NameStoreJoin,
        Self::Transaction,
        Self::TransactionBatch,
        Self::Requisition,
        Self::RequisitionItem,
        Self::Stocktake,
        Self::StocktakeBatch,
        Self::MasterList,
        Self::MasterListItem,
        Self::MasterListNameJoin,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Item => "Item",
            Self::ItemBatch => "ItemBatch",
            Self::ItemStoreJoin => "ItemStoreJoin",
            Self::Name => "Name",
            Self::NameStoreJoin => "NameStoreJoin",
            Self::Transaction => "Transaction",
            Self::TransactionBatch => "TransactionBatch",
            Self::Requisition => "Requisition",
            Self::RequisitionItem => "RequisitionItem",
            Self::Stocktake => "Stocktake",
            Self::StocktakeBatch => "StocktakeBatch",
            Self::MasterList => "MasterList",
            Self::MasterListItem => "MasterListItem",
            Self::MasterListNameJoin => "MasterListNameJoin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }

    /// Whether local changes to this kind are pushed to the server.
    pub const fn is_pushed(self) -> bool {
        matches!(
            self,
            Self::Name
                | Self::ItemBatch
                | Self::Transaction
                | Self::TransactionBatch
                | Self::Requisition
                | Self::RequisitionItem
                | Self::Stocktake
                | Self::StocktakeBatch
        )
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One record of the domain graph, tagged with its kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Item(Item),
    ItemBatch(ItemBatch),
    ItemStoreJoin(ItemStoreJoin),
    Name(Name),
    NameStoreJoin(NameStoreJoin),
    Transaction(Transaction),
    TransactionBatch(TransactionBatch),
    Requisition(Requisition),
    RequisitionItem(RequisitionItem),
    Stocktake(Stocktake),
    StocktakeBatch(StocktakeBatch),
    MasterList(MasterList),
    MasterListItem(MasterListItem),
    MasterListNameJoin(MasterListNameJoin),
}

impl Entity {
    pub const fn kind(&self) -> RecordKind {
        match self {
            Self::Item(_) => RecordKind::Item,
            Self::ItemBatch(_) => RecordKind::ItemBatch,
            Self::ItemStoreJoin(_) => RecordKind::ItemStoreJoin,
            Self::Name(_) => RecordKind::Name,
            Self::NameStoreJoin(_) => RecordKind::NameStoreJoin,
            Self::Transaction(_) => RecordKind::Transaction,
            Self::TransactionBatch(_) => RecordKind::TransactionBatch,
            Self::Requisition(_) => RecordKind::Requisition,
            Self::RequisitionItem(_) => RecordKind::RequisitionItem,
            Self::Stocktake(_) => RecordKind::Stocktake,
            Self::StocktakeBatch(_) => RecordKind::StocktakeBatch,
            Self::MasterList(_) => RecordKind::MasterList,
            Self::MasterListItem(_) => RecordKind::MasterListItem,
            Self::MasterListNameJoin(_) => RecordKind::MasterListNameJoin,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Item(record) => &record.id,
            Self::ItemBatch(record) => &record.id,
            Self::ItemStoreJoin(record) => &record.id,
            Self::Name(record) => &record.id,
            Self::NameStoreJoin(record) => &record.id,
            Self::Transaction(record) => &record.id,
            Self::TransactionBatch(record) => &record.id,
            Self::Requisition(record) => &record.id,
            Self::RequisitionItem(record) => &record.id,
            Self::Stocktake(record) => &record.id,
            Self::StocktakeBatch(record) => &record.id,
            Self::MasterList(record) => &record.id,
            Self::MasterListItem(record) => &record.id,
            Self::MasterListNameJoin(record) => &record.id,
        }
    }

    /// Serialize the inner record (the kind is stored separately).
    pub fn to_value(&self) -> serde_json::Result<serde_json::Value> {
        match self {
            Self::Item(record) => serde_json::to_value(record),
            Self::ItemBatch(record) => serde_json::to_value(record),
            Self::ItemStoreJoin(record) => serde_json::to_value(record),
            Self::Name(record) => serde_json::to_value(record),
            Self::NameStoreJoin(record) => serde_json::to_value(record),
            Self::Transaction(record) => serde_json::to_value(record),
            Self::TransactionBatch(record) => serde_json::to_value(record),
            Self::Requisition(record) => serde_json::to_value(record),
            Self::RequisitionItem(record) => serde_json::to_value(record),
            Self::Stocktake(record) => serde_json::to_value(record),
            Self::StocktakeBatch(record) => serde_json::to_value(record),
            Self::MasterList(record) => serde_json::to_value(record),
            Self::MasterListItem(record) => serde_json::to_value(record),
            Self::MasterListNameJoin(record) => serde_json::to_value(record),
        }
    }

    pub fn from_value(kind: RecordKind, value: serde_json::Value) -> serde_json::Result<Self> {
        Ok(match kind {
            RecordKind::Item => Self::Item(serde_json::from_value(value)?),
            RecordKind::ItemBatch => Self::ItemBatch(serde_json::from_value(value)?),
            RecordKind::ItemStoreJoin => Self::ItemStoreJoin(serde_json::from_value(value)?),
            RecordKind::Name => Self::Name(serde_json::from_value(value)?),
            RecordKind::NameStoreJoin => Self::NameStoreJoin(serde_json::from_value(value)?),
            RecordKind::Transaction => Self::Transaction(serde_json::from_value(value)?),
            RecordKind::TransactionBatch => Self::TransactionBatch(serde_json::from_value(value)?),
            RecordKind::Requisition => Self::Requisition(serde_json::from_value(value)?),
            RecordKind::RequisitionItem => Self::RequisitionItem(serde_json::from_value(value)?),
            RecordKind::Stocktake => Self::Stocktake(serde_json::from_value(value)?),
            RecordKind::StocktakeBatch => Self::StocktakeBatch(serde_json::from_value(value)?),
            RecordKind::MasterList => Self::MasterList(serde_json::from_value(value)?),
            RecordKind::MasterListItem => Self::MasterListItem(serde_json::from_value(value)?),
            RecordKind::MasterListNameJoin => {
                Self::MasterListNameJoin(serde_json::from_value(value)?)
            }
        })
    }

    /// Build the minimal form of a record, used when a foreign key arrives
    /// before the record it points at.
    pub fn placeholder(kind: RecordKind, id: &str) -> Self {
        let id = id.to_string();
        match kind {
            RecordKind::Item => Self::Item(Item {
                id,
                ..Item::default()
            }),
            RecordKind::ItemBatch => Self::ItemBatch(ItemBatch {
                id,
                ..ItemBatch::default()
            }),
            RecordKind::ItemStoreJoin => Self::ItemStoreJoin(ItemStoreJoin {
                id,
                ..ItemStoreJoin::default()
            }),
            RecordKind::Name => Self::Name(Name {
                id,
                ..Name::default()
            }),
            RecordKind::NameStoreJoin => Self::NameStoreJoin(NameStoreJoin {
                id,
                ..NameStoreJoin::default()
            }),
            RecordKind::Transaction => Self::Transaction(Transaction {
                id,
                ..Transaction::default()
            }),
            RecordKind::TransactionBatch => Self::TransactionBatch(TransactionBatch {
                id,
                ..TransactionBatch::default()
            }),
            RecordKind::Requisition => Self::Requisition(Requisition {
                id,
                ..Requisition::default()
            }),
            RecordKind::RequisitionItem => Self::RequisitionItem(RequisitionItem {
                id,
                ..RequisitionItem::default()
            }),
            RecordKind::Stocktake => Self::Stocktake(Stocktake {
                id,
                ..Stocktake::default()
            }),
            RecordKind::StocktakeBatch => Self::StocktakeBatch(StocktakeBatch {
                id,
                ..StocktakeBatch::default()
            }),
            RecordKind::MasterList => Self::MasterList(MasterList {
                id,
                ..MasterList::default()
            }),
            RecordKind::MasterListItem => Self::MasterListItem(MasterListItem {
                id,
                ..MasterListItem::default()
            }),
            RecordKind::MasterListNameJoin => Self::MasterListNameJoin(MasterListNameJoin {
                id,
                ..MasterListNameJoin::default()
            }),
        }
    }

    /// Whether this record has reached an immutable business milestone.
    pub fn is_finalised(&self) -> bool {
        match self {
            Self::Transaction(record) => record.status.as_deref() == Some(STATUS_FINALISED),
            Self::Requisition(record) => record.status.as_deref() == Some(STATUS_FINALISED),
            Self::Stocktake(record) => record.status.as_deref() == Some(STATUS_FINALISED),
            _ => false,
        }
    }
}

/// Append `id` to `ids` unless it is already present.
pub(crate) fn add_if_unique(ids: &mut Vec<String>, id: &str) {
    if !ids.iter().any(|existing| existing == id) {
        ids.push(id.to_string());
    }
}
