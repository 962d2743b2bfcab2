//! Integration of pulled server records into the local store.
//!
//! Records may arrive in any order, so every foreign key is resolved with
//! `get_or_create`: a reference to a record that has not arrived yet creates
//! a placeholder that a later record fills in. A bad record is skipped with
//! a warning; it never aborts the batch it arrived in.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::db::WriteTransaction;
use crate::error::{Error, Result};
use crate::models::{Entity, RecordKind};
use crate::sync::merge;
use crate::sync::translators::{
    translate_incoming_requisition_status, translate_incoming_status, Direction, NAME_TYPES,
    RECORD_TYPES, REQUISITION_TYPES, SYNC_TYPES, TRANSACTION_TYPES,
};

/// One record in a pull batch, as sent by the server.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct IncomingRecord {
    #[serde(rename = "SyncID", default)]
    pub sync_id: Option<String>,
    #[serde(rename = "RecordType", default)]
    pub record_type: Option<String>,
    #[serde(rename = "RecordID", default)]
    pub record_id: Option<String>,
    #[serde(rename = "SyncType", default)]
    pub sync_type: Option<String>,
    #[serde(rename = "data", default)]
    pub data: Option<Map<String, Value>>,
    #[serde(rename = "mergeIDtokeep", default)]
    pub merge_id_to_keep: Option<String>,
    #[serde(rename = "mergeIDtodelete", default)]
    pub merge_id_to_delete: Option<String>,
}

/// Integrate a whole batch, skipping records that fail to integrate.
pub fn integrate_records(
    wtx: &mut WriteTransaction<'_>,
    store_id: &str,
    records: &[IncomingRecord],
) {
    for record in records {
        if let Err(error) = integrate_record(wtx, store_id, record) {
            tracing::warn!(
                record_type = record.record_type.as_deref().unwrap_or(""),
                record_id = record.record_id.as_deref().unwrap_or(""),
                %error,
                "skipped incoming record"
            );
        }
    }
}

/// Integrate a single incoming record.
///
/// Record types and change types outside the locally modelled vocabulary are
/// silently ignored; the server syncs more tables than a mobile store keeps.
pub fn integrate_record(
    wtx: &mut WriteTransaction<'_>,
    store_id: &str,
    record: &IncomingRecord,
) -> Result<()> {
    let (Some(record_type), Some(sync_type)) =
        (record.record_type.as_deref(), record.sync_type.as_deref())
    else {
        return Ok(());
    };
    let Some(change_type) = SYNC_TYPES.translate(Direction::ExternalToInternal, sync_type) else {
        return Ok(());
    };
    let Some(internal) = RECORD_TYPES.translate(Direction::ExternalToInternal, record_type) else {
        return Ok(());
    };

    match change_type {
        "create" | "update" => {
            let Some(data) = record.data.as_ref() else {
                return Ok(());
            };
            create_or_update(wtx, store_id, internal, data)
        }
        "delete" => {
            let Some(record_id) = record.record_id.as_deref() else {
                return Ok(());
            };
            delete_record(wtx, internal, record_id)
        }
        "merge" => {
            let (Some(keep_id), Some(delete_id)) = (
                record.merge_id_to_keep.as_deref(),
                record.merge_id_to_delete.as_deref(),
            ) else {
                return Ok(());
            };
            merge::merge_records(wtx, internal, keep_id, delete_id)
        }
        _ => Ok(()),
    }
}

/// Create or update one record from its wire data.
pub(crate) fn create_or_update(
    wtx: &mut WriteTransaction<'_>,
    store_id: &str,
    internal: &str,
    data: &Map<String, Value>,
) -> Result<()> {
    if !sanity_check(internal, data) {
        return Err(Error::MalformedIncomingRecord(internal.to_string()));
    }
    // sanity_check guarantees a non-empty ID.
    let Some(id) = str_field(data, "ID") else {
        return Ok(());
    };
    let id = id.to_string();

    match internal {
        "Item" => integrate_item(wtx, &id, data),
        "ItemBatch" => integrate_item_batch(wtx, store_id, &id, data),
        "ItemStoreJoin" => integrate_item_store_join(wtx, store_id, &id, data),
        "LocalListItem" => integrate_local_list_item(wtx, &id, data),
        "MasterList" => integrate_master_list(wtx, &id, data),
        "MasterListItem" => integrate_master_list_item(wtx, &id, data),
        "MasterListNameJoin" => integrate_master_list_name_join(wtx, &id, data),
        "Name" => integrate_name(wtx, &id, data),
        "NameStoreJoin" => integrate_name_store_join(wtx, store_id, &id, data),
        "Requisition" => integrate_requisition(wtx, &id, data),
        "RequisitionItem" => integrate_requisition_item(wtx, &id, data),
        "Stocktake" => integrate_stocktake(wtx, &id, data),
        "StocktakeBatch" => integrate_stocktake_batch(wtx, &id, data),
        "Transaction" => integrate_transaction(wtx, store_id, &id, data),
        "TransactionBatch" => integrate_transaction_batch(wtx, &id, data),
        _ => Ok(()),
    }
}

/// Delete one record by external identity.
pub(crate) fn delete_record(
    wtx: &mut WriteTransaction<'_>,
    internal: &str,
    record_id: &str,
) -> Result<()> {
    match internal {
        // Local list lines live locally as master list items.
        "LocalListItem" => wtx.delete(RecordKind::MasterListItem, record_id),
        "MasterListNameJoin" => {
            wtx.delete(RecordKind::MasterListNameJoin, record_id)?;
            // A local list join is mimicked by a master list sharing its id.
            if wtx.get(RecordKind::MasterList, record_id)?.is_some() {
                wtx.delete(RecordKind::MasterList, record_id)?;
            }
            Ok(())
        }
        other => match RecordKind::parse(other) {
            Some(kind) => wtx.delete(kind, record_id),
            None => Ok(()),
        },
    }
}

fn integrate_item(wtx: &mut WriteTransaction<'_>, id: &str, data: &Map<String, Value>) -> Result<()> {
    let Entity::Item(mut item) = wtx.get_or_create(RecordKind::Item, id)? else {
        return Ok(());
    };
    item.code = text_field(data, "code");
    item.name = text_field(data, "item_name");
    // Every batch is pack-to-one locally.
    item.default_pack_size = Some(1.0);
    item.category_id = text_field(data, "category_ID");
    item.department_id = text_field(data, "department_ID");
    wtx.upsert(&Entity::Item(item))
}

fn integrate_item_batch(
    wtx: &mut WriteTransaction<'_>,
    store_id: &str,
    id: &str,
    data: &Map<String, Value>,
) -> Result<()> {
    // Not for this store.
    if str_field(data, "store_ID") != Some(store_id) {
        return Ok(());
    }
    let item_id = link(wtx, RecordKind::Item, str_field(data, "item_ID"))?;
    let pack_size = parse_number(str_field(data, "pack_size")).unwrap_or(0.0);

    let Entity::ItemBatch(mut batch) = wtx.get_or_create(RecordKind::ItemBatch, id)? else {
        return Ok(());
    };
    batch.item_id = item_id.clone().unwrap_or_default();
    // Pack to one: quantities are multiplied out and prices divided down.
    batch.pack_size = Some(1.0);
    batch.number_of_packs =
        Some(parse_number(str_field(data, "quantity")).unwrap_or(0.0) * pack_size);
    batch.expiry_date = parse_date(str_field(data, "expiry_date"), None);
    batch.batch = text_field(data, "batch");
    batch.cost_price = Some(per_unit(parse_number(str_field(data, "cost_price")), pack_size));
    batch.sell_price = Some(per_unit(parse_number(str_field(data, "sell_price")), pack_size));
    batch.supplier_id = link(wtx, RecordKind::Name, str_field(data, "name_ID"))?;
    batch.donor_id = link(wtx, RecordKind::Name, str_field(data, "donor_ID"))?;
    wtx.upsert(&Entity::ItemBatch(batch))?;

    if let Some(item_id) = item_id {
        let Entity::Item(mut item) = wtx.get_or_create(RecordKind::Item, &item_id)? else {
            return Ok(());
        };
        item.add_batch_if_unique(id);
        wtx.upsert(&Entity::Item(item))?;
    }
    Ok(())
}

fn integrate_item_store_join(
    wtx: &mut WriteTransaction<'_>,
    store_id: &str,
    id: &str,
    data: &Map<String, Value>,
) -> Result<()> {
    let item_id = str_field(data, "item_ID").unwrap_or_default().to_string();
    let joins_this_store = str_field(data, "store_ID") == Some(store_id);
    wtx.upsert(&Entity::ItemStoreJoin(crate::models::ItemStoreJoin {
        id: id.to_string(),
        item_id: item_id.clone(),
        joins_this_store,
    }))?;
    if joins_this_store {
        // The join for this store carries the item's visibility and price.
        let Entity::Item(mut item) = wtx.get_or_create(RecordKind::Item, &item_id)? else {
            return Ok(());
        };
        item.is_visible = !parse_boolean(str_field(data, "inactive"));
        item.default_price = parse_number(str_field(data, "default_price"));
        wtx.upsert(&Entity::Item(item))?;
    }
    Ok(())
}

fn integrate_local_list_item(
    wtx: &mut WriteTransaction<'_>,
    id: &str,
    data: &Map<String, Value>,
) -> Result<()> {
    let item_id = link(wtx, RecordKind::Item, str_field(data, "item_ID"))?;
    // Local lists are mimicked by a master list keyed by the name join's id.
    let join_id = str_field(data, "list_master_name_join_ID").unwrap_or_default();
    let master_list_id = link(wtx, RecordKind::MasterList, Some(join_id))?;

    let Entity::MasterListItem(mut line) = wtx.get_or_create(RecordKind::MasterListItem, id)?
    else {
        return Ok(());
    };
    line.item_id = item_id.unwrap_or_default();
    line.master_list_id = master_list_id.unwrap_or_default();
    line.imprest_quantity = parse_number(str_field(data, "imprest_quantity"));
    wtx.upsert(&Entity::MasterListItem(line))
}

fn integrate_master_list(
    wtx: &mut WriteTransaction<'_>,
    id: &str,
    data: &Map<String, Value>,
) -> Result<()> {
    let Entity::MasterList(mut list) = wtx.get_or_create(RecordKind::MasterList, id)? else {
        return Ok(());
    };
    list.name = text_field(data, "description");
    list.note = text_field(data, "note");
    list.is_program = parse_boolean(str_field(data, "isProgram"));
    wtx.upsert(&Entity::MasterList(list))
}

fn integrate_master_list_item(
    wtx: &mut WriteTransaction<'_>,
    id: &str,
    data: &Map<String, Value>,
) -> Result<()> {
    let master_list_id = link(wtx, RecordKind::MasterList, str_field(data, "item_master_ID"))?;
    let item_id = link(wtx, RecordKind::Item, str_field(data, "item_ID"))?;
    let Entity::MasterListItem(mut line) = wtx.get_or_create(RecordKind::MasterListItem, id)?
    else {
        return Ok(());
    };
    line.master_list_id = master_list_id.unwrap_or_default();
    line.item_id = item_id.unwrap_or_default();
    line.imprest_quantity = parse_number(str_field(data, "imprest_quan"));
    line.price = parse_number(str_field(data, "price"));
    wtx.upsert(&Entity::MasterListItem(line))
}

fn integrate_master_list_name_join(
    wtx: &mut WriteTransaction<'_>,
    id: &str,
    data: &Map<String, Value>,
) -> Result<()> {
    let name_id = str_field(data, "name_ID").unwrap_or_default().to_string();
    link(wtx, RecordKind::Name, Some(&name_id))?;

    let master_list_id = if let Some(list_id) = str_field(data, "list_master_ID") {
        // Regular master list name join.
        let list_id = list_id.to_string();
        link(wtx, RecordKind::MasterList, Some(&list_id))?;
        wtx.upsert(&Entity::MasterListNameJoin(
            crate::models::MasterListNameJoin {
                id: id.to_string(),
                master_list_id: list_id.clone(),
                name_id: name_id.clone(),
            },
        ))?;
        list_id
    } else {
        // A local list join has no master list; mimic one under the join's
        // own id so local list lines have something to attach to.
        let Entity::MasterList(mut list) = wtx.get_or_create(RecordKind::MasterList, id)? else {
            return Ok(());
        };
        list.name = text_field(data, "description");
        wtx.upsert(&Entity::MasterList(list))?;
        id.to_string()
    };

    let Entity::Name(mut name) = wtx.get_or_create(RecordKind::Name, &name_id)? else {
        return Ok(());
    };
    name.add_master_list_if_unique(&master_list_id);
    wtx.upsert(&Entity::Name(name))
}

fn integrate_name(wtx: &mut WriteTransaction<'_>, id: &str, data: &Map<String, Value>) -> Result<()> {
    let Entity::Name(mut name) = wtx.get_or_create(RecordKind::Name, id)? else {
        return Ok(());
    };
    name.name = text_field(data, "name");
    name.code = text_field(data, "code");
    name.phone_number = text_field(data, "phone");
    name.email_address = text_field(data, "email");
    name.name_type = str_field(data, "type")
        .and_then(|value| NAME_TYPES.translate(Direction::ExternalToInternal, value))
        .map(str::to_string);
    name.is_customer = parse_boolean(str_field(data, "customer"));
    name.is_supplier = parse_boolean(str_field(data, "supplier"));
    name.is_manufacturer = parse_boolean(str_field(data, "manufacturer"));
    name.supplying_store_id = text_field(data, "supplying_store_id");
    wtx.upsert(&Entity::Name(name))
}

fn integrate_name_store_join(
    wtx: &mut WriteTransaction<'_>,
    store_id: &str,
    id: &str,
    data: &Map<String, Value>,
) -> Result<()> {
    let name_id = str_field(data, "name_ID").unwrap_or_default().to_string();
    let joins_this_store = str_field(data, "store_ID") == Some(store_id);
    wtx.upsert(&Entity::NameStoreJoin(crate::models::NameStoreJoin {
        id: id.to_string(),
        name_id: name_id.clone(),
        joins_this_store,
    }))?;
    if joins_this_store {
        let Entity::Name(mut name) = wtx.get_or_create(RecordKind::Name, &name_id)? else {
            return Ok(());
        };
        name.is_visible = !parse_boolean(str_field(data, "inactive"));
        wtx.upsert(&Entity::Name(name))?;
    }
    Ok(())
}

fn integrate_requisition(
    wtx: &mut WriteTransaction<'_>,
    id: &str,
    data: &Map<String, Value>,
) -> Result<()> {
    let other_store_name_id = link(wtx, RecordKind::Name, str_field(data, "name_ID"))?;
    let Entity::Requisition(mut requisition) = wtx.get_or_create(RecordKind::Requisition, id)?
    else {
        return Ok(());
    };
    requisition.status = str_field(data, "status")
        .and_then(translate_incoming_requisition_status)
        .map(str::to_string);
    requisition.requisition_type = str_field(data, "type")
        .and_then(|value| REQUISITION_TYPES.translate(Direction::ExternalToInternal, value))
        .map(str::to_string);
    requisition.entry_date = parse_date(str_field(data, "date_entered"), None);
    requisition.days_to_supply = parse_number(str_field(data, "daysToSupply"));
    requisition.serial_number = text_field(data, "serial_number");
    requisition.requester_reference = text_field(data, "requester_reference");
    requisition.comment = text_field(data, "comment");
    requisition.entered_by_id = text_field(data, "user_ID");
    requisition.other_store_name_id = other_store_name_id;
    wtx.upsert(&Entity::Requisition(requisition))
}

fn integrate_requisition_item(
    wtx: &mut WriteTransaction<'_>,
    id: &str,
    data: &Map<String, Value>,
) -> Result<()> {
    let requisition_id = str_field(data, "requisition_ID")
        .unwrap_or_default()
        .to_string();
    link(wtx, RecordKind::Requisition, Some(&requisition_id))?;
    let item_id = link(wtx, RecordKind::Item, str_field(data, "item_ID"))?;

    let Entity::RequisitionItem(mut line) = wtx.get_or_create(RecordKind::RequisitionItem, id)?
    else {
        return Ok(());
    };
    line.requisition_id = requisition_id.clone();
    line.item_id = item_id.unwrap_or_default();
    line.stock_on_hand = parse_number(str_field(data, "stock_on_hand"));
    line.daily_usage = parse_number(str_field(data, "daily_usage"));
    line.required_quantity = parse_number(str_field(data, "Cust_stock_order"));
    line.supplied_quantity = parse_number(str_field(data, "actualQuan"));
    line.suggested_quantity = parse_number(str_field(data, "suggested_quantity"));
    line.comment = text_field(data, "comment");
    line.sort_index = parse_number(str_field(data, "line_number"));
    wtx.upsert(&Entity::RequisitionItem(line))?;

    let Entity::Requisition(mut requisition) =
        wtx.get_or_create(RecordKind::Requisition, &requisition_id)?
    else {
        return Ok(());
    };
    requisition.add_item_if_unique(id);
    wtx.upsert(&Entity::Requisition(requisition))
}

fn integrate_stocktake(
    wtx: &mut WriteTransaction<'_>,
    id: &str,
    data: &Map<String, Value>,
) -> Result<()> {
    let additions_id = link(wtx, RecordKind::Transaction, str_field(data, "invad_additions_ID"))?;
    let reductions_id = link(
        wtx,
        RecordKind::Transaction,
        str_field(data, "invad_reductions_ID"),
    )?;
    let Entity::Stocktake(mut stocktake) = wtx.get_or_create(RecordKind::Stocktake, id)? else {
        return Ok(());
    };
    stocktake.name = text_field(data, "Description");
    stocktake.created_date = parse_date(str_field(data, "stock_take_created_date"), None);
    stocktake.stocktake_date = parse_date(
        str_field(data, "stock_take_date"),
        str_field(data, "stock_take_time"),
    );
    stocktake.status = str_field(data, "status")
        .and_then(translate_incoming_status)
        .map(str::to_string);
    stocktake.created_by_id = text_field(data, "created_by_ID");
    stocktake.finalised_by_id = text_field(data, "finalised_by_ID");
    stocktake.comment = text_field(data, "comment");
    stocktake.serial_number = text_field(data, "serial_number");
    stocktake.additions_id = additions_id;
    stocktake.reductions_id = reductions_id;
    wtx.upsert(&Entity::Stocktake(stocktake))
}

fn integrate_stocktake_batch(
    wtx: &mut WriteTransaction<'_>,
    id: &str,
    data: &Map<String, Value>,
) -> Result<()> {
    let stocktake_id = str_field(data, "stock_take_ID")
        .unwrap_or_default()
        .to_string();
    link(wtx, RecordKind::Stocktake, Some(&stocktake_id))?;
    let item_batch_id = str_field(data, "item_line_ID").unwrap_or_default().to_string();
    let item_id = str_field(data, "item_ID").unwrap_or_default().to_string();
    let pack_size = parse_number(str_field(data, "snapshot_packsize")).unwrap_or(0.0);

    // The referenced stock batch may not have synced yet; make sure it
    // exists and is tied to its item.
    let Entity::ItemBatch(mut item_batch) =
        wtx.get_or_create(RecordKind::ItemBatch, &item_batch_id)?
    else {
        return Ok(());
    };
    item_batch.item_id = item_id.clone();
    wtx.upsert(&Entity::ItemBatch(item_batch))?;
    let Entity::Item(mut item) = wtx.get_or_create(RecordKind::Item, &item_id)? else {
        return Ok(());
    };
    item.add_batch_if_unique(&item_batch_id);
    wtx.upsert(&Entity::Item(item))?;

    let Entity::StocktakeBatch(mut batch) = wtx.get_or_create(RecordKind::StocktakeBatch, id)?
    else {
        return Ok(());
    };
    batch.stocktake_id = stocktake_id.clone();
    batch.item_batch_id = item_batch_id;
    batch.item_id = item_id;
    batch.snapshot_number_of_packs =
        Some(parse_number(str_field(data, "snapshot_qty")).unwrap_or(0.0) * pack_size);
    batch.counted_number_of_packs =
        Some(parse_number(str_field(data, "stock_take_qty")).unwrap_or(0.0) * pack_size);
    batch.pack_size = Some(1.0);
    batch.expiry_date = parse_date(str_field(data, "expiry"), None);
    batch.batch = text_field(data, "Batch");
    batch.cost_price = Some(per_unit(parse_number(str_field(data, "cost_price")), pack_size));
    batch.sell_price = Some(per_unit(parse_number(str_field(data, "sell_price")), pack_size));
    batch.sort_index = parse_number(str_field(data, "line_number"));
    wtx.upsert(&Entity::StocktakeBatch(batch))?;

    let Entity::Stocktake(mut stocktake) =
        wtx.get_or_create(RecordKind::Stocktake, &stocktake_id)?
    else {
        return Ok(());
    };
    stocktake.add_batch_if_unique(id);
    wtx.upsert(&Entity::Stocktake(stocktake))
}

fn integrate_transaction(
    wtx: &mut WriteTransaction<'_>,
    store_id: &str,
    id: &str,
    data: &Map<String, Value>,
) -> Result<()> {
    // Not for this store.
    if str_field(data, "store_ID") != Some(store_id) {
        return Ok(());
    }
    let other_party_id = str_field(data, "name_ID").unwrap_or_default().to_string();
    let Entity::Name(other_party) = wtx.get_or_create(RecordKind::Name, &other_party_id)? else {
        return Ok(());
    };
    let linked_requisition_id = link(wtx, RecordKind::Requisition, str_field(data, "requisition_ID"))?;

    let Entity::Transaction(mut transaction) = wtx.get_or_create(RecordKind::Transaction, id)?
    else {
        return Ok(());
    };
    transaction.serial_number = text_field(data, "invoice_num");
    transaction.comment = text_field(data, "comment");
    transaction.entry_date = parse_date(str_field(data, "entry_date"), None);
    transaction.transaction_type = str_field(data, "type")
        .and_then(|value| TRANSACTION_TYPES.translate(Direction::ExternalToInternal, value))
        .map(str::to_string);
    transaction.status = str_field(data, "status")
        .and_then(translate_incoming_status)
        .map(str::to_string);
    transaction.confirm_date = parse_date(str_field(data, "confirm_date"), None);
    transaction.their_ref = text_field(data, "their_ref");
    transaction.set_other_party(&other_party);
    transaction.linked_requisition_id = linked_requisition_id.clone();
    wtx.upsert(&Entity::Transaction(transaction))?;

    // Keep the back link from the requisition in step.
    if let Some(requisition_id) = linked_requisition_id {
        let Entity::Requisition(mut requisition) =
            wtx.get_or_create(RecordKind::Requisition, &requisition_id)?
        else {
            return Ok(());
        };
        requisition.linked_transaction_id = Some(id.to_string());
        wtx.upsert(&Entity::Requisition(requisition))?;
    }
    Ok(())
}

fn integrate_transaction_batch(
    wtx: &mut WriteTransaction<'_>,
    id: &str,
    data: &Map<String, Value>,
) -> Result<()> {
    let transaction_id = str_field(data, "transaction_ID")
        .unwrap_or_default()
        .to_string();
    link(wtx, RecordKind::Transaction, Some(&transaction_id))?;
    let item_batch_id = str_field(data, "item_line_ID").unwrap_or_default().to_string();
    let item_id = str_field(data, "item_ID").unwrap_or_default().to_string();
    let donor_id = link(wtx, RecordKind::Name, str_field(data, "donor_id"))?;
    let pack_size = parse_number(str_field(data, "pack_size")).unwrap_or(0.0);

    let Entity::ItemBatch(mut item_batch) =
        wtx.get_or_create(RecordKind::ItemBatch, &item_batch_id)?
    else {
        return Ok(());
    };
    item_batch.item_id = item_id.clone();
    item_batch.donor_id = donor_id.clone();
    wtx.upsert(&Entity::ItemBatch(item_batch))?;
    let Entity::Item(mut item) = wtx.get_or_create(RecordKind::Item, &item_id)? else {
        return Ok(());
    };
    item.add_batch_if_unique(&item_batch_id);
    wtx.upsert(&Entity::Item(item))?;

    let Entity::TransactionBatch(mut batch) =
        wtx.get_or_create(RecordKind::TransactionBatch, id)?
    else {
        return Ok(());
    };
    batch.transaction_id = transaction_id.clone();
    batch.item_id = item_id;
    batch.item_name = text_field(data, "item_name");
    batch.item_batch_id = Some(item_batch_id);
    batch.pack_size = Some(1.0);
    batch.number_of_packs =
        Some(parse_number(str_field(data, "quantity")).unwrap_or(0.0) * pack_size);
    batch.cost_price = Some(per_unit(parse_number(str_field(data, "cost_price")), pack_size));
    batch.sell_price = Some(per_unit(parse_number(str_field(data, "sell_price")), pack_size));
    batch.expiry_date = parse_date(str_field(data, "expiry_date"), None);
    batch.batch = text_field(data, "batch");
    batch.note = text_field(data, "note");
    batch.donor_id = donor_id;
    batch.sort_index = parse_number(str_field(data, "line_number"));
    wtx.upsert(&Entity::TransactionBatch(batch))?;

    let Entity::Transaction(mut transaction) =
        wtx.get_or_create(RecordKind::Transaction, &transaction_id)?
    else {
        return Ok(());
    };
    transaction.add_batch_if_unique(id);
    wtx.upsert(&Entity::Transaction(transaction))
}

struct RequiredFields {
    cannot_be_blank: &'static [&'static str],
    can_be_blank: &'static [&'static str],
}

/// Required wire fields per record type, checked before integration.
fn required_fields(internal: &str) -> Option<RequiredFields> {
    let (cannot_be_blank, can_be_blank): (&'static [&'static str], &'static [&'static str]) =
        match internal {
            "Item" => (&["code", "item_name"], &["default_pack_size"]),
            "ItemBatch" => (
                &["item_ID", "quantity"],
                &["pack_size", "batch", "expiry_date", "cost_price", "sell_price", "donor_id"],
            ),
            "ItemStoreJoin" => (&["item_ID", "store_ID"], &[]),
            "LocalListItem" => (&["item_ID", "list_master_name_join_ID"], &[]),
            // Joins without a master list id mimic a local list, so only the
            // name reference is compulsory.
            "MasterListNameJoin" => (&["name_ID"], &["description"]),
            "MasterList" => (&[], &["description", "isProgram"]),
            "MasterListItem" => (&["item_ID"], &[]),
            "Name" => (&["type", "customer", "supplier", "manufacturer"], &["name", "code"]),
            "NameStoreJoin" => (&["name_ID", "store_ID"], &[]),
            "Requisition" => (
                &["status", "type", "daysToSupply"],
                &["date_entered", "serial_number", "requester_reference"],
            ),
            "RequisitionItem" => (
                &["requisition_ID", "item_ID"],
                &["stock_on_hand", "Cust_stock_order"],
            ),
            "Stocktake" => (
                &["status"],
                &["Description", "stock_take_created_date", "serial_number"],
            ),
            "StocktakeBatch" => (
                &["stock_take_ID", "item_line_ID", "item_ID", "snapshot_qty", "snapshot_packsize"],
                &["expiry", "Batch", "cost_price", "sell_price"],
            ),
            "Transaction" => (
                &["name_ID", "type", "status", "store_ID"],
                &["invoice_num", "entry_date"],
            ),
            "TransactionBatch" => (
                &["item_ID", "item_line_ID", "expiry_date", "quantity", "cost_price", "sell_price"],
                &["item_name", "batch", "pack_size", "donor_id"],
            ),
            _ => return None,
        };
    Some(RequiredFields {
        cannot_be_blank,
        can_be_blank,
    })
}

/// Check that the wire data carries every field integration expects.
///
/// Values themselves are not validated; a present-but-odd value integrates
/// as best it can.
pub(crate) fn sanity_check(internal: &str, data: &Map<String, Value>) -> bool {
    // Every record must have an ID.
    if str_field(data, "ID").is_none() {
        return false;
    }
    let Some(required) = required_fields(internal) else {
        return false;
    };
    let non_blank = required
        .cannot_be_blank
        .iter()
        .all(|field| str_field(data, field).is_some());
    let present = required
        .can_be_blank
        .iter()
        .all(|field| data.get(*field).is_some_and(|value| !value.is_null()));
    non_blank && present
}

/// Resolve a foreign key, creating a placeholder when the target has not
/// arrived yet. Blank references resolve to `None`.
fn link(
    wtx: &mut WriteTransaction<'_>,
    kind: RecordKind,
    id: Option<&str>,
) -> Result<Option<String>> {
    let Some(id) = id.filter(|id| !id.is_empty()) else {
        return Ok(None);
    };
    wtx.get_or_create(kind, id)?;
    Ok(Some(id.to_string()))
}

fn str_field<'a>(data: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    data.get(key)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
}

fn text_field(data: &Map<String, Value>, key: &str) -> Option<String> {
    str_field(data, key).map(str::to_string)
}

pub(crate) fn parse_number(value: Option<&str>) -> Option<f64> {
    value?.trim().parse::<f64>().ok()
}

pub(crate) fn parse_boolean(value: Option<&str>) -> bool {
    matches!(value, Some("true" | "True" | "TRUE"))
}

/// Parse a wire date, optionally merged with a separate wire time.
///
/// The server uses "0000-00-00" as its null date.
pub(crate) fn parse_date(
    date: Option<&str>,
    time: Option<&str>,
) -> Option<chrono::NaiveDateTime> {
    let date = date?;
    if date.starts_with("0000-00-00") {
        return None;
    }
    let day = chrono::NaiveDate::parse_from_str(date.get(..10)?, "%Y-%m-%d").ok()?;
    let time = time
        .filter(|time| time.len() >= 8)
        .and_then(|time| chrono::NaiveTime::parse_from_str(time.get(..8)?, "%H:%M:%S").ok())
        .unwrap_or(chrono::NaiveTime::MIN);
    Some(day.and_time(time))
}

fn per_unit(price: Option<f64>, pack_size: f64) -> f64 {
    if pack_size == 0.0 {
        0.0
    } else {
        price.unwrap_or(0.0) / pack_size
    }
}
