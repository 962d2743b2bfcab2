//! Translation of queued local changes into the server's record shape.
//!
//! The server expects every data value as a string, dates split into
//! separate date and time fields, and its own column names per table.

use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::db::Store;
use crate::error::{Error, Result};
use crate::models::{
    ChangeType, Entity, ItemBatch, Name, Requisition, RequisitionItem, Stocktake, StocktakeBatch,
    Transaction, TransactionBatch,
};
use crate::sync::outbox::OutboxEntry;
use crate::sync::translators::{
    Direction, NAME_TYPES, RECORD_TYPES, REQUISITION_STATUSES, REQUISITION_TYPES, STATUSES,
    SYNC_TYPES, TRANSACTION_TYPES,
};

/// One record in a push batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutgoingRecord {
    #[serde(rename = "SyncID")]
    pub sync_id: String,
    #[serde(rename = "RecordType")]
    pub record_type: String,
    #[serde(rename = "RecordID")]
    pub record_id: String,
    #[serde(rename = "SyncType")]
    pub sync_type: String,
    #[serde(rename = "StoreID")]
    pub store_id: String,
    #[serde(rename = "Data", skip_serializing_if = "Option::is_none")]
    pub data: Option<Map<String, Value>>,
}

/// Translate one queued change into its outgoing form.
///
/// Fails with [`Error::MissingRecord`] when the queued record no longer
/// exists locally; deletions carry no data so they always translate.
pub fn generate_outgoing_record(
    store: &Store,
    store_id: &str,
    entry: &OutboxEntry,
) -> Result<OutgoingRecord> {
    let internal = entry.record_type.as_str();
    let record_type = RECORD_TYPES
        .translate(Direction::InternalToExternal, internal)
        .ok_or_else(|| Error::UnsupportedRecordType(internal.to_string()))?;
    let sync_type = SYNC_TYPES
        .translate(Direction::InternalToExternal, entry.change_type.as_str())
        .ok_or_else(|| Error::UnsupportedRecordType(entry.change_type.as_str().to_string()))?;

    let mut record = OutgoingRecord {
        sync_id: entry.id.clone(),
        record_type: record_type.to_string(),
        record_id: entry.record_id.clone(),
        sync_type: sync_type.to_string(),
        store_id: store_id.to_string(),
        data: None,
    };
    if entry.change_type == ChangeType::Delete {
        return Ok(record);
    }

    let entity = store
        .get(entry.record_type, &entry.record_id)?
        .ok_or_else(|| Error::MissingRecord {
            record_type: internal.to_string(),
            record_id: entry.record_id.clone(),
        })?;

    record.data = Some(match &entity {
        Entity::ItemBatch(batch) => item_batch_data(batch, store_id),
        Entity::Name(name) => name_data(name, store_id),
        Entity::Transaction(transaction) => transaction_data(transaction, store_id),
        Entity::TransactionBatch(batch) => transaction_batch_data(batch),
        Entity::Requisition(requisition) => requisition_data(requisition, store_id),
        Entity::RequisitionItem(line) => requisition_item_data(line),
        Entity::Stocktake(stocktake) => stocktake_data(stocktake, store_id),
        Entity::StocktakeBatch(batch) => stocktake_batch_data(batch),
        _ => return Err(Error::UnsupportedRecordType(internal.to_string())),
    });
    Ok(record)
}

fn item_batch_data(batch: &ItemBatch, store_id: &str) -> Map<String, Value> {
    let number_of_packs = batch.number_of_packs.unwrap_or(0.0);
    let cost_price = batch.cost_price.unwrap_or(0.0);
    string_map(vec![
        ("ID", batch.id.clone()),
        ("store_ID", store_id.to_string()),
        ("item_ID", batch.item_id.clone()),
        ("pack_size", number(batch.pack_size)),
        ("expiry_date", date_string(batch.expiry_date)),
        ("batch", text(&batch.batch)),
        ("available", number_of_packs.to_string()),
        ("quantity", number_of_packs.to_string()),
        ("stock_on_hand_tot", batch.total_quantity().to_string()),
        ("cost_price", cost_price.to_string()),
        ("sell_price", number(batch.sell_price)),
        ("total_cost", (cost_price * number_of_packs).to_string()),
        ("name_ID", text(&batch.supplier_id)),
        ("donor_id", text(&batch.donor_id)),
    ])
}

fn name_data(name: &Name, store_id: &str) -> Map<String, Value> {
    let name_type = name
        .name_type
        .as_deref()
        .and_then(|value| NAME_TYPES.translate(Direction::InternalToExternal, value))
        .unwrap_or_default();
    string_map(vec![
        ("id", name.id.clone()),
        ("type", name_type.to_string()),
        ("name", text(&name.name)),
        ("code", text(&name.code)),
        ("email", text(&name.email_address)),
        (
            "supplying_store_id",
            name.supplying_store_id
                .clone()
                .unwrap_or_else(|| store_id.to_string()),
        ),
        ("phone", text(&name.phone_number)),
        ("customer", name.is_customer.to_string()),
    ])
}

fn transaction_data(transaction: &Transaction, store_id: &str) -> Map<String, Value> {
    let transaction_type = transaction
        .transaction_type
        .as_deref()
        .and_then(|value| TRANSACTION_TYPES.translate(Direction::InternalToExternal, value))
        .unwrap_or_default();
    let status = transaction
        .status
        .as_deref()
        .and_then(|value| STATUSES.translate(Direction::InternalToExternal, value))
        .unwrap_or_default();
    string_map(vec![
        ("ID", transaction.id.clone()),
        ("name_ID", text(&transaction.other_party_id)),
        ("invoice_num", text(&transaction.serial_number)),
        ("comment", text(&transaction.comment)),
        ("entry_date", date_string(transaction.entry_date)),
        ("entry_time", time_string(transaction.entry_date)),
        ("type", transaction_type.to_string()),
        ("status", status.to_string()),
        ("their_ref", text(&transaction.their_ref)),
        ("confirm_date", date_string(transaction.confirm_date)),
        ("confirm_time", time_string(transaction.confirm_date)),
        ("store_ID", store_id.to_string()),
        ("requisition_ID", text(&transaction.linked_requisition_id)),
    ])
}

fn transaction_batch_data(batch: &TransactionBatch) -> Map<String, Value> {
    string_map(vec![
        ("ID", batch.id.clone()),
        ("transaction_ID", batch.transaction_id.clone()),
        ("item_ID", batch.item_id.clone()),
        ("batch", text(&batch.batch)),
        ("price_extension", batch.total().to_string()),
        ("note", text(&batch.note)),
        ("cost_price", number(batch.cost_price)),
        ("sell_price", number(batch.sell_price)),
        ("expiry_date", date_string(batch.expiry_date)),
        ("pack_size", number(batch.pack_size)),
        ("quantity", number(batch.number_of_packs)),
        ("item_line_ID", text(&batch.item_batch_id)),
        ("line_number", number(batch.sort_index)),
        ("item_name", text(&batch.item_name)),
        ("donor_id", text(&batch.donor_id)),
    ])
}

fn requisition_data(requisition: &Requisition, store_id: &str) -> Map<String, Value> {
    let status = requisition
        .status
        .as_deref()
        .and_then(|value| REQUISITION_STATUSES.translate(Direction::InternalToExternal, value))
        .unwrap_or_default();
    let requisition_type = requisition
        .requisition_type
        .as_deref()
        .and_then(|value| REQUISITION_TYPES.translate(Direction::InternalToExternal, value))
        .unwrap_or_default();
    string_map(vec![
        ("ID", requisition.id.clone()),
        ("date_entered", date_string(requisition.entry_date)),
        ("user_ID", text(&requisition.entered_by_id)),
        ("name_ID", text(&requisition.other_store_name_id)),
        ("status", status.to_string()),
        ("daysToSupply", number(requisition.days_to_supply)),
        ("store_ID", store_id.to_string()),
        ("serial_number", text(&requisition.serial_number)),
        (
            "requester_reference",
            text(&requisition.requester_reference),
        ),
        ("comment", text(&requisition.comment)),
        ("type", requisition_type.to_string()),
    ])
}

fn requisition_item_data(line: &RequisitionItem) -> Map<String, Value> {
    string_map(vec![
        ("ID", line.id.clone()),
        ("requisition_ID", line.requisition_id.clone()),
        ("item_ID", line.item_id.clone()),
        ("stock_on_hand", number(line.stock_on_hand)),
        ("daily_usage", number(line.daily_usage)),
        ("suggested_quantity", number(line.suggested_quantity)),
        ("actualQuan", number(line.supplied_quantity)),
        ("line_number", number(line.sort_index)),
        ("comment", text(&line.comment)),
        ("Cust_stock_order", number(line.required_quantity)),
    ])
}

fn stocktake_data(stocktake: &Stocktake, store_id: &str) -> Map<String, Value> {
    let status = stocktake
        .status
        .as_deref()
        .and_then(|value| STATUSES.translate(Direction::InternalToExternal, value))
        .unwrap_or_default();
    string_map(vec![
        ("ID", stocktake.id.clone()),
        ("Description", text(&stocktake.name)),
        ("stock_take_date", date_string(stocktake.stocktake_date)),
        ("stock_take_time", time_string(stocktake.stocktake_date)),
        ("created_by_ID", text(&stocktake.created_by_id)),
        ("status", status.to_string()),
        ("finalised_by_ID", text(&stocktake.finalised_by_id)),
        ("invad_additions_ID", text(&stocktake.additions_id)),
        ("invad_reductions_ID", text(&stocktake.reductions_id)),
        ("store_ID", store_id.to_string()),
        ("comment", text(&stocktake.comment)),
        (
            "stock_take_created_date",
            date_string(stocktake.created_date),
        ),
        ("serial_number", text(&stocktake.serial_number)),
    ])
}

fn stocktake_batch_data(batch: &StocktakeBatch) -> Map<String, Value> {
    string_map(vec![
        ("ID", batch.id.clone()),
        ("stock_take_ID", batch.stocktake_id.clone()),
        ("item_line_ID", batch.item_batch_id.clone()),
        ("snapshot_qty", number(batch.snapshot_number_of_packs)),
        ("snapshot_packsize", number(batch.pack_size)),
        ("stock_take_qty", number(batch.counted_number_of_packs)),
        ("line_number", number(batch.sort_index)),
        ("expiry", date_string(batch.expiry_date)),
        ("cost_price", number(batch.cost_price)),
        ("sell_price", number(batch.sell_price)),
        ("Batch", text(&batch.batch)),
        ("item_ID", batch.item_id.clone()),
    ])
}

fn string_map(pairs: Vec<(&str, String)>) -> Map<String, Value> {
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_string(), Value::String(value)))
        .collect()
}

fn text(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn number(value: Option<f64>) -> String {
    value.unwrap_or(0.0).to_string()
}

fn date_string(date: Option<NaiveDateTime>) -> String {
    date.map_or_else(
        || "0000-00-00".to_string(),
        |date| date.format("%Y-%m-%d").to_string(),
    )
}

fn time_string(date: Option<NaiveDateTime>) -> String {
    date.map_or_else(
        || "00:00:00".to_string(),
        |date| date.format("%H:%M:%S").to_string(),
    )
}
