//! Duplicate-record merge directives.
//!
//! The server can decide that two records are the same real-world thing and
//! instruct every site to keep one and fold the other into it. Merging
//! repoints all dependent records, deduplicates master list joins, unions
//! collection fields, and finally deletes the merged record.

use crate::db::WriteTransaction;
use crate::error::Result;
use crate::models::{Entity, Name, RecordKind};
use crate::sync::incoming::delete_record;

/// Apply one merge directive.
///
/// A directive whose records are not both present is a no-op: the merge may
/// have already been applied on a previous pull, or may reference records
/// this store never had.
pub fn merge_records(
    wtx: &mut WriteTransaction<'_>,
    internal: &str,
    keep_id: &str,
    delete_id: &str,
) -> Result<()> {
    let Some(kind) = RecordKind::parse(internal) else {
        return Ok(());
    };
    // Merging is only meaningful for the shared reference records.
    if !matches!(kind, RecordKind::Item | RecordKind::Name) {
        return Ok(());
    }
    let (Some(keep), Some(merged)) = (wtx.get(kind, keep_id)?, wtx.get(kind, delete_id)?) else {
        tracing::debug!(
            record_type = internal,
            keep_id,
            delete_id,
            "merge directive references records not present; ignoring"
        );
        return Ok(());
    };

    match (keep, merged) {
        (Entity::Item(mut keep), Entity::Item(merged)) => {
            repoint_item_dependents(wtx, keep_id, delete_id)?;
            dedup_joins(
                wtx,
                RecordKind::MasterListItem,
                "item_id",
                keep_id,
                delete_id,
            )?;
            for batch_id in &merged.batch_ids {
                keep.add_batch_if_unique(batch_id);
            }
            keep.is_visible = keep.is_visible || merged.is_visible;
            wtx.upsert(&Entity::Item(keep))?;
        }
        (Entity::Name(mut keep), Entity::Name(merged)) => {
            repoint_name_dependents(wtx, &keep, delete_id)?;
            dedup_joins(
                wtx,
                RecordKind::MasterListNameJoin,
                "name_id",
                keep_id,
                delete_id,
            )?;
            for master_list_id in &merged.master_list_ids {
                keep.add_master_list_if_unique(master_list_id);
            }
            keep.is_visible = keep.is_visible || merged.is_visible;
            wtx.upsert(&Entity::Name(keep))?;
        }
        _ => return Ok(()),
    }

    delete_record(wtx, internal, delete_id)
}

/// Repoint every record referencing a merged item at the kept one.
fn repoint_item_dependents(
    wtx: &mut WriteTransaction<'_>,
    keep_id: &str,
    delete_id: &str,
) -> Result<()> {
    for entity in wtx.find_referencing(RecordKind::ItemBatch, "item_id", delete_id)? {
        if let Entity::ItemBatch(mut batch) = entity {
            batch.item_id = keep_id.to_string();
            wtx.upsert(&Entity::ItemBatch(batch))?;
        }
    }
    for entity in wtx.find_referencing(RecordKind::RequisitionItem, "item_id", delete_id)? {
        if let Entity::RequisitionItem(mut line) = entity {
            line.item_id = keep_id.to_string();
            wtx.upsert(&Entity::RequisitionItem(line))?;
        }
    }
    for entity in wtx.find_referencing(RecordKind::StocktakeBatch, "item_id", delete_id)? {
        if let Entity::StocktakeBatch(mut batch) = entity {
            batch.item_id = keep_id.to_string();
            wtx.upsert(&Entity::StocktakeBatch(batch))?;
        }
    }
    for entity in wtx.find_referencing(RecordKind::TransactionBatch, "item_id", delete_id)? {
        if let Entity::TransactionBatch(mut batch) = entity {
            batch.item_id = keep_id.to_string();
            wtx.upsert(&Entity::TransactionBatch(batch))?;
        }
    }
    Ok(())
}

/// Repoint every record referencing a merged name at the kept one.
fn repoint_name_dependents(
    wtx: &mut WriteTransaction<'_>,
    keep: &Name,
    delete_id: &str,
) -> Result<()> {
    for entity in wtx.find_referencing(RecordKind::ItemBatch, "supplier_id", delete_id)? {
        if let Entity::ItemBatch(mut batch) = entity {
            batch.supplier_id = Some(keep.id.clone());
            wtx.upsert(&Entity::ItemBatch(batch))?;
        }
    }
    for entity in wtx.find_referencing(RecordKind::Transaction, "other_party_id", delete_id)? {
        if let Entity::Transaction(mut transaction) = entity {
            // Keeps the denormalised party name in step.
            transaction.set_other_party(keep);
            wtx.upsert(&Entity::Transaction(transaction))?;
        }
    }
    for entity in wtx.find_referencing(RecordKind::Requisition, "other_store_name_id", delete_id)? {
        if let Entity::Requisition(mut requisition) = entity {
            requisition.other_store_name_id = Some(keep.id.clone());
            wtx.upsert(&Entity::Requisition(requisition))?;
        }
    }
    Ok(())
}

/// Repoint master list joins, deleting any that would duplicate a join the
/// kept record already has on the same list.
fn dedup_joins(
    wtx: &mut WriteTransaction<'_>,
    join_kind: RecordKind,
    field: &str,
    keep_id: &str,
    delete_id: &str,
) -> Result<()> {
    let kept_lists: Vec<String> = wtx
        .find_referencing(join_kind, field, keep_id)?
        .iter()
        .filter_map(join_master_list_id)
        .collect();

    for entity in wtx.find_referencing(join_kind, field, delete_id)? {
        let Some(list_id) = join_master_list_id(&entity) else {
            continue;
        };
        if kept_lists.contains(&list_id) {
            wtx.delete(join_kind, entity.id())?;
        } else {
            wtx.upsert(&repointed_join(entity, keep_id))?;
        }
    }
    Ok(())
}

fn join_master_list_id(entity: &Entity) -> Option<String> {
    match entity {
        Entity::MasterListItem(line) => Some(line.master_list_id.clone()),
        Entity::MasterListNameJoin(join) => Some(join.master_list_id.clone()),
        _ => None,
    }
}

fn repointed_join(entity: Entity, keep_id: &str) -> Entity {
    match entity {
        Entity::MasterListItem(mut line) => {
            line.item_id = keep_id.to_string();
            Entity::MasterListItem(line)
        }
        Entity::MasterListNameJoin(mut join) => {
            join.name_id = keep_id.to_string();
            Entity::MasterListNameJoin(join)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ChangeOrigin, Store};
    use crate::models::{
        Item, ItemBatch, MasterListItem, MasterListNameJoin, Requisition, Transaction,
    };
    use pretty_assertions::assert_eq;

    fn merge(store: &mut Store, internal: &str, keep: &str, delete: &str) {
        store
            .write(ChangeOrigin::Sync, |wtx| {
                merge_records(wtx, internal, keep, delete)
            })
            .unwrap();
    }

    fn seed(store: &mut Store, entities: Vec<Entity>) {
        store
            .write(ChangeOrigin::Sync, |wtx| {
                for entity in &entities {
                    wtx.upsert(entity)?;
                }
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn merging_names_repoints_dependents_and_denormalised_fields() {
        let mut store = Store::open_in_memory().unwrap();
        seed(
            &mut store,
            vec![
                Entity::Name(Name {
                    id: "keep".to_string(),
                    name: Some("Main Clinic".to_string()),
                    is_visible: false,
                    ..Name::default()
                }),
                Entity::Name(Name {
                    id: "dup".to_string(),
                    name: Some("Main Clinc".to_string()),
                    is_visible: true,
                    master_list_ids: vec!["ml1".to_string()],
                    ..Name::default()
                }),
                Entity::Transaction(Transaction {
                    id: "t1".to_string(),
                    other_party_id: Some("dup".to_string()),
                    other_party_name: Some("Main Clinc".to_string()),
                    ..Transaction::default()
                }),
                Entity::Requisition(Requisition {
                    id: "r1".to_string(),
                    other_store_name_id: Some("dup".to_string()),
                    ..Requisition::default()
                }),
                Entity::ItemBatch(ItemBatch {
                    id: "b1".to_string(),
                    supplier_id: Some("dup".to_string()),
                    ..ItemBatch::default()
                }),
            ],
        );

        merge(&mut store, "Name", "keep", "dup");

        let Some(Entity::Transaction(transaction)) =
            store.get(RecordKind::Transaction, "t1").unwrap()
        else {
            panic!("expected transaction");
        };
        assert_eq!(transaction.other_party_id.as_deref(), Some("keep"));
        assert_eq!(transaction.other_party_name.as_deref(), Some("Main Clinic"));

        let Some(Entity::Requisition(requisition)) =
            store.get(RecordKind::Requisition, "r1").unwrap()
        else {
            panic!("expected requisition");
        };
        assert_eq!(requisition.other_store_name_id.as_deref(), Some("keep"));

        let Some(Entity::ItemBatch(batch)) = store.get(RecordKind::ItemBatch, "b1").unwrap()
        else {
            panic!("expected batch");
        };
        assert_eq!(batch.supplier_id.as_deref(), Some("keep"));

        // Visibility and master list membership are unioned onto the keeper.
        let Some(Entity::Name(keep)) = store.get(RecordKind::Name, "keep").unwrap() else {
            panic!("expected name");
        };
        assert!(keep.is_visible);
        assert_eq!(keep.master_list_ids, vec!["ml1".to_string()]);

        // The merged record is gone.
        assert!(store.get(RecordKind::Name, "dup").unwrap().is_none());
    }

    #[test]
    fn merging_items_deduplicates_master_list_joins() {
        let mut store = Store::open_in_memory().unwrap();
        seed(
            &mut store,
            vec![
                Entity::Item(Item {
                    id: "keep".to_string(),
                    ..Item::default()
                }),
                Entity::Item(Item {
                    id: "dup".to_string(),
                    ..Item::default()
                }),
                // Keeper already joined to ml1; duplicate join collapses.
                Entity::MasterListItem(MasterListItem {
                    id: "j1".to_string(),
                    master_list_id: "ml1".to_string(),
                    item_id: "keep".to_string(),
                    ..MasterListItem::default()
                }),
                Entity::MasterListItem(MasterListItem {
                    id: "j2".to_string(),
                    master_list_id: "ml1".to_string(),
                    item_id: "dup".to_string(),
                    ..MasterListItem::default()
                }),
                // Join to a list the keeper is not on; it is repointed.
                Entity::MasterListItem(MasterListItem {
                    id: "j3".to_string(),
                    master_list_id: "ml2".to_string(),
                    item_id: "dup".to_string(),
                    ..MasterListItem::default()
                }),
            ],
        );

        merge(&mut store, "Item", "keep", "dup");

        assert!(store.get(RecordKind::MasterListItem, "j2").unwrap().is_none());
        let Some(Entity::MasterListItem(join)) =
            store.get(RecordKind::MasterListItem, "j3").unwrap()
        else {
            panic!("expected join");
        };
        assert_eq!(join.item_id, "keep");
        assert!(store.get(RecordKind::Item, "dup").unwrap().is_none());
    }

    #[test]
    fn merge_with_missing_records_is_a_noop() {
        let mut store = Store::open_in_memory().unwrap();
        seed(
            &mut store,
            vec![Entity::Name(Name {
                id: "keep".to_string(),
                ..Name::default()
            })],
        );
        // Applying the same directive twice: the second run sees no merged
        // record and does nothing.
        merge(&mut store, "Name", "keep", "gone");
        assert!(store.get(RecordKind::Name, "keep").unwrap().is_some());
    }

    #[test]
    fn merge_ignores_unmergeable_kinds() {
        let mut store = Store::open_in_memory().unwrap();
        seed(
            &mut store,
            vec![
                Entity::MasterListNameJoin(MasterListNameJoin {
                    id: "a".to_string(),
                    ..MasterListNameJoin::default()
                }),
                Entity::MasterListNameJoin(MasterListNameJoin {
                    id: "b".to_string(),
                    ..MasterListNameJoin::default()
                }),
            ],
        );
        merge(&mut store, "MasterListNameJoin", "a", "b");
        assert!(store
            .get(RecordKind::MasterListNameJoin, "b")
            .unwrap()
            .is_some());
    }
}
