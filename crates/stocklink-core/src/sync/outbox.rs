//! The outgoing change queue.
//!
//! Local changes to pushed record kinds are recorded here, inside the same
//! transaction that wrote them, and drained oldest-first by the push phase
//! of sync. The queue stays disabled until sync has been initialised so a
//! half-configured store never accumulates unsendable entries.

use std::sync::atomic::{AtomicBool, Ordering};

use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::{ChangeEvent, ChangeOrigin, Store, WriteTransaction};
use crate::error::Result;
use crate::models::{ChangeType, RecordKind};

/// One queued outgoing change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboxEntry {
    pub id: String,
    pub change_type: ChangeType,
    pub record_type: RecordKind,
    pub record_id: String,
    pub change_time: i64,
}

/// Observes committed local changes and maintains the queue.
pub struct Outbox {
    enabled: AtomicBool,
}

impl Outbox {
    pub(crate) fn new() -> Self {
        Self {
            enabled: AtomicBool::new(false),
        }
    }

    /// Start queueing local changes. Called once sync is initialised.
    pub fn enable(&self) {
        self.enabled.store(true, Ordering::SeqCst);
    }

    /// Stop queueing, used while re-initialising against a new site.
    pub fn disable(&self) {
        self.enabled.store(false, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// React to one change event inside its originating transaction.
    ///
    /// Failures are logged rather than propagated: a queueing problem must
    /// not roll back the record write that caused it.
    pub(crate) fn observe(
        &self,
        wtx: &WriteTransaction<'_>,
        origin: ChangeOrigin,
        event: &ChangeEvent,
    ) {
        if !self.is_enabled() || origin == ChangeOrigin::Sync || !event.kind.is_pushed() {
            return;
        }
        if let Err(error) = self.try_observe(wtx, event) {
            tracing::error!(
                record_type = %event.kind,
                record_id = %event.record_id,
                %error,
                "failed to queue outgoing change"
            );
        }
    }

    fn try_observe(&self, wtx: &WriteTransaction<'_>, event: &ChangeEvent) -> Result<()> {
        let conn = wtx.connection();
        match event.change_type {
            // A deletion supersedes every earlier change to the record.
            ChangeType::Delete => {
                delete_for_record(conn, event.kind, &event.record_id)?;
                insert_entry(conn, &OutboxEntry::for_event(event))?;
            }
            ChangeType::Create | ChangeType::Update => {
                let finalised = wtx
                    .get(event.kind, &event.record_id)?
                    .is_some_and(|entity| entity.is_finalised());
                let conn = wtx.connection();
                if finalised {
                    // Finalised records are immutable; one entry covers the
                    // whole edit history.
                    delete_for_record(conn, event.kind, &event.record_id)?;
                    insert_entry(conn, &OutboxEntry::for_event(event))?;
                } else if !contains(conn, event)? {
                    insert_entry(conn, &OutboxEntry::for_event(event))?;
                }
            }
        }
        Ok(())
    }

    /// Number of queued entries.
    pub fn len(&self, store: &Store) -> Result<u64> {
        let count: i64 =
            store
                .connection()
                .query_row("SELECT COUNT(*) FROM outbox", [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    pub fn is_empty(&self, store: &Store) -> Result<bool> {
        Ok(self.len(store)? == 0)
    }

    /// The oldest `limit` entries, in the order they should be pushed.
    pub fn next(&self, store: &Store, limit: usize) -> Result<Vec<OutboxEntry>> {
        let mut stmt = store.connection().prepare(
            "SELECT id, record_type, record_id, change_type, change_time
             FROM outbox ORDER BY change_time ASC, rowid ASC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, i64>(4)?,
            ))
        })?;
        let mut entries = Vec::new();
        for row in rows {
            let (id, record_type, record_id, change_type, change_time) = row?;
            let record_type = RecordKind::parse(&record_type).ok_or_else(|| {
                crate::Error::InvalidInput(format!("unknown queued record type: {record_type}"))
            })?;
            let change_type = ChangeType::parse(&change_type).ok_or_else(|| {
                crate::Error::InvalidInput(format!("unknown queued change type: {change_type}"))
            })?;
            entries.push(OutboxEntry {
                id,
                change_type,
                record_type,
                record_id,
                change_time,
            });
        }
        Ok(entries)
    }

    /// Remove entries once acknowledged (or dropped as unsendable).
    pub fn remove(&self, store: &Store, entries: &[OutboxEntry]) -> Result<()> {
        let mut stmt = store
            .connection()
            .prepare("DELETE FROM outbox WHERE id = ?1")?;
        for entry in entries {
            stmt.execute(params![entry.id])?;
        }
        Ok(())
    }
}

impl OutboxEntry {
    fn for_event(event: &ChangeEvent) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            change_type: event.change_type,
            record_type: event.kind,
            record_id: event.record_id.clone(),
            change_time: chrono::Utc::now().timestamp_millis(),
        }
    }
}

fn insert_entry(conn: &Connection, entry: &OutboxEntry) -> Result<()> {
    conn.execute(
        "INSERT INTO outbox (id, record_type, record_id, change_type, change_time)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            entry.id,
            entry.record_type.as_str(),
            entry.record_id,
            entry.change_type.as_str(),
            entry.change_time,
        ],
    )?;
    Ok(())
}

fn delete_for_record(conn: &Connection, kind: RecordKind, record_id: &str) -> Result<()> {
    conn.execute(
        "DELETE FROM outbox WHERE record_type = ?1 AND record_id = ?2",
        params![kind.as_str(), record_id],
    )?;
    Ok(())
}

fn contains(conn: &Connection, event: &ChangeEvent) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM outbox
         WHERE record_type = ?1 AND record_id = ?2 AND change_type = ?3",
        params![
            event.kind.as_str(),
            event.record_id,
            event.change_type.as_str(),
        ],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Entity, Item, Requisition, Transaction, STATUS_FINALISED};
    use pretty_assertions::assert_eq;

    fn enabled_store() -> Store {
        let store = Store::open_in_memory().unwrap();
        store.outbox().enable();
        store
    }

    fn requisition(id: &str, status: &str) -> Entity {
        Entity::Requisition(Requisition {
            id: id.to_string(),
            status: Some(status.to_string()),
            ..Requisition::default()
        })
    }

    fn queued(store: &Store) -> Vec<OutboxEntry> {
        store.outbox().next(store, usize::MAX).unwrap()
    }

    #[test]
    fn disabled_outbox_records_nothing() {
        let mut store = Store::open_in_memory().unwrap();
        store
            .write(ChangeOrigin::Local, |wtx| {
                wtx.upsert(&requisition("r1", "new"))
            })
            .unwrap();
        assert!(store.outbox().is_empty(&store).unwrap());
    }

    #[test]
    fn sync_origin_changes_are_not_queued() {
        let mut store = enabled_store();
        store
            .write(ChangeOrigin::Sync, |wtx| {
                wtx.upsert(&requisition("r1", "new"))
            })
            .unwrap();
        assert!(store.outbox().is_empty(&store).unwrap());
    }

    #[test]
    fn unpushed_kinds_are_not_queued() {
        let mut store = enabled_store();
        store
            .write(ChangeOrigin::Local, |wtx| {
                wtx.upsert(&Entity::Item(Item {
                    id: "i1".to_string(),
                    ..Item::default()
                }))
            })
            .unwrap();
        assert!(store.outbox().is_empty(&store).unwrap());
    }

    #[test]
    fn repeated_identical_changes_queue_once() {
        let mut store = enabled_store();
        for _ in 0..3 {
            store
                .write(ChangeOrigin::Local, |wtx| {
                    wtx.upsert(&requisition("r1", "new"))
                })
                .unwrap();
        }
        // One create plus one update; the second and third updates collapse.
        let entries = queued(&store);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].change_type, ChangeType::Create);
        assert_eq!(entries[1].change_type, ChangeType::Update);
    }

    #[test]
    fn delete_purges_earlier_entries() {
        let mut store = enabled_store();
        store
            .write(ChangeOrigin::Local, |wtx| {
                wtx.upsert(&requisition("r1", "new"))?;
                wtx.upsert(&requisition("r1", "suggested"))?;
                wtx.delete(RecordKind::Requisition, "r1")
            })
            .unwrap();
        let entries = queued(&store);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].change_type, ChangeType::Delete);
        assert_eq!(entries[0].record_id, "r1");
    }

    #[test]
    fn finalising_collapses_the_edit_history() {
        let mut store = enabled_store();
        store
            .write(ChangeOrigin::Local, |wtx| {
                wtx.upsert(&Entity::Transaction(Transaction {
                    id: "t1".to_string(),
                    status: Some("confirmed".to_string()),
                    ..Transaction::default()
                }))
            })
            .unwrap();
        store
            .write(ChangeOrigin::Local, |wtx| {
                wtx.upsert(&Entity::Transaction(Transaction {
                    id: "t1".to_string(),
                    status: Some(STATUS_FINALISED.to_string()),
                    ..Transaction::default()
                }))
            })
            .unwrap();
        let entries = queued(&store);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].change_type, ChangeType::Update);
        assert_eq!(entries[0].record_id, "t1");
    }

    #[test]
    fn next_returns_oldest_first_and_remove_drains() {
        let mut store = enabled_store();
        for id in ["r1", "r2", "r3"] {
            store
                .write(ChangeOrigin::Local, |wtx| wtx.upsert(&requisition(id, "new")))
                .unwrap();
        }
        let outbox = store.outbox();
        assert_eq!(outbox.len(&store).unwrap(), 3);

        let first_two = outbox.next(&store, 2).unwrap();
        assert_eq!(first_two.len(), 2);
        assert_eq!(first_two[0].record_id, "r1");
        assert_eq!(first_two[1].record_id, "r2");

        outbox.remove(&store, &first_two).unwrap();
        let rest = outbox.next(&store, 10).unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].record_id, "r3");
    }
}
