//! Record arena over `SQLite`.
//!
//! Every domain record is stored as one JSON document keyed by (kind, id), so
//! records referencing each other can arrive and be linked in any order.
//! Mutations flow through [`Store::write`], which collects change events,
//! feeds them to the outbox inside the same transaction, and notifies
//! listeners once the transaction has committed.

use std::path::Path;
use std::sync::Arc;

use rusqlite::{params, Connection, OptionalExtension, Transaction};

use crate::error::Result;
use crate::models::{ChangeType, Entity, RecordKind};
use crate::sync::outbox::Outbox;

use super::migrations;

/// Where a mutation came from. Only local changes feed the outbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOrigin {
    Local,
    Sync,
}

/// A committed mutation to one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub change_type: ChangeType,
    pub kind: RecordKind,
    pub record_id: String,
}

type Listener = Box<dyn Fn(&ChangeEvent) + Send>;

/// The local database: domain records, the sync outbox and settings.
pub struct Store {
    conn: Connection,
    outbox: Arc<Outbox>,
    listeners: Vec<Listener>,
}

impl Store {
    /// Open a store at the given path, creating it if it doesn't exist.
    ///
    /// Runs migrations automatically.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Open an in-memory store (useful for testing).
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;",
        )?;
        migrations::run(&conn)?;
        Ok(Self {
            conn,
            outbox: Arc::new(Outbox::new()),
            listeners: Vec::new(),
        })
    }

    /// The outbox observing this store's local changes.
    pub fn outbox(&self) -> Arc<Outbox> {
        Arc::clone(&self.outbox)
    }

    /// Register a listener called after each committed change.
    pub fn subscribe(&mut self, listener: impl Fn(&ChangeEvent) + Send + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Run `f` inside a single transaction.
    ///
    /// Change events raised by `f` are handed to the outbox before the
    /// transaction commits, so record writes and their queue entries are
    /// atomic. Listeners run after a successful commit.
    pub fn write<T>(
        &mut self,
        origin: ChangeOrigin,
        f: impl FnOnce(&mut WriteTransaction<'_>) -> Result<T>,
    ) -> Result<T> {
        let outbox = Arc::clone(&self.outbox);
        let tx = self.conn.transaction()?;
        let mut wtx = WriteTransaction {
            tx,
            events: Vec::new(),
        };
        let value = f(&mut wtx)?;
        let events = std::mem::take(&mut wtx.events);
        for event in &events {
            outbox.observe(&wtx, origin, event);
        }
        let WriteTransaction { tx, .. } = wtx;
        tx.commit()?;
        for event in &events {
            for listener in &self.listeners {
                listener(event);
            }
        }
        Ok(value)
    }

    pub fn get(&self, kind: RecordKind, id: &str) -> Result<Option<Entity>> {
        get_record(&self.conn, kind, id)
    }

    pub fn list(&self, kind: RecordKind) -> Result<Vec<Entity>> {
        list_records(&self.conn, kind)
    }

    /// All records of `kind` whose JSON field `field` equals `id`.
    pub fn find_referencing(&self, kind: RecordKind, field: &str, id: &str) -> Result<Vec<Entity>> {
        find_referencing(&self.conn, kind, field, id)
    }

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT (key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    pub(crate) const fn connection(&self) -> &Connection {
        &self.conn
    }
}

/// A transaction over the record arena, accumulating change events.
pub struct WriteTransaction<'conn> {
    tx: Transaction<'conn>,
    events: Vec<ChangeEvent>,
}

impl WriteTransaction<'_> {
    pub fn get(&self, kind: RecordKind, id: &str) -> Result<Option<Entity>> {
        get_record(&self.tx, kind, id)
    }

    pub fn list(&self, kind: RecordKind) -> Result<Vec<Entity>> {
        list_records(&self.tx, kind)
    }

    pub fn find_referencing(&self, kind: RecordKind, field: &str, id: &str) -> Result<Vec<Entity>> {
        find_referencing(&self.tx, kind, field, id)
    }

    /// Fetch a record, creating a placeholder for it if it is not present.
    ///
    /// Placeholder creation raises no change event: a record stub made to
    /// satisfy a foreign key is not a change worth pushing.
    pub fn get_or_create(&mut self, kind: RecordKind, id: &str) -> Result<Entity> {
        if let Some(entity) = get_record(&self.tx, kind, id)? {
            return Ok(entity);
        }
        let entity = Entity::placeholder(kind, id);
        put_record(&self.tx, &entity)?;
        Ok(entity)
    }

    /// Insert or replace a record, raising a create or update event.
    pub fn upsert(&mut self, entity: &Entity) -> Result<()> {
        let existed = record_exists(&self.tx, entity.kind(), entity.id())?;
        put_record(&self.tx, entity)?;
        self.events.push(ChangeEvent {
            change_type: if existed {
                ChangeType::Update
            } else {
                ChangeType::Create
            },
            kind: entity.kind(),
            record_id: entity.id().to_string(),
        });
        Ok(())
    }

    /// Delete a record if present, raising a delete event when it was.
    pub fn delete(&mut self, kind: RecordKind, id: &str) -> Result<()> {
        let deleted = self.tx.execute(
            "DELETE FROM records WHERE kind = ?1 AND id = ?2",
            params![kind.as_str(), id],
        )?;
        if deleted > 0 {
            self.events.push(ChangeEvent {
                change_type: ChangeType::Delete,
                kind,
                record_id: id.to_string(),
            });
        }
        Ok(())
    }

    /// Wipe all records and queued outgoing changes. Raises no events.
    pub fn delete_all(&mut self) -> Result<()> {
        self.tx.execute("DELETE FROM records", [])?;
        self.tx.execute("DELETE FROM outbox", [])?;
        Ok(())
    }

    pub(crate) fn connection(&self) -> &Connection {
        &self.tx
    }
}

fn get_record(conn: &Connection, kind: RecordKind, id: &str) -> Result<Option<Entity>> {
    let data: Option<String> = conn
        .query_row(
            "SELECT data FROM records WHERE kind = ?1 AND id = ?2",
            params![kind.as_str(), id],
            |row| row.get(0),
        )
        .optional()?;
    data.as_deref().map(|data| decode(kind, data)).transpose()
}

fn list_records(conn: &Connection, kind: RecordKind) -> Result<Vec<Entity>> {
    let mut stmt = conn.prepare("SELECT data FROM records WHERE kind = ?1 ORDER BY id")?;
    let rows = stmt.query_map(params![kind.as_str()], |row| row.get::<_, String>(0))?;
    let mut entities = Vec::new();
    for data in rows {
        entities.push(decode(kind, &data?)?);
    }
    Ok(entities)
}

fn find_referencing(
    conn: &Connection,
    kind: RecordKind,
    field: &str,
    id: &str,
) -> Result<Vec<Entity>> {
    let mut stmt = conn.prepare(
        "SELECT data FROM records WHERE kind = ?1 AND json_extract(data, ?2) = ?3 ORDER BY id",
    )?;
    let path = format!("$.{field}");
    let rows = stmt.query_map(params![kind.as_str(), path, id], |row| {
        row.get::<_, String>(0)
    })?;
    let mut entities = Vec::new();
    for data in rows {
        entities.push(decode(kind, &data?)?);
    }
    Ok(entities)
}

fn record_exists(conn: &Connection, kind: RecordKind, id: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM records WHERE kind = ?1 AND id = ?2",
        params![kind.as_str(), id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn put_record(conn: &Connection, entity: &Entity) -> Result<()> {
    let data = serde_json::to_string(&entity.to_value()?)?;
    conn.execute(
        "INSERT INTO records (kind, id, data) VALUES (?1, ?2, ?3)
         ON CONFLICT (kind, id) DO UPDATE SET data = excluded.data",
        params![entity.kind().as_str(), entity.id(), data],
    )?;
    Ok(())
}

fn decode(kind: RecordKind, data: &str) -> Result<Entity> {
    Ok(Entity::from_value(kind, serde_json::from_str(data)?)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Item, ItemBatch};
    use pretty_assertions::assert_eq;

    fn item(id: &str, name: &str) -> Entity {
        Entity::Item(Item {
            id: id.to_string(),
            name: Some(name.to_string()),
            ..Item::default()
        })
    }

    #[test]
    fn upsert_and_get_round_trip() {
        let mut store = Store::open_in_memory().unwrap();
        let entity = item("i1", "Amoxicillin");
        store
            .write(ChangeOrigin::Local, |wtx| wtx.upsert(&entity))
            .unwrap();
        assert_eq!(store.get(RecordKind::Item, "i1").unwrap(), Some(entity));
        assert_eq!(store.get(RecordKind::Item, "i2").unwrap(), None);
    }

    #[test]
    fn upsert_raises_create_then_update_events() {
        let mut store = Store::open_in_memory().unwrap();
        let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = std::sync::Arc::clone(&seen);
        store.subscribe(move |event| sink.lock().unwrap().push(event.clone()));

        let entity = item("i1", "Amoxicillin");
        store
            .write(ChangeOrigin::Local, |wtx| {
                wtx.upsert(&entity)?;
                wtx.upsert(&entity)
            })
            .unwrap();

        let events = seen.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].change_type, ChangeType::Create);
        assert_eq!(events[1].change_type, ChangeType::Update);
        assert_eq!(events[0].record_id, "i1");
    }

    #[test]
    fn failed_write_rolls_back() {
        let mut store = Store::open_in_memory().unwrap();
        let entity = item("i1", "Amoxicillin");
        let result: Result<()> = store.write(ChangeOrigin::Local, |wtx| {
            wtx.upsert(&entity)?;
            Err(crate::Error::InvalidInput("boom".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(store.get(RecordKind::Item, "i1").unwrap(), None);
    }

    #[test]
    fn get_or_create_returns_placeholder_without_event() {
        let mut store = Store::open_in_memory().unwrap();
        let seen = std::sync::Arc::new(std::sync::Mutex::new(0_usize));
        let sink = std::sync::Arc::clone(&seen);
        store.subscribe(move |_| *sink.lock().unwrap() += 1);

        let created = store
            .write(ChangeOrigin::Sync, |wtx| {
                wtx.get_or_create(RecordKind::Item, "i1")
            })
            .unwrap();
        assert_eq!(created.id(), "i1");
        assert_eq!(*seen.lock().unwrap(), 0);

        // A later fetch sees the same placeholder rather than making another.
        let fetched = store
            .write(ChangeOrigin::Sync, |wtx| {
                wtx.get_or_create(RecordKind::Item, "i1")
            })
            .unwrap();
        assert_eq!(fetched, created);
    }

    #[test]
    fn find_referencing_matches_json_field() {
        let mut store = Store::open_in_memory().unwrap();
        store
            .write(ChangeOrigin::Sync, |wtx| {
                for (id, item_id) in [("b1", "i1"), ("b2", "i1"), ("b3", "i2")] {
                    wtx.upsert(&Entity::ItemBatch(ItemBatch {
                        id: id.to_string(),
                        item_id: item_id.to_string(),
                        ..ItemBatch::default()
                    }))?;
                }
                Ok(())
            })
            .unwrap();

        let batches = store
            .find_referencing(RecordKind::ItemBatch, "item_id", "i1")
            .unwrap();
        let ids: Vec<&str> = batches.iter().map(Entity::id).collect();
        assert_eq!(ids, vec!["b1", "b2"]);
    }

    #[test]
    fn delete_is_a_noop_for_missing_records() {
        let mut store = Store::open_in_memory().unwrap();
        let seen = std::sync::Arc::new(std::sync::Mutex::new(0_usize));
        let sink = std::sync::Arc::clone(&seen);
        store.subscribe(move |_| *sink.lock().unwrap() += 1);

        store
            .write(ChangeOrigin::Local, |wtx| {
                wtx.delete(RecordKind::Item, "missing")
            })
            .unwrap();
        assert_eq!(*seen.lock().unwrap(), 0);
    }

    #[test]
    fn store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stocklink.db");
        {
            let mut store = Store::open(&path).unwrap();
            store
                .write(ChangeOrigin::Local, |wtx| {
                    wtx.upsert(&item("i1", "Amoxicillin"))
                })
                .unwrap();
        }
        let store = Store::open(&path).unwrap();
        assert_eq!(
            store.get(RecordKind::Item, "i1").unwrap(),
            Some(item("i1", "Amoxicillin"))
        );
    }

    #[test]
    fn settings_round_trip() {
        let store = Store::open_in_memory().unwrap();
        assert_eq!(store.get_setting("sync_url").unwrap(), None);
        store.set_setting("sync_url", "https://example.com").unwrap();
        store.set_setting("sync_url", "https://example.org").unwrap();
        assert_eq!(
            store.get_setting("sync_url").unwrap(),
            Some("https://example.org".to_string())
        );
    }
}
